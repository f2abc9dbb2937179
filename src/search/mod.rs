pub mod arena;
pub mod heuristic;
pub mod strategy;

pub use arena::{NodeId, StateArena};
pub use heuristic::{GoalDistance, Heuristic, HeuristicKind};
pub use strategy::{Evaluation, SearchStatus, Strategy, StrategyKind};

use crate::infra::memory::MemoryBudget;
use crate::state::{State, Transitions};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    #[error("maximum memory usage exceeded ({usage_mb:.2} MB of {limit_mb:.2} MB)")]
    MemoryExceeded { usage_mb: f64, limit_mb: f64 },
    #[error("frontier exhausted after exploring {explored} states")]
    FrontierExhausted { explored: usize },
}

/// Terminal condition of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GoalTest {
    /// Every goal cell holds a matching box.
    #[default]
    Subgoal,
    /// Subgoal, and every box sits on a matching goal.
    Full,
    /// Every box on a matching goal and the agent on a goal cell.
    Parked,
}

impl GoalTest {
    pub fn is_satisfied(self, state: &State) -> bool {
        match self {
            GoalTest::Subgoal => state.is_subgoal_state(),
            GoalTest::Full => state.is_goal_state(),
            GoalTest::Parked => state.is_parked(),
        }
    }
}

/// Knobs shared by every search of a run.
pub struct SearchLimits<'a> {
    pub memory: &'a MemoryBudget,
    pub status_interval: usize,
}

/// Expansions between two reads of the process memory.
pub const MEMORY_CHECK_INTERVAL: usize = 256;

/// Runs the frontier loop from `initial` until `goal` holds.
///
/// Returns the plan from `initial` (exclusive) to the goal state (inclusive);
/// an initial state that already satisfies `goal` yields an empty plan.
#[tracing::instrument(level = "debug", skip_all, fields(strategy = %strategy))]
pub fn search(
    initial: State,
    strategy: &mut Strategy,
    transitions: &mut Transitions,
    goal: GoalTest,
    limits: &SearchLimits<'_>,
) -> Result<Vec<State>, SearchError> {
    strategy.reset();
    strategy.add_to_frontier(initial.as_root(), None);

    let mut iterations = 0usize;
    let mut expanded = 0usize;
    loop {
        if limits.status_interval > 0 && iterations == limits.status_interval {
            let status = strategy.status();
            tracing::info!(
                explored = status.explored,
                frontier = status.frontier,
                elapsed_secs = status.elapsed_secs,
                alloc_mb = limits.memory.usage_mb(),
                max_alloc_mb = limits.memory.limit_mb(),
                "Search status"
            );
            iterations = 0;
        }

        if expanded % MEMORY_CHECK_INTERVAL == 0 && limits.memory.exceeded() {
            return Err(SearchError::MemoryExceeded {
                usage_mb: limits.memory.usage_mb(),
                limit_mb: limits.memory.limit_mb(),
            });
        }

        let Some(leaf) = strategy.get_and_remove_leaf() else {
            return Err(SearchError::FrontierExhausted {
                explored: strategy.explored_count(),
            });
        };

        let state = strategy.state(leaf).clone();
        if goal.is_satisfied(&state) {
            let plan = strategy.extract_plan(leaf);
            tracing::debug!(length = plan.len(), explored = strategy.explored_count(), "Found plan");
            return Ok(plan);
        }

        strategy.add_to_explored(state.clone());
        for child in transitions.children(&state) {
            if !strategy.is_explored(&child) && !strategy.in_frontier(&child) {
                strategy.add_to_frontier(child, Some(leaf));
            }
        }

        iterations += 1;
        expanded += 1;
    }
}
