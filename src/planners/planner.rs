use std::collections::VecDeque;
use std::rc::Rc;

use crate::config::{Config, StrategyName};
use crate::infra::distance::DistanceOracle;
use crate::search::{self, Evaluation, GoalDistance, GoalTest, SearchError, SearchLimits, Strategy};
use crate::state::{Action, State, Transitions};

/// Builds the strategy a config names, with its heuristic bound to `initial`.
pub fn build_strategy(config: &Config, initial: &State, oracle: Rc<dyn DistanceOracle>) -> Strategy {
    let evaluation = match config.strategy {
        StrategyName::Bfs => return Strategy::breadth_first(),
        StrategyName::Dfs => return Strategy::depth_first(),
        StrategyName::AStar => Evaluation::AStar,
        StrategyName::WeightedAStar => Evaluation::WeightedAStar(config.weight),
        StrategyName::Greedy => Evaluation::Greedy,
    };
    let heuristic = GoalDistance::new(config.heuristic, initial, oracle);
    Strategy::best_first(evaluation, Box::new(heuristic))
}

/// One agent: its search machinery and the plan it is currently following.
///
/// Plan entry `t` is the agent's belief after its `t`-th upcoming action;
/// time `-1` is `current`, the state the agent is in right now.
pub struct Agent {
    pub id: usize,
    current: State,
    plan: VecDeque<State>,
    strategy: Strategy,
    transitions: Transitions,
    searched_from: Option<State>,
}

impl Agent {
    pub fn new(id: usize, initial: State, strategy: Strategy, seed: u64) -> Self {
        Self {
            id,
            current: initial,
            plan: VecDeque::new(),
            strategy,
            transitions: Transitions::new(seed),
            searched_from: None,
        }
    }

    pub fn current(&self) -> &State {
        &self.current
    }

    pub fn plan(&self) -> &VecDeque<State> {
        &self.plan
    }

    pub fn plan_len(&self) -> usize {
        self.plan.len()
    }

    pub fn has_plan(&self) -> bool {
        !self.plan.is_empty()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.plan
            .iter()
            .map(|s| s.action.unwrap_or(Action::NOOP))
            .collect()
    }

    /// Whether a search from `initial` would repeat the last one.
    pub fn already_searched(&self, initial: &State) -> bool {
        self.searched_from.as_ref() == Some(initial)
    }

    /// Plans from `initial` to a state passing `goal`; the plan is empty when
    /// the search fails.
    pub fn search(&mut self, initial: State, goal: GoalTest, limits: &SearchLimits<'_>) -> bool {
        self.current = initial.clone();
        self.searched_from = Some(initial.clone());
        tracing::debug!(agent = self.id, strategy = %self.strategy, "Starting search");

        match self.search_from(initial, goal, limits) {
            Ok(plan) => {
                tracing::debug!(agent = self.id, length = plan.len(), "Plan found");
                self.plan = plan.into();
                true
            }
            Err(e) => {
                tracing::warn!(agent = self.id, error = %e, status = %self.strategy.status(), "No solution");
                self.plan.clear();
                false
            }
        }
    }

    /// Runs this agent's strategy without touching its plan.
    pub fn search_from(
        &mut self,
        initial: State,
        goal: GoalTest,
        limits: &SearchLimits<'_>,
    ) -> Result<Vec<State>, SearchError> {
        search::search(initial, &mut self.strategy, &mut self.transitions, goal, limits)
    }

    /// Like `search_from` with a throwaway breadth-first strategy, keeping
    /// this agent's seeded child order.
    pub fn search_breadth_first(
        &mut self,
        initial: State,
        goal: GoalTest,
        limits: &SearchLimits<'_>,
    ) -> Result<Vec<State>, SearchError> {
        let mut strategy = Strategy::breadth_first();
        search::search(initial, &mut strategy, &mut self.transitions, goal, limits)
    }

    /// Takes the next step of the plan, or waits when there is none.
    pub fn act(&mut self) -> Action {
        match self.plan.pop_front() {
            Some(next) => {
                let action = next.action.unwrap_or(Action::NOOP);
                self.current = next;
                action
            }
            None => Action::NOOP,
        }
    }

    /// Belief at time `t`: the plan entry, the last entry past the end, or
    /// `current` before the first step or without a plan.
    pub fn future_state(&self, t: isize) -> &State {
        if t < 0 {
            return &self.current;
        }
        self.plan
            .get(t as usize)
            .or_else(|| self.plan.back())
            .unwrap_or(&self.current)
    }

    /// Inserts `units` NoOp steps right after plan entry `start`; `-1` inserts
    /// at the head. Later entries keep their order and move `units` steps later.
    pub fn interleave_plan(&mut self, units: usize, start: isize) {
        if units == 0 {
            return;
        }
        let start = start.min(self.plan.len() as isize - 1);
        let base = self.future_state(start).clone();
        let at = (start + 1) as usize;

        let mut previous = base;
        for k in 0..units {
            let noop = previous.noop_successor();
            self.plan.insert(at + k, noop.clone());
            previous = noop;
        }
        for state in self.plan.iter_mut().skip(at + units) {
            state.g += units as u32;
        }
    }

    /// Cuts the plan to `len` steps, or extends it with NoOps up to `len`.
    pub fn fit_plan(&mut self, len: usize) {
        self.plan.truncate(len);
        let shortfall = len - self.plan.len();
        self.pad_plan(shortfall);
    }

    /// Appends `units` NoOps after the last step.
    pub fn pad_plan(&mut self, units: usize) {
        let mut last = self.future_state(self.plan.len() as isize - 1).clone();
        for _ in 0..units {
            last = last.noop_successor();
            self.plan.push_back(last.clone());
        }
    }

    pub fn extend_plan(&mut self, states: impl IntoIterator<Item = State>) {
        self.plan.extend(states);
    }

    /// Replaces the plan with the states `actions` produce from `current`.
    /// Returns false, leaving the plan empty, at the first inapplicable action.
    pub fn follow(&mut self, actions: &[Action]) -> bool {
        self.plan.clear();
        let mut state = self.current.clone();
        for action in actions {
            let Some(next) = state.child(action) else {
                self.plan.clear();
                return false;
            };
            self.plan.push_back(next.clone());
            state = next;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::level::Level;
    use crate::infra::memory::MemoryBudget;
    use crate::infra::memory::tests::FixedMemory;
    use crate::infra::{Direction, Position};
    use crate::state::WorldState;

    fn agent(text: &str) -> Agent {
        let world = WorldState::from_level(&Level::parse(text).unwrap());
        Agent::new(0, world.view_of(0), Strategy::breadth_first(), 2)
    }

    fn east_plan() -> Agent {
        let mut agent = agent("++++++\n+0   +\n++++++\n");
        let east = Action::move_to(Direction::East);
        assert!(agent.follow(&[east, east, east]));
        agent
    }

    #[test]
    fn test_search_sets_plan() {
        let mut agent = agent("++++++\n+0A a+\n++++++\n");
        let memory = MemoryBudget::with_probe(512, Box::new(FixedMemory(0)));
        let limits = SearchLimits {
            memory: &memory,
            status_interval: 1000,
        };
        let start = agent.current().clone();
        assert!(agent.search(start.clone(), GoalTest::Subgoal, &limits));
        assert_eq!(agent.plan_len(), 2);
        assert!(agent.already_searched(&start));
        assert!(agent.future_state(1).is_subgoal_state());
    }

    #[test]
    fn test_failed_search_leaves_empty_plan() {
        let mut agent = agent("+++++++\n+0A+ a+\n+++++++\n");
        let memory = MemoryBudget::with_probe(512, Box::new(FixedMemory(0)));
        let limits = SearchLimits {
            memory: &memory,
            status_interval: 1000,
        };
        let start = agent.current().clone();
        assert!(!agent.search(start, GoalTest::Subgoal, &limits));
        assert!(!agent.has_plan());
        assert_eq!(agent.act(), Action::NOOP);
    }

    #[test]
    fn test_act_pops_steps_then_waits() {
        let mut agent = east_plan();
        assert_eq!(agent.act(), Action::move_to(Direction::East));
        assert_eq!(agent.current().agent, Position::new(1, 2));
        agent.act();
        agent.act();
        assert_eq!(agent.act(), Action::NOOP);
        assert_eq!(agent.current().agent, Position::new(1, 4));
    }

    #[test]
    fn test_future_state_clamps() {
        let agent = east_plan();
        assert_eq!(agent.future_state(-1).agent, Position::new(1, 1));
        assert_eq!(agent.future_state(0).agent, Position::new(1, 2));
        assert_eq!(agent.future_state(10).agent, Position::new(1, 4));

        let idle = self::agent("+++\n+0+\n+++\n");
        assert_eq!(idle.future_state(3).agent, Position::new(1, 1));
    }

    #[test]
    fn test_interleave_at_head() {
        let mut agent = east_plan();
        let before = agent.actions();
        agent.interleave_plan(2, -1);

        let after = agent.actions();
        assert_eq!(after.len(), before.len() + 2);
        assert!(after[..2].iter().all(|a| a.is_noop()));
        assert_eq!(&after[2..], &before[..]);
        assert_eq!(agent.future_state(1).agent, Position::new(1, 1));
        assert_eq!(agent.future_state(4).g, 5);
    }

    #[test]
    fn test_interleave_mid_plan() {
        let mut agent = east_plan();
        agent.interleave_plan(1, 0);
        let east = Action::move_to(Direction::East);
        assert_eq!(agent.actions(), vec![east, Action::NOOP, east, east]);
        assert_eq!(agent.future_state(1).agent, Position::new(1, 2));
        assert_eq!(agent.future_state(2).agent, Position::new(1, 3));
    }

    #[test]
    fn test_fit_plan_cuts_and_pads() {
        let mut agent = east_plan();
        agent.fit_plan(1);
        assert_eq!(agent.plan_len(), 1);
        agent.fit_plan(3);
        assert_eq!(agent.plan_len(), 3);
        assert_eq!(agent.future_state(2).agent, Position::new(1, 2));
        assert!(agent.actions()[1..].iter().all(|a| a.is_noop()));
    }

    #[test]
    fn test_follow_rejects_illegal_script() {
        let mut agent = east_plan();
        let west = Action::move_to(Direction::West);
        assert!(!agent.follow(&[west]));
        assert!(!agent.has_plan());
    }
}
