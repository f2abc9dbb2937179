use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::fmt;
use std::time::Instant;

use crate::search::arena::{NodeId, StateArena};
use crate::search::heuristic::Heuristic;
use crate::state::State;

/// How a best-first frontier turns `g` and `h` into a priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    AStar,
    WeightedAStar(u32),
    Greedy,
}

impl Evaluation {
    pub fn f(&self, g: u32, h: u32) -> u64 {
        match self {
            Evaluation::AStar => g as u64 + h as u64,
            Evaluation::WeightedAStar(w) => g as u64 + *w as u64 * h as u64,
            Evaluation::Greedy => h as u64,
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::AStar => write!(f, "A* evaluation"),
            Evaluation::WeightedAStar(w) => write!(f, "WA* ({}) evaluation", w),
            Evaluation::Greedy => write!(f, "Greedy evaluation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    BreadthFirst,
    DepthFirst,
    BestFirst(Evaluation),
}

enum Frontier {
    Fifo(VecDeque<NodeId>),
    Lifo(Vec<NodeId>),
    /// Min-heap on (f, insertion order): equal priorities pop first-in first-out.
    Ordered {
        heap: BinaryHeap<Reverse<(u64, u64, NodeId)>>,
        evaluation: Evaluation,
        heuristic: Box<dyn Heuristic>,
        inserted: u64,
    },
}

impl Frontier {
    fn len(&self) -> usize {
        match self {
            Frontier::Fifo(queue) => queue.len(),
            Frontier::Lifo(stack) => stack.len(),
            Frontier::Ordered { heap, .. } => heap.len(),
        }
    }

    fn clear(&mut self) {
        match self {
            Frontier::Fifo(queue) => queue.clear(),
            Frontier::Lifo(stack) => stack.clear(),
            Frontier::Ordered { heap, inserted, .. } => {
                heap.clear();
                *inserted = 0;
            }
        }
    }
}

/// Snapshot for progress reporting.
#[derive(Debug, Clone, Copy)]
pub struct SearchStatus {
    pub explored: usize,
    pub frontier: usize,
    pub elapsed_secs: f64,
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#Explored: {:4}, #Frontier: {:3}, Time: {:3.2} s",
            self.explored, self.frontier, self.elapsed_secs
        )
    }
}

/// Frontier and explored set of one search, with the states they reference.
///
/// The ordering policy is fixed at construction. Membership in frontier and
/// explored set is by state equality, never by arena handle.
pub struct Strategy {
    kind: StrategyKind,
    arena: StateArena,
    frontier: Frontier,
    frontier_set: HashSet<State>,
    explored: HashSet<State>,
    started: Instant,
}

impl Strategy {
    pub fn breadth_first() -> Self {
        Self::with_frontier(StrategyKind::BreadthFirst, Frontier::Fifo(VecDeque::new()))
    }

    pub fn depth_first() -> Self {
        Self::with_frontier(StrategyKind::DepthFirst, Frontier::Lifo(Vec::new()))
    }

    pub fn best_first(evaluation: Evaluation, heuristic: Box<dyn Heuristic>) -> Self {
        Self::with_frontier(
            StrategyKind::BestFirst(evaluation),
            Frontier::Ordered {
                heap: BinaryHeap::new(),
                evaluation,
                heuristic,
                inserted: 0,
            },
        )
    }

    fn with_frontier(kind: StrategyKind, frontier: Frontier) -> Self {
        Self {
            kind,
            arena: StateArena::new(),
            frontier,
            frontier_set: HashSet::new(),
            explored: HashSet::new(),
            started: Instant::now(),
        }
    }

    /// Forgets everything from a previous search.
    pub fn reset(&mut self) {
        self.arena.clear();
        self.frontier.clear();
        self.frontier_set.clear();
        self.explored.clear();
        self.started = Instant::now();
    }

    pub fn add_to_frontier(&mut self, state: State, parent: Option<NodeId>) -> NodeId {
        self.frontier_set.insert(state.clone());
        let priority = match &self.frontier {
            Frontier::Ordered {
                evaluation,
                heuristic,
                ..
            } => Some(evaluation.f(state.g, heuristic.evaluate(&state))),
            _ => None,
        };
        let id = self.arena.insert(state, parent);
        match &mut self.frontier {
            Frontier::Fifo(queue) => queue.push_back(id),
            Frontier::Lifo(stack) => stack.push(id),
            Frontier::Ordered { heap, inserted, .. } => {
                heap.push(Reverse((priority.unwrap_or_default(), *inserted, id)));
                *inserted += 1;
            }
        }
        id
    }

    pub fn get_and_remove_leaf(&mut self) -> Option<NodeId> {
        let id = match &mut self.frontier {
            Frontier::Fifo(queue) => queue.pop_front(),
            Frontier::Lifo(stack) => stack.pop(),
            Frontier::Ordered { heap, .. } => heap.pop().map(|Reverse((_, _, id))| id),
        }?;
        self.frontier_set.remove(self.arena.get(id));
        Some(id)
    }

    pub fn in_frontier(&self, state: &State) -> bool {
        self.frontier_set.contains(state)
    }

    pub fn frontier_empty(&self) -> bool {
        self.frontier.len() == 0
    }

    pub fn frontier_count(&self) -> usize {
        self.frontier.len()
    }

    pub fn add_to_explored(&mut self, state: State) {
        self.explored.insert(state);
    }

    pub fn is_explored(&self, state: &State) -> bool {
        self.explored.contains(state)
    }

    pub fn explored_count(&self) -> usize {
        self.explored.len()
    }

    pub fn state(&self, id: NodeId) -> &State {
        self.arena.get(id)
    }

    pub fn extract_plan(&self, leaf: NodeId) -> Vec<State> {
        self.arena.extract_plan(leaf)
    }

    pub fn status(&self) -> SearchStatus {
        SearchStatus {
            explored: self.explored_count(),
            frontier: self.frontier_count(),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StrategyKind::BreadthFirst => write!(f, "Breadth-first Search"),
            StrategyKind::DepthFirst => write!(f, "Depth-first Search"),
            StrategyKind::BestFirst(evaluation) => write!(f, "Best-first Search using {}", evaluation),
        }
    }
}
