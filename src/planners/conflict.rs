use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::infra::Position;
use crate::planners::planner::Agent;
use crate::search::{GoalTest, SearchLimits};
use crate::state::{Action, ActionKind, BoxMap, GoalMap, State};

/// What keeps a contested cell occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Occupant {
    Box(char),
    Agent,
}

/// How a conflict was found. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictReason {
    Occupation,
    Swap,
    PushInterference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    /// Waiting through `window` lets the blocker clear `cell`.
    NoOpable { window: Vec<usize>, cell: Position },
    /// The blocker stays on `cell` and has to be moved out of the way.
    Deadlock { cell: Position, occupant: Occupant },
}

impl ConflictKind {
    fn rank(&self) -> u8 {
        match self {
            ConflictKind::NoOpable { .. } => 0,
            ConflictKind::Deadlock { .. } => 1,
        }
    }
}

/// Interaction between two agents' plans at one time step.
///
/// `first` keeps its schedule (it holds the cell), `second` is the one that
/// waits. Identity ignores the order of the pair.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub first: usize,
    pub second: usize,
    pub time: usize,
    pub kind: ConflictKind,
    pub reason: ConflictReason,
}

impl Conflict {
    pub fn pair(&self) -> (usize, usize) {
        (self.first.min(self.second), self.first.max(self.second))
    }

    fn sort_key(&self) -> (usize, usize, usize, u8) {
        let (low, high) = self.pair();
        (self.time, low, high, self.kind.rank())
    }
}

impl PartialEq for Conflict {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for Conflict {}

impl Hash for Conflict {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sort_key().hash(state);
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConflictKind::NoOpable { window, cell } => write!(
                f,
                "NoOpable({:?}) agent {} waits {:?} for agent {} on {} at t={}",
                self.reason, self.second, window, self.first, cell, self.time
            ),
            ConflictKind::Deadlock { cell, occupant } => write!(
                f,
                "Deadlock({:?}) agent {} blocks {} with {:?} for agent {} at t={}",
                self.reason, self.first, cell, occupant, self.second, self.time
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("agent {first} found no way to clear the path of agent {second} at time {time}")]
    Unresolved {
        first: usize,
        second: usize,
        time: usize,
    },
    #[error("conflicts remain after {passes} resolution passes")]
    PassLimit { passes: usize },
}

fn occupies(state: &State, cell: Position) -> bool {
    state.agent == cell || state.box_at(&cell).is_some()
}

fn occupant(state: &State, cell: Position) -> Occupant {
    match state.box_at(&cell) {
        Some(letter) if state.agent != cell => Occupant::Box(letter),
        _ => Occupant::Agent,
    }
}

/// Non-NoOp actions still ahead of an agent.
fn moves(agent: &Agent) -> Vec<Action> {
    agent
        .plan()
        .iter()
        .filter_map(|state| state.action)
        .filter(|action| !action.is_noop())
        .collect()
}

/// A NoOpable resolution together with the moves both agents had left.
struct Wait {
    pair: (usize, usize),
    waiter: usize,
    cell: Position,
    moves: (Vec<Action>, Vec<Action>),
}

impl Wait {
    fn new(agents: &[Agent], conflict: &Conflict, cell: Position) -> Self {
        let pair = conflict.pair();
        Self {
            pair,
            waiter: conflict.second,
            cell,
            moves: (moves(&agents[pair.0]), moves(&agents[pair.1])),
        }
    }

    fn same_plans(&self, other: &Wait) -> bool {
        self.pair == other.pair && self.moves == other.moves
    }

    /// The same wait was made before, and since then the other agent of the
    /// pair waited too, while neither plan changed beyond NoOps.
    fn repeats(&self, history: &[Wait]) -> bool {
        history.iter().enumerate().any(|(i, earlier)| {
            earlier.same_plans(self)
                && earlier.waiter == self.waiter
                && earlier.cell == self.cell
                && history[i + 1..]
                    .iter()
                    .any(|between| between.same_plans(self) && between.waiter != self.waiter)
        })
    }
}

/// `agent` is on `cell` at `t`, or was there when the step to `t` began.
fn holds(agent: &Agent, cell: Position, t: isize) -> bool {
    occupies(agent.future_state(t), cell) || occupies(agent.future_state(t - 1), cell)
}

/// Cells an agent claims with its action at `t`.
fn contested_cells(now: &State, before: &State) -> Vec<(Position, ConflictReason)> {
    let mut cells = Vec::new();
    if now.agent != before.agent {
        cells.push((now.agent, ConflictReason::Occupation));
    }
    if let Some(Action {
        kind: ActionKind::Push,
        box_dir: Some(box_dir),
        ..
    }) = now.action
    {
        cells.push((now.agent.step(box_dir), ConflictReason::PushInterference));
    }
    cells
}

/// Detects and repairs conflicts between independently computed plans.
///
/// Agents are expected in id order, `agents[i].id == i`.
pub struct ConflictManager {
    max_passes: usize,
}

impl ConflictManager {
    pub fn new(max_passes: usize) -> Self {
        Self { max_passes }
    }

    /// All conflicts of the current plans, grouped by time and ordered within a
    /// time by agent pair and kind.
    pub fn detect(&self, agents: &[Agent]) -> BTreeMap<usize, Vec<Conflict>> {
        let mut found: BTreeMap<usize, Vec<Conflict>> = BTreeMap::new();
        for mover in agents {
            for t in 0..mover.plan_len() {
                for other in agents.iter().filter(|other| other.id != mover.id) {
                    if let Some(conflict) = Self::check_pair(mover, other, t) {
                        let bucket = found.entry(t).or_default();
                        if !bucket.contains(&conflict) {
                            bucket.push(conflict);
                        }
                    }
                }
            }
        }
        for bucket in found.values_mut() {
            bucket.sort_by_key(|c| c.sort_key());
        }
        found
    }

    fn check_pair(mover: &Agent, other: &Agent, t: usize) -> Option<Conflict> {
        let time = t as isize;
        let now = mover.future_state(time);
        let before = mover.future_state(time - 1);
        let other_now = other.future_state(time);
        let other_before = other.future_state(time - 1);

        let mover_moves = now.agent != before.agent;
        let other_moves = other_now.agent != other_before.agent;
        if mover_moves && other_moves && now.agent == other_before.agent && other_now.agent == before.agent
        {
            return Some(Conflict {
                first: other.id,
                second: mover.id,
                time: t,
                kind: ConflictKind::NoOpable {
                    window: vec![t],
                    cell: now.agent,
                },
                reason: ConflictReason::Swap,
            });
        }

        for (cell, reason) in contested_cells(now, before) {
            if !holds(other, cell, time) {
                continue;
            }
            let kind = if !occupies(other.future_state(time + 1), cell) {
                ConflictKind::NoOpable { window: vec![t], cell }
            } else if !occupies(other.future_state(time + 2), cell) {
                ConflictKind::NoOpable {
                    window: vec![t, t + 1],
                    cell,
                }
            } else {
                ConflictKind::Deadlock {
                    cell,
                    occupant: occupant(other.future_state(time + 2), cell),
                }
            };
            return Some(Conflict {
                first: other.id,
                second: mover.id,
                time: t,
                kind,
                reason,
            });
        }
        None
    }

    /// Repairs one conflict in place.
    pub fn resolve(
        &self,
        agents: &mut [Agent],
        conflict: &Conflict,
        limits: &SearchLimits<'_>,
    ) -> Result<(), ConflictError> {
        match &conflict.kind {
            ConflictKind::NoOpable { window, .. } => {
                agents[conflict.second].interleave_plan(window.len(), conflict.time as isize - 1);
                Ok(())
            }
            ConflictKind::Deadlock { cell, .. } => self.resolve_deadlock(agents, conflict, *cell, limits),
        }
    }

    /// Moves the blocker off the waiter's remaining path with a helper search,
    /// then delays the waiter until the helper plan is done.
    #[tracing::instrument(level = "debug", skip(self, agents, limits))]
    fn resolve_deadlock(
        &self,
        agents: &mut [Agent],
        conflict: &Conflict,
        cell: Position,
        limits: &SearchLimits<'_>,
    ) -> Result<(), ConflictError> {
        let (blocker_id, waiter_id, t) = (conflict.first, conflict.second, conflict.time);

        let waiter = &agents[waiter_id];
        let mut reserved = BTreeSet::new();
        for time in (t as isize - 1)..waiter.plan_len() as isize {
            let state = waiter.future_state(time);
            reserved.insert(state.agent);
            reserved.extend(state.boxes().keys().copied());
        }
        let waiter_remaining = waiter.plan_len().saturating_sub(t);

        let blocker = &mut agents[blocker_id];
        // on the cell at t, or leaving it with its action at t
        let Some(at) = [t as isize, t as isize - 1]
            .into_iter()
            .find(|&time| occupies(blocker.future_state(time), cell))
        else {
            tracing::warn!(blocker = blocker_id, %cell, time = t, "Blocker does not hold the contested cell");
            return Err(ConflictError::Unresolved {
                first: blocker_id,
                second: waiter_id,
                time: t,
            });
        };
        let start = blocker.future_state(at).clone();
        let blocking_box = start.box_at(&cell);

        let other_boxes: BoxMap = start
            .boxes()
            .iter()
            .filter(|(pos, _)| **pos != cell)
            .map(|(pos, letter)| (*pos, *letter))
            .collect();
        let walls = start.walls().with_extra_walls(
            reserved
                .iter()
                .chain(other_boxes.keys())
                .copied()
                .filter(|pos| *pos != start.agent && *pos != cell),
        );
        let goal_letter = blocking_box.map_or('a', |letter| letter.to_ascii_lowercase());
        let parking: GoalMap = walls
            .floor_cells()
            .filter(|pos| !reserved.contains(pos) && *pos != cell)
            .map(|pos| (pos, goal_letter))
            .collect();
        let helper_start = State::new(
            start.agent,
            blocking_box.map(|letter| (cell, letter)).into_iter().collect(),
            parking,
            Arc::new(walls),
        );

        let helper = blocker
            .search_breadth_first(helper_start, GoalTest::Parked, limits)
            .map_err(|e| {
                tracing::warn!(blocker = blocker_id, waiter = waiter_id, time = t, error = %e, "Deadlock helper failed");
                ConflictError::Unresolved {
                    first: blocker_id,
                    second: waiter_id,
                    time: t,
                }
            })?;

        let helper_len = helper.len();
        blocker.fit_plan((at + 1) as usize);
        let base_g = blocker.future_state(at).g;
        blocker.extend_plan(
            helper
                .iter()
                .enumerate()
                .map(|(i, step)| step.rebased(&start, &other_boxes).with_g(base_g + i as u32 + 1)),
        );
        blocker.pad_plan(waiter_remaining);
        agents[waiter_id].interleave_plan(helper_len + 1, t as isize - 1);

        tracing::debug!(
            blocker = blocker_id,
            waiter = waiter_id,
            time = t,
            helper = helper_len,
            "Deadlock resolved"
        );
        Ok(())
    }

    /// Detects and resolves until the plans are conflict free, earliest time
    /// first. Returns the number of conflicts resolved.
    ///
    /// Two agents taking turns waiting for each other at the same cells make
    /// no progress; the agent holding the cell is then moved aside as in a
    /// deadlock.
    pub fn solve_conflicts(
        &self,
        agents: &mut [Agent],
        limits: &SearchLimits<'_>,
    ) -> Result<usize, ConflictError> {
        let mut waits: Vec<Wait> = Vec::new();
        let mut passes = 0;
        loop {
            let conflicts = self.detect(agents);
            let Some(conflict) = conflicts.values().next().and_then(|bucket| bucket.first()) else {
                return Ok(passes);
            };
            if passes >= self.max_passes {
                return Err(ConflictError::PassLimit { passes });
            }

            let mut conflict = conflict.clone();
            if let ConflictKind::NoOpable { cell, .. } = conflict.kind {
                let wait = Wait::new(agents, &conflict, cell);
                if wait.repeats(&waits) {
                    let blocker = &agents[conflict.first];
                    let time = conflict.time as isize;
                    let held = if occupies(blocker.future_state(time), cell) {
                        blocker.future_state(time)
                    } else {
                        blocker.future_state(time - 1)
                    };
                    conflict.kind = ConflictKind::Deadlock {
                        cell,
                        occupant: occupant(held, cell),
                    };
                    tracing::debug!(%conflict, "Agents keep waiting for each other, escalating");
                }
                waits.push(wait);
            }

            tracing::debug!(%conflict, "Resolving conflict");
            self.resolve(agents, &conflict, limits)?;
            passes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Direction;
    use crate::infra::level::Level;
    use crate::infra::memory::MemoryBudget;
    use crate::infra::memory::tests::FixedMemory;
    use crate::search::Strategy;
    use crate::state::WorldState;

    fn agents(text: &str) -> Vec<Agent> {
        let world = WorldState::from_level(&Level::parse(text).unwrap());
        world
            .split()
            .into_iter()
            .enumerate()
            .map(|(id, view)| Agent::new(id, view, Strategy::breadth_first(), 2 + id as u64))
            .collect()
    }

    fn solve(manager: &ConflictManager, agents: &mut [Agent]) -> Result<usize, ConflictError> {
        let memory = MemoryBudget::with_probe(512, Box::new(FixedMemory(0)));
        let limits = SearchLimits {
            memory: &memory,
            status_interval: 1000,
        };
        manager.solve_conflicts(agents, &limits)
    }

    fn east() -> Action {
        Action::move_to(Direction::East)
    }

    fn push_east() -> Action {
        Action::push(Direction::East, Direction::East).unwrap()
    }

    /// No two agents, or an agent and a box, share a cell at any time.
    fn assert_no_collisions(agents: &[Agent]) {
        let horizon = agents.iter().map(|a| a.plan_len()).max().unwrap_or(0) as isize;
        for t in -1..horizon {
            let mut seen = BTreeSet::new();
            for agent in agents {
                let state = agent.future_state(t);
                assert!(seen.insert(state.agent), "collision at {} t={}", state.agent, t);
                for pos in state.boxes().keys() {
                    assert!(seen.insert(*pos), "box collision at {} t={}", pos, t);
                }
            }
        }
    }

    #[test]
    fn test_swap_in_corridor_reported_at_time_zero() {
        let mut agents = agents("red: 0\nblue: 1\n01 \n");
        assert!(agents[0].follow(&[east()]));
        assert!(agents[1].follow(&[Action::move_to(Direction::West)]));

        let conflicts = ConflictManager::new(10).detect(&agents);
        let at_zero = &conflicts[&0];
        assert_eq!(at_zero.len(), 1);
        assert_eq!(at_zero[0].reason, ConflictReason::Swap);
        assert_eq!(
            at_zero[0].kind,
            ConflictKind::NoOpable {
                window: vec![0],
                cell: Position::new(0, 1)
            }
        );
        assert_eq!(at_zero[0].pair(), (0, 1));
    }

    #[test]
    fn test_crossing_agents_wait_until_cell_is_left() {
        let text = "red: 0\nblue: 1\n+++++\n++ ++\n+0  +\n++1++\n+++++\n";
        let mut agents = agents(text);
        assert!(agents[0].follow(&[east(), east()]));
        let north = Action::move_to(Direction::North);
        assert!(agents[1].follow(&[north, north]));

        let manager = ConflictManager::new(10);
        let first = &manager.detect(&agents)[&0][0];
        assert_eq!((first.first, first.second), (1, 0));

        assert_eq!(solve(&manager, &mut agents), Ok(2));
        assert_eq!(
            agents[0].actions(),
            vec![Action::NOOP, Action::NOOP, east(), east()]
        );
        assert_eq!(agents[1].actions(), vec![north, north]);
        assert!(manager.detect(&agents).is_empty());
        assert_no_collisions(&agents);
    }

    #[test]
    fn test_stationary_agent_steps_into_pocket() {
        let text = "red: 0, A\nblue: 1\n+++++++\n+0A 1a+\n++++ ++\n+++++++\n";
        let mut agents = agents(text);
        assert!(agents[0].follow(&[push_east(), push_east(), push_east()]));

        let manager = ConflictManager::new(10);
        let conflicts = manager.detect(&agents);
        let earliest = conflicts.values().next().unwrap();
        assert_eq!(earliest[0].time, 1);
        assert_eq!(earliest[0].reason, ConflictReason::PushInterference);
        assert_eq!(
            earliest[0].kind,
            ConflictKind::Deadlock {
                cell: Position::new(1, 4),
                occupant: Occupant::Agent
            }
        );

        assert_eq!(solve(&manager, &mut agents), Ok(1));
        let south = Action::move_to(Direction::South);
        assert_eq!(
            agents[0].actions(),
            vec![push_east(), Action::NOOP, Action::NOOP, push_east(), push_east()]
        );
        assert_eq!(
            agents[1].actions(),
            vec![Action::NOOP, Action::NOOP, south, Action::NOOP, Action::NOOP]
        );
        assert_no_collisions(&agents);
        assert!(agents[0].future_state(10).is_subgoal_state());
    }

    #[test]
    fn test_blocking_box_is_pulled_aside() {
        let text = "red: 0\nblue: 1, B\n+++++++\n+0 B  +\n+++1+++\n+++ +++\n+++++++\n";
        let mut agents = agents(text);
        assert!(agents[0].follow(&[east(), east(), east()]));

        let manager = ConflictManager::new(10);
        let conflicts = manager.detect(&agents);
        assert_eq!(
            conflicts[&1][0].kind,
            ConflictKind::Deadlock {
                cell: Position::new(1, 3),
                occupant: Occupant::Box('B')
            }
        );

        assert_eq!(solve(&manager, &mut agents), Ok(1));
        let pull = Action::pull(Direction::South, Direction::North).unwrap();
        assert_eq!(agents[1].actions()[2], pull);
        assert_eq!(
            agents[0].actions(),
            vec![east(), Action::NOOP, Action::NOOP, east(), east()]
        );
        // the blocker's view keeps its own goals and walls after the helper
        assert_eq!(agents[1].future_state(2).walls(), agents[1].current().walls());
        assert_eq!(agents[1].future_state(2).box_at(&Position::new(2, 3)), Some('B'));
        assert_no_collisions(&agents);
    }

    #[test]
    fn test_blocker_without_parking_is_unresolved() {
        let text = "red: 0, A\nblue: 1\n+++++++\n+0A 1a+\n+++++++\n";
        let mut agents = agents(text);
        assert!(agents[0].follow(&[push_east(), push_east(), push_east()]));

        let result = solve(&ConflictManager::new(10), &mut agents);
        assert_eq!(
            result,
            Err(ConflictError::Unresolved {
                first: 1,
                second: 0,
                time: 1
            })
        );
    }

    #[test]
    fn test_pass_limit_stops_resolution() {
        let mut agents = agents("red: 0\nblue: 1\n01 \n");
        assert!(agents[0].follow(&[east()]));
        assert!(agents[1].follow(&[Action::move_to(Direction::West)]));

        let result = solve(&ConflictManager::new(2), &mut agents);
        assert_eq!(result, Err(ConflictError::PassLimit { passes: 2 }));
    }

    #[test]
    fn test_turn_taking_waits_escalate_to_parking() {
        let mut agents = agents("red: 0\nblue: 1\n01 \n");
        let west = Action::move_to(Direction::West);
        assert!(agents[0].follow(&[east()]));
        assert!(agents[1].follow(&[west]));

        // agent 0 waits, then agent 1, then agent 0 again at the same cell:
        // agent 1 is sent to the free end instead
        assert_eq!(solve(&ConflictManager::new(1000), &mut agents), Ok(3));
        assert_eq!(
            agents[0].actions(),
            vec![Action::NOOP, Action::NOOP, Action::NOOP, east()]
        );
        assert_eq!(agents[1].actions(), vec![Action::NOOP, east(), Action::NOOP]);
        assert_no_collisions(&agents);
    }

    #[test]
    fn test_box_and_agent_in_each_others_way() {
        // agent 1 has to cross the cell box A is pushed into, agent 0 has to
        // push A from where agent 1 stands
        let text = "red: 0, A\nblue: 1, B\n++0   +\n+ A  b+\n+1 a+B+\n";
        let mut agents = agents(text);
        let memory = MemoryBudget::with_probe(512, Box::new(FixedMemory(0)));
        let limits = SearchLimits {
            memory: &memory,
            status_interval: 1000,
        };
        for agent in agents.iter_mut() {
            let start = agent.current().clone();
            assert!(agent.search(start, GoalTest::Subgoal, &limits));
        }

        let result = ConflictManager::new(1000).solve_conflicts(&mut agents, &limits);
        assert!(!matches!(result, Err(ConflictError::PassLimit { .. })), "{:?}", result);
        if result.is_ok() {
            assert_no_collisions(&agents);
        }
    }

    #[test]
    fn test_deadlock_keeps_plan_when_blocker_is_elsewhere() {
        // agent 1 has already left the cell for good by time 1
        let text = "red: 0\nblue: 1\n+++++\n+0 1+\n+++++\n";
        let mut agents = agents(text);
        assert!(agents[1].follow(&[Action::move_to(Direction::West)]));
        let conflict = Conflict {
            first: 1,
            second: 0,
            time: 1,
            kind: ConflictKind::Deadlock {
                cell: Position::new(1, 3),
                occupant: Occupant::Agent,
            },
            reason: ConflictReason::Occupation,
        };
        let memory = MemoryBudget::with_probe(512, Box::new(FixedMemory(0)));
        let limits = SearchLimits {
            memory: &memory,
            status_interval: 1000,
        };

        let result = ConflictManager::new(10).resolve(&mut agents, &conflict, &limits);
        assert_eq!(
            result,
            Err(ConflictError::Unresolved {
                first: 1,
                second: 0,
                time: 1
            })
        );
        assert_eq!(agents[1].actions(), vec![Action::move_to(Direction::West)]);
    }

    #[test]
    fn test_conflict_identity_ignores_pair_order() {
        let a = Conflict {
            first: 0,
            second: 1,
            time: 3,
            kind: ConflictKind::NoOpable {
                window: vec![3],
                cell: Position::new(1, 1),
            },
            reason: ConflictReason::Occupation,
        };
        let b = Conflict {
            first: 1,
            second: 0,
            time: 3,
            kind: ConflictKind::NoOpable {
                window: vec![3, 4],
                cell: Position::new(1, 2),
            },
            reason: ConflictReason::Swap,
        };
        assert_eq!(a, b);
        let deadlock = Conflict {
            kind: ConflictKind::Deadlock {
                cell: Position::new(0, 0),
                occupant: Occupant::Agent,
            },
            ..a.clone()
        };
        assert_ne!(a, deadlock);
    }
}
