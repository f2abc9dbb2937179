use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::infra::Position;
use crate::state::action::{ALL_ACTIONS, Action, ActionKind};
use crate::state::map::Map;

/// Cell -> box letter (uppercase).
pub type BoxMap = BTreeMap<Position, char>;
/// Cell -> goal letter (lowercase).
pub type GoalMap = BTreeMap<Position, char>;

pub fn letters_match(goal: char, box_letter: char) -> bool {
    goal.eq_ignore_ascii_case(&box_letter)
}

/// Single-agent planning view of a level.
///
/// Box, goal and wall maps sit behind `Arc`s so children share whatever they
/// do not change; a map is only copied when a push or pull moves a box. Two
/// states are equal when agent, boxes, goals and walls match; `g` and the
/// producing action are path data and take no part in equality or hashing.
#[derive(Clone)]
pub struct State {
    pub agent: Position,
    boxes: Arc<BoxMap>,
    goals: Arc<GoalMap>,
    walls: Arc<Map>,
    pub g: u32,
    pub action: Option<Action>,
    hash: u64,
}

impl State {
    pub fn new(agent: Position, boxes: BoxMap, goals: GoalMap, walls: Arc<Map>) -> Self {
        Self::from_parts(agent, Arc::new(boxes), Arc::new(goals), walls, 0, None)
    }

    /// Like `new`, for views that share one goal map.
    pub fn from_shared(agent: Position, boxes: BoxMap, goals: Arc<GoalMap>, walls: Arc<Map>) -> Self {
        Self::from_parts(agent, Arc::new(boxes), goals, walls, 0, None)
    }

    fn from_parts(
        agent: Position,
        boxes: Arc<BoxMap>,
        goals: Arc<GoalMap>,
        walls: Arc<Map>,
        g: u32,
        action: Option<Action>,
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        agent.hash(&mut hasher);
        boxes.hash(&mut hasher);
        goals.hash(&mut hasher);
        walls.hash(&mut hasher);
        Self {
            agent,
            boxes,
            goals,
            walls,
            g,
            action,
            hash: hasher.finish(),
        }
    }

    fn successor(&self, agent: Position, boxes: Arc<BoxMap>, action: Action) -> Self {
        Self::from_parts(
            agent,
            boxes,
            Arc::clone(&self.goals),
            Arc::clone(&self.walls),
            self.g + 1,
            Some(action),
        )
    }

    pub fn boxes(&self) -> &BoxMap {
        &self.boxes
    }

    pub fn goals(&self) -> &GoalMap {
        &self.goals
    }

    pub fn walls(&self) -> &Arc<Map> {
        &self.walls
    }

    pub fn box_at(&self, pos: &Position) -> Option<char> {
        self.boxes.get(pos).copied()
    }

    pub fn is_free(&self, pos: &Position) -> bool {
        !self.walls.is_wall(pos) && !self.boxes.contains_key(pos)
    }

    pub fn goal_done(&self, pos: &Position) -> bool {
        match (self.goals.get(pos), self.boxes.get(pos)) {
            (Some(&goal), Some(&letter)) => letters_match(goal, letter),
            _ => false,
        }
    }

    /// Applies `action`, or returns `None` when it is not applicable here.
    pub fn child(&self, action: &Action) -> Option<State> {
        let Some(agent_dir) = action.agent_dir else {
            return Some(self.successor(self.agent, Arc::clone(&self.boxes), *action));
        };
        let target = self.agent.step(agent_dir);

        match action.kind {
            ActionKind::NoOp => Some(self.successor(self.agent, Arc::clone(&self.boxes), *action)),
            ActionKind::Move => self
                .is_free(&target)
                .then(|| self.successor(target, Arc::clone(&self.boxes), *action)),
            ActionKind::Push => {
                let box_dir = action.box_dir?;
                let letter = self.box_at(&target)?;
                let box_target = target.step(box_dir);
                if !self.is_free(&box_target) {
                    return None;
                }
                let mut boxes = Arc::clone(&self.boxes);
                let moved = Arc::make_mut(&mut boxes);
                moved.remove(&target);
                moved.insert(box_target, letter);
                Some(self.successor(target, boxes, *action))
            }
            ActionKind::Pull => {
                let box_dir = action.box_dir?;
                if !self.is_free(&target) {
                    return None;
                }
                let box_source = self.agent.step(box_dir);
                let letter = self.box_at(&box_source)?;
                let mut boxes = Arc::clone(&self.boxes);
                let moved = Arc::make_mut(&mut boxes);
                moved.remove(&box_source);
                moved.insert(self.agent, letter);
                Some(self.successor(target, boxes, *action))
            }
        }
    }

    /// Same configuration one time step later, produced by a `NoOp`.
    pub fn noop_successor(&self) -> State {
        self.successor(self.agent, Arc::clone(&self.boxes), Action::NOOP)
    }

    /// Every goal cell holds a box of its letter. Cells without a goal are
    /// unconstrained.
    pub fn is_subgoal_state(&self) -> bool {
        self.goals.keys().all(|pos| self.goal_done(pos))
    }

    /// Subgoal state where additionally every box rests on a goal of its letter.
    pub fn is_goal_state(&self) -> bool {
        self.is_subgoal_state() && self.boxes.keys().all(|pos| self.goal_done(pos))
    }

    /// Every box rests on a matching goal and the agent itself stands on a goal
    /// cell. Used when an agent has to clear out of another agent's way.
    pub fn is_parked(&self) -> bool {
        self.boxes.keys().all(|pos| self.goal_done(pos)) && self.goals.contains_key(&self.agent)
    }

    /// Moves this configuration into the goals and walls of `view`, keeping
    /// agent, boxes, `g` and action. `extra_boxes` are merged in.
    pub fn rebased(&self, view: &State, extra_boxes: &BoxMap) -> State {
        let boxes = if extra_boxes.is_empty() {
            Arc::clone(&self.boxes)
        } else {
            let mut merged = extra_boxes.clone();
            merged.extend(self.boxes.iter().map(|(pos, letter)| (*pos, *letter)));
            Arc::new(merged)
        };
        Self::from_parts(
            self.agent,
            boxes,
            Arc::clone(&view.goals),
            Arc::clone(&view.walls),
            self.g,
            self.action,
        )
    }

    /// Copy with its path data reset, used as the root of a new search.
    pub fn as_root(&self) -> State {
        let mut root = self.clone();
        root.g = 0;
        root.action = None;
        root
    }

    pub(crate) fn with_g(mut self, g: u32) -> State {
        self.g = g;
        self
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        if self.hash != other.hash || self.agent != other.agent {
            return false;
        }
        (Arc::ptr_eq(&self.boxes, &other.boxes) || self.boxes == other.boxes)
            && (Arc::ptr_eq(&self.goals, &other.goals) || self.goals == other.goals)
            && (Arc::ptr_eq(&self.walls, &other.walls) || self.walls == other.walls)
    }
}

impl Eq for State {}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("agent", &self.agent)
            .field("boxes", &self.boxes)
            .field("g", &self.g)
            .field("action", &self.action.map(|a| a.to_string()))
            .finish()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.walls.height {
            let line: String = (0..self.walls.width)
                .map(|col| {
                    let pos = Position::new(row, col);
                    if let Some(letter) = self.box_at(&pos) {
                        letter
                    } else if pos == self.agent {
                        '0'
                    } else if let Some(&goal) = self.goals.get(&pos) {
                        goal
                    } else if self.walls.is_wall(&pos) {
                        '+'
                    } else {
                        ' '
                    }
                })
                .collect();
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

/// Child generation with an explicitly seeded shuffle, so exploration order is
/// reproducible per planner and independent of any other planner.
pub struct Transitions {
    rng: StdRng,
}

impl Transitions {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[tracing::instrument(level = "trace", skip_all)]
    pub fn children(&mut self, state: &State) -> Vec<State> {
        let mut children: Vec<State> = ALL_ACTIONS
            .iter()
            .filter_map(|action| state.child(action))
            .collect();
        children.shuffle(&mut self.rng);
        children
    }
}
