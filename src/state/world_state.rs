use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::infra::Position;
use crate::infra::level::Level;
use crate::state::action::Action;
use crate::state::map::Map;
use crate::state::state::{BoxMap, GoalMap, State, letters_match};

/// Global view of a level as the judge sees it: every agent, every box.
///
/// Boxes nobody may move are folded into the wall grid once, so every agent
/// view treats them as static obstacles.
#[derive(Clone, Debug)]
pub struct WorldState {
    pub agents: Vec<Position>,
    boxes: BoxMap,
    goals: GoalMap,
    walls: Arc<Map>,
    box_owner: BTreeMap<char, usize>,
    agent_goals: Vec<Arc<GoalMap>>,
}

impl WorldState {
    pub fn from_level(level: &Level) -> Self {
        let (owned, unowned): (BoxMap, BoxMap) = level
            .boxes
            .iter()
            .map(|(pos, letter)| (*pos, *letter))
            .partition(|(_, letter)| level.box_owner.contains_key(letter));

        if !unowned.is_empty() {
            tracing::debug!(count = unowned.len(), "Boxes without an owner treated as walls");
        }
        let walls = Arc::new(level.walls.with_extra_walls(unowned.keys().copied()));

        let agent_goals = (0..level.agents.len())
            .map(|id| {
                let goals: GoalMap = level
                    .goals
                    .iter()
                    .filter(|(_, goal)| level.box_owner.get(&goal.to_ascii_uppercase()) == Some(&id))
                    .map(|(pos, goal)| (*pos, *goal))
                    .collect();
                Arc::new(goals)
            })
            .collect();

        for (pos, goal) in &level.goals {
            if !level.box_owner.contains_key(&goal.to_ascii_uppercase()) {
                tracing::warn!(%pos, goal = %goal, "Goal has no agent able to satisfy it");
            }
        }

        Self {
            agents: level.agents.clone(),
            boxes: owned,
            goals: level.goals.clone(),
            walls,
            box_owner: level.box_owner.clone(),
            agent_goals,
        }
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn boxes(&self) -> &BoxMap {
        &self.boxes
    }

    pub fn walls(&self) -> &Arc<Map> {
        &self.walls
    }

    pub fn owner_of(&self, letter: char) -> Option<usize> {
        self.box_owner.get(&letter.to_ascii_uppercase()).copied()
    }

    fn boxes_of(&self, agent: usize) -> BoxMap {
        self.boxes
            .iter()
            .filter(|(_, letter)| self.owner_of(**letter) == Some(agent))
            .map(|(pos, letter)| (*pos, *letter))
            .collect()
    }

    /// Planning view of one agent: its own boxes and the goals of its letters.
    pub fn view_of(&self, agent: usize) -> State {
        let goals = self
            .agent_goals
            .get(agent)
            .cloned()
            .unwrap_or_default();
        State::from_shared(
            self.agents[agent],
            self.boxes_of(agent),
            goals,
            Arc::clone(&self.walls),
        )
    }

    /// One planning view per agent, in id order.
    pub fn split(&self) -> Vec<State> {
        (0..self.agents.len()).map(|id| self.view_of(id)).collect()
    }

    /// Advances the world by a joint action the judge accepted. Agents are
    /// applied in id order; an action our model cannot apply leaves that agent
    /// where it is.
    pub fn apply_joint(&mut self, actions: &[Action]) {
        for (id, action) in actions.iter().enumerate() {
            if action.is_noop() || id >= self.agents.len() {
                continue;
            }
            let single = State::new(
                self.agents[id],
                self.boxes.clone(),
                GoalMap::new(),
                Arc::clone(&self.walls),
            );
            match single.child(action) {
                Some(next) => {
                    self.agents[id] = next.agent;
                    self.boxes = next.boxes().clone();
                }
                None => {
                    tracing::warn!(agent = id, action = %action, "Accepted action not applicable locally");
                }
            }
        }
    }

    /// Every goal cell holds a box of its letter.
    pub fn is_solved(&self) -> bool {
        self.goals.iter().all(|(pos, goal)| {
            self.boxes
                .get(pos)
                .is_some_and(|letter| letters_match(*goal, *letter))
        })
    }
}

impl fmt::Display for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.walls.height {
            let line: String = (0..self.walls.width)
                .map(|col| {
                    let pos = Position::new(row, col);
                    if let Some(letter) = self.boxes.get(&pos) {
                        *letter
                    } else if let Some(id) = self.agents.iter().position(|a| *a == pos) {
                        char::from_digit(id as u32, 10).unwrap_or('?')
                    } else if let Some(goal) = self.goals.get(&pos) {
                        *goal
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Direction;

    fn world(text: &str) -> WorldState {
        WorldState::from_level(&Level::parse(text).unwrap())
    }

    #[test]
    fn test_split_gives_each_agent_its_own_boxes() {
        let world = world("red: 0, A\nblue: 1, B\n+++++++\n+0A 1B+\n+a   b+\n+++++++\n");
        let views = world.split();
        assert_eq!(views.len(), 2);

        assert_eq!(views[0].agent, Position::new(1, 1));
        assert_eq!(views[0].box_at(&Position::new(1, 2)), Some('A'));
        assert_eq!(views[0].box_at(&Position::new(1, 5)), None);
        assert_eq!(views[0].goals().len(), 1);

        assert_eq!(views[1].box_at(&Position::new(1, 5)), Some('B'));
        assert_eq!(views[1].goals().get(&Position::new(2, 5)), Some(&'b'));
    }

    #[test]
    fn test_unowned_boxes_become_walls() {
        let world = world("red: 0, A\ngreen: C\n+++++\n+0AC+\n+++++\n");
        assert!(world.walls().is_wall(&Position::new(1, 3)));
        assert!(world.boxes().get(&Position::new(1, 3)).is_none());
        assert_eq!(world.owner_of('c'), None);
        assert_eq!(world.owner_of('a'), Some(0));
    }

    #[test]
    fn test_apply_joint_moves_agents_and_boxes() {
        let mut world = world("red: 0, A\nblue: 1\n++++++\n+0A  +\n+   1+\n++++++\n");
        let push = Action::push(Direction::East, Direction::East).unwrap();
        world.apply_joint(&[push, Action::move_to(Direction::West)]);

        assert_eq!(world.agents, vec![Position::new(1, 2), Position::new(2, 3)]);
        assert_eq!(world.boxes().get(&Position::new(1, 3)), Some(&'A'));
    }

    #[test]
    fn test_is_solved() {
        let mut world = world("+++++\n+0Aa+\n+++++\n");
        assert!(!world.is_solved());
        world.apply_joint(&[Action::push(Direction::East, Direction::East).unwrap()]);
        assert!(world.is_solved());
        assert_eq!(world.to_string().lines().nth(1), Some("+ 0A+"));
    }
}
