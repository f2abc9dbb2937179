use std::fmt;
use std::rc::Rc;

use crate::infra::Position;
use crate::infra::distance::DistanceOracle;
use crate::state::{State, letters_match};

/// Scores a state for best-first orderings. Lower is closer to a goal.
pub trait Heuristic {
    fn evaluate(&self, state: &State) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeuristicKind {
    /// Goal distances plus the agent's approach.
    #[default]
    Plain,
    /// Adds the distance between consecutively matched boxes.
    BoxSlack,
    /// Adds the distance from each matched box to the previous goal.
    GoalSlack,
    /// Adds a constant penalty per goal still open.
    Reward,
}

impl fmt::Display for HeuristicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HeuristicKind::Plain => "plain",
            HeuristicKind::BoxSlack => "box-slack",
            HeuristicKind::GoalSlack => "goal-slack",
            HeuristicKind::Reward => "reward",
        };
        f.write_str(name)
    }
}

/// Greedy box-to-goal matching heuristic.
///
/// Goals are visited row-major; each takes the nearest unmatched box of its
/// letter, the first box seen winning ties. A goal without any candidate box
/// costs the grid area.
pub struct GoalDistance {
    kind: HeuristicKind,
    oracle: Rc<dyn DistanceOracle>,
    penalty: u32,
}

struct Matching {
    goal_distance: u32,
    slack: u32,
    open_goals: u32,
    chosen: Vec<bool>,
}

impl GoalDistance {
    pub fn new(kind: HeuristicKind, initial: &State, oracle: Rc<dyn DistanceOracle>) -> Self {
        let mut heuristic = Self {
            kind,
            oracle,
            penalty: 0,
        };
        if kind == HeuristicKind::Reward {
            heuristic.penalty = heuristic.largest_goal_distance(initial);
        }
        tracing::debug!(%kind, penalty = heuristic.penalty, "Heuristic ready");
        heuristic
    }

    fn area(state: &State) -> u32 {
        (state.walls().height.max(0) as u32).saturating_mul(state.walls().width.max(0) as u32)
    }

    fn nearest_box(&self, state: &State, goal: Position, letter: char, chosen: &[bool]) -> (u32, Option<usize>) {
        let mut best = Self::area(state);
        let mut index = None;
        for (b, (pos, box_letter)) in state.boxes().iter().enumerate() {
            if chosen[b] || !letters_match(letter, *box_letter) {
                continue;
            }
            let d = self.oracle.distance(*pos, goal);
            if d < best {
                best = d;
                index = Some(b);
            }
        }
        (best, index)
    }

    /// Penalty unit for `Reward`: the largest nearest-box distance over goals
    /// of the initial state.
    fn largest_goal_distance(&self, initial: &State) -> u32 {
        let mut chosen = vec![false; initial.boxes().len()];
        let mut largest = 0;
        for (goal, letter) in initial.goals() {
            let (d, index) = self.nearest_box(initial, *goal, *letter, &chosen);
            if let Some(b) = index {
                chosen[b] = true;
            }
            largest = largest.max(d);
        }
        largest
    }

    fn match_boxes(&self, state: &State) -> Matching {
        let boxes: Vec<Position> = state.boxes().keys().copied().collect();
        let mut matching = Matching {
            goal_distance: 0,
            slack: 0,
            open_goals: 0,
            chosen: vec![false; boxes.len()],
        };
        let mut previous: Option<(Position, Position)> = None;

        for (goal, letter) in state.goals() {
            let (d, index) = self.nearest_box(state, *goal, *letter, &matching.chosen);
            matching.goal_distance = matching.goal_distance.saturating_add(d);
            if d > 0 {
                matching.open_goals += 1;
            }
            let Some(b) = index else {
                continue;
            };
            matching.chosen[b] = true;

            if let Some((previous_box, previous_goal)) = previous {
                let slack = match self.kind {
                    HeuristicKind::BoxSlack => self.oracle.distance(boxes[b], previous_box),
                    HeuristicKind::GoalSlack => self.oracle.distance(boxes[b], previous_goal),
                    HeuristicKind::Plain | HeuristicKind::Reward => 0,
                };
                matching.slack = matching.slack.saturating_add(slack);
            }
            previous = Some((boxes[b], *goal));
        }
        matching
    }

    /// Closest approach of the agent to a matched box that still has to move.
    fn agent_approach(&self, state: &State, chosen: &[bool]) -> u32 {
        state
            .boxes()
            .keys()
            .enumerate()
            .filter(|(b, pos)| chosen[*b] && !state.goal_done(pos))
            .map(|(_, pos)| self.oracle.distance(*pos, state.agent))
            .filter(|d| *d > 0)
            .min()
            .unwrap_or_else(|| Self::area(state))
    }
}

impl Heuristic for GoalDistance {
    #[tracing::instrument(level = "trace", skip_all)]
    fn evaluate(&self, state: &State) -> u32 {
        let matching = self.match_boxes(state);
        if matching.goal_distance == 0 {
            return 0;
        }
        let approach = self.agent_approach(state, &matching.chosen);
        let reward = match self.kind {
            HeuristicKind::Reward => self.penalty.saturating_mul(matching.open_goals),
            _ => 0,
        };
        matching
            .goal_distance
            .saturating_add(matching.slack)
            .saturating_add(approach)
            .saturating_add(reward)
            .saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::distance::Manhattan;
    use crate::infra::level::Level;
    use crate::infra::Direction;
    use crate::state::{Action, WorldState};

    fn state(text: &str) -> State {
        let world = WorldState::from_level(&Level::parse(text).unwrap());
        world.view_of(0)
    }

    fn plain(state: &State) -> GoalDistance {
        GoalDistance::new(HeuristicKind::Plain, state, Rc::new(Manhattan))
    }

    #[test]
    fn test_zero_in_goal_state() {
        let s = state("++++++\n+0  A+\n++++++\n");
        // no goals
        assert_eq!(plain(&s).evaluate(&s), 0);

        let s = state("+++++\n+0Aa+\n+++++\n");
        let push = Action::push(Direction::East, Direction::East).unwrap();
        let solved = s.child(&push).unwrap();
        assert_eq!(plain(&s).evaluate(&solved), 0);
    }

    #[test]
    fn test_plain_counts_goal_and_approach() {
        // box 2 from goal, agent 2 from box
        let s = state("+++++++\n+0 A a+\n+++++++\n");
        assert_eq!(plain(&s).evaluate(&s), 2 + 2 - 1);
    }

    #[test]
    fn test_nearest_box_wins() {
        // goal at col 3, boxes at col 1 and col 5: the western one is seen first
        let s = state("++++++++\n+A a A0+\n++++++++\n");
        let h = plain(&s);
        // goal 2, approach from agent (col 6) to chosen box at col 1 is 5
        assert_eq!(h.evaluate(&s), 2 + 5 - 1);
    }

    #[test]
    fn test_missing_box_costs_area() {
        let s = state("+++++\n+0 a+\n+++++\n");
        let area = 3 * 5;
        // no box: goal costs the area, approach falls back to the area too
        assert_eq!(plain(&s).evaluate(&s), area + area - 1);
    }

    #[test]
    fn test_box_slack_adds_box_spacing() {
        let s = state("++++++++\n+0A  B +\n+a   b +\n++++++++\n");
        let plain = plain(&s).evaluate(&s);
        let slack = GoalDistance::new(HeuristicKind::BoxSlack, &s, Rc::new(Manhattan)).evaluate(&s);
        // boxes A (1,2) and B (1,5) are three apart
        assert_eq!(slack, plain + 3);
    }

    #[test]
    fn test_goal_slack_adds_box_to_previous_goal() {
        let s = state("++++++++\n+0A  B +\n+a   b +\n++++++++\n");
        let plain = plain(&s).evaluate(&s);
        let slack = GoalDistance::new(HeuristicKind::GoalSlack, &s, Rc::new(Manhattan)).evaluate(&s);
        // box B (1,5) to goal a (2,1)
        assert_eq!(slack, plain + 5);
    }

    #[test]
    fn test_reward_penalises_open_goals() {
        let s = state("+++++++\n+0 A a+\n+++++++\n");
        let reward = GoalDistance::new(HeuristicKind::Reward, &s, Rc::new(Manhattan));
        assert_eq!(reward.penalty, 2);
        assert_eq!(reward.evaluate(&s), plain(&s).evaluate(&s) + 2);
    }
}
