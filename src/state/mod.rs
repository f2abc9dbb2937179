mod action;
mod map;
#[allow(clippy::module_inception)]
mod state;
mod world_state;

pub use action::{ALL_ACTIONS, Action, ActionKind, joint_action_line};
pub use map::Map;
pub use state::{BoxMap, GoalMap, State, Transitions, letters_match};
pub use world_state::WorldState;
