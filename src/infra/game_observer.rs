use crate::planners::{Agent, Outcome};
use crate::state::{Action, WorldState};

/// Trait for observing solver events during a run
pub trait GameObserver {
    /// Called once the level is parsed
    fn on_level_start(&mut self, world: &WorldState);

    /// Called after agents were (re)planned
    fn on_plans_updated(&mut self, _agents: &[Agent]) {
        // Default implementation does nothing
    }

    /// Called after a round of conflict resolution
    fn on_conflicts_resolved(&mut self, _resolved: usize) {
        // Default implementation does nothing
    }

    /// Called when a joint action is about to be sent
    fn on_joint_action(&mut self, step: usize, actions: &[Action], world: &WorldState);

    /// Called with the judge's verdict on a joint action
    fn on_action_result(&mut self, step: usize, actions: &[Action], accepted: bool);

    /// Called when the run ends
    fn on_level_finished(&mut self, outcome: &Outcome);
}
