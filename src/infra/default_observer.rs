use tracing::{debug, info, warn};

use crate::infra::GameObserver;
use crate::planners::{Agent, Outcome};
use crate::state::{Action, WorldState, joint_action_line};

/// Logs every event through `tracing`.
pub struct DefaultObserver;

impl GameObserver for DefaultObserver {
    fn on_level_start(&mut self, world: &WorldState) {
        info!(
            agents = world.agent_count(),
            boxes = world.boxes().len(),
            height = world.walls().height,
            width = world.walls().width,
            "Level started"
        );
        debug!("\n{}", world);
    }

    fn on_plans_updated(&mut self, agents: &[Agent]) {
        for agent in agents {
            debug!(agent = agent.id, length = agent.plan_len(), "Plan");
        }
    }

    fn on_conflicts_resolved(&mut self, resolved: usize) {
        if resolved > 0 {
            info!(resolved, "Conflicts resolved");
        }
    }

    fn on_joint_action(&mut self, step: usize, actions: &[Action], _world: &WorldState) {
        debug!(step, action = %joint_action_line(actions), "Sending");
    }

    fn on_action_result(&mut self, step: usize, actions: &[Action], accepted: bool) {
        if !accepted {
            warn!(step, action = %joint_action_line(actions), "Judge rejected joint action");
        }
    }

    fn on_level_finished(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Solved { steps } => info!(steps, "Found solution of length {}", steps),
            Outcome::NoSolution { steps } => warn!(steps, "Unable to solve level"),
            Outcome::Rejected { steps } => warn!(steps, "Stopped after a rejected action"),
        }
    }
}
