use std::io::{BufRead, Write};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, DistanceKind};
use crate::infra::distance::{DistanceOracle, Manhattan, WallDistances};
use crate::infra::judge::{JudgeConnection, JudgeError};
use crate::infra::level::{Level, ParseError};
use crate::infra::memory::MemoryBudget;
use crate::infra::GameObserver;
use crate::planners::conflict::{ConflictError, ConflictManager};
use crate::planners::planner::{Agent, build_strategy};
use crate::search::SearchLimits;
use crate::state::{Action, State, WorldState};

/// How a run ended. `steps` counts accepted joint actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Solved { steps: usize },
    NoSolution { steps: usize },
    Rejected { steps: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("error parsing level: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Judge(#[from] JudgeError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
}

/// Joint driver: plans agents lacking a plan, repairs conflicts and plays one
/// joint action per step against the judge.
pub struct Game<R: BufRead, W: Write> {
    connection: JudgeConnection<R, W>,
    observer: Box<dyn GameObserver>,
    config: Config,
    memory: MemoryBudget,
}

impl<R: BufRead, W: Write> Game<R, W> {
    pub fn new(connection: JudgeConnection<R, W>, observer: impl GameObserver + 'static, config: Config) -> Self {
        let memory = MemoryBudget::new(config.max_memory_mb);
        Self {
            connection,
            observer: Box::new(observer),
            config,
            memory,
        }
    }

    pub fn with_memory(mut self, memory: MemoryBudget) -> Self {
        self.memory = memory;
        self
    }

    /// Reads the level from the judge and plays it.
    pub fn run(&mut self) -> Result<Outcome, GameError> {
        let text = self.connection.read_level()?;
        let level = Level::parse(&text)?;
        self.play(&level)
    }

    fn create_agents(&self, world: &WorldState) -> Vec<Agent> {
        let oracle: Rc<dyn DistanceOracle> = match self.config.distance {
            DistanceKind::Manhattan => Rc::new(Manhattan),
            DistanceKind::Walls => Rc::new(WallDistances::new(Arc::clone(world.walls()))),
        };
        world
            .split()
            .into_iter()
            .enumerate()
            .map(|(id, view)| {
                let strategy = build_strategy(&self.config, &view, Rc::clone(&oracle));
                Agent::new(id, view, strategy, self.config.seed.wrapping_add(id as u64))
            })
            .collect()
    }

    pub fn play(&mut self, level: &Level) -> Result<Outcome, GameError> {
        let started = Instant::now();
        let mut world = WorldState::from_level(level);
        self.observer.on_level_start(&world);

        let mut agents = self.create_agents(&world);
        let manager = ConflictManager::new(self.config.max_conflict_passes);
        let limits = SearchLimits {
            memory: &self.memory,
            status_interval: self.config.status_interval,
        };

        let mut steps = 0;
        let outcome = loop {
            if world.is_solved() {
                break Outcome::Solved { steps };
            }

            let mut views: Option<Vec<State>> = None;
            let mut replanned = false;
            for agent in agents.iter_mut() {
                if agent.has_plan() {
                    continue;
                }
                let view = views.get_or_insert_with(|| world.split())[agent.id].clone();
                if agent.already_searched(&view) {
                    continue;
                }
                agent.search(view, self.config.goal, &limits);
                replanned = true;
            }
            if replanned {
                self.observer.on_plans_updated(&agents);
                let resolved = manager.solve_conflicts(&mut agents, &limits)?;
                self.observer.on_conflicts_resolved(resolved);
            }

            if agents.iter().all(|agent| !agent.has_plan()) {
                break Outcome::NoSolution { steps };
            }

            let actions: Vec<Action> = agents.iter_mut().map(|agent| agent.act()).collect();
            self.observer.on_joint_action(steps, &actions, &world);
            let accepted = self.connection.act(&actions)?;
            self.observer.on_action_result(steps, &actions, accepted);
            if !accepted {
                break Outcome::Rejected { steps };
            }

            world.apply_joint(&actions);
            steps += 1;
        };

        tracing::info!(
            ?outcome,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Level finished"
        );
        self.observer.on_level_finished(&outcome);
        Ok(outcome)
    }
}
