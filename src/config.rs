use std::env;
use std::str::FromStr;

use crate::search::{GoalTest, HeuristicKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}: unknown value {value:?}")]
    UnknownValue { key: &'static str, value: String },
    #[error("{key}: {value:?} is not a valid number")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyName {
    #[default]
    Bfs,
    Dfs,
    AStar,
    WeightedAStar,
    Greedy,
}

impl FromStr for StrategyName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bfs" => Ok(StrategyName::Bfs),
            "dfs" => Ok(StrategyName::Dfs),
            "astar" => Ok(StrategyName::AStar),
            "wastar" => Ok(StrategyName::WeightedAStar),
            "greedy" => Ok(StrategyName::Greedy),
            _ => Err(()),
        }
    }
}

impl FromStr for HeuristicKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(HeuristicKind::Plain),
            "box-slack" => Ok(HeuristicKind::BoxSlack),
            "goal-slack" => Ok(HeuristicKind::GoalSlack),
            "reward" => Ok(HeuristicKind::Reward),
            _ => Err(()),
        }
    }
}

/// Only the terminal conditions an agent may plan for; parking is internal.
impl FromStr for GoalTest {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "subgoal" => Ok(GoalTest::Subgoal),
            "full" => Ok(GoalTest::Full),
            _ => Err(()),
        }
    }
}

/// Which distance oracle the heuristics query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceKind {
    #[default]
    Manhattan,
    Walls,
}

impl FromStr for DistanceKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manhattan" => Ok(DistanceKind::Manhattan),
            "walls" => Ok(DistanceKind::Walls),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub strategy: StrategyName,
    pub weight: u32,
    pub heuristic: HeuristicKind,
    pub distance: DistanceKind,
    pub goal: GoalTest,
    pub max_memory_mb: u64,
    pub seed: u64,
    pub status_interval: usize,
    pub max_conflict_passes: usize,
    pub debug: bool,
    pub replays_folder: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: StrategyName::Bfs,
            weight: 5,
            heuristic: HeuristicKind::Plain,
            distance: DistanceKind::Manhattan,
            goal: GoalTest::Subgoal,
            max_memory_mb: 512,
            seed: 2,
            status_interval: 1000,
            max_conflict_passes: 1000,
            debug: false,
            replays_folder: None,
        }
    }
}

fn get_named<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::UnknownValue { key, value }),
        None => Ok(default),
    }
}

fn get_number<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(default),
    }
}

impl Config {
    /// Reads `SOKOBOT_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        Ok(Config {
            strategy: get_named(&lookup, "SOKOBOT_STRATEGY", defaults.strategy)?,
            weight: get_number(&lookup, "SOKOBOT_WEIGHT", defaults.weight)?,
            heuristic: get_named(&lookup, "SOKOBOT_HEURISTIC", defaults.heuristic)?,
            distance: get_named(&lookup, "SOKOBOT_DISTANCE", defaults.distance)?,
            goal: get_named(&lookup, "SOKOBOT_GOAL", defaults.goal)?,
            max_memory_mb: get_number(&lookup, "SOKOBOT_MAX_MEMORY_MB", defaults.max_memory_mb)?,
            seed: get_number(&lookup, "SOKOBOT_SEED", defaults.seed)?,
            status_interval: get_number(&lookup, "SOKOBOT_STATUS_INTERVAL", defaults.status_interval)?,
            max_conflict_passes: get_number(
                &lookup,
                "SOKOBOT_MAX_CONFLICT_PASSES",
                defaults.max_conflict_passes,
            )?,
            debug: get_named(&lookup, "SOKOBOT_DEBUG", defaults.debug)?,
            replays_folder: lookup("SOKOBOT_REPLAYS_FOLDER").filter(|folder| !folder.is_empty()),
        })
    }
}
