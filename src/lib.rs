pub mod config;
pub mod infra;
pub mod planners;
pub mod search;
pub mod state;

// Re-export commonly used types for convenience
pub use config::Config;
pub use infra::{Direction, Level, Position};
pub use planners::{Game, Outcome};
pub use state::{Map, State, WorldState};
