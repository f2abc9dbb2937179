mod conflict;
mod game;
mod planner;

pub use conflict::{Conflict, ConflictError, ConflictKind, ConflictManager, ConflictReason, Occupant};
pub use game::{Game, GameError, Outcome};
pub use planner::{Agent, build_strategy};
