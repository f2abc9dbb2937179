mod default_observer;
pub mod distance;
mod game_observer;
pub mod judge;
pub mod level;
pub mod memory;
mod types;

pub use default_observer::DefaultObserver;
pub use game_observer::GameObserver;
pub use judge::{JudgeConnection, JudgeError};
pub use level::{Level, ParseError};
pub use types::{Direction, Position};
