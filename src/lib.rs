#![warn(clippy::all)]
#![deny(rust_2018_idioms)]

pub mod ai;
pub mod board;
pub mod coords;
pub mod errors;
pub mod game;
pub mod journal;
pub mod messages;
pub mod room;
pub mod scenario;
pub mod store;
pub mod types;

pub use board::{Graph, MapDefinition};
pub use errors::EngineError;
pub use game::{Game, TimerValues};
pub use messages::Message;
pub use room::{ClientCommand, Room};
pub use store::{MemoryStore, Store};
pub use types::{GameMode, GameSettings};
