//! Exploration engine for botmap: rate control, response collection and the
//! depth-first traversal/restore loop over a black-box conversational bot.

pub mod collector;
pub mod discover;
pub mod explorer;
pub mod mock;
pub mod rate;

pub use collector::ResponseCollector;
pub use discover::NodeFactory;
pub use explorer::{EnginePhase, Explorer, ResetHook};
pub use rate::RateController;
