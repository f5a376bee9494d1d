//! Wire protocol

mod messages;

pub use messages::{ClientMessage, ServerMessage};
