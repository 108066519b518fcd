//! Real-time event fan-out for the task time tracker.
//!
//! A [`Broadcaster`] is constructed once at process start and handed to
//! whatever needs to publish. Transports register a [`ClientConnection`] per
//! live session, carrying the identity their own authentication established;
//! the connection then joins its user's scope explicitly.

mod broadcast;
mod connection;

pub use broadcast::{Broadcaster, JoinError};
pub use connection::ClientConnection;
