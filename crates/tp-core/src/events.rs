//! Domain events announced after successful mutations.
//!
//! [`EventName`] is the single source of truth for event name strings.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Catalogue of events pushed to live clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TimeStarted,
    TimeStopped,
    StatisticsUpdated,
}

impl EventName {
    pub const ALL: [Self; 6] = [
        Self::TaskCreated,
        Self::TaskUpdated,
        Self::TaskDeleted,
        Self::TimeStarted,
        Self::TimeStopped,
        Self::StatisticsUpdated,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TaskCreated => "task:created",
            Self::TaskUpdated => "task:updated",
            Self::TaskDeleted => "task:deleted",
            Self::TimeStarted => "time:started",
            Self::TimeStopped => "time:stopped",
            Self::StatisticsUpdated => "statistics:updated",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventName {
    type Err = UnknownEventName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownEventName(s.to_string()))
    }
}

impl Serialize for EventName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown event name strings.
#[derive(Debug, Clone)]
pub struct UnknownEventName(String);

impl fmt::Display for UnknownEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event name: {}", self.0)
    }
}

impl std::error::Error for UnknownEventName {}

/// Recipient set for a published event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every live connection joined as this user.
    User(UserId),
    /// Every live connection. Used for deletions.
    Broadcast,
}

/// Capability to announce domain events.
///
/// Publishing is fire-and-forget: implementations must not block the caller,
/// must not retry and must not report delivery failures back.
pub trait Publisher {
    fn publish(&self, event: EventName, payload: &serde_json::Value, scope: &Scope);
}

impl<P: Publisher + ?Sized> Publisher for &P {
    fn publish(&self, event: EventName, payload: &serde_json::Value, scope: &Scope) {
        (**self).publish(event, payload, scope);
    }
}

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    fn publish(&self, event: EventName, payload: &serde_json::Value, scope: &Scope) {
        (**self).publish(event, payload, scope);
    }
}

/// Publisher that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl Publisher for NoopPublisher {
    fn publish(&self, event: EventName, _payload: &serde_json::Value, _scope: &Scope) {
        tracing::trace!(%event, "event dropped by noop publisher");
    }
}
