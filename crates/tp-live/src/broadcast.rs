//! Event fan-out to connected clients.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tp_core::{EventName, Publisher, Scope, UserId};
use tracing::{debug, warn};

use crate::connection::ClientConnection;

/// Why a connection could not join a user scope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("unknown connection: {connection_id}")]
    UnknownConnection { connection_id: String },

    /// The transport established no identity for this connection.
    #[error("connection {connection_id} is not authenticated")]
    Unauthenticated { connection_id: String },

    /// The claimed user differs from the authenticated one.
    #[error("connection {connection_id} cannot join as {claimed}")]
    IdentityMismatch {
        connection_id: String,
        claimed: UserId,
    },
}

/// Registry of live connections and their joined user scopes.
///
/// Delivery never blocks and never retries: a frame that cannot be queued
/// for a connection is dropped for that connection only.
pub struct Broadcaster {
    /// Connected clients indexed by connection ID.
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection. A connection with the same ID is replaced.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write();
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Remove a connection by ID.
    pub fn remove(&self, connection_id: &str) {
        let mut conns = self.connections.write();
        let _ = conns.remove(connection_id);
    }

    /// Associate a connection with `user_id`'s scope.
    ///
    /// Only succeeds if the transport authenticated the connection as that
    /// same user; a client cannot subscribe to someone else's events by
    /// naming their ID.
    pub fn join(&self, connection_id: &str, user_id: &UserId) -> Result<(), JoinError> {
        let conn = self.get(connection_id)?;
        match conn.authenticated_user() {
            None => {
                warn!(connection_id, claimed = %user_id, "join rejected: unauthenticated");
                Err(JoinError::Unauthenticated {
                    connection_id: connection_id.to_string(),
                })
            }
            Some(authenticated) if authenticated != user_id => {
                warn!(
                    connection_id,
                    claimed = %user_id,
                    %authenticated,
                    "join rejected: identity mismatch"
                );
                Err(JoinError::IdentityMismatch {
                    connection_id: connection_id.to_string(),
                    claimed: user_id.clone(),
                })
            }
            Some(_) => {
                conn.bind(user_id.clone());
                debug!(connection_id, %user_id, "connection joined user scope");
                Ok(())
            }
        }
    }

    /// Leave the joined user scope, keeping the connection registered.
    pub fn leave(&self, connection_id: &str) -> Result<(), JoinError> {
        self.get(connection_id)?.unbind();
        Ok(())
    }

    /// Number of active connections.
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Number of connections joined as `user_id`.
    pub fn user_connection_count(&self, user_id: &UserId) -> usize {
        self.connections
            .read()
            .values()
            .filter(|c| c.is_joined_as(user_id))
            .count()
    }

    fn get(&self, connection_id: &str) -> Result<Arc<ClientConnection>, JoinError> {
        self.connections
            .read()
            .get(connection_id)
            .cloned()
            .ok_or_else(|| JoinError::UnknownConnection {
                connection_id: connection_id.to_string(),
            })
    }

    fn deliver(&self, event: EventName, frame: &Arc<String>, user_id: Option<&UserId>) {
        let conns = self.connections.read();
        let mut recipients = 0;
        for conn in conns.values() {
            if user_id.is_some_and(|u| !conn.is_joined_as(u)) {
                continue;
            }
            recipients += 1;
            if !conn.send(Arc::clone(frame)) {
                warn!(conn_id = %conn.id, %event, "failed to send event to client");
            }
        }
        debug!(%event, user_id = ?user_id.map(UserId::as_str), recipients, "event fanned out");
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for Broadcaster {
    fn publish(&self, event: EventName, payload: &serde_json::Value, scope: &Scope) {
        let frame = serde_json::json!({ "event": event, "data": payload });
        let frame = Arc::new(frame.to_string());
        match scope {
            Scope::User(user_id) => self.deliver(event, &frame, Some(user_id)),
            Scope::Broadcast => self.deliver(event, &frame, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn make_connection_with_rx(
        id: &str,
        authenticated: Option<&str>,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        let conn = ClientConnection::new(id, authenticated.map(user), tx);
        (Arc::new(conn), rx)
    }

    fn joined(bc: &Broadcaster, id: &str, as_user: &str) -> mpsc::Receiver<Arc<String>> {
        let (conn, rx) = make_connection_with_rx(id, Some(as_user));
        bc.add(conn);
        bc.join(id, &user(as_user)).unwrap();
        rx
    }

    fn payload() -> serde_json::Value {
        serde_json::json!({ "task_id": "t1" })
    }

    #[test]
    fn add_and_remove_connection() {
        let bc = Broadcaster::new();
        let (conn, _rx) = make_connection_with_rx("c1", None);
        bc.add(conn);
        assert_eq!(bc.connection_count(), 1);
        bc.remove("c1");
        bc.remove("no_such");
        assert_eq!(bc.connection_count(), 0);
    }

    #[test]
    fn user_scope_reaches_only_that_users_connections() {
        let bc = Broadcaster::new();
        let mut rx1 = joined(&bc, "c1", "alice");
        let mut rx2 = joined(&bc, "c2", "bob");
        let mut rx3 = joined(&bc, "c3", "alice");

        bc.publish(EventName::TimeStarted, &payload(), &Scope::User(user("alice")));

        assert!(rx1.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn broadcast_scope_reaches_everyone() {
        let bc = Broadcaster::new();
        let mut rx1 = joined(&bc, "c1", "alice");
        let (unjoined, mut rx2) = make_connection_with_rx("c2", None);
        bc.add(unjoined);

        bc.publish(EventName::TaskDeleted, &payload(), &Scope::Broadcast);

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn unjoined_connections_miss_user_events() {
        let bc = Broadcaster::new();
        let (conn, mut rx) = make_connection_with_rx("c1", Some("alice"));
        bc.add(conn);

        bc.publish(EventName::TimeStopped, &payload(), &Scope::User(user("alice")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publish_with_no_connections_is_silent() {
        let bc = Broadcaster::default();
        bc.publish(EventName::StatisticsUpdated, &payload(), &Scope::User(user("alice")));
        bc.publish(EventName::TaskDeleted, &payload(), &Scope::Broadcast);
        assert_eq!(bc.connection_count(), 0);
    }

    #[test]
    fn frame_carries_event_name_and_payload() {
        let bc = Broadcaster::new();
        let mut rx = joined(&bc, "c1", "alice");
        bc.publish(EventName::TimeStarted, &payload(), &Scope::User(user("alice")));

        let msg = rx.try_recv().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["event"], "time:started");
        assert_eq!(parsed["data"]["task_id"], "t1");
    }

    #[test]
    fn join_requires_matching_identity() {
        let bc = Broadcaster::new();
        let (conn, _rx) = make_connection_with_rx("c1", Some("alice"));
        bc.add(conn);

        let err = bc.join("c1", &user("bob")).unwrap_err();
        assert!(matches!(err, JoinError::IdentityMismatch { .. }));
        assert_eq!(bc.user_connection_count(&user("bob")), 0);

        bc.join("c1", &user("alice")).unwrap();
        assert_eq!(bc.user_connection_count(&user("alice")), 1);
    }

    #[test]
    fn join_rejects_unauthenticated_and_unknown() {
        let bc = Broadcaster::new();
        let (conn, _rx) = make_connection_with_rx("anon", None);
        bc.add(conn);

        assert!(matches!(
            bc.join("anon", &user("alice")),
            Err(JoinError::Unauthenticated { .. })
        ));
        assert!(matches!(
            bc.join("ghost", &user("alice")),
            Err(JoinError::UnknownConnection { .. })
        ));
    }

    #[test]
    fn leave_stops_user_delivery() {
        let bc = Broadcaster::new();
        let mut rx = joined(&bc, "c1", "alice");
        bc.leave("c1").unwrap();

        bc.publish(EventName::TimeStarted, &payload(), &Scope::User(user("alice")));
        assert!(rx.try_recv().is_err());
        assert_eq!(bc.connection_count(), 1);
    }

    #[test]
    fn slow_consumer_does_not_block_others() {
        let bc = Broadcaster::new();
        let (tx, _slow_rx) = mpsc::channel(1);
        let slow = Arc::new(ClientConnection::new("slow", Some(user("alice")), tx));
        bc.add(Arc::clone(&slow));
        bc.join("slow", &user("alice")).unwrap();
        let mut fast = joined(&bc, "fast", "alice");

        for _ in 0..3 {
            bc.publish(EventName::TimeStarted, &payload(), &Scope::User(user("alice")));
        }

        assert_eq!(slow.drop_count(), 2);
        let mut received = 0;
        while fast.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 3);
    }
}
