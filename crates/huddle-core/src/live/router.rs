//! Presence router: process-wide map from user id to live connections.
//!
//! Each registered connection gets a bounded `mpsc` queue. Broadcasting is
//! fire-and-forget: offline users miss the event, a full queue drops it with
//! a warning, and nothing is retried. Connections found closed during a
//! broadcast are pruned.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use huddle_types::event::LiveEvent;
use huddle_types::user::UserId;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default outbound queue size per connection.
pub const DEFAULT_CONNECTION_CAPACITY: usize = 256;

/// Identifies one live connection within the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handle returned by [`PresenceRouter::register`].
///
/// The socket task drains `receiver` and must call
/// [`PresenceRouter::unregister`] with `id` when the socket closes.
#[derive(Debug)]
pub struct LiveConnection {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub receiver: mpsc::Receiver<LiveEvent>,
}

pub struct PresenceRouter {
    connections: DashMap<UserId, Vec<(ConnectionId, mpsc::Sender<LiveEvent>)>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl PresenceRouter {
    pub fn new(capacity: usize) -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Register a new connection for `user_id`. A user may hold many.
    pub fn register(&self, user_id: UserId) -> LiveConnection {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.capacity);
        self.connections.entry(user_id).or_default().push((id, tx));
        debug!(%user_id, connection = %id, "registered live connection");
        LiveConnection {
            id,
            user_id,
            receiver: rx,
        }
    }

    /// Remove one connection. Returns `true` if it was registered.
    pub fn unregister(&self, user_id: &UserId, id: ConnectionId) -> bool {
        let mut removed = false;
        if let Some(mut entry) = self.connections.get_mut(user_id) {
            let before = entry.len();
            entry.retain(|(conn, _)| *conn != id);
            removed = entry.len() != before;
        }
        self.connections
            .remove_if(user_id, |_, conns| conns.is_empty());
        if removed {
            debug!(%user_id, connection = %id, "unregistered live connection");
        }
        removed
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.connections
            .get(user_id)
            .is_some_and(|conns| !conns.is_empty())
    }

    /// Total live connections across all users.
    pub fn connection_count(&self) -> usize {
        self.connections.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.connections.iter().map(|e| *e.key()).collect();
        users.sort();
        users
    }

    /// Deliver `event` to every live connection of every listed user.
    ///
    /// Duplicate targets are delivered once. Returns how many connections
    /// accepted the event.
    pub fn broadcast(&self, targets: &[UserId], event: &LiveEvent) -> usize {
        let mut targets = targets.to_vec();
        targets.sort();
        targets.dedup();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for user_id in &targets {
            let Some(conns) = self.connections.get(user_id) else {
                continue;
            };
            for (id, sender) in conns.iter() {
                match sender.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(
                            %user_id,
                            connection = %id,
                            event = event.name(),
                            "live queue full, dropping event"
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!(%user_id, connection = %id, "live queue closed");
                        closed.push((*user_id, *id));
                    }
                }
            }
        }

        // Map guards are released above; unregister takes a write lock.
        for (user_id, id) in closed {
            self.unregister(&user_id, id);
        }
        delivered
    }
}

impl Default for PresenceRouter {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECTION_CAPACITY)
    }
}

impl std::fmt::Debug for PresenceRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceRouter")
            .field("users", &self.connections.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
