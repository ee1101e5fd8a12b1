//! Subscription registry and status broadcaster.
//!
//! Every subscriber connection owns a bounded outbox (`mpsc`) drained by
//! its session. Publishing snapshots the topic's subscribers under the
//! read lock, then sends outside of it with a per-connection timeout;
//! connections that fail are disconnected once the pass is over.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::{RwLock, mpsc};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::messages::{ClientMessage, ServerMessage, StatusUpdate};
use super::topics::Topic;
use crate::error::BroadcastError;
use crate::monitoring::types::HealthStatus;

/// Default bound on a single send during a publish pass
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of messages buffered per connection
pub const DEFAULT_OUTBOX_CAPACITY: usize = 64;

/// Handle of a live subscriber connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

struct Connection {
    outbox: mpsc::Sender<ServerMessage>,
    topics: HashSet<Topic>,
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, Connection>,
    topics: HashMap<Topic, HashSet<ConnectionId>>,
}

impl RegistryState {
    fn remove_from_topic(&mut self, topic: &Topic, id: ConnectionId) {
        if let Some(members) = self.topics.get_mut(topic) {
            members.remove(&id);
            if members.is_empty() {
                self.topics.remove(topic);
            }
        }
    }
}

/// Tracks subscriber connections and fans status updates out to them
pub struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
    next_id: AtomicU64,
    send_timeout: Duration,
    outbox_capacity: usize,
}

impl SubscriptionRegistry {
    pub fn new(send_timeout: Duration, outbox_capacity: usize) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            next_id: AtomicU64::new(1),
            send_timeout,
            outbox_capacity: outbox_capacity.max(1),
        }
    }

    /// Register a new connection with no subscriptions.
    ///
    /// The receiver is the connection's outbox; dropping it makes the
    /// next delivery fail, which disconnects the connection.
    pub async fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (outbox, inbox) = mpsc::channel(self.outbox_capacity);

        let mut state = self.state.write().await;
        state.connections.insert(id, Connection { outbox, topics: HashSet::new() });
        info!(connection = %id, total_connections = state.connections.len(), "Subscriber connected");

        (id, inbox)
    }

    /// Remove a connection from every topic it joined. Idempotent.
    pub async fn disconnect(&self, id: ConnectionId) -> bool {
        let mut state = self.state.write().await;
        let Some(connection) = state.connections.remove(&id) else {
            return false;
        };

        for topic in &connection.topics {
            state.remove_from_topic(topic, id);
        }

        info!(connection = %id, total_connections = state.connections.len(), "Subscriber disconnected");
        true
    }

    /// Join a topic. Returns `false` for an unknown connection.
    pub async fn subscribe(&self, id: ConnectionId, topic: Topic) -> bool {
        let mut state = self.state.write().await;
        let Some(connection) = state.connections.get_mut(&id) else {
            return false;
        };

        if connection.topics.insert(topic) {
            state.topics.entry(topic).or_default().insert(id);
            info!(connection = %id, %topic, "Subscribed");
        }
        true
    }

    /// Leave a topic, pruning it when it becomes empty.
    pub async fn unsubscribe(&self, id: ConnectionId, topic: Topic) -> bool {
        let mut state = self.state.write().await;
        let Some(connection) = state.connections.get_mut(&id) else {
            return false;
        };

        if connection.topics.remove(&topic) {
            state.remove_from_topic(&topic, id);
            debug!(connection = %id, %topic, "Unsubscribed");
        }
        true
    }

    /// Deliver `message` to every subscriber of `topic`; returns how many
    /// accepted it. Failures never reach the caller.
    pub async fn publish(&self, topic: Topic, message: &ServerMessage) -> usize {
        let targets: Vec<(ConnectionId, mpsc::Sender<ServerMessage>)> = {
            let state = self.state.read().await;
            let Some(members) = state.topics.get(&topic) else {
                return 0;
            };
            members
                .iter()
                .filter_map(|id| state.connections.get(id).map(|c| (*id, c.outbox.clone())))
                .collect()
        };

        let results = join_all(targets.iter().map(|(id, outbox)| async move {
            (*id, self.deliver(outbox, message.clone()).await)
        }))
        .await;

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, result) in results {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(connection = %id, %topic, error = %e, "Dropping subscriber after failed send");
                    failed.push(id);
                }
            }
        }

        for id in failed {
            self.disconnect(id).await;
        }

        delivered
    }

    /// Publish one `status_update` to both the service and the environment
    /// topic. A connection subscribed to both receives it twice.
    pub async fn publish_status_update(
        &self,
        service_id: Uuid,
        environment_id: Uuid,
        status: HealthStatus,
        response_time_ms: u64,
        timestamp: DateTime<Utc>,
    ) -> usize {
        let message = ServerMessage::StatusUpdate(StatusUpdate {
            service_id,
            environment_id,
            status,
            response_time_ms,
            timestamp,
        });

        self.publish(Topic::Service(service_id), &message).await
            + self.publish(Topic::Environment(environment_id), &message).await
    }

    /// Direct reply to one connection; a failure disconnects it.
    pub async fn send_to(&self, id: ConnectionId, message: ServerMessage) -> Result<(), BroadcastError> {
        let outbox = {
            let state = self.state.read().await;
            state.connections.get(&id).map(|c| c.outbox.clone())
        };
        let Some(outbox) = outbox else {
            return Err(BroadcastError::SendFailed);
        };

        let result = self.deliver(&outbox, message).await;
        if result.is_err() {
            self.disconnect(id).await;
        }
        result
    }

    /// Apply one protocol message and return the replies owed to the sender
    pub async fn handle_client_message(&self, id: ConnectionId, message: ClientMessage) -> Vec<ServerMessage> {
        match message {
            ClientMessage::Subscribe { service_id, environment_id } => {
                let mut replies = Vec::new();
                if let Some(service_id) = service_id {
                    if self.subscribe(id, Topic::Service(service_id)).await {
                        replies.push(ServerMessage::subscribed_service(service_id));
                    }
                }
                if let Some(environment_id) = environment_id {
                    if self.subscribe(id, Topic::Environment(environment_id)).await {
                        replies.push(ServerMessage::subscribed_environment(environment_id));
                    }
                }
                replies
            }
            ClientMessage::Unsubscribe { service_id, environment_id } => {
                if let Some(service_id) = service_id {
                    self.unsubscribe(id, Topic::Service(service_id)).await;
                }
                if let Some(environment_id) = environment_id {
                    self.unsubscribe(id, Topic::Environment(environment_id)).await;
                }
                Vec::new()
            }
            ClientMessage::Ping => vec![ServerMessage::Pong],
        }
    }

    /// Drop every connection; their sessions see a closed outbox.
    pub async fn close_all(&self) -> usize {
        let mut state = self.state.write().await;
        let closed = state.connections.len();
        state.connections.clear();
        state.topics.clear();

        info!(closed, "Closed all subscriber connections");
        closed
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// Number of topics with at least one subscriber
    pub async fn topic_count(&self) -> usize {
        self.state.read().await.topics.len()
    }

    pub async fn subscriber_count(&self, topic: &Topic) -> usize {
        self.state.read().await.topics.get(topic).map_or(0, HashSet::len)
    }

    /// Topics a connection has joined, sorted
    pub async fn subscriptions(&self, id: ConnectionId) -> Vec<Topic> {
        let state = self.state.read().await;
        let mut topics: Vec<Topic> = state
            .connections
            .get(&id)
            .map(|c| c.topics.iter().copied().collect())
            .unwrap_or_default();
        topics.sort();
        topics
    }

    async fn deliver(
        &self,
        outbox: &mpsc::Sender<ServerMessage>,
        message: ServerMessage,
    ) -> Result<(), BroadcastError> {
        match timeout(self.send_timeout, outbox.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(BroadcastError::SendFailed),
            Err(_) => Err(BroadcastError::SendTimedOut),
        }
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_TIMEOUT, DEFAULT_OUTBOX_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_update(service_id: Uuid, environment_id: Uuid) -> ServerMessage {
        ServerMessage::StatusUpdate(StatusUpdate {
            service_id,
            environment_id,
            status: HealthStatus::Healthy,
            response_time_ms: 42,
            timestamp: Utc::now(),
        })
    }

    fn drain(inbox: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = inbox.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let registry = SubscriptionRegistry::default();
        let (id, mut inbox) = registry.connect().await;
        let env = Uuid::new_v4();

        assert!(registry.subscribe(id, Topic::Environment(env)).await);
        assert!(registry.subscribe(id, Topic::Environment(env)).await);
        assert_eq!(registry.subscriber_count(&Topic::Environment(env)).await, 1);

        let delivered = registry.publish(Topic::Environment(env), &status_update(Uuid::new_v4(), env)).await;
        assert_eq!(delivered, 1);
        assert_eq!(drain(&mut inbox).len(), 1);
    }

    #[tokio::test]
    async fn test_status_update_reaches_only_matching_topics() {
        let registry = SubscriptionRegistry::default();
        let service = Uuid::new_v4();
        let env = Uuid::new_v4();

        let (by_service, mut service_inbox) = registry.connect().await;
        let (by_env, mut env_inbox) = registry.connect().await;
        let (other, mut other_inbox) = registry.connect().await;

        registry.subscribe(by_service, Topic::Service(service)).await;
        registry.subscribe(by_env, Topic::Environment(env)).await;
        registry.subscribe(other, Topic::Environment(Uuid::new_v4())).await;

        let delivered = registry
            .publish_status_update(service, env, HealthStatus::Down, 10, Utc::now())
            .await;

        assert_eq!(delivered, 2);
        assert_eq!(drain(&mut service_inbox).len(), 1);
        assert_eq!(drain(&mut env_inbox).len(), 1);
        assert!(drain(&mut other_inbox).is_empty());
    }

    #[tokio::test]
    async fn test_dual_subscription_receives_two_copies() {
        let registry = SubscriptionRegistry::default();
        let service = Uuid::new_v4();
        let env = Uuid::new_v4();
        let (id, mut inbox) = registry.connect().await;

        registry.subscribe(id, Topic::Service(service)).await;
        registry.subscribe(id, Topic::Environment(env)).await;

        registry.publish_status_update(service, env, HealthStatus::Healthy, 5, Utc::now()).await;

        let received = drain(&mut inbox);
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], received[1]);
    }

    #[tokio::test]
    async fn test_disconnect_cleans_up_and_is_idempotent() {
        let registry = SubscriptionRegistry::default();
        let service = Uuid::new_v4();
        let env = Uuid::new_v4();
        let (id, _inbox) = registry.connect().await;

        registry.subscribe(id, Topic::Service(service)).await;
        registry.subscribe(id, Topic::Environment(env)).await;
        assert_eq!(registry.topic_count().await, 2);

        assert!(registry.disconnect(id).await);
        assert!(!registry.disconnect(id).await);

        assert_eq!(registry.connection_count().await, 0);
        assert_eq!(registry.topic_count().await, 0);
        assert_eq!(registry.publish_status_update(service, env, HealthStatus::Down, 1, Utc::now()).await, 0);

        // A dead handle cannot rejoin
        assert!(!registry.subscribe(id, Topic::Service(service)).await);
        assert_eq!(registry.topic_count().await, 0);
    }

    #[tokio::test]
    async fn test_disconnect_keeps_topics_with_other_members() {
        let registry = SubscriptionRegistry::default();
        let env = Topic::Environment(Uuid::new_v4());
        let (first, _first_inbox) = registry.connect().await;
        let (second, mut second_inbox) = registry.connect().await;

        registry.subscribe(first, env).await;
        registry.subscribe(second, env).await;
        registry.disconnect(first).await;

        assert_eq!(registry.subscriber_count(&env).await, 1);
        assert_eq!(registry.publish(env, &ServerMessage::Pong).await, 1);
        assert_eq!(drain(&mut second_inbox), vec![ServerMessage::Pong]);
    }

    #[tokio::test]
    async fn test_unsubscribe_prunes_empty_topic() {
        let registry = SubscriptionRegistry::default();
        let topic = Topic::Service(Uuid::new_v4());
        let (id, mut inbox) = registry.connect().await;

        registry.subscribe(id, topic).await;
        assert!(registry.unsubscribe(id, topic).await);
        assert!(registry.unsubscribe(id, topic).await);

        assert_eq!(registry.topic_count().await, 0);
        assert_eq!(registry.publish(topic, &ServerMessage::Pong).await, 0);
        assert!(drain(&mut inbox).is_empty());
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_closed_outbox_is_disconnected_without_blocking_others() {
        let registry = SubscriptionRegistry::default();
        let topic = Topic::Environment(Uuid::new_v4());
        let (dead, dead_inbox) = registry.connect().await;
        let (alive, mut alive_inbox) = registry.connect().await;

        registry.subscribe(dead, topic).await;
        registry.subscribe(alive, topic).await;
        drop(dead_inbox);

        assert_eq!(registry.publish(topic, &ServerMessage::Pong).await, 1);
        assert_eq!(drain(&mut alive_inbox).len(), 1);
        assert_eq!(registry.connection_count().await, 1);
        assert!(registry.subscriptions(dead).await.is_empty());
        assert_eq!(registry.subscriber_count(&topic).await, 1);
    }

    #[tokio::test]
    async fn test_stalled_subscriber_times_out() {
        let registry = SubscriptionRegistry::new(Duration::from_millis(50), 1);
        let topic = Topic::Service(Uuid::new_v4());
        let (stalled, _stalled_inbox) = registry.connect().await;
        let (alive, mut alive_inbox) = registry.connect().await;

        registry.subscribe(stalled, topic).await;
        registry.subscribe(alive, topic).await;

        // Fill the stalled outbox; the reader never drains it
        assert_eq!(registry.publish(topic, &ServerMessage::Pong).await, 2);
        drain(&mut alive_inbox);

        assert_eq!(registry.publish(topic, &ServerMessage::Pong).await, 1);
        assert_eq!(drain(&mut alive_inbox).len(), 1);
        assert_eq!(registry.connection_count().await, 1);
        assert!(registry.subscriptions(stalled).await.is_empty());
    }

    #[tokio::test]
    async fn test_handle_client_message_replies() {
        let registry = SubscriptionRegistry::default();
        let (id, _inbox) = registry.connect().await;
        let service = Uuid::new_v4();
        let env = Uuid::new_v4();

        let replies = registry
            .handle_client_message(
                id,
                ClientMessage::Subscribe { service_id: Some(service), environment_id: Some(env) },
            )
            .await;
        assert_eq!(
            replies,
            vec![ServerMessage::subscribed_service(service), ServerMessage::subscribed_environment(env)]
        );
        assert_eq!(
            registry.subscriptions(id).await.len(),
            2
        );

        let replies = registry
            .handle_client_message(id, ClientMessage::Unsubscribe { service_id: Some(service), environment_id: None })
            .await;
        assert!(replies.is_empty());
        assert_eq!(registry.subscriptions(id).await, vec![Topic::Environment(env)]);

        let replies = registry.handle_client_message(id, ClientMessage::Ping).await;
        assert_eq!(replies, vec![ServerMessage::Pong]);
        assert_eq!(registry.topic_count().await, 1);
    }

    #[tokio::test]
    async fn test_send_to_unknown_connection_fails() {
        let registry = SubscriptionRegistry::default();
        let (id, mut inbox) = registry.connect().await;

        registry.send_to(id, ServerMessage::Pong).await.unwrap();
        assert_eq!(drain(&mut inbox), vec![ServerMessage::Pong]);

        registry.disconnect(id).await;
        assert_eq!(registry.send_to(id, ServerMessage::Pong).await, Err(BroadcastError::SendFailed));
    }

    #[tokio::test]
    async fn test_close_all_closes_outboxes() {
        let registry = SubscriptionRegistry::default();
        let (id, mut inbox) = registry.connect().await;
        registry.subscribe(id, Topic::Service(Uuid::new_v4())).await;

        assert_eq!(registry.close_all().await, 1);
        assert_eq!(registry.connection_count().await, 0);
        assert_eq!(registry.topic_count().await, 0);
        assert!(inbox.recv().await.is_none());
    }
}
