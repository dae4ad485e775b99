//! Bounded Alert Store
//!
//! Holds the most recent alert messages in a fixed-capacity ring buffer.
//! The oldest message is evicted when a new one arrives at capacity.
//! Lifetime counters survive eviction; window counts are derived by
//! scanning the buffered timestamps.

use super::alert_log;
use crate::domain::{Category, Details, Message, MessageFilter, Severity};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// Configuration for the alert store
#[derive(Debug, Clone)]
pub struct AlertStoreConfig {
    /// Maximum buffered messages (default: 1000)
    pub capacity: usize,
    /// Result cap for queries without an explicit limit (default: 100)
    pub default_query_limit: usize,
}

impl Default for AlertStoreConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            default_query_limit: 100,
        }
    }
}

/// Per-severity message counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub info: u64,
    pub warning: u64,
    pub alarm: u64,
}

impl SeverityCounts {
    fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Info => self.info += 1,
            Severity::Warning => self.warning += 1,
            Severity::Alarm => self.alarm += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Info => self.info,
            Severity::Warning => self.warning,
            Severity::Alarm => self.alarm,
        }
    }

    pub fn total(&self) -> u64 {
        self.info + self.warning + self.alarm
    }
}

/// Point-in-time metrics derived from the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Messages ever added, including evicted ones
    pub total_count: u64,
    pub lifetime: SeverityCounts,
    /// Buffered messages newer than one hour
    pub last_hour: u64,
    /// Buffered messages newer than one day
    pub last_day: u64,
    /// Messages currently in the buffer
    pub current: SeverityCounts,
    pub unacknowledged_alarms: u64,
    pub buffer_size: usize,
    pub buffer_capacity: usize,
    pub generated_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// Render in Prometheus exposition format
    pub fn to_prometheus(&self) -> String {
        format!(
            r#"# HELP devwatch_messages_total Messages emitted since start by severity
# TYPE devwatch_messages_total counter
devwatch_messages_total{{severity="info"}} {}
devwatch_messages_total{{severity="warning"}} {}
devwatch_messages_total{{severity="alarm"}} {}

# HELP devwatch_messages_emitted_total Messages emitted since start
# TYPE devwatch_messages_emitted_total counter
devwatch_messages_emitted_total {}

# HELP devwatch_messages_last_hour Messages emitted in the last hour
# TYPE devwatch_messages_last_hour gauge
devwatch_messages_last_hour {}

# HELP devwatch_messages_last_day Messages emitted in the last day
# TYPE devwatch_messages_last_day gauge
devwatch_messages_last_day {}

# HELP devwatch_messages_buffered Messages currently held in the alert buffer
# TYPE devwatch_messages_buffered gauge
devwatch_messages_buffered{{severity="info"}} {}
devwatch_messages_buffered{{severity="warning"}} {}
devwatch_messages_buffered{{severity="alarm"}} {}

# HELP devwatch_unacknowledged_alarms Alarm messages not yet acknowledged
# TYPE devwatch_unacknowledged_alarms gauge
devwatch_unacknowledged_alarms {}

# HELP devwatch_alert_buffer_capacity Configured alert buffer capacity
# TYPE devwatch_alert_buffer_capacity gauge
devwatch_alert_buffer_capacity {}
"#,
            self.lifetime.info,
            self.lifetime.warning,
            self.lifetime.alarm,
            self.total_count,
            self.last_hour,
            self.last_day,
            self.current.info,
            self.current.warning,
            self.current.alarm,
            self.unacknowledged_alarms,
            self.buffer_capacity,
        )
    }
}

#[derive(Debug, Default)]
struct StoreState {
    buffer: VecDeque<Message>,
    next_seq: u64,
    lifetime: SeverityCounts,
}

/// Fixed-capacity alert buffer with filtering and acknowledgement
pub struct AlertStore {
    config: AlertStoreConfig,
    state: RwLock<StoreState>,
    event_tx: broadcast::Sender<Message>,
}

impl AlertStore {
    /// Create a new alert store
    pub fn new(config: AlertStoreConfig) -> Self {
        let capacity = config.capacity.max(1);
        let (event_tx, _) = broadcast::channel(64);
        Self {
            config: AlertStoreConfig { capacity, ..config },
            state: RwLock::new(StoreState {
                buffer: VecDeque::with_capacity(capacity),
                ..Default::default()
            }),
            event_tx,
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(AlertStoreConfig::default())
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Number of buffered messages
    pub async fn len(&self) -> usize {
        self.state.read().await.buffer.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Subscribe to newly added messages
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.event_tx.subscribe()
    }

    /// Create and buffer a message, evicting the oldest at capacity
    pub async fn add(
        &self,
        severity: Severity,
        category: Category,
        source: &str,
        title: &str,
        description: &str,
        details: Details,
    ) -> Message {
        self.add_at(Utc::now(), severity, category, source, title, description, details)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn add_at(
        &self,
        timestamp: DateTime<Utc>,
        severity: Severity,
        category: Category,
        source: &str,
        title: &str,
        description: &str,
        details: Details,
    ) -> Message {
        let message = {
            let mut state = self.state.write().await;
            state.next_seq += 1;

            let message = Message {
                id: format!("msg_{}_{}", state.next_seq, timestamp.timestamp_millis()),
                timestamp,
                severity,
                category,
                source: source.to_string(),
                title: title.to_string(),
                description: description.to_string(),
                details,
                acknowledged: false,
                ack_timestamp: None,
            };

            if state.buffer.len() >= self.config.capacity {
                if let Some(evicted) = state.buffer.pop_front() {
                    debug!("Alert buffer full, evicted {}", evicted.id);
                }
            }
            state.buffer.push_back(message.clone());
            state.lifetime.bump(severity);
            message
        };

        alert_log::emit(&message);
        let _ = self.event_tx.send(message.clone());
        message
    }

    /// Matching messages, newest first, capped at the filter's limit
    pub async fn query(&self, filter: &MessageFilter) -> Vec<Message> {
        let limit = filter.limit.unwrap_or(self.config.default_query_limit);
        let state = self.state.read().await;
        state
            .buffer
            .iter()
            .rev()
            .filter(|m| filter.matches(m))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Look up one buffered message
    pub async fn get(&self, message_id: &str) -> Option<Message> {
        let state = self.state.read().await;
        state.buffer.iter().find(|m| m.id == message_id).cloned()
    }

    /// Acknowledge a message by id.
    ///
    /// Returns false only if the id is not buffered. Acknowledging an
    /// already-acknowledged message returns true and keeps the original
    /// `ack_timestamp`.
    pub async fn acknowledge(&self, message_id: &str) -> bool {
        let mut state = self.state.write().await;
        match state.buffer.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                if message.acknowledge(Utc::now()) {
                    debug!("Acknowledged message {}", message_id);
                }
                true
            }
            None => false,
        }
    }

    /// Acknowledge every unacknowledged message, optionally of one severity
    pub async fn acknowledge_all(&self, severity: Option<Severity>) -> usize {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let mut count = 0;
        for message in state.buffer.iter_mut() {
            if severity.map_or(true, |s| message.severity == s) && message.acknowledge(now) {
                count += 1;
            }
        }

        if count > 0 {
            info!(
                "Acknowledged {} message(s){}",
                count,
                severity.map(|s| format!(" with severity {}", s)).unwrap_or_default()
            );
        }
        count
    }

    /// Derive metrics from counters and the current buffer
    pub async fn metrics(&self) -> MetricsSnapshot {
        let now = Utc::now();
        let hour_ago = now - Duration::hours(1);
        let day_ago = now - Duration::days(1);

        let state = self.state.read().await;
        let mut current = SeverityCounts::default();
        let mut last_hour = 0;
        let mut last_day = 0;
        let mut unacknowledged_alarms = 0;

        for message in &state.buffer {
            current.bump(message.severity);
            if message.timestamp > hour_ago {
                last_hour += 1;
            }
            if message.timestamp > day_ago {
                last_day += 1;
            }
            if message.severity == Severity::Alarm && !message.acknowledged {
                unacknowledged_alarms += 1;
            }
        }

        MetricsSnapshot {
            total_count: state.lifetime.total(),
            lifetime: state.lifetime,
            last_hour,
            last_day,
            current,
            unacknowledged_alarms,
            buffer_size: state.buffer.len(),
            buffer_capacity: self.config.capacity,
            generated_at: now,
        }
    }

    /// Metrics in Prometheus exposition format
    pub async fn export_prometheus_text(&self) -> String {
        self.metrics().await.to_prometheus()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn add_simple(store: &AlertStore, severity: Severity, title: &str) -> Message {
        store
            .add(
                severity,
                Category::DeviceConnection,
                "camera_1",
                title,
                "description",
                Details::new(),
            )
            .await
    }

    #[tokio::test]
    async fn test_ring_buffer_evicts_oldest() {
        let store = AlertStore::new(AlertStoreConfig {
            capacity: 3,
            ..Default::default()
        });

        let first = add_simple(&store, Severity::Info, "first").await;
        for i in 0..3 {
            add_simple(&store, Severity::Info, &format!("next {}", i)).await;
        }

        assert_eq!(store.len().await, 3);
        assert!(store.get(&first.id).await.is_none());

        let newest = store.query(&MessageFilter::default()).await;
        assert_eq!(newest[0].title, "next 2");

        let metrics = store.metrics().await;
        assert_eq!(metrics.total_count, 4);
        assert_eq!(metrics.buffer_size, 3);
    }

    #[tokio::test]
    async fn test_ids_are_distinct() {
        let store = AlertStore::with_defaults();
        let a = add_simple(&store, Severity::Info, "a").await;
        let b = add_simple(&store, Severity::Info, "b").await;
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_query_newest_first_with_limit() {
        let store = AlertStore::with_defaults();
        for i in 0..5 {
            add_simple(&store, Severity::Warning, &format!("w{}", i)).await;
        }
        add_simple(&store, Severity::Alarm, "alarm").await;

        let warnings = store
            .query(&MessageFilter::default().severity(Severity::Warning).limit(2))
            .await;
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].title, "w4");
        assert_eq!(warnings[1].title, "w3");

        let other_source = store
            .query(&MessageFilter::default().source("plug_9"))
            .await;
        assert!(other_source.is_empty());
    }

    #[tokio::test]
    async fn test_acknowledge_is_idempotent() {
        let store = AlertStore::with_defaults();
        let msg = add_simple(&store, Severity::Alarm, "alarm").await;

        assert!(store.acknowledge(&msg.id).await);
        let first = store.get(&msg.id).await.unwrap();
        assert!(first.acknowledged);
        assert!(first.ack_timestamp.is_some());

        assert!(store.acknowledge(&msg.id).await);
        let second = store.get(&msg.id).await.unwrap();
        assert_eq!(first.ack_timestamp, second.ack_timestamp);

        assert!(!store.acknowledge("msg_missing").await);
    }

    #[tokio::test]
    async fn test_acknowledge_all_by_severity() {
        let store = AlertStore::with_defaults();
        add_simple(&store, Severity::Alarm, "a1").await;
        add_simple(&store, Severity::Alarm, "a2").await;
        add_simple(&store, Severity::Warning, "w1").await;

        assert_eq!(store.acknowledge_all(Some(Severity::Alarm)).await, 2);
        assert_eq!(store.acknowledge_all(Some(Severity::Alarm)).await, 0);

        let unacked = store
            .query(&MessageFilter::default().acknowledged(false))
            .await;
        assert_eq!(unacked.len(), 1);
        assert_eq!(unacked[0].severity, Severity::Warning);

        assert_eq!(store.acknowledge_all(None).await, 1);
    }

    #[tokio::test]
    async fn test_metrics_windows_scan_buffer() {
        let store = AlertStore::with_defaults();
        let now = Utc::now();
        store
            .add_at(
                now - Duration::hours(3),
                Severity::Warning,
                Category::DeviceConnection,
                "plug_1",
                "old",
                "",
                Details::new(),
            )
            .await;
        store
            .add_at(
                now - Duration::days(2),
                Severity::Info,
                Category::SystemEvent,
                "supervisor",
                "older",
                "",
                Details::new(),
            )
            .await;
        add_simple(&store, Severity::Alarm, "fresh").await;

        let metrics = store.metrics().await;
        assert_eq!(metrics.last_hour, 1);
        assert_eq!(metrics.last_day, 2);
        assert_eq!(metrics.total_count, 3);
        assert_eq!(metrics.current.get(Severity::Alarm), 1);
        assert_eq!(metrics.unacknowledged_alarms, 1);
    }

    #[tokio::test]
    async fn test_prometheus_text_format() {
        let store = AlertStore::with_defaults();
        add_simple(&store, Severity::Alarm, "alarm").await;
        add_simple(&store, Severity::Info, "info").await;

        let text = store.export_prometheus_text().await;
        assert!(text.contains("# TYPE devwatch_messages_total counter"));
        assert!(text.contains("devwatch_messages_total{severity=\"alarm\"} 1"));
        assert!(text.contains("# TYPE devwatch_unacknowledged_alarms gauge"));
        assert!(text.contains("devwatch_unacknowledged_alarms 1"));
        assert!(text.contains("devwatch_messages_last_hour 2"));

        for line in text.lines().filter(|l| l.starts_with("# TYPE")) {
            let family = line.split_whitespace().nth(2).unwrap();
            assert!(text.contains(&format!("# HELP {} ", family)));
        }
    }

    #[tokio::test]
    async fn test_subscribe_receives_added_messages() {
        let store = AlertStore::with_defaults();
        let mut rx = store.subscribe();
        let msg = add_simple(&store, Severity::Warning, "offline").await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, msg.id);
    }
}
