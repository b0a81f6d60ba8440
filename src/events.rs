//! Structured event log and consumer-facing snapshots.
//!
//! The coordinator never exposes mutable state to other threads: observers
//! get immutable [`LiveStats`] snapshots and [`EmulatorEvent`] entries over a
//! channel, and the bounded log keeps the most recent 200 entries for a
//! dashboard event feed.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum entries retained in the event feed.
const EVENT_LOG_CAPACITY: usize = 200;

/// Severity of a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSeverity::Info => write!(f, "info"),
            EventSeverity::Warning => write!(f, "warning"),
            EventSeverity::Error => write!(f, "error"),
        }
    }
}

/// Subsystem an event originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Bluetooth,
    Advertising,
    Control,
    Simulation,
    Notification,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Bluetooth => write!(f, "bluetooth"),
            EventCategory::Advertising => write!(f, "advertising"),
            EventCategory::Control => write!(f, "control"),
            EventCategory::Simulation => write!(f, "simulation"),
            EventCategory::Notification => write!(f, "notification"),
        }
    }
}

/// One structured log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorEvent {
    /// Wall-clock time the event was recorded.
    pub timestamp: DateTime<Utc>,
    pub severity: EventSeverity,
    pub category: EventCategory,
    pub message: String,
    /// Free-form key/value context (opcode, characteristic, error detail).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,
}

impl EmulatorEvent {
    /// Build an event stamped now.
    pub fn new(
        severity: EventSeverity,
        category: EventCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            category,
            message: message.into(),
            context: HashMap::new(),
        }
    }

    /// Attach a context key/value pair.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Bounded FIFO of recent events.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: VecDeque<EmulatorEvent>,
}

impl EventLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, evicting the oldest once full.
    pub fn push(&mut self, event: EmulatorEvent) {
        if self.entries.len() >= EVENT_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(event);
    }

    /// Snapshot of the current entries, oldest first.
    pub fn entries(&self) -> Vec<EmulatorEvent> {
        self.entries.iter().cloned().collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been logged yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Broadcast lifecycle of the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastState {
    /// Created, nothing requested yet.
    #[default]
    Idle,
    /// Services registering with the transport.
    Starting,
    /// Advertising and serving.
    Advertising,
    /// Stopped by the consumer.
    Stopped,
    /// A transport failure ended the broadcast.
    Failed,
}

impl std::fmt::Display for BroadcastState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BroadcastState::Idle => write!(f, "Idle"),
            BroadcastState::Starting => write!(f, "Starting"),
            BroadcastState::Advertising => write!(f, "Advertising"),
            BroadcastState::Stopped => write!(f, "Stopped"),
            BroadcastState::Failed => write!(f, "Failed"),
        }
    }
}

/// Immutable per-tick snapshot for dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStats {
    pub speed_kmh: f64,
    pub power_w: i32,
    pub cadence_rpm: i32,
    /// "auto" or "manual".
    pub mode: String,
    /// Gear as "front x rear" teeth, e.g. "50x14".
    pub gear: String,
    pub target_cadence_rpm: f64,
    pub fatigue: f64,
    pub noise_rpm: f64,
    pub grade_pct: f64,
}

/// Messages published to observers over the update channel.
#[derive(Debug, Clone)]
pub enum EmulatorUpdate {
    /// Broadcast lifecycle transition.
    StateChanged(BroadcastState),
    /// Fresh telemetry snapshot.
    Stats(LiveStats),
    /// New log entry.
    Event(EmulatorEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_evicts_oldest_at_capacity() {
        let mut log = EventLog::new();
        for i in 0..250 {
            log.push(EmulatorEvent::new(
                EventSeverity::Info,
                EventCategory::Simulation,
                format!("event {}", i),
            ));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 200);
        assert_eq!(entries[0].message, "event 50");
        assert_eq!(entries[199].message, "event 249");
    }

    #[test]
    fn test_event_context_round_trip() {
        let event = EmulatorEvent::new(
            EventSeverity::Warning,
            EventCategory::Control,
            "unsupported opcode",
        )
        .with_context("opcode", "0x04");
        let json = serde_json::to_string(&event).unwrap();
        let back: EmulatorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.context.get("opcode").unwrap(), "0x04");
    }

    #[test]
    fn test_live_stats_serializes() {
        let stats = LiveStats {
            speed_kmh: 32.4,
            power_w: 250,
            cadence_rpm: 90,
            mode: "auto".into(),
            gear: "50x14".into(),
            target_cadence_rpm: 91.5,
            fatigue: 0.1,
            noise_rpm: -0.4,
            grade_pct: 1.5,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"power_w\":250"));
    }
}
