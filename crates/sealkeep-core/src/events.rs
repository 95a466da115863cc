//! Structured event stream emitted by the core.
//!
//! The core only emits. Nothing in it depends on a subscriber existing, and
//! a slow subscriber only loses its own lagged events.

use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{ErrorClass, VaultError, VaultResult};

/// The top-level operation an event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Resolve,
    Execute,
    CheckApproval,
    Save,
    Retrieve,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Resolve => "resolve",
            Self::Execute => "execute",
            Self::CheckApproval => "check_approval",
            Self::Save => "save",
            Self::Retrieve => "retrieve",
            Self::List => "list",
        };
        f.write_str(s)
    }
}

/// A step within an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Query,
    Submit,
    Encrypt,
    Store,
    EnsureRecord,
    Append,
    Fetch,
    Decrypt,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Query => "query",
            Self::Submit => "submit",
            Self::Encrypt => "encrypt",
            Self::Store => "store",
            Self::EnsureRecord => "ensure_record",
            Self::Append => "append",
            Self::Fetch => "fetch",
            Self::Decrypt => "decrypt",
            Self::Complete => "complete",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Started,
    Succeeded,
    /// Attempt `attempt` failed; the next one follows after `delay_ms`.
    Retrying { attempt: u32, delay_ms: u64 },
    Failed { class: ErrorClass, message: String },
}

impl Outcome {
    pub fn failed(err: &VaultError) -> Self {
        Self::Failed {
            class: err.class(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => f.write_str("started"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Retrying { attempt, delay_ms } => {
                write!(f, "retrying after attempt {attempt} in {delay_ms}ms")
            }
            Self::Failed { message, .. } => write!(f, "failed: {message}"),
        }
    }
}

/// One entry in the event stream. Never carries plaintext.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    pub phase: Phase,
    pub outcome: Outcome,
}

impl fmt::Display for VaultEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.operation, self.phase, self.outcome)
    }
}

/// Subscription filter. Empty fields match everything.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    pub operations: Option<Vec<Operation>>,
    pub phases: Option<Vec<Phase>>,
    /// Only deliver `Failed` outcomes.
    pub failures_only: bool,
}

impl EventFilter {
    pub fn operations(operations: impl IntoIterator<Item = Operation>) -> Self {
        Self {
            operations: Some(operations.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn matches(&self, event: &VaultEvent) -> bool {
        if let Some(ref ops) = self.operations {
            if !ops.contains(&event.operation) {
                return false;
            }
        }
        if let Some(ref phases) = self.phases {
            if !phases.contains(&event.phase) {
                return false;
            }
        }
        if self.failures_only && !matches!(event.outcome, Outcome::Failed { .. }) {
            return false;
        }
        true
    }
}

pub type EventStream = broadcast::Receiver<VaultEvent>;

struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<VaultEvent>,
}

/// Fan-out event bus. Cloning shares the subscriber list.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
    capacity: usize,
}

impl EventBus {
    /// `capacity` is the per-subscriber buffer; zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        let (sender, receiver) = broadcast::channel(self.capacity);
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.push(Subscriber { filter, sender });
        receiver
    }

    pub fn subscribe_all(&self) -> EventStream {
        self.subscribe(EventFilter::default())
    }

    /// Stamp and route an event. Subscribers whose receivers are gone are
    /// pruned.
    pub fn emit(&self, operation: Operation, phase: Phase, outcome: Outcome) -> VaultEvent {
        let event = VaultEvent {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            operation,
            phase,
            outcome,
        };
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.retain(|sub| {
            if sub.filter.matches(&event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
        event
    }

    pub fn started(&self, operation: Operation, phase: Phase) {
        self.emit(operation, phase, Outcome::Started);
    }

    /// Emit `Succeeded` or `Failed` for `result`.
    pub fn finished<T>(&self, operation: Operation, phase: Phase, result: &VaultResult<T>) {
        let outcome = match result {
            Ok(_) => Outcome::Succeeded,
            Err(err) => Outcome::failed(err),
        };
        self.emit(operation, phase, outcome);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Drain everything currently buffered on a stream.
pub fn drain(stream: &mut EventStream) -> Vec<VaultEvent> {
    let mut events = Vec::new();
    loop {
        match stream.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => return events,
        }
    }
}
