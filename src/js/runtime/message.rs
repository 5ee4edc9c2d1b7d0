// Message queue entries and worker identifiers

use crate::js::origin::SecurityOrigin;
use std::fmt;

/// Identifier of a worker, unique within one pool
///
/// Ids are handed out sequentially and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u32);

impl WorkerId {
    /// The worker that owns the pool; never spawned
    pub const OWNER: WorkerId = WorkerId(0);

    pub fn is_owner(self) -> bool {
        self == Self::OWNER
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Regular message, delivered to `onmessage`
    Message,
    /// Error event, delivered to `onerror`
    Error,
}

/// One queued entry awaiting delivery to a worker
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub text: String,
    pub sender: WorkerId,
    pub origin: SecurityOrigin,
    pub kind: MessageKind,
}

impl Message {
    pub fn new(text: impl Into<String>, sender: WorkerId, origin: SecurityOrigin) -> Self {
        Self {
            text: text.into(),
            sender,
            origin,
            kind: MessageKind::Message,
        }
    }

    pub fn error(text: impl Into<String>, sender: WorkerId, origin: SecurityOrigin) -> Self {
        Self {
            text: text.into(),
            sender,
            origin,
            kind: MessageKind::Error,
        }
    }
}
