// Per-worker state kept in the pool registry

use super::message::Message;
use super::notifier::{CondvarNotifier, Notifier, Signal};
use crate::js::interpreter::CallbackId;
use crate::js::origin::SecurityOrigin;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::task::AbortHandle;

/// Lifecycle of a worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Thread started, interpreter being built
    Spawning,
    /// Initialized, waiting for its script to become available
    AwaitingScript,
    /// Script evaluated, pumping messages
    Running,
    /// Observed the shutdown flag and is leaving its pump loop
    ShuttingDown,
    /// Interpreter and notifier torn down; the thread has returned or is about to
    Terminated,
}

/// Script text ready for a worker, with the origin it was loaded from
#[derive(Debug, Clone)]
pub(crate) struct ScriptPayload {
    pub text: String,
    pub origin: SecurityOrigin,
    /// Name reported in script errors
    pub source_name: String,
}

/// In-flight fetch of a worker's script
///
/// Installed under the pool lock together with the spawned task. Completion
/// only counts if this entry is still present; taking it detaches the
/// completion from the record.
pub(crate) struct PendingFetch {
    pub abort: Option<AbortHandle>,
}

impl PendingFetch {
    pub fn cancel(self) {
        if let Some(abort) = self.abort {
            abort.abort();
        }
    }
}

/// Everything the pool knows about one worker
///
/// Lives in the registry behind the pool lock. Handshake signals are `Arc`s so
/// they can be cloned out and waited on without holding the lock.
pub(crate) struct WorkerRecord {
    pub message_queue: VecDeque<Message>,
    pub on_message: Option<CallbackId>,
    pub on_error: Option<CallbackId>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub thread_state: ThreadState,
    pub pending_fetch: Option<PendingFetch>,
    pub is_cross_origin_suspended: bool,
    /// Origin attached to messages this worker sends
    pub script_origin: SecurityOrigin,

    pub init: Arc<Signal>,
    pub init_ok: bool,
    pub init_error: Option<String>,

    pub script: Arc<Signal>,
    /// Set when the script is available and loaded successfully
    pub script_payload: Option<ScriptPayload>,

    pub thread: Option<JoinHandle<()>>,
}

impl WorkerRecord {
    /// Record for the pool-owning worker, already initialized on its own thread
    pub fn owner(page_origin: SecurityOrigin) -> Self {
        let mut record = Self::spawning(page_origin);
        record.notifier = Some(Arc::new(CondvarNotifier::new()));
        record.thread_state = ThreadState::Running;
        record.init_ok = true;
        record.init.fire();
        record.script.fire();
        record
    }

    pub fn spawning(page_origin: SecurityOrigin) -> Self {
        Self {
            message_queue: VecDeque::new(),
            on_message: None,
            on_error: None,
            notifier: None,
            thread_state: ThreadState::Spawning,
            pending_fetch: None,
            is_cross_origin_suspended: false,
            script_origin: page_origin,
            init: Arc::new(Signal::new()),
            init_ok: false,
            init_error: None,
            script: Arc::new(Signal::new()),
            script_payload: None,
            thread: None,
        }
    }

    /// Queue a message and wake the worker
    ///
    /// Returns `false` if the worker has no notifier (not initialized yet, or
    /// already torn down).
    pub fn deliver(&mut self, message: Message) -> bool {
        match &self.notifier {
            Some(notifier) => {
                self.message_queue.push_back(message);
                notifier.signal();
                true
            }
            None => false,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.thread_state == ThreadState::Terminated
    }
}
