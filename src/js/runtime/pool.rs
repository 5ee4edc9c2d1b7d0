// Worker pool: registry, owner handle and per-worker scopes

use super::current::current_worker_id;
use super::message::{Message, WorkerId};
use super::notifier::{CondvarNotifier, Notifier, Signal};
use super::record::{PendingFetch, ScriptPayload, ThreadState, WorkerRecord};
use super::worker;
use crate::js::{
    config::PoolConfig,
    error::{FetchError, ScriptError, WorkerPoolError},
    fetch::{FetchedScript, HttpScriptFetcher, ScriptFetcher},
    interpreter::{CallbackId, Interpreter, InterpreterFactory},
    origin::SecurityOrigin,
};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, Runtime};
use url::Url;

type Result<T> = std::result::Result<T, WorkerPoolError>;

const ONERROR_FROM_WORKER_MESSAGE: &str = "The onerror property cannot be set from inside a worker";

/// Where a new worker gets its script from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerSource {
    /// Script text, run with the page's origin
    Inline(String),
    /// URL resolved against the page URL and fetched asynchronously
    Url(String),
}

/// Format the text of an error event raised by `worker`
pub fn format_error_message(worker: WorkerId, error: &ScriptError) -> String {
    match error.line {
        Some(line) => format!("Error in worker {} at line {}. {}", worker, line, error.message),
        None => format!("Error in worker {}. {}", worker, error.message),
    }
}

struct Registry {
    workers: Vec<WorkerRecord>,
    is_shutting_down: bool,
}

/// State shared by the owner handle, every worker thread and every fetch task
pub(crate) struct PoolShared {
    registry: Mutex<Registry>,
    terminated: Condvar,
    page_origin: SecurityOrigin,
    config: PoolConfig,
    factory: Arc<dyn InterpreterFactory>,
    fetcher: Arc<dyn ScriptFetcher>,
    fetch_runtime: Handle,
}

impl PoolShared {
    fn new(
        config: PoolConfig,
        page_origin: SecurityOrigin,
        factory: Arc<dyn InterpreterFactory>,
        fetcher: Arc<dyn ScriptFetcher>,
        fetch_runtime: Handle,
    ) -> Self {
        Self {
            registry: Mutex::new(Registry {
                workers: vec![WorkerRecord::owner(page_origin.clone())],
                is_shutting_down: false,
            }),
            terminated: Condvar::new(),
            page_origin,
            config,
            factory,
            fetcher,
            fetch_runtime,
        }
    }

    pub(crate) fn factory(&self) -> &dyn InterpreterFactory {
        self.factory.as_ref()
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.registry.lock().is_shutting_down
    }

    fn create_worker(self: &Arc<Self>, caller: WorkerId, source: WorkerSource) -> Result<WorkerId> {
        let (id, init) = {
            let mut registry = self.registry.lock();
            if registry.is_shutting_down {
                return Err(WorkerPoolError::Internal("worker pool is shutting down".into()));
            }
            let caller_ready = registry
                .workers
                .get(caller.index())
                .is_some_and(|record| record.notifier.is_some());
            if !caller_ready {
                return Err(WorkerPoolError::Internal("caller not initialized".into()));
            }

            let id = WorkerId(registry.workers.len() as u32);
            let record = WorkerRecord::spawning(self.page_origin.clone());
            let init = record.init.clone();
            registry.workers.push(record);
            (id, init)
        };

        match source {
            WorkerSource::Inline(text) => {
                self.provide_script(
                    id,
                    ScriptPayload {
                        text,
                        origin: self.page_origin.clone(),
                        source_name: format!("worker-{}.js", id),
                    },
                );
            }
            WorkerSource::Url(reference) => match self.page_origin.resolve(&reference) {
                Ok(url) => self.start_fetch(id, url),
                Err(e) => {
                    self.abandon(id);
                    return Err(WorkerPoolError::InvalidUrl {
                        url: reference,
                        reason: e.to_string(),
                    });
                }
            },
        }

        let mut builder =
            thread::Builder::new().name(format!("{}-{}", self.config.thread_name_prefix, id));
        if let Some(size) = self.config.thread_stack_size {
            builder = builder.stack_size(size);
        }

        let shared = Arc::clone(self);
        match builder.spawn(move || worker::run_worker_thread(shared, id)) {
            Ok(handle) => {
                self.registry.lock().workers[id.index()].thread = Some(handle);
            }
            Err(e) => {
                self.abandon(id);
                return Err(WorkerPoolError::Internal(format!(
                    "failed to spawn worker thread: {}",
                    e
                )));
            }
        }

        init.wait();

        let registry = self.registry.lock();
        let record = &registry.workers[id.index()];
        if record.init_ok {
            tracing::debug!(target: "workerpool", worker = %id, creator = %caller, "worker created");
            Ok(id)
        } else {
            let reason = record
                .init_error
                .clone()
                .unwrap_or_else(|| "worker thread failed to initialize".to_string());
            Err(WorkerPoolError::Internal(reason))
        }
    }

    /// Mark a record that will never get a running thread as terminated
    fn abandon(&self, id: WorkerId) {
        let mut registry = self.registry.lock();
        let record = &mut registry.workers[id.index()];
        record.thread_state = ThreadState::Terminated;
        if let Some(fetch) = record.pending_fetch.take() {
            fetch.cancel();
        }
        record.init.fire();
        record.script.fire();
        self.terminated.notify_all();
    }

    fn provide_script(&self, id: WorkerId, payload: ScriptPayload) {
        let script = {
            let mut registry = self.registry.lock();
            let record = &mut registry.workers[id.index()];
            record.script_origin = payload.origin.clone();
            record.script_payload = Some(payload);
            record.script.clone()
        };
        script.fire();
    }

    /// Start loading `url` for `id`.
    ///
    /// The shutdown check, the pending entry and the spawn happen under one
    /// lock, so `shutdown` either sees the pending fetch and cancels it or the
    /// fetch is never started.
    fn start_fetch(self: &Arc<Self>, id: WorkerId, url: Url) {
        let mut registry = self.registry.lock();
        if registry.is_shutting_down {
            tracing::debug!(target: "workerpool", worker = %id, url = %url, "not fetching worker script during shutdown");
            return;
        }

        let pool = Arc::downgrade(self);
        let fetcher = Arc::clone(&self.fetcher);
        // Completion takes the registry lock, so it cannot run before the
        // pending entry below is installed.
        let task = self.fetch_runtime.spawn(async move {
            let result = fetcher.fetch(&url).await;
            // A pool that is gone has nobody left to tell.
            if let Some(pool) = pool.upgrade() {
                pool.complete_fetch(id, result);
            }
        });

        registry.workers[id.index()].pending_fetch = Some(PendingFetch {
            abort: Some(task.abort_handle()),
        });
    }

    fn complete_fetch(&self, id: WorkerId, result: std::result::Result<FetchedScript, FetchError>) {
        let script = {
            let mut registry = self.registry.lock();
            let record = &mut registry.workers[id.index()];
            if record.pending_fetch.take().is_none() {
                tracing::debug!(target: "workerpool", worker = %id, "ignoring completion of cancelled fetch");
                return;
            }
            record.script.clone()
        };

        match result {
            Ok(fetched) => {
                tracing::debug!(target: "workerpool", worker = %id, url = %fetched.final_url, "worker script loaded");
                let source_name = fetched.final_url.to_string();
                self.provide_script(
                    id,
                    ScriptPayload {
                        text: fetched.body,
                        origin: SecurityOrigin::from_parsed(fetched.final_url),
                        source_name,
                    },
                );
            }
            Err(err) => {
                tracing::warn!(target: "workerpool", worker = %id, error = %err, "worker script failed to load");
                self.post_error(id, &ScriptError::new(err.to_string()));
                script.fire();
            }
        }
    }

    fn put_message(&self, caller: WorkerId, text: String, dest: WorkerId) -> Result<()> {
        let mut registry = self.registry.lock();
        let origin = registry
            .workers
            .get(caller.index())
            .map(|record| record.script_origin.clone())
            .unwrap_or_else(|| self.page_origin.clone());

        let record = registry
            .workers
            .get_mut(dest.index())
            .ok_or(WorkerPoolError::NotFound(dest))?;
        if !record.deliver(Message::new(text, caller, origin)) {
            return Err(WorkerPoolError::NotFound(dest));
        }

        tracing::trace!(target: "workerpool", from = %caller, to = %dest, "message queued");
        Ok(())
    }

    /// Report a script error raised on the current thread
    pub(crate) fn handle_error(&self, error: &ScriptError) {
        let source = current_worker_id().unwrap_or(WorkerId::OWNER);
        self.post_error(source, error);
    }

    /// Queue an error event raised by `source` for the pool owner
    pub(crate) fn post_error(&self, source: WorkerId, error: &ScriptError) {
        let text = format_error_message(source, error);
        let mut registry = self.registry.lock();
        let owner = &mut registry.workers[WorkerId::OWNER.index()];
        let origin = owner.script_origin.clone();
        if !owner.deliver(Message::error(text.clone(), source, origin)) {
            tracing::warn!(target: "workerpool", worker = %source, "dropping error event: {}", text);
        }
    }

    fn set_on_message(&self, caller: WorkerId, handler: Option<CallbackId>) -> Result<Option<CallbackId>> {
        let mut registry = self.registry.lock();
        let record = registry
            .workers
            .get_mut(caller.index())
            .ok_or(WorkerPoolError::NotFound(caller))?;
        Ok(std::mem::replace(&mut record.on_message, handler))
    }

    fn set_on_error(&self, caller: WorkerId, handler: Option<CallbackId>) -> Result<Option<CallbackId>> {
        if !caller.is_owner() {
            return Err(WorkerPoolError::PermissionDenied(
                ONERROR_FROM_WORKER_MESSAGE.to_string(),
            ));
        }
        let mut registry = self.registry.lock();
        let record = &mut registry.workers[caller.index()];
        Ok(std::mem::replace(&mut record.on_error, handler))
    }

    pub(crate) fn message_handler(&self, id: WorkerId) -> Option<CallbackId> {
        self.registry.lock().workers.get(id.index()).and_then(|r| r.on_message)
    }

    pub(crate) fn error_handler(&self, id: WorkerId) -> Option<CallbackId> {
        self.registry.lock().workers.get(id.index()).and_then(|r| r.on_error)
    }

    fn allow_cross_origin(&self, caller: WorkerId) {
        let mut registry = self.registry.lock();
        if let Some(record) = registry.workers.get_mut(caller.index()) {
            if record.is_cross_origin_suspended {
                tracing::debug!(target: "workerpool", worker = %caller, "cross-origin access allowed");
            }
            record.is_cross_origin_suspended = false;
        }
    }

    fn is_cross_origin_suspended(&self, id: WorkerId) -> bool {
        self.registry
            .lock()
            .workers
            .get(id.index())
            .is_some_and(|r| r.is_cross_origin_suspended)
    }

    fn script_origin(&self, id: WorkerId) -> SecurityOrigin {
        self.registry
            .lock()
            .workers
            .get(id.index())
            .map(|r| r.script_origin.clone())
            .unwrap_or_else(|| self.page_origin.clone())
    }

    /// Called on a fresh worker thread once its interpreter exists
    ///
    /// Installs the notifier, fires the init handshake and hands back what
    /// the thread needs to wait for its script.
    pub(crate) fn init_worker_thread(&self, id: WorkerId) -> Option<(Arc<dyn Notifier>, Arc<Signal>)> {
        let (init, ready) = {
            let mut registry = self.registry.lock();
            let record = registry.workers.get_mut(id.index())?;
            let notifier: Arc<dyn Notifier> = Arc::new(CondvarNotifier::new());
            record.notifier = Some(notifier.clone());
            record.thread_state = ThreadState::AwaitingScript;
            record.init_ok = true;
            (record.init.clone(), (notifier, record.script.clone()))
        };
        init.fire();
        Some(ready)
    }

    pub(crate) fn fail_worker_init(&self, id: WorkerId, reason: String) {
        let init = {
            let mut registry = self.registry.lock();
            let Some(record) = registry.workers.get_mut(id.index()) else {
                return;
            };
            record.init_ok = false;
            record.init_error = Some(reason);
            record.init.clone()
        };
        init.fire();
    }

    /// Take the script a worker should run
    ///
    /// Returns `None` if the pool is shutting down or the script failed to
    /// load. A script whose origin differs from the page starts out suspended
    /// from cross-origin use.
    pub(crate) fn take_script(&self, id: WorkerId) -> Option<ScriptPayload> {
        let mut registry = self.registry.lock();
        if registry.is_shutting_down {
            return None;
        }
        let record = registry.workers.get_mut(id.index())?;
        let payload = record.script_payload.take()?;
        if !payload.origin.is_same_origin(&self.page_origin) {
            tracing::debug!(target: "workerpool", worker = %id, origin = %payload.origin, "cross-origin worker suspended");
            record.is_cross_origin_suspended = true;
        }
        Some(payload)
    }

    pub(crate) fn set_state(&self, id: WorkerId, state: ThreadState) {
        if let Some(record) = self.registry.lock().workers.get_mut(id.index()) {
            record.thread_state = state;
        }
    }

    /// Pop the next message for `id`, or `None` if the queue is empty or the
    /// pool is shutting down
    pub(crate) fn next_message(&self, id: WorkerId) -> Option<Message> {
        let mut registry = self.registry.lock();
        if registry.is_shutting_down {
            return None;
        }
        registry.workers.get_mut(id.index())?.message_queue.pop_front()
    }

    pub(crate) fn mark_terminated(&self, id: WorkerId) {
        let mut registry = self.registry.lock();
        if let Some(record) = registry.workers.get_mut(id.index()) {
            record.thread_state = ThreadState::Terminated;
            record.notifier = None;
        }
        self.terminated.notify_all();
    }

    fn shutdown(&self) {
        let mut registry = self.registry.lock();
        if registry.is_shutting_down {
            return;
        }
        registry.is_shutting_down = true;

        for record in registry.workers.iter_mut() {
            if let Some(fetch) = record.pending_fetch.take() {
                fetch.cancel();
            }
            record.script.fire();
            if let Some(notifier) = &record.notifier {
                notifier.signal();
            }
        }

        tracing::info!(target: "workerpool", workers = registry.workers.len(), "worker pool shutting down");
    }

    fn wait_for_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut registry = self.registry.lock();
        while registry.workers.iter().skip(1).any(|r| !r.is_terminated()) {
            if self.terminated.wait_until(&mut registry, deadline).timed_out()
                && registry.workers.iter().skip(1).any(|r| !r.is_terminated())
            {
                return false;
            }
        }

        let handles: Vec<_> = registry
            .workers
            .iter_mut()
            .filter_map(|r| r.thread.take())
            .collect();
        drop(registry);

        for handle in handles {
            if handle.join().is_err() {
                tracing::warn!(target: "workerpool", "worker thread panicked");
            }
        }
        true
    }

    fn owner_notifier(&self) -> Option<Arc<dyn Notifier>> {
        self.registry.lock().workers[WorkerId::OWNER.index()].notifier.clone()
    }
}

impl Drop for PoolShared {
    fn drop(&mut self) {
        tracing::debug!(target: "workerpool", "worker pool drained");
    }
}

/// A worker's view of its pool
///
/// This is what an interpreter binds to expose `google.gears.workerPool`. It
/// can be cloned and sent across threads; every call acts on behalf of the
/// worker it was created for.
#[derive(Clone)]
pub struct WorkerScope {
    shared: Arc<PoolShared>,
    id: WorkerId,
}

impl WorkerScope {
    pub(crate) fn new(shared: Arc<PoolShared>, id: WorkerId) -> Self {
        Self { shared, id }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn page_origin(&self) -> &SecurityOrigin {
        &self.shared.page_origin
    }

    /// Origin of the script this worker runs
    pub fn origin(&self) -> SecurityOrigin {
        self.shared.script_origin(self.id)
    }

    pub fn create_worker(&self, source: WorkerSource) -> Result<WorkerId> {
        self.shared.create_worker(self.id, source)
    }

    pub fn send_message(&self, text: impl Into<String>, dest: WorkerId) -> Result<()> {
        self.shared.put_message(self.id, text.into(), dest)
    }

    /// Install the message handler, returning the one it replaces
    pub fn set_on_message(&self, handler: Option<CallbackId>) -> Result<Option<CallbackId>> {
        self.shared.set_on_message(self.id, handler)
    }

    /// Install the error handler, returning the one it replaces
    ///
    /// Only the pool owner may do this.
    pub fn set_on_error(&self, handler: Option<CallbackId>) -> Result<Option<CallbackId>> {
        self.shared.set_on_error(self.id, handler)
    }

    pub fn on_message(&self) -> Option<CallbackId> {
        self.shared.message_handler(self.id)
    }

    pub fn on_error(&self) -> Option<CallbackId> {
        self.shared.error_handler(self.id)
    }

    pub fn allow_cross_origin(&self) {
        self.shared.allow_cross_origin(self.id)
    }

    pub fn is_cross_origin_suspended(&self) -> bool {
        self.shared.is_cross_origin_suspended(self.id)
    }

    /// Turn a script error into an error event for the pool owner
    pub fn report_error(&self, error: &ScriptError) {
        self.shared.post_error(self.id, error)
    }
}

impl std::fmt::Debug for WorkerScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerScope").field("id", &self.id).finish()
    }
}

/// Builder for [`WorkerPool`]
pub struct WorkerPoolBuilder {
    config: PoolConfig,
    fetcher: Option<Arc<dyn ScriptFetcher>>,
    fetch_runtime: Option<Handle>,
}

impl WorkerPoolBuilder {
    /// Use a custom script fetcher instead of HTTP
    pub fn fetcher(mut self, fetcher: Arc<dyn ScriptFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Run fetches on an existing tokio runtime instead of a private one
    pub fn fetch_runtime(mut self, handle: Handle) -> Self {
        self.fetch_runtime = Some(handle);
        self
    }

    /// Create the pool, binding `root` as worker 0's interpreter
    pub fn build(
        self,
        factory: Arc<dyn InterpreterFactory>,
        root: Box<dyn Interpreter>,
    ) -> Result<WorkerPool> {
        self.config.validate()?;
        let page_origin = self.config.page_origin()?;

        let (runtime, handle) = match self.fetch_runtime {
            Some(handle) => (None, handle),
            None => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(1)
                    .thread_name(format!("{}-fetch", self.config.thread_name_prefix))
                    .enable_all()
                    .build()?;
                let handle = runtime.handle().clone();
                (Some(runtime), handle)
            }
        };

        let fetcher: Arc<dyn ScriptFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpScriptFetcher::new(self.config.fetch_timeout())),
        };

        tracing::info!(target: "workerpool", page = %page_origin, "worker pool created");

        let shared = Arc::new(PoolShared::new(self.config, page_origin, factory, fetcher, handle));
        let mut pool = WorkerPool {
            shared,
            interpreter: root,
            unhandled_errors: Vec::new(),
            fetch_runtime: runtime,
        };
        let scope = pool.scope();
        pool.interpreter.bind_worker_pool(scope)?;
        Ok(pool)
    }
}

/// The pool owner's handle, held by worker 0
///
/// Worker 0 runs on the thread that created the pool and is never spawned. Its
/// incoming messages are delivered when the host calls
/// [`WorkerPool::dispatch_pending`] or [`WorkerPool::pump_for`]. Dropping the
/// handle shuts the pool down without waiting for worker threads.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    interpreter: Box<dyn Interpreter>,
    unhandled_errors: Vec<String>,
    fetch_runtime: Option<Runtime>,
}

impl WorkerPool {
    pub fn builder(config: PoolConfig) -> WorkerPoolBuilder {
        WorkerPoolBuilder {
            config,
            fetcher: None,
            fetch_runtime: None,
        }
    }

    /// Pool with an HTTP fetcher on its own fetch runtime
    pub fn new(
        config: PoolConfig,
        factory: Arc<dyn InterpreterFactory>,
        root: Box<dyn Interpreter>,
    ) -> Result<Self> {
        Self::builder(config).build(factory, root)
    }

    pub fn id(&self) -> WorkerId {
        WorkerId::OWNER
    }

    /// Scope acting as worker 0
    pub fn scope(&self) -> WorkerScope {
        WorkerScope::new(Arc::clone(&self.shared), WorkerId::OWNER)
    }

    pub fn page_origin(&self) -> &SecurityOrigin {
        &self.shared.page_origin
    }

    pub fn interpreter_mut(&mut self) -> &mut dyn Interpreter {
        self.interpreter.as_mut()
    }

    /// Run host script in worker 0's interpreter
    pub fn evaluate(&mut self, source: &str, filename: &str) -> std::result::Result<(), ScriptError> {
        self.interpreter.evaluate(source, filename)
    }

    pub fn create_worker(&self, source: WorkerSource) -> Result<WorkerId> {
        self.shared.create_worker(WorkerId::OWNER, source)
    }

    pub fn send_message(&self, text: impl Into<String>, dest: WorkerId) -> Result<()> {
        self.shared.put_message(WorkerId::OWNER, text.into(), dest)
    }

    /// Install worker 0's message handler, releasing the one it replaces
    pub fn set_on_message(&mut self, handler: Option<CallbackId>) -> Result<()> {
        let previous = self.shared.set_on_message(WorkerId::OWNER, handler)?;
        self.release_replaced(previous, handler);
        Ok(())
    }

    /// Install worker 0's error handler, releasing the one it replaces
    pub fn set_on_error(&mut self, handler: Option<CallbackId>) -> Result<()> {
        let previous = self.shared.set_on_error(WorkerId::OWNER, handler)?;
        self.release_replaced(previous, handler);
        Ok(())
    }

    fn release_replaced(&mut self, previous: Option<CallbackId>, current: Option<CallbackId>) {
        if let Some(previous) = previous {
            if Some(previous) != current {
                self.interpreter.release_callback(previous);
            }
        }
    }

    pub fn allow_cross_origin(&self) {
        self.shared.allow_cross_origin(WorkerId::OWNER)
    }

    /// Deliver every message queued for worker 0
    ///
    /// Returns the number of messages delivered. Delivers nothing once the
    /// pool is shutting down.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(message) = self.shared.next_message(WorkerId::OWNER) {
            delivered += 1;
            if let Err(err) =
                worker::dispatch(&self.shared, self.interpreter.as_mut(), WorkerId::OWNER, &message)
            {
                self.report_unhandled(err);
            }
        }
        delivered
    }

    fn report_unhandled(&mut self, error: ScriptError) {
        let text = error.to_string();
        tracing::error!(target: "workerpool", "unhandled worker error: {}", text);
        self.unhandled_errors.push(text);
    }

    /// Block until something is queued for worker 0 or `timeout` elapses
    pub fn wait_for_activity(&self, timeout: Duration) -> bool {
        match self.shared.owner_notifier() {
            Some(notifier) => notifier.wait_timeout(timeout),
            None => false,
        }
    }

    /// Deliver worker 0's messages as they arrive, for up to `duration`
    pub fn pump_for(&mut self, duration: Duration) -> usize {
        let deadline = Instant::now() + duration;
        let mut delivered = self.dispatch_pending();
        loop {
            let now = Instant::now();
            if now >= deadline || self.is_shutting_down() {
                break;
            }
            if self.wait_for_activity(deadline - now) {
                delivered += self.dispatch_pending();
            }
        }
        delivered
    }

    /// Errors that reached worker 0 with no `onerror` handler to take them
    pub fn take_unhandled_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.unhandled_errors)
    }

    /// Stop every worker. Idempotent; does not wait for threads to exit.
    pub fn shutdown(&self) {
        self.shared.shutdown()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.is_shutting_down()
    }

    /// Wait for every spawned worker to terminate and join its thread
    ///
    /// Returns `false` if some worker was still alive at the deadline.
    pub fn wait_for_termination(&self, timeout: Duration) -> bool {
        self.shared.wait_for_termination(timeout)
    }

    /// Number of workers ever created, including worker 0
    pub fn worker_count(&self) -> usize {
        self.shared.registry.lock().workers.len()
    }

    pub fn worker_state(&self, id: WorkerId) -> Option<ThreadState> {
        self.shared
            .registry
            .lock()
            .workers
            .get(id.index())
            .map(|r| r.thread_state)
    }

    pub fn pending_messages(&self, id: WorkerId) -> usize {
        self.shared
            .registry
            .lock()
            .workers
            .get(id.index())
            .map_or(0, |r| r.message_queue.len())
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<PoolShared> {
        &self.shared
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(runtime) = self.fetch_runtime.take() {
            runtime.shutdown_background();
        }
    }
}
