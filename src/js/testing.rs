//! Scripted interpreter double for exercising the pool without a JS engine.
//!
//! "Scripts" are Rust closures looked up by their source text, and callbacks
//! are closures looked up by id. Every callback invocation is recorded with
//! its arguments, objects expanded into their properties.

use crate::js::error::ScriptError;
use crate::js::interpreter::{CallbackId, Interpreter, InterpreterFactory, ObjectHandle, ScriptValue};
use crate::js::runtime::{current_worker_id, WorkerId, WorkerScope};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type ScriptFn = dyn Fn(&WorkerScope) -> Result<(), ScriptError> + Send + Sync;
type CallbackFn = dyn Fn(Option<&WorkerScope>, &[RecordedArg]) -> Result<(), ScriptError> + Send + Sync;

/// An argument as the callback saw it
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RecordedArg {
    Value(ScriptValue),
    Object {
        constructor: Option<String>,
        properties: Vec<(String, ScriptValue)>,
    },
}

impl RecordedArg {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RecordedArg::Value(value) => value.as_str(),
            RecordedArg::Object { .. } => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            RecordedArg::Value(value) => value.as_number(),
            RecordedArg::Object { .. } => None,
        }
    }

    pub fn property(&self, name: &str) -> Option<&ScriptValue> {
        match self {
            RecordedArg::Object { properties, .. } => properties
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value),
            RecordedArg::Value(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Invocation {
    /// Worker whose interpreter ran the callback; `None` if it was never bound
    pub worker: Option<WorkerId>,
    pub callback: CallbackId,
    pub args: Vec<RecordedArg>,
}

#[derive(Default)]
struct Shared {
    scripts: Mutex<HashMap<String, Arc<ScriptFn>>>,
    callbacks: Mutex<HashMap<CallbackId, Arc<CallbackFn>>>,
    invocations: Mutex<Vec<Invocation>>,
    released: Mutex<Vec<CallbackId>>,
    raised: Mutex<Vec<String>>,
    live_objects: AtomicUsize,
}

/// Factory handing out [`ScriptedInterpreter`]s that share one script table
#[derive(Clone, Default)]
pub(crate) struct ScriptedFactory {
    shared: Arc<Shared>,
    failure: Option<String>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose interpreters always fail to construct
    pub fn failing(reason: &str) -> Self {
        Self {
            shared: Arc::default(),
            failure: Some(reason.to_string()),
        }
    }

    pub fn on_script(
        &self,
        source: &str,
        script: impl Fn(&WorkerScope) -> Result<(), ScriptError> + Send + Sync + 'static,
    ) {
        self.shared
            .scripts
            .lock()
            .insert(source.to_string(), Arc::new(script));
    }

    pub fn on_callback(
        &self,
        id: CallbackId,
        callback: impl Fn(Option<&WorkerScope>, &[RecordedArg]) -> Result<(), ScriptError>
            + Send
            + Sync
            + 'static,
    ) {
        self.shared.callbacks.lock().insert(id, Arc::new(callback));
    }

    pub fn interpreter(&self) -> ScriptedInterpreter {
        ScriptedInterpreter {
            shared: Arc::clone(&self.shared),
            scope: None,
            objects: HashMap::new(),
            next_object: 0,
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.shared.invocations.lock().clone()
    }

    pub fn released_callbacks(&self) -> Vec<CallbackId> {
        self.shared.released.lock().clone()
    }

    /// Messages thrown through `raise_global_error`, in order
    pub fn raised_errors(&self) -> Vec<String> {
        self.shared.raised.lock().clone()
    }

    pub fn live_objects(&self) -> usize {
        self.shared.live_objects.load(Ordering::SeqCst)
    }
}

impl InterpreterFactory for ScriptedFactory {
    fn new_interpreter(&self) -> Result<Box<dyn Interpreter>, ScriptError> {
        match &self.failure {
            Some(reason) => Err(ScriptError::new(reason.clone())),
            None => Ok(Box::new(self.interpreter())),
        }
    }
}

struct RecordedObject {
    constructor: Option<String>,
    properties: Vec<(String, ScriptValue)>,
}

pub(crate) struct ScriptedInterpreter {
    shared: Arc<Shared>,
    scope: Option<WorkerScope>,
    objects: HashMap<u32, RecordedObject>,
    next_object: u32,
}

impl ScriptedInterpreter {
    fn record_arg(&self, value: &ScriptValue) -> RecordedArg {
        match value {
            ScriptValue::Object(handle) => match self.objects.get(&handle.0) {
                Some(object) => RecordedArg::Object {
                    constructor: object.constructor.clone(),
                    properties: object.properties.clone(),
                },
                None => RecordedArg::Value(value.clone()),
            },
            other => RecordedArg::Value(other.clone()),
        }
    }
}

impl Interpreter for ScriptedInterpreter {
    fn evaluate(&mut self, source: &str, _filename: &str) -> Result<(), ScriptError> {
        let script = self
            .shared
            .scripts
            .lock()
            .get(source)
            .cloned()
            .ok_or_else(|| ScriptError::new(format!("unknown script: {}", source)))?;
        let scope = self
            .scope
            .as_ref()
            .ok_or_else(|| ScriptError::new("worker pool not bound"))?;
        script(scope)
    }

    fn invoke(&mut self, callback: CallbackId, args: &[ScriptValue]) -> Result<(), ScriptError> {
        let recorded: Vec<_> = args.iter().map(|arg| self.record_arg(arg)).collect();
        self.shared.invocations.lock().push(Invocation {
            worker: self.scope.as_ref().map(WorkerScope::id),
            callback,
            args: recorded.clone(),
        });

        let handler = self.shared.callbacks.lock().get(&callback).cloned();
        match handler {
            Some(handler) => handler(self.scope.as_ref(), &recorded),
            None => Ok(()),
        }
    }

    fn new_object(&mut self, constructor: Option<&str>) -> Result<ObjectHandle, ScriptError> {
        let handle = ObjectHandle(self.next_object);
        self.next_object += 1;
        self.objects.insert(
            handle.0,
            RecordedObject {
                constructor: constructor.map(str::to_string),
                properties: Vec::new(),
            },
        );
        self.shared.live_objects.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn set_property(
        &mut self,
        object: ObjectHandle,
        name: &str,
        value: ScriptValue,
    ) -> Result<(), ScriptError> {
        let object = self
            .objects
            .get_mut(&object.0)
            .ok_or_else(|| ScriptError::new("unknown object"))?;
        object.properties.push((name.to_string(), value));
        Ok(())
    }

    fn release_object(&mut self, object: ObjectHandle) {
        if self.objects.remove(&object.0).is_some() {
            self.shared.live_objects.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn release_callback(&mut self, callback: CallbackId) {
        self.shared.released.lock().push(callback);
    }

    fn bind_worker_pool(&mut self, scope: WorkerScope) -> Result<(), ScriptError> {
        debug_assert!(current_worker_id().map_or(true, |id| id == scope.id()));
        self.scope = Some(scope);
        Ok(())
    }

    fn raise_global_error(&mut self, message: &str) -> Result<(), ScriptError> {
        self.shared.raised.lock().push(message.to_string());
        Err(ScriptError::new(message))
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub(crate) fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}
