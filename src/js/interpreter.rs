// Interpreter collaborator interface
//
// The pool never looks inside a script engine. It only needs to create one
// interpreter per worker thread and drive it through this narrow interface.

use crate::js::error::ScriptError;
use crate::js::runtime::WorkerScope;

/// Handle to a callback function rooted inside one interpreter
///
/// Only meaningful to the interpreter that minted it. The pool stores it as
/// plain data so it can live in the shared registry, but it is only ever
/// invoked on the owning worker's thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(pub u32);

/// Handle to an object created with [`Interpreter::new_object`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub u32);

/// Values passed from the pool into script
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
    Object(ObjectHandle),
}

impl ScriptValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScriptValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::String(value.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        ScriptValue::String(value)
    }
}

impl From<u32> for ScriptValue {
    fn from(value: u32) -> Self {
        ScriptValue::Number(f64::from(value))
    }
}

/// One script-execution context, confined to the thread that created it
pub trait Interpreter {
    /// Run a script at the top level
    fn evaluate(&mut self, source: &str, filename: &str) -> Result<(), ScriptError>;

    /// Call a previously registered callback
    fn invoke(&mut self, callback: CallbackId, args: &[ScriptValue]) -> Result<(), ScriptError>;

    /// Create an object, optionally through a global constructor such as `Error`
    fn new_object(&mut self, constructor: Option<&str>) -> Result<ObjectHandle, ScriptError>;

    fn set_property(
        &mut self,
        object: ObjectHandle,
        name: &str,
        value: ScriptValue,
    ) -> Result<(), ScriptError>;

    fn release_object(&mut self, object: ObjectHandle);

    fn release_callback(&mut self, callback: CallbackId);

    /// Expose the worker pool API to scripts running in this interpreter
    fn bind_worker_pool(&mut self, scope: WorkerScope) -> Result<(), ScriptError>;

    /// Throw `message` as an uncaught error in this interpreter's global context
    ///
    /// Returns the resulting script error, if the interpreter reports it back
    /// instead of handling it itself.
    fn raise_global_error(&mut self, message: &str) -> Result<(), ScriptError> {
        Err(ScriptError::new(message))
    }
}

/// Creates interpreters on worker threads
pub trait InterpreterFactory: Send + Sync {
    fn new_interpreter(&self) -> Result<Box<dyn Interpreter>, ScriptError>;
}
