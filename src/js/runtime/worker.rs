// Worker thread body and message delivery

use super::current::set_current_worker_id;
use super::message::{Message, MessageKind, WorkerId};
use super::notifier::Notifier;
use super::pool::{PoolShared, WorkerScope};
use super::record::{ScriptPayload, ThreadState};
use crate::js::error::ScriptError;
use crate::js::interpreter::{CallbackId, Interpreter, ObjectHandle, ScriptValue};
use std::sync::Arc;

const NO_HANDLER_MESSAGE: &str =
    "Could not process message because worker does not have an onmessage handler.";

/// Marks the worker terminated however the thread exits, panics included
struct Teardown<'a> {
    shared: &'a PoolShared,
    id: WorkerId,
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        self.shared.mark_terminated(self.id);
        set_current_worker_id(None);
        tracing::debug!(target: "workerpool", worker = %self.id, "worker terminated");
    }
}

/// Entry point of every spawned worker thread
#[tracing::instrument(name = "worker", target = "workerpool", level = "debug", skip_all, fields(id = %id))]
pub(crate) fn run_worker_thread(shared: Arc<PoolShared>, id: WorkerId) {
    set_current_worker_id(Some(id));
    let _teardown = Teardown {
        shared: &shared,
        id,
    };

    let mut interpreter = match shared.factory().new_interpreter() {
        Ok(interpreter) => interpreter,
        Err(err) => {
            tracing::warn!(target: "workerpool", worker = %id, error = %err, "failed to create interpreter");
            shared.fail_worker_init(id, format!("failed to create interpreter: {}", err));
            return;
        }
    };

    let Some((notifier, script)) = shared.init_worker_thread(id) else {
        return;
    };

    script.wait();
    if let Some(payload) = shared.take_script(id) {
        run_script(&shared, interpreter.as_mut(), id, payload);
    }

    if !shared.is_shutting_down() {
        shared.set_state(id, ThreadState::Running);
        pump(&shared, interpreter.as_mut(), id, notifier.as_ref());
    }

    shared.set_state(id, ThreadState::ShuttingDown);
    drop(interpreter);
}

fn run_script(shared: &Arc<PoolShared>, interpreter: &mut dyn Interpreter, id: WorkerId, payload: ScriptPayload) {
    if let Err(err) = interpreter.bind_worker_pool(WorkerScope::new(Arc::clone(shared), id)) {
        shared.handle_error(&err);
        return;
    }
    if let Err(err) = interpreter.evaluate(&payload.text, &payload.source_name) {
        shared.handle_error(&err);
    }
}

fn pump(shared: &PoolShared, interpreter: &mut dyn Interpreter, id: WorkerId, notifier: &dyn Notifier) {
    loop {
        notifier.wait();
        if shared.is_shutting_down() {
            break;
        }
        while let Some(message) = shared.next_message(id) {
            if let Err(err) = dispatch(shared, interpreter, id, &message) {
                shared.handle_error(&err);
            }
        }
    }
}

/// Deliver one message to the worker's handlers
///
/// A missing `onmessage` handler is reported as an error event on the
/// worker's behalf. Any error left over after that, thrown by a handler or
/// re-raised because there was no `onerror`, is returned to the caller.
pub(crate) fn dispatch(
    shared: &PoolShared,
    interpreter: &mut dyn Interpreter,
    id: WorkerId,
    message: &Message,
) -> Result<(), ScriptError> {
    match message.kind {
        MessageKind::Message => match shared.message_handler(id) {
            Some(callback) => invoke_on_message(interpreter, callback, message),
            None => {
                shared.post_error(id, &ScriptError::new(NO_HANDLER_MESSAGE));
                Ok(())
            }
        },
        MessageKind::Error => match shared.error_handler(id) {
            Some(callback) => invoke_on_error(interpreter, callback, message),
            None => interpreter.raise_global_error(&message.text),
        },
    }
}

fn invoke_on_message(
    interpreter: &mut dyn Interpreter,
    callback: CallbackId,
    message: &Message,
) -> Result<(), ScriptError> {
    let details = interpreter.new_object(None)?;
    let result = fill_and_invoke(
        interpreter,
        details,
        &[
            ("text", ScriptValue::from(message.text.as_str())),
            ("sender", ScriptValue::from(message.sender.0)),
            ("origin", ScriptValue::from(message.origin.url())),
        ],
        callback,
        vec![
            ScriptValue::from(message.text.as_str()),
            ScriptValue::from(message.sender.0),
        ],
    );
    interpreter.release_object(details);
    result
}

fn invoke_on_error(
    interpreter: &mut dyn Interpreter,
    callback: CallbackId,
    message: &Message,
) -> Result<(), ScriptError> {
    let error = interpreter.new_object(Some("Error"))?;
    let result = fill_and_invoke(
        interpreter,
        error,
        &[("message", ScriptValue::from(message.text.as_str()))],
        callback,
        Vec::new(),
    );
    interpreter.release_object(error);
    result
}

/// Set `properties` on `object`, then call `callback` with `leading` followed
/// by the object
fn fill_and_invoke(
    interpreter: &mut dyn Interpreter,
    object: ObjectHandle,
    properties: &[(&str, ScriptValue)],
    callback: CallbackId,
    mut leading: Vec<ScriptValue>,
) -> Result<(), ScriptError> {
    for (name, value) in properties {
        interpreter.set_property(object, name, value.clone())?;
    }
    leading.push(ScriptValue::Object(object));
    interpreter.invoke(callback, &leading)
}
