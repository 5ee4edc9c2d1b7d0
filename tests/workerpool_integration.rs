// Integration tests running real QuickJS workers
//
// These tests verify end-to-end functionality of:
// - Message round trips between the owner and script workers
// - Error events bubbling from nested workers to worker 0
// - Permission and argument errors raised into worker scripts
//
// Run with: cargo test --test workerpool_integration

#![cfg(feature = "js-runtime")]

use workerpool::js::{
    CallbackId, Interpreter, ObjectHandle, PoolConfig, QuickJsFactory, ScriptError, ScriptValue,
    WorkerId, WorkerPool, WorkerScope, WorkerSource,
};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const ON_MESSAGE: CallbackId = CallbackId(1);
const ON_ERROR: CallbackId = CallbackId(2);

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Message {
        text: String,
        sender: u32,
        origin: String,
    },
    Error(String),
}

/// Stands in for the page: records what worker 0's handlers receive
struct RecordingRoot {
    events: Arc<Mutex<Vec<Event>>>,
    objects: HashMap<u32, Vec<(String, ScriptValue)>>,
    next_object: u32,
}

impl RecordingRoot {
    fn new() -> (Self, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let root = Self {
            events: events.clone(),
            objects: HashMap::new(),
            next_object: 0,
        };
        (root, events)
    }

    fn property(&self, value: &ScriptValue, name: &str) -> Option<ScriptValue> {
        let ScriptValue::Object(handle) = value else {
            return None;
        };
        self.objects
            .get(&handle.0)?
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }
}

impl Interpreter for RecordingRoot {
    fn evaluate(&mut self, _source: &str, _filename: &str) -> Result<(), ScriptError> {
        Ok(())
    }

    fn invoke(&mut self, callback: CallbackId, args: &[ScriptValue]) -> Result<(), ScriptError> {
        let event = if callback == ON_MESSAGE {
            Event::Message {
                text: args[0].as_str().unwrap_or_default().to_string(),
                sender: args[1].as_number().unwrap_or(-1.0) as u32,
                origin: self
                    .property(&args[2], "origin")
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default(),
            }
        } else {
            Event::Error(
                self.property(&args[0], "message")
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default(),
            )
        };
        self.events.lock().push(event);
        Ok(())
    }

    fn new_object(&mut self, _constructor: Option<&str>) -> Result<ObjectHandle, ScriptError> {
        let handle = ObjectHandle(self.next_object);
        self.next_object += 1;
        self.objects.insert(handle.0, Vec::new());
        Ok(handle)
    }

    fn set_property(
        &mut self,
        object: ObjectHandle,
        name: &str,
        value: ScriptValue,
    ) -> Result<(), ScriptError> {
        if let Some(properties) = self.objects.get_mut(&object.0) {
            properties.push((name.to_string(), value));
        }
        Ok(())
    }

    fn release_object(&mut self, object: ObjectHandle) {
        self.objects.remove(&object.0);
    }

    fn release_callback(&mut self, _callback: CallbackId) {}

    fn bind_worker_pool(&mut self, _scope: WorkerScope) -> Result<(), ScriptError> {
        Ok(())
    }
}

fn start_pool() -> (WorkerPool, Arc<Mutex<Vec<Event>>>) {
    let config = PoolConfig::default().with_page_url("https://app.example.com/index.html");
    let factory = Arc::new(QuickJsFactory::from_config(&config));
    let (root, events) = RecordingRoot::new();

    let mut pool = WorkerPool::new(config, factory, Box::new(root)).unwrap();
    pool.set_on_message(Some(ON_MESSAGE)).unwrap();
    pool.set_on_error(Some(ON_ERROR)).unwrap();
    (pool, events)
}

fn pump_until(pool: &mut WorkerPool, events: &Mutex<Vec<Event>>, count: usize) -> Vec<Event> {
    let deadline = Instant::now() + Duration::from_secs(10);
    while events.lock().len() < count && Instant::now() < deadline {
        pool.pump_for(Duration::from_millis(20));
    }
    events.lock().clone()
}

fn stop(pool: WorkerPool) {
    pool.shutdown();
    assert!(pool.wait_for_termination(Duration::from_secs(5)));
}

#[test]
fn ping_pong() {
    let (mut pool, events) = start_pool();

    let worker = pool
        .create_worker(WorkerSource::Inline(
            r#"
            const wp = google.gears.workerPool;
            wp.onmessage = (text, sender, message) => {
                wp.sendMessage(text + '-pong:' + message.origin, sender);
            };
            "#
            .to_string(),
        ))
        .unwrap();
    pool.send_message("ping", worker).unwrap();

    let events = pump_until(&mut pool, &events, 1);
    assert_eq!(
        events,
        vec![Event::Message {
            text: "ping-pong:https://app.example.com".to_string(),
            sender: worker.0,
            origin: "https://app.example.com".to_string(),
        }]
    );

    stop(pool);
}

#[test]
fn error_in_nested_worker_reaches_owner() {
    let (mut pool, events) = start_pool();

    pool.create_worker(WorkerSource::Inline(
        r#"
        const wp = google.gears.workerPool;
        wp.createWorker("var x = 1;\nthrow new Error('deep');");
        "#
        .to_string(),
    ))
    .unwrap();

    let events = pump_until(&mut pool, &events, 1);
    assert_eq!(events.len(), 1);
    match &events[0] {
        Event::Error(message) => {
            assert!(message.starts_with("Error in worker 2"), "{message}");
            assert!(message.ends_with("deep"), "{message}");
        }
        other => panic!("expected an error event, got {other:?}"),
    }

    stop(pool);
}

#[test]
fn worker_cannot_install_onerror() {
    let (mut pool, events) = start_pool();

    pool.create_worker(WorkerSource::Inline(
        r#"
        const wp = google.gears.workerPool;
        try {
            wp.onerror = () => {};
            wp.sendMessage('allowed', 0);
        } catch (e) {
            wp.sendMessage(e.message, 0);
        }
        "#
        .to_string(),
    ))
    .unwrap();

    let events = pump_until(&mut pool, &events, 1);
    assert!(matches!(
        &events[0],
        Event::Message { text, .. } if text == "The onerror property cannot be set from inside a worker"
    ));

    stop(pool);
}

#[test]
fn script_argument_errors_are_thrown() {
    let (mut pool, events) = start_pool();

    pool.create_worker(WorkerSource::Inline(
        r#"
        const wp = google.gears.workerPool;
        try { wp.onmessage = 5; } catch (e) { wp.sendMessage(e.message, 0); }
        try { wp.sendMessage('x', 999); } catch (e) { wp.sendMessage(e.message, 0); }
        try { google.gears.factory.create('beta.database'); } catch (e) { wp.sendMessage(e.message, 0); }
        "#
        .to_string(),
    ))
    .unwrap();

    let texts: Vec<_> = pump_until(&mut pool, &events, 3)
        .into_iter()
        .filter_map(|event| match event {
            Event::Message { text, .. } => Some(text),
            Event::Error(_) => None,
        })
        .collect();
    assert_eq!(
        texts,
        vec![
            "The onmessage callback must be a function.".to_string(),
            "Worker 999 does not exist.".to_string(),
            "Unknown object.".to_string(),
        ]
    );

    stop(pool);
}

#[test]
fn missing_onmessage_is_reported_once() {
    let (mut pool, recorded) = start_pool();

    let worker = pool
        .create_worker(WorkerSource::Inline("var idle = true;".to_string()))
        .unwrap();
    pool.send_message("anyone there?", worker).unwrap();

    pump_until(&mut pool, &recorded, 1);
    pool.pump_for(Duration::from_millis(50));
    assert_eq!(
        *recorded.lock(),
        vec![Event::Error(
            "Error in worker 1. Could not process message because worker does not have an onmessage handler."
                .to_string()
        )]
    );

    stop(pool);
}

#[test]
fn handler_exception_keeps_worker_alive() {
    let (mut pool, events) = start_pool();

    let worker = pool
        .create_worker(WorkerSource::Inline(
            r#"
            const wp = google.gears.workerPool;
            wp.onmessage = (text, sender) => {
                if (text === 'bad') {
                    throw new Error('handler failed');
                }
                wp.sendMessage('ok:' + text, sender);
            };
            "#
            .to_string(),
        ))
        .unwrap();
    pool.send_message("bad", worker).unwrap();
    pool.send_message("good", worker).unwrap();

    let events = pump_until(&mut pool, &events, 2);
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], Event::Error(m) if m.starts_with("Error in worker 1") && m.ends_with("handler failed")));
    assert!(matches!(&events[1], Event::Message { text, .. } if text == "ok:good"));

    stop(pool);
}

#[test]
fn factory_returns_the_bound_pool() {
    let (mut pool, events) = start_pool();

    pool.create_worker(WorkerSource::Inline(
        "google.gears.factory.create('beta.workerpool').sendMessage('via factory', 0);".to_string(),
    ))
    .unwrap();

    let events = pump_until(&mut pool, &events, 1);
    assert!(matches!(
        &events[0],
        Event::Message { text, sender: 1, .. } if text == "via factory"
    ));

    stop(pool);
}

#[test]
fn workers_message_each_other() {
    let (mut pool, events) = start_pool();

    // Worker 1 spawns worker 2 and forwards its reply to the owner.
    pool.create_worker(WorkerSource::Inline(
        r#"
        const wp = google.gears.workerPool;
        wp.onmessage = (text, sender) => {
            if (sender === 0) {
                const child = wp.createWorker(
                    "google.gears.workerPool.onmessage = (t, s) => google.gears.workerPool.sendMessage(t.toUpperCase(), s);");
                wp.sendMessage(text, child);
            } else {
                wp.sendMessage(text + ' from ' + sender, 0);
            }
        };
        "#
        .to_string(),
    ))
    .unwrap();
    pool.send_message("relay", WorkerId(1)).unwrap();

    let events = pump_until(&mut pool, &events, 1);
    assert!(matches!(
        &events[0],
        Event::Message { text, sender: 1, .. } if text == "RELAY from 2"
    ));
    assert_eq!(pool.worker_count(), 3);

    stop(pool);
}
