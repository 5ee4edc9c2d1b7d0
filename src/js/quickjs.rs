// QuickJS-backed interpreter for worker threads

use crate::js::config::PoolConfig;
use crate::js::error::{ScriptError, WorkerPoolError};
use crate::js::interpreter::{CallbackId, Interpreter, InterpreterFactory, ObjectHandle, ScriptValue};
use crate::js::runtime::{current_worker_id, WorkerId, WorkerScope, WorkerSource};
use rquickjs::{Context, Ctx, Exception, Function, IntoJs, Runtime, Value};

/// Builds one [`QuickJsInterpreter`] per worker thread
#[derive(Debug, Clone)]
pub struct QuickJsFactory {
    memory_limit: usize,
    max_stack_size: usize,
    max_pending_jobs: usize,
}

impl QuickJsFactory {
    pub fn from_config(config: &PoolConfig) -> Self {
        Self {
            memory_limit: config.memory_limit,
            max_stack_size: config.max_stack_size,
            max_pending_jobs: config.max_pending_jobs,
        }
    }

    /// Create an interpreter for the current thread
    pub fn create(&self) -> Result<QuickJsInterpreter, ScriptError> {
        QuickJsInterpreter::new(self.memory_limit, self.max_stack_size, self.max_pending_jobs)
    }
}

impl Default for QuickJsFactory {
    fn default() -> Self {
        Self::from_config(&PoolConfig::default())
    }
}

impl InterpreterFactory for QuickJsFactory {
    fn new_interpreter(&self) -> Result<Box<dyn Interpreter>, ScriptError> {
        Ok(Box::new(self.create()?))
    }
}

/// A QuickJS runtime and context owned by one thread
///
/// Callbacks and objects handed to the pool stay inside the context, in
/// tables keyed by id; the pool only ever sees the ids.
pub struct QuickJsInterpreter {
    runtime: Runtime,
    context: Context,
    max_pending_jobs: usize,
    next_object: u32,
}

impl QuickJsInterpreter {
    fn new(memory_limit: usize, max_stack_size: usize, max_pending_jobs: usize) -> Result<Self, ScriptError> {
        let runtime = Runtime::new()
            .map_err(|e| ScriptError::new(format!("failed to create QuickJS runtime: {}", e)))?;
        if memory_limit > 0 {
            runtime.set_memory_limit(memory_limit);
        }
        if max_stack_size > 0 {
            runtime.set_max_stack_size(max_stack_size);
        }
        let context = Context::full(&runtime)
            .map_err(|e| ScriptError::new(format!("failed to create QuickJS context: {}", e)))?;

        let interpreter = Self {
            runtime,
            context,
            max_pending_jobs,
            next_object: 0,
        };
        interpreter.init_globals()?;
        Ok(interpreter)
    }

    fn init_globals(&self) -> Result<(), ScriptError> {
        self.run(|ctx| {
            let global = ctx.globals();
            let log_fn = Function::new(ctx.clone(), log_from_js)?.with_name("__wp_log")?;
            global.set("__wp_log", log_fn)?;
            ctx.eval::<(), _>(RUNTIME_BOOTSTRAP.as_bytes())
        })
    }

    /// Run `f` inside the context, turning a pending exception into a
    /// [`ScriptError`], then drain promise jobs
    fn run<T, F>(&self, f: F) -> Result<T, ScriptError>
    where
        F: for<'js> FnOnce(&Ctx<'js>) -> rquickjs::Result<T>,
    {
        let result = self.context.with(|ctx| match f(&ctx) {
            Ok(value) => Ok(value),
            Err(rquickjs::Error::Exception) => Err(capture_exception(&ctx)),
            Err(err) => Err(ScriptError::new(err.to_string())),
        });
        self.execute_pending_jobs();
        result
    }

    fn execute_pending_jobs(&self) {
        let mut job_count = 0;
        while self.runtime.is_job_pending() {
            match self.runtime.execute_pending_job() {
                Ok(true) => {
                    job_count += 1;
                    if job_count >= self.max_pending_jobs {
                        tracing::warn!(
                            target: "quickjs",
                            "Stopped processing jobs after {} iterations (possible infinite loop)",
                            job_count
                        );
                        break;
                    }
                }
                Ok(false) => break,
                Err(job_exception) => {
                    tracing::error!(target: "quickjs", "Job execution error: {:?}", job_exception);
                    break;
                }
            }
        }
        if job_count > 0 {
            tracing::trace!(target: "quickjs", "Executed {} pending jobs", job_count);
        }
    }
}

impl Interpreter for QuickJsInterpreter {
    fn evaluate(&mut self, source: &str, filename: &str) -> Result<(), ScriptError> {
        let script = with_source_url(source, filename);
        self.run(|ctx| ctx.eval::<(), _>(script))
    }

    fn invoke(&mut self, callback: CallbackId, args: &[ScriptValue]) -> Result<(), ScriptError> {
        self.run(|ctx| {
            let array = rquickjs::Array::new(ctx.clone())?;
            for (index, arg) in args.iter().enumerate() {
                array.set(index, to_js(ctx, arg)?)?;
            }
            helper(ctx, "__wp_invoke")?.call::<_, ()>((callback.0, array))
        })
    }

    fn new_object(&mut self, constructor: Option<&str>) -> Result<ObjectHandle, ScriptError> {
        let handle = ObjectHandle(self.next_object);
        self.next_object = self.next_object.wrapping_add(1);
        self.run(|ctx| helper(ctx, "__wp_new_object")?.call::<_, ()>((handle.0, constructor)))?;
        Ok(handle)
    }

    fn set_property(&mut self, object: ObjectHandle, name: &str, value: ScriptValue) -> Result<(), ScriptError> {
        self.run(|ctx| {
            let value = to_js(ctx, &value)?;
            helper(ctx, "__wp_set_property")?.call::<_, ()>((object.0, name, value))
        })
    }

    fn release_object(&mut self, object: ObjectHandle) {
        if let Err(err) = self.run(|ctx| helper(ctx, "__wp_release_object")?.call::<_, ()>((object.0,))) {
            tracing::debug!(target: "quickjs", "failed to release object: {}", err);
        }
    }

    fn release_callback(&mut self, callback: CallbackId) {
        if let Err(err) = self.run(|ctx| helper(ctx, "__wp_release_callback")?.call::<_, ()>((callback.0,))) {
            tracing::debug!(target: "quickjs", "failed to release callback: {}", err);
        }
    }

    fn bind_worker_pool(&mut self, scope: WorkerScope) -> Result<(), ScriptError> {
        self.run(|ctx| {
            install_pool_natives(ctx, &scope)?;
            ctx.eval::<(), _>(WORKER_POOL_BOOTSTRAP.as_bytes())
        })
    }

    /// Hand the error to a global `onerror` function, if the script defined
    /// one that returns `true`
    fn raise_global_error(&mut self, message: &str) -> Result<(), ScriptError> {
        let handled = self.run(|ctx| helper(ctx, "__wp_raise")?.call::<_, bool>((message,)))?;
        if handled {
            Ok(())
        } else {
            Err(ScriptError::new(message))
        }
    }
}

fn helper<'js>(ctx: &Ctx<'js>, name: &str) -> rquickjs::Result<Function<'js>> {
    ctx.globals().get(name)
}

fn to_js<'js>(ctx: &Ctx<'js>, value: &ScriptValue) -> rquickjs::Result<Value<'js>> {
    match value {
        ScriptValue::Undefined => Ok(Value::new_undefined(ctx.clone())),
        ScriptValue::Bool(b) => b.into_js(ctx),
        ScriptValue::Number(n) => n.into_js(ctx),
        ScriptValue::String(s) => s.as_str().into_js(ctx),
        ScriptValue::Object(handle) => helper(ctx, "__wp_object")?.call((handle.0,)),
    }
}

fn install_pool_natives(ctx: &Ctx<'_>, scope: &WorkerScope) -> rquickjs::Result<()> {
    let global = ctx.globals();

    {
        let scope = scope.clone();
        let func = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'_>, text: String| -> rquickjs::Result<u32> {
                scope
                    .create_worker(WorkerSource::Inline(text))
                    .map(|id| id.0)
                    .map_err(|e| throw_pool_error(&ctx, e))
            },
        )?
        .with_name("__wp_create_worker")?;
        global.set("__wp_create_worker", func)?;
    }

    {
        let scope = scope.clone();
        let func = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'_>, url: String| -> rquickjs::Result<u32> {
                scope
                    .create_worker(WorkerSource::Url(url))
                    .map(|id| id.0)
                    .map_err(|e| throw_pool_error(&ctx, e))
            },
        )?
        .with_name("__wp_create_worker_from_url")?;
        global.set("__wp_create_worker_from_url", func)?;
    }

    {
        let scope = scope.clone();
        let func = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'_>, text: String, dest: f64| -> rquickjs::Result<()> {
                let Some(dest) = worker_id_from_js(dest) else {
                    return Err(Exception::throw_message(
                        &ctx,
                        &format!("Worker {} does not exist.", dest),
                    ));
                };
                scope
                    .send_message(text, dest)
                    .map_err(|e| throw_pool_error(&ctx, e))
            },
        )?
        .with_name("__wp_send_message")?;
        global.set("__wp_send_message", func)?;
    }

    {
        let scope = scope.clone();
        let func = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'_>, id: Option<u32>| -> rquickjs::Result<()> {
                let handler = id.map(CallbackId);
                let previous = scope
                    .set_on_message(handler)
                    .map_err(|e| throw_pool_error(&ctx, e))?;
                release_replaced(&ctx, previous, handler)
            },
        )?
        .with_name("__wp_set_onmessage")?;
        global.set("__wp_set_onmessage", func)?;
    }

    {
        let scope = scope.clone();
        let func = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'_>, id: Option<u32>| -> rquickjs::Result<()> {
                let handler = id.map(CallbackId);
                let previous = scope
                    .set_on_error(handler)
                    .map_err(|e| throw_pool_error(&ctx, e))?;
                release_replaced(&ctx, previous, handler)
            },
        )?
        .with_name("__wp_set_onerror")?;
        global.set("__wp_set_onerror", func)?;
    }

    {
        let scope = scope.clone();
        let func = Function::new(ctx.clone(), move || -> rquickjs::Result<Option<u32>> {
            Ok(scope.on_message().map(|c| c.0))
        })?
        .with_name("__wp_get_onmessage")?;
        global.set("__wp_get_onmessage", func)?;
    }

    {
        let scope = scope.clone();
        let func = Function::new(ctx.clone(), move || -> rquickjs::Result<Option<u32>> {
            Ok(scope.on_error().map(|c| c.0))
        })?
        .with_name("__wp_get_onerror")?;
        global.set("__wp_get_onerror", func)?;
    }

    {
        let scope = scope.clone();
        let func = Function::new(ctx.clone(), move || -> rquickjs::Result<()> {
            scope.allow_cross_origin();
            Ok(())
        })?
        .with_name("__wp_allow_cross_origin")?;
        global.set("__wp_allow_cross_origin", func)?;
    }

    {
        let scope = scope.clone();
        let func = Function::new(ctx.clone(), move || -> rquickjs::Result<bool> {
            Ok(scope.is_cross_origin_suspended())
        })?
        .with_name("__wp_cross_origin_suspended")?;
        global.set("__wp_cross_origin_suspended", func)?;
    }

    Ok(())
}

fn release_replaced(ctx: &Ctx<'_>, previous: Option<CallbackId>, current: Option<CallbackId>) -> rquickjs::Result<()> {
    match previous {
        Some(previous) if Some(previous) != current => {
            helper(ctx, "__wp_release_callback")?.call::<_, ()>((previous.0,))
        }
        _ => Ok(()),
    }
}

fn throw_pool_error(ctx: &Ctx<'_>, err: WorkerPoolError) -> rquickjs::Error {
    let message = match err {
        WorkerPoolError::PermissionDenied(message) => message,
        other => other.to_string(),
    };
    Exception::throw_message(ctx, &message)
}

fn worker_id_from_js(value: f64) -> Option<WorkerId> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX) {
        Some(WorkerId(value as u32))
    } else {
        None
    }
}

fn log_from_js(level: String, message: String) -> rquickjs::Result<()> {
    let worker = current_worker_id().unwrap_or(WorkerId::OWNER);
    match level.as_str() {
        "error" => tracing::error!(target: "quickjs", worker = %worker, "{}", message),
        "warn" => tracing::warn!(target: "quickjs", worker = %worker, "{}", message),
        "debug" => tracing::debug!(target: "quickjs", worker = %worker, "{}", message),
        _ => tracing::info!(target: "quickjs", worker = %worker, "{}", message),
    }
    Ok(())
}

fn capture_exception(ctx: &Ctx<'_>) -> ScriptError {
    let exception: Value = ctx.catch();

    if let Some(obj) = exception.as_object() {
        if let Ok(message) = obj.get::<_, String>("message") {
            let line = obj.get::<_, u32>("lineNumber").ok().or_else(|| {
                obj.get::<_, String>("stack")
                    .ok()
                    .and_then(|stack| line_from_stack(&stack))
            });
            return ScriptError { message, line };
        }
    }

    if let Some(text) = exception.as_string().and_then(|s| s.to_string().ok()) {
        return ScriptError::new(text);
    }
    ScriptError::new(format!("{:?}", exception))
}

/// Line of the innermost frame in a QuickJS stack trace
///
/// Frames look like `at fn (file:line)` or `at fn (file:line:column)`.
fn line_from_stack(stack: &str) -> Option<u32> {
    let frame = stack.lines().find(|l| l.trim_start().starts_with("at "))?;
    let location = frame
        .rsplit_once('(')
        .map_or(frame, |(_, rest)| rest)
        .trim_end_matches(')');

    let mut parts = location.rsplit(':');
    let last = parts.next()?.trim().parse::<u32>().ok()?;
    match parts.next().and_then(|p| p.trim().parse::<u32>().ok()) {
        Some(line) => Some(line),
        None => Some(last),
    }
}

fn with_source_url(source: &str, filename: &str) -> Vec<u8> {
    let mut script = String::with_capacity(source.len() + filename.len() + 32);
    script.push_str(source);
    if !source.ends_with('\n') {
        script.push('\n');
    }
    script.push_str("//# sourceURL=");
    script.push_str(filename);
    script.push('\n');
    script.into_bytes()
}

const RUNTIME_BOOTSTRAP: &str = r#"
(() => {
    const global = globalThis;
    const callbacks = new Map();
    const objects = new Map();
    let nextCallback = 1;

    global.__wp_register_callback = (fn) => {
        const id = nextCallback++;
        callbacks.set(id, fn);
        return id;
    };
    global.__wp_release_callback = (id) => { callbacks.delete(id); };
    global.__wp_callback = (id) => (id === null || id === undefined) ? null : (callbacks.get(id) ?? null);
    global.__wp_invoke = (id, args) => {
        const fn = callbacks.get(id);
        if (typeof fn === 'function') {
            fn.apply(global, args);
        }
    };

    global.__wp_new_object = (id, ctorName) => {
        const ctor = ctorName ? global[ctorName] : null;
        objects.set(id, typeof ctor === 'function' ? new ctor() : {});
    };
    global.__wp_object = (id) => objects.get(id);
    global.__wp_set_property = (id, name, value) => { objects.get(id)[name] = value; };
    global.__wp_release_object = (id) => { objects.delete(id); };

    global.__wp_raise = (message) => {
        if (typeof global.onerror !== 'function') {
            return false;
        }
        return global.onerror(message) === true;
    };

    const stringify = (value) => {
        try {
            if (typeof value === 'string') {
                return value;
            }
            if (value === undefined) {
                return 'undefined';
            }
            if (value === null) {
                return 'null';
            }
            return String(value);
        } catch (err) {
            return '[unprintable]';
        }
    };
    const logAt = (level) => (...args) => {
        try {
            global.__wp_log(level, args.map(stringify).join(' '));
        } catch (err) {
            // console must never throw
        }
    };
    global.console = {
        log: logAt('info'),
        info: logAt('info'),
        debug: logAt('debug'),
        warn: logAt('warn'),
        error: logAt('error'),
    };
})();
"#;

const WORKER_POOL_BOOTSTRAP: &str = r#"
(() => {
    const global = globalThis;

    const bindHandler = (fn, name, set) => {
        if (fn === null || fn === undefined) {
            set(null);
            return;
        }
        if (typeof fn !== 'function') {
            throw new Error(`The ${name} callback must be a function.`);
        }
        const id = global.__wp_register_callback(fn);
        try {
            set(id);
        } catch (err) {
            global.__wp_release_callback(id);
            throw err;
        }
    };

    const workerPool = {
        createWorker(scriptText) {
            return global.__wp_create_worker(String(scriptText));
        },
        createWorkerFromUrl(url) {
            return global.__wp_create_worker_from_url(String(url));
        },
        sendMessage(text, destId) {
            global.__wp_send_message(String(text), Number(destId));
        },
        allowCrossOrigin() {
            global.__wp_allow_cross_origin();
        },
    };
    Object.defineProperty(workerPool, 'onmessage', {
        enumerable: true,
        get() { return global.__wp_callback(global.__wp_get_onmessage()); },
        set(fn) { bindHandler(fn, 'onmessage', global.__wp_set_onmessage); },
    });
    Object.defineProperty(workerPool, 'onerror', {
        enumerable: true,
        get() { return global.__wp_callback(global.__wp_get_onerror()); },
        set(fn) { bindHandler(fn, 'onerror', global.__wp_set_onerror); },
    });

    const factory = {
        create(name) {
            if (global.__wp_cross_origin_suspended()) {
                throw new Error('Object creation is suspended until allowCrossOrigin() is called.');
            }
            if (name !== 'beta.workerpool') {
                throw new Error('Unknown object.');
            }
            return workerPool;
        },
    };

    if (typeof global.google !== 'object' || global.google === null) {
        global.google = {};
    }
    if (typeof global.google.gears !== 'object' || global.google.gears === null) {
        global.google.gears = {};
    }
    global.google.gears.workerPool = workerPool;
    global.google.gears.factory = factory;
})();
"#;
