use std::time::{Duration, Instant};

use crate::JSError;
use crate::core::descriptor::{
    Attributes, NONCONFIGURABLE_READONLY_NONENUMERABLE, NONENUMERABLE,
};
use crate::core::eval::NativeInfo;
use crate::core::frame::{Frame, ResumeToken, Scratch, Task};
use crate::core::parser;
use crate::core::scope::Scopes;
use crate::core::statement::Program;
use crate::core::value::{Heap, ObjectId, ScopeId, Throw, Value};
use crate::regexp_thread::{RegExpBackend, RegExpMode};

/// Interpreter tuning knobs, fixed at construction.
#[derive(Clone, Debug)]
pub struct Config {
    /// How user regular expressions are isolated.
    pub regexp_mode: RegExpMode,
    /// Wall-clock bound for one sandboxed regex call.
    pub regexp_thread_timeout: Duration,
    /// How long one `step()` keeps coalescing polyfill micro-steps.
    pub polyfill_timeout: Duration,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            regexp_mode: RegExpMode::default(),
            regexp_thread_timeout: Duration::from_millis(1000),
            polyfill_timeout: Duration::from_millis(10),
        }
    }
}

/// Coarse machine state, as observable by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// The program ran to completion (or died on an uncaught error).
    Done,
    /// Runnable: `step()`/`run()` will make progress.
    Step,
    /// Suspended on an asynchronous native function.
    Async,
}

/// Ids of the root objects every initializer and coercion resolves against.
#[derive(Clone, Debug)]
pub struct Roots {
    pub global: ObjectId,
    pub object_proto: ObjectId,
    pub function_proto: ObjectId,
    pub array_proto: ObjectId,
    pub string_proto: ObjectId,
    pub number_proto: ObjectId,
    pub boolean_proto: ObjectId,
    pub date_proto: ObjectId,
    pub regexp_proto: ObjectId,
    pub error_protos: [ObjectId; 7],
}

impl Default for Roots {
    fn default() -> Roots {
        // placeholder ids, overwritten by bootstrap before first use
        Roots {
            global: ObjectId(0),
            object_proto: ObjectId(0),
            function_proto: ObjectId(0),
            array_proto: ObjectId(0),
            string_proto: ObjectId(0),
            number_proto: ObjectId(0),
            boolean_proto: ObjectId(0),
            date_proto: ObjectId(0),
            regexp_proto: ObjectId(0),
            error_protos: [ObjectId(0); 7],
        }
    }
}

/// A sandboxed, step-wise ES5 interpreter. One instance owns its entire
/// interpreted world: heap, scopes, state stack, and regex worker.
#[derive(Debug)]
pub struct Interpreter {
    pub(crate) heap: Heap,
    pub(crate) scopes: Scopes,
    pub(crate) stack: Vec<Frame>,
    pub(crate) roots: Roots,
    pub(crate) global_scope: ScopeId,
    pub(crate) value: Value,
    pub(crate) paused: bool,
    pub(crate) config: Config,
    pub(crate) regexp: RegExpBackend,
    pub(crate) native_fn_counter: u32,
    pub(crate) resume_counter: u64,
    pub(crate) pending_resume: Option<ResumeToken>,
    pub(crate) resume_value: Option<Value>,
    pub(crate) resume_is_throw: bool,
    pub(crate) string_cycles: Vec<ObjectId>,
    pub(crate) coercion_depth: u32,
}

impl Interpreter {
    pub fn new(code: &str) -> Result<Interpreter, JSError> {
        Interpreter::with_config(code, Config::default())
    }

    pub fn with_config(code: &str, config: Config) -> Result<Interpreter, JSError> {
        Interpreter::with_init(code, config, |_, _| {})
    }

    /// The init hook runs after the built-ins (polyfills included) but before
    /// any user code, which is the window for seeding globals.
    pub fn with_init<F>(code: &str, config: Config, init: F) -> Result<Interpreter, JSError>
    where
        F: FnOnce(&mut Interpreter, ObjectId),
    {
        let program = parser::parse_program(code)?;
        Interpreter::from_parsed(program, config, init)
    }

    /// Accepts a pre-parsed program in place of source text.
    pub fn from_ast(program: Program, config: Config) -> Result<Interpreter, JSError> {
        Interpreter::from_parsed(program, config, |_, _| {})
    }

    fn from_parsed<F>(program: Program, config: Config, init: F) -> Result<Interpreter, JSError>
    where
        F: FnOnce(&mut Interpreter, ObjectId),
    {
        let regexp = RegExpBackend::new(config.regexp_mode, config.regexp_thread_timeout);
        let mut interp = Interpreter {
            heap: Heap::default(),
            scopes: Scopes::default(),
            stack: Vec::new(),
            roots: Roots::default(),
            global_scope: ScopeId(0),
            value: Value::Undefined,
            paused: false,
            config,
            regexp,
            native_fn_counter: 0,
            resume_counter: 0,
            pending_resume: None,
            resume_value: None,
            resume_is_throw: false,
            string_cycles: Vec::new(),
            coercion_depth: 0,
        };
        crate::js_global::bootstrap(&mut interp);
        crate::js_global::initialize_global_constructors(&mut interp);
        interp.run_polyfills()?;
        let global = interp.roots.global;
        init(&mut interp, global);
        interp.load_program(program);
        log::debug!(
            "interpreter ready: {} heap objects after initialization",
            interp.heap.len()
        );
        Ok(interp)
    }

    fn run_polyfills(&mut self) -> Result<(), JSError> {
        let program = parser::parse_program_opts(crate::polyfills::POLYFILLS, false)
            .map_err(|e| JSError::Internal(format!("polyfill parse failure: {e}")))?;
        let scope = self.global_scope;
        self.populate_scope(&program.body, scope);
        self.stack.push(Frame::program(program.body, scope));
        while !self.terminated() {
            self.step_once()
                .map_err(|e| JSError::Internal(format!("polyfill execution failure: {e}")))?;
        }
        self.stack.clear();
        self.value = Value::Undefined;
        Ok(())
    }

    fn load_program(&mut self, program: Program) {
        let scope = self.global_scope;
        if program.strict {
            self.scopes.get_mut(scope).strict = true;
        }
        self.populate_scope(&program.body, scope);
        self.stack.push(Frame::program(program.body, scope));
    }

    /// Parses more statements onto the end of the program. The program frame
    /// is never popped, so a terminated interpreter picks the new code up on
    /// the next `run()`.
    pub fn append_code(&mut self, code: &str) -> Result<(), JSError> {
        let program = parser::parse_program(code)?;
        let scope = self.global_scope;
        self.populate_scope(&program.body, scope);
        let Some(frame) = self.stack.first_mut() else {
            return Err(JSError::Internal("program frame is gone".to_string()));
        };
        let Scratch::Program { body, .. } = &mut frame.scratch else {
            return Err(JSError::Internal(
                "bottom frame is not the program".to_string(),
            ));
        };
        body.extend(program.body);
        frame.done = false;
        Ok(())
    }

    /// Advances until termination or suspension. Returns `true` iff the
    /// machine paused on an asynchronous native.
    pub fn run(&mut self) -> Result<bool, JSError> {
        while !self.terminated() && !self.paused {
            self.step_once()?;
        }
        Ok(self.paused)
    }

    /// One user-visible step: a single micro-step, plus however many
    /// location-less (polyfill / eval) micro-steps fit in the configured
    /// budget. Returns `false` iff the program has terminated.
    pub fn step(&mut self) -> Result<bool, JSError> {
        if self.terminated() {
            return Ok(false);
        }
        if self.paused {
            return Ok(true);
        }
        let deadline = Instant::now() + self.config.polyfill_timeout;
        loop {
            self.step_once()?;
            if self.terminated() || self.paused {
                break;
            }
            let in_polyfill = self.stack.last().map(|f| f.line() == 0).unwrap_or(false);
            if !in_polyfill || Instant::now() >= deadline {
                break;
            }
        }
        Ok(!self.terminated())
    }

    pub fn terminated(&self) -> bool {
        self.stack.len() <= 1
            && self
                .stack
                .first()
                .map(|f| matches!(f.task, Task::Program) && f.done)
                .unwrap_or(true)
    }

    pub fn status(&self) -> Status {
        if self.terminated() {
            Status::Done
        } else if self.paused {
            Status::Async
        } else {
            Status::Step
        }
    }

    /// The value of the last completed expression statement.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn global_object(&self) -> ObjectId {
        self.roots.global
    }

    pub fn global_scope(&self) -> ScopeId {
        self.global_scope
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Deposits the result of an asynchronous native and clears the pause
    /// latch; the next `run()`/`step()` resumes at the suspended call frame.
    pub fn resume(&mut self, token: ResumeToken, value: Value) -> Result<(), JSError> {
        if self.pending_resume != Some(token) {
            return Err(JSError::Internal(format!(
                "resume with stale token {}",
                token.0
            )));
        }
        log::debug!("resuming from async native (token {})", token.0);
        self.pending_resume = None;
        self.resume_value = Some(value);
        self.resume_is_throw = false;
        self.paused = false;
        Ok(())
    }

    /// Like `resume`, but the value is thrown at the suspension point on the
    /// next resumed step instead of being returned from the call.
    pub fn resume_throw(&mut self, token: ResumeToken, value: Value) -> Result<(), JSError> {
        self.resume(token, value)?;
        self.resume_is_throw = true;
        Ok(())
    }

    // ─────────────────────── host-side property access ────────────────────

    /// Reads a property the way interpreted code would, except that pending
    /// getters read as `undefined` (the host cannot re-enter the evaluator).
    pub fn get_value(&mut self, obj: ObjectId, name: &str) -> Value {
        self.get_property_value(&Value::Object(obj), name)
            .unwrap_or_default()
    }

    /// Writes a property with the interpreted write semantics; a pending
    /// setter is dropped rather than invoked.
    pub fn set_value(&mut self, obj: ObjectId, name: &str, value: Value) {
        let _ = self.set_property(&Value::Object(obj), name, value, false);
    }

    /// Installs a property with explicit attributes, bypassing write checks.
    pub fn define_value(&mut self, obj: ObjectId, name: &str, value: Value, attrs: Attributes) {
        self.define_raw(obj, name, value, attrs);
    }

    /// Renders any interpreted value for host display.
    pub fn display_value(&mut self, value: &Value) -> String {
        self.to_display_string(value)
    }

    // ───────────────────── builtin installation helpers ───────────────────

    pub(crate) fn install_method(
        &mut self,
        target: ObjectId,
        name: &str,
        builtin: &'static str,
        length: u32,
    ) {
        let f = self.create_builtin_function(builtin, length);
        self.define_raw(target, name, Value::Object(f), NONENUMERABLE);
    }

    pub(crate) fn install_constructor(
        &mut self,
        name: &'static str,
        proto: ObjectId,
        length: u32,
    ) -> ObjectId {
        let ctor = self.create_builtin_function(name, length);
        self.heap.get_mut(ctor).illegal_constructor = false;
        self.define_raw(
            ctor,
            "prototype",
            Value::Object(proto),
            NONCONFIGURABLE_READONLY_NONENUMERABLE,
        );
        self.define_raw(proto, "constructor", Value::Object(ctor), NONENUMERABLE);
        let global = self.roots.global;
        self.define_raw(global, name, Value::Object(ctor), NONENUMERABLE);
        ctor
    }

    /// Single funnel for every engine-provided native.
    pub(crate) fn call_builtin(
        &mut self,
        name: &'static str,
        this: &Value,
        args: &[Value],
        info: NativeInfo,
    ) -> Result<Value, Throw> {
        type Dispatcher = fn(
            &mut Interpreter,
            &'static str,
            &Value,
            &[Value],
            NativeInfo,
        ) -> Option<Result<Value, Throw>>;
        const DISPATCHERS: &[Dispatcher] = &[
            crate::js_global::dispatch,
            crate::js_object::dispatch,
            crate::js_function::dispatch,
            crate::js_array::dispatch,
            crate::js_string::dispatch,
            crate::js_number::dispatch,
            crate::js_boolean::dispatch,
            crate::js_math::dispatch,
            crate::js_json::dispatch,
            crate::js_date::dispatch,
            crate::js_regexp::dispatch,
            crate::js_error::dispatch,
        ];
        for dispatch in DISPATCHERS {
            if let Some(result) = dispatch(self, name, this, args, info) {
                return result;
            }
        }
        Err(self.internal_error(&format!("no native implementation for {name}")))
    }
}
