use std::rc::Rc;

use crate::JSError;
use crate::core::descriptor::{
    self, Attributes, DEFAULT, NONENUMERABLE, PropertyDescriptor, READONLY_NONENUMERABLE, VARIABLE,
};
use crate::core::frame::{
    AssignScratch, CallExprScratch, CallMode, CallScratch, Completion, CompletionKind, Deposit,
    ForInScratch, Frame, ObjectLitScratch, RefSlot, ResumeToken, Scratch, SwitchScratch, Task,
    TryScratch, UpdateScratch,
};
use crate::core::parser;
use crate::core::statement::{
    BinaryOp, Expr, ExprKind, ExprRef, ForInTarget, ForInit, FunctionNode, LogicalOp,
    PropertyKind, Statement, StatementKind, StmtRef, UnaryOp, UpdateOp,
};
use crate::core::value::{
    CLASS_ARRAY, CLASS_BOOLEAN, CLASS_ERROR, CLASS_FUNCTION, CLASS_NUMBER, CLASS_STRING, FuncKind,
    GetOutcome, JsStr, NativeData, ObjectId, ScopeId, SetOutcome, Throw, Value,
};
use crate::interp::Interpreter;
use crate::js_number;
use crate::{raise_syntax_error, raise_type_error};

/// What a step function asks the machine to do next.
pub(crate) enum Outcome {
    /// Keep this frame and run the child next.
    Push(Frame),
    /// Keep this frame; it has more work on a later step.
    Keep,
    /// Pop this frame, handing the deposit to the parent.
    Done(Option<Deposit>),
    /// Pop this frame and start the unwind algorithm.
    Unwind(Completion),
    /// Keep this frame; the machine is suspended on an async native.
    Pause,
}

/// Extra call context handed to builtin dispatchers.
#[derive(Clone, Copy, Debug)]
pub struct NativeInfo {
    pub construct: bool,
    pub new_object: Option<ObjectId>,
}

/// Bound on nested coercion calls (a `valueOf` that itself coerces, and so
/// on). Each level parks the current state stack on the Rust stack, so the
/// bound keeps a self-referential `valueOf` from overflowing the host.
const COERCION_DEPTH_LIMIT: u32 = 32;

impl Interpreter {
    /// One micro-step: pop the top frame, run its step function, apply the
    /// outcome. Interpreted throws feed the unwind algorithm here.
    pub(crate) fn step_once(&mut self) -> Result<(), JSError> {
        let Some(mut frame) = self.stack.pop() else {
            return Err(JSError::Internal("state stack is empty".to_string()));
        };
        log::trace!("step {:?}", frame.task);
        match self.dispatch_frame(&mut frame) {
            Ok(Outcome::Push(child)) => {
                self.stack.push(frame);
                self.stack.push(child);
                Ok(())
            }
            Ok(Outcome::Keep) | Ok(Outcome::Pause) => {
                self.stack.push(frame);
                Ok(())
            }
            Ok(Outcome::Done(deposit)) => {
                if let Some(parent) = self.stack.last_mut() {
                    parent.deposit = deposit;
                }
                Ok(())
            }
            Ok(Outcome::Unwind(completion)) => self.unwind(completion),
            Err(throw) => self.unwind(Completion::throw(throw.0)),
        }
    }

    /// The unwind algorithm: pop frames until one handles the completion.
    pub(crate) fn unwind(&mut self, completion: Completion) -> Result<(), JSError> {
        log::trace!("unwind {:?} {:?}", completion.kind, completion.label);
        enum Decision {
            Pop,
            PopAndStop,
            AtProgram,
        }
        loop {
            let mut decision = Decision::Pop;
            {
                let Some(top) = self.stack.last_mut() else {
                    return Err(JSError::Internal(
                        "completion escaped the program frame".to_string(),
                    ));
                };
                match &top.task {
                    Task::Stmt(stmt) if matches!(stmt.kind, StatementKind::Try(_)) => {
                        if let Scratch::Try(t) = &mut top.scratch {
                            t.cv = Some(completion);
                            return Ok(());
                        }
                    }
                    Task::Call => {
                        if completion.kind == CompletionKind::Return {
                            top.deposit = Some(Deposit::Val(completion.value));
                            return Ok(());
                        }
                        if completion.kind != CompletionKind::Throw {
                            return Err(JSError::Internal(
                                "unsyntactic break or continue crossed a call".to_string(),
                            ));
                        }
                    }
                    Task::Program => {
                        top.done = true;
                        decision = Decision::AtProgram;
                    }
                    _ => {}
                }
                if matches!(decision, Decision::Pop) {
                    match completion.kind {
                        CompletionKind::Break => {
                            let handled = match &completion.label {
                                Some(label) => top.labels.iter().any(|l| l == label),
                                None => top.is_loop() || top.is_switch(),
                            };
                            if handled {
                                decision = Decision::PopAndStop;
                            }
                        }
                        CompletionKind::Continue => {
                            let handled = match &completion.label {
                                Some(label) => {
                                    top.is_loop() && top.labels.iter().any(|l| l == label)
                                }
                                None => top.is_loop(),
                            };
                            if handled {
                                // the loop frame stays; its mode counter
                                // already points past the body
                                return Ok(());
                            }
                        }
                        _ => {}
                    }
                }
            }
            match decision {
                Decision::AtProgram => {
                    self.paused = false;
                    return match completion.kind {
                        CompletionKind::Throw => Err(self.thrown_to_host(completion.value)),
                        CompletionKind::Normal => Ok(()),
                        _ => Err(JSError::Internal(
                            "unsyntactic completion at program level".to_string(),
                        )),
                    };
                }
                Decision::PopAndStop => {
                    self.stack.pop();
                    return Ok(());
                }
                Decision::Pop => {
                    self.stack.pop();
                }
            }
        }
    }

    /// Maps an uncaught interpreted throw onto the matching host error.
    fn thrown_to_host(&mut self, value: Value) -> JSError {
        if let Value::Object(id) = &value {
            if self.heap.get(*id).class == CLASS_ERROR {
                let name = self
                    .get_property_value(&value, "name")
                    .ok()
                    .map(|v| self.to_display_string(&v))
                    .unwrap_or_else(|| "Error".to_string());
                let message = self
                    .get_property_value(&value, "message")
                    .ok()
                    .map(|v| self.to_display_string(&v))
                    .unwrap_or_default();
                return JSError::from_thrown(&name, message);
            }
        }
        JSError::Error {
            message: self.to_display_string(&value),
        }
    }

    fn dispatch_frame(&mut self, frame: &mut Frame) -> Result<Outcome, Throw> {
        match frame.task.clone() {
            Task::Program | Task::EvalProgram => self.step_program(frame),
            Task::Stmt(stmt) => self.step_statement(frame, &stmt),
            Task::Expr(expr) => self.step_expression(frame, &expr),
            Task::Call => self.step_call(frame),
        }
    }

    // ───────────────────────── program and statements ─────────────────────

    fn step_program(&mut self, frame: &mut Frame) -> Result<Outcome, Throw> {
        let is_eval = matches!(frame.task, Task::EvalProgram);
        let Scratch::Program { body, index } = &mut frame.scratch else {
            return Err(self.internal_error("program frame without program scratch"));
        };
        if *index < body.len() {
            let stmt = body[*index].clone();
            *index += 1;
            return Ok(Outcome::Push(Frame::stmt(stmt, frame.scope)));
        }
        if is_eval {
            Ok(Outcome::Done(Some(Deposit::Val(self.value.clone()))))
        } else {
            frame.done = true;
            Ok(Outcome::Keep)
        }
    }

    fn step_statement(&mut self, frame: &mut Frame, stmt: &StmtRef) -> Result<Outcome, Throw> {
        let scope = frame.scope;
        match &stmt.kind {
            StatementKind::Empty
            | StatementKind::Debugger
            | StatementKind::FunctionDeclaration(_) => Ok(Outcome::Done(None)),

            StatementKind::Expr(expr) => {
                if let Scratch::ExprStmt { .. } = frame.scratch {
                    let value = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    self.value = value;
                    return Ok(Outcome::Done(None));
                }
                frame.scratch = Scratch::ExprStmt { issued: true };
                Ok(Outcome::Push(Frame::expr(expr.clone(), scope)))
            }

            StatementKind::Var(decls) => {
                if !matches!(frame.scratch, Scratch::VarDecl { .. }) {
                    frame.scratch = Scratch::VarDecl {
                        index: 0,
                        issued: false,
                    };
                }
                let Scratch::VarDecl { index, issued } = &mut frame.scratch else {
                    unreachable!()
                };
                if *issued {
                    let value = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    let name = decls[*index].0.clone();
                    *index += 1;
                    *issued = false;
                    self.set_in_scope_direct(scope, &name, value);
                }
                while *index < decls.len() && decls[*index].1.is_none() {
                    *index += 1; // hoisting already bound it to undefined
                }
                if *index < decls.len() {
                    let (name, init) = decls[*index].clone();
                    *issued = true;
                    let mut child = Frame::expr(init.unwrap_or_else(|| Expr::synthetic(ExprKind::Null)), scope);
                    child.name_hint = Some(name);
                    return Ok(Outcome::Push(child));
                }
                Ok(Outcome::Done(None))
            }

            StatementKind::Block(body) => {
                if !matches!(frame.scratch, Scratch::Block { .. }) {
                    frame.scratch = Scratch::Block { index: 0 };
                }
                let Scratch::Block { index } = &mut frame.scratch else {
                    unreachable!()
                };
                if *index < body.len() {
                    let stmt = body[*index].clone();
                    *index += 1;
                    return Ok(Outcome::Push(Frame::stmt(stmt, scope)));
                }
                Ok(Outcome::Done(None))
            }

            StatementKind::If(test, consequent, alternate) => {
                if !matches!(frame.scratch, Scratch::If { .. }) {
                    frame.scratch = Scratch::If { mode: 0 };
                }
                let Scratch::If { mode } = &mut frame.scratch else {
                    unreachable!()
                };
                match *mode {
                    0 => {
                        *mode = 1;
                        Ok(Outcome::Push(Frame::expr(test.clone(), scope)))
                    }
                    1 => {
                        *mode = 2;
                        let picked = frame
                            .deposit
                            .take()
                            .map(Deposit::into_value)
                            .unwrap_or_default()
                            .truthy();
                        if picked {
                            Ok(Outcome::Push(Frame::stmt(consequent.clone(), scope)))
                        } else if let Some(alternate) = alternate {
                            Ok(Outcome::Push(Frame::stmt(alternate.clone(), scope)))
                        } else {
                            Ok(Outcome::Done(None))
                        }
                    }
                    _ => Ok(Outcome::Done(None)),
                }
            }

            StatementKind::While(test, body) => {
                if !matches!(frame.scratch, Scratch::Loop { .. }) {
                    frame.scratch = Scratch::Loop { mode: 0 };
                }
                let Scratch::Loop { mode } = &mut frame.scratch else {
                    unreachable!()
                };
                match *mode {
                    0 | 2 => {
                        *mode = 1;
                        Ok(Outcome::Push(Frame::expr(test.clone(), scope)))
                    }
                    _ => {
                        let pass = frame
                            .deposit
                            .take()
                            .map(Deposit::into_value)
                            .unwrap_or_default()
                            .truthy();
                        if pass {
                            *mode = 2;
                            Ok(Outcome::Push(Frame::stmt(body.clone(), scope)))
                        } else {
                            Ok(Outcome::Done(None))
                        }
                    }
                }
            }

            StatementKind::DoWhile(body, test) => {
                if !matches!(frame.scratch, Scratch::Loop { .. }) {
                    frame.scratch = Scratch::Loop { mode: 0 };
                }
                let Scratch::Loop { mode } = &mut frame.scratch else {
                    unreachable!()
                };
                match *mode {
                    0 => {
                        // body runs before the first test
                        *mode = 1;
                        Ok(Outcome::Push(Frame::stmt(body.clone(), scope)))
                    }
                    1 => {
                        *mode = 2;
                        Ok(Outcome::Push(Frame::expr(test.clone(), scope)))
                    }
                    _ => {
                        let pass = frame
                            .deposit
                            .take()
                            .map(Deposit::into_value)
                            .unwrap_or_default()
                            .truthy();
                        if pass {
                            *mode = 1;
                            Ok(Outcome::Push(Frame::stmt(body.clone(), scope)))
                        } else {
                            Ok(Outcome::Done(None))
                        }
                    }
                }
            }

            StatementKind::For(f) => {
                if !matches!(frame.scratch, Scratch::Loop { .. }) {
                    frame.scratch = Scratch::Loop { mode: 0 };
                }
                loop {
                    let Scratch::Loop { mode } = &mut frame.scratch else {
                        unreachable!()
                    };
                    match *mode {
                        0 => {
                            *mode = 1;
                            match &f.init {
                                Some(ForInit::Var(stmt)) => {
                                    return Ok(Outcome::Push(Frame::stmt(stmt.clone(), scope)));
                                }
                                Some(ForInit::Expr(expr)) => {
                                    return Ok(Outcome::Push(Frame::expr(expr.clone(), scope)));
                                }
                                None => {}
                            }
                        }
                        1 => {
                            frame.deposit = None;
                            if let Some(test) = &f.test {
                                *mode = 2;
                                return Ok(Outcome::Push(Frame::expr(test.clone(), scope)));
                            }
                            *mode = 3;
                        }
                        2 => {
                            let pass = frame
                                .deposit
                                .take()
                                .map(Deposit::into_value)
                                .unwrap_or_default()
                                .truthy();
                            if !pass {
                                return Ok(Outcome::Done(None));
                            }
                            *mode = 3;
                        }
                        3 => {
                            *mode = 4;
                            return Ok(Outcome::Push(Frame::stmt(f.body.clone(), scope)));
                        }
                        _ => {
                            *mode = 1;
                            if let Some(update) = &f.update {
                                return Ok(Outcome::Push(Frame::expr(update.clone(), scope)));
                            }
                        }
                    }
                }
            }

            StatementKind::ForIn(f) => self.step_for_in(frame, stmt, f),

            StatementKind::Return(arg) => {
                if let Scratch::Return { .. } = frame.scratch {
                    let value = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    return Ok(Outcome::Unwind(Completion::ret(value)));
                }
                match arg {
                    Some(arg) => {
                        frame.scratch = Scratch::Return { issued: true };
                        Ok(Outcome::Push(Frame::expr(arg.clone(), scope)))
                    }
                    None => Ok(Outcome::Unwind(Completion::ret(Value::Undefined))),
                }
            }

            StatementKind::Throw(arg) => {
                if let Scratch::Throw { .. } = frame.scratch {
                    let value = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    return Ok(Outcome::Unwind(Completion::throw(value)));
                }
                frame.scratch = Scratch::Throw { issued: true };
                Ok(Outcome::Push(Frame::expr(arg.clone(), scope)))
            }

            StatementKind::Break(label) => Ok(Outcome::Unwind(Completion::break_(label.clone()))),
            StatementKind::Continue(label) => {
                Ok(Outcome::Unwind(Completion::continue_(label.clone())))
            }

            StatementKind::Try(t) => {
                if !matches!(frame.scratch, Scratch::Try(_)) {
                    frame.scratch = Scratch::Try(Box::new(TryScratch {
                        done_block: false,
                        done_handler: false,
                        done_finalizer: false,
                        cv: None,
                    }));
                }
                let Scratch::Try(state) = &mut frame.scratch else {
                    unreachable!()
                };
                if !state.done_block {
                    state.done_block = true;
                    return Ok(Outcome::Push(Frame::stmt(t.block.clone(), scope)));
                }
                let throw_pending = matches!(
                    state.cv.as_ref().map(|c| c.kind),
                    Some(CompletionKind::Throw)
                );
                if throw_pending && !state.done_handler {
                    if let Some(handler) = &t.handler {
                        state.done_handler = true;
                        let thrown = state.cv.take().map(|c| c.value).unwrap_or_default();
                        let param = handler.param.clone();
                        let body = handler.body.clone();
                        let this = self.scope_this(scope);
                        let strict = self.scope_strict(scope);
                        let catch_scope = self.new_scope(Some(scope), this, strict);
                        let scope_obj = self.scopes.get(catch_scope).object;
                        self.define_raw(scope_obj, &param, thrown, VARIABLE);
                        return Ok(Outcome::Push(Frame::stmt(body, catch_scope)));
                    }
                }
                let Scratch::Try(state) = &mut frame.scratch else {
                    unreachable!()
                };
                if !state.done_finalizer {
                    if let Some(finalizer) = &t.finalizer {
                        state.done_finalizer = true;
                        return Ok(Outcome::Push(Frame::stmt(finalizer.clone(), scope)));
                    }
                }
                match state.cv.take() {
                    Some(cv) => Ok(Outcome::Unwind(cv)),
                    None => Ok(Outcome::Done(None)),
                }
            }

            StatementKind::Switch(s) => self.step_switch(frame, s),

            StatementKind::With(object, body) => {
                if !matches!(frame.scratch, Scratch::With { .. }) {
                    frame.scratch = Scratch::With { mode: 0 };
                }
                let Scratch::With { mode } = &mut frame.scratch else {
                    unreachable!()
                };
                match *mode {
                    0 => {
                        *mode = 1;
                        Ok(Outcome::Push(Frame::expr(object.clone(), scope)))
                    }
                    1 => {
                        *mode = 2;
                        let value = frame
                            .deposit
                            .take()
                            .map(Deposit::into_value)
                            .unwrap_or_default();
                        let id = self.to_object(&value)?;
                        let with_scope = self.new_with_scope(scope, id);
                        Ok(Outcome::Push(Frame::stmt(body.clone(), with_scope)))
                    }
                    _ => Ok(Outcome::Done(None)),
                }
            }

            StatementKind::Label(name, inner) => {
                if let Scratch::Label { .. } = frame.scratch {
                    return Ok(Outcome::Done(None));
                }
                frame.scratch = Scratch::Label { issued: true };
                let mut child = Frame::stmt(inner.clone(), scope);
                child.labels = frame.labels.clone();
                child.labels.push(name.clone());
                Ok(Outcome::Push(child))
            }
        }
    }

    fn step_for_in(
        &mut self,
        frame: &mut Frame,
        _stmt: &StmtRef,
        f: &crate::core::statement::ForInStatement,
    ) -> Result<Outcome, Throw> {
        let scope = frame.scope;
        if !matches!(frame.scratch, Scratch::ForIn(_)) {
            frame.scratch = Scratch::ForIn(Box::new(ForInScratch {
                mode: 0,
                object: Value::Undefined,
                current: None,
                keys: Vec::new(),
                key_index: 0,
                visited: Default::default(),
                pending_name: None,
                string_len: None,
            }));
        }
        loop {
            let Scratch::ForIn(state) = &mut frame.scratch else {
                unreachable!()
            };
            match state.mode {
                // optional `for (var x = init in o)` initializer
                0 => {
                    if let ForInTarget::Var(_, Some(init)) = &f.target {
                        state.mode = 1;
                        return Ok(Outcome::Push(Frame::expr(init.clone(), scope)));
                    }
                    state.mode = 2;
                }
                1 => {
                    let value = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    if let ForInTarget::Var(name, _) = &f.target {
                        let name = name.clone();
                        self.set_in_scope_direct(scope, &name, value);
                    }
                    let Scratch::ForIn(state) = &mut frame.scratch else {
                        unreachable!()
                    };
                    state.mode = 2;
                }
                2 => {
                    state.mode = 3;
                    return Ok(Outcome::Push(Frame::expr(f.object.clone(), scope)));
                }
                3 => {
                    let value = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    let Scratch::ForIn(state) = &mut frame.scratch else {
                        unreachable!()
                    };
                    match &value {
                        Value::Undefined | Value::Null => return Ok(Outcome::Done(None)),
                        Value::Str(s) => {
                            state.string_len = Some(s.chars().count() as u32);
                        }
                        Value::Object(id) => {
                            state.current = Some(*id);
                        }
                        _ => return Ok(Outcome::Done(None)),
                    }
                    state.object = value;
                    if let Some(id) = state.current {
                        let snapshot = self.snapshot_enumerable(id, &state.visited.clone());
                        let Scratch::ForIn(state) = &mut frame.scratch else {
                            unreachable!()
                        };
                        for name in self.own_keys(id) {
                            state.visited.insert(name);
                        }
                        state.keys = snapshot;
                        state.key_index = 0;
                    }
                    let Scratch::ForIn(state) = &mut frame.scratch else {
                        unreachable!()
                    };
                    state.mode = 4;
                }
                // produce the next name, climbing the prototype chain
                4 => {
                    frame.deposit = None;
                    let name = loop {
                        let Scratch::ForIn(state) = &mut frame.scratch else {
                            unreachable!()
                        };
                        if let Some(len) = state.string_len {
                            if state.key_index < len as usize {
                                let name = state.key_index.to_string();
                                state.key_index += 1;
                                break Some(name);
                            }
                            break None;
                        }
                        let Some(current) = state.current else {
                            break None;
                        };
                        if state.key_index < state.keys.len() {
                            let name = state.keys[state.key_index].clone();
                            state.key_index += 1;
                            // deletion during iteration is observed
                            if self.has_own_property(current, &name) {
                                break Some(name);
                            }
                            continue;
                        }
                        // exhausted this level: climb
                        let next = self.heap.get(current).proto;
                        let Scratch::ForIn(state) = &mut frame.scratch else {
                            unreachable!()
                        };
                        state.current = next;
                        match next {
                            Some(id) => {
                                let snapshot = self.snapshot_enumerable(id, &state.visited.clone());
                                let Scratch::ForIn(state) = &mut frame.scratch else {
                                    unreachable!()
                                };
                                for name in self.own_keys(id) {
                                    state.visited.insert(name);
                                }
                                state.keys = snapshot;
                                state.key_index = 0;
                            }
                            None => break None,
                        }
                    };
                    let Some(name) = name else {
                        return Ok(Outcome::Done(None));
                    };
                    let Scratch::ForIn(state) = &mut frame.scratch else {
                        unreachable!()
                    };
                    state.pending_name = Some(Rc::from(name.as_str()));
                    match &f.target {
                        ForInTarget::Var(var_name, _) => {
                            let var_name = var_name.clone();
                            match self.assign_in_scope(scope, &var_name, Value::str(&name))? {
                                SetOutcome::Done => {
                                    let Scratch::ForIn(state) = &mut frame.scratch else {
                                        unreachable!()
                                    };
                                    state.mode = 7;
                                }
                                SetOutcome::Setter(setter) => {
                                    let Scratch::ForIn(state) = &mut frame.scratch else {
                                        unreachable!()
                                    };
                                    state.mode = 6;
                                    let this = Value::Object(self.roots.global);
                                    return Ok(Outcome::Push(self.accessor_frame(
                                        setter,
                                        this,
                                        vec![Value::str(&name)],
                                        scope,
                                    )));
                                }
                            }
                        }
                        ForInTarget::Expr(target) => {
                            state.mode = 5;
                            return Ok(Outcome::Push(Frame::expr_ref(target.clone(), scope)));
                        }
                    }
                }
                // assign the produced name through the evaluated reference
                5 => {
                    let slot = match frame.deposit.take() {
                        Some(Deposit::Ref(slot)) => slot,
                        _ => return Err(self.internal_error("for-in target is not a reference")),
                    };
                    let Scratch::ForIn(state) = &mut frame.scratch else {
                        unreachable!()
                    };
                    let name = state.pending_name.clone().unwrap_or_else(|| Rc::from(""));
                    state.mode = 6;
                    let value = Value::Str(name);
                    match self.put_ref(&slot, value, scope)? {
                        Some(child) => return Ok(Outcome::Push(child)),
                        None => {
                            let Scratch::ForIn(state) = &mut frame.scratch else {
                                unreachable!()
                            };
                            state.mode = 7;
                        }
                    }
                }
                6 => {
                    frame.deposit = None;
                    state.mode = 7;
                }
                _ => {
                    state.mode = 4;
                    return Ok(Outcome::Push(Frame::stmt(f.body.clone(), scope)));
                }
            }
        }
    }

    fn step_switch(
        &mut self,
        frame: &mut Frame,
        s: &crate::core::statement::SwitchStatement,
    ) -> Result<Outcome, Throw> {
        let scope = frame.scope;
        if !matches!(frame.scratch, Scratch::Switch(_)) {
            frame.scratch = Scratch::Switch(Box::new(SwitchScratch {
                mode: 0,
                discriminant: Value::Undefined,
                case_index: 0,
                default_index: None,
                matched: false,
                stmt_index: 0,
            }));
        }
        loop {
            let Scratch::Switch(state) = &mut frame.scratch else {
                unreachable!()
            };
            match state.mode {
                0 => {
                    state.mode = 1;
                    return Ok(Outcome::Push(Frame::expr(s.discriminant.clone(), scope)));
                }
                1 => {
                    state.discriminant = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    state.mode = 2;
                }
                // scan for a matching case
                2 => {
                    if state.matched {
                        state.mode = 4;
                        continue;
                    }
                    if state.case_index >= s.cases.len() {
                        match state.default_index {
                            Some(index) if !state.matched => {
                                state.matched = true;
                                state.case_index = index;
                                state.stmt_index = 0;
                                state.mode = 4;
                            }
                            _ => return Ok(Outcome::Done(None)),
                        }
                        continue;
                    }
                    match &s.cases[state.case_index].test {
                        None => {
                            state.default_index = Some(state.case_index);
                            state.case_index += 1;
                        }
                        Some(test) => {
                            state.mode = 3;
                            return Ok(Outcome::Push(Frame::expr(test.clone(), scope)));
                        }
                    }
                }
                3 => {
                    let test = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    if test == state.discriminant {
                        state.matched = true;
                        state.stmt_index = 0;
                        state.mode = 4;
                    } else {
                        state.case_index += 1;
                        state.mode = 2;
                    }
                }
                // run case bodies, falling through until a break unwinds
                _ => {
                    if state.case_index >= s.cases.len() {
                        return Ok(Outcome::Done(None));
                    }
                    let case = &s.cases[state.case_index];
                    if state.stmt_index < case.body.len() {
                        let stmt = case.body[state.stmt_index].clone();
                        state.stmt_index += 1;
                        return Ok(Outcome::Push(Frame::stmt(stmt, scope)));
                    }
                    state.case_index += 1;
                    state.stmt_index = 0;
                }
            }
        }
    }

    // ──────────────────────────── expressions ─────────────────────────────

    fn step_expression(&mut self, frame: &mut Frame, expr: &ExprRef) -> Result<Outcome, Throw> {
        let scope = frame.scope;
        match &expr.kind {
            ExprKind::Number(n) => Ok(Outcome::Done(Some(Deposit::Val(Value::Number(*n))))),
            ExprKind::StringLit(s) => {
                Ok(Outcome::Done(Some(Deposit::Val(Value::Str(s.clone())))))
            }
            ExprKind::Boolean(b) => Ok(Outcome::Done(Some(Deposit::Val(Value::Boolean(*b))))),
            ExprKind::Null => Ok(Outcome::Done(Some(Deposit::Val(Value::Null)))),
            ExprKind::This => Ok(Outcome::Done(Some(Deposit::Val(self.scope_this(scope))))),

            ExprKind::Regex(source, flags) => {
                let id = self.create_regexp_object(source, flags)?;
                Ok(Outcome::Done(Some(Deposit::Val(Value::Object(id)))))
            }

            ExprKind::Function(node) => {
                let hint = frame.name_hint.clone();
                let id = self.create_ast_function(node, scope, hint);
                Ok(Outcome::Done(Some(Deposit::Val(Value::Object(id)))))
            }

            ExprKind::Ident(name) => {
                if frame.want_ref {
                    return Ok(Outcome::Done(Some(Deposit::Ref(RefSlot::Scope(
                        name.clone(),
                    )))));
                }
                if let Scratch::Ident { .. } = frame.scratch {
                    let value = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    return Ok(Outcome::Done(Some(Deposit::Val(value))));
                }
                match self.lookup_in_scope(scope, name)? {
                    GetOutcome::Value(v) => Ok(Outcome::Done(Some(Deposit::Val(v)))),
                    GetOutcome::Getter(getter) => {
                        frame.scratch = Scratch::Ident { issued: true };
                        let this = Value::Object(self.roots.global);
                        Ok(Outcome::Push(self.accessor_frame(
                            getter,
                            this,
                            Vec::new(),
                            scope,
                        )))
                    }
                }
            }

            ExprKind::Array(elements) => {
                if !matches!(frame.scratch, Scratch::ArrayLit { .. }) {
                    let array = self.create_array();
                    frame.scratch = Scratch::ArrayLit {
                        index: 0,
                        array: Some(array),
                    };
                }
                let Scratch::ArrayLit { index, array } = &mut frame.scratch else {
                    unreachable!()
                };
                let array = array.unwrap_or(ObjectId(0));
                if let Some(deposit) = frame.deposit.take() {
                    let value = deposit.into_value();
                    let key = index.to_string();
                    *index += 1;
                    self.define_raw(array, &key, value, DEFAULT);
                }
                let Scratch::ArrayLit { index, .. } = &mut frame.scratch else {
                    unreachable!()
                };
                while *index < elements.len() && elements[*index].is_none() {
                    *index += 1;
                }
                if *index < elements.len() {
                    let element = elements[*index]
                        .clone()
                        .unwrap_or_else(|| Expr::synthetic(ExprKind::Null));
                    return Ok(Outcome::Push(Frame::expr(element, scope)));
                }
                if !elements.is_empty() {
                    self.lift_array_length(array, elements.len() as u32 - 1);
                }
                Ok(Outcome::Done(Some(Deposit::Val(Value::Object(array)))))
            }

            ExprKind::Object(props) => {
                if !matches!(frame.scratch, Scratch::ObjectLit(_)) {
                    let proto = self.roots.object_proto;
                    let object = self.alloc_object(Some(proto));
                    frame.scratch = Scratch::ObjectLit(Box::new(ObjectLitScratch {
                        index: 0,
                        object: Some(object),
                    }));
                }
                let Scratch::ObjectLit(state) = &mut frame.scratch else {
                    unreachable!()
                };
                let object = state.object.unwrap_or(ObjectId(0));
                if let Some(deposit) = frame.deposit.take() {
                    let value = deposit.into_value();
                    let prop = &props[state.index];
                    let key = prop.key.clone();
                    let kind = prop.kind;
                    state.index += 1;
                    match kind {
                        PropertyKind::Init => self.define_raw(object, &key, value, DEFAULT),
                        PropertyKind::Get => {
                            let desc = PropertyDescriptor {
                                get: Some(value),
                                enumerable: Some(true),
                                configurable: Some(true),
                                ..Default::default()
                            };
                            self.define_property(object, &key, &desc)?;
                        }
                        PropertyKind::Set => {
                            let desc = PropertyDescriptor {
                                set: Some(value),
                                enumerable: Some(true),
                                configurable: Some(true),
                                ..Default::default()
                            };
                            self.define_property(object, &key, &desc)?;
                        }
                    }
                }
                let Scratch::ObjectLit(state) = &mut frame.scratch else {
                    unreachable!()
                };
                if state.index < props.len() {
                    let prop = &props[state.index];
                    let mut child = Frame::expr(prop.value.clone(), scope);
                    child.name_hint = Some(prop.key.clone());
                    return Ok(Outcome::Push(child));
                }
                Ok(Outcome::Done(Some(Deposit::Val(Value::Object(object)))))
            }

            ExprKind::Comma(parts) => {
                if !matches!(frame.scratch, Scratch::Comma { .. }) {
                    frame.scratch = Scratch::Comma { index: 0 };
                }
                let Scratch::Comma { index } = &mut frame.scratch else {
                    unreachable!()
                };
                if *index > 0 && *index == parts.len() {
                    let value = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    return Ok(Outcome::Done(Some(Deposit::Val(value))));
                }
                frame.deposit = None;
                let part = parts[*index].clone();
                *index += 1;
                Ok(Outcome::Push(Frame::expr(part, scope)))
            }

            ExprKind::Logical(op, left, right) => {
                if !matches!(frame.scratch, Scratch::Logical { .. }) {
                    frame.scratch = Scratch::Logical { mode: 0 };
                }
                let Scratch::Logical { mode } = &mut frame.scratch else {
                    unreachable!()
                };
                match *mode {
                    0 => {
                        *mode = 1;
                        Ok(Outcome::Push(Frame::expr(left.clone(), scope)))
                    }
                    1 => {
                        let value = frame
                            .deposit
                            .take()
                            .map(Deposit::into_value)
                            .unwrap_or_default();
                        let short_circuit = match op {
                            LogicalOp::And => !value.truthy(),
                            LogicalOp::Or => value.truthy(),
                        };
                        if short_circuit {
                            return Ok(Outcome::Done(Some(Deposit::Val(value))));
                        }
                        *mode = 2;
                        Ok(Outcome::Push(Frame::expr(right.clone(), scope)))
                    }
                    _ => {
                        let value = frame
                            .deposit
                            .take()
                            .map(Deposit::into_value)
                            .unwrap_or_default();
                        Ok(Outcome::Done(Some(Deposit::Val(value))))
                    }
                }
            }

            ExprKind::Conditional(test, consequent, alternate) => {
                if !matches!(frame.scratch, Scratch::Conditional { .. }) {
                    frame.scratch = Scratch::Conditional { mode: 0 };
                }
                let Scratch::Conditional { mode } = &mut frame.scratch else {
                    unreachable!()
                };
                match *mode {
                    0 => {
                        *mode = 1;
                        Ok(Outcome::Push(Frame::expr(test.clone(), scope)))
                    }
                    1 => {
                        *mode = 2;
                        let pass = frame
                            .deposit
                            .take()
                            .map(Deposit::into_value)
                            .unwrap_or_default()
                            .truthy();
                        let branch = if pass { consequent } else { alternate };
                        Ok(Outcome::Push(Frame::expr(branch.clone(), scope)))
                    }
                    _ => {
                        let value = frame
                            .deposit
                            .take()
                            .map(Deposit::into_value)
                            .unwrap_or_default();
                        Ok(Outcome::Done(Some(Deposit::Val(value))))
                    }
                }
            }

            ExprKind::Binary(op, left, right) => {
                if !matches!(frame.scratch, Scratch::Binary { .. }) {
                    frame.scratch = Scratch::Binary {
                        left: None,
                        mode: 0,
                    };
                }
                let Scratch::Binary { left: stash, mode } = &mut frame.scratch else {
                    unreachable!()
                };
                match *mode {
                    0 => {
                        *mode = 1;
                        Ok(Outcome::Push(Frame::expr(left.clone(), scope)))
                    }
                    1 => {
                        *stash = Some(
                            frame
                                .deposit
                                .take()
                                .map(Deposit::into_value)
                                .unwrap_or_default(),
                        );
                        *mode = 2;
                        Ok(Outcome::Push(Frame::expr(right.clone(), scope)))
                    }
                    _ => {
                        let lhs = stash.take().unwrap_or_default();
                        let rhs = frame
                            .deposit
                            .take()
                            .map(Deposit::into_value)
                            .unwrap_or_default();
                        let value = self.binary_op(*op, &lhs, &rhs)?;
                        Ok(Outcome::Done(Some(Deposit::Val(value))))
                    }
                }
            }

            ExprKind::Unary(op, arg) => self.step_unary(frame, *op, arg),
            ExprKind::Update(op, prefix, arg) => self.step_update(frame, *op, *prefix, arg),
            ExprKind::Assign(op, target, value) => self.step_assign(frame, *op, target, value),

            ExprKind::Property(..) | ExprKind::Index(..) => self.step_member(frame, expr),

            ExprKind::Call(..) | ExprKind::New(..) => self.step_call_expression(frame, expr),
        }
    }

    fn step_unary(
        &mut self,
        frame: &mut Frame,
        op: UnaryOp,
        arg: &ExprRef,
    ) -> Result<Outcome, Throw> {
        let scope = frame.scope;
        if !matches!(frame.scratch, Scratch::Unary { .. }) {
            // `typeof ident` is the one context where an unbound name is not
            // a ReferenceError
            if op == UnaryOp::TypeOf {
                if let ExprKind::Ident(name) = &arg.kind {
                    let name = name.clone();
                    match self.lookup_in_scope_lenient(scope, &name)? {
                        GetOutcome::Value(v) => {
                            let s = self.type_of(&v);
                            return Ok(Outcome::Done(Some(Deposit::Val(Value::str(s)))));
                        }
                        GetOutcome::Getter(getter) => {
                            frame.scratch = Scratch::Unary { issued: true };
                            let this = Value::Object(self.roots.global);
                            return Ok(Outcome::Push(self.accessor_frame(
                                getter,
                                this,
                                Vec::new(),
                                scope,
                            )));
                        }
                    }
                }
            }
            frame.scratch = Scratch::Unary { issued: true };
            let child = if op == UnaryOp::Delete {
                Frame::expr_ref(arg.clone(), scope)
            } else {
                Frame::expr(arg.clone(), scope)
            };
            return Ok(Outcome::Push(child));
        }
        let deposit = frame.deposit.take();
        let value = match op {
            UnaryOp::Delete => {
                let strict = self.scope_strict(scope);
                match deposit {
                    Some(Deposit::Ref(RefSlot::Scope(name))) => {
                        Value::Boolean(self.delete_scope_binding(scope, &name, strict)?)
                    }
                    Some(Deposit::Ref(RefSlot::Prop(base, key))) => match base {
                        Value::Object(id) => {
                            Value::Boolean(self.delete_property(id, &key, strict)?)
                        }
                        _ => Value::Boolean(true),
                    },
                    // `delete` on a non-reference yields true
                    _ => Value::Boolean(true),
                }
            }
            UnaryOp::TypeOf => {
                let v = deposit.map(Deposit::into_value).unwrap_or_default();
                Value::str(self.type_of(&v))
            }
            UnaryOp::Void => Value::Undefined,
            UnaryOp::Not => {
                let v = deposit.map(Deposit::into_value).unwrap_or_default();
                Value::Boolean(!v.truthy())
            }
            UnaryOp::Neg => {
                let v = deposit.map(Deposit::into_value).unwrap_or_default();
                Value::Number(-self.to_number_value(&v)?)
            }
            UnaryOp::Plus => {
                let v = deposit.map(Deposit::into_value).unwrap_or_default();
                Value::Number(self.to_number_value(&v)?)
            }
            UnaryOp::BitNot => {
                let v = deposit.map(Deposit::into_value).unwrap_or_default();
                let n = self.to_number_value(&v)?;
                Value::Number(!js_number::to_int32(n) as f64)
            }
        };
        Ok(Outcome::Done(Some(Deposit::Val(value))))
    }

    fn step_update(
        &mut self,
        frame: &mut Frame,
        op: UpdateOp,
        prefix: bool,
        arg: &ExprRef,
    ) -> Result<Outcome, Throw> {
        let scope = frame.scope;
        if !matches!(frame.scratch, Scratch::Update(_)) {
            frame.scratch = Scratch::Update(Box::new(UpdateScratch {
                mode: 0,
                slot: None,
                old: 0.0,
                result: Value::Undefined,
            }));
            return Ok(Outcome::Push(Frame::expr_ref(arg.clone(), scope)));
        }
        loop {
            let Scratch::Update(state) = &mut frame.scratch else {
                unreachable!()
            };
            match state.mode {
                0 => {
                    let slot = match frame.deposit.take() {
                        Some(Deposit::Ref(slot)) => slot,
                        _ => return Err(self.internal_error("update target is not a reference")),
                    };
                    let Scratch::Update(state) = &mut frame.scratch else {
                        unreachable!()
                    };
                    state.slot = Some(slot.clone());
                    state.mode = 2;
                    match self.read_ref(&slot, scope)? {
                        GetOutcome::Value(v) => {
                            frame.deposit = Some(Deposit::Val(v));
                        }
                        GetOutcome::Getter(getter) => {
                            let this = self.ref_this(&slot);
                            return Ok(Outcome::Push(self.accessor_frame(
                                getter,
                                this,
                                Vec::new(),
                                scope,
                            )));
                        }
                    }
                }
                2 => {
                    let current = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    let old = self.to_number_value(&current)?;
                    let delta = match op {
                        UpdateOp::Increment => 1.0,
                        UpdateOp::Decrement => -1.0,
                    };
                    let new = old + delta;
                    let Scratch::Update(state) = &mut frame.scratch else {
                        unreachable!()
                    };
                    state.old = old;
                    state.result = Value::Number(if prefix { new } else { old });
                    state.mode = 3;
                    let slot = state.slot.clone().ok_or_else(|| {
                        self.internal_error("update lost its reference")
                    })?;
                    match self.put_ref(&slot, Value::Number(new), scope)? {
                        Some(child) => return Ok(Outcome::Push(child)),
                        None => continue,
                    }
                }
                _ => {
                    frame.deposit = None;
                    return Ok(Outcome::Done(Some(Deposit::Val(state.result.clone()))));
                }
            }
        }
    }

    fn step_assign(
        &mut self,
        frame: &mut Frame,
        op: Option<BinaryOp>,
        target: &ExprRef,
        value_expr: &ExprRef,
    ) -> Result<Outcome, Throw> {
        let scope = frame.scope;
        if !matches!(frame.scratch, Scratch::Assign(_)) {
            frame.scratch = Scratch::Assign(Box::new(AssignScratch {
                mode: 0,
                slot: None,
                current: Value::Undefined,
                result: Value::Undefined,
            }));
            return Ok(Outcome::Push(Frame::expr_ref(target.clone(), scope)));
        }
        loop {
            let Scratch::Assign(state) = &mut frame.scratch else {
                unreachable!()
            };
            match state.mode {
                // left side evaluated in reference mode
                0 => {
                    let slot = match frame.deposit.take() {
                        Some(Deposit::Ref(slot)) => slot,
                        _ => {
                            return Err(self.internal_error(
                                "assignment target is not a reference",
                            ));
                        }
                    };
                    let Scratch::Assign(state) = &mut frame.scratch else {
                        unreachable!()
                    };
                    state.slot = Some(slot.clone());
                    if op.is_none() {
                        state.mode = 2;
                        let mut child = Frame::expr(value_expr.clone(), scope);
                        if let RefSlot::Scope(name) = &slot {
                            child.name_hint = Some(name.clone());
                        } else if let RefSlot::Prop(_, name) = &slot {
                            child.name_hint = Some(name.clone());
                        }
                        return Ok(Outcome::Push(child));
                    }
                    // compound operators fetch the current value first
                    state.mode = 1;
                    match self.read_ref(&slot, scope)? {
                        GetOutcome::Value(v) => {
                            frame.deposit = Some(Deposit::Val(v));
                        }
                        GetOutcome::Getter(getter) => {
                            let this = self.ref_this(&slot);
                            return Ok(Outcome::Push(self.accessor_frame(
                                getter,
                                this,
                                Vec::new(),
                                scope,
                            )));
                        }
                    }
                }
                1 => {
                    state.current = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    state.mode = 2;
                    return Ok(Outcome::Push(Frame::expr(value_expr.clone(), scope)));
                }
                // right side done: compute and store
                2 => {
                    let rhs = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    let result = match op {
                        Some(op) => {
                            let current = state.current.clone();
                            self.binary_op(op, &current, &rhs)?
                        }
                        None => rhs,
                    };
                    let Scratch::Assign(state) = &mut frame.scratch else {
                        unreachable!()
                    };
                    state.result = result.clone();
                    state.mode = 3;
                    let slot = state.slot.clone().ok_or_else(|| {
                        self.internal_error("assignment lost its reference")
                    })?;
                    match self.put_ref(&slot, result, scope)? {
                        Some(child) => return Ok(Outcome::Push(child)),
                        None => continue,
                    }
                }
                _ => {
                    frame.deposit = None;
                    return Ok(Outcome::Done(Some(Deposit::Val(state.result.clone()))));
                }
            }
        }
    }

    fn step_member(&mut self, frame: &mut Frame, expr: &ExprRef) -> Result<Outcome, Throw> {
        let scope = frame.scope;
        let (object_expr, static_key, index_expr) = match &expr.kind {
            ExprKind::Property(object, name) => (object, Some(name.clone()), None),
            ExprKind::Index(object, index) => (object, None, Some(index.clone())),
            _ => return Err(self.internal_error("member step on non-member node")),
        };
        if !matches!(frame.scratch, Scratch::Member { .. }) {
            frame.scratch = Scratch::Member {
                mode: 0,
                base: None,
                key: None,
            };
            return Ok(Outcome::Push(Frame::expr(object_expr.clone(), scope)));
        }
        loop {
            let Scratch::Member { mode, base, key } = &mut frame.scratch else {
                unreachable!()
            };
            match *mode {
                0 => {
                    *base = Some(
                        frame
                            .deposit
                            .take()
                            .map(Deposit::into_value)
                            .unwrap_or_default(),
                    );
                    match (&static_key, &index_expr) {
                        (Some(name), _) => {
                            *key = Some(name.clone());
                            *mode = 2;
                        }
                        (None, Some(index)) => {
                            *mode = 1;
                            return Ok(Outcome::Push(Frame::expr(index.clone(), scope)));
                        }
                        _ => unreachable!(),
                    }
                }
                1 => {
                    let index = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    let name = self.to_string_value(&index)?;
                    let Scratch::Member { mode, key, .. } = &mut frame.scratch else {
                        unreachable!()
                    };
                    *key = Some(Rc::from(name.as_str()));
                    *mode = 2;
                }
                2 => {
                    let base = base.clone().unwrap_or_default();
                    let key = key.clone().unwrap_or_else(|| Rc::from(""));
                    if frame.want_ref {
                        return Ok(Outcome::Done(Some(Deposit::Ref(RefSlot::Prop(base, key)))));
                    }
                    match self.get_property(&base, &key)? {
                        GetOutcome::Value(v) => {
                            return Ok(Outcome::Done(Some(Deposit::Val(v))));
                        }
                        GetOutcome::Getter(getter) => {
                            let Scratch::Member { mode, .. } = &mut frame.scratch else {
                                unreachable!()
                            };
                            *mode = 3;
                            return Ok(Outcome::Push(self.accessor_frame(
                                getter,
                                base,
                                Vec::new(),
                                scope,
                            )));
                        }
                    }
                }
                _ => {
                    let value = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    return Ok(Outcome::Done(Some(Deposit::Val(value))));
                }
            }
        }
    }

    fn step_call_expression(
        &mut self,
        frame: &mut Frame,
        expr: &ExprRef,
    ) -> Result<Outcome, Throw> {
        let scope = frame.scope;
        let (callee, args, construct) = match &expr.kind {
            ExprKind::Call(callee, args) => (callee, args, false),
            ExprKind::New(callee, args) => (callee, args, true),
            _ => return Err(self.internal_error("call step on non-call node")),
        };
        if !matches!(frame.scratch, Scratch::CallExpr(_)) {
            frame.scratch = Scratch::CallExpr(Box::new(CallExprScratch {
                mode: 0,
                func: Value::Undefined,
                this: Value::Undefined,
                args: Vec::new(),
                arg_index: 0,
                direct_eval: false,
            }));
            let child = if construct {
                Frame::expr(callee.clone(), scope)
            } else {
                Frame::expr_ref(callee.clone(), scope)
            };
            return Ok(Outcome::Push(child));
        }
        loop {
            let Scratch::CallExpr(state) = &mut frame.scratch else {
                unreachable!()
            };
            match state.mode {
                // resolve the callee, deriving `this` from the reference
                0 => {
                    match frame.deposit.take() {
                        Some(Deposit::Ref(RefSlot::Scope(name))) => {
                            state.direct_eval = &*name == "eval";
                            state.mode = 2;
                            match self.lookup_in_scope(scope, &name)? {
                                GetOutcome::Value(v) => {
                                    let Scratch::CallExpr(state) = &mut frame.scratch else {
                                        unreachable!()
                                    };
                                    state.func = v;
                                }
                                GetOutcome::Getter(getter) => {
                                    let Scratch::CallExpr(state) = &mut frame.scratch else {
                                        unreachable!()
                                    };
                                    state.mode = 1;
                                    let this = Value::Object(self.roots.global);
                                    return Ok(Outcome::Push(self.accessor_frame(
                                        getter,
                                        this,
                                        Vec::new(),
                                        scope,
                                    )));
                                }
                            }
                        }
                        Some(Deposit::Ref(RefSlot::Prop(base, key))) => {
                            state.this = base.clone();
                            state.mode = 2;
                            match self.get_property(&base, &key)? {
                                GetOutcome::Value(v) => {
                                    let Scratch::CallExpr(state) = &mut frame.scratch else {
                                        unreachable!()
                                    };
                                    state.func = v;
                                }
                                GetOutcome::Getter(getter) => {
                                    let Scratch::CallExpr(state) = &mut frame.scratch else {
                                        unreachable!()
                                    };
                                    state.mode = 1;
                                    return Ok(Outcome::Push(self.accessor_frame(
                                        getter,
                                        base,
                                        Vec::new(),
                                        scope,
                                    )));
                                }
                            }
                        }
                        Some(Deposit::Val(v)) => {
                            state.func = v;
                            state.mode = 2;
                        }
                        None => {
                            return Err(self.internal_error("call callee did not deposit"));
                        }
                    }
                }
                1 => {
                    state.func = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    state.mode = 2;
                }
                // evaluate arguments left to right
                2 => {
                    if let Some(deposit) = frame.deposit.take() {
                        state.args.push(deposit.into_value());
                    }
                    if state.arg_index < args.len() {
                        let arg = args[state.arg_index].clone();
                        state.arg_index += 1;
                        return Ok(Outcome::Push(Frame::expr(arg, scope)));
                    }
                    state.mode = 3;
                    let call = CallScratch {
                        func: state.func.clone(),
                        this: state.this.clone(),
                        args: std::mem::take(&mut state.args),
                        construct,
                        new_object: None,
                        direct_eval: state.direct_eval,
                        mode: CallMode::Enter,
                    };
                    return Ok(Outcome::Push(Frame::call(call, scope)));
                }
                _ => {
                    let value = frame
                        .deposit
                        .take()
                        .map(Deposit::into_value)
                        .unwrap_or_default();
                    return Ok(Outcome::Done(Some(Deposit::Val(value))));
                }
            }
        }
    }

    // ───────────────────────── the call executor ──────────────────────────

    pub(crate) fn step_call(&mut self, frame: &mut Frame) -> Result<Outcome, Throw> {
        let Scratch::Call(state) = &mut frame.scratch else {
            return Err(self.internal_error("call frame without call scratch"));
        };
        match state.mode {
            CallMode::Enter => self.enter_call(frame),
            CallMode::Body => {
                let Scratch::Call(state) = &mut frame.scratch else {
                    unreachable!()
                };
                let result = frame
                    .deposit
                    .take()
                    .map(Deposit::into_value)
                    .unwrap_or_default();
                let value = finish_construct(state, result);
                Ok(Outcome::Done(Some(Deposit::Val(value))))
            }
            CallMode::AwaitingAsync => {
                if let Some(value) = self.resume_value.take() {
                    if self.resume_is_throw {
                        self.resume_is_throw = false;
                        return Err(Throw(value));
                    }
                    let Scratch::Call(state) = &mut frame.scratch else {
                        unreachable!()
                    };
                    let value = finish_construct(state, value);
                    return Ok(Outcome::Done(Some(Deposit::Val(value))));
                }
                Ok(Outcome::Pause)
            }
        }
    }

    fn enter_call(&mut self, frame: &mut Frame) -> Result<Outcome, Throw> {
        let scope = frame.scope;
        let (func_value, mut this, args, construct) = {
            let Scratch::Call(state) = &mut frame.scratch else {
                unreachable!()
            };
            (
                state.func.clone(),
                state.this.clone(),
                state.args.clone(),
                state.construct,
            )
        };
        let func_id = match func_value.as_object() {
            Some(id) if self.heap.get(id).is_callable() => id,
            _ => {
                let shown = self.to_display_string(&func_value);
                return Err(raise_type_error!(self, "{} is not a function", shown));
            }
        };
        let (func_kind, illegal_constructor, eval_marker) = {
            let obj = self.heap.get(func_id);
            (obj.func.clone(), obj.illegal_constructor, obj.is_eval)
        };
        if construct && illegal_constructor {
            let shown = self.to_display_string(&func_value);
            return Err(raise_type_error!(self, "{} is not a constructor", shown));
        }

        // Function.prototype.apply / .call rewrite the pending call in place.
        if let Some(FuncKind::Builtin(name)) = &func_kind {
            if *name == "Function.prototype.apply" || *name == "Function.prototype.call" {
                let is_apply = *name == "Function.prototype.apply";
                let this_arg = args.first().cloned().unwrap_or_default();
                let rest = if is_apply {
                    match args.get(1) {
                        None | Some(Value::Undefined) | Some(Value::Null) => Vec::new(),
                        Some(Value::Object(id)) => self.array_like_to_vec(*id),
                        Some(other) => {
                            let shown = self.to_display_string(other);
                            return Err(raise_type_error!(
                                self,
                                "CreateListFromArrayLike called on non-object {}",
                                shown
                            ));
                        }
                    }
                } else {
                    args.iter().skip(1).cloned().collect()
                };
                let Scratch::Call(state) = &mut frame.scratch else {
                    unreachable!()
                };
                state.func = this;
                state.this = this_arg;
                state.args = rest;
                return Ok(Outcome::Keep);
            }
        }

        if eval_marker {
            return self.enter_eval(frame, scope);
        }

        let mut new_object = None;
        if construct {
            let proto = match self.get_property_value(&func_value, "prototype")? {
                Value::Object(id) => id,
                _ => self.roots.object_proto,
            };
            let instance = self.alloc_object(Some(proto));
            new_object = Some(instance);
            this = Value::Object(instance);
            let Scratch::Call(state) = &mut frame.scratch else {
                unreachable!()
            };
            state.new_object = Some(instance);
            state.this = this.clone();
        }

        let Some(kind) = func_kind else {
            return Err(self.internal_error("callable object without function payload"));
        };
        match kind {
            FuncKind::Ast { node, scope: captured } => {
                let strict = self.scope_strict(captured) || node.strict;
                {
                    let Scratch::Call(state) = &mut frame.scratch else {
                        unreachable!()
                    };
                    state.mode = CallMode::Body;
                }
                let this_val = if strict {
                    this
                } else {
                    match this {
                        Value::Undefined | Value::Null => Value::Object(self.roots.global),
                        primitive @ (Value::Boolean(_) | Value::Number(_) | Value::Str(_)) => {
                            let boxed = self.to_object(&primitive)?;
                            Value::Object(boxed)
                        }
                        object => object,
                    }
                };
                let fn_scope = self.new_scope(Some(captured), this_val, strict);
                let scope_obj = self.scopes.get(fn_scope).object;
                if let Some(name) = &node.name {
                    self.define_raw(scope_obj, name, func_value.clone(), VARIABLE);
                }
                for (i, param) in node.params.iter().enumerate() {
                    let arg = args.get(i).cloned().unwrap_or_default();
                    self.define_raw(scope_obj, param, arg, VARIABLE);
                }
                let arguments = self.create_array_from(args);
                self.define_raw(scope_obj, "arguments", Value::Object(arguments), VARIABLE);
                self.populate_scope(&node.body, fn_scope);
                let body = Statement::synthetic(StatementKind::Block(node.body.clone()));
                Ok(Outcome::Push(Frame::stmt(body, fn_scope)))
            }
            FuncKind::Builtin(name) => {
                let info = NativeInfo {
                    construct,
                    new_object,
                };
                let result = self.call_builtin(name, &this, &args, info)?;
                let Scratch::Call(state) = &mut frame.scratch else {
                    unreachable!()
                };
                let value = finish_construct(state, result);
                Ok(Outcome::Done(Some(Deposit::Val(value))))
            }
            FuncKind::Host { func, .. } => {
                let result = (*func)(self, &this, &args)?;
                let Scratch::Call(state) = &mut frame.scratch else {
                    unreachable!()
                };
                let value = finish_construct(state, result);
                Ok(Outcome::Done(Some(Deposit::Val(value))))
            }
            FuncKind::AsyncHost { func, .. } => {
                {
                    let Scratch::Call(state) = &mut frame.scratch else {
                        unreachable!()
                    };
                    state.mode = CallMode::AwaitingAsync;
                }
                self.resume_counter += 1;
                let token = ResumeToken(self.resume_counter);
                self.pending_resume = Some(token);
                self.paused = true;
                log::debug!("pausing on async native (token {})", token.0);
                (*func)(self, &this, &args, token);
                if self.resume_value.is_some() || !self.paused {
                    // resolved synchronously
                    Ok(Outcome::Keep)
                } else {
                    Ok(Outcome::Pause)
                }
            }
        }
    }

    /// `eval`: parse, strip locations, pick the scope, hoist, and run the
    /// body as a first-class EvalProgram frame.
    fn enter_eval(&mut self, frame: &mut Frame, scope: ScopeId) -> Result<Outcome, Throw> {
        let Scratch::Call(state) = &mut frame.scratch else {
            unreachable!()
        };
        let source = match state.args.first() {
            Some(Value::Str(s)) => s.clone(),
            Some(other) => {
                // eval of a non-string is the identity function
                let other = other.clone();
                return Ok(Outcome::Done(Some(Deposit::Val(other))));
            }
            None => return Ok(Outcome::Done(Some(Deposit::Val(Value::Undefined)))),
        };
        let direct = state.direct_eval;
        state.mode = CallMode::Body;
        let program = match parser::parse_program_opts(&source, false) {
            Ok(program) => program,
            Err(err) => {
                let message = match &err {
                    JSError::SyntaxError { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                return Err(raise_syntax_error!(self, "{}", message));
            }
        };
        let eval_scope = if direct { scope } else { self.global_scope };
        self.populate_scope(&program.body, eval_scope);
        Ok(Outcome::Push(Frame::eval_program(program.body, eval_scope)))
    }

    // ─────────────────────────── reference plumbing ───────────────────────

    /// Builds the synthesized call frame that re-enters the evaluator for a
    /// pending getter or setter.
    pub(crate) fn accessor_frame(
        &mut self,
        accessor: ObjectId,
        this: Value,
        args: Vec<Value>,
        scope: ScopeId,
    ) -> Frame {
        Frame::call(
            CallScratch {
                func: Value::Object(accessor),
                this,
                args,
                construct: false,
                new_object: None,
                direct_eval: false,
                mode: CallMode::Enter,
            },
            scope,
        )
    }

    fn ref_this(&self, slot: &RefSlot) -> Value {
        match slot {
            RefSlot::Scope(_) => Value::Object(self.roots.global),
            RefSlot::Prop(base, _) => base.clone(),
        }
    }

    pub(crate) fn read_ref(&mut self, slot: &RefSlot, scope: ScopeId) -> Result<GetOutcome, Throw> {
        match slot {
            RefSlot::Scope(name) => self.lookup_in_scope(scope, name),
            RefSlot::Prop(base, key) => self.get_property(&base.clone(), key),
        }
    }

    /// Stores through a reference. Returns the synthesized setter frame when
    /// the store trapped.
    pub(crate) fn put_ref(
        &mut self,
        slot: &RefSlot,
        value: Value,
        scope: ScopeId,
    ) -> Result<Option<Frame>, Throw> {
        let outcome = match slot {
            RefSlot::Scope(name) => self.assign_in_scope(scope, name, value.clone())?,
            RefSlot::Prop(base, key) => {
                let strict = self.scope_strict(scope);
                self.set_property(&base.clone(), key, value.clone(), strict)?
            }
        };
        match outcome {
            SetOutcome::Done => Ok(None),
            SetOutcome::Setter(setter) => {
                let this = self.ref_this(slot);
                Ok(Some(self.accessor_frame(setter, this, vec![value], scope)))
            }
        }
    }

    // ───────────────────────── nested synchronous calls ───────────────────

    /// Runs one call to completion on a private stack segment and returns
    /// its value. This is how the coercion protocol re-enters interpreted
    /// `valueOf`/`toString` from the middle of an operator step: the main
    /// state stack is parked, the call runs on its own stack, and control
    /// returns to the suspended step function with the result in hand.
    pub(crate) fn call_function_sync(
        &mut self,
        func: Value,
        this: Value,
        args: Vec<Value>,
    ) -> Result<Value, Throw> {
        if self.coercion_depth >= COERCION_DEPTH_LIMIT {
            return Err(crate::raise_range_error!(
                self,
                "Maximum call stack size exceeded"
            ));
        }
        self.coercion_depth += 1;
        let parked = std::mem::take(&mut self.stack);
        let scope = self.global_scope;
        self.stack.push(Frame::call(
            CallScratch {
                func,
                this,
                args,
                construct: false,
                new_object: None,
                direct_eval: false,
                mode: CallMode::Enter,
            },
            scope,
        ));
        let result = self.drive_nested();
        self.stack = parked;
        self.coercion_depth -= 1;
        result
    }

    /// The step loop for a nested call: identical to `step_once`, except an
    /// emptied stack delivers the result and suspension is not allowed.
    fn drive_nested(&mut self) -> Result<Value, Throw> {
        loop {
            let Some(mut frame) = self.stack.pop() else {
                return Ok(Value::Undefined);
            };
            match self.dispatch_frame(&mut frame) {
                Ok(Outcome::Push(child)) => {
                    self.stack.push(frame);
                    self.stack.push(child);
                }
                Ok(Outcome::Keep) => {
                    self.stack.push(frame);
                }
                Ok(Outcome::Pause) => {
                    self.stack.push(frame);
                    self.paused = false;
                    self.pending_resume = None;
                    self.resume_value = None;
                    return Err(raise_type_error!(
                        self,
                        "Cannot suspend on an asynchronous function during type conversion"
                    ));
                }
                Ok(Outcome::Done(deposit)) => match self.stack.last_mut() {
                    Some(parent) => parent.deposit = deposit,
                    None => {
                        return Ok(deposit.map(Deposit::into_value).unwrap_or_default());
                    }
                },
                Ok(Outcome::Unwind(completion)) => self.unwind_nested(completion)?,
                Err(throw) => self.unwind_nested(Completion::throw(throw.0))?,
            }
        }
    }

    /// Unwind within a nested call: the same walk as `unwind`, but there is
    /// no program frame — a completion that escapes the segment surfaces as
    /// a throw to the coercion caller.
    fn unwind_nested(&mut self, completion: Completion) -> Result<(), Throw> {
        loop {
            let Some(top) = self.stack.last_mut() else {
                if completion.kind == CompletionKind::Throw {
                    return Err(Throw(completion.value));
                }
                return Err(self.internal_error("unsyntactic completion in nested call"));
            };
            match &top.task {
                Task::Stmt(stmt) if matches!(stmt.kind, StatementKind::Try(_)) => {
                    if let Scratch::Try(t) = &mut top.scratch {
                        t.cv = Some(completion);
                        return Ok(());
                    }
                }
                Task::Call => {
                    if completion.kind == CompletionKind::Return {
                        top.deposit = Some(Deposit::Val(completion.value));
                        return Ok(());
                    }
                    // anything else keeps popping; an escape is caught above
                }
                _ => {}
            }
            match completion.kind {
                CompletionKind::Break => {
                    let handled = match &completion.label {
                        Some(label) => top.labels.iter().any(|l| l == label),
                        None => top.is_loop() || top.is_switch(),
                    };
                    if handled {
                        self.stack.pop();
                        return Ok(());
                    }
                }
                CompletionKind::Continue => {
                    let handled = match &completion.label {
                        Some(label) => top.is_loop() && top.labels.iter().any(|l| l == label),
                        None => top.is_loop(),
                    };
                    if handled {
                        return Ok(());
                    }
                }
                _ => {}
            }
            self.stack.pop();
        }
    }

    fn delete_scope_binding(
        &mut self,
        scope: ScopeId,
        name: &str,
        strict: bool,
    ) -> Result<bool, Throw> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let link = self.scopes.get(id);
            let object = link.object;
            let parent = link.parent;
            if self.has_own_property(object, name) || (link.with_scope && self.has_property(object, name))
            {
                return self.delete_property(object, name, strict);
            }
            current = parent;
        }
        Ok(true)
    }

    fn array_like_to_vec(&mut self, id: ObjectId) -> Vec<Value> {
        let len = match self.heap.get(id).properties.get("length") {
            Some(prop) => match &prop.value {
                Value::Number(n) => js_number::to_uint32(*n),
                _ => 0,
            },
            None => 0,
        };
        let mut out = Vec::with_capacity(len as usize);
        for i in 0..len {
            let key = i.to_string();
            let value = self
                .heap
                .get(id)
                .properties
                .get(&key)
                .map(|p| p.value.clone())
                .unwrap_or_default();
            out.push(value);
        }
        out
    }

    // ───────────────────────────── hoisting ───────────────────────────────

    /// Installs `var` bindings and function declarations before a body runs.
    /// Nested function bodies are not descended into.
    pub(crate) fn populate_scope(&mut self, body: &[StmtRef], scope: ScopeId) {
        for stmt in body {
            self.hoist_statement(stmt, scope);
        }
    }

    fn hoist_statement(&mut self, stmt: &StmtRef, scope: ScopeId) {
        match &stmt.kind {
            StatementKind::Var(decls) => {
                for (name, _) in decls {
                    let name = name.clone();
                    self.declare_in_scope(scope, &name, None);
                }
            }
            StatementKind::FunctionDeclaration(node) => {
                let node = node.clone();
                let func = self.create_ast_function(&node, scope, None);
                let name = node.name.clone().unwrap_or_else(|| Rc::from(""));
                self.declare_in_scope(scope, &name, Some(Value::Object(func)));
            }
            StatementKind::Block(body) => self.populate_scope(body, scope),
            StatementKind::If(_, consequent, alternate) => {
                self.hoist_statement(consequent, scope);
                if let Some(alternate) = alternate {
                    self.hoist_statement(alternate, scope);
                }
            }
            StatementKind::While(_, body) | StatementKind::DoWhile(body, _) => {
                self.hoist_statement(body, scope);
            }
            StatementKind::For(f) => {
                if let Some(ForInit::Var(init)) = &f.init {
                    self.hoist_statement(init, scope);
                }
                self.hoist_statement(&f.body, scope);
            }
            StatementKind::ForIn(f) => {
                if let ForInTarget::Var(name, _) = &f.target {
                    let name = name.clone();
                    self.declare_in_scope(scope, &name, None);
                }
                self.hoist_statement(&f.body, scope);
            }
            StatementKind::Try(t) => {
                self.hoist_statement(&t.block, scope);
                if let Some(handler) = &t.handler {
                    self.hoist_statement(&handler.body, scope);
                }
                if let Some(finalizer) = &t.finalizer {
                    self.hoist_statement(finalizer, scope);
                }
            }
            StatementKind::Switch(s) => {
                for case in &s.cases {
                    self.populate_scope(&case.body, scope);
                }
            }
            StatementKind::With(_, body) | StatementKind::Label(_, body) => {
                self.hoist_statement(body, scope);
            }
            _ => {}
        }
    }

    // ─────────────────────── object & function factories ──────────────────

    pub(crate) fn create_ast_function(
        &mut self,
        node: &Rc<FunctionNode>,
        scope: ScopeId,
        name_hint: Option<JsStr>,
    ) -> ObjectId {
        let proto = self.roots.function_proto;
        let id = self.alloc_object(Some(proto));
        {
            let obj = self.heap.get_mut(id);
            obj.class = CLASS_FUNCTION;
            obj.func = Some(FuncKind::Ast {
                node: node.clone(),
                scope,
            });
        }
        let name = node
            .name
            .clone()
            .or(name_hint)
            .unwrap_or_else(|| Rc::from(""));
        self.define_raw(
            id,
            "length",
            Value::Number(node.params.len() as f64),
            descriptor::NONCONFIGURABLE_READONLY_NONENUMERABLE,
        );
        self.define_raw(id, "name", Value::Str(name), READONLY_NONENUMERABLE);
        let object_proto = self.roots.object_proto;
        let prototype = self.alloc_object(Some(object_proto));
        self.define_raw(prototype, "constructor", Value::Object(id), NONENUMERABLE);
        self.define_raw(
            id,
            "prototype",
            Value::Object(prototype),
            Attributes {
                writable: true,
                enumerable: false,
                configurable: false,
            },
        );
        id
    }

    pub(crate) fn create_builtin_function(&mut self, name: &'static str, length: u32) -> ObjectId {
        let proto = self.roots.function_proto;
        let id = self.alloc_object(Some(proto));
        {
            let obj = self.heap.get_mut(id);
            obj.class = CLASS_FUNCTION;
            obj.func = Some(FuncKind::Builtin(name));
            obj.illegal_constructor = true;
        }
        let display = name.rsplit('.').next().unwrap_or(name);
        self.define_raw(
            id,
            "length",
            Value::Number(length as f64),
            descriptor::NONCONFIGURABLE_READONLY_NONENUMERABLE,
        );
        self.define_raw(id, "name", Value::str(display), READONLY_NONENUMERABLE);
        id
    }

    pub(crate) fn create_array(&mut self) -> ObjectId {
        let proto = self.roots.array_proto;
        let id = self.alloc_object(Some(proto));
        self.heap.get_mut(id).class = CLASS_ARRAY;
        self.define_raw(
            id,
            "length",
            Value::Number(0.0),
            Attributes {
                writable: true,
                enumerable: false,
                configurable: false,
            },
        );
        id
    }

    pub(crate) fn create_array_from(&mut self, values: Vec<Value>) -> ObjectId {
        let id = self.create_array();
        let len = values.len();
        for (i, value) in values.into_iter().enumerate() {
            self.define_raw(id, &i.to_string(), value, DEFAULT);
        }
        if len > 0 {
            self.lift_array_length(id, len as u32 - 1);
        }
        id
    }

    /// ToObject: boxes primitives, rejects null and undefined.
    pub(crate) fn to_object(&mut self, value: &Value) -> Result<ObjectId, Throw> {
        match value {
            Value::Object(id) => Ok(*id),
            Value::Str(s) => {
                let proto = self.roots.string_proto;
                let id = self.alloc_object(Some(proto));
                let obj = self.heap.get_mut(id);
                obj.class = CLASS_STRING;
                obj.data = Some(NativeData::BoxedString(s.clone()));
                let len = s.chars().count() as f64;
                self.define_raw(
                    id,
                    "length",
                    Value::Number(len),
                    descriptor::NONCONFIGURABLE_READONLY_NONENUMERABLE,
                );
                Ok(id)
            }
            Value::Number(n) => {
                let proto = self.roots.number_proto;
                let id = self.alloc_object(Some(proto));
                let obj = self.heap.get_mut(id);
                obj.class = CLASS_NUMBER;
                obj.data = Some(NativeData::BoxedNumber(*n));
                Ok(id)
            }
            Value::Boolean(b) => {
                let proto = self.roots.boolean_proto;
                let id = self.alloc_object(Some(proto));
                let obj = self.heap.get_mut(id);
                obj.class = CLASS_BOOLEAN;
                obj.data = Some(NativeData::BoxedBoolean(*b));
                Ok(id)
            }
            Value::Undefined | Value::Null => Err(raise_type_error!(
                self,
                "Cannot convert {} to object",
                self.type_name(value)
            )),
        }
    }

    // ─────────────────────────── key enumeration ──────────────────────────

    pub(crate) fn own_keys(&self, id: ObjectId) -> Vec<String> {
        self.heap.get(id).properties.keys().cloned().collect()
    }

    fn snapshot_enumerable(
        &self,
        id: ObjectId,
        skip: &std::collections::HashSet<String>,
    ) -> Vec<String> {
        self.heap
            .get(id)
            .properties
            .iter()
            .filter(|(k, p)| p.enumerable && !skip.contains(*k))
            .map(|(k, _)| k.clone())
            .collect()
    }

    // ──────────────────────────── coercions ───────────────────────────────

    pub(crate) fn type_name(&self, value: &Value) -> &'static str {
        match value {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
        }
    }

    pub(crate) fn type_of(&self, value: &Value) -> &'static str {
        match value {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(id) => {
                if self.heap.get(*id).is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// ToPrimitive (ES5 8.12.8): invoke the object's own or inherited
    /// `valueOf`/`toString` through the normal call machinery, in hint
    /// order. The default hint is Number for everything except Date.
    pub(crate) fn to_primitive(&mut self, value: &Value, number_hint: bool) -> Result<Value, Throw> {
        let Value::Object(id) = value else {
            return Ok(value.clone());
        };
        let date_like = matches!(self.heap.get(*id).data, Some(NativeData::Date(_)));
        let order = if !number_hint && date_like {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        self.ordinary_to_primitive(*id, order)
    }

    /// [[DefaultValue]]: the first of the named methods that is callable and
    /// returns a primitive wins; otherwise TypeError.
    fn ordinary_to_primitive(&mut self, id: ObjectId, order: [&str; 2]) -> Result<Value, Throw> {
        for name in order {
            let method = self.get_property_value(&Value::Object(id), name)?;
            let callable =
                matches!(&method, Value::Object(m) if self.heap.get(*m).is_callable());
            if callable {
                let result = self.call_function_sync(method, Value::Object(id), Vec::new())?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(raise_type_error!(
            self,
            "Cannot convert object to primitive value"
        ))
    }

    pub(crate) fn to_number_value(&mut self, value: &Value) -> Result<f64, Throw> {
        match value {
            Value::Undefined => Ok(f64::NAN),
            Value::Null => Ok(0.0),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Ok(*n),
            Value::Str(s) => Ok(js_number::parse_number(s)),
            Value::Object(_) => {
                let prim = self.to_primitive(value, true)?;
                self.to_number_value(&prim)
            }
        }
    }

    pub(crate) fn to_string_value(&mut self, value: &Value) -> Result<String, Throw> {
        match value {
            Value::Undefined => Ok("undefined".to_string()),
            Value::Null => Ok("null".to_string()),
            Value::Boolean(b) => Ok(b.to_string()),
            Value::Number(n) => Ok(js_number::format_number(*n)),
            Value::Str(s) => Ok(s.to_string()),
            Value::Object(id) => self.object_to_string(*id),
        }
    }

    /// Infallible rendering for error messages and host display.
    pub(crate) fn to_display_string(&mut self, value: &Value) -> String {
        self.to_string_value(value)
            .unwrap_or_else(|_| "[object Object]".to_string())
    }

    /// ToString for objects: string-hinted [[DefaultValue]], so a user
    /// `toString` (or `valueOf`) participates exactly as ES5 9.8 requires.
    fn object_to_string(&mut self, id: ObjectId) -> Result<String, Throw> {
        let prim = self.ordinary_to_primitive(id, ["toString", "valueOf"])?;
        self.to_string_value(&prim)
    }

    /// The display form of a function object, used by
    /// `Function.prototype.toString`.
    pub(crate) fn function_source_string(&self, id: ObjectId) -> String {
        let name = self
            .heap
            .get(id)
            .properties
            .get("name")
            .map(|p| match &p.value {
                Value::Str(s) => s.to_string(),
                _ => String::new(),
            })
            .unwrap_or_default();
        match &self.heap.get(id).func {
            Some(FuncKind::Ast { node, .. }) => {
                let params = node
                    .params
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("function {name}({params}) {{ ... }}")
            }
            _ => format!("function {name}() {{ [native code] }}"),
        }
    }

    // ─────────────────────────── operators ────────────────────────────────

    pub(crate) fn binary_op(
        &mut self,
        op: BinaryOp,
        lhs: &Value,
        rhs: &Value,
    ) -> Result<Value, Throw> {
        use BinaryOp::*;
        Ok(match op {
            Add => {
                let lp = self.to_primitive(lhs, false)?;
                let rp = self.to_primitive(rhs, false)?;
                if matches!(lp, Value::Str(_)) || matches!(rp, Value::Str(_)) {
                    let ls = self.to_string_value(&lp)?;
                    let rs = self.to_string_value(&rp)?;
                    Value::str(&format!("{ls}{rs}"))
                } else {
                    let ln = self.to_number_value(&lp)?;
                    let rn = self.to_number_value(&rp)?;
                    Value::Number(ln + rn)
                }
            }
            Sub => Value::Number(self.to_number_value(lhs)? - self.to_number_value(rhs)?),
            Mul => Value::Number(self.to_number_value(lhs)? * self.to_number_value(rhs)?),
            Div => Value::Number(self.to_number_value(lhs)? / self.to_number_value(rhs)?),
            Mod => Value::Number(self.to_number_value(lhs)? % self.to_number_value(rhs)?),
            StrictEqual => Value::Boolean(lhs == rhs),
            StrictNotEqual => Value::Boolean(lhs != rhs),
            Equal => Value::Boolean(self.abstract_equals(lhs, rhs)?),
            NotEqual => Value::Boolean(!self.abstract_equals(lhs, rhs)?),
            Less | Greater | LessEqual | GreaterEqual => {
                let lp = self.to_primitive(lhs, true)?;
                let rp = self.to_primitive(rhs, true)?;
                if let (Value::Str(a), Value::Str(b)) = (&lp, &rp) {
                    let (a, b) = (a.as_ref(), b.as_ref());
                    Value::Boolean(match op {
                        Less => a < b,
                        Greater => a > b,
                        LessEqual => a <= b,
                        _ => a >= b,
                    })
                } else {
                    let a = self.to_number_value(&lp)?;
                    let b = self.to_number_value(&rp)?;
                    if a.is_nan() || b.is_nan() {
                        Value::Boolean(false)
                    } else {
                        Value::Boolean(match op {
                            Less => a < b,
                            Greater => a > b,
                            LessEqual => a <= b,
                            _ => a >= b,
                        })
                    }
                }
            }
            BitAnd | BitOr | BitXor => {
                let a = js_number::to_int32(self.to_number_value(lhs)?);
                let b = js_number::to_int32(self.to_number_value(rhs)?);
                Value::Number(match op {
                    BitAnd => a & b,
                    BitOr => a | b,
                    _ => a ^ b,
                } as f64)
            }
            LeftShift | RightShift => {
                let a = js_number::to_int32(self.to_number_value(lhs)?);
                let b = js_number::to_uint32(self.to_number_value(rhs)?) & 31;
                Value::Number(match op {
                    LeftShift => a.wrapping_shl(b),
                    _ => a.wrapping_shr(b),
                } as f64)
            }
            UnsignedRightShift => {
                let a = js_number::to_uint32(self.to_number_value(lhs)?);
                let b = js_number::to_uint32(self.to_number_value(rhs)?) & 31;
                Value::Number((a >> b) as f64)
            }
            In => {
                let Value::Object(id) = rhs else {
                    let shown = self.to_display_string(rhs);
                    return Err(raise_type_error!(
                        self,
                        "'in' expects an object, got {}",
                        shown
                    ));
                };
                let key = self.to_string_value(lhs)?;
                Value::Boolean(self.has_property(*id, &key))
            }
            InstanceOf => {
                let callable = matches!(rhs, Value::Object(id) if self.heap.get(*id).is_callable());
                if !callable {
                    return Err(raise_type_error!(
                        self,
                        "Right-hand side of 'instanceof' is not callable"
                    ));
                }
                let prototype = self.get_property_value(rhs, "prototype")?;
                let Value::Object(proto_id) = prototype else {
                    return Err(raise_type_error!(
                        self,
                        "Function has non-object prototype in instanceof check"
                    ));
                };
                let mut found = false;
                if let Value::Object(mut walk) = lhs.clone() {
                    while let Some(parent) = self.heap.get(walk).proto {
                        if parent == proto_id {
                            found = true;
                            break;
                        }
                        walk = parent;
                    }
                }
                Value::Boolean(found)
            }
        })
    }

    /// ES5 abstract equality (`==`).
    pub(crate) fn abstract_equals(&mut self, lhs: &Value, rhs: &Value) -> Result<bool, Throw> {
        use Value::*;
        Ok(match (lhs, rhs) {
            (Undefined | Null, Undefined | Null) => true,
            (Number(a), Number(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            (Number(_), Str(_)) => {
                let b = self.to_number_value(rhs)?;
                let Number(a) = lhs else { unreachable!() };
                *a == b
            }
            (Str(_), Number(_)) => {
                let a = self.to_number_value(lhs)?;
                let Number(b) = rhs else { unreachable!() };
                a == *b
            }
            (Boolean(_), _) => {
                let a = self.to_number_value(lhs)?;
                self.abstract_equals(&Number(a), rhs)?
            }
            (_, Boolean(_)) => {
                let b = self.to_number_value(rhs)?;
                self.abstract_equals(lhs, &Number(b))?
            }
            (Number(_) | Str(_), Object(_)) => {
                // ES5 11.9.3 uses the default hint here, so a Date compares
                // through its string form
                let rp = self.to_primitive(rhs, false)?;
                self.abstract_equals(lhs, &rp)?
            }
            (Object(_), Number(_) | Str(_)) => {
                let lp = self.to_primitive(lhs, false)?;
                self.abstract_equals(&lp, rhs)?
            }
            _ => false,
        })
    }

    pub(crate) fn internal_error(&mut self, message: &str) -> Throw {
        // a step-function inconsistency is a bug, not an interpreted error;
        // surface it loudly as a generic Error so the host sees it
        crate::raise_plain_error!(self, "internal: {}", message)
    }
}

fn finish_construct(state: &mut CallScratch, result: Value) -> Value {
    if state.construct && !matches!(result, Value::Object(_)) {
        if let Some(instance) = state.new_object {
            return Value::Object(instance);
        }
    }
    result
}
