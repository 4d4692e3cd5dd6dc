use std::collections::HashSet;

use crate::core::statement::{ExprRef, StatementKind, StmtRef};
use crate::core::value::{JsStr, ObjectId, ScopeId, Value};

/// Ticket handed to an asynchronous native; the host trades it back in via
/// `Interpreter::resume` to deposit the result and clear the pause latch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResumeToken(pub(crate) u64);

/// What a left-hand-side expression evaluates to in reference mode.
#[derive(Clone, Debug)]
pub enum RefSlot {
    /// A scope binding.
    Scope(JsStr),
    /// A property of a base value (the base may be a primitive).
    Prop(Value, JsStr),
}

/// A child frame's result, handed to its parent when the child pops.
#[derive(Clone, Debug)]
pub enum Deposit {
    Val(Value),
    Ref(RefSlot),
}

impl Deposit {
    pub fn into_value(self) -> Value {
        match self {
            Deposit::Val(v) => v,
            Deposit::Ref(_) => Value::Undefined,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionKind {
    Normal,
    Break,
    Continue,
    Return,
    Throw,
}

/// A control-flow effect travelling up the state stack.
#[derive(Clone, Debug)]
pub struct Completion {
    pub kind: CompletionKind,
    pub value: Value,
    pub label: Option<JsStr>,
}

impl Completion {
    pub fn throw(value: Value) -> Completion {
        Completion {
            kind: CompletionKind::Throw,
            value,
            label: None,
        }
    }

    pub fn ret(value: Value) -> Completion {
        Completion {
            kind: CompletionKind::Return,
            value,
            label: None,
        }
    }

    pub fn break_(label: Option<JsStr>) -> Completion {
        Completion {
            kind: CompletionKind::Break,
            value: Value::Undefined,
            label,
        }
    }

    pub fn continue_(label: Option<JsStr>) -> Completion {
        Completion {
            kind: CompletionKind::Continue,
            value: Value::Undefined,
            label,
        }
    }
}

/// What a frame is evaluating. The synthetic function-call executor is a
/// first-class variant rather than a fabricated AST node, so accessor
/// re-entry and `Function.prototype.apply` can push one directly.
#[derive(Clone, Debug)]
pub enum Task {
    /// The user program; never popped, so code can be appended later.
    Program,
    /// An `eval` body; pops like an ordinary frame, delivering its value.
    EvalProgram,
    Stmt(StmtRef),
    Expr(ExprRef),
    Call,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallMode {
    /// Dispatch on the callee kind.
    Enter,
    /// An interpreted body (or eval program) is running above us.
    Body,
    /// Suspended on an asynchronous native.
    AwaitingAsync,
}

/// Scratch for the call executor frame.
#[derive(Clone, Debug)]
pub struct CallScratch {
    pub func: Value,
    pub this: Value,
    pub args: Vec<Value>,
    pub construct: bool,
    /// The freshly allocated instance for `new`, swapped in for any
    /// non-object return value.
    pub new_object: Option<ObjectId>,
    pub direct_eval: bool,
    pub mode: CallMode,
}

#[derive(Clone, Debug)]
pub struct ForInScratch {
    pub mode: u8,
    pub object: Value,
    pub current: Option<ObjectId>,
    pub keys: Vec<String>,
    pub key_index: usize,
    pub visited: HashSet<String>,
    pub pending_name: Option<JsStr>,
    /// Iterating the characters of a string primitive.
    pub string_len: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct SwitchScratch {
    pub mode: u8,
    pub discriminant: Value,
    pub case_index: usize,
    pub default_index: Option<usize>,
    pub matched: bool,
    pub stmt_index: usize,
}

#[derive(Clone, Debug)]
pub struct TryScratch {
    pub done_block: bool,
    pub done_handler: bool,
    pub done_finalizer: bool,
    /// The captured completion; consumed by the handler, re-raised after the
    /// finalizer if it survives.
    pub cv: Option<Completion>,
}

#[derive(Clone, Debug)]
pub struct AssignScratch {
    pub mode: u8,
    pub slot: Option<RefSlot>,
    pub current: Value,
    pub result: Value,
}

#[derive(Clone, Debug)]
pub struct UpdateScratch {
    pub mode: u8,
    pub slot: Option<RefSlot>,
    pub old: f64,
    pub result: Value,
}

#[derive(Clone, Debug)]
pub struct CallExprScratch {
    pub mode: u8,
    pub func: Value,
    pub this: Value,
    pub args: Vec<Value>,
    pub arg_index: usize,
    pub direct_eval: bool,
}

#[derive(Clone, Debug)]
pub struct ObjectLitScratch {
    pub index: usize,
    pub object: Option<ObjectId>,
}

/// Frame-local continuation state, one variant per node family. The `mode`
/// counters record which sub-expression was last issued so the step function
/// can pick up where it left off when a child frame pops.
#[derive(Clone, Debug)]
pub enum Scratch {
    None,
    Program { body: Vec<StmtRef>, index: usize },
    Block { index: usize },
    VarDecl { index: usize, issued: bool },
    ExprStmt { issued: bool },
    If { mode: u8 },
    Loop { mode: u8 },
    ForIn(Box<ForInScratch>),
    Switch(Box<SwitchScratch>),
    Try(Box<TryScratch>),
    With { mode: u8 },
    Return { issued: bool },
    Throw { issued: bool },
    Label { issued: bool },
    Assign(Box<AssignScratch>),
    Binary { left: Option<Value>, mode: u8 },
    Logical { mode: u8 },
    Unary { issued: bool },
    Update(Box<UpdateScratch>),
    Conditional { mode: u8 },
    Member { mode: u8, base: Option<Value>, key: Option<JsStr> },
    CallExpr(Box<CallExprScratch>),
    ArrayLit { index: usize, array: Option<ObjectId> },
    ObjectLit(Box<ObjectLitScratch>),
    Comma { index: usize },
    Ident { issued: bool },
    Call(Box<CallScratch>),
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub task: Task,
    pub scope: ScopeId,
    /// The parent wants a reference (`[scope, name]` / `[base, name]`), not a
    /// value. Only identifier and member frames honor it.
    pub want_ref: bool,
    /// Display name transmitted into function expressions by `var f = ...`,
    /// assignments and object literals.
    pub name_hint: Option<JsStr>,
    pub deposit: Option<Deposit>,
    pub labels: Vec<JsStr>,
    pub scratch: Scratch,
    /// Termination marker; meaningful on the program frame only.
    pub done: bool,
}

impl Frame {
    pub fn stmt(stmt: StmtRef, scope: ScopeId) -> Frame {
        Frame {
            task: Task::Stmt(stmt),
            scope,
            want_ref: false,
            name_hint: None,
            deposit: None,
            labels: Vec::new(),
            scratch: Scratch::None,
            done: false,
        }
    }

    pub fn expr(expr: ExprRef, scope: ScopeId) -> Frame {
        Frame {
            task: Task::Expr(expr),
            scope,
            want_ref: false,
            name_hint: None,
            deposit: None,
            labels: Vec::new(),
            scratch: Scratch::None,
            done: false,
        }
    }

    pub fn expr_ref(expr: ExprRef, scope: ScopeId) -> Frame {
        let mut frame = Frame::expr(expr, scope);
        frame.want_ref = true;
        frame
    }

    pub fn call(scratch: CallScratch, scope: ScopeId) -> Frame {
        Frame {
            task: Task::Call,
            scope,
            want_ref: false,
            name_hint: None,
            deposit: None,
            labels: Vec::new(),
            scratch: Scratch::Call(Box::new(scratch)),
            done: false,
        }
    }

    pub fn program(body: Vec<StmtRef>, scope: ScopeId) -> Frame {
        Frame {
            task: Task::Program,
            scope,
            want_ref: false,
            name_hint: None,
            deposit: None,
            labels: Vec::new(),
            scratch: Scratch::Program { body, index: 0 },
            done: false,
        }
    }

    pub fn eval_program(body: Vec<StmtRef>, scope: ScopeId) -> Frame {
        Frame {
            task: Task::EvalProgram,
            scope,
            want_ref: false,
            name_hint: None,
            deposit: None,
            labels: Vec::new(),
            scratch: Scratch::Program { body, index: 0 },
            done: false,
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            &self.task,
            Task::Stmt(s) if matches!(
                s.kind,
                StatementKind::While(..)
                    | StatementKind::DoWhile(..)
                    | StatementKind::For(_)
                    | StatementKind::ForIn(_)
            )
        )
    }

    pub fn is_switch(&self) -> bool {
        matches!(&self.task, Task::Stmt(s) if matches!(s.kind, StatementKind::Switch(_)))
    }

    /// Source line of the node this frame is evaluating; 0 for synthetic
    /// frames and location-stripped (polyfill / eval) code.
    pub fn line(&self) -> u32 {
        match &self.task {
            Task::Stmt(s) => s.line,
            Task::Expr(e) => e.line,
            Task::Program | Task::EvalProgram | Task::Call => 0,
        }
    }
}
