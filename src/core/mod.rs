pub mod descriptor;
pub mod eval;
pub mod ffi;
pub mod frame;
pub mod parser;
pub mod scope;
pub mod statement;
pub mod token;
pub mod value;

pub use descriptor::{Attributes, PropertyDescriptor};
pub use frame::{Completion, CompletionKind, Deposit, Frame, RefSlot, ResumeToken, Scratch, Task};
pub use parser::{parse_program, parse_program_opts};
pub use statement::{Expr, ExprKind, FunctionNode, Program, Statement, StatementKind};
pub use token::{Token, TokenItem, tokenize};
pub use value::{
    FuncKind, GetOutcome, Heap, JsObject, JsStr, NativeData, ObjectId, Property, ScopeId,
    SetOutcome, Throw, Value,
};
