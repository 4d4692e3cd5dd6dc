#![doc = include_str!("../README.md")]

pub(crate) mod core;
#[macro_use]
pub mod error;
pub(crate) mod interp;
pub(crate) mod js_array;
pub(crate) mod js_boolean;
pub(crate) mod js_date;
pub(crate) mod js_error;
pub(crate) mod js_function;
pub(crate) mod js_global;
pub(crate) mod js_json;
pub(crate) mod js_math;
pub(crate) mod js_number;
pub(crate) mod js_object;
pub(crate) mod js_regexp;
pub(crate) mod js_string;
pub(crate) mod polyfills;
pub mod regexp_thread;

pub use core::{
    Attributes, ObjectId, Program, PropertyDescriptor, ResumeToken, ScopeId, Throw, Value,
    parse_program, parse_program_opts,
};
pub use error::JSError;
pub use interp::{Config, Interpreter, Roots, Status};
pub use js_error::ErrorKind;
pub use regexp_thread::RegExpMode;
