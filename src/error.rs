/// Host-side failures. Interpreted throws that escape the program are mapped
/// onto the variant matching the thrown error's `name`; thrown non-Error
/// values are stringified into `Error`.
#[derive(thiserror::Error, Debug)]
pub enum JSError {
    #[error("SyntaxError: {message} (line {line}, column {column})")]
    SyntaxError { message: String, line: u32, column: u32 },

    #[error("TypeError: {message}")]
    TypeError { message: String },

    #[error("RangeError: {message}")]
    RangeError { message: String },

    #[error("ReferenceError: {message}")]
    ReferenceError { message: String },

    #[error("EvalError: {message}")]
    EvalError { message: String },

    #[error("URIError: {message}")]
    URIError { message: String },

    #[error("Error: {message}")]
    Error { message: String },

    #[error("internal interpreter error: {0}")]
    Internal(String),
}

impl JSError {
    /// Build the host error matching an interpreted error's `name`.
    pub(crate) fn from_thrown(name: &str, message: String) -> JSError {
        match name {
            "SyntaxError" => JSError::SyntaxError {
                message,
                line: 0,
                column: 0,
            },
            "TypeError" => JSError::TypeError { message },
            "RangeError" => JSError::RangeError { message },
            "ReferenceError" => JSError::ReferenceError { message },
            "EvalError" => JSError::EvalError { message },
            "URIError" => JSError::URIError { message },
            _ => JSError::Error { message },
        }
    }
}

// The raise_* macros build an in-flight interpreted throw (a `Throw` carrying
// a freshly allocated error object). They yield the value rather than
// returning, so call sites read `return Err(raise_type_error!(...))` the same
// way for both early exits and `ok_or_else` adapters.

#[macro_export]
macro_rules! raise_type_error {
    ($interp:expr, $($arg:tt)*) => {
        $interp.make_error($crate::ErrorKind::Type, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! raise_range_error {
    ($interp:expr, $($arg:tt)*) => {
        $interp.make_error($crate::ErrorKind::Range, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! raise_reference_error {
    ($interp:expr, $($arg:tt)*) => {
        $interp.make_error($crate::ErrorKind::Reference, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! raise_syntax_error {
    ($interp:expr, $($arg:tt)*) => {
        $interp.make_error($crate::ErrorKind::Syntax, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! raise_uri_error {
    ($interp:expr, $($arg:tt)*) => {
        $interp.make_error($crate::ErrorKind::Uri, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! raise_plain_error {
    ($interp:expr, $($arg:tt)*) => {
        $interp.make_error($crate::ErrorKind::Generic, format!($($arg)*))
    };
}
