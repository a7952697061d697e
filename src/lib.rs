//! dictlisp - A small substitution-model Lisp with two dictionary dialects
//!
//! This crate implements the evaluator core of a Lisp-family teaching language
//! that exists in two dialects differing only in how dictionaries are expressed:
//!
//! ```scheme
//! ;; Core dialect: dictionaries are ordinary association-list data,
//! ;; manipulated through the dict / get / dict? primitives
//! (get (dict '((a . 1) (b . 2))) 'a)    ; => 1
//!
//! ;; Sugared dialect: dictionaries are first-class literal syntax,
//! ;; and a dictionary value is applied like a procedure to look up a key
//! ((dict (a 1) (b 2)) 'a)               ; => 1
//! ```
//!
//! ## Substitution-based application
//!
//! Procedure application does not extend a captured environment. Instead, the
//! evaluator alpha-renames every bound variable in the closure body to a fresh
//! name, converts each evaluated argument back into a literal expression, and
//! substitutes those literals for the parameters before evaluating the result
//! in the caller's environment. Closures therefore carry no environment; free
//! variables resolve against top-level `define`s at application time.
//!
//! ## Lowering
//!
//! The sugared dialect is bridged to the core dialect by a pure tree rewrite
//! ([`lower::lower_program`]) that replaces dictionary literals with
//! applications of the `dict` primitive over quoted association lists, and
//! dictionary applications with applications of the `get` primitive. Programs
//! whose dictionaries hold only literal values evaluate to the same result
//! before and after lowering.
//!
//! ## Modules
//!
//! - `ast`: expression tree, runtime values, surface-syntax rendering
//! - `reader`: s-expression parsing and syntactic analysis for both dialects
//! - `evaluator`: environment chain and the substitution-based evaluator
//! - `primitives`: built-in operation registry and dispatcher
//! - `lower`: dictionary-lowering pass (sugared dialect to core primitives)

use std::fmt;

/// Maximum parsing depth to prevent stack overflow on deeply nested input
pub const MAX_PARSE_DEPTH: usize = 32;

/// Maximum evaluation depth. Substitution-based application burns a few
/// levels per call, so this is set well above the parse limit; a
/// non-terminating self-application is cut off here and surfaced as
/// [`Error::StackOverflow`] instead of exhausting the host stack.
pub const MAX_EVAL_DEPTH: usize = 256;

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed source text or an ill-formed special form
    ParseError(String),
    /// A variable reference with no binding anywhere in the environment chain
    UnboundVariable(String),
    /// Operand of the wrong tag handed to a primitive
    TypeError(String),
    /// Wrong argument count to a closure, primitive, or dictionary application
    ArityError {
        expected: usize,
        got: usize,
        /// Optional context (primitive name or dictionary dump)
        context: Option<String>,
    },
    /// Dictionary lookup miss; the message carries the rendered key and
    /// the full dictionary contents
    KeyNotFound(String),
    /// Unknown primitive-operation name
    BadPrimitive(String),
    /// Operator value is not a primitive, closure, or dictionary
    NotApplicable(String),
    /// A program or procedure body with zero expressions
    EmptySequence,
    /// A dictionary literal whose value cannot be converted to a datum
    /// during lowering
    LoweringError(String),
    /// Evaluation depth limit exceeded
    StackOverflow(usize),
}

impl Error {
    /// Create an ArityError without extra context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            context: None,
        }
    }

    /// Create an ArityError carrying context (primitive name, dictionary dump)
    pub fn arity_error_in(expected: usize, got: usize, context: impl Into<String>) -> Self {
        Error::ArityError {
            expected,
            got,
            context: Some(context.into()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(msg) => write!(f, "ParseError: {msg}"),
            Error::UnboundVariable(var) => write!(f, "Unbound variable: {var}"),
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::ArityError {
                expected,
                got,
                context,
            } => match context {
                Some(ctx) => write!(
                    f,
                    "ArityError: {ctx}: expected {expected} arguments, got {got}"
                ),
                None => write!(f, "ArityError: expected {expected} arguments, got {got}"),
            },
            Error::KeyNotFound(msg) => write!(f, "Key not found: {msg}"),
            Error::BadPrimitive(name) => write!(f, "Bad primitive op: {name}"),
            Error::NotApplicable(rendered) => write!(f, "Bad procedure: {rendered}"),
            Error::EmptySequence => write!(f, "Empty sequence"),
            Error::LoweringError(msg) => write!(f, "Lowering error: {msg}"),
            Error::StackOverflow(max) => {
                write!(f, "Evaluation depth limit exceeded (max: {max})")
            }
        }
    }
}

pub mod ast;
pub mod evaluator;
pub mod lower;
pub mod primitives;
pub mod reader;
