use std::fmt;
use std::hash::Hash;

use crate::utils::error::ReportableError;
use crate::utils::metadata::{Location, Span};

/// A lexing or parsing error, over characters or tokens.
#[derive(Debug)]
pub struct ParseError<T>
where
    T: Hash + Eq + fmt::Debug + fmt::Display,
{
    pub error: chumsky::error::Simple<T>,
    pub path: String,
}

impl<T> ParseError<T>
where
    T: Hash + Eq + fmt::Debug + fmt::Display,
{
    pub fn new(error: chumsky::error::Simple<T>, path: &str) -> Self {
        Self {
            error,
            path: path.to_string(),
        }
    }
}

impl<T> fmt::Display for ParseError<T>
where
    T: Hash + Eq + fmt::Debug + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use chumsky::error::SimpleReason;
        match self.error.reason() {
            SimpleReason::Custom(msg) => write!(f, "{msg}"),
            SimpleReason::Unexpected | SimpleReason::Unclosed { .. } => {
                match self.error.found() {
                    Some(found) => write!(f, "unexpected '{found}'")?,
                    None => write!(f, "unexpected end of input")?,
                }
                if let Some(label) = self.error.label() {
                    write!(f, " while parsing {label}")?;
                }
                let expected = self
                    .error
                    .expected()
                    .map(|e| match e {
                        Some(e) => format!("'{e}'"),
                        None => "end of input".to_string(),
                    })
                    .collect::<Vec<_>>();
                if !expected.is_empty() {
                    write!(f, ", expected {}", expected.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

impl<T> std::error::Error for ParseError<T> where T: Hash + Eq + fmt::Debug + fmt::Display {}

impl<T> ReportableError for ParseError<T>
where
    T: Hash + Eq + fmt::Debug + fmt::Display,
{
    fn get_labels(&self) -> Vec<(Location, String)> {
        let label = match self.error.found() {
            Some(found) => format!("unexpected '{found}'"),
            None => "here".to_string(),
        };
        vec![(Location::new(self.error.span(), &self.path), label)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LowerErrorKind {
    UnknownKind(String),
    UnnamedItem,
    DuplicateItem(String),
    UnknownItem(String),
    UnknownField { kind: &'static str, field: String },
    DuplicateField(String),
    TypeMismatch { expected: &'static str, found: &'static str },
    OutOfRange { value: i64, ty: &'static str },
    InvalidReal(String),
    UnknownFunction(String),
    Arity { function: &'static str, expected: usize },
    InvalidHex,
    NilKey,
    /// A prototype referenced where a value is expected.
    NotAValue(String),
    NotA { name: String, expected: &'static str },
}

/// An error while turning parsed items into an object graph.
#[derive(Debug, Clone, PartialEq)]
pub struct LowerError {
    pub kind: LowerErrorKind,
    pub span: Span,
    pub path: String,
}

impl fmt::Display for LowerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use LowerErrorKind::*;
        match &self.kind {
            UnknownKind(k) => write!(
                f,
                "unknown item kind '{k}', expected proto, closure, class, module or builtins"
            ),
            UnnamedItem => write!(f, "item has neither a name nor a 'name' field"),
            DuplicateItem(n) => write!(f, "item '{n}' is defined twice"),
            UnknownItem(n) => write!(f, "no item named '{n}'"),
            UnknownField { kind, field } => write!(f, "{kind} has no field '{field}'"),
            DuplicateField(n) => write!(f, "field '{n}' is given twice"),
            TypeMismatch { expected, found } => write!(f, "expected {expected}, found {found}"),
            OutOfRange { value, ty } => write!(f, "{value} does not fit in {ty}"),
            InvalidReal(s) => write!(f, "invalid real literal '{s}'"),
            UnknownFunction(n) => write!(f, "unknown constructor '{n}'"),
            Arity { function, expected } => {
                write!(f, "{function}() takes {expected} argument(s)")
            }
            InvalidHex => write!(f, "bytes() expects an even number of hex digits"),
            NilKey => write!(f, "nil cannot be used as a map key"),
            NotAValue(n) => write!(f, "prototype '{n}' is not a value, wrap it in a closure"),
            NotA { name, expected } => write!(f, "'{name}' is not a {expected}"),
        }
    }
}

impl std::error::Error for LowerError {}

impl ReportableError for LowerError {
    fn get_labels(&self) -> Vec<(Location, String)> {
        vec![(Location::new(self.span.clone(), &self.path), self.to_string())]
    }
}

/// Failure to pick the value to solidify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootError {
    UnknownItem(String),
    NoRoot,
}

impl fmt::Display for RootError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RootError::UnknownItem(n) => write!(f, "no item named '{n}' to solidify"),
            RootError::NoRoot => write!(f, "snapshot has no closure, class or module to solidify"),
        }
    }
}

impl std::error::Error for RootError {}

impl ReportableError for RootError {
    fn get_labels(&self) -> Vec<(Location, String)> {
        vec![]
    }
}
