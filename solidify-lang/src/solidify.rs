//! Solidification: writing a live closure, class or module as C source made
//! of the host's constant-object macros (`be_local_closure`,
//! `be_nested_proto`, `be_local_class`, ...), so that the interpreter can
//! load it from read-only memory without compiling at startup.
//!
//! Output is written incrementally and in pre-order: anything a declaration
//! refers to by name is declared before it. A failing run leaves whatever was
//! already written in the sink; that output must be discarded.
use std::{fmt, io::Write};

use crate::runtime::{ClassKey, Data, ObjectGraph, Value};
use crate::utils::{error::ReportableError, metadata::Location};

mod class;
mod function;
pub mod ident;
mod module;
mod value;

pub use ident::{decode_identifier, identifier_len, to_identifier};

/// Settings shared by a whole [`dump`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpOptions {
    /// Emit strings as weak references (`be_nested_str_weak`,
    /// `be_const_key_weak`, `be_str_weak`) that link against strings the
    /// host already interned instead of defining them.
    pub weak: bool,
    /// Explicit symbol prefix for a closure root.
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    UnsupportedType,
    ResourceExhaustion,
    InvalidRoot,
    Sink,
}

#[derive(Debug)]
pub enum ErrorKind {
    /// A constant or member of a type that has no constant form.
    UnsupportedValue(&'static str),
    UnsupportedKey(&'static str),
    UnsupportedInstance(String),
    /// An instance that is part of an inheritance chain.
    InstanceLinkage,
    UnsupportedGlobal {
        global: u32,
        function: String,
    },
    UnsupportedRoot(&'static str),
    /// A map reachable from itself.
    CyclicMap,
    BufferExhausted(usize),
    Io(std::io::Error),
}

#[derive(Debug)]
pub struct Error(pub ErrorKind);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }
    pub fn category(&self) -> Category {
        match &self.0 {
            ErrorKind::UnsupportedValue(_)
            | ErrorKind::UnsupportedKey(_)
            | ErrorKind::UnsupportedInstance(_)
            | ErrorKind::InstanceLinkage
            | ErrorKind::UnsupportedGlobal { .. }
            | ErrorKind::CyclicMap => Category::UnsupportedType,
            ErrorKind::BufferExhausted(_) => Category::ResourceExhaustion,
            ErrorKind::UnsupportedRoot(_) => Category::InvalidRoot,
            ErrorKind::Io(_) => Category::Sink,
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self(kind)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self(ErrorKind::Io(e))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ErrorKind::UnsupportedValue(t) => {
                write!(f, "internal_error: Unsupported type in function constants: {t}")
            }
            ErrorKind::UnsupportedKey(t) => {
                write!(f, "internal_error: Unsupported type in key: {t}")
            }
            ErrorKind::UnsupportedInstance(c) => {
                write!(f, "internal_error: unsupported class '{c}'")
            }
            ErrorKind::InstanceLinkage => {
                write!(f, "internal_error: instance must not have a super/sub class")
            }
            ErrorKind::UnsupportedGlobal { global, function } => write!(
                f,
                "internal_error: Unsupported access to non-builtin global G{global} in '{function}'"
            ),
            ErrorKind::UnsupportedRoot(t) => write!(f, "value_error: unsupported type '{t}'"),
            ErrorKind::CyclicMap => write!(f, "internal_error: map contains itself"),
            ErrorKind::BufferExhausted(n) => {
                write!(f, "memory_error: could not allocate buffer of {n} bytes")
            }
            ErrorKind::Io(e) => write!(f, "io_error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.0 {
            ErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl ReportableError for Error {
    fn get_labels(&self) -> Vec<(Location, String)> {
        vec![]
    }
}

/// Writes formatted text to the solidifier's sink.
macro_rules! emit {
    ($self:ident, $($arg:tt)*) => {
        $self.out.write_fmt(format_args!($($arg)*))?
    };
}
pub(crate) use emit;

/// Walks an [`ObjectGraph`] and writes solidified text to `out`.
pub struct Solidifier<'a, W: Write> {
    graph: &'a ObjectGraph,
    weak: bool,
    out: W,
    // classes whose declaration is being written, outermost first
    classes_in_progress: Vec<ClassKey>,
}

impl<'a, W: Write> Solidifier<'a, W> {
    pub fn new(graph: &'a ObjectGraph, weak: bool, out: W) -> Self {
        Self {
            graph,
            weak,
            out,
            classes_in_progress: vec![],
        }
    }

    /// Unformatted write, for fragments of unbounded length.
    fn emit_str(&mut self, s: &str) -> Result<(), Error> {
        self.out.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Solidifies `root`, which must be a closure, a class or a module.
    pub fn solidify(&mut self, root: &Value, prefix: Option<&str>) -> Result<(), Error> {
        match root.data {
            Data::Closure(c) => self.closure(c, prefix),
            Data::Class(c) => self.class(c),
            Data::Module(m) => self.module(m),
            _ => Err(ErrorKind::UnsupportedRoot(root.type_name()).into()),
        }?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Solidifies `root` into `sink`, or into stdout when no sink is given.
pub fn dump(
    graph: &ObjectGraph,
    root: &Value,
    options: &DumpOptions,
    sink: Option<&mut dyn Write>,
) -> Result<(), Error> {
    let prefix = options.prefix.as_deref();
    match sink {
        Some(out) => Solidifier::new(graph, options.weak, out).solidify(root, prefix),
        None => {
            let stdout = std::io::stdout();
            Solidifier::new(graph, options.weak, stdout.lock()).solidify(root, prefix)
        }
    }
}

/// Solidifies `root` into a string.
pub fn dump_to_string(
    graph: &ObjectGraph,
    root: &Value,
    options: &DumpOptions,
) -> Result<String, Error> {
    let mut buf = Vec::new();
    dump(graph, root, options, Some(&mut buf))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Encodes a single value as its constant expression.
pub fn value_to_string(
    graph: &ObjectGraph,
    value: &Value,
    weak: bool,
    prefix: Option<&str>,
    key: Option<&str>,
) -> Result<String, Error> {
    let mut s = Solidifier::new(graph, weak, Vec::new());
    s.value(value, prefix, key)?;
    Ok(String::from_utf8_lossy(&s.into_inner()).into_owned())
}
