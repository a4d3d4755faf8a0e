use std::fmt;

use crate::interner::{Symbol, ToSymbol};

use super::{ClassKey, ClosureKey, InstanceKey, ListKey, MapKey, ModuleKey};

/// Integer width of the host build.
#[cfg(not(feature = "int32"))]
pub type Int = i64;
#[cfg(feature = "int32")]
pub type Int = i32;

/// Real width of the host build.
#[cfg(not(feature = "single-float"))]
pub type Real = f64;
#[cfg(feature = "single-float")]
pub type Real = f32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Data {
    Nil,
    Bool(bool),
    Int(Int),
    /// Slot index of an instance variable (`BE_INDEX`).
    Index(Int),
    Real(Real),
    Str(Symbol),
    Closure(ClosureKey),
    NativeFunction(Symbol),
    NativeClosure(Symbol),
    NativePointer(Symbol),
    Class(ClassKey),
    Module(ModuleKey),
    Instance(InstanceKey),
    Map(MapKey),
    List(ListKey),
}

impl Data {
    /// Type name as the host reports it, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Data::Nil => "nil",
            Data::Bool(_) => "bool",
            Data::Int(_) => "int",
            Data::Index(_) => "var",
            Data::Real(_) => "real",
            Data::Str(_) => "string",
            Data::Closure(_) => "closure",
            Data::NativeFunction(_) => "ntvfunc",
            Data::NativeClosure(_) => "ntvclos",
            Data::NativePointer(_) => "comptr",
            Data::Class(_) => "class",
            Data::Module(_) => "module",
            Data::Instance(_) => "instance",
            Data::Map(_) => "map",
            Data::List(_) => "list",
        }
    }
}

/// A runtime value together with the orthogonal `static` flag that class
/// members carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Value {
    pub data: Data,
    pub is_static: bool,
}

impl Default for Value {
    fn default() -> Self {
        Self::nil()
    }
}

impl From<Data> for Value {
    fn from(data: Data) -> Self {
        Self {
            data,
            is_static: false,
        }
    }
}

impl Value {
    pub fn nil() -> Self {
        Data::Nil.into()
    }
    pub fn bool(b: bool) -> Self {
        Data::Bool(b).into()
    }
    pub fn int(i: Int) -> Self {
        Data::Int(i).into()
    }
    pub fn index(i: Int) -> Self {
        Data::Index(i).into()
    }
    pub fn real(r: Real) -> Self {
        Data::Real(r).into()
    }
    pub fn str<S: AsRef<str>>(s: S) -> Self {
        Data::Str(s.to_symbol()).into()
    }
    pub fn closure(c: ClosureKey) -> Self {
        Data::Closure(c).into()
    }
    pub fn class(c: ClassKey) -> Self {
        Data::Class(c).into()
    }
    pub fn module(m: ModuleKey) -> Self {
        Data::Module(m).into()
    }
    pub fn instance(i: InstanceKey) -> Self {
        Data::Instance(i).into()
    }
    pub fn map(m: MapKey) -> Self {
        Data::Map(m).into()
    }
    pub fn list(l: ListKey) -> Self {
        Data::List(l).into()
    }
    pub fn native_function<S: AsRef<str>>(name: S) -> Self {
        Data::NativeFunction(name.to_symbol()).into()
    }
    pub fn native_pointer<S: AsRef<str>>(name: S) -> Self {
        Data::NativePointer(name.to_symbol()).into()
    }

    pub fn with_static(self) -> Self {
        Self {
            is_static: true,
            ..self
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.data, Data::Nil)
    }
    pub fn type_name(&self) -> &'static str {
        self.data.type_name()
    }
    pub fn as_str(&self) -> Option<Symbol> {
        match self.data {
            Data::Str(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_closure(&self) -> Option<ClosureKey> {
        match self.data {
            Data::Closure(c) => Some(c),
            _ => None,
        }
    }
    pub fn as_class(&self) -> Option<ClassKey> {
        match self.data {
            Data::Class(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static {
            write!(f, "static ")?;
        }
        match self.data {
            Data::Nil => write!(f, "nil"),
            Data::Bool(b) => write!(f, "{b}"),
            Data::Int(i) => write!(f, "{i}"),
            Data::Index(i) => write!(f, "var({i})"),
            Data::Real(r) => write!(f, "{r:?}"),
            Data::Str(s) => write!(f, "{:?}", s.to_string()),
            Data::NativeFunction(s) => write!(f, "<function: {s}>"),
            Data::NativeClosure(s) => write!(f, "<ntvclos: {s}>"),
            Data::NativePointer(s) => write!(f, "<ptr: {s}>"),
            _ => write!(f, "<{}>", self.type_name()),
        }
    }
}
