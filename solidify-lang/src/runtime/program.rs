use std::fmt;

use itertools::Itertools;

use super::{ClassKey, InstanceKey, MapKey, ProtoKey, Value};
use crate::interner::{Symbol, ToSymbol};
pub use super::bytecode::Instruction;

/// Flags of [`Prototype::varg`].
pub mod varg {
    pub const VARARG: u8 = 1 << 0;
    pub const METHOD: u8 = 1 << 1;
    pub const STATIC_METHOD: u8 = 1 << 2;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpvalDesc {
    /// Captured from a register of the enclosing frame rather than from one
    /// of its upvalues.
    pub instack: bool,
    pub idx: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: Symbol,
    pub source: Symbol,
    pub nstack: u8,
    pub argc: u8,
    pub varg: u8,
    pub upvals: Vec<UpvalDesc>,
    pub protos: Vec<ProtoKey>,
    /// Class the function was compiled in, if it is a method.
    pub class: Option<ClassKey>,
    pub consts: Vec<Value>,
    pub code: Vec<Instruction>,
}

impl Default for Prototype {
    fn default() -> Self {
        Self::new("")
    }
}

impl Prototype {
    pub fn new<S: AsRef<str>>(name: S) -> Self {
        Self {
            name: name.to_symbol(),
            source: "".to_symbol(),
            nstack: 0,
            argc: 0,
            varg: 0,
            upvals: vec![],
            protos: vec![],
            class: None,
            consts: vec![],
            code: vec![],
        }
    }
    pub fn is_static_method(&self) -> bool {
        self.varg & varg::STATIC_METHOD != 0
    }
}

/// A prototype instantiated with its captured upvalues.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Closure {
    pub proto: ProtoKey,
    pub upvals: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: Symbol,
    pub nvar: u32,
    pub super_class: Option<ClassKey>,
    pub members: Option<MapKey>,
}

impl Default for Class {
    fn default() -> Self {
        Self {
            name: "".to_symbol(),
            nvar: 0,
            super_class: None,
            members: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub name: Option<Symbol>,
    pub table: Option<MapKey>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstanceClass {
    Bytes,
    Map,
    List,
    User(ClassKey),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstanceData {
    Bytes(Vec<u8>),
    Members(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub class: InstanceClass,
    pub data: InstanceData,
    pub super_instance: Option<InstanceKey>,
    pub sub_instance: Option<InstanceKey>,
}

impl Instance {
    pub fn bytes(bytes: Vec<u8>) -> Self {
        Self {
            class: InstanceClass::Bytes,
            data: InstanceData::Bytes(bytes),
            super_instance: None,
            sub_instance: None,
        }
    }
    /// Built-in `map` instance wrapping `map`.
    pub fn wrap_map(map: MapKey) -> Self {
        Self {
            class: InstanceClass::Map,
            data: InstanceData::Members(vec![Value::map(map)]),
            super_instance: None,
            sub_instance: None,
        }
    }
    /// Built-in `list` instance wrapping `list`.
    pub fn wrap_list(list: super::ListKey) -> Self {
        Self {
            class: InstanceClass::List,
            data: InstanceData::Members(vec![Value::list(list)]),
            super_instance: None,
            sub_instance: None,
        }
    }
}

/// Built-in globals a solidified function may refer to by index.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinTable {
    names: Vec<Symbol>,
}

const DEFAULT_BUILTINS: &[&str] = &[
    "assert", "bool", "bytes", "call", "classname", "classof", "compile", "format",
    "global", "input", "int", "isinstance", "issubclass", "list", "map", "module", "number",
    "open", "print", "range", "real", "size", "str", "super", "type", "__iterator__",
    "__hasnext__", "__next__", "_class",
];

impl Default for BuiltinTable {
    fn default() -> Self {
        Self::new(DEFAULT_BUILTINS)
    }
}

impl BuiltinTable {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_symbol()).collect(),
        }
    }
    pub fn len(&self) -> usize {
        self.names.len()
    }
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
    pub fn contains_index(&self, idx: u32) -> bool {
        (idx as usize) < self.names.len()
    }
    pub fn position(&self, name: Symbol) -> Option<usize> {
        self.names.iter().position(|n| *n == name)
    }
    pub fn name(&self, idx: u32) -> Option<Symbol> {
        self.names.get(idx as usize).copied()
    }
}

impl fmt::Display for BuiltinTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names.iter().join(", "))
    }
}
