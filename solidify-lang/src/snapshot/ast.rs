use crate::interner::Symbol;
use crate::utils::metadata::{Span, WithMeta};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil,
    Bool(bool),
    Int(i64),
    Real(String),
    Str(String),
    /// A bare identifier: a reference to another item, or a string key in
    /// key position of a map.
    Ref(Symbol),
    Call(WithMeta<Symbol>, Vec<WithMeta<Expr>>),
    List(Vec<WithMeta<Expr>>),
    Map(Vec<(WithMeta<Expr>, WithMeta<Expr>)>),
}

impl Expr {
    /// Short description used in type errors.
    pub fn describe(&self) -> &'static str {
        match self {
            Expr::Nil => "nil",
            Expr::Bool(_) => "bool",
            Expr::Int(_) => "integer",
            Expr::Real(_) => "real",
            Expr::Str(_) => "string",
            Expr::Ref(_) => "reference",
            Expr::Call(..) => "call",
            Expr::List(_) => "list",
            Expr::Map(_) => "map",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: WithMeta<Symbol>,
    pub value: WithMeta<Expr>,
}

/// `kind [name] { field: expr, ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub kind: WithMeta<Symbol>,
    pub name: Option<WithMeta<Symbol>>,
    pub fields: Vec<Field>,
    pub span: Span,
}
