//! Textual snapshots of an interpreter heap.
//!
//! A snapshot describes prototypes, closures, classes and modules as items
//! that refer to each other by name, so a graph can be solidified without a
//! live VM:
//!
//! ```text
//! class Animal {
//!     nvar: 1,
//!     members: { name: var(0), speak: speak },
//! }
//! closure speak {
//!     class: Animal, argc: 1, varg: 2, nstack: 2,
//!     consts: ["hello"],
//!     code: [0x1C080000, 0x80040200],
//! }
//! ```
use crate::interner::Symbol;
use crate::runtime::{ObjectGraph, Value};
use crate::utils::error::ReportableError;

pub mod ast;
mod error;
mod lexer;
mod lower;
mod parser;
mod token;

pub use error::{LowerError, LowerErrorKind, ParseError, RootError};
pub use parser::parse;

#[derive(Debug)]
pub struct Snapshot {
    graph: ObjectGraph,
    /// Items that can be solidified, in source order.
    items: Vec<(Symbol, Value)>,
}

impl Snapshot {
    /// Parses and lowers `src`. `path` names the source in reported errors.
    pub fn parse(src: &str, path: &str) -> Result<Self, Vec<Box<dyn ReportableError>>> {
        let items = parser::parse(src, path)?;
        let mut lowerer = lower::Lowerer::new(path);
        let errs = lowerer.lower(&items);
        if !errs.is_empty() {
            return Err(errs
                .into_iter()
                .map(|e| Box::new(e) as Box<dyn ReportableError>)
                .collect());
        }
        let items = lowerer
            .order
            .iter()
            .filter_map(|(name, decl)| decl.value().map(|v| (*name, v)))
            .collect::<Vec<_>>();
        log::debug!("loaded snapshot '{path}' with {} item(s)", items.len());
        Ok(Self {
            graph: lowerer.graph,
            items,
        })
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ObjectGraph {
        &mut self.graph
    }

    pub fn items(&self) -> impl Iterator<Item = &(Symbol, Value)> {
        self.items.iter()
    }

    pub fn item(&self, name: &str) -> Option<Value> {
        self.items
            .iter()
            .find(|(n, _)| n.with_str(|n| n == name))
            .map(|(_, v)| *v)
    }

    /// The value named `name`, or the last closure, class or module item.
    pub fn root(&self, name: Option<&str>) -> Result<Value, RootError> {
        match name {
            Some(name) => self
                .item(name)
                .ok_or_else(|| RootError::UnknownItem(name.to_string())),
            None => self.items.last().map(|(_, v)| *v).ok_or(RootError::NoRoot),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_root_is_the_last_item() {
        let snap = Snapshot::parse(
            "proto p {} closure f { proto: p } class A {} builtins { names: [] }",
            "t.snap",
        )
        .unwrap();
        assert_eq!(snap.items().count(), 2);
        assert_eq!(snap.root(None).unwrap().type_name(), "class");
        assert_eq!(snap.root(Some("f")).unwrap().type_name(), "closure");
        assert_eq!(
            snap.root(Some("p")),
            Err(RootError::UnknownItem("p".into()))
        );
    }

    #[test]
    fn empty_snapshot_has_no_root() {
        let snap = Snapshot::parse("", "t.snap").unwrap();
        assert_eq!(snap.root(None), Err(RootError::NoRoot));
    }

    #[test]
    fn lowering_errors_carry_spans() {
        let errs = Snapshot::parse("class A { super: B }", "t.snap").unwrap_err();
        assert_eq!(errs.len(), 1);
        let labels = errs[0].get_labels();
        assert_eq!(labels[0].0.span, 17..18);
        assert_eq!(errs[0].get_message(), "no item named 'B'");
    }
}
