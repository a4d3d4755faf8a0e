//! In-memory model of the interpreter heap that gets solidified.
//!
//! Every object lives in a [`slotmap::SlotMap`] arena of an [`ObjectGraph`]
//! and refers to other objects by key, which keeps the class <-> method
//! cycles of the host free of owning pointers.
use std::{cell::RefCell, fmt};

use slotmap::SlotMap;

pub mod bytecode;
pub mod map;
pub mod program;
pub mod value;

pub use bytecode::{Instruction, Opcode};
pub use map::{MapError, MapNode, MapTable};
pub use program::{
    BuiltinTable, Class, Closure, Instance, InstanceClass, InstanceData, Module, Prototype,
    UpvalDesc,
};
pub use value::{Data, Int, Real, Value};

slotmap::new_key_type! {
    pub struct ProtoKey;
    pub struct ClosureKey;
    pub struct ClassKey;
    pub struct ModuleKey;
    pub struct InstanceKey;
    pub struct MapKey;
    pub struct ListKey;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListTable {
    pub items: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct ObjectGraph {
    pub protos: SlotMap<ProtoKey, Prototype>,
    pub closures: SlotMap<ClosureKey, Closure>,
    pub classes: SlotMap<ClassKey, Class>,
    pub modules: SlotMap<ModuleKey, Module>,
    pub instances: SlotMap<InstanceKey, Instance>,
    // maps are compacted while the rest of the graph is only read
    pub maps: SlotMap<MapKey, RefCell<MapTable>>,
    pub lists: SlotMap<ListKey, ListTable>,
    pub builtins: BuiltinTable,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_proto(&mut self, proto: Prototype) -> ProtoKey {
        self.protos.insert(proto)
    }
    pub fn add_closure(&mut self, proto: ProtoKey) -> ClosureKey {
        self.closures.insert(Closure {
            proto,
            upvals: vec![],
        })
    }
    pub fn add_class(&mut self, class: Class) -> ClassKey {
        self.classes.insert(class)
    }
    pub fn add_module(&mut self, module: Module) -> ModuleKey {
        self.modules.insert(module)
    }
    pub fn add_instance(&mut self, instance: Instance) -> InstanceKey {
        self.instances.insert(instance)
    }
    pub fn add_map(&mut self, map: MapTable) -> MapKey {
        self.maps.insert(RefCell::new(map))
    }
    pub fn add_list(&mut self, items: Vec<Value>) -> ListKey {
        self.lists.insert(ListTable { items })
    }

    /// Builds a map from `entries`, inserted in order.
    pub fn new_map<I>(&mut self, entries: I) -> Result<MapKey, MapError>
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        let mut map = MapTable::new();
        for (k, v) in entries {
            map.insert(k, v)?;
        }
        Ok(self.add_map(map))
    }

    pub fn map_insert(&self, map: MapKey, key: Value, value: Value) -> Result<Option<Value>, MapError> {
        self.maps[map].borrow_mut().insert(key, value)
    }

    /// Prototype behind a closure.
    pub fn closure_proto(&self, closure: ClosureKey) -> &Prototype {
        &self.protos[self.closures[closure].proto]
    }

    /// Closures a root value defines: the value itself, or the closure
    /// members of a class or module in slot order.
    pub fn root_closures(&self, root: &Value) -> Vec<ClosureKey> {
        let table = match root.data {
            Data::Closure(c) => return vec![c],
            Data::Class(c) => self.classes[c].members,
            Data::Module(m) => self.modules[m].table,
            _ => None,
        };
        table.map_or_else(Vec::new, |t| {
            self.maps[t]
                .borrow()
                .iter()
                .filter_map(|n| match n.value.data {
                    Data::Closure(c) => Some(c),
                    _ => None,
                })
                .collect()
        })
    }

    /// Listing of every prototype reachable from `closure`, depth first.
    pub fn listing(&self, closure: ClosureKey) -> ProtoListing<'_> {
        ProtoListing {
            graph: self,
            proto: self.closures[closure].proto,
        }
    }
}

pub struct ProtoListing<'a> {
    graph: &'a ObjectGraph,
    proto: ProtoKey,
}

impl ProtoListing<'_> {
    fn write_proto(&self, f: &mut fmt::Formatter<'_>, key: ProtoKey, depth: usize) -> fmt::Result {
        let p = &self.graph.protos[key];
        let pad = "  ".repeat(depth);
        writeln!(f, "{pad}function {} (source: {})", p.name, p.source)?;
        writeln!(
            f,
            "{pad}nstack: {} argc: {} varg: {}",
            p.nstack, p.argc, p.varg
        )?;
        if let Some(cls) = p.class {
            writeln!(f, "{pad}class: {}", self.graph.classes[cls].name)?;
        }
        if !p.upvals.is_empty() {
            let upv = p
                .upvals
                .iter()
                .map(|u| format!("({},{})", u.instack as u8, u.idx))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(f, "{pad}upvals: {upv}")?;
        }
        for (i, k) in p.consts.iter().enumerate() {
            writeln!(f, "{pad}K{i:<3} {k}")?;
        }
        for (pc, ins) in p.code.iter().enumerate() {
            writeln!(f, "{pad}{}", ins.disasm(pc))?;
        }
        for sub in p.protos.iter() {
            self.write_proto(f, *sub, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ProtoListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_proto(f, self.proto, 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::interner::ToSymbol;

    #[test]
    fn listing_walks_subprotos() {
        let mut g = ObjectGraph::new();
        let mut inner = Prototype::new("inner");
        inner.code = vec![Instruction(0x80000000)];
        let inner = g.add_proto(inner);
        let mut outer = Prototype::new("outer");
        outer.consts = vec![Value::int(1), Value::str("x")];
        outer.protos = vec![inner];
        let outer = g.add_proto(outer);
        let clo = g.add_closure(outer);
        let text = g.listing(clo).to_string();
        assert!(text.starts_with("function outer"));
        assert!(text.contains("K0   1\n"));
        assert!(text.contains("K1   \"x\"\n"));
        assert!(text.contains("  function inner"));
        assert!(text.contains("    0000  RET\t0"));
    }

    #[test]
    fn root_closures_of_a_class() {
        let mut g = ObjectGraph::new();
        let p = g.add_proto(Prototype::new("m"));
        let clo = g.add_closure(p);
        let members = g
            .new_map([
                (Value::str("m"), Value::closure(clo)),
                (Value::str("x"), Value::index(0)),
            ])
            .unwrap();
        let cls = g.add_class(Class {
            name: "A".to_symbol(),
            members: Some(members),
            ..Default::default()
        });
        assert_eq!(g.root_closures(&Value::class(cls)), vec![clo]);
        assert_eq!(g.root_closures(&Value::closure(clo)), vec![clo]);
        assert!(g.root_closures(&Value::int(3)).is_empty());
    }
}
