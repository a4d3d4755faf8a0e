//! Lowering of parsed items into an [`ObjectGraph`].
//!
//! Items may refer to each other in any order, so every item is first
//! declared (allocating its arena slot) and only then defined.
use std::collections::{HashMap, HashSet};

use super::ast::{Expr, Field, Item};
use super::error::{LowerError, LowerErrorKind};
use crate::interner::{Symbol, ToSymbol};
use crate::runtime::{
    BuiltinTable, Class, ClassKey, ClosureKey, Data, Instance, InstanceClass, InstanceData,
    MapError, MapTable, Module, ModuleKey, ObjectGraph, ProtoKey, Prototype, UpvalDesc, Value,
};
use crate::utils::metadata::{Span, WithMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Proto,
    Closure,
    Class,
    Module,
    Builtins,
}

impl Kind {
    fn name(&self) -> &'static str {
        match self {
            Kind::Proto => "proto",
            Kind::Closure => "closure",
            Kind::Class => "class",
            Kind::Module => "module",
            Kind::Builtins => "builtins",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Decl {
    Proto(ProtoKey),
    Closure(ClosureKey),
    Class(ClassKey),
    Module(ModuleKey),
    Builtins,
}

impl Decl {
    /// The item as a value that can be solidified or stored in a constant.
    pub(super) fn value(&self) -> Option<Value> {
        match *self {
            Decl::Closure(c) => Some(Value::closure(c)),
            Decl::Class(c) => Some(Value::class(c)),
            Decl::Module(m) => Some(Value::module(m)),
            Decl::Proto(_) | Decl::Builtins => None,
        }
    }
}

pub(super) struct Lowerer<'a> {
    path: &'a str,
    pub(super) graph: ObjectGraph,
    decls: HashMap<Symbol, Decl>,
    /// Declared items in source order.
    pub(super) order: Vec<(Symbol, Decl)>,
}

fn field_name(f: &Field) -> String {
    f.name.0.to_string()
}

impl<'a> Lowerer<'a> {
    pub(super) fn new(path: &'a str) -> Self {
        Self {
            path,
            graph: ObjectGraph::new(),
            decls: HashMap::new(),
            order: vec![],
        }
    }

    fn err(&self, kind: LowerErrorKind, span: &Span) -> LowerError {
        LowerError {
            kind,
            span: span.clone(),
            path: self.path.to_string(),
        }
    }

    fn mismatch(&self, expected: &'static str, e: &WithMeta<Expr>) -> LowerError {
        self.err(
            LowerErrorKind::TypeMismatch {
                expected,
                found: e.0.describe(),
            },
            &e.1,
        )
    }

    fn kind(&self, item: &Item) -> Result<Kind, LowerError> {
        let kind = item.kind.0.to_string();
        match kind.as_str() {
            "proto" => Ok(Kind::Proto),
            "closure" => Ok(Kind::Closure),
            "class" => Ok(Kind::Class),
            "module" => Ok(Kind::Module),
            "builtins" => Ok(Kind::Builtins),
            _ => Err(self.err(LowerErrorKind::UnknownKind(kind), &item.kind.1)),
        }
    }

    fn field<'i>(item: &'i Item, name: &str) -> Option<&'i Field> {
        item.fields.iter().find(|f| f.name.0.with_str(|n| n == name))
    }

    /// Runs both passes, collecting every error.
    pub(super) fn lower(&mut self, items: &[Item]) -> Vec<LowerError> {
        let mut errs = vec![];
        let mut declared = vec![];
        for item in items {
            match self.declare(item) {
                Ok(decl) => declared.push((item, decl)),
                Err(e) => errs.push(e),
            }
        }
        if !errs.is_empty() {
            return errs;
        }
        for (item, decl) in declared {
            if let Err(e) = self.define(item, decl) {
                errs.push(e);
            }
        }
        errs
    }

    fn declare(&mut self, item: &Item) -> Result<Decl, LowerError> {
        let kind = self.kind(item)?;
        if kind == Kind::Builtins {
            return Ok(Decl::Builtins);
        }
        let name_field = Self::field(item, "name")
            .map(|f| self.string(&f.value))
            .transpose()?;
        let (id, span) = match (&item.name, name_field) {
            (Some(n), _) => (n.0, n.1.clone()),
            (None, Some(n)) => (n, item.span.clone()),
            (None, None) => return Err(self.err(LowerErrorKind::UnnamedItem, &item.span)),
        };
        let display = name_field.unwrap_or(id);
        if self.decls.contains_key(&id) {
            return Err(self.err(LowerErrorKind::DuplicateItem(id.to_string()), &span));
        }
        let decl = match kind {
            Kind::Proto => Decl::Proto(self.graph.add_proto(Prototype::new(display.to_string()))),
            Kind::Closure => {
                let proto = if Self::field(item, "proto").is_some() {
                    // set when the item is defined
                    ProtoKey::default()
                } else {
                    self.graph.add_proto(Prototype::new(display.to_string()))
                };
                Decl::Closure(self.graph.add_closure(proto))
            }
            Kind::Class => Decl::Class(self.graph.add_class(Class {
                name: display,
                ..Default::default()
            })),
            Kind::Module => Decl::Module(self.graph.add_module(Module {
                name: Some(display),
                table: None,
            })),
            Kind::Builtins => Decl::Builtins,
        };
        log::trace!("declared {} '{id}'", kind.name());
        self.decls.insert(id, decl);
        self.order.push((id, decl));
        Ok(decl)
    }

    fn define(&mut self, item: &Item, decl: Decl) -> Result<(), LowerError> {
        let kind = self.kind(item)?;
        let mut seen = HashSet::new();
        for f in item.fields.iter() {
            if !seen.insert(f.name.0) {
                return Err(self.err(LowerErrorKind::DuplicateField(field_name(f)), &f.name.1));
            }
        }
        let explicit_proto = Self::field(item, "proto").is_some();
        for f in item.fields.iter() {
            let known = match decl {
                Decl::Proto(p) => self.proto_field(p, f)?,
                Decl::Closure(c) => {
                    self.closure_field(c, f)?
                        || (!explicit_proto && {
                            let p = self.graph.closures[c].proto;
                            self.proto_field(p, f)?
                        })
                }
                Decl::Class(c) => self.class_field(c, f)?,
                Decl::Module(m) => self.module_field(m, f)?,
                Decl::Builtins => self.builtins_field(f)?,
            };
            if !known {
                return Err(self.err(
                    LowerErrorKind::UnknownField {
                        kind: kind.name(),
                        field: field_name(f),
                    },
                    &f.name.1,
                ));
            }
        }
        Ok(())
    }

    fn proto_field(&mut self, key: ProtoKey, f: &Field) -> Result<bool, LowerError> {
        let v = &f.value;
        match field_name(f).as_str() {
            "name" => self.graph.protos[key].name = self.string(v)?,
            "source" => self.graph.protos[key].source = self.string(v)?,
            "nstack" => self.graph.protos[key].nstack = self.small(v, "u8")?,
            "argc" => self.graph.protos[key].argc = self.small(v, "u8")?,
            "varg" => self.graph.protos[key].varg = self.small(v, "u8")?,
            "upvals" => {
                let upvals = self
                    .list(v)?
                    .iter()
                    .map(|u| self.upval_desc(u))
                    .collect::<Result<Vec<_>, _>>()?;
                self.graph.protos[key].upvals = upvals;
            }
            "protos" => {
                let protos = self
                    .list(v)?
                    .iter()
                    .map(|p| self.proto_ref(p))
                    .collect::<Result<Vec<_>, _>>()?;
                self.graph.protos[key].protos = protos;
            }
            "class" => self.graph.protos[key].class = self.class_ref(v)?,
            "consts" => {
                let consts = self.values(v)?;
                self.graph.protos[key].consts = consts;
            }
            "code" => {
                let code = self
                    .list(v)?
                    .iter()
                    .map(|w| self.small::<u32>(w, "u32").map(Into::into))
                    .collect::<Result<Vec<_>, _>>()?;
                self.graph.protos[key].code = code;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn closure_field(&mut self, key: ClosureKey, f: &Field) -> Result<bool, LowerError> {
        match field_name(f).as_str() {
            "proto" => self.graph.closures[key].proto = self.proto_ref(&f.value)?,
            "upvals" if Self::is_value_list(&f.value) => {
                let upvals = self.values(&f.value)?;
                self.graph.closures[key].upvals = upvals;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    // `upvals` of a closure are captured values, those of a prototype are
    // `[instack, idx]` pairs.
    fn is_value_list(e: &WithMeta<Expr>) -> bool {
        match &e.0 {
            Expr::List(l) => !l.iter().all(|u| matches!(u.0, Expr::List(_))) || l.is_empty(),
            _ => true,
        }
    }

    fn class_field(&mut self, key: ClassKey, f: &Field) -> Result<bool, LowerError> {
        let v = &f.value;
        match field_name(f).as_str() {
            "name" => self.graph.classes[key].name = self.string(v)?,
            "nvar" => self.graph.classes[key].nvar = self.small(v, "u32")?,
            "super" => self.graph.classes[key].super_class = self.class_ref(v)?,
            "members" => {
                let members = self.map_or_nil(v)?;
                self.graph.classes[key].members = members;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn module_field(&mut self, key: ModuleKey, f: &Field) -> Result<bool, LowerError> {
        let v = &f.value;
        match field_name(f).as_str() {
            "name" => self.graph.modules[key].name = Some(self.string(v)?),
            "members" => {
                let table = self.map_or_nil(v)?;
                self.graph.modules[key].table = table;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn builtins_field(&mut self, f: &Field) -> Result<bool, LowerError> {
        match field_name(f).as_str() {
            "names" => {
                let names = self
                    .list(&f.value)?
                    .iter()
                    .map(|n| self.name_arg(n).map(|s| s.to_string()))
                    .collect::<Result<Vec<_>, _>>()?;
                self.graph.builtins = BuiltinTable::new(&names);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn map_or_nil(&mut self, e: &WithMeta<Expr>) -> Result<Option<crate::runtime::MapKey>, LowerError> {
        match &e.0 {
            Expr::Nil => Ok(None),
            Expr::Map(_) => match self.value(e)?.data {
                Data::Map(m) => Ok(Some(m)),
                _ => Err(self.mismatch("map", e)),
            },
            _ => Err(self.mismatch("map", e)),
        }
    }

    fn upval_desc(&self, e: &WithMeta<Expr>) -> Result<UpvalDesc, LowerError> {
        let [instack, idx] = self.list(e)? else {
            return Err(self.mismatch("[instack, idx]", e));
        };
        let instack = match &instack.0 {
            Expr::Bool(b) => *b,
            Expr::Int(0) => false,
            Expr::Int(1) => true,
            _ => return Err(self.mismatch("bool", instack)),
        };
        Ok(UpvalDesc {
            instack,
            idx: self.small(idx, "u8")?,
        })
    }

    fn int(&self, e: &WithMeta<Expr>) -> Result<i64, LowerError> {
        match &e.0 {
            Expr::Int(i) => Ok(*i),
            _ => Err(self.mismatch("integer", e)),
        }
    }

    fn small<T: TryFrom<i64>>(&self, e: &WithMeta<Expr>, ty: &'static str) -> Result<T, LowerError> {
        let value = self.int(e)?;
        T::try_from(value).map_err(|_| self.err(LowerErrorKind::OutOfRange { value, ty }, &e.1))
    }

    fn string(&self, e: &WithMeta<Expr>) -> Result<Symbol, LowerError> {
        match &e.0 {
            Expr::Str(s) => Ok(s.to_symbol()),
            _ => Err(self.mismatch("string", e)),
        }
    }

    /// A native name, written either as an identifier or a string.
    fn name_arg(&self, e: &WithMeta<Expr>) -> Result<Symbol, LowerError> {
        match &e.0 {
            Expr::Str(s) => Ok(s.to_symbol()),
            Expr::Ref(s) => Ok(*s),
            _ => Err(self.mismatch("name", e)),
        }
    }

    fn list<'e>(&self, e: &'e WithMeta<Expr>) -> Result<&'e [WithMeta<Expr>], LowerError> {
        match &e.0 {
            Expr::List(l) => Ok(l),
            _ => Err(self.mismatch("list", e)),
        }
    }

    fn resolve(&self, e: &WithMeta<Expr>) -> Result<(Symbol, Decl), LowerError> {
        let Expr::Ref(name) = &e.0 else {
            return Err(self.mismatch("item name", e));
        };
        self.decls
            .get(name)
            .map(|d| (*name, *d))
            .ok_or_else(|| self.err(LowerErrorKind::UnknownItem(name.to_string()), &e.1))
    }

    fn proto_ref(&self, e: &WithMeta<Expr>) -> Result<ProtoKey, LowerError> {
        match self.resolve(e)? {
            (_, Decl::Proto(p)) => Ok(p),
            (name, _) => Err(self.err(
                LowerErrorKind::NotA {
                    name: name.to_string(),
                    expected: "proto",
                },
                &e.1,
            )),
        }
    }

    fn class_ref(&self, e: &WithMeta<Expr>) -> Result<Option<ClassKey>, LowerError> {
        if e.0 == Expr::Nil {
            return Ok(None);
        }
        match self.resolve(e)? {
            (_, Decl::Class(c)) => Ok(Some(c)),
            (name, _) => Err(self.err(
                LowerErrorKind::NotA {
                    name: name.to_string(),
                    expected: "class",
                },
                &e.1,
            )),
        }
    }

    fn values(&mut self, e: &WithMeta<Expr>) -> Result<Vec<Value>, LowerError> {
        let Expr::List(items) = &e.0 else {
            return Err(self.mismatch("list", e));
        };
        items.iter().map(|i| self.value(i)).collect()
    }

    fn single_arg<'e>(
        &self,
        function: &'static str,
        args: &'e [WithMeta<Expr>],
        span: &Span,
    ) -> Result<&'e WithMeta<Expr>, LowerError> {
        match args {
            [arg] => Ok(arg),
            _ => Err(self.err(
                LowerErrorKind::Arity {
                    function,
                    expected: 1,
                },
                span,
            )),
        }
    }

    fn value(&mut self, e: &WithMeta<Expr>) -> Result<Value, LowerError> {
        Ok(match &e.0 {
            Expr::Nil => Value::nil(),
            Expr::Bool(b) => Value::bool(*b),
            Expr::Int(_) => Value::int(self.small(e, "int")?),
            Expr::Real(s) => Value::real(
                s.parse()
                    .map_err(|_| self.err(LowerErrorKind::InvalidReal(s.clone()), &e.1))?,
            ),
            Expr::Str(s) => Value::str(s),
            Expr::Ref(name) => {
                let (_, decl) = self.resolve(e)?;
                decl.value()
                    .ok_or_else(|| self.err(LowerErrorKind::NotAValue(name.to_string()), &e.1))?
            }
            Expr::Call(f, args) => self.call(f, args, &e.1)?,
            Expr::List(_) => {
                let items = self.values(e)?;
                Value::list(self.graph.add_list(items))
            }
            Expr::Map(entries) => {
                let mut map = MapTable::new();
                for (k, v) in entries.iter() {
                    let key = self.map_key(k)?;
                    let value = self.value(v)?;
                    map.insert(key, value).map_err(|e| match e {
                        MapError::NilKey => self.err(LowerErrorKind::NilKey, &k.1),
                    })?;
                }
                Value::map(self.graph.add_map(map))
            }
        })
    }

    fn map_key(&mut self, e: &WithMeta<Expr>) -> Result<Value, LowerError> {
        match &e.0 {
            Expr::Ref(name) => Ok(Data::Str(*name).into()),
            Expr::Nil => Err(self.err(LowerErrorKind::NilKey, &e.1)),
            _ => self.value(e),
        }
    }

    fn call(
        &mut self,
        f: &WithMeta<Symbol>,
        args: &[WithMeta<Expr>],
        span: &Span,
    ) -> Result<Value, LowerError> {
        let name = f.0.to_string();
        let value = match name.as_str() {
            "var" => Value::index(self.small(self.single_arg("var", args, span)?, "int")?),
            "static" => self.value(self.single_arg("static", args, span)?)?.with_static(),
            "native" => Value::native_function(
                self.name_arg(self.single_arg("native", args, span)?)?.to_string(),
            ),
            "ntvclos" => Data::NativeClosure(self.name_arg(self.single_arg("ntvclos", args, span)?)?).into(),
            "ptr" => Value::native_pointer(
                self.name_arg(self.single_arg("ptr", args, span)?)?.to_string(),
            ),
            "bytes" => {
                let arg = self.single_arg("bytes", args, span)?;
                let hex = self.string(arg)?.to_string();
                let bytes = decode_hex(&hex)
                    .ok_or_else(|| self.err(LowerErrorKind::InvalidHex, &arg.1))?;
                Value::instance(self.graph.add_instance(Instance::bytes(bytes)))
            }
            "map_instance" => {
                let arg = self.single_arg("map_instance", args, span)?;
                let Data::Map(m) = self.value(arg)?.data else {
                    return Err(self.mismatch("map", arg));
                };
                Value::instance(self.graph.add_instance(Instance::wrap_map(m)))
            }
            "list_instance" => {
                let arg = self.single_arg("list_instance", args, span)?;
                let Data::List(l) = self.value(arg)?.data else {
                    return Err(self.mismatch("list", arg));
                };
                Value::instance(self.graph.add_instance(Instance::wrap_list(l)))
            }
            "instance" => {
                let arg = self.single_arg("instance", args, span)?;
                let class = self
                    .class_ref(arg)?
                    .ok_or_else(|| self.mismatch("class", arg))?;
                Value::instance(self.graph.add_instance(Instance {
                    class: InstanceClass::User(class),
                    data: InstanceData::Members(vec![]),
                    super_instance: None,
                    sub_instance: None,
                }))
            }
            _ => return Err(self.err(LowerErrorKind::UnknownFunction(name), &f.1)),
        };
        Ok(value)
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| s.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::snapshot::parser::parse;

    fn lower(src: &str) -> Result<Lowerer<'static>, Vec<LowerError>> {
        let items = parse(src, "test.snap").map_err(|_| vec![])?;
        let mut l = Lowerer::new("test.snap");
        let errs = l.lower(&items);
        if errs.is_empty() {
            Ok(l)
        } else {
            Err(errs)
        }
    }

    fn lower_err(src: &str) -> LowerErrorKind {
        match lower(src) {
            Ok(_) => panic!("expected an error"),
            Err(errs) => errs[0].kind.clone(),
        }
    }

    #[test]
    fn forward_references() {
        let l = lower(
            r#"
            closure f { proto: p }
            proto p { nstack: 2, consts: [A], code: [0x80000000] }
            class A { nvar: 1 }
            "#,
        )
        .unwrap();
        let (_, Decl::Closure(c)) = l.order[0] else {
            panic!("closure expected first");
        };
        let proto = l.graph.closure_proto(c);
        assert_eq!(proto.name.to_string(), "p");
        assert_eq!(proto.nstack, 2);
        assert!(matches!(proto.consts[0].data, Data::Class(_)));
        assert_eq!(proto.code[0].raw(), 0x80000000);
    }

    #[test]
    fn inline_proto_and_names() {
        let l = lower(
            r#"
            class Animal { name: "Ani mal", members: { speak: speak, x: var(0) } }
            closure speak { class: Animal, argc: 1, varg: 2, upvals: [[true, 0], [0, 3]] }
            "#,
        )
        .unwrap();
        let (_, Decl::Class(a)) = l.order[0] else {
            panic!()
        };
        assert_eq!(l.graph.classes[a].name.to_string(), "Ani mal");
        let members = l.graph.classes[a].members.unwrap();
        assert_eq!(l.graph.maps[members].borrow().len(), 2);
        let (_, Decl::Closure(c)) = l.order[1] else {
            panic!()
        };
        let proto = l.graph.closure_proto(c);
        assert_eq!(proto.name.to_string(), "speak");
        assert_eq!(proto.class, Some(a));
        assert_eq!(
            proto.upvals,
            vec![
                UpvalDesc { instack: true, idx: 0 },
                UpvalDesc { instack: false, idx: 3 }
            ]
        );
    }

    #[test]
    fn closure_upvalues_are_values() {
        let l = lower("closure f { upvals: [1, nil], code: [] }").unwrap();
        let (_, Decl::Closure(c)) = l.order[0] else {
            panic!()
        };
        assert_eq!(l.graph.closures[c].upvals.len(), 2);
        assert!(l.graph.closure_proto(c).upvals.is_empty());
    }

    #[test]
    fn constructors() {
        let l = lower(
            r#"proto p { consts: [
                static(native(init)), ptr("p"), ntvclos(c), bytes("00ff"),
                map_instance({a: 1}), list_instance([1, 2]), 1.5, -3
            ] }"#,
        )
        .unwrap();
        let (_, Decl::Proto(p)) = l.order[0] else {
            panic!()
        };
        let k = &l.graph.protos[p].consts;
        assert!(k[0].is_static && matches!(k[0].data, Data::NativeFunction(_)));
        assert_eq!(k[1].type_name(), "comptr");
        assert_eq!(k[2].type_name(), "ntvclos");
        let Data::Instance(b) = k[3].data else {
            panic!()
        };
        assert_eq!(l.graph.instances[b].data, InstanceData::Bytes(vec![0, 0xff]));
        assert_eq!(k[6], Value::real(1.5));
        assert_eq!(k[7], Value::int(-3));
    }

    #[test]
    fn builtins_replace_the_default_table() {
        let l = lower(r#"builtins { names: [print, "str"] }"#).unwrap();
        assert_eq!(l.graph.builtins.len(), 2);
        assert!(l.order.is_empty());
    }

    #[test]
    fn errors() {
        assert_eq!(lower_err("widget w {}"), LowerErrorKind::UnknownKind("widget".into()));
        assert_eq!(lower_err("class {}"), LowerErrorKind::UnnamedItem);
        assert_eq!(
            lower_err("class A {} class A {}"),
            LowerErrorKind::DuplicateItem("A".into())
        );
        assert_eq!(
            lower_err("proto p { consts: [q] }"),
            LowerErrorKind::UnknownItem("q".into())
        );
        assert_eq!(
            lower_err("class A { colour: 1 }"),
            LowerErrorKind::UnknownField {
                kind: "class",
                field: "colour".into()
            }
        );
        assert_eq!(
            lower_err("proto p { nstack: 300 }"),
            LowerErrorKind::OutOfRange {
                value: 300,
                ty: "u8"
            }
        );
        assert_eq!(
            lower_err("proto p { consts: [{nil: 1}] }"),
            LowerErrorKind::NilKey
        );
        assert_eq!(
            lower_err("proto p { consts: [p] }"),
            LowerErrorKind::NotAValue("p".into())
        );
        assert_eq!(
            lower_err(r#"proto p { consts: [bytes("abc")] }"#),
            LowerErrorKind::InvalidHex
        );
        assert_eq!(
            lower_err("proto p { consts: [frob(1)] }"),
            LowerErrorKind::UnknownFunction("frob".into())
        );
        assert_eq!(
            lower_err("closure f { proto: p, nstack: 1 } proto p {}"),
            LowerErrorKind::UnknownField {
                kind: "closure",
                field: "nstack".into()
            }
        );
    }

    #[test]
    fn hex_decoding() {
        assert_eq!(decode_hex("DEADbeef"), Some(vec![0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(decode_hex(""), Some(vec![]));
        assert_eq!(decode_hex("0g"), None);
    }
}
