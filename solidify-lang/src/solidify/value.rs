use std::io::Write;

use super::{emit, to_identifier, Error, ErrorKind, Solidifier};
use crate::runtime::{
    Data, InstanceClass, InstanceData, InstanceKey, ListKey, MapKey, Value,
};

/// Strings at least this long are emitted through the long-string table.
pub const LONG_STRING_THRESHOLD: usize = 255;

impl<W: Write> Solidifier<'_, W> {
    /// Writes the constant expression of `value`.
    ///
    /// `prefix` and `key` name native functions and pointers, which have no
    /// name of their own: they are referenced as `be_ntv_<prefix>_<key>`.
    pub(crate) fn value(
        &mut self,
        value: &Value,
        prefix: Option<&str>,
        key: Option<&str>,
    ) -> Result<(), Error> {
        let graph = self.graph;
        match value.data {
            Data::Nil => emit!(self, "be_const_nil()"),
            Data::Bool(b) => emit!(self, "be_const_bool({})", b as i32),
            Data::Int(i) => emit!(self, "be_const_int({i})"),
            Data::Index(i) => emit!(self, "be_const_var({i})"),
            Data::Real(r) => self.real(r)?,
            Data::Str(s) => {
                let (len, id) = s.with_str(|s| (s.len(), to_identifier(s.as_bytes())));
                let id = id?;
                if len >= LONG_STRING_THRESHOLD {
                    self.emit_str("be_nested_str_long(")?;
                    self.emit_str(&id)?;
                    self.emit_str(")")?;
                } else if !self.weak {
                    emit!(self, "be_nested_str({id})");
                } else {
                    emit!(self, "be_nested_str_weak({id})");
                }
            }
            Data::Closure(c) => {
                let proto = graph.closure_proto(c);
                let func_id = proto.name.with_str(|n| to_identifier(n.as_bytes()))?;
                let class_name = proto.class.map(|cls| graph.classes[cls].name.to_string());
                let actual = class_name.as_deref().or(prefix);
                emit!(
                    self,
                    "be_const_{}closure({}{}{}{}_closure)",
                    if value.is_static { "static_" } else { "" },
                    if class_name.is_some() { "class_" } else { "" },
                    actual.unwrap_or(""),
                    if actual.is_some() { "_" } else { "" },
                    func_id
                );
            }
            Data::Class(c) => emit!(self, "be_const_class(be_class_{})", graph.classes[c].name),
            Data::NativePointer(_) => {
                let (p, k) = native_symbol(prefix, key);
                emit!(self, "be_const_comptr(&be_ntv_{p}_{k})");
            }
            Data::NativeFunction(_) => {
                let (p, k) = native_symbol(prefix, key);
                emit!(
                    self,
                    "be_const_{}func(be_ntv_{p}_{k})",
                    if value.is_static { "static_" } else { "" }
                );
            }
            Data::Instance(i) => self.instance(i, prefix, key)?,
            Data::Map(m) => self.map(m, prefix)?,
            Data::List(l) => self.list(l, prefix)?,
            Data::NativeClosure(_) | Data::Module(_) => {
                return Err(ErrorKind::UnsupportedValue(value.type_name()).into());
            }
        }
        Ok(())
    }

    #[cfg(not(feature = "single-float"))]
    fn real(&mut self, r: crate::runtime::Real) -> Result<(), Error> {
        emit!(self, "be_const_real_hex(0x{:016x})", r.to_bits());
        Ok(())
    }

    #[cfg(feature = "single-float")]
    fn real(&mut self, r: crate::runtime::Real) -> Result<(), Error> {
        emit!(self, "be_const_real_hex(0x{:08X})", r.to_bits());
        Ok(())
    }

    fn instance(
        &mut self,
        key: InstanceKey,
        prefix: Option<&str>,
        member_key: Option<&str>,
    ) -> Result<(), Error> {
        let graph = self.graph;
        let ins = &graph.instances[key];
        if ins.super_instance.is_some() || ins.sub_instance.is_some() {
            return Err(ErrorKind::InstanceLinkage.into());
        }
        let class = match ins.class {
            InstanceClass::Bytes => {
                let InstanceData::Bytes(bytes) = &ins.data else {
                    return Err(ErrorKind::UnsupportedInstance("bytes".into()).into());
                };
                let mut hex = String::new();
                hex.try_reserve_exact(bytes.len() * 2)
                    .map_err(|_| ErrorKind::BufferExhausted(bytes.len() * 2))?;
                for b in bytes {
                    hex.push_str(&format!("{b:02X}"));
                }
                self.emit_str("be_const_bytes_instance(")?;
                self.emit_str(&hex)?;
                self.emit_str(")")?;
                return Ok(());
            }
            InstanceClass::Map => "map",
            InstanceClass::List => "list",
            InstanceClass::User(cls) => {
                let name = graph.classes[cls].name.to_string();
                return Err(ErrorKind::UnsupportedInstance(name).into());
            }
        };
        let inner = match &ins.data {
            InstanceData::Members(m) if !m.is_empty() => m[0],
            _ => return Err(ErrorKind::UnsupportedInstance(class.into()).into()),
        };
        emit!(
            self,
            "be_const_simple_instance(be_nested_simple_instance(&be_class_{class}, {{\n"
        );
        emit!(self, "        be_const_{class}( * ");
        self.value(&inner, prefix, member_key)?;
        emit!(self, "    ) }} ))");
        Ok(())
    }

    /// Compacts the map, then writes it as a `be_nested_map`.
    pub(crate) fn map(&mut self, key: MapKey, prefix: Option<&str>) -> Result<(), Error> {
        let graph = self.graph;
        let cell = &graph.maps[key];
        cell.try_borrow_mut()
            .map_err(|_| ErrorKind::CyclicMap)?
            .compact();
        let map = cell.try_borrow().map_err(|_| ErrorKind::CyclicMap)?;

        emit!(self, "    be_nested_map({},\n", map.len());
        emit!(self, "    ( (struct bmapnode*) &(const bmapnode[]) {{\n");
        for node in map.iter() {
            let next = node.next_index();
            match node.key.data {
                Data::Str(s) => {
                    let (raw, id) = s.with_str(|k| (k.to_string(), to_identifier(k.as_bytes())));
                    let id = id?;
                    if !self.weak {
                        emit!(self, "        {{ be_const_key({id}, {next}), ");
                    } else {
                        emit!(self, "        {{ be_const_key_weak({id}, {next}), ");
                    }
                    self.value(&node.value, prefix, Some(&raw))?;
                }
                Data::Int(i) => {
                    emit!(self, "        {{ be_const_key_int({i}, {next}), ");
                    self.value(&node.value, prefix, None)?;
                }
                _ => return Err(ErrorKind::UnsupportedKey(node.key.type_name()).into()),
            }
            emit!(self, " }},\n");
        }
        emit!(self, "    }}))");
        Ok(())
    }

    pub(crate) fn list(&mut self, key: ListKey, prefix: Option<&str>) -> Result<(), Error> {
        let graph = self.graph;
        let list = &graph.lists[key];
        emit!(self, "    be_nested_list({},\n", list.items.len());
        emit!(self, "    ( (struct bvalue*) &(const bvalue[]) {{\n");
        for item in list.items.iter() {
            emit!(self, "        ");
            self.value(item, prefix, Some(""))?;
            emit!(self, ",\n");
        }
        emit!(self, "    }}))");
        Ok(())
    }
}

fn native_symbol<'k>(prefix: Option<&'k str>, key: Option<&'k str>) -> (&'k str, &'k str) {
    if prefix.is_none() || key.is_none() {
        log::warn!("native member without a prefix or key, using 'unknown'");
    }
    (prefix.unwrap_or("unknown"), key.unwrap_or("unknown"))
}
