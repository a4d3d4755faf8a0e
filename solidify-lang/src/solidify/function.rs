use std::io::Write;

use super::{emit, to_identifier, Error, ErrorKind, Solidifier};
use crate::runtime::{ClosureKey, Data, ProtoKey};

const FIELD_PAD: &str = "                          ";
const NULL_PAD: &str = "                       ";

impl<W: Write> Solidifier<'_, W> {
    /// Writes a `be_local_closure` for `key`, preceded by any class its
    /// constants refer to.
    ///
    /// A method compiled in a class other than `prefix` is only referenced
    /// with an `extern` declaration: its body belongs to the class that
    /// defined it.
    pub(crate) fn closure(&mut self, key: ClosureKey, prefix: Option<&str>) -> Result<(), Error> {
        let graph = self.graph;
        let clo = &graph.closures[key];
        let proto = &graph.protos[clo.proto];
        let func_name = proto.name.to_string();
        let parent = proto.class.map(|c| graph.classes[c].name.to_string());
        log::debug!("solidifying closure '{func_name}' (prefix: {prefix:?})");

        if let Some(parent) = &parent {
            let parent_prefix = format!("class_{parent}");
            if prefix != Some(parent_prefix.as_str()) {
                emit!(self, "// Borrowed method '{func_name}' from class '{parent_prefix}'\n");
                emit!(self, "extern bclosure *{parent_prefix}_{func_name};\n");
                return Ok(());
            }
        }

        if !clo.upvals.is_empty() {
            log::warn!(
                "closure '{func_name}' captures {} upvalue(s), solidified output is incomplete",
                clo.upvals.len()
            );
            emit!(self, "--> Unsupported upvals in closure <---");
        }

        self.inner_classes(clo.proto)?;

        emit!(self, "\n");
        emit!(self, "/********************************************************************\n");
        emit!(self, "** Solidified function: {func_name}\n");
        emit!(self, "********************************************************************/\n");
        if let Some(parent) = &parent {
            emit!(self, "extern const bclass be_class_{parent};\n");
        }
        let func_id = to_identifier(func_name.as_bytes())?;
        emit!(
            self,
            "be_local_closure({}{}{func_id},   /* name */\n",
            prefix.unwrap_or(""),
            if prefix.is_some() { "_" } else { "" }
        );
        self.proto(clo.proto, &func_name, 2)?;
        emit!(self, "\n");
        emit!(self, ");\n");
        emit!(self, "/*******************************************************************/\n\n");
        Ok(())
    }

    /// Classes held in the constants of `key` are written out first, except
    /// the implicit `_class` slot of a static method.
    fn inner_classes(&mut self, key: ProtoKey) -> Result<(), Error> {
        let graph = self.graph;
        let proto = &graph.protos[key];
        for (k, c) in proto.consts.iter().enumerate() {
            let Data::Class(cls) = c.data else {
                continue;
            };
            if k == 0 && proto.is_static_method() {
                continue;
            }
            if self.classes_in_progress.contains(&cls) {
                log::debug!("class '{}' is already being written", graph.classes[cls].name);
                continue;
            }
            self.class(cls)?;
        }
        Ok(())
    }

    /// Writes the `be_nested_proto` of `key` at `indent` columns.
    /// Sub-prototypes are named `<func_name>_<i>`.
    fn proto(&mut self, key: ProtoKey, func_name: &str, indent: usize) -> Result<(), Error> {
        let graph = self.graph;
        let pr = &graph.protos[key];
        let parent = pr.class.map(|c| graph.classes[c].name);

        emit!(self, "{:indent$}be_nested_proto(\n", "");
        let indent = indent + 2;
        let pad = " ".repeat(indent);

        emit!(self, "{pad}{},{FIELD_PAD}/* nstack */\n", pr.nstack);
        emit!(self, "{pad}{},{FIELD_PAD}/* argc */\n", pr.argc);
        emit!(self, "{pad}{},{FIELD_PAD}/* varg */\n", pr.varg);
        emit!(
            self,
            "{pad}{},{FIELD_PAD}/* has upvals */\n",
            !pr.upvals.is_empty() as i32
        );
        if !pr.upvals.is_empty() {
            emit!(
                self,
                "{pad}( &(const bupvaldesc[{:2}]) {{  /* upvals */\n",
                pr.upvals.len()
            );
            for u in pr.upvals.iter() {
                emit!(self, "{pad}  be_local_const_upval({}, {}),\n", u.instack as i32, u.idx);
            }
            emit!(self, "{pad}}}),\n");
        } else {
            emit!(self, "{pad}NULL,{NULL_PAD}/* no upvals */\n");
        }

        emit!(
            self,
            "{pad}{},{FIELD_PAD}/* has sup protos */\n",
            !pr.protos.is_empty() as i32
        );
        if !pr.protos.is_empty() {
            // one extra slot for the enclosing class
            emit!(
                self,
                "{pad}( &(const struct bproto*[{:2}]) {{\n",
                pr.protos.len() + 1
            );
            for (i, sub) in pr.protos.iter().enumerate() {
                self.proto(*sub, &format!("{func_name}_{i}"), indent + 2)?;
                emit!(self, ",\n");
            }
            self.parent_slot(&pad, parent.map(|p| p.to_string()))?;
            emit!(self, "{pad}}}),\n");
        } else {
            self.parent_slot(&pad, parent.map(|p| p.to_string()))?;
        }

        emit!(
            self,
            "{pad}{},{FIELD_PAD}/* has constants */\n",
            !pr.consts.is_empty() as i32
        );
        if !pr.consts.is_empty() {
            emit!(
                self,
                "{pad}( &(const bvalue[{:2}]) {{     /* constants */\n",
                pr.consts.len()
            );
            for (k, c) in pr.consts.iter().enumerate() {
                emit!(self, "{pad}/* K{k:<3} */  ");
                self.value(c, None, None)?;
                emit!(self, ",\n");
            }
            emit!(self, "{pad}}}),\n");
        } else {
            emit!(self, "{pad}NULL,{NULL_PAD}/* no const */\n");
        }

        let name_id = pr.name.with_str(|n| to_identifier(n.as_bytes()))?;
        if !self.weak {
            emit!(self, "{pad}&be_const_str_{name_id},\n");
        } else {
            emit!(self, "{pad}be_str_weak({name_id}),\n");
        }
        emit!(self, "{pad}&be_const_str_solidified,\n");

        emit!(
            self,
            "{pad}( &(const binstruction[{:2}]) {{  /* code */\n",
            pr.code.len()
        );
        for (pc, ins) in pr.code.iter().enumerate() {
            emit!(self, "{pad}  0x{:08X},  //{}\n", ins.raw(), ins.disasm(pc));
            if let Some(global) = ins.global_access() {
                if !graph.builtins.contains_index(global) {
                    emit!(self, "\n===== unsupported global G{global}\n");
                    return Err(ErrorKind::UnsupportedGlobal {
                        global,
                        function: pr.name.to_string(),
                    }
                    .into());
                }
            }
        }
        emit!(self, "{pad}}})\n");
        emit!(self, "{:1$})", "", indent - 2);
        Ok(())
    }

    fn parent_slot(&mut self, pad: &str, parent: Option<String>) -> Result<(), Error> {
        match parent {
            Some(p) => emit!(self, "{pad}&be_class_{p}, \n"),
            None => emit!(self, "{pad}NULL, \n"),
        }
        Ok(())
    }
}
