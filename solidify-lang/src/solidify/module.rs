use std::io::Write;

use super::{emit, Error, ErrorKind, Solidifier};
use crate::runtime::{ClassKey, ClosureKey, Data, MapKey, ModuleKey};

enum Member {
    Closure(ClosureKey),
    Class(ClassKey),
}

impl<W: Write> Solidifier<'_, W> {
    /// Writes the functions and classes of a module, then the module table
    /// and its native-module registration.
    pub(crate) fn module(&mut self, key: ModuleKey) -> Result<(), Error> {
        let graph = self.graph;
        let ml = &graph.modules[key];
        let name = ml.name.map(|n| n.to_string()).unwrap_or_default();
        log::debug!("solidifying module '{name}'");

        if let Some(table) = ml.table {
            for member in module_members(self.graph, table)? {
                match member {
                    Member::Closure(c) => self.closure(c, None)?,
                    Member::Class(c) => self.class(c)?,
                }
            }
        }

        emit!(self, "\n");
        emit!(self, "/********************************************************************\n");
        emit!(self, "** Solidified module: {name}\n");
        emit!(self, "********************************************************************/\n");
        emit!(self, "be_local_module({name},\n");
        emit!(self, "    \"{name}\",\n");
        match ml.table {
            Some(table) => {
                self.map(table, None)?;
                emit!(self, "\n");
            }
            None => emit!(self, "    NULL,\n"),
        }
        emit!(self, ");\n");
        emit!(self, "BE_EXPORT_VARIABLE be_define_const_native_module({name});\n");
        emit!(self, "/********************************************************************/\n");
        Ok(())
    }
}

fn module_members(graph: &crate::runtime::ObjectGraph, table: MapKey) -> Result<Vec<Member>, Error> {
    let cell = &graph.maps[table];
    cell.try_borrow_mut()
        .map_err(|_| ErrorKind::CyclicMap)?
        .compact();
    let map = cell.try_borrow().map_err(|_| ErrorKind::CyclicMap)?;
    Ok(map
        .iter()
        .filter(|n| matches!(n.key.data, Data::Str(_)))
        .filter_map(|n| match n.value.data {
            Data::Closure(c) => Some(Member::Closure(c)),
            Data::Class(c) => Some(Member::Class(c)),
            _ => None,
        })
        .collect())
}
