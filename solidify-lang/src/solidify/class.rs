use std::io::Write;

use super::{emit, to_identifier, Error, ErrorKind, Solidifier};
use crate::runtime::{ClassKey, ClosureKey, Data, MapKey};

impl<W: Write> Solidifier<'_, W> {
    /// Writes the methods of a class followed by its `be_local_class`.
    pub(crate) fn class(&mut self, key: ClassKey) -> Result<(), Error> {
        self.classes_in_progress.push(key);
        let res = self.class_body(key);
        self.classes_in_progress.pop();
        res
    }

    fn class_body(&mut self, key: ClassKey) -> Result<(), Error> {
        let graph = self.graph;
        let cla = &graph.classes[key];
        let name = cla.name.to_string();
        let prefix = format!("class_{name}");
        log::debug!("solidifying class '{name}'");

        // static methods may refer to the class before it is declared
        emit!(self, "\nextern const bclass be_class_{name};\n");

        if let Some(members) = cla.members {
            for clo in self.member_closures(members)? {
                self.closure(clo, Some(&prefix))?;
            }
        }

        emit!(self, "\n");
        emit!(self, "/********************************************************************\n");
        emit!(self, "** Solidified class: {name}\n");
        emit!(self, "********************************************************************/\n");
        let super_name = cla.super_class.map(|s| graph.classes[s].name.to_string());
        if let Some(s) = &super_name {
            emit!(self, "extern const bclass be_class_{s};\n");
        }
        emit!(self, "be_local_class({name},\n");
        emit!(self, "    {},\n", cla.nvar);
        match &super_name {
            Some(s) => emit!(self, "    &be_class_{s},\n"),
            None => emit!(self, "    NULL,\n"),
        }
        match cla.members {
            Some(members) => {
                self.map(members, Some(&prefix))?;
                emit!(self, ",\n");
            }
            None => emit!(self, "    NULL,\n"),
        }
        let id = to_identifier(name.as_bytes())?;
        if !self.weak {
            emit!(self, "    (bstring*) &be_const_str_{id}\n");
        } else {
            emit!(self, "    be_str_weak({id})\n");
        }
        emit!(self, ");\n");
        Ok(())
    }

    /// Closures stored under string keys, in slot order after compaction.
    pub(crate) fn member_closures(&self, members: MapKey) -> Result<Vec<ClosureKey>, Error> {
        let cell = &self.graph.maps[members];
        cell.try_borrow_mut()
            .map_err(|_| ErrorKind::CyclicMap)?
            .compact();
        let map = cell.try_borrow().map_err(|_| ErrorKind::CyclicMap)?;
        Ok(map
            .iter()
            .filter(|n| matches!(n.key.data, Data::Str(_)))
            .filter_map(|n| n.value.as_closure())
            .collect())
    }
}
