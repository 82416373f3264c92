use crate::ast::{StructTable, FUNCTION_PTR};
use crate::catalog::{TypeCatalog, TypeInfo};
use crate::error::{Error, Result};
use crate::layout::{lay_out_fields, Pack, StructLayout};
use indexmap::IndexMap;
use std::iter;
use tracing::warn;

/// Looks up the size and alignment of member types.
///
/// A type is searched in the catalog first, then among the parsed structs,
/// whose layout is computed on demand. Structs currently being laid out are
/// tracked so that a struct containing itself by value fails instead of
/// recursing forever. Nested layouts are computed once per resolver.
pub struct Resolver<'a> {
    catalog: &'a TypeCatalog,
    structs: &'a StructTable,
    in_progress: Vec<String>,
    nested: IndexMap<String, TypeInfo>,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a TypeCatalog, structs: &'a StructTable) -> Self {
        Resolver {
            catalog,
            structs,
            in_progress: Vec::new(),
            nested: IndexMap::new(),
        }
    }

    pub fn pointer(&self) -> TypeInfo {
        self.catalog.pointer()
    }

    pub fn layout_of(&mut self, name: &str, pack: Option<Pack>) -> Result<StructLayout> {
        let structs = self.structs;
        let fields = structs
            .get(name)
            .ok_or_else(|| Error::StructNotFound(name.to_string()))?;

        if self.in_progress.iter().any(|outer| outer == name) {
            warn!(name, chain = ?self.in_progress, "struct contains itself");
            return Err(Error::CyclicType(name.to_string()));
        }

        self.in_progress.push(name.to_string());
        let layout = lay_out_fields(name, fields, self, pack);
        self.in_progress.pop();

        layout
    }

    /// Size and alignment of `type_name` as a member stored by value.
    ///
    /// Nested structs are always laid out with their natural alignment, no
    /// matter how the outer struct is packed.
    pub fn resolve(&mut self, type_name: &str) -> Result<TypeInfo> {
        for candidate in candidates(type_name) {
            if let Some(info) = self.catalog.get(candidate) {
                return Ok(info);
            }

            if let Some(info) = self.nested.get(candidate) {
                return Ok(*info);
            }

            if self.structs.contains(candidate) {
                let info = self.layout_of(candidate, None)?.type_info();
                self.nested.insert(candidate.to_string(), info);
                return Ok(info);
            }
        }

        if type_name == FUNCTION_PTR {
            return Ok(self.catalog.pointer());
        }

        Err(Error::UnknownType(type_name.to_string()))
    }

    /// Checks that a pointer's target type exists without laying it out, so a
    /// struct may point to itself.
    pub fn check_pointee(&self, type_name: &str) -> Result<()> {
        let known = type_name == FUNCTION_PTR
            || candidates(type_name)
                .any(|candidate| self.catalog.contains(candidate) || self.structs.contains(candidate));

        if known {
            Ok(())
        } else {
            Err(Error::UnknownType(type_name.to_string()))
        }
    }
}

// `struct Foo` may refer to the struct `Foo` when the catalog has no entry
// spelled with the keyword.
fn candidates(type_name: &str) -> impl Iterator<Item = &str> {
    iter::once(type_name).chain(type_name.strip_prefix("struct "))
}
