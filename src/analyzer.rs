use crate::catalog::{TypeCatalog, TypeInfo};
use crate::error::{Error, Result};
use crate::layout::{compute_layout, parse_pack, Pack, StructLayout};
use crate::parser::{parse, parse_pragma_pack};
use serde::Serialize;
use tracing::{debug, info};

/// Where the pack value for a layout comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PackMode {
    /// Use the first `#pragma pack(N)` in the source, if there is one.
    #[default]
    FromSource,
    Natural,
    Packed(Pack),
}

impl PackMode {
    /// Reads a user supplied pack value. `0` and anything that is not a
    /// number select natural alignment.
    pub fn from_arg(value: &str) -> PackMode {
        match parse_pack(value) {
            Some(pack) => PackMode::Packed(pack),
            None => PackMode::Natural,
        }
    }

    /// The pack value to lay out `source` with.
    pub fn resolve(self, source: &str) -> Option<Pack> {
        match self {
            PackMode::FromSource => parse_pragma_pack(source),
            PackMode::Natural => None,
            PackMode::Packed(pack) => Some(pack),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Options {
    /// Struct to lay out. The first declared struct when `None`.
    pub struct_name: Option<String>,
    pub pack: PackMode,
    /// Add the resulting size and alignment to the catalog under the
    /// struct's name, so later sources can use it as a member type.
    pub register: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct Output {
    pub struct_name: String,
    #[serde(flatten)]
    pub layout: StructLayout,
    pub pack_value: Option<Pack>,
    /// The catalog entry added for this struct when registering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered: Option<TypeInfo>,
    #[serde(skip)]
    pub display: String,
}

pub struct Context {
    pub catalog: TypeCatalog,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(TypeCatalog::default())
    }
}

impl Context {
    pub fn new(catalog: TypeCatalog) -> Self {
        Context { catalog }
    }

    /// Parses `source` and lays out one of its structs.
    pub fn analyze(&mut self, source: &str, options: &Options) -> Result<Output> {
        let parsed = parse(source);

        let Some((first, _)) = parsed.structs.first() else {
            return Err(Error::NoStructFound);
        };

        let struct_name = match &options.struct_name {
            Some(name) if !parsed.structs.contains(name) => {
                return Err(Error::StructNotFound(name.clone()));
            }
            Some(name) => name.clone(),
            None => first.to_string(),
        };

        let pack = options.pack.resolve(source);
        debug!(struct_name = struct_name.as_str(), ?pack, "computing layout");

        let layout = compute_layout(&struct_name, &self.catalog, &parsed.structs, pack)?;

        let mut registered = None;
        if options.register {
            let info = layout.type_info();
            info!(
                struct_name = struct_name.as_str(),
                size = info.size,
                align = info.align,
                "registered type"
            );
            self.catalog.register(&struct_name, info);
            registered = Some(info);
        }

        Ok(Output {
            struct_name,
            layout,
            pack_value: pack,
            registered,
            display: parsed.display,
        })
    }

    /// Lays out every struct in `source`. A struct whose layout fails does
    /// not stop the others.
    pub fn analyze_all(
        &self,
        source: &str,
        pack: PackMode,
    ) -> Result<Vec<(String, Result<StructLayout>)>> {
        let parsed = parse(source);
        if parsed.structs.is_empty() {
            return Err(Error::NoStructFound);
        }

        let pack = pack.resolve(source);

        let layouts = parsed
            .structs
            .names()
            .map(|name| {
                let layout = compute_layout(name, &self.catalog, &parsed.structs, pack);
                (name.to_string(), layout)
            })
            .collect();

        Ok(layouts)
    }
}
