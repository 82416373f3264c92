use crate::error::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub size: u64,
    pub align: u64,
}

impl TypeInfo {
    pub const fn new(size: u64, align: u64) -> TypeInfo {
        TypeInfo { size, align }
    }
}

/// Sizes and alignments of the types a struct member may name, plus the
/// size and alignment every pointer has.
///
/// The JSON form is `{"types": {"int": {"size": 4, "align": 4}}, "pointer": {...}}`.
/// A missing key falls back to the default catalog's value and any other key
/// is ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeCatalog {
    pub types: IndexMap<String, TypeInfo>,
    pub pointer: TypeInfo,
}

#[rustfmt::skip]
const DEFAULT_TYPES: &[(&str, TypeInfo)] = &[
    ("char",           TypeInfo::new(1, 1)),
    ("boolean",        TypeInfo::new(1, 1)),
    ("short",          TypeInfo::new(2, 2)),
    ("int",            TypeInfo::new(4, 4)),
    ("long",           TypeInfo::new(8, 8)),
    ("long long",      TypeInfo::new(8, 8)),
    ("float",          TypeInfo::new(4, 4)),
    ("double",         TypeInfo::new(8, 8)),
    ("size_t",         TypeInfo::new(4, 4)),
    ("time_t",         TypeInfo::new(4, 4)),
    ("uint16",         TypeInfo::new(2, 2)),
    ("uint32",         TypeInfo::new(4, 4)),
    ("uint64",         TypeInfo::new(8, 8)),
    ("uint8",          TypeInfo::new(1, 1)),
    ("Std_ReturnType", TypeInfo::new(1, 1)),
];

const DEFAULT_POINTER: TypeInfo = TypeInfo::new(4, 4);

impl Default for TypeCatalog {
    fn default() -> Self {
        TypeCatalog::with_types(
            DEFAULT_POINTER,
            DEFAULT_TYPES
                .iter()
                .map(|(name, info)| (name.to_string(), *info)),
        )
    }
}

impl TypeCatalog {
    /// A catalog that knows nothing but the pointer size.
    pub fn new(pointer: TypeInfo) -> Self {
        TypeCatalog {
            types: IndexMap::new(),
            pointer,
        }
    }

    pub fn with_types<I>(pointer: TypeInfo, types: I) -> Self
    where
        I: IntoIterator<Item = (String, TypeInfo)>,
    {
        TypeCatalog {
            types: types.into_iter().collect(),
            pointer,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn get(&self, name: &str) -> Option<TypeInfo> {
        self.types.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn pointer(&self) -> TypeInfo {
        self.pointer
    }

    /// Adds or replaces a type. Returns the entry it replaced.
    pub fn register(&mut self, name: &str, info: TypeInfo) -> Option<TypeInfo> {
        self.types.insert(name.to_string(), info)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TypeInfo)> {
        self.types.iter().map(|(name, info)| (name.as_str(), *info))
    }
}
