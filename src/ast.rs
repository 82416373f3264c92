use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Type name used for members declared as function pointers.
pub const FUNCTION_PTR: &str = "function_ptr";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Named(String),
    FunctionPtr,
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Named(name) => name,
            FieldType::FunctionPtr => FUNCTION_PTR,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One member of a struct declaration.
///
/// `array_size` is the product of every array dimension and is 1 for scalars.
/// Bit-fields (`bit_size` set) are never arrays, and function pointers never
/// carry a bit width.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    pub is_pointer: bool,
    pub array_size: u64,
    pub bit_size: Option<u64>,
}

impl Field {
    pub fn function_ptr(name: &str) -> Field {
        Field {
            name: name.to_string(),
            ty: FieldType::FunctionPtr,
            is_pointer: true,
            array_size: 1,
            bit_size: None,
        }
    }

    pub fn is_bit_field(&self) -> bool {
        self.bit_size.is_some()
    }
}

/// Struct name to member list, in declaration order.
///
/// Built from scratch for every parsed source. Re-inserting a name replaces
/// its members but keeps its original position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructTable {
    structs: IndexMap<String, Vec<Field>>,
}

impl StructTable {
    pub fn new() -> Self {
        StructTable {
            structs: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, fields: Vec<Field>) -> Option<Vec<Field>> {
        self.structs.insert(name.to_string(), fields)
    }

    pub fn get(&self, name: &str) -> Option<&[Field]> {
        self.structs.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.structs.contains_key(name)
    }

    pub fn first(&self) -> Option<(&str, &[Field])> {
        self.structs
            .get_index(0)
            .map(|(name, fields)| (name.as_str(), fields.as_slice()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.structs.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.structs.is_empty()
    }
}
