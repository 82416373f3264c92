use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The source text holds no `struct` or `typedef struct` declaration.
    #[error("No valid struct found.")]
    NoStructFound,

    /// A struct was requested by name but the source never declares it.
    #[error("Struct {0} is not declared in the source")]
    StructNotFound(String),

    /// A member names a type that is neither in the catalog nor a parsed struct.
    #[error("Unknown type {0}")]
    UnknownType(String),

    /// A struct contains itself by value, directly or through other structs.
    #[error("Struct {0} contains itself")]
    CyclicType(String),

    /// An offset or size of the struct does not fit in 64 bits.
    #[error("Struct {0} is too large to lay out")]
    LayoutTooLarge(String),

    #[error("Failed to read type catalog {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid type catalog: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
