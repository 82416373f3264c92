use crate::catalog::TypeCatalog;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming a catalog file to use when none is passed
/// explicitly.
pub const CONFIG_ENV_VAR: &str = "STRUCTVIZ_CONFIG";

pub fn load_catalog(path: &Path) -> Result<TypeCatalog> {
    let json = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let catalog = TypeCatalog::from_json_str(&json)?;
    debug!(path = %path.display(), types = catalog.iter().count(), "loaded type catalog");

    Ok(catalog)
}

/// Picks the catalog to use.
///
/// An explicit path must exist and parse. A path from `STRUCTVIZ_CONFIG`
/// that does not exist falls back to the built-in catalog with a warning.
pub fn find_catalog(explicit: Option<&Path>) -> Result<TypeCatalog> {
    let from_env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    select_catalog(explicit, from_env.as_deref())
}

fn select_catalog(explicit: Option<&Path>, from_env: Option<&Path>) -> Result<TypeCatalog> {
    if let Some(path) = explicit {
        return load_catalog(path);
    }

    match from_env {
        Some(path) if path.is_file() => load_catalog(path),
        Some(path) => {
            warn!(path = %path.display(), "catalog file not found, using built-in types");
            Ok(TypeCatalog::default())
        }
        None => Ok(TypeCatalog::default()),
    }
}
