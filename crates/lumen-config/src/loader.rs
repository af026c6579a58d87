//! Reading and writing site files.

use std::fs;
use std::path::{Path, PathBuf};

use lumen_errors::ConfigError;
use tracing::{debug, info};

use crate::model::LocationConfig;
use crate::validation::validate_locations;

/// Parse one site file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if it is not a valid site document.
pub fn load_location_file(path: &Path) -> Result<LocationConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let location: LocationConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    debug!(path = %path.display(), location = %location.name, "Loaded location file");
    Ok(location)
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load and validate every `*.json` site file in `dir`, in file name order.
pub fn load_locations(dir: &Path) -> Result<Vec<LocationConfig>, ConfigError> {
    let locations = json_files(dir)?
        .iter()
        .map(|path| load_location_file(path))
        .collect::<Result<Vec<_>, _>>()?;
    validate_locations(&locations)?;
    info!(dir = %dir.display(), count = locations.len(), "Loaded locations");
    Ok(locations)
}

/// Write `location` to `dir/<name>.json`, creating `dir` if needed.
pub fn save_location(dir: &Path, location: &LocationConfig) -> Result<PathBuf, ConfigError> {
    fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("{}.json", location.name));
    let content = serde_json::to_string_pretty(location).map_err(|e| ConfigError::Parse {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), "Saved location file");
    Ok(path)
}
