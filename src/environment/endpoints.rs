//! Endpoint enumeration.
//!
//! Every file under the config directory is an endpoint, except env files.

use std::fs;
use std::io;
use std::path::{Component, Path};

/// Env files are never served.
pub fn is_env_file(path: &str) -> bool {
    path.ends_with(super::resolver::ENV_FILE_NAME)
}

/// Lists all endpoints under `config_dir`, as sorted `/`-separated paths
/// relative to it.
pub fn list_endpoints(config_dir: &Path) -> io::Result<Vec<String>> {
    let mut endpoints = Vec::new();
    collect(config_dir, "", &mut endpoints)?;
    endpoints.sort();
    Ok(endpoints)
}

fn collect(dir: &Path, prefix: &str, out: &mut Vec<String>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let relative = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        let path = entry.path();
        if path.is_dir() {
            collect(&path, &relative, out)?;
        } else if path.is_file() && !is_env_file(&relative) {
            out.push(relative);
        }
    }
    Ok(())
}

/// Turns a decoded request path into an endpoint name relative to the
/// config directory.
///
/// Returns `None` for absolute paths and paths with `.` or `..` segments,
/// so the result can be joined onto the config directory as is.
pub fn normalize_endpoint(path: &str) -> Option<String> {
    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Checks whether `path` names a servable endpoint.
///
/// Paths rejected by [`normalize_endpoint`] never touch the filesystem.
pub fn endpoint_exists(config_dir: &Path, path: &str) -> bool {
    let Some(endpoint) = normalize_endpoint(path) else {
        return false;
    };
    !is_env_file(&endpoint) && config_dir.join(endpoint).is_file()
}
