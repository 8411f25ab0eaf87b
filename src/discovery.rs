//! Source Discovery
//!
//! Host-side helper that turns a directory tree into the `(path, text)` inputs
//! the engine consumes. The engine itself never reads the file system.

#[cfg(feature = "napi")]
use napi_derive::napi;
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::CompiledConfig;
use crate::error::DiscoveryError;
use crate::index::SourceInput;

/// Collect every source file under `root` whose extension is configured.
/// Paths are relative to `root`, forward-slashed, and sorted. Files that are
/// not valid UTF-8 are skipped with a warning.
pub fn collect_sources(
    root: &Path,
    config: &CompiledConfig,
) -> Result<Vec<SourceInput>, DiscoveryError> {
    if !root.exists() {
        return Err(DiscoveryError::MissingRoot(root.to_path_buf()));
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || !has_source_extension(path, config) {
            continue;
        }

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(source) if source.kind() == io::ErrorKind::InvalidData => {
                tracing::warn!(path = %path.display(), "skipping source that is not valid UTF-8");
                continue;
            }
            Err(source) => {
                return Err(DiscoveryError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let relative = path.strip_prefix(root).unwrap_or(path);
        sources.push(SourceInput::new(
            relative.to_string_lossy().replace('\\', "/"),
            text,
        ));
    }

    sources.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(root = %root.display(), files = sources.len(), "sources collected");
    Ok(sources)
}

fn has_source_extension(path: &Path, config: &CompiledConfig) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| config.extensions.iter().any(|e| e == ext))
        .unwrap_or(false)
}

/// Walk `base_dir` and check every discovered source with the given config.
#[cfg(feature = "napi")]
#[napi]
pub fn check_directory_native(base_dir: String, config_json: Option<String>) -> napi::Result<String> {
    let config = match config_json {
        Some(json) => crate::config::EngineConfig::from_json(&json),
        None => Ok(crate::config::EngineConfig::default()),
    }
    .and_then(|c| c.compile())
    .map_err(|e| napi::Error::from_reason(e.to_string()))?;

    let sources = collect_sources(Path::new(&base_dir), &config)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let report = crate::engine::check_with(&sources, &config)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_string(&report).map_err(|e| napi::Error::from_reason(e.to_string()))
}
