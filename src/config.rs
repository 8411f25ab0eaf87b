//! Engine Configuration
//!
//! All knobs are optional; `EngineConfig::default()` reproduces the stock
//! file conventions. Hosts hand the config over as camelCase JSON (the same
//! way compile options cross the native bridge) and the engine compiles it
//! once per run into a `CompiledConfig`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classify::{Role, SuffixPattern};
use crate::error::ConfigError;

pub const DEFAULT_STORE_HANDLE: &str = "store";
pub const DEFAULT_VIEW_ROOT: &str = "data";
pub const DEFAULT_PROJECTION_SYMBOL: &str = "viewData";

const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

const HANDLER_CONVENTION: &str = r"^(on|handle)[A-Z0-9_$]";
const STORE_CONVENTION: &str = r"^(set|reset|add|remove|toggle|update|clear|increment|decrement|get|select|is|has)[A-Z0-9_$]";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Role -> accepted filename suffixes (`.store`, `.*.impl`, ...).
    pub role_suffixes: BTreeMap<Role, Vec<String>>,
    /// Role -> regex every exported name of that role must match.
    pub naming_conventions: BTreeMap<Role, String>,
    pub treat_warnings_as_errors: bool,
    /// Report files that match no role suffix as `STRAY_FILE`.
    pub flag_stray_files: bool,
    /// Extensions stripped before suffix matching (without the dot).
    pub extensions: Vec<String>,
    /// Identifier handlers use to reach the store (`store.increment()`).
    pub store_handle: String,
    /// Identifier views read projected fields from (`data.title`).
    pub view_root: String,
    /// Store export whose returned object literal is the view projection.
    pub projection_symbol: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut role_suffixes = BTreeMap::new();
        role_suffixes.insert(Role::Store, vec![".store".to_string()]);
        role_suffixes.insert(Role::Handlers, vec![".handlers".to_string()]);
        role_suffixes.insert(Role::View, vec![".view".to_string()]);
        role_suffixes.insert(
            Role::Impl,
            vec![".impl".to_string(), ".*.impl".to_string()],
        );

        let mut naming_conventions = BTreeMap::new();
        naming_conventions.insert(Role::Handlers, HANDLER_CONVENTION.to_string());
        naming_conventions.insert(Role::Store, STORE_CONVENTION.to_string());

        Self {
            role_suffixes,
            naming_conventions,
            treat_warnings_as_errors: false,
            flag_stray_files: false,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            store_handle: DEFAULT_STORE_HANDLE.to_string(),
            view_root: DEFAULT_VIEW_ROOT.to_string(),
            projection_symbol: DEFAULT_PROJECTION_SYMBOL.to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON config; missing fields keep defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Json)
    }

    /// Validate and pre-compile every pattern.
    pub fn compile(&self) -> Result<CompiledConfig, ConfigError> {
        let mut suffixes = Vec::new();
        for (role, patterns) in &self.role_suffixes {
            if *role == Role::Unknown {
                return Err(ConfigError::UnknownRoleSuffix);
            }
            for pattern in patterns {
                suffixes.push((*role, SuffixPattern::parse(pattern)?));
            }
        }

        let mut naming = BTreeMap::new();
        for (role, pattern) in &self.naming_conventions {
            let re = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                role: *role,
                pattern: pattern.clone(),
                source,
            })?;
            naming.insert(*role, re);
        }

        for (field, value) in [
            ("storeHandle", &self.store_handle),
            ("viewRoot", &self.view_root),
            ("projectionSymbol", &self.projection_symbol),
        ] {
            if !crate::scanner::is_identifier(value) {
                return Err(ConfigError::InvalidIdentifier {
                    field,
                    value: value.clone(),
                });
            }
        }

        Ok(CompiledConfig {
            suffixes,
            naming,
            treat_warnings_as_errors: self.treat_warnings_as_errors,
            flag_stray_files: self.flag_stray_files,
            extensions: self
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
            store_handle: self.store_handle.clone(),
            view_root: self.view_root.clone(),
            projection_symbol: self.projection_symbol.clone(),
        })
    }
}

/// Read-only, validated form of `EngineConfig` shared by every stage of a run.
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    /// Suffix rules in role-priority order (BTreeMap iteration order of `Role`).
    pub suffixes: Vec<(Role, SuffixPattern)>,
    pub naming: BTreeMap<Role, Regex>,
    pub treat_warnings_as_errors: bool,
    pub flag_stray_files: bool,
    pub extensions: Vec<String>,
    pub store_handle: String,
    pub view_root: String,
    pub projection_symbol: String,
}

impl Default for CompiledConfig {
    fn default() -> Self {
        match EngineConfig::default().compile() {
            Ok(compiled) => compiled,
            // Stock patterns are literals above and always compile.
            Err(e) => unreachable!("default engine config is invalid: {e}"),
        }
    }
}
