//! # Component Contract Checker Ground Truth
//!
//! ## File Roles
//!
//! 1. **Role by Suffix**: a file's role is decided by its filename suffix alone
//!    (`.store`, `.handlers`, `.view`, `.impl`, `.<variant>.impl`), never by content.
//!    The longest suffix wins; equal lengths resolve as store > handlers > view > impl.
//!
//! 2. **Component Identity**: the path with extension and role suffix removed.
//!    `src/counter/counter.store.ts` and `src/counter/counter.view.ts` are both
//!    component `src/counter/counter`.
//!
//! 3. **One File per Slot**: a component holds at most one file per role (impl
//!    variants each have their own slot). The first file by path wins.
//!
//! ## Cross-Role Contracts
//!
//! 4. **Handlers → Store**: every `store.<name>` a handlers file reads is exported
//!    by the store as a function or value.
//!
//! 5. **Store → View**: the keys `viewData` literally returns cover every
//!    `data.<field>` the view reads. Unread keys are advisories.
//!
//! 6. **Handlers Need a Store**: handlers without a store are an error.
//!
//! 7. **Naming**: store and handler exports follow their role's prefix convention.
//!
//! ## Failure Model
//!
//! Malformed sources never abort a run. An unbalanced file becomes
//! `PARSE_AMBIGUOUS` and contributes no symbols; every other file is still
//! checked. Only an invalid configuration or an empty input path is an `Err`.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod access;
mod classify;
mod config;
mod discovery;
mod engine;
mod error;
mod extract;
mod index;
mod report;
mod scanner;
mod validate;


pub use access::{collect_member_accesses, projection_keys, MemberAccess};
pub use classify::{classify, Classification, Role, RoleKey};
pub use config::{CompiledConfig, EngineConfig};
pub use discovery::collect_sources;
pub use engine::{check_sources, check_with, index_sources};
pub use error::{ConfigError, DiscoveryError, EngineError};
pub use extract::{extract, ExportKind, RawExport};
pub use index::{ComponentIndex, ContractIndex, ExportedSymbol, SourceFile, SourceInput};
pub use report::{aggregate, Report};
pub use scanner::Unbalanced;
pub use validate::*;

#[cfg(feature = "napi")]
pub use discovery::check_directory_native;

/// Check a JSON array of `{ path, text }` and return the `Report` as JSON.
#[cfg(feature = "napi")]
#[napi]
pub fn check_contracts_native(
    files_json: String,
    config_json: Option<String>,
) -> napi::Result<String> {
    let sources: Vec<SourceInput> = serde_json::from_str(&files_json)
        .map_err(|e| napi::Error::from_reason(format!("invalid source list: {}", e)))?;
    let config = match config_json {
        Some(json) => EngineConfig::from_json(&json),
        None => Ok(EngineConfig::default()),
    }
    .map_err(|e| napi::Error::from_reason(e.to_string()))?;

    let report =
        check_sources(&sources, &config).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_string(&report).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[cfg(feature = "napi")]
#[napi]
pub fn contract_bridge() -> String {
    "Contract Native Bridge Connected".to_string()
}
