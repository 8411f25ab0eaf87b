//! Diagnostics Reporter
//!
//! Pure aggregation over final diagnostics. Emission order is preserved; the
//! `codes` and `locations` projections mirror it entry for entry.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::validate::{Diagnostic, Severity};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
    pub error_count: usize,
    pub warning_count: usize,
    pub codes: Vec<String>,
    pub locations: Vec<String>,
}

impl Report {
    /// No error-severity diagnostics (warnings allowed).
    pub fn is_clean(&self) -> bool {
        self.error_count == 0
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }

    pub fn count_of(&self, code: &str) -> usize {
        self.codes.iter().filter(|c| *c == code).count()
    }

    /// SHA-256 of the serialised report.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        match serde_json::to_vec(self) {
            Ok(bytes) => hasher.update(&bytes),
            Err(e) => {
                tracing::warn!("report serialisation failed, fingerprinting codes only: {}", e);
                for code in &self.codes {
                    hasher.update(code.as_bytes());
                }
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

pub fn aggregate(diagnostics: Vec<Diagnostic>) -> Report {
    let error_count = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let codes = diagnostics.iter().map(|d| d.code.clone()).collect();
    let locations = diagnostics.iter().map(Diagnostic::location).collect();

    Report {
        error_count,
        warning_count: diagnostics.len() - error_count,
        codes,
        locations,
        diagnostics,
    }
}
