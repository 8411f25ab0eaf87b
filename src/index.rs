//! Contract Index Builder
//!
//! Folds classified, extracted files into one `ComponentIndex` per component
//! id. Folding is single-writer and runs over inputs sorted by path, so the
//! "first seen wins" resolution of duplicate roles and exports is the same
//! for every permutation of the input set.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::classify::{Role, RoleKey};
use crate::extract::{ExportKind, RawExport};
use crate::scanner::Unbalanced;
use crate::validate::{
    Diagnostic, SourceSpan, INV_DUPLICATE_EXPORT, INV_DUPLICATE_ROLE, INV_PARSE_AMBIGUOUS,
};

// ═══════════════════════════════════════════════════════════════════════════════
// INPUT / FILE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// One `(path, text)` pair supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInput {
    pub path: String,
    pub text: String,
}

impl SourceInput {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Normalised (forward-slash) path.
    pub path: String,
    pub text: String,
    pub component_id: String,
    pub role: Role,
    pub variant: Option<String>,
    /// Extraction was abandoned; the file holds its slot but has no symbols.
    pub parse_failed: bool,
}

impl SourceFile {
    pub fn key(&self) -> RoleKey {
        RoleKey {
            role: self.role,
            variant: self.variant.clone(),
        }
    }

    pub fn span(&self, line: u32) -> SourceSpan {
        SourceSpan {
            file: self.path.clone(),
            line,
        }
    }
}

/// Per-file output of classification + extraction, ready to be folded.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub file: SourceFile,
    pub exports: Result<Vec<RawExport>, Unbalanced>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedSymbol {
    pub name: String,
    pub kind: ExportKind,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub component_id: String,
    pub span: SourceSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl ExportedSymbol {
    fn from_raw(raw: RawExport, file: &SourceFile) -> Self {
        Self {
            name: raw.name,
            kind: raw.kind,
            role: file.role,
            variant: file.variant.clone(),
            component_id: file.component_id.clone(),
            span: file.span(raw.line),
            source: raw.source,
            target: raw.target,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT INDEX
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct ComponentIndex {
    pub component_id: String,
    pub files_by_role: BTreeMap<RoleKey, SourceFile>,
    pub symbols_by_role: BTreeMap<RoleKey, Vec<ExportedSymbol>>,
    /// Conflicts found while folding (parse failures, duplicate roles and
    /// exports). Reported ahead of rule diagnostics.
    pub build_diagnostics: Vec<Diagnostic>,
}

impl ComponentIndex {
    fn new(component_id: &str) -> Self {
        Self {
            component_id: component_id.to_string(),
            files_by_role: BTreeMap::new(),
            symbols_by_role: BTreeMap::new(),
            build_diagnostics: Vec::new(),
        }
    }

    /// The variant-less file for `role`.
    pub fn file(&self, role: Role) -> Option<&SourceFile> {
        self.files_by_role.get(&RoleKey::new(role))
    }

    /// Whether any file (any variant) plays `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.files_by_role.keys().any(|k| k.role == role)
    }

    pub fn symbols(&self, role: Role) -> &[ExportedSymbol] {
        self.symbols_by_role
            .get(&RoleKey::new(role))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn symbol(&self, role: Role, name: &str) -> Option<&ExportedSymbol> {
        self.symbols(role).iter().find(|s| s.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.files_by_role.is_empty()
    }

    fn ingest(&mut self, extracted: ExtractedFile) {
        let ExtractedFile { mut file, exports } = extracted;
        let key = file.key();

        if let Some(existing) = self.files_by_role.get(&key) {
            tracing::warn!(
                component = %self.component_id,
                role = %key,
                kept = %existing.path,
                dropped = %file.path,
                "duplicate role file dropped"
            );
            self.build_diagnostics.push(
                Diagnostic::new(
                    INV_DUPLICATE_ROLE,
                    &self.component_id,
                    &format!(
                        "Component already has a {} file `{}`; `{}` is ignored.",
                        key, existing.path, file.path
                    ),
                )
                .with_span(file.span(1)),
            );
            return;
        }

        let raw_exports = match exports {
            Ok(raw) => raw,
            Err(unbalanced) => {
                tracing::warn!(
                    file = %file.path,
                    line = unbalanced.line,
                    "extraction abandoned: {}",
                    unbalanced.message
                );
                self.build_diagnostics.push(
                    Diagnostic::new(
                        INV_PARSE_AMBIGUOUS,
                        &self.component_id,
                        &format!("Cannot balance `{}`: {}.", file.path, unbalanced.message),
                    )
                    .with_span(file.span(unbalanced.line)),
                );
                file.parse_failed = true;
                Vec::new()
            }
        };

        let mut symbols: Vec<ExportedSymbol> = Vec::with_capacity(raw_exports.len());
        for raw in raw_exports {
            if let Some(first) = symbols.iter().find(|s| s.name == raw.name) {
                tracing::debug!(
                    component = %self.component_id,
                    symbol = %raw.name,
                    "duplicate export dropped"
                );
                self.build_diagnostics.push(
                    Diagnostic::new(
                        INV_DUPLICATE_EXPORT,
                        &self.component_id,
                        &format!(
                            "`{}` is exported twice by the {} file (first at line {}).",
                            raw.name, key, first.span.line
                        ),
                    )
                    .with_symbol(&raw.name)
                    .with_span(file.span(raw.line)),
                );
                continue;
            }
            symbols.push(ExportedSymbol::from_raw(raw, &file));
        }

        debug_assert!(symbols
            .iter()
            .all(|s| s.component_id == self.component_id && s.role == key.role));

        self.symbols_by_role.insert(key.clone(), symbols);
        self.files_by_role.insert(key, file);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

/// Finalised output of the builder: components in first-observed order plus
/// the files no role claimed.
#[derive(Debug, Clone, Default)]
pub struct ContractIndex {
    pub components: Vec<ComponentIndex>,
    pub stray_files: Vec<SourceFile>,
}

impl ContractIndex {
    pub fn component(&self, component_id: &str) -> Option<&ComponentIndex> {
        self.components
            .iter()
            .find(|c| c.component_id == component_id)
    }
}

#[derive(Debug, Default)]
pub struct IndexBuilder {
    components: Vec<ComponentIndex>,
    positions: HashMap<String, usize>,
    stray_files: Vec<SourceFile>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one file. Callers must feed files in a deterministic order.
    pub fn ingest(&mut self, extracted: ExtractedFile) {
        if extracted.file.role == Role::Unknown {
            self.stray_files.push(extracted.file);
            return;
        }

        let id = extracted.file.component_id.clone();
        let position = match self.positions.get(&id) {
            Some(&position) => position,
            None => {
                self.components.push(ComponentIndex::new(&id));
                self.positions.insert(id, self.components.len() - 1);
                self.components.len() - 1
            }
        };
        self.components[position].ingest(extracted);
    }

    pub fn finish(self) -> ContractIndex {
        ContractIndex {
            components: self.components,
            stray_files: self.stray_files,
        }
    }
}

/// Sort by path (text as a tiebreak for repeated paths) and fold.
pub fn build(mut files: Vec<ExtractedFile>) -> ContractIndex {
    files.sort_by(|a, b| {
        a.file
            .path
            .cmp(&b.file.path)
            .then_with(|| a.file.text.cmp(&b.file.text))
    });

    let mut builder = IndexBuilder::new();
    for file in files {
        builder.ingest(file);
    }
    builder.finish()
}
