//! Contract Check Pipeline
//!
//! classify → extract (parallel, per file) → build (single writer, path
//! order) → validate (parallel, per component) → aggregate.
//!
//! The engine never touches the file system; hosts hand in `(path, text)`
//! pairs and receive a `Report`. Identical inputs, in any order, produce a
//! byte-identical report.

use rayon::prelude::*;

use crate::classify::{classify, normalize_path, Role};
use crate::config::{CompiledConfig, EngineConfig};
use crate::error::EngineError;
use crate::extract::extract;
use crate::index::{build, ContractIndex, ExtractedFile, SourceFile, SourceInput};
use crate::report::{aggregate, Report};
use crate::validate::{stray_file_diagnostic, validate, Diagnostic};

/// Check `sources` under `config`.
pub fn check_sources(sources: &[SourceInput], config: &EngineConfig) -> Result<Report, EngineError> {
    let compiled = config.compile()?;
    check_with(sources, &compiled)
}

/// Check `sources` with an already compiled config.
pub fn check_with(sources: &[SourceInput], config: &CompiledConfig) -> Result<Report, EngineError> {
    let index = index_sources(sources, config)?;

    let per_component: Vec<Vec<Diagnostic>> = index
        .components
        .par_iter()
        .map(|component| {
            let mut diagnostics = component.build_diagnostics.clone();
            diagnostics.extend(validate(component, config));
            diagnostics
        })
        .collect();

    let mut diagnostics: Vec<Diagnostic> = per_component.into_iter().flatten().collect();

    if config.flag_stray_files {
        diagnostics.extend(
            index
                .stray_files
                .iter()
                .map(|file| stray_file_diagnostic(file, config)),
        );
    }

    let report = aggregate(diagnostics);
    tracing::debug!(
        files = sources.len(),
        components = index.components.len(),
        stray = index.stray_files.len(),
        errors = report.error_count,
        warnings = report.warning_count,
        "contract check finished"
    );
    Ok(report)
}

/// Classify, extract and fold `sources` into a finalised index.
pub fn index_sources(
    sources: &[SourceInput],
    config: &CompiledConfig,
) -> Result<ContractIndex, EngineError> {
    if let Some(position) = sources.iter().position(|s| s.path.trim().is_empty()) {
        return Err(EngineError::EmptyPath(position));
    }

    let extracted: Vec<ExtractedFile> = sources
        .par_iter()
        .map(|source| extract_file(source, config))
        .collect();

    Ok(build(extracted))
}

fn extract_file(source: &SourceInput, config: &CompiledConfig) -> ExtractedFile {
    let path = normalize_path(&source.path);
    let classification = classify(&path, config);

    // Stray files are never indexed, so their exports are irrelevant.
    let exports = if classification.role == Role::Unknown {
        Ok(Vec::new())
    } else {
        extract(&source.text)
    };

    ExtractedFile {
        file: SourceFile {
            path,
            text: source.text.clone(),
            component_id: classification.component_id,
            role: classification.role,
            variant: classification.variant,
            parse_failed: false,
        },
        exports,
    }
}
