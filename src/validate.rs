use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::access::{collect_member_accesses, projection_keys};
use crate::classify::Role;
use crate::config::CompiledConfig;
use crate::extract::ExportKind;
use crate::index::{ComponentIndex, SourceFile};

// ═══════════════════════════════════════════════════════════════════════════════
// INVARIANT CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const INV_PARSE_AMBIGUOUS: &str = "PARSE_AMBIGUOUS";
pub const INV_DUPLICATE_ROLE: &str = "DUPLICATE_ROLE";
pub const INV_DUPLICATE_EXPORT: &str = "DUPLICATE_EXPORT";
pub const INV_UNKNOWN_STORE_METHOD: &str = "UNKNOWN_STORE_METHOD";
pub const INV_MISSING_VIEW_FIELD: &str = "MISSING_VIEW_FIELD";
pub const INV_UNUSED_VIEW_FIELD: &str = "UNUSED_VIEW_FIELD";
pub const INV_ORPHAN_HANDLERS: &str = "ORPHAN_HANDLERS";
pub const INV_NAMING_VIOLATION: &str = "NAMING_VIOLATION";
pub const INV_STRAY_FILE: &str = "STRAY_FILE";

// ═══════════════════════════════════════════════════════════════════════════════
// CONTRACTS
// ═══════════════════════════════════════════════════════════════════════════════

fn get_contract(code: &str) -> &'static str {
    match code {
        INV_PARSE_AMBIGUOUS => "Every scanned file has balanced brackets, strings and templates.",
        INV_DUPLICATE_ROLE => "A component has at most one file per role.",
        INV_DUPLICATE_EXPORT => "A role file exports each name at most once.",
        INV_UNKNOWN_STORE_METHOD => {
            "Handlers only call store members the paired store exports."
        }
        INV_MISSING_VIEW_FIELD => {
            "The store's view projection supplies every field the view reads."
        }
        INV_UNUSED_VIEW_FIELD => "Every projected view field is read by the view.",
        INV_ORPHAN_HANDLERS => "A component with handlers also has a store.",
        INV_NAMING_VIOLATION => "Exported names follow the naming convention of their role.",
        INV_STRAY_FILE => "Every scanned file belongs to a component role.",
        _ => "Unknown contract.",
    }
}

fn default_severity(code: &str) -> Severity {
    match code {
        INV_UNUSED_VIEW_FIELD | INV_NAMING_VIOLATION | INV_STRAY_FILE => Severity::Warning,
        _ => Severity::Error,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpan {
    pub file: String,
    pub line: u32,
}

impl std::fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub component_id: String,
    pub message: String,
    pub contract: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<SourceSpan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

impl Diagnostic {
    pub fn new(code: &str, component_id: &str, message: &str) -> Self {
        Diagnostic {
            code: code.to_string(),
            severity: default_severity(code),
            component_id: component_id.to_string(),
            message: message.to_string(),
            contract: get_contract(code).to_string(),
            symbol_name: None,
            span: None,
            hints: vec![],
        }
    }

    pub fn with_symbol(mut self, name: &str) -> Self {
        self.symbol_name = Some(name.to_string());
        self
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// `file:line`, or the component id when the diagnostic has no span.
    pub fn location(&self) -> String {
        match &self.span {
            Some(span) => span.to_string(),
            None => self.component_id.clone(),
        }
    }

    fn escalated(mut self, config: &CompiledConfig) -> Self {
        if config.treat_warnings_as_errors {
            self.severity = Severity::Error;
        }
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RULES
// ═══════════════════════════════════════════════════════════════════════════════

fn usable(file: Option<&SourceFile>) -> Option<&SourceFile> {
    file.filter(|f| !f.parse_failed)
}

/// Rule 1: every `store.<name>` the handlers read is exported by the store.
fn check_store_calls(index: &ComponentIndex, config: &CompiledConfig, out: &mut Vec<Diagnostic>) {
    let (Some(store), Some(handlers)) = (
        usable(index.file(Role::Store)),
        usable(index.file(Role::Handlers)),
    ) else {
        return;
    };

    for access in collect_member_accesses(&handlers.text, &config.store_handle) {
        let symbol = index.symbol(Role::Store, &access.member);
        let resolved = matches!(
            symbol.map(|s| s.kind),
            Some(ExportKind::Function | ExportKind::Value | ExportKind::DestructuredTyped)
        );
        if resolved {
            continue;
        }

        let mut diagnostic = Diagnostic::new(
            INV_UNKNOWN_STORE_METHOD,
            &index.component_id,
            &format!(
                "`{}.{}` does not resolve to an export of `{}`.",
                config.store_handle, access.member, store.path
            ),
        )
        .with_symbol(&access.member)
        .with_span(handlers.span(access.line));

        if symbol.map(|s| s.kind) == Some(ExportKind::ReExport) {
            diagnostic = diagnostic.with_hint(format!(
                "`{}` is only re-exported; export the definition from the store itself.",
                access.member
            ));
        }
        out.push(diagnostic);
    }
}

/// Rule 2: projection keys cover every field the view reads, and nothing
/// projected goes unread.
fn check_view_fields(index: &ComponentIndex, config: &CompiledConfig, out: &mut Vec<Diagnostic>) {
    let (Some(store), Some(view)) = (
        usable(index.file(Role::Store)),
        usable(index.file(Role::View)),
    ) else {
        return;
    };

    let fields = collect_member_accesses(&view.text, &config.view_root);
    let projection = index.symbol(Role::Store, &config.projection_symbol);

    let keys: Vec<String> = match projection {
        None => Vec::new(),
        Some(symbol) => {
            let shape = symbol
                .source
                .as_deref()
                .and_then(|source| projection_keys(symbol.kind, source));
            match shape {
                Some(keys) => keys,
                None => {
                    tracing::debug!(
                        component = %index.component_id,
                        symbol = %symbol.name,
                        "projection has no literal object shape; skipping view-field check"
                    );
                    return;
                }
            }
        }
    };

    let key_set: HashSet<&str> = keys.iter().map(String::as_str).collect();
    for field in &fields {
        if key_set.contains(field.member.as_str()) {
            continue;
        }
        let mut diagnostic = Diagnostic::new(
            INV_MISSING_VIEW_FIELD,
            &index.component_id,
            &format!(
                "View reads `{}.{}` but the store projection does not supply `{}`.",
                config.view_root, field.member, field.member
            ),
        )
        .with_symbol(&field.member)
        .with_span(view.span(field.line));
        if projection.is_none() {
            diagnostic = diagnostic.with_hint(format!(
                "`{}` exports no `{}` projection.",
                store.path, config.projection_symbol
            ));
        }
        out.push(diagnostic);
    }

    let read: HashSet<&str> = fields.iter().map(|f| f.member.as_str()).collect();
    if let Some(symbol) = projection {
        for key in &keys {
            if read.contains(key.as_str()) {
                continue;
            }
            out.push(
                Diagnostic::new(
                    INV_UNUSED_VIEW_FIELD,
                    &index.component_id,
                    &format!(
                        "Projection `{}` supplies `{}` but the view never reads it.",
                        symbol.name, key
                    ),
                )
                .with_symbol(key)
                .with_span(symbol.span.clone()),
            );
        }
    }
}

/// Rule 3: handlers without a store have nothing to bind to.
fn check_orphan_handlers(index: &ComponentIndex, out: &mut Vec<Diagnostic>) {
    if index.has_role(Role::Store) {
        return;
    }
    if let Some(handlers) = index.file(Role::Handlers) {
        out.push(
            Diagnostic::new(
                INV_ORPHAN_HANDLERS,
                &index.component_id,
                &format!("`{}` has no paired store file.", handlers.path),
            )
            .with_span(handlers.span(1)),
        );
    }
}

/// Rule 4: exported names follow their role's prefix convention.
fn check_naming(index: &ComponentIndex, config: &CompiledConfig, out: &mut Vec<Diagnostic>) {
    for (key, symbols) in &index.symbols_by_role {
        let Some(convention) = config.naming.get(&key.role) else {
            continue;
        };
        for symbol in symbols {
            if key.role == Role::Store && symbol.name == config.projection_symbol {
                continue;
            }
            if convention.is_match(&symbol.name) {
                continue;
            }
            out.push(
                Diagnostic::new(
                    INV_NAMING_VIOLATION,
                    &index.component_id,
                    &format!(
                        "{} export `{}` does not match `{}`.",
                        key,
                        symbol.name,
                        convention.as_str()
                    ),
                )
                .with_symbol(&symbol.name)
                .with_span(symbol.span.clone()),
            );
        }
    }
}

/// Run every rule against one finalised component, in fixed order.
pub fn validate(index: &ComponentIndex, config: &CompiledConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    check_store_calls(index, config, &mut diagnostics);
    check_view_fields(index, config, &mut diagnostics);
    check_orphan_handlers(index, &mut diagnostics);
    check_naming(index, config, &mut diagnostics);

    diagnostics
        .into_iter()
        .map(|d| d.escalated(config))
        .collect()
}

/// Advisory for a file that no role suffix claimed.
pub fn stray_file_diagnostic(file: &SourceFile, config: &CompiledConfig) -> Diagnostic {
    Diagnostic::new(
        INV_STRAY_FILE,
        &file.component_id,
        &format!("`{}` matches no role suffix and was not indexed.", file.path),
    )
    .with_span(file.span(1))
    .escalated(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::config::EngineConfig;
    use crate::extract::extract;
    use crate::index::{build, ContractIndex, ExtractedFile};

    fn index_of(files: &[(&str, &str)], config: &CompiledConfig) -> ContractIndex {
        let extracted = files
            .iter()
            .map(|(path, text)| {
                let c = classify(path, config);
                ExtractedFile {
                    file: SourceFile {
                        path: path.to_string(),
                        text: text.to_string(),
                        component_id: c.component_id,
                        role: c.role,
                        variant: c.variant,
                        parse_failed: false,
                    },
                    exports: extract(text),
                }
            })
            .collect();
        build(extracted)
    }

    fn run(files: &[(&str, &str)]) -> Vec<Diagnostic> {
        let config = CompiledConfig::default();
        let index = index_of(files, &config);
        validate(&index.components[0], &config)
    }

    fn codes(diagnostics: &[Diagnostic]) -> Vec<&str> {
        diagnostics.iter().map(|d| d.code.as_str()).collect()
    }

    const STORE: &str = r#"
export const setCount = (n: number) => n;
export function resetCount() {}
export { helper as getLabel } from "./labels";
export function viewData() {
    return { title: "t", count: 1 };
}
"#;

    #[test]
    fn test_unknown_store_method() {
        let handlers = r#"
export const onTap = () => store.setCount(1);
export const onReset = () => {
    store.resetCount();
    store.clearAll();
    store.getLabel();
    store.clearAll();
};
"#;
        let diagnostics = run(&[("c.store.ts", STORE), ("c.handlers.ts", handlers)]);
        assert_eq!(codes(&diagnostics), vec![INV_UNKNOWN_STORE_METHOD, INV_UNKNOWN_STORE_METHOD]);
        assert_eq!(diagnostics[0].symbol_name.as_deref(), Some("clearAll"));
        assert_eq!(diagnostics[0].span.as_ref().unwrap().line, 5);
        assert_eq!(diagnostics[0].span.as_ref().unwrap().file, "c.handlers.ts");
        assert_eq!(diagnostics[1].symbol_name.as_deref(), Some("getLabel"));
        assert!(!diagnostics[1].hints.is_empty());
        assert!(diagnostics.iter().all(Diagnostic::is_error));
    }

    #[test]
    fn test_custom_store_handle() {
        let engine = EngineConfig {
            store_handle: "model".to_string(),
            ..EngineConfig::default()
        };
        let config = engine.compile().unwrap();
        let index = index_of(
            &[
                ("c.store.ts", STORE),
                ("c.handlers.ts", "export const onTap = () => { model.nope(); store.alsoNope(); };"),
            ],
            &config,
        );
        let diagnostics = validate(&index.components[0], &config);
        assert_eq!(codes(&diagnostics), vec![INV_UNKNOWN_STORE_METHOD]);
        assert_eq!(diagnostics[0].symbol_name.as_deref(), Some("nope"));
    }

    #[test]
    fn test_orphan_handlers_skip_store_resolution() {
        let diagnostics = run(&[("c.handlers.ts", "export const onTap = () => store.missing();")]);
        assert_eq!(codes(&diagnostics), vec![INV_ORPHAN_HANDLERS]);
    }

    #[test]
    fn test_view_fields_missing_and_unused() {
        let view = "export const render = () => `${data.title} ${data.width}`;";
        let diagnostics = run(&[("c.store.ts", STORE), ("c.view.ts", view)]);
        assert_eq!(codes(&diagnostics), vec![INV_MISSING_VIEW_FIELD, INV_UNUSED_VIEW_FIELD]);
        assert_eq!(diagnostics[0].symbol_name.as_deref(), Some("width"));
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(diagnostics[1].symbol_name.as_deref(), Some("count"));
        assert_eq!(diagnostics[1].severity, Severity::Warning);
        assert_eq!(diagnostics[1].span.as_ref().unwrap().file, "c.store.ts");
    }

    #[test]
    fn test_view_without_projection_misses_every_field() {
        let store = "export const setA = 1;";
        let view = "export const render = () => data.a + data.b;";
        let diagnostics = run(&[("c.store.ts", store), ("c.view.ts", view)]);
        assert_eq!(codes(&diagnostics), vec![INV_MISSING_VIEW_FIELD, INV_MISSING_VIEW_FIELD]);
        assert!(!diagnostics[0].hints.is_empty());
    }

    #[test]
    fn test_non_literal_projection_is_not_checked() {
        let store = "export const viewData = buildView();";
        let view = "export const render = () => data.anything;";
        let diagnostics = run(&[("c.store.ts", store), ("c.view.ts", view)]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_naming_conventions() {
        let store = "export const count = 0;\nexport const setCount = 1;\nexport function viewData() { return {}; }";
        let handlers = "export const tap = () => store.setCount();\nexport const onTap = () => {};";
        let diagnostics = run(&[("c.store.ts", store), ("c.handlers.ts", handlers)]);
        assert_eq!(codes(&diagnostics), vec![INV_NAMING_VIOLATION, INV_NAMING_VIOLATION]);
        assert_eq!(diagnostics[0].symbol_name.as_deref(), Some("count"));
        assert_eq!(diagnostics[1].symbol_name.as_deref(), Some("tap"));
        assert!(diagnostics.iter().all(|d| d.severity == Severity::Warning));
    }

    #[test]
    fn test_warnings_escalate_when_configured() {
        let engine = EngineConfig {
            treat_warnings_as_errors: true,
            ..EngineConfig::default()
        };
        let config = engine.compile().unwrap();
        let index = index_of(&[("c.store.ts", "export const count = 0;")], &config);
        let diagnostics = validate(&index.components[0], &config);
        assert_eq!(codes(&diagnostics), vec![INV_NAMING_VIOLATION]);
        assert_eq!(diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn test_parse_failed_store_suppresses_dependent_rules() {
        let store = "export const setA = {";
        let handlers = "export const onTap = () => store.setA();";
        let diagnostics = run(&[("c.store.ts", store), ("c.handlers.ts", handlers)]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_rules_are_total_on_lone_files() {
        assert!(run(&[("c.view.ts", "export const render = () => data.x;")]).is_empty());
        assert!(run(&[("c.web.impl.ts", "export const anything = 1;")]).is_empty());
        assert!(run(&[("c.store.ts", "")]).is_empty());
    }

    #[test]
    fn test_contract_text_attached() {
        let d = Diagnostic::new(INV_ORPHAN_HANDLERS, "c", "m");
        assert!(d.contract.contains("store"));
        assert_eq!(d.location(), "c");
        let d = d.with_span(SourceSpan {
            file: "c.handlers.ts".to_string(),
            line: 4,
        });
        assert_eq!(d.location(), "c.handlers.ts:4");
    }
}
