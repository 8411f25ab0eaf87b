//! Cross-file reference recovery.
//!
//! Rules need two facts the export scan does not give: which members of a
//! well-known root identifier a file reads (`store.increment`, `data.title`),
//! and which keys a projection function literally returns. Both are taken
//! from the oxc AST when the file parses, and from the tolerant scanner when
//! it does not.

use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, ObjectPropertyKind, PropertyKey, StaticMemberExpression};
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::SourceType;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::extract::ExportKind;
use crate::scanner::{line_of_offset, mask_literals, split_top_level, Scanner, Unbalanced};

/// A `<root>.<member>` read, first occurrence only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberAccess {
    pub member: String,
    pub line: u32,
}

fn script_source_type() -> SourceType {
    SourceType::default()
        .with_module(true)
        .with_typescript(true)
        .with_jsx(true)
}

// ═══════════════════════════════════════════════════════════════════════════════
// MEMBER ACCESSES
// ═══════════════════════════════════════════════════════════════════════════════

struct MemberAccessCollector<'r> {
    root: &'r str,
    hits: Vec<(u32, String)>,
}

impl<'a, 'r> Visit<'a> for MemberAccessCollector<'r> {
    fn visit_static_member_expression(&mut self, expr: &StaticMemberExpression<'a>) {
        if let Expression::Identifier(ident) = &expr.object {
            if ident.name.as_str() == self.root {
                self.hits
                    .push((expr.property.span.start, expr.property.name.to_string()));
            }
        }
        oxc_ast_visit::walk::walk_static_member_expression(self, expr);
    }
}

/// Distinct members read off `root` in `text`, in source order.
pub fn collect_member_accesses(text: &str, root: &str) -> Vec<MemberAccess> {
    let hits = match collect_with_oxc(text, root) {
        Some(hits) => hits,
        None => {
            tracing::debug!(root, "script did not parse, using tolerant member scan");
            collect_with_scanner(text, root)
        }
    };
    dedupe_in_order(text, hits)
}

fn collect_with_oxc(text: &str, root: &str) -> Option<Vec<(u32, String)>> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, text, script_source_type()).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return None;
    }

    let mut collector = MemberAccessCollector {
        root,
        hits: Vec::new(),
    };
    collector.visit_program(&ret.program);
    Some(collector.hits)
}

lazy_static! {
    /// `<object>.<member>` / `<object>?.<member>` where `<object>` is not itself
    /// a member of something else.
    static ref MEMBER_ACCESS_RE: Regex =
        Regex::new(r"(?:^|[^\w$.])([A-Za-z_$][\w$]*)\s*\??\.\s*([A-Za-z_$][\w$]*)").unwrap();
}

fn collect_with_scanner(text: &str, root: &str) -> Vec<(u32, String)> {
    let masked = mask_literals(text);
    MEMBER_ACCESS_RE
        .captures_iter(&masked)
        .filter(|caps| caps.get(1).map(|m| m.as_str()) == Some(root))
        .filter_map(|caps| caps.get(2))
        .map(|m| (m.start() as u32, m.as_str().to_string()))
        .collect()
}

fn dedupe_in_order(text: &str, mut hits: Vec<(u32, String)>) -> Vec<MemberAccess> {
    hits.sort_by_key(|(offset, _)| *offset);
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|(_, member)| seen.insert(member.clone()))
        .map(|(offset, member)| MemberAccess {
            line: line_of_offset(text, offset as usize),
            member,
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROJECTION SHAPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Keys of the object literal a projection export returns, in literal order.
///
/// `None` means the shape is not a literal object (a call, a spread-only
/// value, an unparseable body) and cannot be checked.
pub fn projection_keys(kind: ExportKind, source: &str) -> Option<Vec<String>> {
    let literal = match kind {
        ExportKind::Value => object_literal_of_expression(source),
        ExportKind::Function => returned_object_literal(source),
        ExportKind::DestructuredTyped | ExportKind::ReExport => None,
    }?;
    Some(object_literal_keys(literal))
}

/// `{ ... }`, `({ ... })`, `{ ... } as const`, `{ ... } satisfies T`.
fn object_literal_of_expression(expr: &str) -> Option<&str> {
    let mut s = Scanner::new(expr);
    s.skip_trivia().ok()?;
    match s.peek()? {
        b'{' => {
            let start = s.pos();
            s.skip_balanced().ok()?;
            Some(s.slice(start, s.pos()))
        }
        b'(' => {
            let start = s.pos();
            s.skip_balanced().ok()?;
            object_literal_of_expression(s.slice(start + 1, s.pos() - 1))
        }
        _ => None,
    }
}

/// Object literal returned by a function declaration or arrow function.
fn returned_object_literal(source: &str) -> Option<&str> {
    let (group_start, group_end, arrow_before) = last_top_level_group(source).ok()??;
    let group = &source[group_start..group_end];

    if group.starts_with('(') {
        // Concise arrow body: `=> ({ ... })`
        return if arrow_before {
            object_literal_of_expression(group)
        } else {
            None
        };
    }
    if !group.starts_with('{') {
        return None;
    }

    // Block body: first `return { ... }` at the body's own depth.
    let body = &group[1..group.len() - 1];
    let mut s = Scanner::new(body);
    loop {
        s.skip_trivia().ok()?;
        if s.is_eof() {
            return None;
        }
        if s.peek_identifier() == Some("return") {
            s.read_identifier();
            s.skip_trivia().ok()?;
            return object_literal_of_expression(s.rest());
        }
        s.skip_token().ok()?;
    }
}

/// Span of the last depth-0 bracketed group and whether `=>` directly
/// precedes it.
fn last_top_level_group(source: &str) -> Result<Option<(usize, usize, bool)>, Unbalanced> {
    let mut s = Scanner::new(source);
    let mut last = None;
    let mut arrow_seen = false;
    loop {
        s.skip_trivia()?;
        let Some(b) = s.peek() else {
            break;
        };
        if s.starts_with("=>") {
            s.skip_token()?;
            s.skip_token()?;
            arrow_seen = true;
            continue;
        }
        let start = s.pos();
        s.skip_token()?;
        if matches!(b, b'(' | b'[' | b'{') {
            last = Some((start, s.pos(), arrow_seen));
        }
        arrow_seen = false;
    }
    Ok(last)
}

/// Static keys of an object literal (`{ a, "b": 1, c() {} }`). Spreads and
/// computed keys contribute nothing.
pub fn object_literal_keys(literal: &str) -> Vec<String> {
    keys_with_oxc(literal).unwrap_or_else(|| keys_with_scanner(literal))
}

fn keys_with_oxc(literal: &str) -> Option<Vec<String>> {
    let allocator = Allocator::default();
    let code = format!("({})", literal);
    let expr = Parser::new(&allocator, &code, script_source_type())
        .parse_expression()
        .ok()?;

    let mut expr = &expr;
    while let Expression::ParenthesizedExpression(paren) = expr {
        expr = &paren.expression;
    }
    let Expression::ObjectExpression(obj) = expr else {
        return None;
    };

    let mut keys = Vec::new();
    for prop in &obj.properties {
        if let ObjectPropertyKind::ObjectProperty(p) = prop {
            if p.computed {
                continue;
            }
            match &p.key {
                PropertyKey::StaticIdentifier(id) => keys.push(id.name.to_string()),
                PropertyKey::StringLiteral(s) => keys.push(s.value.to_string()),
                _ => {}
            }
        }
    }
    Some(keys)
}

fn keys_with_scanner(literal: &str) -> Vec<String> {
    let inner = literal
        .trim()
        .strip_prefix('{')
        .and_then(|l| l.strip_suffix('}'))
        .unwrap_or(literal);
    let Ok(entries) = split_top_level(inner, b',') else {
        return Vec::new();
    };

    let mut keys = Vec::new();
    for (_, entry) in entries {
        let entry = entry.trim();
        if entry.is_empty() || entry.starts_with("...") || entry.starts_with('[') {
            continue;
        }
        let mut s = Scanner::new(entry);
        let key = match s.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                let start = s.pos() + 1;
                if s.skip_token().is_err() {
                    continue;
                }
                s.slice(start, s.pos())
                    .trim_end_matches(quote as char)
                    .to_string()
            }
            _ => {
                let mut probe = s;
                let first = probe.read_identifier();
                // `get x()` / `async x()` accessors and methods
                let second = probe.skip_trivia().ok().and_then(|_| probe.read_identifier());
                match (first, second) {
                    (Some("get" | "set" | "async"), Some(name)) => name.to_string(),
                    (Some(name), _) => name.to_string(),
                    (None, _) => continue,
                }
            }
        };
        keys.push(key);
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(accesses: &[MemberAccess]) -> Vec<&str> {
        accesses.iter().map(|a| a.member.as_str()).collect()
    }

    #[test]
    fn test_member_accesses_in_order_and_deduped() {
        let src = r#"
import { store } from "./counter.store";
export const onIncrement = () => store.increment(1);
export const onReset = () => {
    store.resetCount();
    store.increment(-1);
    console.log("store.fake");
};
"#;
        let accesses = collect_member_accesses(src, "store");
        assert_eq!(members(&accesses), vec!["increment", "resetCount"]);
        assert_eq!(accesses[0].line, 3);
        assert_eq!(accesses[1].line, 5);
    }

    #[test]
    fn test_member_accesses_ignore_other_roots() {
        let src = "const x = other.store.value + mystore.a + data?.title;";
        let accesses = collect_member_accesses(src, "store");
        assert!(accesses.is_empty());

        let accesses = collect_member_accesses(src, "data");
        assert_eq!(members(&accesses), vec!["title"]);

        let src = "const s = store;\nconst { nope } = store;\ns.fake();\ndeps.store.gone();";
        assert!(collect_member_accesses(src, "store").is_empty());
    }

    #[test]
    fn test_member_accesses_fallback_on_unparseable_script() {
        // Not valid TS/JS, but still balanced.
        let src = "view {\n  title: data.title @@ data.subtitle\n  // data.ignored\n}";
        let accesses = collect_member_accesses(src, "data");
        assert_eq!(members(&accesses), vec!["title", "subtitle"]);
        assert_eq!(accesses[0].line, 2);
    }

    #[test]
    fn test_projection_keys_from_function_return() {
        let src = r#"function viewData(state: State): View {
    const helper = { notAKey: 1 };
    if (state.ready) { return { ignored: true }; }
    return {
        title: state.title,
        "resetCount": state.count,
        resetWidth,
        ...rest,
        [computed]: 1,
    };
}"#;
        let keys = projection_keys(ExportKind::Function, src).unwrap();
        assert_eq!(keys, vec!["title", "resetCount", "resetWidth"]);
    }

    #[test]
    fn test_projection_keys_from_arrow_and_value() {
        let arrow = "(s) => ({ title: s.title, count: s.count })";
        assert_eq!(
            projection_keys(ExportKind::Function, arrow).unwrap(),
            vec!["title", "count"]
        );

        let value = "{ title: \"x\", width: 3 } as const";
        assert_eq!(
            projection_keys(ExportKind::Value, value).unwrap(),
            vec!["title", "width"]
        );
    }

    #[test]
    fn test_projection_without_literal_shape() {
        assert_eq!(projection_keys(ExportKind::Value, "buildView(state)"), None);
        assert_eq!(projection_keys(ExportKind::Function, "() => compute()"), None);
        assert_eq!(projection_keys(ExportKind::ReExport, "{ a: 1 }"), None);
    }

    #[test]
    fn test_scanner_keys_fallback() {
        let keys = keys_with_scanner("{ a: 1, 'b': 2, c, get d() { return 1 }, e() {}, ...f, [g]: 3 }");
        assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);
    }
}
