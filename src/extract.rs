//! Symbol Extractor
//!
//! Single pass over a script file that recovers its top-level exports without
//! a grammar. Four shapes are recognised:
//!
//! 1. `export const name = expr` (also `let` / `var`, several declarators)
//! 2. `export function name(...) { ... }` (also `async`, generators)
//! 3. `export const { key: alias, ... }: Type = expr` and array patterns
//! 4. `export { name }`, `export { name as alias } from "./module"`
//!
//! Anything else is stepped over with the balancing scanner. The only
//! failure is a file whose brackets or literals never balance.

use serde::{Deserialize, Serialize};

use crate::scanner::{find_top_level_assign, split_top_level, Scanner, Unbalanced};

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportKind {
    Function,
    Value,
    DestructuredTyped,
    ReExport,
}

impl ExportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportKind::Function => "function",
            ExportKind::Value => "value",
            ExportKind::DestructuredTyped => "destructured-typed",
            ExportKind::ReExport => "re-export",
        }
    }
}

/// One exported binding as found in the text, before it is attached to a
/// component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExport {
    pub name: String,
    pub kind: ExportKind,
    pub line: u32,
    /// Initializer / destructuring source expression, or the whole function
    /// text for function declarations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Local name a re-export points at (unresolved).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Module specifier of `export { .. } from "..."`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl RawExport {
    fn new(name: &str, kind: ExportKind, line: u32) -> Self {
        Self {
            name: name.to_string(),
            kind,
            line,
            source: None,
            target: None,
            from: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Extract every recognised top-level export from `text`, in source order.
pub fn extract(text: &str) -> Result<Vec<RawExport>, Unbalanced> {
    let mut scanner = Scanner::new(text);
    let mut exports = Vec::new();
    // Last significant byte, so `module.export` is not taken for a keyword.
    let mut prev = b';';

    loop {
        scanner.skip_trivia()?;
        let Some(b) = scanner.peek() else {
            break;
        };

        if scanner.peek_identifier() == Some("export") && prev != b'.' {
            scanner.read_identifier();
            parse_export(&mut scanner, &mut exports)?;
            prev = b';';
            continue;
        }

        scanner.skip_token()?;
        prev = b;
    }

    Ok(exports)
}

fn parse_export(s: &mut Scanner<'_>, out: &mut Vec<RawExport>) -> Result<(), Unbalanced> {
    s.skip_trivia()?;
    if s.peek() == Some(b'{') {
        return parse_reexport(s, out);
    }

    let keyword_start = s.pos();
    match s.peek_identifier() {
        Some("const") | Some("let") | Some("var") => {
            s.read_identifier();
            parse_declarators(s, out)
        }
        Some("function") => {
            s.read_identifier();
            parse_function(s, keyword_start, out)
        }
        Some("async") => {
            let mut probe = *s;
            probe.read_identifier();
            probe.skip_trivia()?;
            if probe.peek_identifier() == Some("function") {
                probe.read_identifier();
                *s = probe;
                parse_function(s, keyword_start, out)
            } else {
                Ok(())
            }
        }
        // default / class / type / interface / enum / declare / `*`:
        // left to the caller's generic scan.
        _ => Ok(()),
    }
}

/// `export { a, b as c } [from "m"]`
fn parse_reexport(s: &mut Scanner<'_>, out: &mut Vec<RawExport>) -> Result<(), Unbalanced> {
    let open = s.pos();
    let line = s.line();
    s.skip_balanced()?;
    let body = s.slice(open + 1, s.pos() - 1);

    let mut found = Vec::new();
    for (offset, item) in split_top_level(body, b',')? {
        let words: Vec<&str> = item.split_whitespace().collect();
        let (local, exported) = match words.as_slice() {
            [] => continue,
            ["type", ..] => continue,
            [name] => (*name, *name),
            [name, "as", alias] => (*name, *alias),
            _ => continue,
        };
        let item_line = line + count_newlines(&body[..offset + leading_ws(item)]);
        let mut export = RawExport::new(exported, ExportKind::ReExport, item_line);
        export.target = Some(local.to_string());
        found.push(export);
    }

    let mut probe = *s;
    probe.skip_trivia()?;
    if probe.peek_identifier() == Some("from") {
        probe.read_identifier();
        probe.skip_trivia()?;
        if let Some(quote @ (b'"' | b'\'')) = probe.peek() {
            let start = probe.pos() + 1;
            probe.skip_token()?;
            // An unterminated specifier stops at the line break, not a quote.
            let literal = probe.slice(start, probe.pos());
            let module = literal.strip_suffix(quote as char).unwrap_or(literal);
            for export in &mut found {
                export.from = Some(module.to_string());
            }
            *s = probe;
        }
    }

    out.extend(found);
    Ok(())
}

/// `function name(...) { ... }` after the `function` keyword.
fn parse_function(
    s: &mut Scanner<'_>,
    text_start: usize,
    out: &mut Vec<RawExport>,
) -> Result<(), Unbalanced> {
    s.skip_trivia()?;
    s.eat(b'*');
    s.skip_trivia()?;
    let line = s.line();
    let Some(name) = s.read_identifier() else {
        return Ok(());
    };

    s.skip_trivia()?;
    if s.peek() == Some(b'<') {
        skip_type_parameters(s)?;
        s.skip_trivia()?;
    }
    if s.peek() != Some(b'(') {
        return Ok(());
    }
    s.skip_balanced()?;
    s.skip_trivia()?;

    if s.eat(b':') {
        // Return type; an object type literal is itself a brace group.
        s.skip_trivia()?;
        if s.peek() == Some(b'{') {
            s.skip_balanced()?;
        }
        loop {
            s.skip_trivia()?;
            match s.peek() {
                None | Some(b'{') | Some(b';') => break,
                Some(_) => s.skip_token()?,
            }
        }
    }

    // Overload signatures have no body and export nothing on their own.
    if s.peek() != Some(b'{') {
        return Ok(());
    }
    s.skip_balanced()?;

    let mut export = RawExport::new(name, ExportKind::Function, line);
    export.source = Some(s.slice(text_start, s.pos()).to_string());
    out.push(export);
    Ok(())
}

/// Declarator list after `const` / `let` / `var`.
fn parse_declarators(s: &mut Scanner<'_>, out: &mut Vec<RawExport>) -> Result<(), Unbalanced> {
    loop {
        s.skip_trivia()?;
        match s.peek() {
            Some(b'{') | Some(b'[') => parse_destructuring(s, out)?,
            Some(_) => {
                let line = s.line();
                let Some(name) = s.read_identifier() else {
                    return Ok(());
                };
                s.skip_trivia()?;
                s.eat(b'!');
                s.skip_trivia()?;
                if s.eat(b':') {
                    skip_type_annotation(s)?;
                }
                s.skip_trivia()?;

                let mut export = RawExport::new(name, ExportKind::Value, line);
                if s.peek() == Some(b'=') && s.peek_at(1) != Some(b'=') {
                    s.eat(b'=');
                    let expr = read_expression(s)?;
                    if is_function_expression(expr) {
                        export.kind = ExportKind::Function;
                    }
                    export.source = Some(expr.to_string());
                }
                out.push(export);
            }
            None => return Ok(()),
        }

        s.skip_trivia()?;
        if !s.eat(b',') {
            return Ok(());
        }
    }
}

/// `{ a: b, c }: Type = expr` or `[a, , b]: Type = expr`.
fn parse_destructuring(s: &mut Scanner<'_>, out: &mut Vec<RawExport>) -> Result<(), Unbalanced> {
    let open = s.pos();
    let line = s.line();
    let is_object = s.peek() == Some(b'{');
    s.skip_balanced()?;
    let pattern = s.slice(open + 1, s.pos() - 1);

    s.skip_trivia()?;
    let typed = s.eat(b':');
    if typed {
        skip_type_annotation(s)?;
        s.skip_trivia()?;
    }

    let source = if s.peek() == Some(b'=') {
        s.eat(b'=');
        Some(read_expression(s)?.to_string())
    } else {
        None
    };

    let kind = if typed {
        ExportKind::DestructuredTyped
    } else {
        ExportKind::Value
    };

    let mut bindings = Vec::new();
    collect_pattern_bindings(pattern, is_object, line, &mut bindings)?;
    for (name, name_line) in bindings {
        let mut export = RawExport::new(&name, kind, name_line);
        export.source = source.clone();
        out.push(export);
    }
    Ok(())
}

/// Collect bound names (with lines) of a destructuring pattern body.
fn collect_pattern_bindings(
    pattern: &str,
    is_object: bool,
    base_line: u32,
    out: &mut Vec<(String, u32)>,
) -> Result<(), Unbalanced> {
    for (offset, item) in split_top_level(pattern, b',')? {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        let item_start = offset + leading_ws(item);
        let item_line = base_line + count_newlines(&pattern[..item_start]);

        if let Some(rest) = trimmed.strip_prefix("...") {
            push_binding(rest, item_line, out);
            continue;
        }

        // The default goes first: it may hold a `?:` whose colon is not a rename.
        let binding = match find_top_level_assign(trimmed)? {
            Some(eq) => &trimmed[..eq],
            None => trimmed,
        };

        // Object entries may rename (`key: target`); the target is what binds.
        let (target, target_offset) = if is_object {
            match split_top_level(binding, b':')?.as_slice() {
                [_key, (value_offset, value), ..] => (*value, *value_offset),
                _ => (binding, 0),
            }
        } else {
            (binding, 0)
        };

        let target_start = leading_ws(target);
        let target_line = item_line + count_newlines(&trimmed[..target_offset + target_start]);
        let target = target.trim();

        if let Some((inner, inner_is_object)) = nested_pattern(target) {
            collect_pattern_bindings(inner, inner_is_object, target_line, out)?;
        } else {
            push_binding(target, target_line, out);
        }
    }
    Ok(())
}

/// Body of a nested `{ ... }` / `[ ... ]` pattern. A missing closer (cut off
/// by a parse tolerance) leaves the rest of the text as the body.
fn nested_pattern(target: &str) -> Option<(&str, bool)> {
    let (body, close, is_object) = if let Some(body) = target.strip_prefix('{') {
        (body, '}', true)
    } else if let Some(body) = target.strip_prefix('[') {
        (body, ']', false)
    } else {
        return None;
    };
    Some((body.strip_suffix(close).unwrap_or(body), is_object))
}

fn push_binding(name: &str, line: u32, out: &mut Vec<(String, u32)>) {
    let name = name.trim();
    if crate::scanner::is_identifier(name) {
        out.push((name.to_string(), line));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SKIPPING HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Skip a type annotation up to the `=`, `,` or `;` that ends it. Angle
/// brackets are tracked so `Record<string, T>` does not end at its comma.
fn skip_type_annotation(s: &mut Scanner<'_>) -> Result<(), Unbalanced> {
    let mut angle = 0usize;
    loop {
        s.skip_trivia()?;
        match s.peek() {
            None => return Ok(()),
            Some(b'<') => {
                angle += 1;
                s.eat(b'<');
            }
            Some(b'>') => {
                angle = angle.saturating_sub(1);
                s.eat(b'>');
            }
            Some(b'=') if s.peek_at(1) == Some(b'>') => {
                s.eat(b'=');
                s.eat(b'>');
            }
            Some(b'=') | Some(b';') | Some(b',') if angle == 0 => return Ok(()),
            Some(b')') | Some(b']') | Some(b'}') if angle == 0 => return Ok(()),
            Some(_) => s.skip_token()?,
        }
    }
}

fn skip_type_parameters(s: &mut Scanner<'_>) -> Result<(), Unbalanced> {
    let mut angle = 0usize;
    loop {
        s.skip_trivia()?;
        match s.peek() {
            None => return Ok(()),
            Some(b'<') => {
                angle += 1;
                s.eat(b'<');
            }
            Some(b'>') => {
                s.eat(b'>');
                angle = angle.saturating_sub(1);
                if angle == 0 {
                    return Ok(());
                }
            }
            Some(b'=') if s.peek_at(1) == Some(b'>') => {
                s.eat(b'=');
                s.eat(b'>');
            }
            Some(_) => s.skip_token()?,
        }
    }
}

/// Read an initializer expression. It ends at a depth-0 `,` or `;`, at end of
/// input, or at a line break where the expression cannot continue.
fn read_expression<'a>(s: &mut Scanner<'a>) -> Result<&'a str, Unbalanced> {
    s.skip_trivia()?;
    let start = s.pos();
    let mut end = start;
    let mut last = b'=';

    loop {
        let mut probe = *s;
        let crossed_line = probe.skip_trivia_tracking_newline()?;
        let Some(next) = probe.peek() else {
            *s = probe;
            break;
        };
        if next == b',' || next == b';' || matches!(next, b')' | b']' | b'}') {
            break;
        }
        if crossed_line && !continues_expression(last, next, probe.peek_identifier()) {
            break;
        }

        *s = probe;
        s.skip_token()?;
        end = s.pos();
        last = s.slice(start, end).as_bytes().last().copied().unwrap_or(next);
        if crate::scanner::is_ident_continue(last) {
            last = b'a';
        }
    }

    Ok(s.slice(start, end).trim())
}

/// Whether a line break between `last` and `next` keeps the expression going.
fn continues_expression(last: u8, next: u8, next_word: Option<&str>) -> bool {
    const TRAILING: &[u8] = b"=+-*/%&|^!?:,.<>([{~";
    const LEADING: &[u8] = b".?:+-*/%&|^=<>([`";
    if TRAILING.contains(&last) || LEADING.contains(&next) {
        return true;
    }
    matches!(
        next_word,
        Some("as") | Some("satisfies") | Some("instanceof") | Some("in")
    )
}

/// `function ...`, `async ...`, `x => ...`, `(a, b): T => ...`, `<T>(a) => ...`
pub fn is_function_expression(expr: &str) -> bool {
    let mut s = Scanner::new(expr);
    if s.skip_trivia().is_err() {
        return false;
    }
    if s.peek_identifier() == Some("async") {
        let mut probe = s;
        probe.read_identifier();
        if probe.skip_trivia().is_ok() && !probe.is_eof() && probe.peek() != Some(b'=') {
            s = probe;
        }
    }
    if s.peek_identifier() == Some("function") {
        return true;
    }

    let check = || -> Result<bool, Unbalanced> {
        let mut s = s;
        if s.read_identifier().is_some() {
            s.skip_trivia()?;
            return Ok(s.starts_with("=>"));
        }
        if s.peek() == Some(b'<') {
            skip_type_parameters(&mut s)?;
            s.skip_trivia()?;
        }
        if s.peek() != Some(b'(') {
            return Ok(false);
        }
        s.skip_balanced()?;
        s.skip_trivia()?;
        if s.eat(b':') {
            loop {
                s.skip_trivia()?;
                if s.is_eof() || s.starts_with("=>") {
                    break;
                }
                s.skip_token()?;
            }
        }
        Ok(s.starts_with("=>"))
    };
    check().unwrap_or(false)
}

fn count_newlines(s: &str) -> u32 {
    s.bytes().filter(|&b| b == b'\n').count() as u32
}

fn leading_ws(s: &str) -> usize {
    s.len() - s.trim_start().len()
}
