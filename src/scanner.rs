//! Tolerant Structural Scanner
//!
//! A small state machine (code / quoted string / template literal / regex
//! literal / line comment / block comment) that walks script source and
//! balances `()`, `[]` and `{}`. It is deliberately not a grammar: callers use it to step over
//! whole tokens and bracketed groups so that a brace inside a string or a
//! template substitution never closes a pattern early.
//!
//! Scanning is byte-based. Every structural character is ASCII and UTF-8
//! continuation bytes are never ASCII, so all positions handed out are valid
//! `str` boundaries.

use std::fmt;

/// Bracket or literal balance that cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unbalanced {
    pub line: u32,
    pub message: String,
}

impl fmt::Display for Unbalanced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

pub fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

pub fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

/// Check if a string is a plain identifier (`[A-Za-z_$][A-Za-z0-9_$]*`).
pub fn is_identifier(s: &str) -> bool {
    let bytes = s.as_bytes();
    match bytes.first() {
        Some(&b) if b.is_ascii_alphabetic() || b == b'_' || b == b'$' => {}
        _ => return false,
    }
    bytes[1..]
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
}

fn closer_for(open: u8) -> Option<u8> {
    match open {
        b'(' => Some(b')'),
        b'[' => Some(b']'),
        b'{' => Some(b'}'),
        _ => None,
    }
}

fn is_closer(b: u8) -> bool {
    matches!(b, b')' | b']' | b'}')
}

/// Whether a `/` after this byte starts a regex literal rather than a
/// division. `<` is left out so JSX closing tags stay plain code.
fn regex_may_follow(b: u8) -> bool {
    matches!(
        b,
        b'(' | b',' | b'=' | b':' | b'[' | b'!' | b'&' | b'|' | b'?' | b'{' | b'}' | b';'
            | b'+' | b'-' | b'*' | b'%' | b'>' | b'~' | b'^'
    )
}

/// Keywords after which an expression (and so a regex literal) starts.
fn keyword_allows_regex(word: &str) -> bool {
    matches!(
        word,
        "return" | "typeof" | "instanceof" | "in" | "of" | "new" | "delete" | "void"
            | "throw" | "case" | "do" | "else" | "yield" | "await"
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCANNER
// ═══════════════════════════════════════════════════════════════════════════════

/// Cursor over script text. Cheap to copy, so callers can look ahead by
/// scanning a copy and discarding it.
#[derive(Debug, Clone, Copy)]
pub struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    /// A `/` at the cursor would open a regex literal.
    regex_ok: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            regex_ok: true,
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    pub fn starts_with(&self, s: &str) -> bool {
        self.bytes[self.pos.min(self.bytes.len())..].starts_with(s.as_bytes())
    }

    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.src[start..end]
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos.min(self.src.len())..]
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        if !b.is_ascii_whitespace() {
            self.regex_ok = regex_may_follow(b);
        }
        Some(b)
    }

    /// Consume `b` if it is next.
    pub fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Skip whitespace and comments. Fails only on an unterminated block comment.
    pub fn skip_trivia(&mut self) -> Result<(), Unbalanced> {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.bump();
            } else if b == b'/' && self.peek_at(1) == Some(b'/') {
                self.skip_line_comment();
            } else if b == b'/' && self.peek_at(1) == Some(b'*') {
                self.skip_block_comment()?;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Like `skip_trivia`, but reports whether a line break was crossed.
    pub fn skip_trivia_tracking_newline(&mut self) -> Result<bool, Unbalanced> {
        let line = self.line;
        self.skip_trivia()?;
        Ok(self.line != line)
    }

    fn skip_line_comment(&mut self) {
        let regex_ok = self.regex_ok;
        while let Some(b) = self.peek() {
            if b == b'\n' {
                break;
            }
            self.bump();
        }
        self.regex_ok = regex_ok;
    }

    fn skip_block_comment(&mut self) -> Result<(), Unbalanced> {
        let line = self.line;
        let regex_ok = self.regex_ok;
        self.pos += 2;
        loop {
            match self.peek() {
                None => {
                    return Err(Unbalanced {
                        line,
                        message: "unterminated block comment".to_string(),
                    })
                }
                Some(b'*') if self.peek_at(1) == Some(b'/') => {
                    self.pos += 2;
                    self.regex_ok = regex_ok;
                    return Ok(());
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    /// Read an identifier at the cursor, if any.
    pub fn read_identifier(&mut self) -> Option<&'a str> {
        let start = self.pos;
        match self.peek() {
            Some(b) if is_ident_start(b) => {}
            _ => return None,
        }
        while matches!(self.peek(), Some(b) if is_ident_continue(b)) {
            self.pos += 1;
        }
        let word = &self.src[start..self.pos];
        self.regex_ok = keyword_allows_regex(word);
        Some(word)
    }

    /// Identifier at the cursor without consuming it.
    pub fn peek_identifier(&self) -> Option<&'a str> {
        let mut probe = *self;
        probe.read_identifier()
    }

    /// Skip a quoted string starting at the cursor. A raw line break ends the
    /// string as well, so one stray apostrophe cannot swallow the file.
    fn skip_string(&mut self) {
        let Some(quote) = self.bump() else {
            return;
        };
        while let Some(b) = self.peek() {
            match b {
                b'\\' => {
                    self.bump();
                    self.bump();
                }
                b'\n' => break,
                _ if b == quote => {
                    self.bump();
                    break;
                }
                _ => {
                    self.bump();
                }
            }
        }
        self.regex_ok = false;
    }

    /// Skip a regex literal (`/.../flags`). Like a quoted string it also ends
    /// at a raw line break.
    fn skip_regex(&mut self) {
        self.bump();
        let mut in_class = false;
        while let Some(b) = self.peek() {
            match b {
                b'\\' => {
                    self.bump();
                    self.bump();
                }
                b'\n' => break,
                b'[' => {
                    in_class = true;
                    self.bump();
                }
                b']' => {
                    in_class = false;
                    self.bump();
                }
                b'/' if !in_class => {
                    self.bump();
                    while matches!(self.peek(), Some(b) if is_ident_continue(b)) {
                        self.pos += 1;
                    }
                    break;
                }
                _ => {
                    self.bump();
                }
            }
        }
        self.regex_ok = false;
    }

    /// Skip a template literal, balancing every `${ ... }` substitution.
    fn skip_template(&mut self) -> Result<(), Unbalanced> {
        let line = self.line;
        self.bump();
        loop {
            match self.peek() {
                None => {
                    return Err(Unbalanced {
                        line,
                        message: "unterminated template literal".to_string(),
                    })
                }
                Some(b'\\') => {
                    self.bump();
                    self.bump();
                }
                Some(b'`') => {
                    self.bump();
                    self.regex_ok = false;
                    return Ok(());
                }
                Some(b'$') if self.peek_at(1) == Some(b'{') => {
                    let sub_line = self.line;
                    self.pos += 2;
                    self.regex_ok = true;
                    self.balance(vec![(b'}', sub_line)])?;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    /// Skip the bracketed group opening at the cursor, through its closer.
    pub fn skip_balanced(&mut self) -> Result<(), Unbalanced> {
        let line = self.line;
        let open = self.peek().unwrap_or(b' ');
        let Some(close) = closer_for(open) else {
            return Err(Unbalanced {
                line,
                message: format!("expected an opening bracket, found '{}'", open as char),
            });
        };
        self.bump();
        self.balance(vec![(close, line)])
    }

    fn balance(&mut self, mut stack: Vec<(u8, u32)>) -> Result<(), Unbalanced> {
        while let Some(&(expected, opened_at)) = stack.last() {
            let Some(b) = self.peek() else {
                return Err(Unbalanced {
                    line: opened_at,
                    message: format!("'{}' is never closed", opener_of(expected) as char),
                });
            };
            match b {
                b'\'' | b'"' => self.skip_string(),
                b'`' => self.skip_template()?,
                b'/' if self.peek_at(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek_at(1) == Some(b'*') => self.skip_block_comment()?,
                b'/' if self.regex_ok => self.skip_regex(),
                b'(' | b'[' | b'{' => {
                    let line = self.line;
                    self.bump();
                    if let Some(close) = closer_for(b) {
                        stack.push((close, line));
                    }
                }
                b')' | b']' | b'}' => {
                    if b != expected {
                        return Err(Unbalanced {
                            line: self.line,
                            message: format!(
                                "'{}' does not close '{}' opened at line {}",
                                b as char,
                                opener_of(expected) as char,
                                opened_at
                            ),
                        });
                    }
                    self.bump();
                    stack.pop();
                }
                _ if is_ident_start(b) => {
                    self.read_identifier();
                }
                _ => {
                    self.bump();
                }
            }
        }
        Ok(())
    }

    /// Step over one unit: a literal, comment, bracketed group, identifier or
    /// single character. A closer with no opener is an error.
    pub fn skip_token(&mut self) -> Result<(), Unbalanced> {
        let Some(b) = self.peek() else {
            return Ok(());
        };
        match b {
            b'\'' | b'"' => self.skip_string(),
            b'`' => self.skip_template()?,
            b'/' if matches!(self.peek_at(1), Some(b'/') | Some(b'*')) => self.skip_trivia()?,
            b'/' if self.regex_ok => self.skip_regex(),
            b'(' | b'[' | b'{' => self.skip_balanced()?,
            _ if is_closer(b) => {
                return Err(Unbalanced {
                    line: self.line,
                    message: format!("unmatched '{}'", b as char),
                })
            }
            _ if is_ident_start(b) => {
                self.read_identifier();
            }
            _ => {
                self.bump();
            }
        }
        Ok(())
    }
}

fn opener_of(close: u8) -> u8 {
    match close {
        b')' => b'(',
        b']' => b'[',
        _ => b'{',
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Split `src` at depth-0 occurrences of `sep`, returning each piece with its
/// byte offset. Empty trailing pieces are kept so callers can see holes.
pub fn split_top_level(src: &str, sep: u8) -> Result<Vec<(usize, &str)>, Unbalanced> {
    let mut pieces = Vec::new();
    let mut scanner = Scanner::new(src);
    let mut start = 0;
    loop {
        scanner.skip_trivia()?;
        match scanner.peek() {
            None => break,
            Some(b) if b == sep => {
                pieces.push((start, &src[start..scanner.pos()]));
                scanner.bump();
                start = scanner.pos();
            }
            Some(_) => scanner.skip_token()?,
        }
    }
    pieces.push((start, &src[start..]));
    Ok(pieces)
}

/// Byte offset of the first depth-0 `=` that is an assignment (not `=>`,
/// `==`, `<=`, `>=`, `!=`).
pub fn find_top_level_assign(src: &str) -> Result<Option<usize>, Unbalanced> {
    let mut scanner = Scanner::new(src);
    loop {
        scanner.skip_trivia()?;
        match scanner.peek() {
            None => return Ok(None),
            Some(b'=') => {
                let pos = scanner.pos();
                let prev = if pos > 0 { src.as_bytes()[pos - 1] } else { b' ' };
                let next = scanner.peek_at(1);
                if matches!(next, Some(b'>') | Some(b'='))
                    || matches!(prev, b'=' | b'<' | b'>' | b'!')
                {
                    scanner.bump();
                    continue;
                }
                return Ok(Some(pos));
            }
            Some(_) => scanner.skip_token()?,
        }
    }
}

/// Replace string, template-text, regex and comment contents with spaces,
/// keeping code (including `${ }` substitutions) and line breaks in place.
pub fn mask_literals(src: &str) -> String {
    #[derive(Clone, Copy)]
    enum Ctx {
        Code(usize),
        Template,
    }

    let bytes = src.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let blank = |b: u8| if b == b'\n' { b'\n' } else { b' ' };
    let mut stack = vec![Ctx::Code(0)];
    let mut regex_ok = true;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        let top = stack.len() - 1;
        match stack[top] {
            Ctx::Template => match b {
                b'\\' => {
                    out.push(b' ');
                    if let Some(n) = next {
                        out.push(blank(n));
                    }
                    i += 2;
                }
                b'`' => {
                    stack.pop();
                    out.push(b'`');
                    regex_ok = false;
                    i += 1;
                }
                b'$' if next == Some(b'{') => {
                    stack.push(Ctx::Code(0));
                    out.extend_from_slice(b"${");
                    regex_ok = true;
                    i += 2;
                }
                _ => {
                    out.push(blank(b));
                    i += 1;
                }
            },
            Ctx::Code(depth) => match b {
                b'\'' | b'"' => {
                    out.push(b);
                    i += 1;
                    while i < bytes.len() && bytes[i] != b && bytes[i] != b'\n' {
                        if bytes[i] == b'\\' && i + 1 < bytes.len() {
                            out.push(b' ');
                            out.push(blank(bytes[i + 1]));
                            i += 2;
                            continue;
                        }
                        out.push(blank(bytes[i]));
                        i += 1;
                    }
                    if i < bytes.len() && bytes[i] == b {
                        out.push(b);
                        i += 1;
                    }
                    regex_ok = false;
                }
                b'`' => {
                    stack.push(Ctx::Template);
                    out.push(b'`');
                    i += 1;
                }
                b'/' if next == Some(b'/') => {
                    while i < bytes.len() && bytes[i] != b'\n' {
                        out.push(b' ');
                        i += 1;
                    }
                }
                b'/' if next == Some(b'*') => {
                    out.extend_from_slice(b"  ");
                    i += 2;
                    while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                        out.push(blank(bytes[i]));
                        i += 1;
                    }
                    if i < bytes.len() {
                        out.extend_from_slice(b"  ");
                        i += 2;
                    }
                }
                b'/' if regex_ok => {
                    out.push(b'/');
                    i += 1;
                    let mut in_class = false;
                    while i < bytes.len() && bytes[i] != b'\n' {
                        match bytes[i] {
                            b'\\' if i + 1 < bytes.len() => {
                                out.push(b' ');
                                out.push(blank(bytes[i + 1]));
                                i += 2;
                                continue;
                            }
                            b'[' => in_class = true,
                            b']' => in_class = false,
                            b'/' if !in_class => break,
                            _ => {}
                        }
                        out.push(blank(bytes[i]));
                        i += 1;
                    }
                    if i < bytes.len() && bytes[i] == b'/' {
                        out.push(b'/');
                        i += 1;
                    }
                    regex_ok = false;
                }
                b'{' => {
                    stack[top] = Ctx::Code(depth + 1);
                    out.push(b);
                    regex_ok = true;
                    i += 1;
                }
                b'}' => {
                    if depth == 0 && stack.len() > 1 {
                        stack.pop();
                    } else {
                        stack[top] = Ctx::Code(depth.saturating_sub(1));
                    }
                    out.push(b);
                    regex_ok = true;
                    i += 1;
                }
                _ if is_ident_start(b) => {
                    let start = i;
                    while i < bytes.len() && is_ident_continue(bytes[i]) {
                        i += 1;
                    }
                    out.extend_from_slice(&bytes[start..i]);
                    regex_ok = keyword_allows_regex(&src[start..i]);
                }
                _ => {
                    out.push(b);
                    if !b.is_ascii_whitespace() {
                        regex_ok = regex_may_follow(b);
                    }
                    i += 1;
                }
            },
        }
    }

    // Only ASCII bytes were replaced, and always whole multi-byte sequences
    // inside literals, so the buffer is still UTF-8.
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// 1-based line of a byte offset.
pub fn line_of_offset(src: &str, offset: usize) -> u32 {
    let end = offset.min(src.len());
    src.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_balance(src: &str) -> Result<(), Unbalanced> {
        let mut scanner = Scanner::new(src);
        loop {
            scanner.skip_trivia()?;
            if scanner.is_eof() {
                return Ok(());
            }
            scanner.skip_token()?;
        }
    }

    #[test]
    fn test_skip_balanced_simple() {
        let mut s = Scanner::new("{a + b} rest");
        s.skip_balanced().unwrap();
        assert_eq!(s.pos(), 7);
        assert_eq!(s.rest(), " rest");
    }

    #[test]
    fn test_brace_inside_string_does_not_close() {
        let mut s = Scanner::new("{ key: '}', other: \"{\" } tail");
        s.skip_balanced().unwrap();
        assert_eq!(s.rest(), " tail");
    }

    #[test]
    fn test_nested_template_substitutions() {
        let src = "{ a: `x ${ `y ${ {z: 1}.z }` } }` } tail";
        let mut s = Scanner::new(src);
        s.skip_balanced().unwrap();
        assert_eq!(s.rest(), " tail");
    }

    #[test]
    fn test_comments_are_skipped() {
        let src = "( /* ) */ a, // )\n b ) tail";
        let mut s = Scanner::new(src);
        s.skip_balanced().unwrap();
        assert_eq!(s.rest(), " tail");
        assert_eq!(s.line(), 2);
    }

    #[test]
    fn test_mismatched_closer_is_unbalanced() {
        let err = Scanner::new("(\n a ]").skip_balanced().unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("does not close"));
    }

    #[test]
    fn test_unclosed_reports_opening_line() {
        let err = check_balance("const a = 1;\nfunction f() {\n  return [1, 2;\n").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_unterminated_template_is_unbalanced() {
        let err = check_balance("const a = `abc ${x}").unwrap_err();
        assert!(err.message.contains("template"));
    }

    #[test]
    fn test_stray_closer_at_top_level() {
        let err = check_balance("a();\n}\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_apostrophe_stops_at_line_end() {
        assert!(check_balance("const a = 'don\nconst b = { c: 1 };").is_ok());
    }

    #[test]
    fn test_regex_literal_brackets_do_not_count() {
        assert!(check_balance("export const isValid = (s) => /^[^}]+$/.test(s);\n").is_ok());
        assert!(check_balance("function f(a) {\n  return /[)\\]}]/.test(a);\n}").is_ok());
        assert!(check_balance("const r = /[/(]{2}\\//gi; f(r);").is_ok());
    }

    #[test]
    fn test_division_is_not_a_regex() {
        assert!(check_balance("const q = total / count; const o = [c / d];").is_ok());
        assert!(check_balance("const w = (a + b) / 2 / (c[0] / d);").is_ok());
    }

    #[test]
    fn test_regex_literal_advances_past_flags() {
        let mut s = Scanner::new("( x = /}/gu ) tail");
        s.skip_balanced().unwrap();
        assert_eq!(s.rest(), " tail");
    }

    #[test]
    fn test_split_top_level() {
        let parts = split_top_level("a, b: { c, d }, ...rest", b',').unwrap();
        let texts: Vec<&str> = parts.iter().map(|(_, p)| p.trim()).collect();
        assert_eq!(texts, vec!["a", "b: { c, d }", "...rest"]);
        assert_eq!(parts[1].0, 2);
    }

    #[test]
    fn test_find_top_level_assign_skips_arrows() {
        let src = "{ on: (e: Event) => void } = bag";
        let pos = find_top_level_assign(src).unwrap().unwrap();
        assert_eq!(&src[pos..], "= bag");
        assert_eq!(find_top_level_assign("a == b").unwrap(), None);
    }

    #[test]
    fn test_mask_literals_keeps_substitutions() {
        let src = "a('store.x'); // store.y\nb(`t ${store.z}`);";
        let masked = mask_literals(src);
        assert_eq!(masked.len(), src.len());
        assert!(!masked.contains("store.x"));
        assert!(!masked.contains("store.y"));
        assert!(masked.contains("store.z"));
        assert_eq!(masked.lines().count(), 2);
    }

    #[test]
    fn test_mask_literals_blanks_regex_bodies() {
        let src = "const re = /store.y[/]/g; if (ok) return store.z / 2;";
        let masked = mask_literals(src);
        assert_eq!(masked.len(), src.len());
        assert!(!masked.contains("store.y"));
        assert!(masked.contains("store.z / 2"));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("store"));
        assert!(is_identifier("$data_1"));
        assert!(!is_identifier("1data"));
        assert!(!is_identifier("my store"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_line_of_offset() {
        let src = "a\nb\nc";
        assert_eq!(line_of_offset(src, 0), 1);
        assert_eq!(line_of_offset(src, 2), 2);
        assert_eq!(line_of_offset(src, 4), 3);
    }
}
