//! Role Classifier
//!
//! Maps a file path to `(component id, role)` purely from naming
//! conventions: `src/counter/counter.store.ts` is the `store` role of
//! component `src/counter/counter`. No file content is read here.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::CompiledConfig;
use crate::error::ConfigError;

// ═══════════════════════════════════════════════════════════════════════════════
// ROLES
// ═══════════════════════════════════════════════════════════════════════════════

/// Structural function a file plays in its component.
///
/// Variant order is the declared role priority used to break ties between
/// equally long suffix matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Store,
    Handlers,
    View,
    Impl,
    Unknown,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Store => "store",
            Role::Handlers => "handlers",
            Role::View => "view",
            Role::Impl => "impl",
            Role::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slot a file occupies inside a component: the role plus, for
/// implementation files, the variant token (`counter.web.impl.ts` -> `web`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleKey {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl RoleKey {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            variant: None,
        }
    }
}

impl fmt::Display for RoleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}:{}", self.role, variant),
            None => write!(f, "{}", self.role),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUFFIX PATTERNS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variant,
}

/// A dotted filename suffix such as `.store` or `.*.impl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl SuffixPattern {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let body = raw
            .strip_prefix('.')
            .ok_or_else(|| ConfigError::InvalidSuffix(raw.to_string()))?;

        let mut segments = Vec::new();
        for part in body.split('.') {
            let segment = match part {
                "" => return Err(ConfigError::InvalidSuffix(raw.to_string())),
                "*" => Segment::Variant,
                literal if literal.contains('*') || literal.contains('/') => {
                    return Err(ConfigError::InvalidSuffix(raw.to_string()))
                }
                literal => Segment::Literal(literal.to_string()),
            };
            segments.push(segment);
        }

        if segments.iter().filter(|s| **s == Segment::Variant).count() > 1 {
            return Err(ConfigError::InvalidSuffix(raw.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match against the dot-separated parts of a file stem. Returns the
    /// matched byte length (dots included) and the captured variant.
    ///
    /// At least one leading part must stay unmatched so the component keeps
    /// a non-empty base name.
    fn match_parts(&self, parts: &[&str]) -> Option<(usize, Option<String>)> {
        if parts.len() <= self.segments.len() {
            return None;
        }

        let split = parts.len() - self.segments.len();
        if parts[..split].iter().all(|p| p.is_empty()) {
            return None;
        }

        let tail = &parts[split..];
        let mut matched_len = 0;
        let mut variant = None;

        for (segment, part) in self.segments.iter().zip(tail) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Variant if !part.is_empty() => variant = Some(part.to_string()),
                Segment::Variant => return None,
            }
            matched_len += part.len() + 1;
        }

        Some((matched_len, variant))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub component_id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Classification {
    pub fn key(&self) -> RoleKey {
        RoleKey {
            role: self.role,
            variant: self.variant.clone(),
        }
    }
}

/// Forward-slash form used for component ids, sorting and diagnostics.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Classify one path. Longest suffix wins; on equal length the earlier role
/// in priority order keeps the match.
pub fn classify(path: &str, config: &CompiledConfig) -> Classification {
    let normalized = normalize_path(path);
    let stem = strip_extension(&normalized, &config.extensions);

    let (dir, file_stem) = match stem.rfind('/') {
        Some(pos) => stem.split_at(pos + 1),
        None => ("", stem),
    };
    let parts: Vec<&str> = file_stem.split('.').collect();

    let mut best: Option<(Role, usize, Option<String>)> = None;
    for (role, pattern) in &config.suffixes {
        if let Some((len, variant)) = pattern.match_parts(&parts) {
            let longer = match &best {
                Some((best_role, best_len, _)) => {
                    len > *best_len || (len == *best_len && role < best_role)
                }
                None => true,
            };
            if longer {
                best = Some((*role, len, variant));
            }
        }
    }

    match best {
        Some((role, len, variant)) => Classification {
            component_id: format!("{}{}", dir, &file_stem[..file_stem.len() - len]),
            role,
            variant,
        },
        None => Classification {
            component_id: stem.to_string(),
            role: Role::Unknown,
            variant: None,
        },
    }
}

fn strip_extension<'a>(path: &'a str, extensions: &[String]) -> &'a str {
    let file_start = path.rfind('/').map(|p| p + 1).unwrap_or(0);
    if let Some(dot) = path[file_start..].rfind('.') {
        let ext = &path[file_start + dot + 1..];
        if dot > 0 && extensions.iter().any(|e| e == ext) {
            return &path[..file_start + dot];
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn config() -> CompiledConfig {
        CompiledConfig::default()
    }

    #[test]
    fn test_classify_basic_roles() {
        let c = classify("src/counter/counter.store.ts", &config());
        assert_eq!(c.component_id, "src/counter/counter");
        assert_eq!(c.role, Role::Store);

        let c = classify("src/counter/counter.handlers.ts", &config());
        assert_eq!(c.role, Role::Handlers);
        assert_eq!(c.component_id, "src/counter/counter");

        let c = classify("counter.view.tsx", &config());
        assert_eq!(c.role, Role::View);
        assert_eq!(c.component_id, "counter");
    }

    #[test]
    fn test_classify_impl_variants() {
        let plain = classify("ui/button.impl.ts", &config());
        assert_eq!(plain.role, Role::Impl);
        assert_eq!(plain.variant, None);
        assert_eq!(plain.component_id, "ui/button");

        let web = classify("ui/button.web.impl.ts", &config());
        assert_eq!(web.role, Role::Impl);
        assert_eq!(web.variant.as_deref(), Some("web"));
        assert_eq!(web.component_id, "ui/button");
        assert_eq!(web.key().to_string(), "impl:web");
    }

    #[test]
    fn test_classify_unknown_keeps_stem() {
        let c = classify("src/util/format.ts", &config());
        assert_eq!(c.role, Role::Unknown);
        assert_eq!(c.component_id, "src/util/format");
    }

    #[test]
    fn test_bare_suffix_is_not_a_component() {
        // `.store.ts` alone leaves no base name
        let c = classify("src/.store.ts", &config());
        assert_eq!(c.role, Role::Unknown);
    }

    #[test]
    fn test_windows_separators_normalized() {
        let c = classify(r"src\counter\counter.store.ts", &config());
        assert_eq!(c.component_id, "src/counter/counter");
        assert_eq!(c.role, Role::Store);
    }

    #[test]
    fn test_unlisted_extension_is_not_stripped() {
        let c = classify("counter.store.md", &config());
        assert_eq!(c.role, Role::Unknown);
        assert_eq!(c.component_id, "counter.store.md");
    }

    #[test]
    fn test_longest_suffix_wins() {
        let mut engine = EngineConfig::default();
        engine
            .role_suffixes
            .insert(Role::View, vec![".view".to_string(), ".view.store".to_string()]);
        let compiled = engine.compile().unwrap();

        let c = classify("panel.view.store.ts", &compiled);
        assert_eq!(c.role, Role::View);
        assert_eq!(c.component_id, "panel");
    }

    #[test]
    fn test_equal_length_tie_goes_to_role_priority() {
        let mut engine = EngineConfig::default();
        engine
            .role_suffixes
            .insert(Role::View, vec![".state".to_string()]);
        engine
            .role_suffixes
            .insert(Role::Store, vec![".state".to_string()]);
        let compiled = engine.compile().unwrap();

        let c = classify("panel.state.ts", &compiled);
        assert_eq!(c.role, Role::Store);
    }

    #[test]
    fn test_suffix_pattern_validation() {
        assert!(SuffixPattern::parse(".store").is_ok());
        assert!(SuffixPattern::parse(".*.impl").is_ok());
        assert!(SuffixPattern::parse("store").is_err());
        assert!(SuffixPattern::parse(".a..b").is_err());
        assert!(SuffixPattern::parse(".*.*").is_err());
        assert!(SuffixPattern::parse(".st*re").is_err());
    }
}
