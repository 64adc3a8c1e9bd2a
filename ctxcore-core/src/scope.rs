use serde::{Deserialize, Serialize};
use std::fmt;

/// A partition of the artifact store, each with its own TTL and quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    System,
    Instructions,
    Project,
    Task,
    Artifacts,
}

impl Scope {
    /// The directory name this scope occupies under the store root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Scope::System => "system",
            Scope::Instructions => "instructions",
            Scope::Project => "project",
            Scope::Task => "task",
            Scope::Artifacts => "artifacts",
        }
    }

    pub fn all() -> [Scope; 5] {
        [
            Scope::System,
            Scope::Instructions,
            Scope::Project,
            Scope::Task,
            Scope::Artifacts,
        ]
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Scope::System),
            "instructions" => Ok(Scope::Instructions),
            "project" => Ok(Scope::Project),
            "task" => Ok(Scope::Task),
            "artifacts" => Ok(Scope::Artifacts),
            other => Err(format!("unknown scope: {other}")),
        }
    }
}

/// Per-scope default TTL and quota, required by §3 Data Model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeConfig {
    pub default_ttl_hours: i64,
    pub max_size_mb: u64,
}

impl ScopeConfig {
    pub const fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }
}

/// The required scope configuration table from §3.
pub fn scope_config(scope: Scope) -> ScopeConfig {
    match scope {
        Scope::System => ScopeConfig {
            default_ttl_hours: 168,
            max_size_mb: 10,
        },
        Scope::Instructions => ScopeConfig {
            default_ttl_hours: 168,
            max_size_mb: 5,
        },
        Scope::Project => ScopeConfig {
            default_ttl_hours: 72,
            max_size_mb: 20,
        },
        Scope::Task => ScopeConfig {
            default_ttl_hours: 24,
            max_size_mb: 100,
        },
        Scope::Artifacts => ScopeConfig {
            default_ttl_hours: 48,
            max_size_mb: 200,
        },
    }
}

/// Sanitize a key for filesystem use (I7): every character outside
/// `[A-Za-z0-9._-]` becomes `_`. The original key is preserved separately
/// for pattern search; this function never itself rejects path traversal —
/// callers must check `is_valid_key` first, since sanitizing `..` would
/// silently mask an attempted escape rather than reject it.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// I7: reject keys containing path-traversal components or otherwise unsafe
/// shapes (empty, too long).
pub fn is_valid_key(key: &str) -> bool {
    if key.is_empty() || key.len() > 255 {
        return false;
    }
    if key.starts_with('/') {
        return false;
    }
    !key.split('/').any(|segment| segment == "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_scope_defaults() {
        assert_eq!(
            scope_config(Scope::System),
            ScopeConfig {
                default_ttl_hours: 168,
                max_size_mb: 10
            }
        );
        assert_eq!(
            scope_config(Scope::Task),
            ScopeConfig {
                default_ttl_hours: 24,
                max_size_mb: 100
            }
        );
        assert_eq!(
            scope_config(Scope::Artifacts),
            ScopeConfig {
                default_ttl_hours: 48,
                max_size_mb: 200
            }
        );
    }

    #[test]
    fn sanitize_replaces_unsafe_chars() {
        assert_eq!(sanitize_key("a/b c:d"), "a_b_c_d");
        assert_eq!(sanitize_key("Mixed-Case.123"), "Mixed-Case.123");
    }

    #[test]
    fn rejects_traversal() {
        assert!(!is_valid_key("../etc/passwd"));
        assert!(!is_valid_key("/abs/path"));
        assert!(!is_valid_key(""));
        assert!(is_valid_key("web_search_001"));
    }

    #[test]
    fn rejects_overlong_key() {
        let long = "a".repeat(256);
        assert!(!is_valid_key(&long));
        let ok = "a".repeat(255);
        assert!(is_valid_key(&ok));
    }
}
