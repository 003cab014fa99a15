//! Language detection by file extension.
//!
//! Dispatch is fixed: Python → the built-in tree-sitter Python grammar,
//! TS/JS/TSX → the TypeScript grammars, HCL → the HCL parser. There is no
//! generic fallback parser — an unknown extension is simply not indexed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Python,
    TypeScript,
    JavaScript,
    /// TSX/JSX — indexed with the two-pass JSX contract.
    Tsx,
    Hcl,
}

impl Language {
    pub fn from_extension(ext: Option<&str>) -> Option<Self> {
        match ext? {
            "py" | "pyi" => Some(Self::Python),
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "js" | "mjs" | "cjs" => Some(Self::JavaScript),
            "tsx" | "jsx" => Some(Self::Tsx),
            "tf" | "hcl" => Some(Self::Hcl),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Tsx => "tsx",
            Self::Hcl => "hcl",
        }
    }

    /// Whether the two-pass JSX contract applies.
    pub fn is_jsx(&self) -> bool {
        matches!(self, Self::Tsx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_map() {
        assert_eq!(Language::from_extension(Some("py")), Some(Language::Python));
        assert_eq!(Language::from_extension(Some("tsx")), Some(Language::Tsx));
        assert_eq!(Language::from_extension(Some("tf")), Some(Language::Hcl));
        assert_eq!(Language::from_extension(Some("rb")), None);
        assert_eq!(Language::from_extension(None), None);
    }
}
