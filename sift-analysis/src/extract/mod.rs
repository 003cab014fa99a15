//! Language extractors and the uniform extraction payload.
//!
//! Parser priority is fixed per language — Python → tree-sitter Python,
//! TS/JS/TSX → the TypeScript grammars, HCL → the HCL parser — and there is
//! no fallback chain: a failed parse is a failed file.

pub mod args;
pub mod cfg;
pub mod hcl;
pub mod payload;
pub mod python;
pub mod typescript;

use sift_core::errors::ExtractError;

use crate::resolve::ImportResolver;
use crate::scanner::Language;
pub use payload::ExtractionPayload;
pub use typescript::JsxPass;

/// One worker's set of language extractors. Not shareable across threads;
/// each extraction worker owns its own set.
pub struct ExtractorSet {
    python: python::PythonExtractor,
    typescript: typescript::TypeScriptExtractor,
    hcl: hcl::HclExtractor,
}

impl ExtractorSet {
    pub fn new() -> Self {
        Self {
            python: python::PythonExtractor::new(),
            typescript: typescript::TypeScriptExtractor::new(),
            hcl: hcl::HclExtractor::new(),
        }
    }

    /// Extract one file in the standard (transformed) pass.
    pub fn extract(
        &mut self,
        file: &str,
        source: &str,
        language: Language,
        resolver: &ImportResolver,
    ) -> Result<ExtractionPayload, ExtractError> {
        match language {
            Language::Python => self.python.extract(file, source, resolver),
            Language::TypeScript | Language::JavaScript | Language::Tsx => self
                .typescript
                .extract(file, source, language, JsxPass::Transformed, resolver),
            Language::Hcl => self.hcl.extract(file, source),
        }
    }

    /// Extract the JSX-preserved pass. Only meaningful for JSX-bearing
    /// files; CFG is never produced here (mode guard in the extractor).
    pub fn extract_jsx_preserved(
        &mut self,
        file: &str,
        source: &str,
        language: Language,
        resolver: &ImportResolver,
    ) -> Result<ExtractionPayload, ExtractError> {
        self.typescript
            .extract(file, source, language, JsxPass::Preserved, resolver)
    }
}

impl Default for ExtractorSet {
    fn default() -> Self {
        Self::new()
    }
}
