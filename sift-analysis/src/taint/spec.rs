//! Source and sink declarations.
//!
//! Data-driven: the default set covers the supported web stacks, and a
//! deployment can replace it wholesale from JSON. Nothing in the engine
//! matches on hard-coded names outside this table.

use serde::{Deserialize, Serialize};

use super::access_path::AccessPath;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePattern {
    /// Dotted access-path pattern (`req.body`, `request.args`).
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkPattern {
    /// Callee to match: the full dotted callee, or a bare method name
    /// matched against the final segment when `match_method` is set.
    pub callee: String,
    #[serde(default)]
    pub match_method: bool,
    pub sink_type: String,
    pub vulnerability_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaintSpec {
    pub sources: Vec<SourcePattern>,
    pub sinks: Vec<SinkPattern>,
    /// Assignment-target property names treated as DOM XSS sinks
    /// (`el.innerHTML = …`, `dangerouslySetInnerHTML={{ __html: … }}`).
    #[serde(default = "default_dom_sinks")]
    pub dom_sinks: Vec<String>,
}

fn default_dom_sinks() -> Vec<String> {
    vec![
        "innerHTML".to_string(),
        "dangerouslySetInnerHTML".to_string(),
    ]
}

impl TaintSpec {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// First source pattern the given access path refines: the observed
    /// path must be at least as specific as the pattern, so bare `req`
    /// never reports as a `req.body` source.
    pub fn match_source(&self, path: &AccessPath, k: usize) -> Option<&SourcePattern> {
        self.sources.iter().find(|s| {
            AccessPath::parse(&s.pattern, k)
                .map(|p| path.has_prefix(&p))
                .unwrap_or(false)
        })
    }

    /// Sink pattern for a callee, if any.
    pub fn match_sink(&self, callee: &str) -> Option<&SinkPattern> {
        let method = callee.rsplit('.').next().unwrap_or(callee);
        self.sinks.iter().find(|s| {
            if s.match_method {
                method == s.callee
            } else {
                callee == s.callee
            }
        })
    }

    /// Whether an assignment target writes into a declared DOM sink.
    pub fn is_dom_sink_target(&self, target: &str) -> bool {
        self.dom_sinks
            .iter()
            .any(|name| target.ends_with(&format!(".{name}")))
    }
}

impl Default for TaintSpec {
    fn default() -> Self {
        let source = |pattern: &str| SourcePattern {
            pattern: pattern.to_string(),
        };
        let sink = |callee: &str, match_method: bool, sink_type: &str, vuln: &str| SinkPattern {
            callee: callee.to_string(),
            match_method,
            sink_type: sink_type.to_string(),
            vulnerability_type: vuln.to_string(),
        };
        Self {
            sources: vec![
                // Express / Node.
                source("req.body"),
                source("req.params"),
                source("req.query"),
                source("req.headers"),
                source("req.cookies"),
                // Browser.
                source("localStorage"),
                source("sessionStorage"),
                source("URLSearchParams"),
                // Python web.
                source("request.args"),
                source("request.json"),
                source("request.form"),
                source("request.files"),
                source("request.data"),
                source("request.GET"),
                source("request.POST"),
                // Untrusted process environment.
                source("process.env"),
            ],
            sinks: vec![
                // SQL execution.
                sink("query", true, "sql", "sql_injection"),
                sink("execute", true, "sql", "sql_injection"),
                sink("raw", true, "sql", "sql_injection"),
                // Command execution.
                sink("exec", true, "command", "command_injection"),
                sink("execSync", true, "command", "command_injection"),
                sink("spawn", true, "command", "command_injection"),
                sink("os.system", false, "command", "command_injection"),
                sink("subprocess.run", false, "command", "command_injection"),
                sink("subprocess.call", false, "command", "command_injection"),
                sink("subprocess.Popen", false, "command", "command_injection"),
                // Code evaluation / DOM XSS.
                sink("eval", false, "eval", "code_injection"),
                sink("Function", false, "eval", "code_injection"),
                // Response bodies.
                sink("res.send", false, "response", "xss"),
                sink("res.write", false, "response", "xss"),
                // Filesystem writes.
                sink("fs.writeFile", false, "filesystem", "path_traversal"),
                sink("fs.writeFileSync", false, "filesystem", "path_traversal"),
                sink("fs.createWriteStream", false, "filesystem", "path_traversal"),
                // Template rendering with unsafe HTML.
                sink("render_template_string", false, "template", "ssti"),
            ],
            dom_sinks: default_dom_sinks(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sources_match_prefixes() {
        let spec = TaintSpec::default();
        let path = AccessPath::parse("req.body.user.id", 5).unwrap();
        assert!(spec.match_source(&path, 5).is_some());
        let other = AccessPath::parse("res.locals", 5).unwrap();
        assert!(spec.match_source(&other, 5).is_none());
    }

    #[test]
    fn sink_method_suffix_matching() {
        let spec = TaintSpec::default();
        assert_eq!(spec.match_sink("db.query").unwrap().sink_type, "sql");
        assert_eq!(spec.match_sink("cursor.execute").unwrap().sink_type, "sql");
        assert_eq!(
            spec.match_sink("subprocess.run").unwrap().sink_type,
            "command"
        );
        assert!(spec.match_sink("console.log").is_none());
    }

    #[test]
    fn dom_sink_targets_match_by_property() {
        let spec = TaintSpec::default();
        assert!(spec.is_dom_sink_target("el.innerHTML"));
        assert!(spec.is_dom_sink_target("div.dangerouslySetInnerHTML"));
        assert!(!spec.is_dom_sink_target("el.textContent"));
        // Bare names without a receiver are not sink writes.
        assert!(!spec.is_dom_sink_target("innerHTML"));
    }

    #[test]
    fn spec_loads_from_json() {
        let json = r#"{
            "sources": [{"pattern": "req.body"}],
            "sinks": [{"callee": "query", "match_method": true,
                       "sink_type": "sql", "vulnerability_type": "sql_injection"}]
        }"#;
        let spec = TaintSpec::from_json(json).unwrap();
        assert_eq!(spec.sources.len(), 1);
        assert!(spec.match_sink("db.query").is_some());
        // Omitted dom_sinks falls back to the default set.
        assert!(spec.is_dom_sink_target("el.dangerouslySetInnerHTML"));
    }
}
