//! Flow deduplication.
//!
//! Paths dedupe on `(source_file, source_line, source_var_root, sink_file,
//! sink_line, sink_function)`. A group is SANITIZED only when every
//! contributing path is sanitized; one vulnerable path makes the group
//! VULNERABLE. Variant counts survive the merge.

use sift_core::FxHashMap;

use super::reconstruct::PathHop;
use super::sanitize::SanitizerInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    Vulnerable,
    Sanitized,
}

impl FlowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vulnerable => "VULNERABLE",
            Self::Sanitized => "SANITIZED",
        }
    }
}

/// One reconstructed, classified flow (pre-dedup).
#[derive(Debug, Clone)]
pub struct ResolvedFlow {
    pub source_file: String,
    pub source_line: i64,
    pub source_variable: String,
    pub sink_file: String,
    pub sink_line: i64,
    pub sink_function: String,
    pub sink_type: String,
    pub vulnerability_type: String,
    pub status: FlowStatus,
    pub hops: Vec<PathHop>,
    pub sanitizer: Option<SanitizerInfo>,
}

impl ResolvedFlow {
    fn dedup_key(&self) -> (String, i64, String, String, i64, String) {
        let root = self
            .source_variable
            .split('.')
            .next()
            .unwrap_or(&self.source_variable)
            .to_string();
        (
            self.source_file.clone(),
            self.source_line,
            root,
            self.sink_file.clone(),
            self.sink_line,
            self.sink_function.clone(),
        )
    }
}

/// A dedup group ready for the audit writer.
#[derive(Debug, Clone)]
pub struct FlowGroup {
    pub flow: ResolvedFlow,
    pub source_variants: usize,
    pub sanitizer_variants: usize,
}

/// Collapse flows into dedup groups. In shortest mode the group keeps its
/// shortest path; in all mode every contributing path stays its own row.
/// Ordered by `(source_file, source_line, sink_file, sink_line)` so two
/// identical runs emit identical audit sets.
pub fn dedup(flows: Vec<ResolvedFlow>, mode: sift_core::config::DedupMode) -> Vec<FlowGroup> {
    if mode == sift_core::config::DedupMode::All {
        let mut out: Vec<FlowGroup> = flows
            .into_iter()
            .map(|flow| FlowGroup {
                source_variants: 1,
                sanitizer_variants: usize::from(flow.sanitizer.is_some()),
                flow,
            })
            .collect();
        sort_groups(&mut out);
        return out;
    }

    let mut groups: FxHashMap<(String, i64, String, String, i64, String), FlowGroup> =
        FxHashMap::default();

    for flow in flows {
        let key = flow.dedup_key();
        match groups.get_mut(&key) {
            None => {
                groups.insert(
                    key,
                    FlowGroup {
                        source_variants: 1,
                        sanitizer_variants: usize::from(flow.sanitizer.is_some()),
                        flow,
                    },
                );
            }
            Some(group) => {
                group.source_variants += 1;
                if flow.sanitizer.is_some() {
                    group.sanitizer_variants += 1;
                }
                // Any vulnerable path poisons the group.
                if flow.status == FlowStatus::Vulnerable {
                    group.flow.status = FlowStatus::Vulnerable;
                }
                if group.flow.sanitizer.is_none() {
                    group.flow.sanitizer = flow.sanitizer.clone();
                }
                // Shortest path wins the presentation slot.
                if flow.hops.len() < group.flow.hops.len() {
                    let status = group.flow.status;
                    let sanitizer = group.flow.sanitizer.clone();
                    group.flow = flow;
                    group.flow.status = status;
                    if group.flow.sanitizer.is_none() {
                        group.flow.sanitizer = sanitizer;
                    }
                }
            }
        }
    }

    let mut out: Vec<FlowGroup> = groups.into_values().collect();
    sort_groups(&mut out);
    out
}

fn sort_groups(groups: &mut [FlowGroup]) {
    groups.sort_by(|a, b| {
        (
            &a.flow.source_file,
            a.flow.source_line,
            &a.flow.sink_file,
            a.flow.sink_line,
        )
            .cmp(&(
                &b.flow.source_file,
                b.flow.source_line,
                &b.flow.sink_file,
                b.flow.sink_line,
            ))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(source_var: &str, status: FlowStatus, hop_count: usize) -> ResolvedFlow {
        ResolvedFlow {
            source_file: "c.ts".to_string(),
            source_line: 3,
            source_variable: source_var.to_string(),
            sink_file: "s.ts".to_string(),
            sink_line: 9,
            sink_function: "UserService.createUser".to_string(),
            sink_type: "orm".to_string(),
            vulnerability_type: "sql_injection".to_string(),
            status,
            hops: vec![
                PathHop {
                    hop_type: "assignment".to_string(),
                    from_file: "c.ts".to_string(),
                    from_function: None,
                    from_variable: None,
                    to_file: "c.ts".to_string(),
                    to_function: None,
                    to_variable: None,
                    line: None,
                };
                hop_count
            ],
            sanitizer: None,
        }
    }

    #[test]
    fn same_root_variable_collapses() {
        let groups = dedup(
            vec![
                flow("req.body", FlowStatus::Vulnerable, 3),
                flow("req.body.user", FlowStatus::Vulnerable, 2),
            ],
            sift_core::config::DedupMode::Shortest,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].source_variants, 2);
        // Shortest path kept.
        assert_eq!(groups[0].flow.hops.len(), 2);
    }

    #[test]
    fn all_mode_enumerates_every_path() {
        let groups = dedup(
            vec![
                flow("req.body", FlowStatus::Vulnerable, 3),
                flow("req.body.user", FlowStatus::Vulnerable, 2),
            ],
            sift_core::config::DedupMode::All,
        );
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn group_sanitized_only_when_all_paths_sanitized() {
        let groups = dedup(
            vec![
                flow("req.body", FlowStatus::Sanitized, 2),
                flow("req.body", FlowStatus::Vulnerable, 3),
            ],
            sift_core::config::DedupMode::Shortest,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].flow.status, FlowStatus::Vulnerable);

        let groups = dedup(
            vec![
                flow("req.body", FlowStatus::Sanitized, 2),
                flow("req.body", FlowStatus::Sanitized, 3),
            ],
            sift_core::config::DedupMode::Shortest,
        );
        assert_eq!(groups[0].flow.status, FlowStatus::Sanitized);
    }
}
