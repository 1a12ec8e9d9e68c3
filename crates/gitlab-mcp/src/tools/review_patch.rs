//! Tool: review_patch
//!
//! Heuristic review of a unified diff. Nothing is fetched from GitLab; the
//! caller supplies the patch (or a changes array from `get_mr_details`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::{ToolCallResult, ToolDefinition};

use super::diff::{added_lines, changes_schema, collect_stats, AddedLine, DiffStats, PatchInput};
use super::{parse_args, require_range, ToolContext, ToolHandler, ToolResult};

/// Above this many files the review is flagged as partial.
const LARGE_DIFF_FILES: usize = 50;

#[derive(Debug, Deserialize)]
struct ReviewPatchParams {
    #[serde(flatten)]
    input: PatchInput,
    project_path: Option<String>,
    mr_iid: Option<u64>,
    #[serde(default = "default_max_findings")]
    max_findings: u64,
}

fn default_max_findings() -> u64 {
    50
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: &'static str,
    pub file: String,
    pub line: u32,
    pub message: String,
}

struct Rule {
    severity: Severity,
    category: &'static str,
    message: &'static str,
    matches: fn(&AddedLine) -> bool,
}

fn looks_like_secret(line: &AddedLine) -> bool {
    let lower = line.text.to_ascii_lowercase();
    let keyword = ["password", "secret", "api_key", "apikey", "private_key", "token"]
        .iter()
        .any(|k| lower.contains(k));
    let assigns = lower.contains('=') || lower.contains(':');
    let literal = line.text.contains('"') || line.text.contains('\'');
    keyword && assigns && literal
}

fn has_debug_output(line: &AddedLine) -> bool {
    ["console.log(", "dbg!(", "debugger;", "var_dump(", "binding.pry"]
        .iter()
        .any(|needle| line.text.contains(needle))
}

fn has_marker(line: &AddedLine) -> bool {
    line.text.contains("TODO") || line.text.contains("FIXME") || line.text.contains("XXX")
}

fn has_unwrap(line: &AddedLine) -> bool {
    line.file.ends_with(".rs") && line.text.contains(".unwrap()")
}

fn swallows_errors(line: &AddedLine) -> bool {
    let text = line.text.replace(' ', "");
    text.contains("catch(e){}") || text.contains("except:pass") || text.contains("catch{}")
}

const RULES: &[Rule] = &[
    Rule {
        severity: Severity::High,
        category: "security",
        message: "Possible hard-coded secret",
        matches: looks_like_secret,
    },
    Rule {
        severity: Severity::Medium,
        category: "reliability",
        message: "Error is silently ignored",
        matches: swallows_errors,
    },
    Rule {
        severity: Severity::Medium,
        category: "cleanup",
        message: "Debug output left in code",
        matches: has_debug_output,
    },
    Rule {
        severity: Severity::Low,
        category: "reliability",
        message: "unwrap() panics on failure; consider propagating the error",
        matches: has_unwrap,
    },
    Rule {
        severity: Severity::Low,
        category: "maintainability",
        message: "Unresolved TODO/FIXME marker",
        matches: has_marker,
    },
];

/// Run every rule over the added lines; highest severity first.
pub fn find_issues(patch: &str, limit: usize) -> Vec<Finding> {
    let mut findings: Vec<Finding> = added_lines(patch)
        .iter()
        .flat_map(|line| {
            RULES
                .iter()
                .filter(move |rule| (rule.matches)(line))
                .map(move |rule| Finding {
                    severity: rule.severity,
                    category: rule.category,
                    file: line.file.clone(),
                    line: line.line,
                    message: rule.message.to_string(),
                })
        })
        .collect();
    findings.sort_by_key(|f| f.severity);
    findings.truncate(limit);
    findings
}

fn touches(patch: &str, needles: &[&str]) -> bool {
    patch
        .lines()
        .filter(|l| l.starts_with("diff --git "))
        .any(|l| {
            let lower = l.to_ascii_lowercase();
            needles.iter().any(|n| lower.contains(n))
        })
}

fn risks(patch: &str, stats: DiffStats, findings: &[Finding]) -> Vec<String> {
    let mut risks = Vec::new();
    if findings.iter().any(|f| f.category == "security") {
        risks.push("Potential secret exposure in added code".to_string());
    }
    if touches(patch, &["migration", "schema"]) {
        risks.push("Database schema change; check rollback and data migration".to_string());
    }
    if touches(patch, &["auth", "permission", "jwt"]) {
        risks.push("Access control code changed".to_string());
    }
    if stats.deletions > stats.additions * 2 && stats.deletions > 100 {
        risks.push("Large removal; verify nothing still depends on deleted code".to_string());
    }
    risks.push("Automated review is heuristic; a manual review is still required".to_string());
    risks
}

fn summary(stats: DiffStats, project_path: Option<&str>, mr_iid: Option<u64>) -> Vec<String> {
    vec![
        format!(
            "Changes: {} files, +{}/-{}",
            stats.files, stats.additions, stats.deletions
        ),
        match project_path {
            Some(path) => format!("Project: {path}"),
            None => "Project not specified".to_string(),
        },
        match mr_iid {
            Some(iid) => format!("MR !{iid}"),
            None => "MR not specified".to_string(),
        },
    ]
}

pub struct ReviewPatch;

#[async_trait]
impl ToolHandler for ReviewPatch {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "review_patch".to_string(),
            description: "Review a unified diff (or a GitLab changes array) and return a \
                summary, heuristic findings on added lines, risks and diff statistics."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "patch": { "type": "string", "description": "Unified diff text" },
                    "changes": changes_schema(),
                    "project_path": { "type": "string" },
                    "mr_iid": { "type": "integer", "minimum": 1 },
                    "max_findings": { "type": "integer", "minimum": 1, "maximum": 200, "default": 50 },
                    "focus_paths": { "type": "array", "items": { "type": "string" } },
                    "exclude_paths": { "type": "array", "items": { "type": "string" } }
                }
            }),
        }
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let params: ReviewPatchParams = parse_args(args)?;
        require_range("max_findings", params.max_findings, 1, 200)?;
        let patch = params.input.resolve()?;

        let stats = collect_stats(&patch);
        let findings = find_issues(&patch, params.max_findings as usize);
        let risks = risks(&patch, stats, &findings);
        let mut warnings = Vec::new();
        if stats.files > LARGE_DIFF_FILES {
            warnings.push(format!(
                "Large diff ({} files); review may be incomplete",
                stats.files
            ));
        }

        tracing::info!(
            "Reviewed patch: {} files, {} findings",
            stats.files,
            findings.len()
        );

        Ok(ToolCallResult::json(&json!({
            "success": true,
            "summary": summary(stats, params.project_path.as_deref(), params.mr_iid),
            "findings": findings,
            "tests": [
                "Run unit tests for the affected modules",
                "Check integration scenarios if APIs or contracts changed",
            ],
            "risks": risks,
            "stats": stats,
            "warnings": warnings,
        })))
    }
}
