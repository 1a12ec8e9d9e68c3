//! Unified diff helpers shared by the MR and review tools.

use serde::{Deserialize, Serialize};

use crate::gitlab::models::Change;

use super::{tags, ToolError};

/// Diff input accepted by the review tools: a raw patch or a changes array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchInput {
    #[serde(default)]
    pub patch: Option<String>,
    #[serde(default)]
    pub changes: Option<Vec<Change>>,
    #[serde(default)]
    pub focus_paths: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
}

impl PatchInput {
    /// The unified diff to analyse, after path filtering.
    pub fn resolve(&self) -> Result<String, ToolError> {
        let patch = match (&self.patch, &self.changes) {
            (Some(patch), _) if !patch.is_empty() => patch.clone(),
            (_, Some(changes)) if !changes.is_empty() => build_patch(changes),
            _ => {
                return Err(ToolError::failure(
                    tags::NO_DIFF,
                    "Provide patch (unified diff) or changes array.",
                ))
            }
        };
        Ok(filter_patch(&patch, &self.focus_paths, &self.exclude_paths))
    }
}

pub(crate) fn changes_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "old_path": { "type": "string" },
                "new_path": { "type": "string" },
                "diff": { "type": "string" },
                "new_file": { "type": "boolean" },
                "renamed_file": { "type": "boolean" },
                "deleted_file": { "type": "boolean" }
            },
            "required": ["old_path", "new_path", "diff"]
        },
        "description": "GitLab changes array (old_path, new_path, diff, flags)"
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub files: usize,
    pub additions: usize,
    pub deletions: usize,
}

/// A line added by the patch, with its line number in the new file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedLine {
    pub file: String,
    pub line: u32,
    pub text: String,
}

/// Render a GitLab changes array as one unified diff.
pub fn build_patch(changes: &[Change]) -> String {
    changes
        .iter()
        .map(|change| {
            let mut header = vec![format!(
                "diff --git a/{} b/{}",
                change.old_path, change.new_path
            )];
            if change.new_file {
                header.push("new file mode 100644".to_string());
            }
            if change.deleted_file {
                header.push("deleted file mode 100644".to_string());
            }
            header.push(format!("--- a/{}", change.old_path));
            header.push(format!("+++ b/{}", change.new_path));
            format!("{}\n{}", header.join("\n"), change.diff)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_addition(line: &str) -> bool {
    line.starts_with('+') && !line.starts_with("+++")
}

fn is_deletion(line: &str) -> bool {
    line.starts_with('-') && !line.starts_with("---")
}

pub fn collect_stats(patch: &str) -> DiffStats {
    let mut stats = DiffStats::default();
    for line in patch.lines() {
        if line.starts_with("diff --git ") {
            stats.files += 1;
        } else if is_addition(line) {
            stats.additions += 1;
        } else if is_deletion(line) {
            stats.deletions += 1;
        }
    }
    if stats.files == 0 && !patch.is_empty() {
        stats.files = 1;
    }
    stats
}

/// Stats over raw per-file diffs, one file per change.
pub fn change_stats(changes: &[Change]) -> DiffStats {
    changes.iter().fold(DiffStats::default(), |mut acc, change| {
        let file = collect_stats(&change.diff);
        acc.files += 1;
        acc.additions += file.additions;
        acc.deletions += file.deletions;
        acc
    })
}

fn section_path(header: &str) -> Option<String> {
    header
        .strip_prefix("diff --git ")
        .and_then(|rest| rest.rsplit_once(" b/"))
        .map(|(_, new_path)| new_path.to_string())
}

/// Split a patch into `(path, text)` per file.
pub fn split_files(patch: &str) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = Vec::new();
    for line in patch.lines() {
        if let Some(path) = section_path(line) {
            files.push((path, String::new()));
        } else if files.is_empty() {
            files.push((String::new(), String::new()));
        }
        if let Some((path, text)) = files.last_mut() {
            if path.is_empty() {
                if let Some(new_path) = line.strip_prefix("+++ b/") {
                    *path = new_path.to_string();
                }
            }
            text.push_str(line);
            text.push('\n');
        }
    }
    files
}

fn matches_any(path: &str, prefixes: &[String]) -> bool {
    prefixes
        .iter()
        .any(|prefix| !prefix.is_empty() && path.starts_with(prefix.as_str()))
}

/// Keep only files under `focus` (if any) and outside `exclude`.
pub fn filter_patch(patch: &str, focus: &[String], exclude: &[String]) -> String {
    if focus.is_empty() && exclude.is_empty() {
        return patch.to_string();
    }
    split_files(patch)
        .into_iter()
        .filter(|(path, _)| focus.is_empty() || matches_any(path, focus))
        .filter(|(path, _)| !matches_any(path, exclude))
        .map(|(_, text)| text)
        .collect()
}

fn hunk_new_start(header: &str) -> Option<u32> {
    let plus = header.split_whitespace().find(|part| part.starts_with('+'))?;
    plus[1..].split(',').next()?.parse().ok()
}

/// Every added line with its position in the new file.
pub fn added_lines(patch: &str) -> Vec<AddedLine> {
    let mut out = Vec::new();
    for (file, text) in split_files(patch) {
        let mut line_no: Option<u32> = None;
        for line in text.lines() {
            if line.starts_with("@@") {
                line_no = hunk_new_start(line);
                continue;
            }
            let Some(current) = line_no else { continue };
            if is_addition(line) {
                out.push(AddedLine {
                    file: file.clone(),
                    line: current,
                    text: line[1..].to_string(),
                });
                line_no = Some(current.saturating_add(1));
            } else if !is_deletion(line) && !line.starts_with('\\') {
                line_no = Some(current.saturating_add(1));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATCH: &str = "diff --git a/src/lib.rs b/src/lib.rs
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,3 +1,4 @@
 use std::fmt;
-fn old() {}
+fn new() {}
+fn extra() {}
 fn tail() {}
diff --git a/docs/guide.md b/docs/guide.md
--- a/docs/guide.md
+++ b/docs/guide.md
@@ -10,2 +10,2 @@
-old text
+new text
";

    #[test]
    fn test_collect_stats_skips_headers() {
        let stats = collect_stats(PATCH);
        assert_eq!(
            stats,
            DiffStats {
                files: 2,
                additions: 3,
                deletions: 2
            }
        );
    }

    #[test]
    fn test_headerless_patch_counts_as_one_file() {
        let stats = collect_stats("@@ -1 +1 @@\n-a\n+b\n");
        assert_eq!(stats.files, 1);
        assert_eq!(collect_stats("").files, 0);
    }

    #[test]
    fn test_build_patch_from_changes() {
        let changes = vec![Change {
            old_path: "a.txt".to_string(),
            new_path: "a.txt".to_string(),
            diff: "@@ -0,0 +1 @@\n+hello\n".to_string(),
            new_file: true,
            renamed_file: false,
            deleted_file: false,
        }];
        let patch = build_patch(&changes);
        assert!(patch.starts_with("diff --git a/a.txt b/a.txt\nnew file mode 100644\n"));
        assert_eq!(collect_stats(&patch).additions, 1);
        assert_eq!(change_stats(&changes).files, 1);
    }

    #[test]
    fn test_filter_patch_by_prefix() {
        let focused = filter_patch(PATCH, &["src/".to_string()], &[]);
        assert!(focused.contains("src/lib.rs"));
        assert!(!focused.contains("guide.md"));

        let excluded = filter_patch(PATCH, &[], &["docs".to_string()]);
        assert_eq!(collect_stats(&excluded).files, 1);
    }

    #[test]
    fn test_patch_input_requires_a_diff() {
        let err = PatchInput::default().resolve().unwrap_err();
        assert!(matches!(err, ToolError::Failure { tag: "NO_DIFF", .. }));

        let input = PatchInput {
            patch: Some(String::new()),
            changes: Some(Vec::new()),
            ..Default::default()
        };
        assert!(input.resolve().is_err());
    }

    #[test]
    fn test_added_line_numbers() {
        let added = added_lines(PATCH);
        let positions: Vec<_> = added.iter().map(|a| (a.file.as_str(), a.line)).collect();
        assert_eq!(
            positions,
            vec![("src/lib.rs", 2), ("src/lib.rs", 3), ("docs/guide.md", 10)]
        );
        assert_eq!(added[0].text, "fn new() {}");
    }

    #[test]
    fn test_line_numbers_saturate_at_u32_max() {
        let patch = "diff --git a/big.txt b/big.txt\n@@ -1 +4294967295 @@\n+x\n+y\n context\n";
        let lines: Vec<u32> = added_lines(patch).iter().map(|a| a.line).collect();
        assert_eq!(lines, vec![u32::MAX, u32::MAX]);
    }
}
