//! Line-oriented diff between two versions of workflow code.
//!
//! This is a positional comparison, not an LCS diff: line `i` of the old text
//! is compared with line `i` of the new text. Inserting one line near the top
//! therefore reports every following line as removed and re-added. The row
//! shape is what the diff view renders, so keep it positional.

use serde::Serialize;

/// Upper bound on returned rows. Longer diffs are cut silently.
pub const MAX_DIFF_ROWS: usize = 800;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Same,
    Added,
    Removed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    #[serde(rename = "type")]
    pub kind: DiffKind,
    pub text: String,
}

impl DiffLine {
    fn new(kind: DiffKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
        }
    }
}

/// Row counts per kind, for summary badges next to the diff view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub same: usize,
    pub added: usize,
    pub removed: usize,
}

impl DiffStats {
    pub fn of(lines: &[DiffLine]) -> Self {
        lines.iter().fold(Self::default(), |mut stats, line| {
            match line.kind {
                DiffKind::Same => stats.same += 1,
                DiffKind::Added => stats.added += 1,
                DiffKind::Removed => stats.removed += 1,
            }
            stats
        })
    }

    pub fn has_changes(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Builds the positional diff from `previous` to `next`, capped at
/// [`MAX_DIFF_ROWS`] rows.
pub fn build_diff(previous: &str, next: &str) -> Vec<DiffLine> {
    let a = split_lines(previous);
    let b = split_lines(next);
    let max = a.len().max(b.len());
    let mut out = Vec::new();
    for i in 0..max {
        if out.len() >= MAX_DIFF_ROWS {
            break;
        }
        match (a.get(i), b.get(i)) {
            (Some(old), Some(new)) if old == new => out.push(DiffLine::new(DiffKind::Same, old)),
            (old, new) => {
                if let Some(old) = old {
                    out.push(DiffLine::new(DiffKind::Removed, old));
                }
                if let Some(new) = new {
                    out.push(DiffLine::new(DiffKind::Added, new));
                }
            }
        }
    }
    out.truncate(MAX_DIFF_ROWS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(lines: &[DiffLine]) -> Vec<DiffKind> {
        lines.iter().map(|l| l.kind).collect()
    }

    #[test]
    fn identical_inputs_produce_only_same_rows() {
        let text = "let a = 1;\nlet b = 2;\nrun(a, b);";
        let diff = build_diff(text, text);
        assert!(diff.iter().all(|l| l.kind == DiffKind::Same));
        let joined = diff.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join("\n");
        assert_eq!(joined, text);
    }

    #[test]
    fn pure_insertion_and_deletion() {
        assert!(build_diff("", "").is_empty());
        assert_eq!(kinds(&build_diff("", "a\nb")), vec![DiffKind::Added, DiffKind::Added]);
        assert_eq!(
            kinds(&build_diff("a\nb", "")),
            vec![DiffKind::Removed, DiffKind::Removed]
        );
    }

    #[test]
    fn changed_line_is_removed_then_added() {
        let diff = build_diff("a\nb\nc", "a\nx\nc\nd");
        assert_eq!(
            diff,
            vec![
                DiffLine::new(DiffKind::Same, "a"),
                DiffLine::new(DiffKind::Removed, "b"),
                DiffLine::new(DiffKind::Added, "x"),
                DiffLine::new(DiffKind::Same, "c"),
                DiffLine::new(DiffKind::Added, "d"),
            ]
        );
        let stats = DiffStats::of(&diff);
        assert_eq!((stats.same, stats.added, stats.removed), (2, 2, 1));
        assert!(stats.has_changes());
    }

    #[test]
    fn shifted_lines_are_reported_positionally() {
        let diff = build_diff("a\nb", "new\na\nb");
        assert_eq!(
            kinds(&diff),
            vec![
                DiffKind::Removed,
                DiffKind::Added,
                DiffKind::Removed,
                DiffKind::Added,
                DiffKind::Added,
            ]
        );
    }

    #[test]
    fn crlf_is_treated_like_lf() {
        let diff = build_diff("a\r\nb", "a\nb");
        assert!(diff.iter().all(|l| l.kind == DiffKind::Same));
    }

    #[test]
    fn output_is_capped() {
        let old = (0..1000).map(|i| format!("old {i}")).collect::<Vec<_>>().join("\n");
        let new = (0..1000).map(|i| format!("new {i}")).collect::<Vec<_>>().join("\n");
        let diff = build_diff(&old, &new);
        assert_eq!(diff.len(), MAX_DIFF_ROWS);
        assert_eq!(diff[0].kind, DiffKind::Removed);
        assert_eq!(diff[MAX_DIFF_ROWS - 1].text, "new 399");
    }
}
