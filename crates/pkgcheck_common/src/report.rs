//! Human-readable grading report.
//!
//! Rendering is pure: it returns lines and the caller decides where they go.
//! ASCII only; colors are optional.

use crate::grading::Grade;
use crate::levels::ladder;
use crate::results::{ExecutedTest, RecordDetail};
use crate::test_plan::{InstallVariant, TestKind};
use owo_colors::OwoColorize;

/// Commit ids are shortened to this many characters in upgrade names
const SHORT_COMMIT_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportStyle {
    pub colored: bool,
    pub name_width: usize,
    pub description_width: usize,
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self {
            colored: false,
            name_width: 30,
            description_width: 40,
        }
    }
}

/// How a level shows up in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelMarker {
    NotReached,
    /// Reached and counted in the global level
    Active,
    /// Passes on its own but sits above the cap
    Superseded,
}

impl LevelMarker {
    pub fn for_level(grade: &Grade, level: u8) -> Self {
        if !grade.passed(level) {
            LevelMarker::NotReached
        } else if level <= grade.global_level {
            LevelMarker::Active
        } else {
            LevelMarker::Superseded
        }
    }

    fn text(&self) -> &'static str {
        match self {
            LevelMarker::NotReached => "",
            LevelMarker::Active => "[*]",
            LevelMarker::Superseded => "[ok]",
        }
    }
}

/// Display name for a test, e.g. "Install (subpath)"
pub fn test_display_name(kind: &TestKind, upgrade_name: Option<&str>) -> String {
    match kind {
        TestKind::PackageLinter => "Package linter".to_string(),
        TestKind::Install(variant) => {
            let what = match variant {
                InstallVariant::Root => "root",
                InstallVariant::Subdir => "subpath",
                InstallVariant::NoUrl => "no url",
                InstallVariant::Private => "private",
                InstallVariant::Multi => "multi-instance",
            };
            format!("Install ({})", what)
        }
        TestKind::BackupRestore => "Backup/restore".to_string(),
        TestKind::Upgrade(None) => "Upgrade (from same version)".to_string(),
        TestKind::Upgrade(Some(commit)) => {
            let from = match upgrade_name {
                Some(label) if !label.is_empty() => label.to_string(),
                _ => commit.chars().take(SHORT_COMMIT_LEN).collect(),
            };
            format!("Upgrade (from {})", from)
        }
        TestKind::ChangeUrl => "Change URL".to_string(),
    }
}

fn paint_tag(style: &ReportStyle, tag: &str) -> String {
    if style.colored {
        tag.yellow().bold().to_string()
    } else {
        tag.to_string()
    }
}

fn test_notes(style: &ReportStyle, test: &ExecutedTest) -> Vec<String> {
    let mut notes = Vec::new();

    if let RecordDetail::Linter(verdict) = &test.results.detail {
        if !verdict.warning.is_empty() {
            notes.push(format!("({} warnings)", verdict.warning.len()));
        }
        if !verdict.info.is_empty() {
            notes.push(format!("({} possible improvements)", verdict.info.len()));
        }
    }

    let flags = &test.results.flags;
    if flags.witness {
        notes.push(paint_tag(style, "[Missing witness file]"));
    }
    if flags.alias_traversal {
        notes.push(paint_tag(style, "[Nginx alias_traversal issue]"));
    }
    if flags.too_many_warnings {
        notes.push(paint_tag(style, "[Too many runtime warnings]"));
    }
    if flags.install_dir_permissions {
        notes.push(paint_tag(style, "[Unsafe install dir permissions]"));
    }

    notes
}

fn test_line(style: &ReportStyle, test: &ExecutedTest) -> String {
    let name = format!(
        "{}:",
        test_display_name(&test.kind, test.upgrade_name.as_deref())
    );
    let width = style.name_width;
    let padded = format!("{:<width$.width$}", name, width = width);

    let verdict = match (test.results.succeeded(), style.colored) {
        (true, true) => "SUCCESS".bright_green().bold().to_string(),
        (false, true) => "FAIL".bright_red().bold().to_string(),
        (true, false) => "SUCCESS".to_string(),
        (false, false) => "FAIL".to_string(),
    };

    let mut line = format!("    {} {}", padded, verdict);
    for note in test_notes(style, test) {
        line.push(' ');
        line.push_str(&note);
    }
    line
}

/// Per-test lines grouped by suite, then the level table and the final level.
pub fn render_report(tests: &[ExecutedTest], grade: &Grade, style: &ReportStyle) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_suite: Option<&str> = None;

    for test in tests {
        if current_suite != Some(test.suite_id.as_str()) {
            current_suite = Some(test.suite_id.as_str());
            lines.push(String::new());
            let header = format!("[{}]", test.suite_id);
            lines.push(if style.colored {
                header.bold().to_string()
            } else {
                header
            });
        }
        lines.push(test_line(style, test));
    }

    lines.push(String::new());
    lines.push("Level results:".to_string());
    let width = style.description_width;
    for level in ladder() {
        let marker = LevelMarker::for_level(grade, level.number);
        let description = format!("{:<width$.width$}", level.description, width = width);
        let marker_text = match (marker, style.colored) {
            (LevelMarker::Active, true) => marker.text().bright_green().bold().to_string(),
            (LevelMarker::Superseded, true) => marker.text().green().to_string(),
            _ => marker.text().to_string(),
        };
        lines.push(
            format!("    Level {:>2} {} {}", level.number, description, marker_text)
                .trim_end()
                .to_string(),
        );
    }

    lines.push(String::new());
    for o in &grade.overrides {
        lines.push(format!("[ERROR] {}", o.reason()));
    }
    lines.push(format!(
        "Level of this application: {} ({})",
        grade.global_level,
        grade.description()
    ));

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::grade;
    use crate::results::ResultRecord;

    #[test]
    fn test_display_names() {
        assert_eq!(
            test_display_name(&TestKind::Install(InstallVariant::Subdir), None),
            "Install (subpath)"
        );
        assert_eq!(
            test_display_name(&TestKind::Upgrade(Some("0123456789abcdef".into())), None),
            "Upgrade (from 0123456789)"
        );
        assert_eq!(
            test_display_name(&TestKind::Upgrade(Some("0123456789abcdef".into())), Some("2.1.0")),
            "Upgrade (from 2.1.0)"
        );
    }

    #[test]
    fn test_suite_headers_only_on_change() {
        let tests = vec![
            ExecutedTest::new("default", TestKind::BackupRestore, ResultRecord::success()),
            ExecutedTest::new("default", TestKind::ChangeUrl, ResultRecord::failure()),
            ExecutedTest::new("other", TestKind::BackupRestore, ResultRecord::success()),
        ];
        let g = grade(&tests);
        let lines = render_report(&tests, &g, &ReportStyle::default());
        let headers: Vec<_> = lines.iter().filter(|l| l.starts_with('[')).collect();
        assert_eq!(headers, vec!["[default]", "[other]"]);
        assert!(lines.iter().any(|l| l.contains("Change URL:") && l.ends_with("FAIL")));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Level of this application: 0 (Broken)")
        );
    }
}
