//! Compiled rule conditions.
//!
//! Patterns are regular expressions compiled in multi-line mode, so `^` and
//! `$` anchor at every line of a diff. A `diff` rule matches the whole diff as
//! one string. A `changed_files` rule applies when the include pattern matches
//! some changed path and the exclude pattern matches none of them, so a
//! combined condition applies exactly when both of its halves would.

use regex::{Regex, RegexBuilder};

use custodian_contracts::{
    error::ConfigIssue,
    review::ChangeInputs,
    rule::{CheckType, Condition},
};

/// A rule condition with its include and exclude patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl CompiledCondition {
    /// Compile `condition`. Malformed patterns are reported as issues against
    /// `rule` (`condition`, `condition.include`, `condition.exclude`).
    pub fn compile(rule: &str, condition: &Condition) -> Result<Self, Vec<ConfigIssue>> {
        let (include, exclude) = match condition {
            Condition::Include(p) => (Some(("condition", p.as_str())), None),
            Condition::Exclude(p) => (None, Some(("condition.exclude", p.as_str()))),
            Condition::IncludeExclude { include, exclude } => (
                Some(("condition.include", include.as_str())),
                Some(("condition.exclude", exclude.as_str())),
            ),
        };

        let mut issues = Vec::new();
        let mut build = |slot: Option<(&str, &str)>| {
            let (field, pattern) = slot?;
            match RegexBuilder::new(pattern).multi_line(true).build() {
                Ok(regex) => Some(regex),
                Err(e) => {
                    issues.push(ConfigIssue::new(rule, field, format!("invalid pattern: {e}")));
                    None
                }
            }
        };
        let include = build(include);
        let exclude = build(exclude);

        if issues.is_empty() {
            Ok(Self { include, exclude })
        } else {
            Err(issues)
        }
    }

    /// True when `text` satisfies the include pattern (if any) and does not
    /// match the exclude pattern (if any).
    pub fn matches(&self, text: &str) -> bool {
        let included = self.include.as_ref().map_or(true, |re| re.is_match(text));
        let excluded = self.exclude.as_ref().is_some_and(|re| re.is_match(text));
        included && !excluded
    }

    /// Decide applicability against the input selected by `check_type`.
    ///
    /// An input that was not fetched never applies, and neither does an empty
    /// list of changed files.
    pub fn applies_to(&self, check_type: CheckType, change: &ChangeInputs) -> bool {
        match check_type {
            CheckType::Diff => change.diff.as_deref().is_some_and(|diff| self.matches(diff)),
            CheckType::ChangedFiles => change
                .changed_files
                .as_deref()
                .is_some_and(|files| self.matches_any_path(files)),
        }
    }

    fn matches_any_path(&self, files: &[String]) -> bool {
        let included = match &self.include {
            Some(re) => files.iter().any(|path| re.is_match(path)),
            None => !files.is_empty(),
        };
        let excluded = self
            .exclude
            .as_ref()
            .is_some_and(|re| files.iter().any(|path| re.is_match(path)));
        included && !excluded
    }
}

#[cfg(test)]
mod tests {
    use custodian_contracts::{
        review::ChangeInputs,
        rule::{CheckType, Condition},
    };

    use super::CompiledCondition;

    fn include(p: &str) -> Condition {
        Condition::Include(p.to_string())
    }

    fn exclude(p: &str) -> Condition {
        Condition::Exclude(p.to_string())
    }

    fn both(i: &str, e: &str) -> Condition {
        Condition::IncludeExclude {
            include: i.to_string(),
            exclude: e.to_string(),
        }
    }

    fn compiled(condition: &Condition) -> CompiledCondition {
        CompiledCondition::compile("test", condition).unwrap()
    }

    fn files(paths: &[&str]) -> ChangeInputs {
        ChangeInputs {
            diff: None,
            changed_files: Some(paths.iter().map(|p| p.to_string()).collect()),
        }
    }

    #[test]
    fn test_include_and_exclude_forms() {
        assert!(compiled(&include(r"\.md$")).matches("README.md"));
        assert!(!compiled(&include(r"\.md$")).matches("main.rs"));
        assert!(compiled(&exclude(r"\.md$")).matches("main.rs"));
        assert!(!compiled(&exclude(r"\.md$")).matches("README.md"));
    }

    /// A combined condition applies exactly when its include half and its
    /// exclude half both apply, for whole lists of changed files.
    #[test]
    fn test_include_exclude_is_conjunction() {
        let (p, q) = (r"\.md$", "^vendor/");
        let combined = compiled(&both(p, q));
        let only_include = compiled(&include(p));
        let only_exclude = compiled(&exclude(q));

        let lists: &[&[&str]] = &[
            &["README.md"],
            &["vendor/README.md"],
            &["src/lib.rs"],
            &["vendor/a.md", "src/lib.rs"],
            &["vendor/lib.rs", "docs/b.md"],
            &["docs/b.md", "src/lib.rs"],
            &[],
        ];
        for paths in lists {
            let change = files(paths);
            assert_eq!(
                combined.applies_to(CheckType::ChangedFiles, &change),
                only_include.applies_to(CheckType::ChangedFiles, &change)
                    && only_exclude.applies_to(CheckType::ChangedFiles, &change),
                "files {paths:?}"
            );
        }
    }

    #[test]
    fn test_changed_files_applicability() {
        let condition = compiled(&both(r"\.md$", "^vendor/"));

        assert!(condition.applies_to(CheckType::ChangedFiles, &files(&["docs/b.md", "src/lib.rs"])));
        assert!(!condition.applies_to(CheckType::ChangedFiles, &files(&["vendor/a.md", "docs/b.md"])));
        assert!(!condition.applies_to(CheckType::ChangedFiles, &files(&["src/lib.rs"])));
        assert!(!condition.applies_to(CheckType::ChangedFiles, &files(&[])));

        let skip_vendor = compiled(&exclude("vendor/"));
        assert!(!skip_vendor.applies_to(CheckType::ChangedFiles, &files(&["vendor/lib.js"])));
        assert!(!skip_vendor.applies_to(CheckType::ChangedFiles, &files(&["vendor/lib.js", "src/main.rs"])));
        assert!(skip_vendor.applies_to(CheckType::ChangedFiles, &files(&["src/main.rs"])));
    }

    #[test]
    fn test_diff_is_matched_line_anchored() {
        let diff = "--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1 +1 @@\n-old\n+// 🔒 keep\n";
        let change = ChangeInputs {
            diff: Some(diff.to_string()),
            changed_files: None,
        };

        assert!(compiled(&include("^[+-].*🔒")).applies_to(CheckType::Diff, &change));
        assert!(!compiled(&include("^@@.*🔒")).applies_to(CheckType::Diff, &change));
    }

    #[test]
    fn test_missing_input_never_applies() {
        let condition = compiled(&exclude("anything"));
        let change = ChangeInputs::default();

        assert!(!condition.applies_to(CheckType::Diff, &change));
        assert!(!condition.applies_to(CheckType::ChangedFiles, &change));
    }

    #[test]
    fn test_malformed_patterns_are_all_reported() {
        let issues = CompiledCondition::compile("docs", &both("(unclosed", "[z-a]")).unwrap_err();

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].field, "condition.include");
        assert_eq!(issues[1].field, "condition.exclude");
        assert_eq!(issues[0].rule, "docs");
        assert!(issues[0].reason.starts_with("invalid pattern"));
    }
}
