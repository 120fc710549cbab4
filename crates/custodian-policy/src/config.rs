//! Policy document schema and the rule normalizer.
//!
//! A policy document is TOML with an ordered `[[rules]]` array. Each entry is
//! read key by key into a permissive `RawRule` (every field optional) so that
//! an unknown key or a value of the wrong type is reported against the rule
//! and field it belongs to. `normalize_rules` then turns the raw entries into
//! the closed `RuleKind` sum type, collecting every issue it finds.
//!
//! Example:
//! ```toml
//! [[rules]]
//! name = "Docs"
//! condition = { include = '\.md$', exclude = '^vendor/' }
//! check_type = "changed_files"
//! min_approvals = 1
//!
//! [[rules]]
//! name = "Runtime"
//! condition = '^runtime/'
//! check_type = "changed_files"
//! all = [
//!   { min_approvals = 1, teams = ["core"] },
//!   { min_approvals = 1, users = ["alice"], request_review = true },
//! ]
//! ```

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use toml::{Table, Value};

use custodian_contracts::{
    error::ConfigIssue,
    rule::{CheckType, Condition, Criterion, NormalizedRule, RuleId, RuleKind},
};

/// A rule entry exactly as authored. Exists only during loading.
#[derive(Debug, Clone, Default)]
pub struct RawRule {
    pub name: Option<String>,
    pub condition: Option<RawCondition>,
    pub check_type: Option<String>,
    /// Criterion fields set directly on the rule.
    pub criterion: RawCriterion,
    pub any: Option<Vec<RawCriterion>>,
    pub all: Option<Vec<RawCriterion>>,
}

/// `condition = "pattern"` or `condition = { include = "...", exclude = "..." }`.
#[derive(Debug, Clone)]
pub enum RawCondition {
    Pattern(String),
    Table {
        include: Option<String>,
        exclude: Option<String>,
    },
}

/// One element of an `any` or `all` list, or the criterion fields of a Basic
/// rule.
#[derive(Debug, Clone, Default)]
pub struct RawCriterion {
    pub min_approvals: Option<i64>,
    pub request_review: Option<bool>,
    pub users: Option<Vec<String>>,
    pub teams: Option<Vec<String>>,
}

/// Fields a Basic rule may not carry.
pub const BASIC_INVALID_FIELDS: &[&str] = &["any", "all"];
/// Fields an Or rule may not carry directly.
pub const OR_INVALID_FIELDS: &[&str] = &["min_approvals", "request_review", "users", "teams", "all"];
/// Fields an And rule may not carry directly.
pub const AND_INVALID_FIELDS: &[&str] = &["min_approvals", "request_review", "users", "teams", "any"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectedKind {
    Basic,
    Or,
    And,
}

impl DetectedKind {
    fn invalid_fields(self) -> &'static [&'static str] {
        match self {
            DetectedKind::Basic => BASIC_INVALID_FIELDS,
            DetectedKind::Or => OR_INVALID_FIELDS,
            DetectedKind::And => AND_INVALID_FIELDS,
        }
    }

    fn label(self) -> &'static str {
        match self {
            DetectedKind::Basic => "BasicRule",
            DetectedKind::Or => "OrRule",
            DetectedKind::And => "AndRule",
        }
    }
}

impl RawRule {
    fn detect_kind(&self) -> DetectedKind {
        if self.all.is_some() {
            DetectedKind::And
        } else if self.any.is_some() {
            DetectedKind::Or
        } else {
            DetectedKind::Basic
        }
    }

    fn has_field(&self, field: &str) -> bool {
        match field {
            "min_approvals" => self.criterion.min_approvals.is_some(),
            "request_review" => self.criterion.request_review.is_some(),
            "users" => self.criterion.users.is_some(),
            "teams" => self.criterion.teams.is_some(),
            "any" => self.any.is_some(),
            "all" => self.all.is_some(),
            _ => false,
        }
    }
}

fn rule_label(index: usize, name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("rules[{index}]"),
    }
}

// ── Reading ───────────────────────────────────────────────────────────────────

/// Read the rules of a parsed policy document.
///
/// Every key is checked against the schema before any rule is normalized. An
/// unknown key or a wrongly typed value becomes an issue naming the rule and
/// the field, and all such issues across the document are returned together.
pub fn read_document(document: &Table) -> Result<Vec<RawRule>, Vec<ConfigIssue>> {
    let mut issues = Vec::new();
    for key in document.keys().filter(|key| key.as_str() != "rules") {
        issues.push(ConfigIssue::new("document", key.as_str(), "is not a known top-level key"));
    }

    let entries = match document.get("rules") {
        None => {
            issues.push(ConfigIssue::new("document", "rules", "is required"));
            return Err(issues);
        }
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            issues.push(ConfigIssue::new(
                "document",
                "rules",
                format!("must be an array of tables (got {})", other.type_str()),
            ));
            return Err(issues);
        }
    };

    let mut rules = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match entry {
            Value::Table(table) => match read_rule(index, table) {
                Ok(rule) => rules.push(rule),
                Err(mut rule_issues) => issues.append(&mut rule_issues),
            },
            other => issues.push(ConfigIssue::new(
                "document",
                format!("rules[{index}]"),
                format!("must be a table (got {})", other.type_str()),
            )),
        }
    }

    if issues.is_empty() {
        Ok(rules)
    } else {
        Err(issues)
    }
}

fn read_rule(index: usize, table: &Table) -> Result<RawRule, Vec<ConfigIssue>> {
    let label = rule_label(index, table.get("name").and_then(Value::as_str));
    let mut issues = Vec::new();
    let mut issue = |field: &str, reason: String| issues.push(ConfigIssue::new(label.as_str(), field, reason));

    let mut rule = RawRule::default();
    for (key, value) in table {
        match key.as_str() {
            "name" => rule.name = read_value(value, key, &mut issue),
            "check_type" => rule.check_type = read_value(value, key, &mut issue),
            "condition" => rule.condition = read_condition(value, &mut issue),
            "any" => rule.any = read_criteria(value, key, &mut issue),
            "all" => rule.all = read_criteria(value, key, &mut issue),
            _ => {
                if !read_criterion_key(&mut rule.criterion, key, value, "", &mut issue) {
                    issue(key.as_str(), "is not a known field".to_string());
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(rule)
    } else {
        Err(issues)
    }
}

fn read_value<T: DeserializeOwned>(value: &Value, field: &str, issue: &mut impl FnMut(&str, String)) -> Option<T> {
    match value.clone().try_into() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            issue(field, format!("has the wrong type: {}", e.to_string().trim_end()));
            None
        }
    }
}

fn read_condition(value: &Value, issue: &mut impl FnMut(&str, String)) -> Option<RawCondition> {
    match value {
        Value::String(pattern) => Some(RawCondition::Pattern(pattern.clone())),
        Value::Table(table) => {
            let (mut include, mut exclude) = (None, None);
            for (key, value) in table {
                match key.as_str() {
                    "include" => include = read_value(value, "condition.include", issue),
                    "exclude" => exclude = read_value(value, "condition.exclude", issue),
                    _ => issue(&format!("condition.{key}"), "is not a known field".to_string()),
                }
            }
            Some(RawCondition::Table { include, exclude })
        }
        other => {
            issue(
                "condition",
                format!("must be a pattern or an include/exclude table (got {})", other.type_str()),
            );
            None
        }
    }
}

fn read_criteria(value: &Value, field: &str, issue: &mut impl FnMut(&str, String)) -> Option<Vec<RawCriterion>> {
    let Value::Array(entries) = value else {
        issue(field, format!("must be an array of tables (got {})", value.type_str()));
        return None;
    };

    let mut criteria = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let prefix = format!("{field}[{index}].");
        let Value::Table(table) = entry else {
            issue(&format!("{field}[{index}]"), format!("must be a table (got {})", entry.type_str()));
            continue;
        };
        let mut criterion = RawCriterion::default();
        for (key, value) in table {
            if !read_criterion_key(&mut criterion, key, value, &prefix, issue) {
                issue(&format!("{prefix}{key}"), "is not a known field".to_string());
            }
        }
        criteria.push(criterion);
    }
    Some(criteria)
}

/// Store `value` in `criterion` when `key` is a criterion field. Returns
/// false for any other key.
fn read_criterion_key(
    criterion: &mut RawCriterion,
    key: &str,
    value: &Value,
    prefix: &str,
    issue: &mut impl FnMut(&str, String),
) -> bool {
    let field = format!("{prefix}{key}");
    match key {
        "min_approvals" => criterion.min_approvals = read_value(value, &field, issue),
        "request_review" => criterion.request_review = read_value(value, &field, issue),
        "users" => criterion.users = read_value(value, &field, issue),
        "teams" => criterion.teams = read_value(value, &field, issue),
        _ => return false,
    }
    true
}

// ── Normalizing ───────────────────────────────────────────────────────────────

/// Normalize `raw` into rules whose ids start at `first_id`.
///
/// Every rule is checked, and every issue of every rule is returned; a single
/// issue anywhere rejects the whole document.
pub fn normalize_rules(raw: &[RawRule], first_id: u32) -> Result<Vec<NormalizedRule>, Vec<ConfigIssue>> {
    let mut rules = Vec::with_capacity(raw.len());
    let mut issues = Vec::new();

    for (index, entry) in raw.iter().enumerate() {
        let id = RuleId(first_id + index as u32);
        match normalize_rule(index, entry, id) {
            Ok(rule) => rules.push(rule),
            Err(mut rule_issues) => issues.append(&mut rule_issues),
        }
    }

    if issues.is_empty() {
        Ok(rules)
    } else {
        Err(issues)
    }
}

fn normalize_rule(index: usize, raw: &RawRule, id: RuleId) -> Result<NormalizedRule, Vec<ConfigIssue>> {
    let label = rule_label(index, raw.name.as_deref());
    let mut issues = Vec::new();
    let mut issue = |field: &str, reason: String| issues.push(ConfigIssue::new(label.as_str(), field, reason));

    // ── 1. Base fields ───────────────────────────────────────────────────────
    let name = match raw.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Some(name.to_string()),
        Some(_) => {
            issue("name", "must not be empty".to_string());
            None
        }
        None => {
            issue("name", "is required".to_string());
            None
        }
    };

    let condition = match &raw.condition {
        None => {
            issue("condition", "is required".to_string());
            None
        }
        Some(raw_condition) => match normalize_condition(raw_condition) {
            Ok(condition) => Some(condition),
            Err((field, reason)) => {
                issue(field, reason);
                None
            }
        },
    };

    let check_type = match raw.check_type.as_deref().map(str::trim) {
        None => {
            issue("check_type", "is required".to_string());
            None
        }
        Some("") => {
            issue("check_type", "must not be empty".to_string());
            None
        }
        Some("diff") => Some(CheckType::Diff),
        Some("changed_files") => Some(CheckType::ChangedFiles),
        Some(other) => {
            issue(
                "check_type",
                format!("must be \"diff\" or \"changed_files\" (got \"{other}\")"),
            );
            None
        }
    };

    // ── 2. Fields invalid for the detected kind ──────────────────────────────
    let kind = raw.detect_kind();
    for &field in kind.invalid_fields() {
        if raw.has_field(field) {
            issue(field, format!("is not allowed in a {}", kind.label()));
        }
    }

    // ── 3. Criteria ──────────────────────────────────────────────────────────
    let rule_kind = match kind {
        DetectedKind::Basic => normalize_criterion(&raw.criterion, "", &mut issue).map(RuleKind::Basic),
        DetectedKind::Or => normalize_list(raw.any.as_deref(), "any", &mut issue).map(RuleKind::Or),
        DetectedKind::And => normalize_list(raw.all.as_deref(), "all", &mut issue).map(RuleKind::And),
    };

    match (name, condition, check_type, rule_kind) {
        (Some(name), Some(condition), Some(check_type), Some(kind)) if issues.is_empty() => Ok(NormalizedRule {
            id,
            name,
            condition,
            check_type,
            kind,
        }),
        _ => Err(issues),
    }
}

fn normalize_condition(raw: &RawCondition) -> Result<Condition, (&'static str, String)> {
    let non_empty = |field: &'static str, pattern: &str| {
        if pattern.is_empty() {
            Err((field, "pattern must not be empty".to_string()))
        } else {
            Ok(pattern.to_string())
        }
    };

    match raw {
        RawCondition::Pattern(pattern) => Ok(Condition::Include(non_empty("condition", pattern)?)),
        RawCondition::Table { include, exclude } => match (include, exclude) {
            (Some(include), Some(exclude)) => Ok(Condition::IncludeExclude {
                include: non_empty("condition.include", include)?,
                exclude: non_empty("condition.exclude", exclude)?,
            }),
            (Some(include), None) => Ok(Condition::Include(non_empty("condition.include", include)?)),
            (None, Some(exclude)) => Ok(Condition::Exclude(non_empty("condition.exclude", exclude)?)),
            (None, None) => Err(("condition", "must set include, exclude, or both".to_string())),
        },
    }
}

fn normalize_list(
    raw: Option<&[RawCriterion]>,
    field: &str,
    issue: &mut impl FnMut(&str, String),
) -> Option<Vec<Criterion>> {
    let raw = raw.unwrap_or_default();
    if raw.is_empty() {
        issue(field, "must contain at least one criterion".to_string());
        return None;
    }

    let mut criteria = Vec::with_capacity(raw.len());
    let mut valid = true;
    for (index, entry) in raw.iter().enumerate() {
        let prefix = format!("{field}[{index}].");
        match normalize_criterion(entry, &prefix, issue) {
            Some(criterion) => criteria.push(criterion),
            None => valid = false,
        }
    }
    valid.then_some(criteria)
}

fn normalize_criterion(raw: &RawCriterion, prefix: &str, issue: &mut impl FnMut(&str, String)) -> Option<Criterion> {
    let mut valid = true;

    let min_approvals = match raw.min_approvals {
        None => {
            issue(&format!("{prefix}min_approvals"), "is required".to_string());
            None
        }
        Some(n) if n < 1 => {
            issue(&format!("{prefix}min_approvals"), format!("must be at least 1 (got {n})"));
            None
        }
        Some(n) => match u32::try_from(n) {
            Ok(n) => Some(n),
            Err(_) => {
                issue(&format!("{prefix}min_approvals"), format!("is too large (got {n})"));
                None
            }
        },
    };

    let mut names = |field: &str, values: &Option<Vec<String>>| -> Option<BTreeSet<String>> {
        let values = values.as_ref()?;
        if values.iter().any(|v| v.trim().is_empty()) {
            issue(&format!("{prefix}{field}"), "must not contain empty entries".to_string());
            valid = false;
        }
        Some(values.iter().map(|v| v.trim().to_string()).collect())
    };
    let users = names("users", &raw.users);
    let teams = names("teams", &raw.teams);

    match min_approvals {
        Some(min_approvals) if valid => Some(Criterion {
            min_approvals,
            request_review: raw.request_review.unwrap_or(false),
            users,
            teams,
        }),
        _ => None,
    }
}
