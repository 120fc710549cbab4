//! TOML-driven approval policy.
//!
//! `TomlPolicyLoader` implements `PolicyLoader` from custodian-core. Loading
//! runs in three stages, each fatal on failure:
//!
//! 1. Parse the TOML and read each rule key by key (unknown keys, wrongly
//!    typed values).
//! 2. Validate the run settings and normalize every rule, collecting all
//!    issues across all rules.
//! 3. Compile every condition pattern.
//!
//! The resulting `CompiledPolicy` holds the built-in rules followed by the
//! document's rules, each paired with its compiled condition.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use custodian_contracts::{
    error::{ConfigIssue, CustodianError, CustodianResult},
    outcome::EvaluationOutcome,
    review::ChangeInputs,
    rule::{NormalizedRule, RuleId},
    run::RunSettings,
};
use custodian_core::traits::{ApprovalPolicy, PolicyLoader, ReviewContext};

use crate::builtin::{builtin_rules, validate_settings, BUILTIN_RULE_COUNT};
use crate::condition::CompiledCondition;
use crate::config::{normalize_rules, read_document};
use crate::evaluate::evaluate_rule;

/// A validated policy with compiled conditions.
///
/// ```rust,ignore
/// use custodian_policy::CompiledPolicy;
///
/// let policy = CompiledPolicy::from_file(Path::new(".github/custodian.toml"), &settings)?;
/// ```
#[derive(Debug)]
pub struct CompiledPolicy {
    rules: Vec<NormalizedRule>,
    conditions: HashMap<RuleId, CompiledCondition>,
}

impl CompiledPolicy {
    /// Parse and validate `s`, prepending the built-in rules for `settings`.
    pub fn from_toml_str(s: &str, settings: &RunSettings) -> CustodianResult<Self> {
        Self::load(s, Some(settings))
    }

    /// Parse and validate `s` without the built-in rules. Rule ids start at 0.
    pub fn from_toml_str_without_builtins(s: &str) -> CustodianResult<Self> {
        Self::load(s, None)
    }

    /// Read the file at `path` and load it with `from_toml_str`.
    pub fn from_file(path: &Path, settings: &RunSettings) -> CustodianResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| CustodianError::ConfigError {
            reason: format!("failed to read policy file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents, settings)
    }

    fn load(s: &str, settings: Option<&RunSettings>) -> CustodianResult<Self> {
        let document: toml::Table = toml::from_str(s).map_err(|e| CustodianError::ConfigError {
            reason: format!("failed to parse policy TOML: {}", e),
        })?;

        let mut issues = Vec::new();
        let mut rules = match settings {
            Some(settings) => {
                issues.extend(validate_settings(settings));
                builtin_rules(settings)
            }
            None => Vec::new(),
        };
        let first_id = if settings.is_some() { BUILTIN_RULE_COUNT } else { 0 };

        match read_document(&document).and_then(|raw| normalize_rules(&raw, first_id)) {
            Ok(user_rules) => rules.extend(user_rules),
            Err(rule_issues) => issues.extend(rule_issues),
        }
        reject_if_any(issues)?;

        let mut conditions = HashMap::with_capacity(rules.len());
        let mut issues = Vec::new();
        for rule in &rules {
            match CompiledCondition::compile(&rule.name, &rule.condition) {
                Ok(compiled) => {
                    conditions.insert(rule.id, compiled);
                }
                Err(rule_issues) => issues.extend(rule_issues),
            }
        }
        reject_if_any(issues)?;

        debug!(rules = rules.len(), builtins = settings.is_some(), "policy loaded");
        Ok(Self { rules, conditions })
    }
}

fn reject_if_any(issues: Vec<ConfigIssue>) -> CustodianResult<()> {
    if issues.is_empty() {
        return Ok(());
    }
    for issue in &issues {
        warn!(rule = %issue.rule, field = %issue.field, reason = %issue.reason, "invalid policy");
    }
    Err(CustodianError::InvalidConfiguration { issues })
}

impl ApprovalPolicy for CompiledPolicy {
    fn rules(&self) -> &[NormalizedRule] {
        &self.rules
    }

    fn is_applicable(&self, rule: &NormalizedRule, change: &ChangeInputs) -> bool {
        let Some(condition) = self.conditions.get(&rule.id) else {
            warn!(rule_id = %rule.id, rule = %rule.name, "rule not part of this policy");
            return false;
        };
        let applicable = condition.applies_to(rule.check_type, change);
        debug!(rule_id = %rule.id, rule = %rule.name, check_type = %rule.check_type, applicable, "condition checked");
        applicable
    }

    fn evaluate(&self, rule: &NormalizedRule, ctx: &ReviewContext<'_>) -> CustodianResult<EvaluationOutcome> {
        evaluate_rule(rule, ctx)
    }
}

/// A `PolicyLoader` that reads TOML policy documents.
#[derive(Debug, Clone, Copy)]
pub struct TomlPolicyLoader {
    builtins: bool,
}

impl TomlPolicyLoader {
    pub fn new() -> Self {
        Self { builtins: true }
    }

    /// A loader that skips the built-in rules and settings validation.
    pub fn without_builtins() -> Self {
        Self { builtins: false }
    }
}

impl Default for TomlPolicyLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyLoader for TomlPolicyLoader {
    fn load(&self, document: &str, settings: &RunSettings) -> CustodianResult<Box<dyn ApprovalPolicy>> {
        let policy = if self.builtins {
            CompiledPolicy::from_toml_str(document, settings)?
        } else {
            CompiledPolicy::from_toml_str_without_builtins(document)?
        };
        Ok(Box::new(policy))
    }
}
