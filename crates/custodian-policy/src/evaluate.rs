//! Criterion evaluation and rule composition.
//!
//! A criterion counts approvals from its eligible reviewers: the explicit
//! `users`, plus the members of every listed team. With neither list set,
//! anyone's approval counts. The change author is never eligible.
//!
//! Rules compose criteria:
//!
//! - Basic: the single criterion decides.
//! - Or: satisfied once any child is satisfied. When none is, reviewers of
//!   every child that requests review are surfaced.
//! - And: satisfied when every child is satisfied. Only unmet children are
//!   named in the problem and contribute reviewers.

use std::collections::BTreeSet;

use tracing::debug;

use custodian_contracts::{
    error::CustodianResult,
    outcome::{EvaluationOutcome, ReviewUserInfo, ReviewerMap},
    rule::{Criterion, NormalizedRule, RuleKind},
};
use custodian_core::traits::ReviewContext;

/// The result of evaluating one criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriterionResult {
    pub satisfied: bool,
    /// Eligible logins whose approval currently stands.
    pub approved_by: BTreeSet<String>,
    /// Eligible logins that have not approved. Always empty for a satisfied
    /// or unrestricted criterion.
    pub pending: ReviewerMap,
}

impl CriterionResult {
    /// Reviewers to ask on behalf of `criterion`.
    fn to_ask(&self, criterion: &Criterion) -> ReviewerMap {
        if criterion.request_review && !self.satisfied {
            self.pending.clone()
        } else {
            ReviewerMap::new()
        }
    }

    fn describe(&self, criterion: &Criterion) -> String {
        format!("needs {criterion}, has {}", self.approved_by.len())
    }
}

/// Count the approvals of `criterion`'s eligible reviewers, resolving teams
/// through the run's cache.
pub fn evaluate_criterion(criterion: &Criterion, ctx: &ReviewContext<'_>) -> CustodianResult<CriterionResult> {
    let author = ctx.pr.author.as_str();

    if criterion.is_unrestricted() {
        let approved_by: BTreeSet<String> = ctx
            .approvals
            .logins()
            .filter(|login| login.as_str() != author)
            .cloned()
            .collect();
        return Ok(CriterionResult {
            satisfied: approved_by.len() >= criterion.min_approvals as usize,
            approved_by,
            pending: ReviewerMap::new(),
        });
    }

    let mut eligible = ReviewerMap::new();
    for user in criterion.users.iter().flatten() {
        eligible.entry(user.clone()).or_default();
    }
    for team in criterion.teams.iter().flatten() {
        let members = ctx.teams.members(team)?;
        let via = ReviewUserInfo::via_team(team.as_str());
        for member in members.iter() {
            let info = eligible.entry(member.clone()).or_default();
            *info = info.union(&via);
        }
    }
    eligible.remove(author);

    let (approved, pending): (ReviewerMap, ReviewerMap) =
        eligible.into_iter().partition(|(login, _)| ctx.approvals.has(login));
    let approved_by: BTreeSet<String> = approved.into_keys().collect();
    let satisfied = approved_by.len() >= criterion.min_approvals as usize;

    Ok(CriterionResult {
        satisfied,
        approved_by,
        pending: if satisfied { ReviewerMap::new() } else { pending },
    })
}

/// Evaluate an applicable rule.
pub fn evaluate_rule(rule: &NormalizedRule, ctx: &ReviewContext<'_>) -> CustodianResult<EvaluationOutcome> {
    let reference = rule.reference();

    let unmet = match &rule.kind {
        RuleKind::Basic(criterion) => {
            let result = evaluate_criterion(criterion, ctx)?;
            (!result.satisfied).then(|| (result.describe(criterion), result.to_ask(criterion)))
        }

        RuleKind::Or(criteria) => {
            let mut problems = Vec::with_capacity(criteria.len());
            let mut ask = ReviewerMap::new();
            let mut satisfied = false;
            for criterion in criteria {
                let result = evaluate_criterion(criterion, ctx)?;
                if result.satisfied {
                    satisfied = true;
                    break;
                }
                problems.push(result.describe(criterion));
                ask = merge_reviewers(ask, &result.to_ask(criterion));
            }
            (!satisfied).then(|| {
                let problem = if problems.len() == 1 {
                    problems.remove(0)
                } else {
                    format!("none of {} alternatives met: {}", problems.len(), problems.join("; "))
                };
                (problem, ask)
            })
        }

        RuleKind::And(criteria) => {
            let mut problems = Vec::new();
            let mut ask = ReviewerMap::new();
            for criterion in criteria {
                let result = evaluate_criterion(criterion, ctx)?;
                if !result.satisfied {
                    problems.push(result.describe(criterion));
                    ask = merge_reviewers(ask, &result.to_ask(criterion));
                }
            }
            (!problems.is_empty()).then(|| {
                let problem = if criteria.len() == 1 {
                    problems.remove(0)
                } else {
                    format!(
                        "{} of {} required criteria unmet: {}",
                        problems.len(),
                        criteria.len(),
                        problems.join("; ")
                    )
                };
                (problem, ask)
            })
        }
    };

    match unmet {
        None => {
            debug!(rule = %reference, "rule satisfied");
            Ok(EvaluationOutcome::Success { rule: reference })
        }
        Some((problem, users_to_ask_for_review)) => {
            debug!(rule = %reference, problem = %problem, reviewers = users_to_ask_for_review.len(), "rule unmet");
            Ok(EvaluationOutcome::Failure {
                rule: reference,
                problem,
                users_to_ask_for_review,
            })
        }
    }
}

/// Union of two reviewer maps. Logins present in both get their infos merged.
pub fn merge_reviewers(mut into: ReviewerMap, other: &ReviewerMap) -> ReviewerMap {
    for (login, info) in other {
        into.entry(login.clone())
            .and_modify(|existing| *existing = existing.union(info))
            .or_insert_with(|| info.clone());
    }
    into
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::{TimeZone, Utc};

    use custodian_contracts::{
        error::{CustodianError, CustodianResult},
        outcome::{EvaluationOutcome, ReviewUserInfo, ReviewerMap},
        review::{ApprovalSet, PullRequest},
        rule::{CheckType, Condition, Criterion, NormalizedRule, RuleId, RuleKind},
    };
    use custodian_core::{traits::ReviewContext, traits::TeamDirectory, TeamCache};

    use super::{evaluate_criterion, evaluate_rule, merge_reviewers};

    // ── Helpers ──────────────────────────────────────────────────────────────

    struct StaticDirectory(BTreeMap<String, BTreeSet<String>>);

    impl StaticDirectory {
        fn new(teams: &[(&str, &[&str])]) -> Self {
            Self(
                teams
                    .iter()
                    .map(|(t, ms)| (t.to_string(), ms.iter().map(|m| m.to_string()).collect()))
                    .collect(),
            )
        }
    }

    impl TeamDirectory for StaticDirectory {
        fn team_members(&self, team: &str) -> CustodianResult<BTreeSet<String>> {
            self.0.get(team).cloned().ok_or_else(|| CustodianError::FetchFailed {
                operation: format!("fetch team '{team}'"),
                reason: "404".to_string(),
            })
        }
    }

    fn pr() -> PullRequest {
        PullRequest {
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            number: 7,
            base_ref: "main".to_string(),
            head_sha: "abc123".to_string(),
            author: "author".to_string(),
            html_url: String::new(),
        }
    }

    fn approvals(logins: &[&str]) -> ApprovalSet {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        logins.iter().map(|l| (l.to_string(), at)).collect()
    }

    fn criterion(min: u32, users: Option<&[&str]>, teams: Option<&[&str]>, request_review: bool) -> Criterion {
        let set = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<BTreeSet<_>>();
        Criterion {
            min_approvals: min,
            request_review,
            users: users.map(set),
            teams: teams.map(set),
        }
    }

    fn rule(kind: RuleKind) -> NormalizedRule {
        NormalizedRule {
            id: RuleId(3),
            name: "runtime".to_string(),
            condition: Condition::Include("^runtime/".to_string()),
            check_type: CheckType::ChangedFiles,
            kind,
        }
    }

    /// Run `f` against a context built from `teams` and `approved`.
    fn with_ctx<T>(teams: &[(&str, &[&str])], approved: &[&str], f: impl FnOnce(&ReviewContext<'_>) -> T) -> T {
        let directory = StaticDirectory::new(teams);
        let cache = TeamCache::new(&directory);
        let pr = pr();
        let approvals = approvals(approved);
        let ctx = ReviewContext {
            pr: &pr,
            approvals: &approvals,
            teams: &cache,
        };
        f(&ctx)
    }

    fn failure(outcome: EvaluationOutcome) -> (String, ReviewerMap) {
        match outcome {
            EvaluationOutcome::Failure {
                problem,
                users_to_ask_for_review,
                ..
            } => (problem, users_to_ask_for_review),
            other => panic!("expected Failure, got {other:?}"),
        }
    }

    // ── 1. criteria ──────────────────────────────────────────────────────────

    #[test]
    fn test_unrestricted_criterion_counts_anyone() {
        with_ctx(&[], &["x", "y"], |ctx| {
            assert!(evaluate_criterion(&criterion(2, None, None, true), ctx).unwrap().satisfied);
            let result = evaluate_criterion(&criterion(3, None, None, true), ctx).unwrap();
            assert!(!result.satisfied);
            assert!(result.pending.is_empty());
        });
    }

    #[test]
    fn test_only_eligible_approvals_count() {
        with_ctx(&[("core", &["carol", "dave"])], &["bob", "carol", "mallory"], |ctx| {
            let c = criterion(2, Some(&["alice", "bob"][..]), Some(&["core"][..]), false);
            let result = evaluate_criterion(&c, ctx).unwrap();
            assert!(result.satisfied);
            assert_eq!(result.approved_by, BTreeSet::from(["bob".to_string(), "carol".to_string()]));
        });
    }

    /// Adding an eligible approval never turns a satisfied criterion unsatisfied.
    #[test]
    fn test_more_approvals_never_hurt() {
        let c = criterion(1, Some(&["alice", "bob"][..]), None, false);
        let before = with_ctx(&[], &["alice"], |ctx| evaluate_criterion(&c, ctx).unwrap());
        let after = with_ctx(&[], &["alice", "bob"], |ctx| evaluate_criterion(&c, ctx).unwrap());
        assert!(before.satisfied && after.satisfied);
    }

    #[test]
    fn test_author_is_never_eligible() {
        with_ctx(&[("core", &["author", "carol"])], &[], |ctx| {
            let c = criterion(1, Some(&["author"][..]), Some(&["core"][..]), true);
            let result = evaluate_criterion(&c, ctx).unwrap();
            assert!(!result.pending.contains_key("author"));
            assert!(result.pending.contains_key("carol"));
        });
    }

    #[test]
    fn test_empty_lists_admit_nobody() {
        with_ctx(&[], &["alice"], |ctx| {
            let c = criterion(1, Some(&[] as &[&str]), None, true);
            let result = evaluate_criterion(&c, ctx).unwrap();
            assert!(!result.satisfied);
            assert!(result.pending.is_empty());
        });
    }

    #[test]
    fn test_min_above_eligible_count_is_simply_unmet() {
        with_ctx(&[], &["alice"], |ctx| {
            let result = evaluate_criterion(&criterion(3, Some(&["alice"][..]), None, false), ctx).unwrap();
            assert!(!result.satisfied);
        });
    }

    #[test]
    fn test_unknown_team_is_an_error() {
        with_ctx(&[], &[], |ctx| {
            let result = evaluate_criterion(&criterion(1, None, Some(&["ghosts"][..]), false), ctx);
            assert!(matches!(result, Err(CustodianError::FetchFailed { .. })));
        });
    }

    // ── 2. rules ─────────────────────────────────────────────────────────────

    #[test]
    fn test_basic_rule_unmet_surfaces_team_reviewers() {
        with_ctx(&[("core", &["carol", "dave"])], &["dave"], |ctx| {
            let r = rule(RuleKind::Basic(criterion(2, Some(&["alice"][..]), Some(&["core"][..]), true)));
            let (problem, ask) = failure(evaluate_rule(&r, ctx).unwrap());

            assert!(problem.contains("needs 2 approvals"), "{problem}");
            assert_eq!(ask.len(), 2);
            assert_eq!(ask["alice"], ReviewUserInfo::default());
            assert_eq!(ask["carol"], ReviewUserInfo::via_team("core"));
        });
    }

    #[test]
    fn test_no_reviewers_without_request_review() {
        with_ctx(&[], &[], |ctx| {
            let r = rule(RuleKind::Basic(criterion(1, Some(&["alice"][..]), None, false)));
            let (_, ask) = failure(evaluate_rule(&r, ctx).unwrap());
            assert!(ask.is_empty());
        });
    }

    #[test]
    fn test_or_rule_any_child_suffices() {
        with_ctx(&[], &["bob"], |ctx| {
            let r = rule(RuleKind::Or(vec![
                criterion(1, Some(&["alice"][..]), None, true),
                criterion(1, Some(&["bob"][..]), None, true),
            ]));
            assert!(evaluate_rule(&r, ctx).unwrap().is_success());
        });
    }

    #[test]
    fn test_or_rule_unmet_unions_reviewers() {
        with_ctx(&[], &[], |ctx| {
            let r = rule(RuleKind::Or(vec![
                criterion(1, Some(&["alice"][..]), None, true),
                criterion(1, Some(&["bob"][..]), None, false),
                criterion(1, Some(&["carol"][..]), None, true),
            ]));
            let (problem, ask) = failure(evaluate_rule(&r, ctx).unwrap());
            assert!(problem.starts_with("none of 3 alternatives met"), "{problem}");
            assert_eq!(ask.keys().cloned().collect::<Vec<_>>(), vec!["alice", "carol"]);
        });
    }

    /// Only the unmet child is named and asked.
    #[test]
    fn test_and_rule_names_only_unmet_children() {
        with_ctx(&[], &["alice"], |ctx| {
            let r = rule(RuleKind::And(vec![
                criterion(1, Some(&["alice"][..]), None, true),
                criterion(1, Some(&["bob"][..]), None, true),
            ]));
            let (problem, ask) = failure(evaluate_rule(&r, ctx).unwrap());

            assert!(problem.starts_with("1 of 2 required criteria unmet"), "{problem}");
            assert!(problem.contains("users [bob]"));
            assert!(!problem.contains("users [alice]"));
            assert_eq!(ask.keys().cloned().collect::<Vec<_>>(), vec!["bob"]);
        });
    }

    #[test]
    fn test_and_rule_all_met() {
        with_ctx(&[("ops", &["olga"])], &["alice", "olga"], |ctx| {
            let r = rule(RuleKind::And(vec![
                criterion(1, Some(&["alice"][..]), None, true),
                criterion(1, None, Some(&["ops"][..]), true),
            ]));
            assert!(evaluate_rule(&r, ctx).unwrap().is_success());
        });
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let r = rule(RuleKind::And(vec![
            criterion(2, None, Some(&["core", "ops"][..]), true),
            criterion(1, Some(&["zed"][..]), None, true),
        ]));
        let teams: &[(&str, &[&str])] = &[("core", &["a", "b"]), ("ops", &["b", "c"])];
        let first = with_ctx(teams, &["a"], |ctx| evaluate_rule(&r, ctx).unwrap());
        let second = with_ctx(teams, &["a"], |ctx| evaluate_rule(&r, ctx).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_merge_reviewers_unions_teams() {
        let left = ReviewerMap::from([("b".to_string(), ReviewUserInfo::via_team("core"))]);
        let right = ReviewerMap::from([
            ("b".to_string(), ReviewUserInfo::via_team("ops")),
            ("c".to_string(), ReviewUserInfo::default()),
        ]);
        let merged = merge_reviewers(left, &right);

        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged["b"].teams,
            Some(BTreeSet::from(["core".to_string(), "ops".to_string()]))
        );
    }
}
