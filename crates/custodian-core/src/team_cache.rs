//! Memoizing team-membership cache.
//!
//! `TeamCache` lives for exactly one run. Each team gets its own slot guarded
//! by a `Mutex`; the first caller for a team holds the slot lock while it
//! fetches, so concurrent callers for the same team wait for that fetch
//! instead of issuing their own. Callers for different teams never block
//! each other beyond the brief map lookup.
//!
//! A failed fetch leaves the slot empty. Fetch failures are fatal to the run,
//! so nothing retries within the same run.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use tracing::debug;

use custodian_contracts::error::{CustodianError, CustodianResult};

use crate::traits::TeamDirectory;

type Members = Arc<BTreeSet<String>>;
type Slot = Arc<Mutex<Option<Members>>>;

/// Per-run memo of team memberships in front of a `TeamDirectory`.
pub struct TeamCache<'a> {
    directory: &'a dyn TeamDirectory,
    slots: Mutex<HashMap<String, Slot>>,
}

impl<'a> TeamCache<'a> {
    pub fn new(directory: &'a dyn TeamDirectory) -> Self {
        Self {
            directory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Members of `team`, fetched on first access and shared afterwards.
    pub fn members(&self, team: &str) -> CustodianResult<Members> {
        let slot = {
            let mut slots = self.slots.lock().map_err(|e| poisoned(team, e))?;
            Arc::clone(slots.entry(team.to_string()).or_default())
        };

        let mut guard = slot.lock().map_err(|e| poisoned(team, e))?;
        if let Some(members) = guard.as_ref() {
            return Ok(Arc::clone(members));
        }

        debug!(team = %team, "resolving team membership");
        let members = Arc::new(self.directory.team_members(team)?);
        *guard = Some(Arc::clone(&members));
        Ok(members)
    }

    /// Number of teams resolved so far.
    #[cfg(test)]
    fn resolved_count(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| {
                slots
                    .values()
                    .filter(|slot| slot.lock().map(|s| s.is_some()).unwrap_or(false))
                    .count()
            })
            .unwrap_or(0)
    }
}

fn poisoned<E: std::fmt::Display>(team: &str, e: E) -> CustodianError {
    CustodianError::FetchFailed {
        operation: format!("resolve team '{team}'"),
        reason: format!("team cache lock poisoned: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use custodian_contracts::error::{CustodianError, CustodianResult};

    use super::TeamCache;
    use crate::traits::TeamDirectory;

    /// A directory that counts fetches per team and sleeps to widen races.
    struct CountingDirectory {
        teams: HashMap<String, BTreeSet<String>>,
        fetches: Mutex<HashMap<String, usize>>,
        total: AtomicUsize,
    }

    impl CountingDirectory {
        fn new(teams: &[(&str, &[&str])]) -> Self {
            Self {
                teams: teams
                    .iter()
                    .map(|(t, ms)| (t.to_string(), ms.iter().map(|m| m.to_string()).collect()))
                    .collect(),
                fetches: Mutex::new(HashMap::new()),
                total: AtomicUsize::new(0),
            }
        }
    }

    impl TeamDirectory for CountingDirectory {
        fn team_members(&self, team: &str) -> CustodianResult<BTreeSet<String>> {
            self.total.fetch_add(1, Ordering::SeqCst);
            *self.fetches.lock().unwrap().entry(team.to_string()).or_insert(0) += 1;
            thread::sleep(Duration::from_millis(5));
            self.teams
                .get(team)
                .cloned()
                .ok_or_else(|| CustodianError::FetchFailed {
                    operation: format!("fetch team '{team}'"),
                    reason: "not found".to_string(),
                })
        }
    }

    #[test]
    fn test_second_lookup_is_served_from_cache() {
        let directory = CountingDirectory::new(&[("core", &["alice", "bob"])]);
        let cache = TeamCache::new(&directory);

        let first = cache.members("core").unwrap();
        let second = cache.members("core").unwrap();

        assert_eq!(first, second);
        assert!(first.contains("alice"));
        assert_eq!(directory.total.load(Ordering::SeqCst), 1);
        assert_eq!(cache.resolved_count(), 1);
    }

    /// Many threads racing on the same teams still fetch each team once.
    #[test]
    fn test_concurrent_lookups_fetch_each_team_once() {
        let directory = CountingDirectory::new(&[("core", &["alice"]), ("ops", &["carol"])]);
        let cache = TeamCache::new(&directory);

        thread::scope(|scope| {
            for i in 0..16 {
                let cache = &cache;
                scope.spawn(move || {
                    let team = if i % 2 == 0 { "core" } else { "ops" };
                    cache.members(team).unwrap();
                });
            }
        });

        let fetches = directory.fetches.lock().unwrap();
        assert_eq!(fetches.get("core"), Some(&1));
        assert_eq!(fetches.get("ops"), Some(&1));
        assert_eq!(cache.resolved_count(), 2);
    }

    #[test]
    fn test_failed_fetch_is_not_cached() {
        let directory = CountingDirectory::new(&[]);
        let cache = TeamCache::new(&directory);

        assert!(matches!(
            cache.members("ghosts"),
            Err(CustodianError::FetchFailed { .. })
        ));
        assert_eq!(cache.resolved_count(), 0);
    }
}
