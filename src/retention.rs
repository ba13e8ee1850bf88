//! Age and usefulness based deletion decisions.

use crate::error::{OrganizeError, OrganizeResult};
use crate::oracle::Oracles;
use chrono::{DateTime, TimeDelta, Utc};
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

/// Outcome of the retention check for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionVerdict {
    Keep,
    DeleteOld,
    DeleteUseless,
    DeleteBoth,
}

impl RetentionVerdict {
    pub fn from_flags(old: bool, useless: bool) -> Self {
        match (old, useless) {
            (false, false) => Self::Keep,
            (true, false) => Self::DeleteOld,
            (false, true) => Self::DeleteUseless,
            (true, true) => Self::DeleteBoth,
        }
    }

    pub fn is_delete(self) -> bool {
        self != Self::Keep
    }
}

/// Decides whether a file should be retired before it is organized.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    max_age: Option<TimeDelta>,
    check_usefulness: bool,
    now: DateTime<Utc>,
}

impl RetentionPolicy {
    /// `max_age_days` of `None` disables the age limit.
    pub fn new(max_age_days: Option<u64>, check_usefulness: bool) -> Self {
        let max_age = max_age_days.map(|days| {
            i64::try_from(days)
                .ok()
                .and_then(TimeDelta::try_days)
                .unwrap_or(TimeDelta::MAX)
        });
        Self {
            max_age,
            check_usefulness,
            now: Utc::now(),
        }
    }

    /// Pins the reference time that ages are measured against.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// True when the file was last modified strictly more than `max_age` ago.
    pub fn is_old(&self, modified: SystemTime) -> bool {
        let Some(max_age) = self.max_age else {
            return false;
        };
        let modified: DateTime<Utc> = modified.into();
        self.now.signed_duration_since(modified) > max_age
    }

    /// Judges a file from its modification time and content sample.
    ///
    /// The usefulness oracle is only consulted for non-empty samples; any
    /// oracle failure counts as "not useless".
    pub fn judge(&self, modified: SystemTime, sample: &str, oracles: &Oracles) -> RetentionVerdict {
        let old = self.is_old(modified);
        let useless = self.check_usefulness
            && !sample.trim().is_empty()
            && match oracles.is_useless(sample) {
                Ok(useless) => useless,
                Err(e) => {
                    debug!(error = %e, "usefulness unknown, keeping");
                    false
                }
            };
        RetentionVerdict::from_flags(old, useless)
    }

    pub fn evaluate(
        &self,
        path: &Path,
        sample: &str,
        oracles: &Oracles,
    ) -> OrganizeResult<RetentionVerdict> {
        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(|e| OrganizeError::fs(path, e))?;
        Ok(self.judge(modified, sample, oracles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleResult;
    use crate::oracle::UsefulnessOracle;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    const DAY: u64 = 86_400;

    struct CountingJudge {
        answer: bool,
        calls: AtomicUsize,
    }

    impl UsefulnessOracle for CountingJudge {
        fn is_useless(&self, _sample: &str) -> OracleResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }
    }

    fn judge_oracles(answer: bool) -> (Oracles, Arc<CountingJudge>) {
        let judge = Arc::new(CountingJudge {
            answer,
            calls: AtomicUsize::new(0),
        });
        let mut oracles = Oracles::disabled();
        oracles.usefulness = judge.clone();
        (oracles, judge)
    }

    fn fixed_now() -> (DateTime<Utc>, SystemTime) {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        (now.into(), now)
    }

    #[test]
    fn test_age_boundary_is_strict() {
        let (now, now_sys) = fixed_now();
        let policy = RetentionPolicy::new(Some(365), false).with_now(now);

        let exactly = now_sys - Duration::from_secs(365 * DAY);
        assert!(!policy.is_old(exactly));
        assert!(policy.is_old(exactly - Duration::from_secs(1)));
        assert!(!policy.is_old(now_sys));
    }

    #[test]
    fn test_no_age_limit() {
        let (now, now_sys) = fixed_now();
        let policy = RetentionPolicy::new(None, false).with_now(now);
        assert!(!policy.is_old(now_sys - Duration::from_secs(10_000 * DAY)));
    }

    #[test]
    fn test_huge_age_limit_does_not_overflow() {
        let (now, now_sys) = fixed_now();
        let policy = RetentionPolicy::new(Some(u64::MAX), false).with_now(now);
        assert!(!policy.is_old(SystemTime::UNIX_EPOCH));
        assert!(!policy.is_old(now_sys));
    }

    #[test]
    fn test_empty_sample_skips_oracle() {
        let (now, now_sys) = fixed_now();
        let (oracles, judge) = judge_oracles(true);
        let policy = RetentionPolicy::new(Some(365), true).with_now(now);

        assert_eq!(policy.judge(now_sys, "", &oracles), RetentionVerdict::Keep);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_old_and_useless() {
        let (now, now_sys) = fixed_now();
        let (oracles, judge) = judge_oracles(true);
        let policy = RetentionPolicy::new(Some(30), true).with_now(now);

        let ancient = now_sys - Duration::from_secs(31 * DAY);
        assert_eq!(
            policy.judge(ancient, "lorem ipsum", &oracles),
            RetentionVerdict::DeleteBoth
        );
        assert_eq!(
            policy.judge(now_sys, "lorem ipsum", &oracles),
            RetentionVerdict::DeleteUseless
        );
        assert_eq!(judge.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_usefulness_check_disabled() {
        let (now, now_sys) = fixed_now();
        let (oracles, judge) = judge_oracles(true);
        let policy = RetentionPolicy::new(None, false).with_now(now);

        assert_eq!(policy.judge(now_sys, "junk", &oracles), RetentionVerdict::Keep);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_oracle_failure_means_useful() {
        let (now, now_sys) = fixed_now();
        let policy = RetentionPolicy::new(None, true).with_now(now);
        assert_eq!(
            policy.judge(now_sys, "some text", &Oracles::disabled()),
            RetentionVerdict::Keep
        );
    }

    #[test]
    fn test_evaluate_reads_mtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.log");
        fs::write(&path, "x").unwrap();
        let two_years_ago = SystemTime::now() - Duration::from_secs(730 * DAY);
        filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(two_years_ago))
            .unwrap();

        let policy = RetentionPolicy::new(Some(365), false);
        let verdict = policy.evaluate(&path, "", &Oracles::disabled()).unwrap();
        assert_eq!(verdict, RetentionVerdict::DeleteOld);

        let missing = dir.path().join("missing.log");
        assert!(policy.evaluate(&missing, "", &Oracles::disabled()).is_err());
    }
}
