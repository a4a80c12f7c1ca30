//! Fact evaluation: a registry of named predicates run against one pull
//! request.
//!
//! Analyzers are pure functions that inspect a pull request record and
//! return true or false depending on whether the analyzer's fact holds.
//! Each built-in analyzer is registered under its function name, and that
//! name doubles as the key into the quip database, so every analyzer here
//! needs a matching phrase list per supported character.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike, Utc, Weekday};
use thiserror::Error;
use tracing::{debug, warn};

use crate::record::{ChangeType, PullRequest, RecordError};

/// A named boolean predicate over a pull request. The evaluation time is
/// passed in explicitly so clock-dependent analyzers stay testable.
pub type Predicate = fn(&PullRequest, DateTime<Utc>) -> Result<bool, RecordError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analyzer '{analyzer}' failed")]
    Failed {
        analyzer: &'static str,
        #[source]
        source: RecordError,
    },
}

/// Collection of analyzers, populated once at start-up and read-only during
/// a run. Registering a name twice overwrites the earlier predicate, with a
/// warning; last registration wins.
#[derive(Default)]
pub struct Registry {
    analyzers: BTreeMap<&'static str, Predicate>,
}

macro_rules! register_analyzers {
    ($registry:expr, $($analyzer:ident),+ $(,)?) => {
        $($registry.register(stringify!($analyzer), $analyzer);)+
    };
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the full built-in analyzer catalog.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        register_analyzers!(
            registry,
            no_requested_reviewers,
            more_than_three_reviewers,
            description_empty,
            description_tweetable,
            description_over_150_words,
            last_commit_on_weekend_pst,
            last_commit_between_4am_and_7am_pst,
            last_commit_between_8pm_and_3am_pst,
            last_commit_on_halloween_pst,
            last_commit_on_new_years_day_pst,
            last_commit_on_christmas_pst,
            last_commit_on_april_fools_pst,
            last_commit_friday_afternoon_pst,
            at_least_3_participants,
            less_than_2_participants,
            at_least_one_file_renamed,
            only_deletions,
            more_than_1000_net_additions,
            more_than_1000_net_deletions,
            more_than_10_files_deleted,
            more_than_10_files_added,
            more_than_10_comments,
            no_changes_to_files,
            at_least_one_labview_vi,
            only_python_changes,
            created_more_than_two_weeks_ago,
            many_changed_labview_vi,
            many_changed_files,
            last_commit_message_contains_fix,
            last_commit_message_contains_bug,
            last_commit_message_contains_rebase,
            last_commit_message_contains_add,
            title_contains_wip,
            title_contains_fix,
            title_contains_add,
            more_than_10_commits,
            more_than_3_commits_in_last_hour,
            comment_contains_lgtm,
        );
        registry
    }

    pub fn register(&mut self, name: &'static str, predicate: Predicate) {
        if self.analyzers.insert(name, predicate).is_some() {
            warn!(analyzer = name, "analyzer re-registered, previous predicate replaced");
        }
    }

    /// All registered analyzer names. Iteration order is an implementation
    /// detail; callers must not rely on it.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.analyzers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }

    /// Run every registered analyzer against the record, returning the set
    /// of names whose predicate held. A failing analyzer aborts the whole
    /// evaluation; these are authorial content generators, and a broken one
    /// should surface rather than silently vanish.
    pub fn evaluate(
        &self,
        pr: &PullRequest,
        now: DateTime<Utc>,
    ) -> Result<BTreeSet<&'static str>, AnalysisError> {
        let mut facts = BTreeSet::new();
        for (&name, predicate) in &self.analyzers {
            if predicate(pr, now).map_err(|source| AnalysisError::Failed {
                analyzer: name,
                source,
            })? {
                facts.insert(name);
            }
        }
        debug!(facts = facts.len(), analyzers = self.analyzers.len(), "evaluation complete");
        Ok(facts)
    }
}

/// Convert a UTC timestamp to PST as a fixed UTC-7 offset.
///
/// This deliberately ignores daylight saving time: the time-of-day
/// analyzers only need an approximate local hour, and the PST/PDT
/// difference does not matter at that granularity.
fn to_pst(timestamp: DateTime<Utc>) -> DateTime<FixedOffset> {
    let pst = FixedOffset::west_opt(7 * 3600).expect("UTC-7 is a valid offset");
    timestamp.with_timezone(&pst)
}

fn last_commit_pst(pr: &PullRequest) -> Result<DateTime<FixedOffset>, RecordError> {
    Ok(to_pst(pr.last_commit()?.committed_date))
}

fn no_requested_reviewers(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.review_requests.is_empty())
}

fn more_than_three_reviewers(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.review_requests.len() > 3)
}

fn description_empty(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.body.is_empty())
}

fn description_tweetable(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    let len = pr.body.chars().count();
    Ok(len > 1 && len < 140)
}

fn description_over_150_words(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.body.split_whitespace().count() > 150)
}

fn last_commit_on_weekend_pst(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    let date = last_commit_pst(pr)?;
    Ok(matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
}

fn last_commit_between_4am_and_7am_pst(
    pr: &PullRequest,
    _now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    let hour = last_commit_pst(pr)?.hour();
    Ok((4..=7).contains(&hour))
}

fn last_commit_between_8pm_and_3am_pst(
    pr: &PullRequest,
    _now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    let hour = last_commit_pst(pr)?.hour();
    Ok(hour >= 20 || hour <= 3)
}

fn last_commit_on_halloween_pst(
    pr: &PullRequest,
    _now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    let date = last_commit_pst(pr)?;
    Ok(date.month() == 10 && date.day() == 31)
}

fn last_commit_on_new_years_day_pst(
    pr: &PullRequest,
    _now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    let date = last_commit_pst(pr)?;
    Ok(date.month() == 1 && date.day() == 1)
}

fn last_commit_on_christmas_pst(
    pr: &PullRequest,
    _now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    let date = last_commit_pst(pr)?;
    Ok(date.month() == 12 && date.day() == 25)
}

fn last_commit_on_april_fools_pst(
    pr: &PullRequest,
    _now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    let date = last_commit_pst(pr)?;
    Ok(date.month() == 4 && date.day() == 1)
}

fn last_commit_friday_afternoon_pst(
    pr: &PullRequest,
    _now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    let date = last_commit_pst(pr)?;
    Ok(date.weekday() == Weekday::Fri && (15..=18).contains(&date.hour()))
}

fn at_least_3_participants(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.participants.len() >= 3)
}

fn less_than_2_participants(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.participants.len() < 2)
}

fn at_least_one_file_renamed(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr
        .files
        .iter()
        .any(|f| f.change_type == ChangeType::Renamed))
}

fn only_deletions(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.additions == 0 && pr.deletions > 0)
}

fn more_than_1000_net_additions(
    pr: &PullRequest,
    _now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    Ok(pr.additions as i64 - pr.deletions as i64 > 1000)
}

fn more_than_1000_net_deletions(
    pr: &PullRequest,
    _now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    Ok(pr.deletions as i64 - pr.additions as i64 > 1000)
}

fn more_than_10_files_deleted(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    let deleted = pr
        .files
        .iter()
        .filter(|f| f.change_type == ChangeType::Deleted)
        .count();
    Ok(deleted > 10)
}

fn more_than_10_files_added(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    let added = pr
        .files
        .iter()
        .filter(|f| f.change_type == ChangeType::Added)
        .count();
    Ok(added > 10)
}

fn more_than_10_comments(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.comments.len() > 10)
}

fn no_changes_to_files(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.changed_files == 0)
}

fn at_least_one_labview_vi(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.files.iter().any(|f| f.path.ends_with(".vi")))
}

fn only_python_changes(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.files.iter().all(|f| f.path.ends_with(".py")))
}

fn created_more_than_two_weeks_ago(
    pr: &PullRequest,
    now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    Ok((now - pr.created_at).num_days() > 14)
}

fn many_changed_labview_vi(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.files.iter().filter(|f| f.path.ends_with(".vi")).count() > 10)
}

fn many_changed_files(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.changed_files > 10)
}

fn last_commit_message_contains_fix(
    pr: &PullRequest,
    _now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    Ok(pr.last_commit()?.message.to_lowercase().contains("fix"))
}

fn last_commit_message_contains_bug(
    pr: &PullRequest,
    _now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    Ok(pr.last_commit()?.message.to_lowercase().contains("bug"))
}

fn last_commit_message_contains_rebase(
    pr: &PullRequest,
    _now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    Ok(pr.last_commit()?.message.to_lowercase().contains("rebase"))
}

// Case-sensitive where the fix/bug/rebase checks are not. Intent in the
// phrase bank is unclear, so the asymmetry is kept as-is.
fn last_commit_message_contains_add(
    pr: &PullRequest,
    _now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    Ok(pr.last_commit()?.message.contains("add"))
}

fn title_contains_wip(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.title.to_lowercase().contains("wip"))
}

fn title_contains_fix(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.title.to_lowercase().contains("fix"))
}

fn title_contains_add(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.title.to_lowercase().contains("add"))
}

fn more_than_10_commits(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr.commits.len() > 10)
}

fn more_than_3_commits_in_last_hour(
    pr: &PullRequest,
    now: DateTime<Utc>,
) -> Result<bool, RecordError> {
    let cutoff = now - Duration::hours(1);
    let recent = pr
        .commits
        .iter()
        .filter(|c| c.committed_date > cutoff)
        .count();
    Ok(recent > 3)
}

fn comment_contains_lgtm(pr: &PullRequest, _now: DateTime<Utc>) -> Result<bool, RecordError> {
    Ok(pr
        .comments
        .iter()
        .any(|c| c.body_text.to_lowercase().contains("lgtm")))
}
