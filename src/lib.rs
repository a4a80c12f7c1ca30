//! DiffBot: character-voiced pull request commentary.
//!
//! Inspects a pull request's metadata, evaluates a catalog of boolean
//! "facts" against it, and synthesizes a stylized comment from those facts
//! using a per-character phrase bank, with checklist sections linking to
//! uploaded diff images. Network access (fetching the PR, uploading images,
//! posting the comment) sits behind the `Forge` trait; everything else is
//! synchronous and side-effect-free apart from explicit random draws.

pub mod analysis;
pub mod comment;
pub mod diff;
pub mod github;
pub mod quips;
pub mod record;

pub use analysis::{AnalysisError, Predicate, Registry};
pub use comment::{Artifact, ArtifactStatus, synthesize};
pub use github::{Forge, GitHub, Repo, parse_pr_url};
pub use quips::{QuipDb, QuipError};
pub use record::{ChangeType, ChangedFile, Commit, IssueComment, PullRequest, RecordError};
