//! Comment synthesis: turns an evaluated fact set, a phrase bank, and the
//! uploaded diff images into one Markdown comment.

use std::collections::BTreeSet;
use std::fmt::Write;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::quips::{AVATAR, DIFF_ADDED, DIFF_MODIFIED, FOOTER, QuipDb, QuipError};

/// Diff status of one uploaded artifact, from `git diff --name-status`
/// letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    Added,
    Modified,
    Unknown,
}

impl ArtifactStatus {
    pub fn from_letter(letter: &str) -> Self {
        match letter {
            "A" => ArtifactStatus::Added,
            "M" => ArtifactStatus::Modified,
            _ => ArtifactStatus::Unknown,
        }
    }
}

/// One changed file as it appears in the comment: diff status, display
/// name, and the URL of its uploaded diff image.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub status: ArtifactStatus,
    pub name: String,
    pub url: String,
}

/// Assemble the comment text.
///
/// Three independent random draws: the avatar image, the reaction (one fact
/// from the set, then one phrase for it), and the section/footer phrases.
/// Re-running with the same inputs need not reproduce the same text, but
/// the set of possible outputs is fully determined by them. An empty fact
/// set simply omits the reaction line; a gap in the phrase bank is fatal.
pub fn synthesize<R: Rng + ?Sized>(
    rng: &mut R,
    character: &str,
    facts: &BTreeSet<&str>,
    quips: &QuipDb,
    artifacts: &[Artifact],
    build_url: &str,
) -> Result<String, QuipError> {
    let avatar_url = quips.pick(rng, AVATAR, character)?;
    let mut comment = format!(
        "<img align=\"right\" width=\"128\" height=\"128\" src=\"{avatar_url}\">"
    );

    let fact_pool: Vec<&str> = facts.iter().copied().collect();
    if let Some(fact) = fact_pool.choose(rng) {
        let reaction = quips.pick(rng, fact, character)?;
        comment.push_str(reaction);
    }
    comment.push_str("\n\n");

    comment.push_str(quips.pick(rng, DIFF_MODIFIED, character)?);
    comment.push('\n');
    for artifact in artifacts {
        if artifact.status == ArtifactStatus::Modified {
            let _ = writeln!(
                comment,
                "- [ ] [\u{1f528} {}]({})",
                artifact.name, artifact.url
            );
        }
    }

    comment.push_str("\n\n");
    comment.push_str(quips.pick(rng, DIFF_ADDED, character)?);
    comment.push('\n');
    for artifact in artifacts {
        if artifact.status == ArtifactStatus::Added {
            let _ = writeln!(
                comment,
                "- [ ] [\u{2728} {}]({})",
                artifact.name, artifact.url
            );
        }
    }

    let footer = quips.pick(rng, FOOTER, character)?;
    let _ = write!(comment, "\n\n[*{footer}*]({build_url})");
    Ok(comment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const CHARACTER: &str = "Shakespeare";

    fn test_db() -> QuipDb {
        QuipDb::from_json(
            r#"{
                "avatar": { "Shakespeare": ["http://img/bard.png"] },
                "more_than_10_commits": { "Shakespeare": ["What industry!"] },
                "diff_modified": { "Shakespeare": ["Hark, what was altered:"] },
                "diff_added": { "Shakespeare": ["And these did newly enter:"] },
                "footer": { "Shakespeare": ["Exeunt."] }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn single_fact_scenario_produces_all_sections() {
        let mut rng = StdRng::seed_from_u64(42);
        let facts: BTreeSet<&str> = ["more_than_10_commits"].into();
        let artifacts = vec![Artifact {
            status: ArtifactStatus::from_letter("M"),
            name: "foo.vi".to_string(),
            url: "http://x/foo.png".to_string(),
        }];

        let comment = synthesize(
            &mut rng,
            CHARACTER,
            &facts,
            &test_db(),
            &artifacts,
            "http://build/123",
        )
        .unwrap();

        assert!(comment.starts_with(
            "<img align=\"right\" width=\"128\" height=\"128\" src=\"http://img/bard.png\">"
        ));
        assert!(comment.contains("What industry!"));
        assert!(comment.contains("Hark, what was altered:"));
        assert_eq!(
            comment
                .lines()
                .filter(|l| l.contains("foo.vi") && l.contains("http://x/foo.png"))
                .count(),
            1
        );
        assert!(comment.contains("- [ ] [\u{1f528} foo.vi](http://x/foo.png)"));
        assert!(!comment.contains('\u{2728}'));
        assert!(comment.ends_with("[*Exeunt.*](http://build/123)"));
    }

    #[test]
    fn empty_fact_set_omits_reaction_without_fallback() {
        let mut rng = StdRng::seed_from_u64(42);
        let facts = BTreeSet::new();
        let comment = synthesize(
            &mut rng,
            CHARACTER,
            &facts,
            &test_db(),
            &[],
            "http://build/123",
        )
        .unwrap();
        assert!(comment.starts_with(
            "<img align=\"right\" width=\"128\" height=\"128\" src=\"http://img/bard.png\">\n\n"
        ));
        assert!(!comment.contains("What industry!"));
    }

    #[test]
    fn added_and_modified_artifacts_land_in_their_own_sections() {
        let mut rng = StdRng::seed_from_u64(1);
        let artifacts = vec![
            Artifact {
                status: ArtifactStatus::Added,
                name: "new.vi".to_string(),
                url: "http://x/new.png".to_string(),
            },
            Artifact {
                status: ArtifactStatus::Modified,
                name: "old.vi".to_string(),
                url: "http://x/old.png".to_string(),
            },
            Artifact {
                status: ArtifactStatus::Unknown,
                name: "misc.vi".to_string(),
                url: "http://x/misc.png".to_string(),
            },
        ];
        let comment = synthesize(
            &mut rng,
            CHARACTER,
            &BTreeSet::new(),
            &test_db(),
            &artifacts,
            "http://build/9",
        )
        .unwrap();

        let modified_intro = comment.find("Hark, what was altered:").unwrap();
        let added_intro = comment.find("And these did newly enter:").unwrap();
        let old_line = comment.find("old.vi").unwrap();
        let new_line = comment.find("new.vi").unwrap();
        assert!(modified_intro < old_line && old_line < added_intro);
        assert!(added_intro < new_line);
        assert!(!comment.contains("misc.vi"));
    }

    #[test]
    fn fact_missing_from_db_is_fatal() {
        let mut rng = StdRng::seed_from_u64(3);
        let facts: BTreeSet<&str> = ["title_contains_wip"].into();
        let err = synthesize(
            &mut rng,
            CHARACTER,
            &facts,
            &test_db(),
            &[],
            "http://build/123",
        )
        .unwrap_err();
        assert_eq!(
            err,
            QuipError::UnknownFact {
                fact: "title_contains_wip".to_string()
            }
        );
    }

    #[test]
    fn seeded_rng_reproduces_the_same_comment() {
        let facts: BTreeSet<&str> = ["more_than_10_commits"].into();
        let first = synthesize(
            &mut StdRng::seed_from_u64(99),
            CHARACTER,
            &facts,
            &test_db(),
            &[],
            "http://build/1",
        )
        .unwrap();
        let second = synthesize(
            &mut StdRng::seed_from_u64(99),
            CHARACTER,
            &facts,
            &test_db(),
            &[],
            "http://build/1",
        )
        .unwrap();
        assert_eq!(first, second);
    }
}
