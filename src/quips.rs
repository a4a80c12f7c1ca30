//! The quip database: fact name -> character -> phrase variants.
//!
//! Four reserved entries sit alongside the analyzer facts and are consumed
//! unconditionally by every comment: the avatar image set, the two diff
//! section intros, and the footer phrase.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use thiserror::Error;

use crate::analysis::Registry;

/// Reserved entry holding the character's avatar image URLs.
pub const AVATAR: &str = "avatar";
/// Reserved entry introducing the modified-artifacts checklist.
pub const DIFF_MODIFIED: &str = "diff_modified";
/// Reserved entry introducing the added-artifacts checklist.
pub const DIFF_ADDED: &str = "diff_added";
/// Reserved entry for the trailing footer phrase.
pub const FOOTER: &str = "footer";

const RESERVED: [&str; 4] = [AVATAR, DIFF_MODIFIED, DIFF_ADDED, FOOTER];

/// A lookup that the comment synthesizer cannot survive. Producing a
/// misleading comment is worse than producing none, so a gap in the phrase
/// bank aborts the run instead of degrading to an empty line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuipError {
    #[error("no quips for fact '{fact}'")]
    UnknownFact { fact: String },
    #[error("no quips for character '{character}' under fact '{fact}'")]
    UnknownCharacter { fact: String, character: String },
    #[error("empty quip list for fact '{fact}', character '{character}'")]
    EmptyQuips { fact: String, character: String },
}

/// Two-level phrase bank, loaded from JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct QuipDb(HashMap<String, HashMap<String, Vec<String>>>);

impl QuipDb {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Fail-fast consistency check: every registered analyzer name and
    /// every reserved name must carry a non-empty phrase list for every
    /// supported character. Run this at load time so a gap surfaces before
    /// any comment is attempted.
    pub fn validate(&self, registry: &Registry, characters: &[&str]) -> Result<(), QuipError> {
        for fact in registry.names().chain(RESERVED) {
            for &character in characters {
                self.phrases(fact, character)?;
            }
        }
        Ok(())
    }

    /// The phrase list for one fact and character. All three gaps (fact,
    /// character, empty list) are distinct errors.
    pub fn phrases(&self, fact: &str, character: &str) -> Result<&[String], QuipError> {
        let by_character = self.0.get(fact).ok_or_else(|| QuipError::UnknownFact {
            fact: fact.to_string(),
        })?;
        let phrases = by_character
            .get(character)
            .ok_or_else(|| QuipError::UnknownCharacter {
                fact: fact.to_string(),
                character: character.to_string(),
            })?;
        if phrases.is_empty() {
            return Err(QuipError::EmptyQuips {
                fact: fact.to_string(),
                character: character.to_string(),
            });
        }
        Ok(phrases)
    }

    /// One phrase drawn uniformly at random for the fact and character.
    pub fn pick<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        fact: &str,
        character: &str,
    ) -> Result<&str, QuipError> {
        let phrases = self.phrases(fact, character)?;
        let phrase = phrases.choose(rng).ok_or_else(|| QuipError::EmptyQuips {
            fact: fact.to_string(),
            character: character.to_string(),
        })?;
        Ok(phrase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn single_entry_db(fact: &str, character: &str, phrase: &str) -> QuipDb {
        QuipDb::from_json(&format!(
            r#"{{ "{fact}": {{ "{character}": ["{phrase}"] }} }}"#
        ))
        .unwrap()
    }

    #[test]
    fn pick_draws_from_the_phrase_list() {
        let db = single_entry_db("more_than_10_commits", "Shakespeare", "What industry!");
        let mut rng = StdRng::seed_from_u64(7);
        let phrase = db
            .pick(&mut rng, "more_than_10_commits", "Shakespeare")
            .unwrap();
        assert_eq!(phrase, "What industry!");
    }

    #[test]
    fn missing_fact_is_fatal() {
        let db = single_entry_db("footer", "Shakespeare", "Exeunt.");
        let mut rng = StdRng::seed_from_u64(7);
        let err = db
            .pick(&mut rng, "more_than_10_commits", "Shakespeare")
            .unwrap_err();
        assert_eq!(
            err,
            QuipError::UnknownFact {
                fact: "more_than_10_commits".to_string()
            }
        );
    }

    #[test]
    fn missing_character_and_empty_list_are_distinct() {
        let db = QuipDb::from_json(
            r#"{ "footer": { "Shakespeare": ["Exeunt."], "Yoda": [] } }"#,
        )
        .unwrap();
        assert_eq!(
            db.phrases("footer", "Christopher Walken").unwrap_err(),
            QuipError::UnknownCharacter {
                fact: "footer".to_string(),
                character: "Christopher Walken".to_string()
            }
        );
        assert_eq!(
            db.phrases("footer", "Yoda").unwrap_err(),
            QuipError::EmptyQuips {
                fact: "footer".to_string(),
                character: "Yoda".to_string()
            }
        );
    }

    #[test]
    fn validate_requires_reserved_entries() {
        let registry = Registry::new();
        let db = QuipDb::from_json(
            r#"{
                "avatar": { "Shakespeare": ["http://img/a.png"] },
                "diff_modified": { "Shakespeare": ["Hark, changes:"] },
                "diff_added": { "Shakespeare": ["And new scenes:"] }
            }"#,
        )
        .unwrap();
        assert_eq!(
            db.validate(&registry, &["Shakespeare"]).unwrap_err(),
            QuipError::UnknownFact {
                fact: "footer".to_string()
            }
        );
    }

    #[test]
    fn validate_covers_every_registered_analyzer() {
        let mut registry = Registry::new();
        registry.register("always_true", |_, _| Ok(true));

        let db = QuipDb::from_json(
            r#"{
                "avatar": { "Shakespeare": ["http://img/a.png"] },
                "diff_modified": { "Shakespeare": ["Hark, changes:"] },
                "diff_added": { "Shakespeare": ["And new scenes:"] },
                "footer": { "Shakespeare": ["Exeunt."] }
            }"#,
        )
        .unwrap();
        assert_eq!(
            db.validate(&registry, &["Shakespeare"]).unwrap_err(),
            QuipError::UnknownFact {
                fact: "always_true".to_string()
            }
        );
    }

    #[test]
    fn shipped_quips_cover_builtin_catalog() {
        let db = QuipDb::from_json(include_str!("../quips.json")).unwrap();
        db.validate(&Registry::builtin(), &["Shakespeare"]).unwrap();
    }
}
