//! Best-effort voice gender classification
//!
//! Backends report gender inconsistently or not at all, so explicit
//! metadata is tried first and name heuristics second. Misclassification is
//! expected for unfamiliar voices; the answer is then `Unknown`, never an
//! error.

use crate::speech::RawVoice;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Unknown => "Unknown",
        })
    }
}

/// Names of well-known female voices across engines, matched as whole words
const FEMALE_TOKENS: &[&str] = &[
    "female", "woman", "zira", "hazel", "susan", "heera", "helena", "hortense", "katja",
    "samantha", "victoria", "karen", "moira", "tessa", "fiona", "veena", "kate", "serena",
    "allison", "ava", "amelie", "anna", "alice", "paulina", "monica", "yuna", "ting-ting",
    "sin-ji", "mei-jia", "ioana", "zuzana", "sara", "nora", "kyoko", "laura",
];

/// Names of well-known male voices across engines, matched as whole words
const MALE_TOKENS: &[&str] = &[
    "male", "man", "david", "mark", "george", "james", "richard", "ravi", "stefan", "paul",
    "alex", "daniel", "fred", "tom", "oliver", "thomas", "diego", "jorge", "juan", "luca",
    "maged", "xander", "yuri", "rishi", "aaron", "arthur", "gordon",
];

/// Words in a name or id; `_`, `.` and `\` all separate words in ids
static WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-z]+(?:-[a-z]+)*").expect("word pattern is valid")
});

/// espeak-style variant suffix, e.g. `en-us+f3` or `de+m1`
static VARIANT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\+(?P<gender>[fm])\d*(?:[^a-z]|$)").expect("variant pattern is valid")
});

/// Interpret a backend gender field, if it says anything definite
fn parse_explicit(raw: &str) -> Option<Gender> {
    let value = raw.trim().to_ascii_lowercase();
    let value = value.strip_prefix("voicegender").unwrap_or(&value);
    match value {
        "male" | "m" | "masculine" | "man" => Some(Gender::Male),
        "female" | "f" | "feminine" | "woman" => Some(Gender::Female),
        _ => None,
    }
}

/// Which of the two token lists name a voice
fn heuristic_hits(haystack: &str) -> (bool, bool) {
    let mut female = false;
    let mut male = false;

    for caps in VARIANT.captures_iter(haystack) {
        match &caps["gender"] {
            "f" => female = true,
            _ => male = true,
        }
    }

    // "ting-ting" is one name, "anna-maria" is two
    for word in WORD.find_iter(haystack).map(|m| m.as_str()) {
        for candidate in std::iter::once(word).chain(word.split('-')) {
            female |= FEMALE_TOKENS.contains(&candidate);
            male |= MALE_TOKENS.contains(&candidate);
        }
    }
    (female, male)
}

/// Classify a voice as male, female or unknown
///
/// A name that points both ways is `Unknown`.
pub fn classify_gender(voice: &RawVoice) -> Gender {
    if let Some(gender) = voice.gender.as_deref().and_then(parse_explicit) {
        return gender;
    }

    let haystack = format!("{} {}", voice.name, voice.id).to_lowercase();
    match heuristic_hits(&haystack) {
        (true, false) => Gender::Female,
        (false, true) => Gender::Male,
        _ => Gender::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(id: &str, name: &str, gender: Option<&str>) -> RawVoice {
        let v = RawVoice::new(id, name);
        match gender {
            Some(g) => v.with_gender(g),
            None => v,
        }
    }

    #[test]
    fn test_explicit_metadata_wins() {
        assert_eq!(classify_gender(&voice("v1", "David", Some("female"))), Gender::Female);
        assert_eq!(classify_gender(&voice("v2", "Zira", Some("Male"))), Gender::Male);
        assert_eq!(
            classify_gender(&voice("v3", "Alex", Some("VoiceGenderFemale"))),
            Gender::Female
        );
    }

    #[test]
    fn test_unparseable_metadata_falls_back_to_heuristics() {
        assert_eq!(classify_gender(&voice("v1", "Microsoft Zira", Some("NotSet"))), Gender::Female);
        assert_eq!(classify_gender(&voice("v2", "Microsoft David", Some("--"))), Gender::Male);
    }

    #[test]
    fn test_suffix_markers() {
        assert_eq!(classify_gender(&voice("en-us+f3", "English", None)), Gender::Female);
        assert_eq!(classify_gender(&voice("en-us+m1", "English", None)), Gender::Male);
    }

    #[test]
    fn test_female_is_not_male() {
        assert_eq!(classify_gender(&voice("x", "Generic Female", None)), Gender::Female);
        assert_eq!(classify_gender(&voice("y", "Generic Male", None)), Gender::Male);
    }

    #[test]
    fn test_names_match_whole_words() {
        assert_eq!(
            classify_gender(&voice("HKEY\\TTS_MS_EN-US_ZIRA_11.0", "Microsoft Zira Desktop", None)),
            Gender::Female
        );
        assert_eq!(
            classify_gender(&voice("com.apple.speech.synthesis.voice.Alex", "Alex", None)),
            Gender::Male
        );
        assert_eq!(classify_gender(&voice("zh-tw", "Ting-Ting", None)), Gender::Female);
        assert_eq!(classify_gender(&voice("x", "Anna-Lena", None)), Gender::Female);
    }

    #[test]
    fn test_names_inside_other_words_do_not_count() {
        assert_eq!(classify_gender(&voice("jv", "Javanese", None)), Gender::Unknown);
        assert_eq!(classify_gender(&voice("da", "Denmark", None)), Gender::Unknown);
        assert_eq!(classify_gender(&voice("custom.voice", "Custom", None)), Gender::Unknown);
        assert_eq!(classify_gender(&voice("en+f", "Manual", None)), Gender::Female);
    }

    #[test]
    fn test_conflicting_hints_are_unknown() {
        assert_eq!(classify_gender(&voice("en+m3", "Anna", None)), Gender::Unknown);
        assert_eq!(classify_gender(&voice("v", "Tom and Kate", None)), Gender::Unknown);
    }

    #[test]
    fn test_unknown_when_nothing_matches() {
        assert_eq!(classify_gender(&voice("eo", "Esperanto", None)), Gender::Unknown);
        assert_eq!(classify_gender(&voice("", "", None)), Gender::Unknown);
    }
}
