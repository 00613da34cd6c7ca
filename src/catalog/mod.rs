//! Voice catalog and selection
//!
//! A [`Catalog`] is an immutable snapshot of the engine's voices, taken once
//! per load. Each voice gets a gender classification and a display label
//! that is unique within the catalog, so the label can be used as the
//! selection key in the UI.

pub mod gender;
pub mod label;
pub mod loader;

pub use gender::{classify_gender, Gender};
pub use label::{build_label, short_id};
pub use loader::{load_catalog, CatalogLoad};

use crate::speech::{Engine, RawVoice};
use crate::{Result, VoxError};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::str::FromStr;

/// Shown in place of an empty filter result
pub const NO_MATCH: &str = "(No match)";

/// A classified, labelled voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub language: Option<String>,
    pub gender: Gender,
    pub label: String,
}

/// Gender filter dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenderFacet {
    #[default]
    Any,
    Male,
    Female,
    Unknown,
}

impl GenderFacet {
    pub fn admits(self, gender: Gender) -> bool {
        match self {
            GenderFacet::Any => true,
            GenderFacet::Male => gender == Gender::Male,
            GenderFacet::Female => gender == Gender::Female,
            GenderFacet::Unknown => gender == Gender::Unknown,
        }
    }
}

impl FromStr for GenderFacet {
    type Err = VoxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "any" | "all" => Ok(GenderFacet::Any),
            "male" | "m" => Ok(GenderFacet::Male),
            "female" | "f" => Ok(GenderFacet::Female),
            "unknown" | "?" => Ok(GenderFacet::Unknown),
            other => Err(VoxError::Other(format!("unknown gender filter '{}'", other))),
        }
    }
}

/// Ordered, immutable set of voices from one enumeration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    voices: Vec<Voice>,
}

impl Catalog {
    /// A catalog with no voices; a valid state meaning "no voices found"
    pub fn empty() -> Self {
        Self::default()
    }

    /// Classify and label raw voices, keeping enumeration order
    ///
    /// A label that collides with an earlier one gets a ` (2)`, ` (3)` ...
    /// suffix, so every voice stays selectable.
    pub fn from_raw(raw: Vec<RawVoice>) -> Self {
        let mut seen = HashSet::with_capacity(raw.len());
        let voices = raw
            .into_iter()
            .map(|r| {
                let gender = classify_gender(&r);
                let base = build_label(&r.id, &r.name, r.language.as_deref(), gender);
                let mut label = base.clone();
                let mut n = 2;
                while seen.contains(&label) {
                    label = format!("{} ({})", base, n);
                    n += 1;
                }
                if label != base {
                    warn!("Duplicate voice label '{}' renamed to '{}'", base, label);
                }
                seen.insert(label.clone());

                Voice {
                    id: r.id,
                    name: r.name,
                    language: r.language,
                    gender,
                    label,
                }
            })
            .collect();

        Self { voices }
    }

    /// Enumerate the engine's voices
    ///
    /// Enumeration failure and an empty voice list both come back as
    /// `BackendUnavailable`; callers fall back to [`Catalog::empty`].
    pub fn load(engine: &Engine) -> Result<Self> {
        let raw = engine
            .list_voices()
            .map_err(|e| VoxError::BackendUnavailable(e.to_string()))?;
        if raw.is_empty() {
            return Err(VoxError::BackendUnavailable(format!(
                "the {} engine reported no voices",
                engine.name()
            )));
        }
        debug!("Loaded {} voices from {}", raw.len(), engine.name());
        Ok(Self::from_raw(raw))
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Voice> {
        self.voices.iter().find(|v| v.id == id)
    }

    pub fn by_label(&self, label: &str) -> Option<&Voice> {
        self.voices.iter().find(|v| v.label == label)
    }

    /// Map a display label back to its voice id
    pub fn id_for_label(&self, label: &str) -> Option<&str> {
        self.by_label(label).map(|v| v.id.as_str())
    }

    /// Re-resolve a selection after a reload
    ///
    /// Keeps the previous voice if its id survived, otherwise the first
    /// voice; `None` only for an empty catalog.
    pub fn resolve_selection(&self, previous_id: Option<&str>) -> Option<&Voice> {
        previous_id
            .and_then(|id| self.get(id))
            .or_else(|| self.voices.first())
    }

    /// Voices whose label contains `query` (case-insensitive) and whose
    /// gender passes `facet`, in catalog order
    pub fn filter_voices(&self, query: &str, facet: GenderFacet) -> Vec<&Voice> {
        let needle = query.trim().to_lowercase();
        self.voices
            .iter()
            .filter(|v| facet.admits(v.gender))
            .filter(|v| needle.is_empty() || v.label.to_lowercase().contains(&needle))
            .collect()
    }

    /// Labels of [`Catalog::filter_voices`]
    pub fn filter(&self, query: &str, facet: GenderFacet) -> Vec<&str> {
        self.filter_voices(query, facet)
            .into_iter()
            .map(|v| v.label.as_str())
            .collect()
    }
}

/// What a selection list should show for a filter result
pub fn labels_or_no_match<'a>(labels: &[&'a str]) -> Vec<&'a str> {
    if labels.is_empty() {
        vec![NO_MATCH]
    } else {
        labels.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        Catalog::from_raw(vec![
            RawVoice::new("v1", "Zira").with_gender("female"),
            RawVoice::new("v2", "David").with_gender("male"),
            RawVoice::new("eo", "Esperanto").with_language("eo"),
        ])
    }

    #[test]
    fn test_labels_rendered() {
        let catalog = sample();
        assert_eq!(catalog.voices()[0].label, "Zira - Female - v1");
        assert_eq!(catalog.voices()[1].label, "David - Male - v2");
        assert_eq!(catalog.voices()[2].label, "Esperanto (eo) - Unknown - eo");
    }

    #[test]
    fn test_filter_by_facet() {
        let catalog = sample();
        assert_eq!(catalog.filter("", GenderFacet::Female), vec!["Zira - Female - v1"]);
        assert_eq!(catalog.filter("", GenderFacet::Male), vec!["David - Male - v2"]);
        assert_eq!(catalog.filter("", GenderFacet::Any).len(), 3);
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let catalog = sample();
        assert_eq!(
            catalog.filter("ZIRA", GenderFacet::Any),
            catalog.filter("zira", GenderFacet::Any)
        );
        assert!(catalog.filter("nobody", GenderFacet::Any).is_empty());
    }

    #[test]
    fn test_duplicate_labels_disambiguated() {
        let catalog = Catalog::from_raw(vec![
            RawVoice::new("a:x", "Voice"),
            RawVoice::new("b:x", "Voice"),
            RawVoice::new("c:x", "Voice"),
        ]);
        let labels: Vec<_> = catalog.voices().iter().map(|v| v.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Voice - Unknown - x", "Voice - Unknown - x (2)", "Voice - Unknown - x (3)"]
        );
        assert_eq!(catalog.id_for_label("Voice - Unknown - x"), Some("a:x"));
        assert_eq!(catalog.id_for_label("Voice - Unknown - x (3)"), Some("c:x"));
    }

    #[test]
    fn test_resolve_selection() {
        let catalog = sample();
        assert_eq!(catalog.resolve_selection(Some("v2")).unwrap().id, "v2");
        assert_eq!(catalog.resolve_selection(Some("gone")).unwrap().id, "v1");
        assert_eq!(catalog.resolve_selection(None).unwrap().id, "v1");
        assert!(Catalog::empty().resolve_selection(Some("v1")).is_none());
    }

    #[test]
    fn test_labels_or_no_match() {
        assert_eq!(labels_or_no_match(&[]), vec![NO_MATCH]);
        assert_eq!(labels_or_no_match(&["a"]), vec!["a"]);
    }

    #[test]
    fn test_facet_parsing() {
        assert_eq!("Female".parse::<GenderFacet>().unwrap(), GenderFacet::Female);
        assert_eq!("".parse::<GenderFacet>().unwrap(), GenderFacet::Any);
        assert!("robot".parse::<GenderFacet>().is_err());
    }
}
