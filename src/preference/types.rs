use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

/// Closed set of preference categories the engine tracks.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PreferenceCategory {
    CodeStyle,
    Verbosity,
    Tone,
    ToolPreference,
    LanguageFramework,
}

/// One learned preference value with its supporting evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preference {
    pub value: String,
    /// Confidence in [0, 1]; asymptotic to 1 under repeated agreement.
    pub confidence: f64,
    pub evidence_count: u32,
    pub last_updated: DateTime<Utc>,
}

/// A single preference signal extracted from text (or synthesized from
/// feedback).
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub category: PreferenceCategory,
    pub value: String,
    pub confidence: f64,
}

/// Per-session preference state: category → learned preference.
///
/// `BTreeMap` keeps directive order stable across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferenceProfile {
    entries: BTreeMap<PreferenceCategory, Preference>,
}

impl PreferenceProfile {
    pub fn get(&self, category: PreferenceCategory) -> Option<&Preference> {
        self.entries.get(&category)
    }

    pub(crate) fn get_mut(&mut self, category: PreferenceCategory) -> Option<&mut Preference> {
        self.entries.get_mut(&category)
    }

    pub(crate) fn insert(&mut self, category: PreferenceCategory, preference: Preference) {
        self.entries.insert(category, preference);
    }

    pub fn iter(&self) -> impl Iterator<Item = (PreferenceCategory, &Preference)> {
        self.entries.iter().map(|(category, pref)| (*category, pref))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
