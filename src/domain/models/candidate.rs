use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{SensitivityClass, SourceDescriptor};

/// Exact-match metadata predicates applied before relevance ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardFilters {
    #[serde(default)]
    geography: Option<String>,
    #[serde(default)]
    owner_group: Option<String>,
    /// When set, only these classes may match.
    #[serde(default)]
    sensitivity_classes: Option<Vec<SensitivityClass>>,
    /// Classes that never match, whatever else is set.
    #[serde(default)]
    excluded_sensitivity_classes: Vec<SensitivityClass>,
}

impl HardFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_geography(mut self, geography: impl Into<String>) -> Self {
        self.geography = Some(geography.into());
        self
    }

    pub fn with_owner_group(mut self, owner_group: impl Into<String>) -> Self {
        self.owner_group = Some(owner_group.into());
        self
    }

    pub fn with_sensitivity(mut self, class: SensitivityClass) -> Self {
        let classes = self.sensitivity_classes.get_or_insert_with(Vec::new);
        if !classes.contains(&class) {
            classes.push(class);
        }
        self
    }

    pub fn excluding_sensitivity(mut self, class: SensitivityClass) -> Self {
        if !self.excluded_sensitivity_classes.contains(&class) {
            self.excluded_sensitivity_classes.push(class);
        }
        self
    }

    pub fn geography(&self) -> Option<&str> {
        self.geography.as_deref()
    }

    pub fn owner_group(&self) -> Option<&str> {
        self.owner_group.as_deref()
    }

    pub fn sensitivity_classes(&self) -> Option<&[SensitivityClass]> {
        self.sensitivity_classes.as_deref()
    }

    pub fn excluded_sensitivity_classes(&self) -> &[SensitivityClass] {
        &self.excluded_sensitivity_classes
    }

    /// Sensitivity classes a descriptor may have and still match.
    pub fn permitted_sensitivity_classes(&self) -> Vec<SensitivityClass> {
        SensitivityClass::ALL
            .into_iter()
            .filter(|class| self.permits_sensitivity(*class))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.geography.is_none()
            && self.owner_group.is_none()
            && self.sensitivity_classes.is_none()
            && self.excluded_sensitivity_classes.is_empty()
    }

    pub fn matches(&self, descriptor: &SourceDescriptor) -> bool {
        if let Some(ref geography) = self.geography {
            if descriptor.geography() != geography {
                return false;
            }
        }

        if let Some(ref owner) = self.owner_group {
            if descriptor.owner_group() != owner {
                return false;
            }
        }

        self.permits_sensitivity(descriptor.sensitivity_class())
    }

    fn permits_sensitivity(&self, class: SensitivityClass) -> bool {
        if self.excluded_sensitivity_classes.contains(&class) {
            return false;
        }
        self.sensitivity_classes
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&class))
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref geography) = self.geography {
            parts.push(format!("geography={}", geography));
        }
        if let Some(ref owner) = self.owner_group {
            parts.push(format!("owner_group={}", owner));
        }
        if let Some(ref classes) = self.sensitivity_classes {
            parts.push(format!("sensitivity_in={:?}", classes));
        }
        if !self.excluded_sensitivity_classes.is_empty() {
            parts.push(format!(
                "sensitivity_not_in={:?}",
                self.excluded_sensitivity_classes
            ));
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// A descriptor returned by the registry together with its distance to the intent.
#[derive(Debug, Clone)]
pub struct Candidate {
    descriptor: SourceDescriptor,
    distance: f32,
}

impl Candidate {
    pub fn new(descriptor: SourceDescriptor, distance: f32) -> Self {
        Self {
            descriptor,
            distance,
        }
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub fn urn(&self) -> &str {
        self.descriptor.urn()
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Higher is more relevant. Cosine distance lies in [0, 2].
    pub fn relevance_score(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Candidates ordered by increasing distance, ties broken by ascending urn.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
}

impl CandidateSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a set from store output, re-establishing the canonical order so that
    /// ordering never depends on the store implementation.
    pub fn from_ranked(ranked: Vec<(SourceDescriptor, f32)>) -> Self {
        let mut candidates: Vec<Candidate> = ranked
            .into_iter()
            .map(|(descriptor, distance)| Candidate::new(descriptor, distance))
            .collect();
        candidates.sort_by(compare_candidates);
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    pub fn urns(&self) -> Vec<&str> {
        self.candidates.iter().map(Candidate::urn).collect()
    }
}

impl IntoIterator for CandidateSet {
    type Item = Candidate;
    type IntoIter = std::vec::IntoIter<Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

/// Distance ascending, NaN last, then urn ascending.
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    compare_ranked(a.urn(), a.distance, b.urn(), b.distance)
}

pub fn compare_ranked(a_urn: &str, a_distance: f32, b_urn: &str, b_distance: f32) -> Ordering {
    let by_distance = match (a_distance.is_nan(), b_distance.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a_distance.total_cmp(&b_distance),
    };
    by_distance.then_with(|| a_urn.cmp(b_urn))
}
