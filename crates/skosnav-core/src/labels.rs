//! Display label resolution.
//!
//! A resource usually carries several label literals: different predicates,
//! different languages, sometimes untagged. [`select_label`] picks exactly one
//! of them, first by language and then by predicate priority.
//!
//! # Language selection
//!
//! 1. Candidates in the caller's preferred language.
//! 2. Otherwise candidates in the earliest language of the endpoint's
//!    language-priority list that has any.
//! 3. Otherwise untagged candidates.
//! 4. Otherwise every candidate.
//!
//! # Tie-breaking
//!
//! Within the surviving pool the [`PriorityTable`] rank decides; equal ranks
//! fall back to comparing value and then language tag, so the result never
//! depends on the order rows arrived in.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::{LabelCandidate, LabelPredicate, ResolvedLabel, ResourceKind};

// ============================================================================
// Priority tables
// ============================================================================

const CONCEPT_PRIORITY: &[LabelPredicate] = &[
    LabelPredicate::PrefLabel,
    LabelPredicate::XlPrefLabel,
    LabelPredicate::RdfsLabel,
];

const SCHEME_PRIORITY: &[LabelPredicate] = &[
    LabelPredicate::PrefLabel,
    LabelPredicate::XlPrefLabel,
    LabelPredicate::DctTitle,
    LabelPredicate::DcTitle,
    LabelPredicate::RdfsLabel,
];

/// Predicate ranking used to break ties between label candidates.
///
/// Concepts use a short table without title predicates; schemes and
/// collections also accept `dcterms:title` and the legacy `dc:title`.
/// Predicates missing from a table never produce a label for that kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriorityTable {
    order: &'static [LabelPredicate],
}

impl PriorityTable {
    /// Table for concepts.
    pub const CONCEPT: PriorityTable = PriorityTable {
        order: CONCEPT_PRIORITY,
    };

    /// Table for schemes and collections.
    pub const SCHEME: PriorityTable = PriorityTable {
        order: SCHEME_PRIORITY,
    };

    /// The table for a resource kind.
    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Concept => Self::CONCEPT,
            ResourceKind::Scheme | ResourceKind::Collection => Self::SCHEME,
        }
    }

    /// Rank of a predicate; lower is better. `None` when not in the table.
    pub fn rank(&self, predicate: LabelPredicate) -> Option<usize> {
        self.order.iter().position(|p| *p == predicate)
    }

    /// Predicates in rank order.
    pub fn predicates(&self) -> &'static [LabelPredicate] {
        self.order
    }
}

// ============================================================================
// Language preference
// ============================================================================

/// The caller's language chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguagePreference {
    /// Single preferred language, e.g. `en`.
    pub preferred: String,
    /// Endpoint language priority list, best first.
    pub priority: Vec<String>,
}

impl Default for LanguagePreference {
    fn default() -> Self {
        Self {
            preferred: "en".to_string(),
            priority: Vec::new(),
        }
    }
}

impl LanguagePreference {
    /// Create a preference with an empty priority list.
    pub fn new(preferred: impl Into<String>) -> Self {
        Self {
            preferred: preferred.into(),
            priority: Vec::new(),
        }
    }

    /// Set the endpoint language priority list.
    pub fn with_priority<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority = languages.into_iter().map(Into::into).collect();
        self
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Pick one display label from `candidates`.
///
/// Returns `None` when no candidate uses a predicate in `table`.
pub fn select_label(
    candidates: &[LabelCandidate],
    table: &PriorityTable,
    languages: &LanguagePreference,
) -> Option<ResolvedLabel> {
    let eligible: Vec<&LabelCandidate> = candidates
        .iter()
        .filter(|c| table.rank(c.predicate).is_some())
        .collect();
    if eligible.is_empty() {
        return None;
    }

    language_pool(&eligible, languages)
        .into_iter()
        .min_by(|a, b| compare_candidates(a, b, table))
        .map(ResolvedLabel::from)
}

fn language_pool<'a>(
    candidates: &[&'a LabelCandidate],
    languages: &LanguagePreference,
) -> Vec<&'a LabelCandidate> {
    let in_language = |lang: &str| -> Vec<&'a LabelCandidate> {
        candidates
            .iter()
            .copied()
            .filter(|c| !c.is_untagged() && c.language.eq_ignore_ascii_case(lang))
            .collect()
    };

    if !languages.preferred.is_empty() {
        let preferred = in_language(&languages.preferred);
        if !preferred.is_empty() {
            return preferred;
        }
    }

    for lang in languages.priority.iter().filter(|l| !l.is_empty()) {
        let ranked = in_language(lang);
        if !ranked.is_empty() {
            return ranked;
        }
    }

    let untagged: Vec<&LabelCandidate> = candidates
        .iter()
        .copied()
        .filter(|c| c.is_untagged())
        .collect();
    if !untagged.is_empty() {
        return untagged;
    }

    candidates.to_vec()
}

fn compare_candidates(a: &LabelCandidate, b: &LabelCandidate, table: &PriorityTable) -> Ordering {
    let rank = |c: &LabelCandidate| table.rank(c.predicate).unwrap_or(usize::MAX);
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.value.cmp(&b.value))
        .then_with(|| a.language.cmp(&b.language))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn c(value: &str, lang: &str, predicate: LabelPredicate) -> LabelCandidate {
        LabelCandidate::new(value, lang, predicate)
    }

    fn permutations(items: &[LabelCandidate]) -> Vec<Vec<LabelCandidate>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head.clone());
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_scheme_priority_order() {
        let en = LanguagePreference::new("en");
        let mut candidates = vec![
            c("Primary", "en", LabelPredicate::PrefLabel),
            c("Extended", "en", LabelPredicate::XlPrefLabel),
            c("Legacy", "en", LabelPredicate::DcTitle),
        ];

        let label = select_label(&candidates, &PriorityTable::SCHEME, &en).unwrap();
        assert_eq!(label.text, "Primary");
        assert_eq!(label.predicate, LabelPredicate::PrefLabel);

        candidates.remove(0);
        let label = select_label(&candidates, &PriorityTable::SCHEME, &en).unwrap();
        assert_eq!(label.text, "Extended");
        assert_eq!(label.predicate, LabelPredicate::XlPrefLabel);
        assert_eq!(label.language, "en");
    }

    #[test]
    fn test_title_before_generic_label_for_collections() {
        let candidates = vec![
            c("Generic", "en", LabelPredicate::RdfsLabel),
            c("Legacy", "en", LabelPredicate::DcTitle),
            c("Title", "en", LabelPredicate::DctTitle),
        ];
        let table = PriorityTable::for_kind(ResourceKind::Collection);
        let label = select_label(&candidates, &table, &LanguagePreference::new("en")).unwrap();
        assert_eq!(label.text, "Title");
    }

    #[test]
    fn test_concept_table_ignores_titles() {
        let candidates = vec![
            c("Title", "en", LabelPredicate::DctTitle),
            c("Legacy", "en", LabelPredicate::DcTitle),
        ];
        let table = PriorityTable::for_kind(ResourceKind::Concept);
        assert!(select_label(&candidates, &table, &LanguagePreference::new("en")).is_none());

        let with_generic = vec![
            c("Title", "en", LabelPredicate::DctTitle),
            c("generic", "en", LabelPredicate::RdfsLabel),
        ];
        let label = select_label(&with_generic, &table, &LanguagePreference::new("en")).unwrap();
        assert_eq!(label.text, "generic");
    }

    #[test]
    fn test_language_falls_back_to_endpoint_priority() {
        let prefs = LanguagePreference::new("en").with_priority(["en", "fr"]);
        let candidates = vec![c("Bonjour", "fr", LabelPredicate::PrefLabel)];
        let label = select_label(&candidates, &PriorityTable::SCHEME, &prefs).unwrap();
        assert_eq!(label.text, "Bonjour");
        assert_eq!(label.language, "fr");
    }

    #[test]
    fn test_earliest_priority_language_wins() {
        let prefs = LanguagePreference::new("en").with_priority(["de", "fr"]);
        let candidates = vec![
            c("Bonjour", "fr", LabelPredicate::PrefLabel),
            c("Hallo", "de", LabelPredicate::RdfsLabel),
        ];
        let label = select_label(&candidates, &PriorityTable::CONCEPT, &prefs).unwrap();
        assert_eq!(label.text, "Hallo");
    }

    #[test]
    fn test_language_beats_predicate_rank() {
        let prefs = LanguagePreference::new("en");
        let candidates = vec![
            c("Bonjour", "fr", LabelPredicate::PrefLabel),
            c("hello", "EN", LabelPredicate::RdfsLabel),
        ];
        let label = select_label(&candidates, &PriorityTable::CONCEPT, &prefs).unwrap();
        assert_eq!(label.text, "hello");
    }

    #[test]
    fn test_untagged_then_anything() {
        let prefs = LanguagePreference::new("en").with_priority(["de"]);
        let candidates = vec![
            c("Bonjour", "fr", LabelPredicate::PrefLabel),
            c("plain", "", LabelPredicate::RdfsLabel),
        ];
        let label = select_label(&candidates, &PriorityTable::CONCEPT, &prefs).unwrap();
        assert_eq!(label.text, "plain");

        let only_foreign = vec![
            c("Hola", "es", LabelPredicate::RdfsLabel),
            c("Bonjour", "fr", LabelPredicate::PrefLabel),
        ];
        let label = select_label(&only_foreign, &PriorityTable::CONCEPT, &prefs).unwrap();
        assert_eq!(label.text, "Bonjour");
    }

    #[test]
    fn test_empty_candidates() {
        assert!(select_label(&[], &PriorityTable::SCHEME, &LanguagePreference::default()).is_none());
    }

    #[test]
    fn test_deterministic_under_all_permutations() {
        let prefs = LanguagePreference::new("en").with_priority(["fr"]);
        let candidates = vec![
            c("Zeta", "fr", LabelPredicate::PrefLabel),
            c("Alpha", "fr", LabelPredicate::PrefLabel),
            c("Beta", "fr", LabelPredicate::XlPrefLabel),
            c("Gamma", "", LabelPredicate::PrefLabel),
            c("Delta", "de", LabelPredicate::PrefLabel),
        ];
        let expected = select_label(&candidates, &PriorityTable::SCHEME, &prefs).unwrap();
        assert_eq!(expected.text, "Alpha");

        for permutation in permutations(&candidates) {
            let label = select_label(&permutation, &PriorityTable::SCHEME, &prefs).unwrap();
            assert_eq!(label, expected);
        }
    }

    fn arb_candidate() -> impl Strategy<Value = LabelCandidate> {
        (
            "[a-c]{1,3}",
            prop::sample::select(vec!["", "en", "fr", "de"]),
            prop::sample::select(LabelPredicate::ALL.to_vec()),
        )
            .prop_map(|(value, lang, predicate)| LabelCandidate::new(value, lang, predicate))
    }

    proptest! {
        #[test]
        fn prop_selection_ignores_arrival_order(
            candidates in prop::collection::vec(arb_candidate(), 0..8),
            seed in any::<u64>(),
        ) {
            let prefs = LanguagePreference::new("en").with_priority(["fr", "de"]);
            let mut shuffled = candidates.clone();
            // Deterministic rotation + reversal driven by the seed.
            if !shuffled.is_empty() {
                let k = (seed as usize) % shuffled.len();
                shuffled.rotate_left(k);
                if seed % 2 == 0 {
                    shuffled.reverse();
                }
            }
            for table in [PriorityTable::CONCEPT, PriorityTable::SCHEME] {
                prop_assert_eq!(
                    select_label(&candidates, &table, &prefs),
                    select_label(&shuffled, &table, &prefs)
                );
            }
        }
    }
}
