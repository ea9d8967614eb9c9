use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Saved selections of an attempt, keyed by question id. Only answered questions appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct AnswerDraft(BTreeMap<String, String>);

impl AnswerDraft {
    /// Reads the JSONB draft column. Anything that is not a string-to-string map is ignored.
    pub(crate) fn from_value(value: &serde_json::Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };

        Self(
            map.iter()
                .filter_map(|(question_id, option)| {
                    option.as_str().map(|option_id| (question_id.clone(), option_id.to_string()))
                })
                .collect(),
        )
    }

    pub(crate) fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or_else(|_| serde_json::json!({}))
    }

    pub(crate) fn get(&self, question_id: &str) -> Option<&str> {
        self.0.get(question_id).map(String::as_str)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct CacheEntry {
    pub(crate) question_id: String,
    pub(crate) chosen_option_id: Option<String>,
}

/// One entry per question of the attempt, in presentation order.
#[derive(Debug, Clone, Default)]
pub(crate) struct AnswerCache {
    entries: Vec<CacheEntry>,
    index: HashMap<String, usize>,
}

impl AnswerCache {
    pub(crate) fn new<I, S>(question_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cache = Self::default();
        for question_id in question_ids {
            let question_id = question_id.into();
            if cache.index.contains_key(&question_id) {
                continue;
            }
            cache.index.insert(question_id.clone(), cache.entries.len());
            cache.entries.push(CacheEntry { question_id, chosen_option_id: None });
        }
        cache
    }

    /// Overwrites the selection for `question_id`. Returns `false` for unknown questions.
    pub(crate) fn set(&mut self, question_id: &str, option_id: Option<String>) -> bool {
        match self.index.get(question_id) {
            Some(&position) => {
                self.entries[position].chosen_option_id = option_id;
                true
            }
            None => false,
        }
    }

    pub(crate) fn chosen(&self, question_id: &str) -> Option<&str> {
        self.index
            .get(question_id)
            .and_then(|&position| self.entries[position].chosen_option_id.as_deref())
    }

    pub(crate) fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn answered_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.chosen_option_id.is_some()).count()
    }

    /// Applies a saved draft; entries for questions no longer in the test are dropped.
    pub(crate) fn restore(&mut self, draft: &AnswerDraft) {
        for entry in &mut self.entries {
            if let Some(option_id) = draft.get(&entry.question_id) {
                entry.chosen_option_id = Some(option_id.to_string());
            }
        }
    }

    pub(crate) fn to_draft(&self) -> AnswerDraft {
        AnswerDraft(
            self.entries
                .iter()
                .filter_map(|entry| {
                    entry
                        .chosen_option_id
                        .as_ref()
                        .map(|option_id| (entry.question_id.clone(), option_id.clone()))
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_entry_per_question_and_last_selection_wins() {
        let mut cache = AnswerCache::new(["q1", "q2", "q3"]);

        assert!(cache.set("q1", Some("a".into())));
        assert!(cache.set("q2", Some("b".into())));
        assert!(cache.set("q1", Some("c".into())));
        assert!(cache.set("q2", None));

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.chosen("q1"), Some("c"));
        assert_eq!(cache.chosen("q2"), None);
        assert_eq!(cache.answered_count(), 1);
    }

    #[test]
    fn unknown_question_is_rejected() {
        let mut cache = AnswerCache::new(["q1"]);

        assert!(!cache.set("q9", Some("a".into())));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn duplicate_ids_collapse_to_one_entry() {
        let cache = AnswerCache::new(["q1", "q1", "q2"]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn draft_restores_known_questions_only() {
        let value = serde_json::json!({ "q1": "a", "gone": "x", "q2": 7 });
        let draft = AnswerDraft::from_value(&value);
        assert_eq!(draft.len(), 2);

        let mut cache = AnswerCache::new(["q1", "q2"]);
        cache.restore(&draft);

        assert_eq!(cache.chosen("q1"), Some("a"));
        assert_eq!(cache.chosen("q2"), None);
        assert_eq!(cache.to_draft().to_value(), serde_json::json!({ "q1": "a" }));
    }

    #[test]
    fn non_object_draft_is_empty() {
        assert_eq!(AnswerDraft::from_value(&serde_json::json!([1, 2])).len(), 0);
    }
}
