use std::collections::{BTreeMap, BTreeSet};

use crate::error::EditorError;
use crate::text_tools::bulk_format;
use crate::{TopicDescriptor, WordPair};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    German,
    Ukrainian,
}

/// Admin-side editing of the topic list and its decks. Decks that were
/// opened stay in memory per topic, so switching topics keeps unsaved edits.
#[derive(Debug, Default)]
pub struct DeckEditor {
    topics: Vec<TopicDescriptor>,
    current: Option<String>,
    decks: BTreeMap<String, Vec<WordPair>>,
    dirty: BTreeSet<String>,
    topics_dirty: bool,
}

pub fn slugify_id(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

impl DeckEditor {
    pub fn new(topics: Vec<TopicDescriptor>) -> Self {
        Self {
            topics,
            ..Self::default()
        }
    }

    pub fn topics(&self) -> &[TopicDescriptor] {
        &self.topics
    }

    pub fn topic(&self, id: &str) -> Option<&TopicDescriptor> {
        self.topics.iter().find(|topic| topic.id == id)
    }

    pub fn current_topic(&self) -> Option<&TopicDescriptor> {
        self.current.as_deref().and_then(|id| self.topic(id))
    }

    pub fn deck(&self) -> &[WordPair] {
        self.current
            .as_ref()
            .and_then(|id| self.decks.get(id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.decks.contains_key(id)
    }

    pub fn has_changes(&self) -> bool {
        self.topics_dirty || !self.dirty.is_empty()
    }

    pub fn create_topic(&mut self, title: &str, raw_id: &str) -> Result<TopicDescriptor, EditorError> {
        let title = title.trim();
        let id = slugify_id(raw_id);
        if title.is_empty() || id.is_empty() {
            return Err(EditorError::MissingField);
        }
        if self.topic(&id).is_some() {
            return Err(EditorError::DuplicateId(id));
        }

        let topic = TopicDescriptor {
            file: format!("data/{id}.json"),
            id: id.clone(),
            title: title.to_string(),
            count: 0,
        };
        self.topics.push(topic.clone());
        self.decks.insert(id.clone(), Vec::new());
        self.dirty.insert(id.clone());
        self.current = Some(id);
        self.topics_dirty = true;
        Ok(topic)
    }

    pub fn delete_topic(&mut self, id: &str) -> Result<TopicDescriptor, EditorError> {
        let index = self
            .topics
            .iter()
            .position(|topic| topic.id == id)
            .ok_or_else(|| EditorError::UnknownTopic(id.to_string()))?;
        let topic = self.topics.remove(index);
        self.decks.remove(id);
        self.dirty.remove(id);
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
        self.topics_dirty = true;
        Ok(topic)
    }

    /// Selects a topic. `fetched` is only used the first time a topic is
    /// opened; afterwards the in-memory copy wins.
    pub fn open_topic(&mut self, id: &str, fetched: Vec<WordPair>) -> Result<(), EditorError> {
        if self.topic(id).is_none() {
            return Err(EditorError::UnknownTopic(id.to_string()));
        }
        self.decks.entry(id.to_string()).or_insert(fetched);
        self.current = Some(id.to_string());
        Ok(())
    }

    pub fn close_topic(&mut self) {
        self.current = None;
    }

    pub fn add_card(&mut self) -> Result<usize, EditorError> {
        self.push_card(WordPair::new("", ""))
    }

    pub fn push_card(&mut self, card: WordPair) -> Result<usize, EditorError> {
        let deck = self.current_deck_mut()?;
        deck.push(card);
        let index = deck.len() - 1;
        self.touch_current();
        Ok(index)
    }

    pub fn update_card(&mut self, index: usize, side: Side, value: &str) -> Result<(), EditorError> {
        let deck = self.current_deck_mut()?;
        let card = deck.get_mut(index).ok_or(EditorError::NoSuchCard(index))?;
        match side {
            Side::German => card.de = value.to_string(),
            Side::Ukrainian => card.uk = value.to_string(),
        }
        self.touch_current();
        Ok(())
    }

    pub fn delete_card(&mut self, index: usize) -> Result<WordPair, EditorError> {
        let deck = self.current_deck_mut()?;
        if index >= deck.len() {
            return Err(EditorError::NoSuchCard(index));
        }
        let card = deck.remove(index);
        self.touch_current();
        Ok(card)
    }

    /// Replaces the current deck with a JSON array or `German;Ukrainian`
    /// lines. Returns the new card count.
    pub fn import_text(&mut self, text: &str) -> Result<usize, EditorError> {
        let text = text.trim();
        let cards = if text.starts_with('[') {
            serde_json::from_str::<Vec<WordPair>>(text)
                .map_err(|err| EditorError::InvalidFormat(err.to_string()))?
        } else {
            bulk_format(text)
        };
        let deck = self.current_deck_mut()?;
        *deck = cards;
        let count = deck.len();
        self.touch_current();
        Ok(count)
    }

    /// Installs topics pulled from a remote copy. Local decks are dropped.
    pub fn replace_topics(&mut self, topics: Vec<TopicDescriptor>) {
        self.topics = topics;
        self.decks.clear();
        self.dirty.clear();
        self.current = None;
        self.topics_dirty = false;
    }

    pub fn replace_deck(&mut self, id: &str, cards: Vec<WordPair>) {
        self.decks.insert(id.to_string(), cards);
        self.dirty.remove(id);
    }

    /// Decks edited since the last [`DeckEditor::mark_saved`].
    pub fn changed_decks(&self) -> Vec<(&TopicDescriptor, &[WordPair])> {
        self.topics
            .iter()
            .filter(|topic| self.dirty.contains(&topic.id))
            .filter_map(|topic| self.decks.get(&topic.id).map(|deck| (topic, deck.as_slice())))
            .collect()
    }

    /// Every deck currently held in memory.
    pub fn loaded_decks(&self) -> Vec<(&TopicDescriptor, &[WordPair])> {
        self.topics
            .iter()
            .filter_map(|topic| self.decks.get(&topic.id).map(|deck| (topic, deck.as_slice())))
            .collect()
    }

    pub fn mark_saved(&mut self) {
        self.dirty.clear();
        self.topics_dirty = false;
    }

    pub fn topics_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.topics)
    }

    pub fn deck_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self.deck())
    }

    fn current_deck_mut(&mut self) -> Result<&mut Vec<WordPair>, EditorError> {
        let id = self.current.as_ref().ok_or(EditorError::NoTopicSelected)?;
        Ok(self.decks.entry(id.clone()).or_default())
    }

    fn touch_current(&mut self) {
        let Some(id) = self.current.clone() else {
            return;
        };
        let count = self.decks.get(&id).map(Vec::len).unwrap_or(0);
        if let Some(topic) = self.topics.iter_mut().find(|topic| topic.id == id) {
            let count = u32::try_from(count).unwrap_or(u32::MAX);
            if topic.count != count {
                topic.count = count;
                self.topics_dirty = true;
            }
        }
        self.dirty.insert(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor_with_food() -> DeckEditor {
        let mut editor = DeckEditor::new(vec![TopicDescriptor {
            id: "food".to_string(),
            title: "Essen".to_string(),
            file: "data/food.json".to_string(),
            count: 7,
        }]);
        editor
            .open_topic("food", vec![WordPair::new("Apfel", "яблуко")])
            .unwrap();
        editor
    }

    #[test]
    fn ids_are_slugged() {
        assert_eq!(slugify_id("  Im Restaurant  Essen "), "im-restaurant-essen");
    }

    #[test]
    fn create_topic_validates_fields_and_duplicates() {
        let mut editor = editor_with_food();
        assert_eq!(editor.create_topic("", "x"), Err(EditorError::MissingField));
        assert_eq!(editor.create_topic("Title", "  "), Err(EditorError::MissingField));
        assert_eq!(
            editor.create_topic("Essen 2", "Food"),
            Err(EditorError::DuplicateId("food".to_string()))
        );

        let topic = editor.create_topic("Reisen", "Auf Reisen").unwrap();
        assert_eq!(topic.id, "auf-reisen");
        assert_eq!(topic.file, "data/auf-reisen.json");
        assert_eq!(topic.count, 0);
        assert_eq!(editor.current_topic().map(|t| t.id.as_str()), Some("auf-reisen"));
        assert!(editor.deck().is_empty());
    }

    #[test]
    fn card_edits_resync_the_cached_count() {
        let mut editor = editor_with_food();
        assert_eq!(editor.topics()[0].count, 7);

        let index = editor.add_card().unwrap();
        assert_eq!(index, 1);
        editor.update_card(index, Side::German, "Brot").unwrap();
        editor.update_card(index, Side::Ukrainian, "хліб").unwrap();
        assert_eq!(editor.deck()[1], WordPair::new("Brot", "хліб"));
        assert_eq!(editor.topics()[0].count, 2);

        editor.delete_card(0).unwrap();
        assert_eq!(editor.topics()[0].count, 1);
        assert_eq!(editor.delete_card(5), Err(EditorError::NoSuchCard(5)));
        assert_eq!(editor.update_card(9, Side::German, "x"), Err(EditorError::NoSuchCard(9)));
    }

    #[test]
    fn edits_need_a_selected_topic() {
        let mut editor = DeckEditor::new(Vec::new());
        assert_eq!(editor.add_card(), Err(EditorError::NoTopicSelected));
        assert_eq!(editor.import_text("a;b"), Err(EditorError::NoTopicSelected));
        assert_eq!(
            editor.open_topic("nope", Vec::new()),
            Err(EditorError::UnknownTopic("nope".to_string()))
        );
    }

    #[test]
    fn import_accepts_json_and_lines() {
        let mut editor = editor_with_food();
        let count = editor
            .import_text(r#"[{"de":"Milch","uk":"молоко"},{"de":"Ei","uk":"яйце"}]"#)
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(editor.deck()[0].de, "Milch");

        let count = editor.import_text("Käse;сир\nWasser\tвода\nkaputt").unwrap();
        assert_eq!(count, 2);
        assert_eq!(editor.topics()[0].count, 2);

        assert!(matches!(
            editor.import_text("[{\"de\":1}]"),
            Err(EditorError::InvalidFormat(_))
        ));
        assert_eq!(editor.deck().len(), 2);
    }

    #[test]
    fn reopening_keeps_in_memory_edits() {
        let mut editor = editor_with_food();
        editor.push_card(WordPair::new("Brot", "хліб")).unwrap();
        editor.close_topic();
        editor.open_topic("food", Vec::new()).unwrap();
        assert_eq!(editor.deck().len(), 2);
    }

    #[test]
    fn changed_decks_track_edits_until_saved() {
        let mut editor = editor_with_food();
        assert!(editor.changed_decks().is_empty());
        assert!(!editor.has_changes());

        editor.add_card().unwrap();
        assert_eq!(editor.changed_decks().len(), 1);
        assert!(editor.has_changes());

        editor.mark_saved();
        assert!(editor.changed_decks().is_empty());
        assert_eq!(editor.loaded_decks().len(), 1);
    }

    #[test]
    fn deleting_the_open_topic_closes_it() {
        let mut editor = editor_with_food();
        editor.delete_topic("food").unwrap();
        assert!(editor.current_topic().is_none());
        assert!(editor.topics().is_empty());
        assert!(editor.deck().is_empty());
        assert_eq!(
            editor.delete_topic("food"),
            Err(EditorError::UnknownTopic("food".to_string()))
        );
    }

    #[test]
    fn exports_pretty_json() {
        let editor = editor_with_food();
        let topics = editor.topics_json().unwrap();
        assert!(topics.contains("\"file\": \"data/food.json\""));
        let deck = editor.deck_json().unwrap();
        assert!(deck.contains("\"de\": \"Apfel\""));
    }
}
