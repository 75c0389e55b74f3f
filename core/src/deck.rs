use tracing::warn;

use crate::error::LoadError;
use crate::{TopicDescriptor, WordPair};

/// Where topic lists and decks come from. Implementations return the raw JSON
/// body for a reference such as `data/topics.json` or a topic's `file`.
pub trait ResourceSource {
    fn fetch(&self, reference: &str) -> Result<String, LoadError>;
}

impl<S: ResourceSource + ?Sized> ResourceSource for &S {
    fn fetch(&self, reference: &str) -> Result<String, LoadError> {
        (**self).fetch(reference)
    }
}

pub fn parse_topics(body: &str) -> Result<Vec<TopicDescriptor>, LoadError> {
    let topics: Vec<TopicDescriptor> =
        serde_json::from_str(body).map_err(|err| LoadError::Malformed(err.to_string()))?;
    if topics.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(topics)
}

/// Parses a deck as written, blank rows included. The editor works on this.
pub fn parse_word_pairs(body: &str) -> Result<Vec<WordPair>, LoadError> {
    serde_json::from_str(body).map_err(|err| LoadError::Malformed(err.to_string()))
}

/// Parses a deck for study: rows with a blank side are dropped and a deck
/// with nothing left is rejected.
pub fn parse_deck(body: &str) -> Result<Vec<WordPair>, LoadError> {
    let pairs = parse_word_pairs(body)?;
    let total = pairs.len();
    let cards: Vec<WordPair> = pairs.into_iter().filter(|pair| !pair.is_blank()).collect();
    if cards.len() < total {
        warn!(skipped = total - cards.len(), "dropped blank cards from deck");
    }
    if cards.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(cards)
}

#[derive(Debug, Clone, Default)]
pub struct TopicRegistry {
    topics: Vec<TopicDescriptor>,
}

impl TopicRegistry {
    pub fn new(topics: Vec<TopicDescriptor>) -> Self {
        Self { topics }
    }

    pub fn load<S: ResourceSource + ?Sized>(source: &S, reference: &str) -> Result<Self, LoadError> {
        let body = source.fetch(reference)?;
        Ok(Self::new(parse_topics(&body)?))
    }

    pub fn topics(&self) -> &[TopicDescriptor] {
        &self.topics
    }

    pub fn find(&self, id: &str) -> Option<&TopicDescriptor> {
        self.topics.iter().find(|topic| topic.id == id)
    }

    pub fn get(&self, index: usize) -> Option<&TopicDescriptor> {
        self.topics.get(index)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
