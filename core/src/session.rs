//! Flashcard session state machine.
//!
//! A controller owns the shuffled deck of the active topic, the current
//! position and whether the current card is revealed. The presentation layer
//! only reads [`SessionView`] snapshots and calls the command methods.
//!
//! Deck loads are tagged with a [`LoadTicket`]; only the most recently issued
//! ticket may replace the deck, so a slow response for a topic the user has
//! already moved away from is discarded on arrival.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::deck::{parse_deck, ResourceSource};
use crate::error::LoadError;
use crate::shuffle::shuffle;
use crate::speech::Pronounce;
use crate::{TopicDescriptor, WordPair};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load was started after this one; nothing changed.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Ready,
    Navigating,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionView<'a> {
    pub topic: Option<&'a TopicDescriptor>,
    pub card: Option<&'a WordPair>,
    pub position: usize,
    pub len: usize,
    pub revealed: bool,
    pub progress: Option<f64>,
    pub can_prev: bool,
    pub can_next: bool,
    pub at_last: bool,
    pub loading: bool,
}

pub struct SessionController<P> {
    pronouncer: P,
    rng: StdRng,
    topic: Option<TopicDescriptor>,
    deck: Vec<WordPair>,
    position: usize,
    revealed: bool,
    last_ticket: u64,
    pending: Option<LoadTicket>,
}

impl<P: Pronounce> SessionController<P> {
    pub fn new(pronouncer: P) -> Self {
        Self::with_rng(pronouncer, StdRng::from_entropy())
    }

    pub fn with_rng(pronouncer: P, rng: StdRng) -> Self {
        Self {
            pronouncer,
            rng,
            topic: None,
            deck: Vec::new(),
            position: 0,
            revealed: false,
            last_ticket: 0,
            pending: None,
        }
    }

    /// Fetches, validates and installs a topic's deck in one step.
    pub fn load_topic<S: ResourceSource + ?Sized>(
        &mut self,
        source: &S,
        descriptor: &TopicDescriptor,
    ) -> Result<(), LoadError> {
        let ticket = self.begin_load();
        let fetched = source.fetch(&descriptor.file);
        self.complete_load(ticket, descriptor, fetched).map(|_| ())
    }

    /// Starts a load and supersedes any load still in flight.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.last_ticket += 1;
        let ticket = LoadTicket(self.last_ticket);
        self.pending = Some(ticket);
        ticket
    }

    pub fn pending_load(&self) -> Option<LoadTicket> {
        self.pending
    }

    /// Abandons the load in flight; its result will arrive as stale.
    pub fn cancel_load(&mut self) {
        if let Some(ticket) = self.pending.take() {
            debug!(ticket = ticket.id(), "deck load abandoned");
        }
    }

    /// Applies a fetched deck body if `ticket` is still the latest load.
    /// Errors leave the current deck untouched.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        descriptor: &TopicDescriptor,
        fetched: Result<String, LoadError>,
    ) -> Result<LoadOutcome, LoadError> {
        if self.pending != Some(ticket) {
            debug!(ticket = ticket.id(), topic = %descriptor.id, "discarding stale deck load");
            return Ok(LoadOutcome::Stale);
        }
        self.pending = None;

        let mut cards = fetched.and_then(|body| parse_deck(&body))?;
        shuffle(&mut cards, &mut self.rng);

        info!(topic = %descriptor.id, cards = cards.len(), "deck loaded");
        self.topic = Some(descriptor.clone());
        self.deck = cards;
        self.position = 0;
        self.revealed = false;
        Ok(LoadOutcome::Applied)
    }

    pub fn flip(&mut self) {
        if self.deck.is_empty() {
            return;
        }
        self.revealed = !self.revealed;
        if self.revealed {
            if let Some(card) = self.deck.get(self.position) {
                self.pronouncer.pronounce(&card.de);
            }
        }
    }

    /// Pronounces the current card again without touching the reveal state.
    pub fn speak_current(&mut self) {
        if let Some(card) = self.deck.get(self.position) {
            self.pronouncer.pronounce(&card.de);
        }
    }

    pub fn next(&mut self) -> bool {
        if self.deck.is_empty() || self.position >= self.deck.len() - 1 {
            return false;
        }
        self.position += 1;
        self.revealed = false;
        true
    }

    pub fn prev(&mut self) -> bool {
        if self.position == 0 {
            return false;
        }
        self.position -= 1;
        self.revealed = false;
        true
    }

    pub fn restart(&mut self) {
        shuffle(&mut self.deck, &mut self.rng);
        self.position = 0;
        self.revealed = false;
    }

    pub fn current_card(&self) -> Option<&WordPair> {
        self.deck.get(self.position)
    }

    pub fn progress_fraction(&self) -> Option<f64> {
        if self.deck.is_empty() {
            return None;
        }
        Some((self.position + 1) as f64 / self.deck.len() as f64)
    }

    pub fn phase(&self) -> Phase {
        if self.deck.is_empty() {
            Phase::Empty
        } else if self.position == 0 && !self.revealed {
            Phase::Ready
        } else {
            Phase::Navigating
        }
    }

    pub fn topic(&self) -> Option<&TopicDescriptor> {
        self.topic.as_ref()
    }

    pub fn deck(&self) -> &[WordPair] {
        &self.deck
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn len(&self) -> usize {
        self.deck.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deck.is_empty()
    }

    pub fn pronouncer(&self) -> &P {
        &self.pronouncer
    }

    pub fn pronouncer_mut(&mut self) -> &mut P {
        &mut self.pronouncer
    }

    pub fn view(&self) -> SessionView<'_> {
        let len = self.deck.len();
        let at_last = len > 0 && self.position == len - 1;
        SessionView {
            topic: self.topic.as_ref(),
            card: self.current_card(),
            position: self.position,
            len,
            revealed: self.revealed,
            progress: self.progress_fraction(),
            can_prev: self.position > 0,
            can_next: len > 0 && !at_last,
            at_last,
            loading: self.pending.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        spoken: Vec<String>,
    }

    impl Pronounce for Recorder {
        fn pronounce(&mut self, text: &str) {
            self.spoken.push(text.to_string());
        }
    }

    struct MapSource(HashMap<String, String>);

    impl ResourceSource for MapSource {
        fn fetch(&self, reference: &str) -> Result<String, LoadError> {
            self.0
                .get(reference)
                .cloned()
                .ok_or_else(|| LoadError::NotFound(reference.to_string()))
        }
    }

    fn topic(id: &str) -> TopicDescriptor {
        TopicDescriptor {
            id: id.to_string(),
            title: id.to_string(),
            file: format!("data/{id}.json"),
            count: 0,
        }
    }

    fn deck_body(n: usize) -> String {
        let cards: Vec<WordPair> = (0..n)
            .map(|i| WordPair::new(format!("Wort {i}"), format!("слово {i}")))
            .collect();
        serde_json::to_string(&cards).unwrap()
    }

    fn controller() -> SessionController<Recorder> {
        SessionController::with_rng(Recorder::default(), StdRng::seed_from_u64(5))
    }

    fn loaded(n: usize) -> SessionController<Recorder> {
        let mut session = controller();
        let ticket = session.begin_load();
        session.complete_load(ticket, &topic("t"), Ok(deck_body(n))).unwrap();
        session
    }

    #[test]
    fn starts_empty() {
        let mut session = controller();
        assert_eq!(session.phase(), Phase::Empty);
        assert!(session.current_card().is_none());
        assert!(session.progress_fraction().is_none());
        assert!(!session.next());
        assert!(!session.prev());
        session.flip();
        assert!(!session.is_revealed());
        assert!(session.pronouncer().spoken.is_empty());
    }

    #[test]
    fn load_resets_position_and_reveal() {
        for n in 1..6 {
            let mut session = loaded(3);
            session.next();
            session.flip();
            let ticket = session.begin_load();
            session.complete_load(ticket, &topic("other"), Ok(deck_body(n))).unwrap();
            assert_eq!(session.position(), 0);
            assert!(!session.is_revealed());
            assert_eq!(session.len(), n);
            assert_eq!(session.phase(), Phase::Ready);
        }
    }

    #[test]
    fn next_stops_at_last_card() {
        let mut session = loaded(3);
        session.flip();
        assert!(session.next());
        assert_eq!(session.position(), 1);
        assert!(!session.is_revealed());
        assert!(session.next());
        session.flip();
        assert!(!session.next());
        assert_eq!(session.position(), 2);
        assert!(session.is_revealed());
    }

    #[test]
    fn prev_stops_at_first_card() {
        let mut session = loaded(3);
        assert!(!session.prev());
        session.next();
        session.next();
        session.flip();
        assert!(session.prev());
        assert_eq!(session.position(), 1);
        assert!(!session.is_revealed());
    }

    #[test]
    fn flip_twice_restores_reveal_and_speaks_once() {
        let mut session = loaded(2);
        let before = session.is_revealed();
        session.flip();
        session.flip();
        assert_eq!(session.is_revealed(), before);
        let expected = session.current_card().unwrap().de.clone();
        assert_eq!(session.pronouncer().spoken, vec![expected]);
    }

    #[test]
    fn speak_current_does_not_flip() {
        let mut session = loaded(2);
        session.speak_current();
        assert!(!session.is_revealed());
        assert_eq!(session.pronouncer().spoken.len(), 1);
    }

    #[test]
    fn restart_resets_from_anywhere() {
        let mut session = loaded(4);
        session.next();
        session.next();
        session.flip();
        session.restart();
        assert_eq!(session.position(), 0);
        assert!(!session.is_revealed());
        assert_eq!(session.len(), 4);
    }

    #[test]
    fn restart_eventually_changes_order() {
        let mut session = loaded(8);
        let first: Vec<WordPair> = session.deck().to_vec();
        let changed = (0..20).any(|_| {
            session.restart();
            session.deck() != first.as_slice()
        });
        assert!(changed);
    }

    #[test]
    fn failed_loads_leave_state_untouched() {
        let mut session = loaded(3);
        session.next();
        let deck = session.deck().to_vec();

        for fetched in [Err(LoadError::NotFound("x".to_string())), Ok("[]".to_string()), Ok("{".to_string())] {
            let ticket = session.begin_load();
            assert!(session.complete_load(ticket, &topic("bad"), fetched).is_err());
            assert_eq!(session.deck(), deck.as_slice());
            assert_eq!(session.position(), 1);
            assert_eq!(session.topic().map(|t| t.id.as_str()), Some("t"));
            assert!(session.pending_load().is_none());
        }
    }

    #[test]
    fn only_the_latest_load_is_applied() {
        let mut session = controller();
        let first = session.begin_load();
        let second = session.begin_load();
        assert_eq!(session.pending_load(), Some(second));

        let outcome = session.complete_load(second, &topic("b"), Ok(deck_body(2))).unwrap();
        assert_eq!(outcome, LoadOutcome::Applied);
        let outcome = session.complete_load(first, &topic("a"), Ok(deck_body(5))).unwrap();
        assert_eq!(outcome, LoadOutcome::Stale);
        assert_eq!(session.topic().map(|t| t.id.as_str()), Some("b"));
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn cancelled_load_arrives_stale() {
        let mut session = loaded(3);
        let ticket = session.begin_load();
        session.cancel_load();
        assert!(!session.view().loading);

        let outcome = session.complete_load(ticket, &topic("late"), Ok(deck_body(1))).unwrap();
        assert_eq!(outcome, LoadOutcome::Stale);
        assert_eq!(session.topic().map(|t| t.id.as_str()), Some("t"));
        assert_eq!(session.len(), 3);
    }

    #[test]
    fn stale_failures_are_ignored() {
        let mut session = controller();
        let first = session.begin_load();
        let _second = session.begin_load();
        let outcome = session.complete_load(first, &topic("a"), Err(LoadError::NotFound("a".to_string())));
        assert_eq!(outcome, Ok(LoadOutcome::Stale));
        assert!(session.view().loading);
    }

    #[test]
    fn view_reports_navigation_enablement() {
        let mut session = loaded(2);
        let view = session.view();
        assert!(!view.can_prev);
        assert!(view.can_next);
        assert!(!view.at_last);
        assert_eq!(view.progress, Some(0.5));

        session.next();
        let view = session.view();
        assert!(view.can_prev);
        assert!(!view.can_next);
        assert!(view.at_last);
        assert_eq!(view.progress, Some(1.0));
    }

    #[test]
    fn load_topic_fetches_the_descriptor_file() {
        let mut files = HashMap::new();
        files.insert("data/food.json".to_string(), deck_body(3));
        let source = MapSource(files);

        let mut session = controller();
        session.load_topic(&source, &topic("food")).unwrap();
        assert_eq!(session.len(), 3);
        assert_eq!(
            session.load_topic(&source, &topic("missing")),
            Err(LoadError::NotFound("data/missing.json".to_string()))
        );
        assert_eq!(session.len(), 3);
    }
}
