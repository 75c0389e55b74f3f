use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use karten_core::{
    LoadError, PlaybackError, Pronounce, ResourceSource, SessionController, SpeechEngine,
    SpeechPlayer, TopicDescriptor, TopicRegistry, Utterance, Voice, VoicePreference, WordPair,
};

struct Files(HashMap<&'static str, &'static str>);

impl ResourceSource for Files {
    fn fetch(&self, reference: &str) -> Result<String, LoadError> {
        self.0
            .get(reference)
            .map(|body| body.to_string())
            .ok_or_else(|| LoadError::NotFound(reference.to_string()))
    }
}

fn files() -> Files {
    let mut map = HashMap::new();
    map.insert(
        "data/topics.json",
        r#"[{"id":"food","title":"Їжа","file":"data/food.json","count":2},
            {"id":"empty","title":"Порожньо","file":"data/empty.json","count":0},
            {"id":"gone","title":"Зникло","file":"data/gone.json","count":4}]"#,
    );
    map.insert(
        "data/food.json",
        r#"[{"de":"Apfel","uk":"яблуко"},{"de":"Brot","uk":"хліб"}]"#,
    );
    map.insert("data/empty.json", "[]");
    Files(map)
}

#[derive(Clone, Default)]
struct SharedLog(Rc<RefCell<Vec<Utterance>>>);

struct LoggingEngine {
    log: SharedLog,
}

impl SpeechEngine for LoggingEngine {
    fn voices(&self) -> Vec<Voice> {
        vec![Voice {
            name: "Google Deutsch".to_string(),
            lang: "de-DE".to_string(),
        }]
    }

    fn cancel(&mut self) {}

    fn speak(&mut self, utterance: &Utterance) -> Result<(), PlaybackError> {
        self.log.0.borrow_mut().push(utterance.clone());
        Ok(())
    }
}

fn session() -> (SessionController<SpeechPlayer<LoggingEngine>>, SharedLog) {
    let log = SharedLog::default();
    let player = SpeechPlayer::new(LoggingEngine { log: log.clone() }, VoicePreference::default());
    (SessionController::new(player), log)
}

fn topic(registry: &TopicRegistry, id: &str) -> TopicDescriptor {
    registry.find(id).cloned().unwrap()
}

#[test]
fn food_deck_walkthrough() {
    let source = files();
    let registry = TopicRegistry::load(&source, "data/topics.json").unwrap();
    let (mut session, _) = session();

    session.load_topic(&source, &topic(&registry, "food")).unwrap();
    let card = session.current_card().cloned().unwrap();
    let pairs = [WordPair::new("Apfel", "яблуко"), WordPair::new("Brot", "хліб")];
    assert!(pairs.contains(&card));
    assert_eq!(session.progress_fraction(), Some(0.5));

    assert!(session.next());
    assert_eq!(session.progress_fraction(), Some(1.0));

    let before = (session.position(), session.is_revealed(), session.current_card().cloned());
    assert!(!session.next());
    assert_eq!(
        before,
        (session.position(), session.is_revealed(), session.current_card().cloned())
    );
}

#[test]
fn missing_deck_keeps_previous_session() {
    let source = files();
    let registry = TopicRegistry::load(&source, "data/topics.json").unwrap();
    let (mut session, _) = session();

    assert_eq!(
        session.load_topic(&source, &topic(&registry, "gone")),
        Err(LoadError::NotFound("data/gone.json".to_string()))
    );
    assert!(session.current_card().is_none());

    session.load_topic(&source, &topic(&registry, "food")).unwrap();
    let card = session.current_card().cloned();
    assert!(session.load_topic(&source, &topic(&registry, "gone")).is_err());
    assert_eq!(session.current_card().cloned(), card);
    assert_eq!(session.topic().map(|t| t.id.as_str()), Some("food"));
}

#[test]
fn empty_deck_is_rejected_without_mutation() {
    let source = files();
    let registry = TopicRegistry::load(&source, "data/topics.json").unwrap();
    let (mut session, _) = session();

    session.load_topic(&source, &topic(&registry, "food")).unwrap();
    session.next();
    session.flip();

    assert_eq!(
        session.load_topic(&source, &topic(&registry, "empty")),
        Err(LoadError::Empty)
    );
    assert_eq!(session.position(), 1);
    assert!(session.is_revealed());
    assert_eq!(session.len(), 2);
}

#[test]
fn double_flip_speaks_once() {
    let source = files();
    let registry = TopicRegistry::load(&source, "data/topics.json").unwrap();
    let (mut session, log) = session();
    session.load_topic(&source, &topic(&registry, "food")).unwrap();

    session.flip();
    session.flip();

    let spoken = log.0.borrow();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].text, session.current_card().unwrap().de);
    assert_eq!(spoken[0].voice.as_ref().map(|v| v.name.as_str()), Some("Google Deutsch"));
}

#[test]
fn silent_pronouncer_is_enough_for_a_session() {
    struct Mute;
    impl Pronounce for Mute {
        fn pronounce(&mut self, _text: &str) {}
    }

    let source = files();
    let registry = TopicRegistry::load(&source, "data/topics.json").unwrap();
    let mut session = SessionController::new(Mute);
    session.load_topic(&source, &topic(&registry, "food")).unwrap();
    session.flip();
    assert!(session.is_revealed());
    session.restart();
    assert_eq!(session.position(), 0);
    assert!(!session.is_revealed());
}
