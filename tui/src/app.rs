use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use karten_core::text_tools::{self, Case};
use karten_core::{
    parse_topics, DeckEditor, LoadError, LoadOutcome, LoadTicket, SessionController, Side, SpeechEngine,
    SpeechPlayer, TopicDescriptor, TopicRegistry, WordPair,
};
use tracing::{debug, info, warn};

use crate::admin::{self, AdminError};
use crate::config::ConfigFile;
use crate::db::{deck_key, Db};
use crate::loader::{DeckLoader, Request};
use crate::source::{CachedSource, DataSource};
use crate::sync::GithubSync;

const NOTICE_SECS: u64 = 4;

pub const SEPARATORS: [&str; 5] = [", ", "; ", " ", " | ", "\t"];

pub type Player = SpeechPlayer<Box<dyn SpeechEngine>>;
pub type Source = CachedSource<DataSource>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Home,
    Study,
    AdminTopics,
    AdminCards,
    TopicForm,
    CardForm,
    Tools,
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicField {
    Title,
    Id,
}

#[derive(Debug, Clone)]
pub enum ConfirmAction {
    DeleteTopic(String),
    DeleteCard(usize),
    Pull,
    /// Replace the admin topic list, dropping unsaved edits.
    ReloadTopics(Vec<TopicDescriptor>),
}

impl ConfirmAction {
    fn return_mode(&self) -> Mode {
        match self {
            ConfirmAction::DeleteCard(_) => Mode::AdminCards,
            ConfirmAction::DeleteTopic(_) | ConfirmAction::Pull => Mode::AdminTopics,
            ConfirmAction::ReloadTopics(_) => Mode::Home,
        }
    }
}

#[derive(Debug)]
pub struct Notice {
    pub text: String,
    pub error: bool,
    shown_at: Instant,
}

#[derive(Debug)]
pub struct TopicForm {
    pub title: String,
    pub id: String,
    pub field: TopicField,
}

#[derive(Debug)]
pub struct CardForm {
    pub de: String,
    pub uk: String,
    pub field: Side,
    /// `None` while adding a new card.
    pub editing: Option<usize>,
}

#[derive(Debug, Default)]
pub struct ToolsState {
    pub input: String,
    pub output: String,
    pub separator: usize,
}

pub struct App {
    pub mode: Mode,
    pub registry: TopicRegistry,
    pub home_selection: usize,
    pub session: SessionController<Player>,
    pub loader: DeckLoader<Source>,
    pub loading_topic: Option<String>,
    pub reloading_topics: bool,
    /// Id of the admin deck being fetched.
    pub opening: Option<String>,
    pub notice: Option<Notice>,
    pub editor: DeckEditor,
    pub admin_selection: usize,
    pub card_selection: usize,
    pub topic_form: TopicForm,
    pub card_form: CardForm,
    pub tools: ToolsState,
    pub tools_return: Mode,
    pub confirm: Option<(ConfirmAction, String)>,
    pub config: ConfigFile,
    pub db: Arc<dyn Db>,
    pub sync: Option<GithubSync>,
    shas: HashMap<String, String>,
}

impl App {
    pub fn new(
        config: ConfigFile,
        registry: TopicRegistry,
        player: Player,
        source: Arc<Source>,
        db: Arc<dyn Db>,
        sync: Option<GithubSync>,
    ) -> Self {
        let editor = DeckEditor::new(registry.topics().to_vec());
        Self {
            mode: Mode::Home,
            registry,
            home_selection: 0,
            session: SessionController::new(player),
            loader: DeckLoader::new(source),
            loading_topic: None,
            reloading_topics: false,
            opening: None,
            notice: None,
            editor,
            admin_selection: 0,
            card_selection: 0,
            topic_form: TopicForm {
                title: String::new(),
                id: String::new(),
                field: TopicField::Title,
            },
            card_form: CardForm {
                de: String::new(),
                uk: String::new(),
                field: Side::German,
                editing: None,
            },
            tools: ToolsState::default(),
            tools_return: Mode::Home,
            confirm: None,
            config,
            db,
            sync,
            shas: HashMap::new(),
        }
    }

    pub fn tick(&mut self) {
        for result in self.loader.poll() {
            match result.request {
                Request::Study { ticket, topic } => self.apply_study_load(ticket, &topic, result.fetched),
                Request::Topics { .. } => self.apply_topics(result.fetched),
                Request::Edit { topic } => self.apply_admin_deck(&topic, result.fetched),
            }
        }

        let expired = self
            .notice
            .as_ref()
            .is_some_and(|notice| notice.shown_at.elapsed() >= Duration::from_secs(NOTICE_SECS));
        if expired {
            self.notice = None;
        }
    }

    pub fn set_message(&mut self, text: String) {
        self.notice = Some(Notice {
            text,
            error: false,
            shown_at: Instant::now(),
        });
    }

    pub fn set_error(&mut self, text: String) {
        self.notice = Some(Notice {
            text,
            error: true,
            shown_at: Instant::now(),
        });
    }

    fn report<T>(&mut self, context: &str, result: Result<T, AdminError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(context, error = %err, "admin action failed");
                self.set_error(format!("{context}: {err}"));
                None
            }
        }
    }

    pub fn set_confirm(&mut self, action: ConfirmAction, message: String) {
        self.confirm = Some((action, message));
        self.mode = Mode::Confirm;
    }

    // Study

    pub fn home_move(&mut self, delta: i32) {
        self.home_selection = step(self.home_selection, delta, self.registry.len());
    }

    pub fn start_selected_topic(&mut self) {
        if let Some(topic) = self.registry.get(self.home_selection).cloned() {
            self.start_topic(topic);
        }
    }

    /// Deep link by topic id.
    pub fn open_topic_id(&mut self, id: &str) {
        match self.registry.find(id).cloned() {
            Some(topic) => {
                if let Some(index) = self.registry.topics().iter().position(|t| t.id == id) {
                    self.home_selection = index;
                }
                self.start_topic(topic);
            }
            None => self.set_error(format!("Unknown topic '{id}'")),
        }
    }

    pub fn start_topic(&mut self, topic: TopicDescriptor) {
        info!(topic = %topic.id, "loading topic");
        let ticket = self.session.begin_load();
        self.loading_topic = Some(topic.title.clone());
        self.loader.request(Request::Study { ticket, topic });
    }

    fn apply_study_load(
        &mut self,
        ticket: LoadTicket,
        topic: &TopicDescriptor,
        fetched: Result<String, LoadError>,
    ) {
        match self.session.complete_load(ticket, topic, fetched) {
            Ok(LoadOutcome::Applied) => {
                self.loading_topic = None;
                if self.mode == Mode::Home {
                    self.mode = Mode::Study;
                }
            }
            Ok(LoadOutcome::Stale) => {}
            Err(err) => {
                warn!(topic = %topic.id, error = %err, "deck load failed");
                self.loading_topic = None;
                self.set_error(format!("Could not load {}: {err}", topic.title));
            }
        }
    }

    /// Leaving the home screen drops a study load still in flight.
    fn abandon_study_load(&mut self) {
        if self.session.pending_load().is_some() {
            self.session.cancel_load();
            self.loading_topic = None;
        }
    }

    pub fn reload_topics(&mut self) {
        if self.reloading_topics {
            return;
        }
        self.reloading_topics = true;
        self.loader.request(Request::Topics {
            reference: self.config.source.topics.clone(),
        });
    }

    fn apply_topics(&mut self, fetched: Result<String, LoadError>) {
        self.reloading_topics = false;
        let topics = match fetched.and_then(|body| parse_topics(&body)) {
            Ok(topics) => topics,
            Err(err) => {
                warn!(error = %err, "topic reload failed");
                self.set_error(format!("Could not load topics: {err}"));
                return;
            }
        };

        self.registry = TopicRegistry::new(topics.clone());
        self.home_selection = self.home_selection.min(self.registry.len().saturating_sub(1));
        if !self.editor.has_changes() {
            self.editor.replace_topics(topics);
            self.admin_move(0);
            self.set_message(format!("{} topics", self.registry.len()));
        } else if self.mode == Mode::Home {
            let message = format!(
                "Loaded {} topics. Discard unsaved admin edits and use them in admin too? (y/n)",
                self.registry.len()
            );
            self.set_confirm(ConfirmAction::ReloadTopics(topics), message);
        } else {
            self.set_message("Topics reloaded; admin keeps its unsaved edits".to_string());
        }
    }

    pub fn leave_study(&mut self) {
        self.session.pronouncer_mut().engine_mut().cancel();
        self.mode = Mode::Home;
    }

    // Admin

    pub fn enter_admin(&mut self) {
        self.abandon_study_load();
        self.admin_selection = self.admin_selection.min(self.editor.topics().len().saturating_sub(1));
        self.mode = Mode::AdminTopics;
    }

    pub fn admin_move(&mut self, delta: i32) {
        self.admin_selection = step(self.admin_selection, delta, self.editor.topics().len());
    }

    pub fn card_move(&mut self, delta: i32) {
        self.card_selection = step(self.card_selection, delta, self.editor.deck().len());
    }

    pub fn selected_admin_topic(&self) -> Option<&TopicDescriptor> {
        self.editor.topics().get(self.admin_selection)
    }

    pub fn open_admin_topic(&mut self) {
        let Some(topic) = self.selected_admin_topic().cloned() else {
            return;
        };
        if self.editor.is_loaded(&topic.id) {
            self.show_admin_deck(&topic.id, Vec::new());
            return;
        }
        self.set_message(format!("Opening {}...", topic.title));
        self.opening = Some(topic.id.clone());
        self.loader.request(Request::Edit { topic });
    }

    fn apply_admin_deck(&mut self, topic: &TopicDescriptor, fetched: Result<String, LoadError>) {
        if self.opening.as_deref() != Some(topic.id.as_str()) || self.mode != Mode::AdminTopics {
            debug!(topic = %topic.id, "discarding admin deck nobody is waiting for");
            if self.opening.as_deref() == Some(topic.id.as_str()) {
                self.opening = None;
            }
            return;
        }
        self.opening = None;
        let cards = admin::deck_for_editing(topic, fetched);
        if let Some(cards) = self.report("Open deck", cards) {
            self.notice = None;
            self.show_admin_deck(&topic.id, cards);
        }
    }

    fn show_admin_deck(&mut self, id: &str, cards: Vec<WordPair>) {
        let opened = self.editor.open_topic(id, cards).map_err(AdminError::from);
        if self.report("Open deck", opened).is_some() {
            self.card_selection = 0;
            self.mode = Mode::AdminCards;
        }
    }

    pub fn close_admin_topic(&mut self) {
        self.editor.close_topic();
        self.mode = Mode::AdminTopics;
    }

    pub fn start_topic_form(&mut self) {
        self.topic_form = TopicForm {
            title: String::new(),
            id: String::new(),
            field: TopicField::Title,
        };
        self.mode = Mode::TopicForm;
    }

    pub fn topic_form_input(&mut self) -> &mut String {
        match self.topic_form.field {
            TopicField::Title => &mut self.topic_form.title,
            TopicField::Id => &mut self.topic_form.id,
        }
    }

    pub fn toggle_topic_field(&mut self) {
        self.topic_form.field = match self.topic_form.field {
            TopicField::Title => TopicField::Id,
            TopicField::Id => TopicField::Title,
        };
    }

    pub fn submit_topic_form(&mut self) {
        let created = self
            .editor
            .create_topic(&self.topic_form.title, &self.topic_form.id)
            .map_err(AdminError::from);
        if let Some(topic) = self.report("Create topic", created) {
            self.set_message(format!("Created {} ({})", topic.title, topic.file));
            self.card_selection = 0;
            self.admin_selection = self.editor.topics().len().saturating_sub(1);
            self.mode = Mode::AdminCards;
        }
    }

    pub fn start_card_form(&mut self, editing: Option<usize>) {
        let card = editing
            .and_then(|index| self.editor.deck().get(index))
            .cloned()
            .unwrap_or_else(|| WordPair::new("", ""));
        self.card_form = CardForm {
            de: card.de,
            uk: card.uk,
            field: Side::German,
            editing,
        };
        self.mode = Mode::CardForm;
    }

    pub fn card_form_input(&mut self) -> &mut String {
        match self.card_form.field {
            Side::German => &mut self.card_form.de,
            Side::Ukrainian => &mut self.card_form.uk,
        }
    }

    pub fn toggle_card_field(&mut self) {
        self.card_form.field = match self.card_form.field {
            Side::German => Side::Ukrainian,
            Side::Ukrainian => Side::German,
        };
    }

    pub fn submit_card_form(&mut self) {
        let de = self.card_form.de.trim().to_string();
        let uk = self.card_form.uk.trim().to_string();
        if de.is_empty() || uk.is_empty() {
            self.set_error("Both sides are required".to_string());
            return;
        }
        let saved = match self.card_form.editing {
            Some(index) => Ok(index),
            None => self.editor.add_card(),
        }
        .and_then(|index| {
            self.editor.update_card(index, Side::German, &de)?;
            self.editor.update_card(index, Side::Ukrainian, &uk)?;
            Ok(index)
        })
        .map_err(AdminError::from);
        if let Some(index) = self.report("Save card", saved) {
            self.card_selection = index;
            self.mode = Mode::AdminCards;
        }
    }

    pub fn confirm_delete_topic(&mut self) {
        if let Some(topic) = self.selected_admin_topic() {
            let message = format!("Delete topic '{}' and its deck? (y/n)", topic.title);
            let action = ConfirmAction::DeleteTopic(topic.id.clone());
            self.set_confirm(action, message);
        }
    }

    pub fn confirm_delete_card(&mut self) {
        if let Some(card) = self.editor.deck().get(self.card_selection) {
            let message = format!("Delete '{}'? (y/n)", card.de);
            self.set_confirm(ConfirmAction::DeleteCard(self.card_selection), message);
        }
    }

    pub fn confirm_pull(&mut self) {
        let message = if self.editor.has_changes() {
            "Pull from remote and discard unsaved edits? (y/n)"
        } else {
            "Pull topics and decks from remote? (y/n)"
        };
        self.set_confirm(ConfirmAction::Pull, message.to_string());
    }

    pub fn resolve_confirm(&mut self, accepted: bool) {
        let Some((action, _)) = self.confirm.take() else {
            self.mode = Mode::AdminTopics;
            return;
        };
        self.mode = action.return_mode();
        if !accepted {
            return;
        }
        match action {
            ConfirmAction::DeleteTopic(id) => {
                let deleted = self.editor.delete_topic(&id).map_err(AdminError::from);
                if let Some(topic) = self.report("Delete topic", deleted) {
                    if let Err(err) = self.db.remove(&deck_key(&topic.file)) {
                        warn!(topic = %topic.id, error = %err, "failed to drop cached deck");
                    }
                    self.set_message(format!("Deleted {}", topic.title));
                    self.admin_move(0);
                }
            }
            ConfirmAction::DeleteCard(index) => {
                let deleted = self.editor.delete_card(index).map_err(AdminError::from);
                if self.report("Delete card", deleted).is_some() {
                    self.card_move(0);
                }
            }
            ConfirmAction::Pull => self.pull(),
            ConfirmAction::ReloadTopics(topics) => {
                self.editor.replace_topics(topics);
                self.admin_selection = 0;
                self.set_message(format!("{} topics", self.editor.topics().len()));
            }
        }
    }

    pub fn import_clipboard(&mut self) {
        let imported = admin::clipboard_text().and_then(|text| Ok(self.editor.import_text(&text)?));
        if let Some(count) = self.report("Import", imported) {
            self.card_selection = 0;
            self.set_message(format!("Imported {count} cards"));
        }
    }

    pub fn copy_deck(&mut self) {
        let copied = self
            .editor
            .deck_json()
            .map_err(AdminError::from)
            .and_then(|json| admin::copy_to_clipboard(&json));
        if self.report("Copy", copied).is_some() {
            self.set_message("Deck JSON copied to clipboard".to_string());
        }
    }

    pub fn export(&mut self) {
        let root = self.loader.source().inner().root().clone();
        let Some(dir) = admin::export_dir(&self.config.admin, &root) else {
            self.set_error("Set [admin] export_dir to export a remote data root".to_string());
            return;
        };
        let topics_reference = self.config.source.topics.clone();
        let exported = admin::export(&mut self.editor, self.db.as_ref(), &dir, &topics_reference);
        if let Some(decks) = self.report("Export", exported) {
            self.refresh_registry();
            self.set_message(format!("Exported topics and {decks} decks to {}", dir.display()));
        }
    }

    pub fn push(&mut self) {
        let Some(sync) = &self.sync else {
            self.set_error("Remote sync is not configured".to_string());
            return;
        };
        let topics_reference = self.config.source.topics.clone();
        let pushed = admin::push(&mut self.editor, sync, &mut self.shas, &topics_reference);
        if let Some(decks) = self.report("Push", pushed) {
            self.refresh_registry();
            self.set_message(format!("Pushed topics and {decks} decks"));
        }
    }

    fn pull(&mut self) {
        let Some(sync) = &self.sync else {
            self.set_error("Remote sync is not configured".to_string());
            return;
        };
        let topics_reference = self.config.source.topics.clone();
        let pulled = admin::pull(&mut self.editor, sync, &mut self.shas, &topics_reference);
        if let Some(decks) = self.report("Pull", pulled) {
            self.admin_selection = 0;
            self.refresh_registry();
            self.set_message(format!("Pulled {} topics, {decks} decks", self.editor.topics().len()));
        }
    }

    fn refresh_registry(&mut self) {
        self.registry = TopicRegistry::new(self.editor.topics().to_vec());
        self.home_selection = self.home_selection.min(self.registry.len().saturating_sub(1));
    }

    // Tools

    pub fn open_tools(&mut self) {
        self.abandon_study_load();
        self.tools_return = self.mode;
        self.mode = Mode::Tools;
    }

    pub fn separator(&self) -> &'static str {
        SEPARATORS[self.tools.separator % SEPARATORS.len()]
    }

    pub fn cycle_separator(&mut self) {
        self.tools.separator = (self.tools.separator + 1) % SEPARATORS.len();
    }

    pub fn paste_tools_input(&mut self) {
        if let Some(text) = self.report("Paste", admin::clipboard_text()) {
            self.tools.input = text;
            self.tools.output.clear();
        }
    }

    pub fn apply_tool(&mut self, tool: Tool) {
        let input = &self.tools.input;
        let sep = self.separator();
        let output = match tool {
            Tool::Concatenate => text_tools::concatenate(input, sep),
            Tool::Split => {
                let trimmed = sep.trim();
                text_tools::split(input, if trimmed.is_empty() { sep } else { trimmed })
            }
            Tool::Case(case) => text_tools::change_case(input, case),
            Tool::Tidy => text_tools::tidy_lines(input),
            Tool::BulkFormat => {
                let pairs = text_tools::bulk_format(input);
                match serde_json::to_string_pretty(&pairs) {
                    Ok(json) => json,
                    Err(err) => {
                        self.set_error(format!("Format: {err}"));
                        return;
                    }
                }
            }
        };
        self.tools.output = output;
    }

    pub fn copy_tools_output(&mut self) {
        if self.tools.output.is_empty() {
            return;
        }
        let output = self.tools.output.clone();
        if self.report("Copy", admin::copy_to_clipboard(&output)).is_some() {
            self.set_message("Result copied to clipboard".to_string());
        }
    }

    pub fn close_tools(&mut self) {
        self.mode = self.tools_return;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Concatenate,
    Split,
    Case(Case),
    Tidy,
    BulkFormat,
}

fn step(current: usize, delta: i32, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let next = current as i64 + delta as i64;
    next.clamp(0, len as i64 - 1) as usize
}
