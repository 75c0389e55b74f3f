use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use directories::ProjectDirs;
use karten_core::text_tools::Case;
use karten_core::{SpeechEngine, SpeechPlayer, TopicRegistry, VoicePreference};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{error, info, warn};

mod admin;
mod app;
mod config;
mod db;
mod loader;
mod logging;
mod source;
mod speech;
mod sync;
mod ui;

use crate::app::{App, Mode, Player, Tool};
use crate::config::load_config;
use crate::source::{CachedSource, DataSource, Root};
use crate::speech::{CommandEngine, MuteEngine};
use crate::sync::GithubSync;

const TICK_MS: u64 = 100;

fn main() -> io::Result<()> {
    let _ = dotenvy::dotenv();

    let data_dir = ProjectDirs::from("com", "karten", "Karten")
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./.karten"));
    fs::create_dir_all(&data_dir)?;

    let mut config = load_config(&data_dir.join("config.toml")).map_err(io::Error::other)?;
    config.apply_env();
    logging::init()?;
    info!(root = %config.source.root, "starting");

    let db = db::open(&data_dir.join("cache.db")).map_err(io::Error::other)?;
    let data_source = DataSource::new(Root::parse(&config.source.root)).map_err(io::Error::other)?;
    let source = Arc::new(CachedSource::new(data_source, Arc::clone(&db), &config.source.topics));

    let (registry, startup_error) = match TopicRegistry::load(source.as_ref(), &config.source.topics) {
        Ok(registry) => (registry, None),
        Err(err) => {
            error!(error = %err, "failed to load topics");
            (TopicRegistry::default(), Some(format!("Could not load topics: {err}")))
        }
    };

    let sync = config.sync.as_ref().and_then(|sync| match GithubSync::from_config(sync) {
        Ok(sync) => Some(sync),
        Err(err) => {
            warn!(error = %err, "remote sync disabled");
            None
        }
    });

    let player = speech_player(&config.speech);
    let mut app = App::new(config, registry, player, source, db, sync);
    if let Some(message) = startup_error {
        app.set_error(message);
    }
    if let Some(id) = std::env::args().nth(1) {
        app.open_topic_id(id.trim_start_matches('#'));
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }

    Ok(())
}

fn speech_player(config: &karten_core::SpeechConfig) -> Player {
    let engine: Box<dyn SpeechEngine> = if config.enabled {
        Box::new(CommandEngine::new(&config.command))
    } else {
        Box::new(MuteEngine)
    };
    SpeechPlayer::new(engine, VoicePreference::from(config))
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout = TICK_MS.saturating_sub(last_tick.elapsed().as_millis() as u64);
        if event::poll(Duration::from_millis(timeout))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_key(app, key) {
                    return Ok(());
                }
            }
        }

        if last_tick.elapsed() >= Duration::from_millis(TICK_MS) {
            app.tick();
            last_tick = Instant::now();
        }
    }
}

/// Returns true when the app should quit.
fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c' | 'q')) {
        return true;
    }

    match app.mode {
        Mode::Home => return handle_home_key(app, key),
        Mode::Study => handle_study_key(app, key),
        Mode::AdminTopics => handle_admin_topics_key(app, key),
        Mode::AdminCards => handle_admin_cards_key(app, key),
        Mode::TopicForm => handle_topic_form_key(app, key),
        Mode::CardForm => handle_card_form_key(app, key),
        Mode::Tools => handle_tools_key(app, key),
        Mode::Confirm => handle_confirm_key(app, key),
    }
    false
}

fn handle_home_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Up | KeyCode::Char('k') => app.home_move(-1),
        KeyCode::Down | KeyCode::Char('j') => app.home_move(1),
        KeyCode::Enter => app.start_selected_topic(),
        KeyCode::Char('r') => app.reload_topics(),
        KeyCode::Char('a') => app.enter_admin(),
        KeyCode::Char('t') => app.open_tools(),
        _ => {}
    }
    false
}

fn handle_study_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char(' ') | KeyCode::Enter => app.session.flip(),
        KeyCode::Right | KeyCode::Char('l') => {
            app.session.next();
        }
        KeyCode::Left | KeyCode::Char('h') => {
            app.session.prev();
        }
        KeyCode::Char('r') => app.session.restart(),
        KeyCode::Char('s') => app.session.speak_current(),
        KeyCode::Esc | KeyCode::Char('q') => app.leave_study(),
        _ => {}
    }
}

fn handle_admin_topics_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.mode = Mode::Home,
        KeyCode::Up | KeyCode::Char('k') => app.admin_move(-1),
        KeyCode::Down | KeyCode::Char('j') => app.admin_move(1),
        KeyCode::Enter => app.open_admin_topic(),
        KeyCode::Char('n') => app.start_topic_form(),
        KeyCode::Char('d') => app.confirm_delete_topic(),
        KeyCode::Char('e') => app.export(),
        KeyCode::Char('p') => app.push(),
        KeyCode::Char('P') => app.confirm_pull(),
        KeyCode::Char('t') => app.open_tools(),
        _ => {}
    }
}

fn handle_admin_cards_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.close_admin_topic(),
        KeyCode::Up | KeyCode::Char('k') => app.card_move(-1),
        KeyCode::Down | KeyCode::Char('j') => app.card_move(1),
        KeyCode::Enter => {
            if !app.editor.deck().is_empty() {
                app.start_card_form(Some(app.card_selection));
            }
        }
        KeyCode::Char('n') => app.start_card_form(None),
        KeyCode::Char('d') => app.confirm_delete_card(),
        KeyCode::Char('i') => app.import_clipboard(),
        KeyCode::Char('c') => app.copy_deck(),
        KeyCode::Char('t') => app.open_tools(),
        _ => {}
    }
}

fn handle_topic_form_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.mode = Mode::AdminTopics,
        KeyCode::Tab => app.toggle_topic_field(),
        KeyCode::Enter => app.submit_topic_form(),
        KeyCode::Backspace => {
            app.topic_form_input().pop();
        }
        KeyCode::Char(ch) => app.topic_form_input().push(ch),
        _ => {}
    }
}

fn handle_card_form_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.mode = Mode::AdminCards,
        KeyCode::Tab => app.toggle_card_field(),
        KeyCode::Enter => app.submit_card_form(),
        KeyCode::Backspace => {
            app.card_form_input().pop();
        }
        KeyCode::Char(ch) => app.card_form_input().push(ch),
        _ => {}
    }
}

fn handle_tools_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.close_tools(),
        KeyCode::Tab => app.cycle_separator(),
        KeyCode::Char('v') => app.paste_tools_input(),
        KeyCode::Char('j') => app.apply_tool(Tool::Concatenate),
        KeyCode::Char('s') => app.apply_tool(Tool::Split),
        KeyCode::Char('u') => app.apply_tool(Tool::Case(Case::Upper)),
        KeyCode::Char('l') => app.apply_tool(Tool::Case(Case::Lower)),
        KeyCode::Char('T') => app.apply_tool(Tool::Case(Case::Title)),
        KeyCode::Char('w') => app.apply_tool(Tool::Tidy),
        KeyCode::Char('b') => app.apply_tool(Tool::BulkFormat),
        KeyCode::Char('y') => app.copy_tools_output(),
        _ => {}
    }
}

fn handle_confirm_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => app.resolve_confirm(true),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.resolve_confirm(false),
        _ => {}
    }
}
