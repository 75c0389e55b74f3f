use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use arboard::Clipboard;
use karten_core::{
    parse_topics, parse_word_pairs, AdminConfig, DeckEditor, EditorError, LoadError,
    TopicDescriptor, WordPair,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::{deck_key, Db, DbError, TOPICS_KEY};
use crate::source::{clean_reference, Root};
use crate::sync::{GithubSync, SyncError};

#[derive(Error, Debug)]
pub enum AdminError {
    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("cache: {0}")]
    Db(#[from] DbError),

    #[error("write failed: {0}")]
    Io(#[from] io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("clipboard: {0}")]
    Clipboard(#[from] arboard::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Deck as stored, blank rows included. A file that does not exist yet is
/// an empty deck.
pub fn deck_for_editing(
    topic: &TopicDescriptor,
    fetched: Result<String, LoadError>,
) -> Result<Vec<WordPair>, AdminError> {
    match fetched {
        Ok(body) => Ok(parse_word_pairs(&body)?),
        Err(LoadError::NotFound(reason)) => {
            info!(topic = %topic.id, %reason, "no deck file yet, starting empty");
            Ok(Vec::new())
        }
        Err(err) => Err(err.into()),
    }
}

/// Configured export directory, or the data root when it is local.
pub fn export_dir(admin: &AdminConfig, root: &Root) -> Option<PathBuf> {
    match (&admin.export_dir, root) {
        (Some(dir), _) => Some(PathBuf::from(dir)),
        (None, Root::Dir(dir)) => Some(dir.clone()),
        (None, Root::Url(_)) => None,
    }
}

fn write_file(path: &Path, body: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)
}

fn changed_bodies(editor: &DeckEditor) -> Result<Vec<(String, String, String)>, AdminError> {
    editor
        .changed_decks()
        .into_iter()
        .map(|(topic, cards)| {
            let body = serde_json::to_string_pretty(cards)?;
            Ok((topic.id.clone(), topic.file.clone(), body))
        })
        .collect()
}

/// Writes the topic list and every edited deck below `dir` at their
/// relative paths and stores the same content in the offline cache.
/// Returns the number of decks written.
pub fn export(
    editor: &mut DeckEditor,
    db: &dyn Db,
    dir: &Path,
    topics_reference: &str,
) -> Result<usize, AdminError> {
    let decks = changed_bodies(editor)?;
    let topics = editor.topics_json()?;

    for (_, file, body) in &decks {
        write_file(&dir.join(clean_reference(file)), body)?;
        db.put(&deck_key(file), body)?;
    }
    write_file(&dir.join(clean_reference(topics_reference)), &topics)?;
    db.put(TOPICS_KEY, &topics)?;

    editor.mark_saved();
    info!(dir = %dir.display(), decks = decks.len(), "exported topics");
    Ok(decks.len())
}

/// Pushes edited decks, then the topic list, so the remote list never
/// names a deck that is not there yet.
pub fn push(
    editor: &mut DeckEditor,
    sync: &GithubSync,
    shas: &mut HashMap<String, String>,
    topics_reference: &str,
) -> Result<usize, AdminError> {
    let decks = changed_bodies(editor)?;
    for (id, file, body) in &decks {
        let message = format!("Update {id} deck");
        let sha = sync.update(file, body, shas.get(file).map(String::as_str), &message)?;
        shas.insert(file.clone(), sha);
    }

    let topics = editor.topics_json()?;
    let sha = sync.update(
        topics_reference,
        &topics,
        shas.get(topics_reference).map(String::as_str),
        "Update topics",
    )?;
    shas.insert(topics_reference.to_string(), sha);

    editor.mark_saved();
    Ok(decks.len())
}

/// Replaces the editor contents with the remote topic list and decks. The
/// editor is only touched once everything has been fetched.
pub fn pull(
    editor: &mut DeckEditor,
    sync: &GithubSync,
    shas: &mut HashMap<String, String>,
    topics_reference: &str,
) -> Result<usize, AdminError> {
    let remote = sync.fetch(topics_reference)?;
    let topics = parse_topics(&remote.content)?;

    let mut fetched_shas = HashMap::new();
    fetched_shas.insert(topics_reference.to_string(), remote.sha);
    let mut decks = Vec::new();
    for topic in &topics {
        match sync.fetch(&topic.file) {
            Ok(file) => {
                decks.push((topic.id.clone(), parse_word_pairs(&file.content)?));
                fetched_shas.insert(topic.file.clone(), file.sha);
            }
            Err(SyncError::NotFound(path)) => warn!(topic = %topic.id, %path, "deck missing on remote"),
            Err(err) => return Err(err.into()),
        }
    }

    let pulled = decks.len();
    editor.replace_topics(topics);
    for (id, cards) in decks {
        editor.replace_deck(&id, cards);
    }
    shas.extend(fetched_shas);
    Ok(pulled)
}

pub fn clipboard_text() -> Result<String, AdminError> {
    let mut clipboard = Clipboard::new()?;
    let text = clipboard.get_text()?;
    if text.trim().is_empty() {
        return Err(AdminError::Unavailable("clipboard is empty".to_string()));
    }
    Ok(text)
}

pub fn copy_to_clipboard(text: &str) -> Result<(), AdminError> {
    let mut clipboard = Clipboard::new()?;
    clipboard.set_text(text.to_string())?;
    Ok(())
}
