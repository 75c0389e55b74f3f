use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;

use karten_core::{LoadError, LoadTicket, ResourceSource, TopicDescriptor};

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// A deck for the study session, tagged with its load ticket.
    Study { ticket: LoadTicket, topic: TopicDescriptor },
    /// The topic list.
    Topics { reference: String },
    /// A deck opened in the admin editor.
    Edit { topic: TopicDescriptor },
}

impl Request {
    fn reference(&self) -> &str {
        match self {
            Request::Study { topic, .. } | Request::Edit { topic } => &topic.file,
            Request::Topics { reference } => reference,
        }
    }
}

#[derive(Debug)]
pub struct LoadResult {
    pub request: Request,
    pub fetched: Result<String, LoadError>,
}

/// Fetches resources off the UI thread. Results come back with the request
/// they answer; deciding which study load still counts is up to the session
/// controller.
pub struct DeckLoader<S> {
    source: Arc<S>,
    tx: Sender<LoadResult>,
    rx: Receiver<LoadResult>,
}

impl<S: ResourceSource + Send + Sync + 'static> DeckLoader<S> {
    pub fn new(source: Arc<S>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { source, tx, rx }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn request(&self, request: Request) {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let fetched = source.fetch(request.reference());
            let _ = tx.send(LoadResult { request, fetched });
        });
    }

    pub fn poll(&self) -> Vec<LoadResult> {
        let mut results = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(result) => results.push(result),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        results
    }
}
