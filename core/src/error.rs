use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("resource contains no cards")]
    Empty,

    #[error("malformed resource: {0}")]
    Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("playback interrupted by a newer request")]
    Interrupted,

    #[error("playback cancelled")]
    Canceled,

    #[error("speech engine unavailable: {0}")]
    Unavailable(String),

    #[error("playback failed: {0}")]
    Failed(String),
}

impl PlaybackError {
    /// Interruptions and cancellations are expected whenever a new card is
    /// pronounced over an old one and are never reported.
    pub fn is_benign(&self) -> bool {
        matches!(self, PlaybackError::Interrupted | PlaybackError::Canceled)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("please fill all fields")]
    MissingField,

    #[error("topic id '{0}' already exists")]
    DuplicateId(String),

    #[error("unknown topic '{0}'")]
    UnknownTopic(String),

    #[error("no topic selected")]
    NoTopicSelected,

    #[error("card {0} does not exist")]
    NoSuchCard(usize),

    #[error("invalid format: {0}")]
    InvalidFormat(String),
}
