use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything the library can fail with. Nothing is retried internally.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx status or a body that is not the expected JSON shape.
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The legacy auth endpoint answered without the leading `OK` marker.
    #[error("legacy API denied connection: {0}")]
    AuthenticationDenied(String),

    #[error("malformed workout record: {0}")]
    MalformedRecord(String),

    #[error("unknown sport code {0}")]
    UnknownSport(i64),

    #[error("workout creation failed: {reason}")]
    WorkoutCreation {
        reason: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("workout edit failed: {0}")]
    WorkoutEdit(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("GPX generation failed: {0}")]
    Gpx(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn creation(reason: impl Into<String>) -> Self {
        Self::WorkoutCreation {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn creation_caused_by(reason: impl Into<String>, source: Self) -> Self {
        Self::WorkoutCreation {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }
}
