use thiserror::Error;

/// Why an inbound frame could not be turned into a domain event.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no `type` discriminant")]
    MissingDiscriminant,
    #[error("unrecognized event type `{0}`")]
    Unrecognized(String),
    #[error("`{kind}` frame carries no `data` payload")]
    MissingPayload { kind: String },
    #[error("malformed `{kind}` payload: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of a request/response call against the backend.
#[derive(Error, Debug)]
pub enum RequestError {
    /// The backend answered with a non-success status; `body` is its payload verbatim.
    #[error("backend responded {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend unreachable: {0}")]
    Connectivity(#[source] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("invalid backend url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl RequestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}
