use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExternalSourceError {
    #[error("external data source URL is not configured")]
    NotConfigured,
    #[error("request to external data source failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("external data source responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("external data source reported an error: {0}")]
    Remote(String),
}

impl ExternalSourceError {
    /// Short text shown on the dashboard while falling back to another source.
    pub fn notice(&self) -> &'static str {
        match self {
            Self::Request(_) => "Failed to connect to the chatbot data source",
            Self::NotConfigured | Self::Status { .. } | Self::Remote(_) => "Failed to fetch chatbot data",
        }
    }
}
