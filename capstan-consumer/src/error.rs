use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("request failed with: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gateway returned status {status}")]
    Gateway { status: u16 },
    #[error("target returned status {status}")]
    CrawlStatus { status: u16 },
    #[error("no handler for job kind {0}")]
    UnsupportedKind(String),
}
