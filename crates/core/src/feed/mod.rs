pub mod assembler;
pub mod projector;

/// Outcomes a feed request can end in besides a result. `NotFound` and
/// `NoContent` are distinct so clients can tell a missing target from one
/// with nothing to show.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("target analyst not found")]
    NotFound,

    #[error("no content to show")]
    NoContent,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type FeedResult<T> = std::result::Result<T, FeedError>;
