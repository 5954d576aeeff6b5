/// Errors surfaced by storage backends.
///
/// Component-level errors (insufficient stock, closed periods, state machine
/// violations) are typed in their own crates; this enum only covers what the
/// store itself can report.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// Opaque backend fault (connection loss, constraint violation we did
    /// not anticipate, serialization failure). Never retried by the engine.
    #[error("storage backend failure: {0}")]
    Backend(String),
}
