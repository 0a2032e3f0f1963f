/// Board session engine: projection, fetches, mutations and reordering.
pub mod create;
pub mod mutations;
pub mod projection;
pub mod reorder;
pub mod session;

pub use create::{create_board, NewBoard};
pub use mutations::PendingDeletes;
pub use projection::{ColumnView, Projection};
pub use reorder::ReorderPlan;
pub use session::{BoardSession, SessionFetches};

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Box not found: {0}")]
    BoxNotFound(String),

    #[error("Index {index} out of range for column {column_id} (length {len})")]
    IndexOutOfRange {
        column_id: String,
        index: usize,
        len: usize,
    },

    #[error("Dragged box {expected} does not match {found} at the source index")]
    DraggableMismatch { expected: String, found: String },

    #[error("Invalid board: {0}")]
    Validation(String),

    #[error("Board session is not initialized")]
    NotInitialized,

    #[error("Background task failed: {0}")]
    Task(String),
}
