/// Board creation: the board document, its default columns, then its order.
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use super::BoardError;
use crate::config::BoardDefaults;
use crate::storage::{paths, DocumentStore, StorageError};
use crate::types::{Board, Column};

/// Form input for a new board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBoard {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_public")]
    pub public: bool,
}

fn default_public() -> bool {
    true
}

impl NewBoard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            public: default_public(),
        }
    }
}

/// Local time with UTC offset, e.g. `2024-03-01T09:30:00+01:00`.
fn created_at_now() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Create a board for `owner_id` and return its id.
///
/// The board document is created first with an empty `order`, then one
/// column per `defaults.columns` entry, and finally the board's `order` is
/// written with the new column ids. A failure part-way leaves what was
/// already created in place.
pub async fn create_board(
    store: &dyn DocumentStore,
    owner_id: &str,
    new_board: NewBoard,
    defaults: &BoardDefaults,
) -> Result<String, BoardError> {
    if owner_id.is_empty() {
        return Err(BoardError::Validation("owner id must not be empty".to_string()));
    }
    defaults
        .validate(Some(&new_board.name), new_board.description.as_deref())
        .map_err(BoardError::Validation)?;

    let board = Board {
        name: new_board.name,
        description: new_board.description,
        public: new_board.public,
        created_at: Some(created_at_now()),
        order: Vec::new(),
    };
    let board_id = store
        .create_document(
            &paths::boards_collection(owner_id),
            serde_json::to_value(&board).map_err(StorageError::from)?,
        )
        .await?;
    let board_path = paths::board_path(owner_id, &board_id);

    let mut order = Vec::with_capacity(defaults.columns.len());
    for name in &defaults.columns {
        let column = Column {
            name: name.clone(),
            boxes: Vec::new(),
        };
        let column_id = store
            .create_document(
                &paths::columns_collection(&board_path),
                serde_json::to_value(&column).map_err(StorageError::from)?,
            )
            .await?;
        order.push(column_id);
    }

    let mut fields = Map::new();
    fields.insert("order".to_string(), json!(order));
    store.update_document(&board_path, fields).await?;

    log::info!(
        "[boxboard.create] Created board {} with {} columns",
        board_path,
        order.len()
    );
    Ok(board_id)
}
