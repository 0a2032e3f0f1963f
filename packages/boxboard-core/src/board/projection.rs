/// In-memory normalized mirror of one board and its columns and boxes.
use std::collections::HashMap;

use serde::Serialize;

use crate::types::{Board, BoardStatus, BoxItem, Builder, Column};

/// Everything the presentation layer reads about the current session.
///
/// Render only after `status` is `Ready`: the board, column and box fetches
/// complete in any order, so `order`, `columns` and `boxes` may be partially
/// populated before that.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub owner_id: String,
    pub board_id: String,
    /// Viewer identity, `None` for anonymous viewers.
    pub user_id: Option<String>,
    /// Board root in the document store. Empty before initialization.
    pub path: String,
    /// Column ids in display order.
    pub order: Vec<String>,
    pub columns: HashMap<String, Column>,
    pub boxes: HashMap<String, BoxItem>,
    pub board: Option<Board>,
    pub builder: HashMap<String, Builder>,
    pub status: BoardStatus,
}

/// A column resolved for display: its record and its boxes in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnView<'a> {
    pub id: &'a str,
    pub column: &'a Column,
    pub boxes: Vec<(&'a str, &'a BoxItem)>,
}

impl Projection {
    pub fn for_session(owner_id: &str, board_id: &str, user_id: Option<String>, path: String) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            board_id: board_id.to_string(),
            user_id,
            path,
            ..Default::default()
        }
    }

    pub fn is_initialized(&self) -> bool {
        !self.path.is_empty()
    }

    /// Whether the viewer owns the board. Anonymous viewers never do.
    pub fn is_owner(&self) -> bool {
        !self.owner_id.is_empty() && self.user_id.as_deref() == Some(self.owner_id.as_str())
    }

    pub fn column_boxes(&self, column_id: &str) -> Option<&[String]> {
        self.columns.get(column_id).map(|c| c.boxes.as_slice())
    }

    /// The column whose sequence currently holds `box_id`.
    pub fn column_of(&self, box_id: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(_, column)| column.boxes.iter().any(|b| b == box_id))
            .map(|(id, _)| id.as_str())
    }

    /// Resolve `order` into columns and their boxes.
    /// Ids without a record (not fetched yet, or dangling) are skipped.
    pub fn ordered_columns(&self) -> Vec<ColumnView<'_>> {
        self.order
            .iter()
            .filter_map(|id| {
                let column = self.columns.get(id)?;
                let boxes = column
                    .boxes
                    .iter()
                    .filter_map(|box_id| {
                        self.boxes
                            .get(box_id)
                            .map(|item| (box_id.as_str(), item))
                    })
                    .collect();
                Some(ColumnView {
                    id: id.as_str(),
                    column,
                    boxes,
                })
            })
            .collect()
    }
}
