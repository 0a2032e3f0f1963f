/// Box and board mutations.
///
/// Every mutation updates the projection and then issues the matching store
/// writes. Local changes are not rolled back when a write fails: the error is
/// returned and the projection keeps the optimistic value until the next fetch.
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;

use super::session::BoardSession;
use super::BoardError;
use crate::storage::{paths, to_fields, StorageError};
use crate::types::{BoardUpdate, BoxItem, Builder, BuilderUpdate};

fn boxes_field(boxes: &[String]) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("boxes".to_string(), json!(boxes));
    fields
}

/// Box deletions fanned out by `delete_all_column_boxes`.
///
/// The deletes run on their own; awaiting `wait` only collects their results.
/// Dropping this value does not cancel them.
#[derive(Default)]
pub struct PendingDeletes {
    handles: Vec<(String, JoinHandle<Result<(), StorageError>>)>,
}

impl PendingDeletes {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Box ids whose deletes were issued.
    pub fn box_ids(&self) -> impl Iterator<Item = &str> {
        self.handles.iter().map(|(id, _)| id.as_str())
    }

    /// Wait for every delete and return the per-box outcome.
    pub async fn wait(self) -> Vec<(String, Result<(), BoardError>)> {
        let mut outcomes = Vec::with_capacity(self.handles.len());
        for (id, handle) in self.handles {
            let outcome = match handle.await {
                Ok(result) => result.map_err(BoardError::from),
                Err(e) => Err(BoardError::Task(e.to_string())),
            };
            outcomes.push((id, outcome));
        }
        outcomes
    }
}

impl BoardSession {
    /// Merge a draft update into a column's builder.
    pub fn update_builder(&self, column_id: &str, update: BuilderUpdate) {
        self.modify(|p| {
            p.builder.entry(column_id.to_string()).or_default().apply(update);
        });
    }

    /// Turn the column's draft into a new box at the end of the column.
    ///
    /// Returns `Ok(None)` without touching anything when the draft is empty.
    /// Otherwise the draft is cleared and the builder closed, the box appears
    /// locally, and then the column's `boxes` and the new box document are
    /// written, in that order.
    pub async fn add_box(&self, column_id: &str) -> Result<Option<String>, BoardError> {
        let path = self.path()?;
        let added = self.apply_if(|p| -> Result<Option<(String, String, Vec<String>)>, BoardError> {
            let name = p
                .builder
                .get(column_id)
                .map(|b| b.value.clone())
                .unwrap_or_default();
            if name.is_empty() {
                return Ok(None);
            }
            let column = p
                .columns
                .get_mut(column_id)
                .ok_or_else(|| BoardError::ColumnNotFound(column_id.to_string()))?;

            let id = uuid::Uuid::new_v4().to_string();
            column.boxes.push(id.clone());
            let boxes = column.boxes.clone();
            p.builder.insert(column_id.to_string(), Builder::default());
            p.boxes.insert(id.clone(), BoxItem { name: name.clone() });
            Ok(Some((id, name, boxes)))
        })?;

        let Some((id, name, boxes)) = added else {
            return Ok(None);
        };
        log::debug!("[boxboard.mutations] Added box {} to column {}", id, column_id);

        self.store()
            .update_document(&paths::column_path(&path, column_id), boxes_field(&boxes))
            .await?;
        let item = serde_json::to_value(BoxItem { name }).map_err(StorageError::from)?;
        self.store()
            .set_document(&paths::box_path(&path, &id), item)
            .await?;
        Ok(Some(id))
    }

    /// Rename a box locally, then write the new name.
    pub async fn edit_box(&self, box_id: &str, name: &str) -> Result<(), BoardError> {
        let path = self.path()?;
        self.apply(|p| -> Result<(), BoardError> {
            let item = p
                .boxes
                .get_mut(box_id)
                .ok_or_else(|| BoardError::BoxNotFound(box_id.to_string()))?;
            item.name = name.to_string();
            Ok(())
        })?;

        let mut fields = Map::new();
        fields.insert("name".to_string(), json!(name));
        self.store()
            .update_document(&paths::box_path(&path, box_id), fields)
            .await?;
        Ok(())
    }

    /// Remove a box from its column and delete it.
    ///
    /// Unlike the other mutations the store goes first: the box document is
    /// deleted, the column's `boxes` written, and only then is the projection
    /// updated. A failed write leaves the projection untouched.
    pub async fn delete_box(&self, column_id: &str, box_id: &str) -> Result<(), BoardError> {
        let path = self.path()?;
        let remaining = self.read(|p| -> Result<Vec<String>, BoardError> {
            let column = p
                .columns
                .get(column_id)
                .ok_or_else(|| BoardError::ColumnNotFound(column_id.to_string()))?;
            let position = column
                .boxes
                .iter()
                .position(|b| b == box_id)
                .ok_or_else(|| BoardError::BoxNotFound(box_id.to_string()))?;
            let mut remaining = column.boxes.clone();
            remaining.remove(position);
            Ok(remaining)
        })?;

        self.store()
            .delete_document(&paths::box_path(&path, box_id))
            .await?;
        self.store()
            .update_document(&paths::column_path(&path, column_id), boxes_field(&remaining))
            .await?;

        self.modify(|p| {
            if let Some(column) = p.columns.get_mut(column_id) {
                column.boxes = remaining;
            }
            p.boxes.remove(box_id);
        });
        log::debug!("[boxboard.mutations] Deleted box {} from column {}", box_id, column_id);
        Ok(())
    }

    /// Empty a column and delete all of its boxes.
    ///
    /// The column's empty `boxes` is written first. The box deletes are then
    /// fanned out without waiting for them, and the projection is cleared
    /// right away. An already-empty column is left alone: nothing is written.
    pub async fn delete_all_column_boxes(&self, column_id: &str) -> Result<PendingDeletes, BoardError> {
        let path = self.path()?;
        let captured = self.read(|p| {
            p.column_boxes(column_id)
                .map(|boxes| boxes.to_vec())
                .ok_or_else(|| BoardError::ColumnNotFound(column_id.to_string()))
        })?;
        if captured.is_empty() {
            return Ok(PendingDeletes::default());
        }

        self.store()
            .update_document(&paths::column_path(&path, column_id), boxes_field(&[]))
            .await?;

        let handles = captured
            .iter()
            .map(|box_id| {
                let store = self.store().clone();
                let box_path = paths::box_path(&path, box_id);
                let handle = tokio::spawn(async move {
                    let result = store.delete_document(&box_path).await;
                    if let Err(e) = &result {
                        log::warn!("[boxboard.mutations] Failed to delete {}: {}", box_path, e);
                    }
                    result
                });
                (box_id.clone(), handle)
            })
            .collect();

        self.modify(|p| {
            for box_id in &captured {
                p.boxes.remove(box_id);
            }
            if let Some(column) = p.columns.get_mut(column_id) {
                column.boxes.clear();
            }
        });
        log::debug!(
            "[boxboard.mutations] Cleared {} boxes from column {}",
            captured.len(),
            column_id
        );
        Ok(PendingDeletes { handles })
    }

    /// Write a partial board update. Owner only.
    ///
    /// Returns `Ok(false)` without writing when the viewer is not the owner or
    /// the update is empty. Fields are validated before anything is written.
    pub async fn update_board(&self, update: BoardUpdate) -> Result<bool, BoardError> {
        let path = self.path()?;
        if !self.read(|p| p.is_owner()) {
            log::debug!("[boxboard.mutations] Ignoring board update from non-owner on {}", path);
            return Ok(false);
        }
        if update.is_empty() {
            return Ok(false);
        }
        self.defaults()
            .validate(update.name.as_deref(), update.description.as_deref())
            .map_err(BoardError::Validation)?;

        self.store()
            .update_document(&path, to_fields(&update)?)
            .await?;

        self.modify(|p| {
            if let Some(board) = p.board.as_mut() {
                board.apply(&update);
            }
            if let Some(order) = &update.order {
                p.order = order.clone();
            }
        });
        log::info!("[boxboard.mutations] Updated board {}", path);
        Ok(true)
    }

    /// Delete the board document. Owner only; returns `Ok(false)` otherwise.
    /// Column and box documents beneath it are not touched.
    pub async fn delete_board(&self) -> Result<bool, BoardError> {
        let path = self.path()?;
        if !self.read(|p| p.is_owner()) {
            log::debug!("[boxboard.mutations] Ignoring board delete from non-owner on {}", path);
            return Ok(false);
        }

        self.store().delete_document(&path).await?;

        self.modify(|p| {
            p.board = None;
            p.order.clear();
        });
        log::info!("[boxboard.mutations] Deleted board {}", path);
        Ok(true)
    }
}
