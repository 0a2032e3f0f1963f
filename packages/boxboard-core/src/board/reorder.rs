/// Drag-and-drop reordering.
///
/// A move is always remove-then-insert: the box is taken out at the source
/// index first, and the destination index is applied to the sequence that
/// results. Within one column that means indices after the source shift down
/// by one before the insert. Across columns the destination sequence is the
/// destination column as it was, untouched by the removal.
use serde_json::{json, Map};

use super::projection::Projection;
use super::session::BoardSession;
use super::BoardError;
use crate::storage::paths;
use crate::types::DropResult;

/// Remove and return the id at `index`.
pub fn remove_at(column_id: &str, boxes: &mut Vec<String>, index: usize) -> Result<String, BoardError> {
    if index >= boxes.len() {
        return Err(BoardError::IndexOutOfRange {
            column_id: column_id.to_string(),
            index,
            len: boxes.len(),
        });
    }
    Ok(boxes.remove(index))
}

/// Insert `id` at `index`. An index past the end appends.
pub fn insert_at(boxes: &mut Vec<String>, index: usize, id: String) {
    let index = index.min(boxes.len());
    boxes.insert(index, id);
}

/// New column sequences produced by a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderPlan {
    SameColumn {
        column_id: String,
        boxes: Vec<String>,
    },
    CrossColumn {
        source_id: String,
        source_boxes: Vec<String>,
        destination_id: String,
        destination_boxes: Vec<String>,
    },
}

impl ReorderPlan {
    /// Column writes this plan needs, source first.
    pub fn writes(&self) -> Vec<(&str, &[String])> {
        match self {
            ReorderPlan::SameColumn { column_id, boxes } => vec![(column_id.as_str(), boxes.as_slice())],
            ReorderPlan::CrossColumn {
                source_id,
                source_boxes,
                destination_id,
                destination_boxes,
            } => vec![
                (source_id.as_str(), source_boxes.as_slice()),
                (destination_id.as_str(), destination_boxes.as_slice()),
            ],
        }
    }
}

/// Work out the sequences a drop produces. `Ok(None)` when the drop has no
/// destination.
///
/// The id removed at the source index must be the dragged id; anything else
/// means the presentation layer and the projection disagree, and nothing is
/// planned.
pub fn plan(projection: &Projection, drop: &DropResult) -> Result<Option<ReorderPlan>, BoardError> {
    let Some(destination) = &drop.destination else {
        return Ok(None);
    };
    let source = &drop.source;

    let mut source_boxes = projection
        .column_boxes(&source.droppable_id)
        .ok_or_else(|| BoardError::ColumnNotFound(source.droppable_id.clone()))?
        .to_vec();

    if source.droppable_id == destination.droppable_id {
        let removed = remove_at(&source.droppable_id, &mut source_boxes, source.index)?;
        check_dragged(drop, removed)?;
        insert_at(&mut source_boxes, destination.index, drop.draggable_id.clone());
        return Ok(Some(ReorderPlan::SameColumn {
            column_id: source.droppable_id.clone(),
            boxes: source_boxes,
        }));
    }

    let mut destination_boxes = projection
        .column_boxes(&destination.droppable_id)
        .ok_or_else(|| BoardError::ColumnNotFound(destination.droppable_id.clone()))?
        .to_vec();

    let removed = remove_at(&source.droppable_id, &mut source_boxes, source.index)?;
    check_dragged(drop, removed)?;
    insert_at(&mut destination_boxes, destination.index, drop.draggable_id.clone());
    Ok(Some(ReorderPlan::CrossColumn {
        source_id: source.droppable_id.clone(),
        source_boxes,
        destination_id: destination.droppable_id.clone(),
        destination_boxes,
    }))
}

fn check_dragged(drop: &DropResult, removed: String) -> Result<(), BoardError> {
    if removed != drop.draggable_id {
        return Err(BoardError::DraggableMismatch {
            expected: drop.draggable_id.clone(),
            found: removed,
        });
    }
    Ok(())
}

impl BoardSession {
    /// Drag-end handler. Applies the move to the projection, then writes the
    /// affected column documents: one for a move within a column, source then
    /// destination for a move across columns. The writes are independent; a
    /// failure in the second leaves the first in place.
    pub async fn drag_end(&self, drop: DropResult) -> Result<(), BoardError> {
        if drop.destination.is_none() {
            return Ok(());
        }
        let path = self.path()?;

        let planned = self.apply(|p| -> Result<Option<ReorderPlan>, BoardError> {
            let Some(planned) = plan(p, &drop)? else {
                return Ok(None);
            };
            for (column_id, boxes) in planned.writes() {
                if let Some(column) = p.columns.get_mut(column_id) {
                    column.boxes = boxes.to_vec();
                }
            }
            Ok(Some(planned))
        })?;
        let Some(planned) = planned else {
            return Ok(());
        };
        log::debug!(
            "[boxboard.reorder] Moved {} from {}[{}]",
            drop.draggable_id,
            drop.source.droppable_id,
            drop.source.index
        );

        for (column_id, boxes) in planned.writes() {
            let mut fields = Map::new();
            fields.insert("boxes".to_string(), json!(boxes));
            self.store()
                .update_document(&paths::column_path(&path, column_id), fields)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::session::tests::{loaded_session, seeded_store, ROOT};
    use crate::storage::memory::WriteKind;
    use crate::types::Column;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn projection(columns: &[(&str, &[&str])]) -> Projection {
        let mut p = Projection::default();
        for (id, boxes) in columns {
            p.columns.insert(
                id.to_string(),
                Column {
                    name: id.to_string(),
                    boxes: ids(boxes),
                },
            );
        }
        p
    }

    #[test]
    fn test_same_column_move_to_end() {
        let p = projection(&[("c1", &["a", "b", "c"])]);
        let drop = DropResult::new("a", ("c1", 0), Some(("c1", 2)));
        assert_eq!(
            plan(&p, &drop).unwrap(),
            Some(ReorderPlan::SameColumn {
                column_id: "c1".to_string(),
                boxes: ids(&["b", "c", "a"]),
            })
        );
    }

    #[test]
    fn test_same_column_move_up() {
        let p = projection(&[("c1", &["a", "b", "c"])]);
        let drop = DropResult::new("c", ("c1", 2), Some(("c1", 0)));
        let Some(ReorderPlan::SameColumn { boxes, .. }) = plan(&p, &drop).unwrap() else {
            panic!("expected a same-column plan");
        };
        assert_eq!(boxes, ids(&["c", "a", "b"]));
    }

    #[test]
    fn test_same_index_round_trip() {
        let p = projection(&[("c1", &["a", "b", "c"])]);
        let drop = DropResult::new("b", ("c1", 1), Some(("c1", 1)));
        let Some(ReorderPlan::SameColumn { boxes, .. }) = plan(&p, &drop).unwrap() else {
            panic!("expected a same-column plan");
        };
        assert_eq!(boxes, ids(&["a", "b", "c"]));
    }

    #[test]
    fn test_cross_column_move() {
        let p = projection(&[("src", &["a", "b"]), ("dst", &["x"])]);
        let drop = DropResult::new("a", ("src", 0), Some(("dst", 1)));
        assert_eq!(
            plan(&p, &drop).unwrap(),
            Some(ReorderPlan::CrossColumn {
                source_id: "src".to_string(),
                source_boxes: ids(&["b"]),
                destination_id: "dst".to_string(),
                destination_boxes: ids(&["x", "a"]),
            })
        );
    }

    #[test]
    fn test_insert_past_end_appends() {
        let p = projection(&[("src", &["a"]), ("dst", &["x"])]);
        let drop = DropResult::new("a", ("src", 0), Some(("dst", 9)));
        let Some(ReorderPlan::CrossColumn { destination_boxes, .. }) = plan(&p, &drop).unwrap() else {
            panic!("expected a cross-column plan");
        };
        assert_eq!(destination_boxes, ids(&["x", "a"]));
    }

    #[test]
    fn test_no_destination() {
        let p = projection(&[("c1", &["a"])]);
        let drop = DropResult::new("a", ("c1", 0), None);
        assert_eq!(plan(&p, &drop).unwrap(), None);
    }

    #[test]
    fn test_rejects_bad_source() {
        let p = projection(&[("c1", &["a", "b"]), ("c2", &[])]);
        assert!(matches!(
            plan(&p, &DropResult::new("a", ("c1", 5), Some(("c2", 0)))),
            Err(BoardError::IndexOutOfRange { index: 5, len: 2, .. })
        ));
        assert!(matches!(
            plan(&p, &DropResult::new("b", ("c1", 0), Some(("c2", 0)))),
            Err(BoardError::DraggableMismatch { .. })
        ));
        assert!(matches!(
            plan(&p, &DropResult::new("a", ("c1", 0), Some(("missing", 0)))),
            Err(BoardError::ColumnNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_drag_within_column_writes_once() {
        let store = seeded_store(true);
        let session = loaded_session(&store, None).await;

        session
            .drag_end(DropResult::new("a", ("c1", 0), Some(("c1", 2))))
            .await
            .unwrap();

        assert_eq!(session.snapshot().columns["c1"].boxes, ids(&["b", "c", "a"]));
        let journal = store.journal();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].kind, WriteKind::Update);
        assert_eq!(journal[0].path, format!("{}/columns/c1", ROOT));
        assert_eq!(
            store.get(&format!("{}/columns/c1", ROOT)).unwrap()["boxes"],
            json!(["b", "c", "a"])
        );
    }

    #[tokio::test]
    async fn test_drag_across_columns_writes_source_then_destination() {
        let store = seeded_store(true);
        let session = loaded_session(&store, None).await;

        session
            .drag_end(DropResult::new("b", ("c1", 1), Some(("c2", 0))))
            .await
            .unwrap();

        let p = session.snapshot();
        assert_eq!(p.columns["c1"].boxes, ids(&["a", "c"]));
        assert_eq!(p.columns["c2"].boxes, ids(&["b", "x"]));
        assert_eq!(p.column_of("b"), Some("c2"));

        let paths: Vec<String> = store.journal().into_iter().map(|e| e.path).collect();
        assert_eq!(
            paths,
            vec![format!("{}/columns/c1", ROOT), format!("{}/columns/c2", ROOT)]
        );
    }

    #[tokio::test]
    async fn test_drag_across_columns_destination_write_fails() {
        let store = seeded_store(true);
        let session = loaded_session(&store, None).await;
        store.fail_path_prefix(&format!("{}/columns/c2", ROOT));

        let result = session
            .drag_end(DropResult::new("a", ("c1", 0), Some(("c2", 1))))
            .await;
        assert!(matches!(result, Err(BoardError::Storage(_))));

        // the source write stays, the destination keeps its old sequence
        assert_eq!(
            store.get(&format!("{}/columns/c1", ROOT)).unwrap()["boxes"],
            json!(["b", "c"])
        );
        assert_eq!(
            store.get(&format!("{}/columns/c2", ROOT)).unwrap()["boxes"],
            json!(["x"])
        );
        let p = session.snapshot();
        assert_eq!(p.columns["c1"].boxes, ids(&["b", "c"]));
        assert_eq!(p.columns["c2"].boxes, ids(&["x", "a"]));
    }

    #[tokio::test]
    async fn test_drag_cancelled_is_noop() {
        let store = seeded_store(true);
        let session = loaded_session(&store, None).await;
        let before = session.snapshot();

        session
            .drag_end(DropResult::new("a", ("c1", 0), None))
            .await
            .unwrap();

        assert_eq!(session.snapshot(), before);
        assert!(store.journal().is_empty());
    }

    #[tokio::test]
    async fn test_drag_keeps_local_move_when_write_fails() {
        let store = seeded_store(true);
        let session = loaded_session(&store, None).await;
        store.set_fail_writes(true);

        let result = session
            .drag_end(DropResult::new("x", ("c2", 0), Some(("c3", 0))))
            .await;

        assert!(result.is_err());
        let p = session.snapshot();
        assert!(p.columns["c2"].boxes.is_empty());
        assert_eq!(p.columns["c3"].boxes, ids(&["x"]));
        assert_eq!(
            store.get(&format!("{}/columns/c2", ROOT)).unwrap()["boxes"],
            json!(["x"])
        );
    }

    #[tokio::test]
    async fn test_later_drag_wins() {
        let store = seeded_store(true);
        let session = loaded_session(&store, None).await;

        let first = session.drag_end(DropResult::new("a", ("c1", 0), Some(("c1", 2))));
        let second = session.drag_end(DropResult::new("x", ("c2", 0), Some(("c1", 0))));
        let (first, second) = tokio::join!(first, second);
        first.unwrap();
        second.unwrap();

        // both moves applied, each against the state the other left
        let p = session.snapshot();
        assert_eq!(p.columns["c1"].boxes.len(), 4);
        assert!(p.columns["c2"].boxes.is_empty());
        assert_eq!(
            store.get(&format!("{}/columns/c1", ROOT)).unwrap()["boxes"],
            json!(p.columns["c1"].boxes)
        );
    }
}
