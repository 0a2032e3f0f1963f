use serde::{Deserialize, Serialize};

/// Maximum board name length, in characters.
pub const BOARD_NAME_MAX_CHARS: usize = 15;
/// Maximum board description length, in characters.
pub const BOARD_DESCRIPTION_MAX_CHARS: usize = 30;

/// Board metadata document stored at `users/{owner}/boards/{board}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A missing flag reads as private.
    #[serde(default)]
    pub public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Column ids in display order.
    #[serde(default)]
    pub order: Vec<String>,
}

impl Board {
    /// Merge a typed update into this board. Fields left as `None` are kept.
    pub fn apply(&mut self, update: &BoardUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(description) = &update.description {
            self.description = Some(description.clone());
        }
        if let Some(public) = update.public {
            self.public = public;
        }
        if let Some(order) = &update.order {
            self.order = order.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Box ids in display order. This is the only source of box ordering.
    #[serde(default)]
    pub boxes: Vec<String>,
}

/// A single card on the board. Named `BoxItem` to stay clear of `std::boxed::Box`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxItem {
    pub name: String,
}

/// Per-column "add box" form state. Never persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Builder {
    /// Whether the add form is open.
    pub state: bool,
    /// Draft text for the next box.
    pub value: String,
}

impl Builder {
    pub fn apply(&mut self, update: BuilderUpdate) {
        if let Some(state) = update.state {
            self.state = state;
        }
        if let Some(value) = update.value {
            self.value = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BuilderUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl BuilderUpdate {
    pub fn open() -> Self {
        Self {
            state: Some(true),
            value: None,
        }
    }

    pub fn draft(value: impl Into<String>) -> Self {
        Self {
            state: None,
            value: Some(value.into()),
        }
    }
}

/// Partial board update. Serializes to exactly the fields that are set, so it
/// can be sent as-is to `DocumentStore::update_document`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<String>>,
}

impl BoardUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.public.is_none()
            && self.order.is_none()
    }
}

/// Session status signal consumed by the presentation layer.
///
/// Transitions are `Uninitialized -> {Ready | Unauthorized | NotFound}`.
/// Anything above 200 is a terminal redirect for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum BoardStatus {
    #[default]
    Uninitialized,
    Ready,
    Unauthorized,
    NotFound,
}

impl BoardStatus {
    pub fn code(self) -> u16 {
        match self {
            BoardStatus::Uninitialized => 0,
            BoardStatus::Ready => 200,
            BoardStatus::Unauthorized => 401,
            BoardStatus::NotFound => 404,
        }
    }

    pub fn is_ready(self) -> bool {
        self == BoardStatus::Ready
    }

    /// True when the consumer should navigate away (401/404).
    pub fn is_redirect(self) -> bool {
        self.code() > 200
    }
}

impl From<BoardStatus> for u16 {
    fn from(status: BoardStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u16> for BoardStatus {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(BoardStatus::Uninitialized),
            200 => Ok(BoardStatus::Ready),
            401 => Ok(BoardStatus::Unauthorized),
            404 => Ok(BoardStatus::NotFound),
            other => Err(format!("unknown board status code {}", other)),
        }
    }
}

/// One end of a drag: a column id and a position within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraggableLocation {
    pub droppable_id: String,
    pub index: usize,
}

/// Drag-end event as reported by the presentation layer.
/// `destination` is `None` when the drop landed outside any column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropResult {
    pub source: DraggableLocation,
    #[serde(default)]
    pub destination: Option<DraggableLocation>,
    pub draggable_id: String,
}

impl DropResult {
    pub fn new(
        draggable_id: impl Into<String>,
        source: (&str, usize),
        destination: Option<(&str, usize)>,
    ) -> Self {
        Self {
            source: DraggableLocation {
                droppable_id: source.0.to_string(),
                index: source.1,
            },
            destination: destination.map(|(droppable_id, index)| DraggableLocation {
                droppable_id: droppable_id.to_string(),
                index,
            }),
            draggable_id: draggable_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_roundtrip_through_serde() {
        let json = serde_json::to_string(&BoardStatus::Unauthorized).unwrap();
        assert_eq!(json, "401");
        let parsed: BoardStatus = serde_json::from_str("404").unwrap();
        assert_eq!(parsed, BoardStatus::NotFound);
        assert!(serde_json::from_str::<BoardStatus>("500").is_err());
    }

    #[test]
    fn test_status_redirect() {
        assert!(!BoardStatus::Uninitialized.is_redirect());
        assert!(!BoardStatus::Ready.is_redirect());
        assert!(BoardStatus::Unauthorized.is_redirect());
        assert!(BoardStatus::NotFound.is_redirect());
    }

    #[test]
    fn test_board_missing_public_reads_private() {
        let board: Board = serde_json::from_str(r#"{"name":"Work"}"#).unwrap();
        assert!(!board.public);
        assert!(board.order.is_empty());
    }

    #[test]
    fn test_board_update_serializes_only_set_fields() {
        let update = BoardUpdate {
            public: Some(false),
            ..Default::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value, serde_json::json!({ "public": false }));
    }

    #[test]
    fn test_board_apply_keeps_unset_fields() {
        let mut board = Board {
            name: "Work".to_string(),
            description: Some("daily".to_string()),
            public: true,
            created_at: None,
            order: vec!["c1".to_string()],
        };
        board.apply(&BoardUpdate {
            name: Some("Home".to_string()),
            ..Default::default()
        });
        assert_eq!(board.name, "Home");
        assert_eq!(board.description.as_deref(), Some("daily"));
        assert!(board.public);
        assert_eq!(board.order, vec!["c1".to_string()]);
    }

    #[test]
    fn test_drop_result_wire_shape() {
        let drop: DropResult = serde_json::from_str(
            r#"{"source":{"droppableId":"c1","index":0},"draggableId":"b1"}"#,
        )
        .unwrap();
        assert!(drop.destination.is_none());
        assert_eq!(drop.source.droppable_id, "c1");
    }
}
