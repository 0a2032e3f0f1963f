/// Shared configuration types used by the session engine and front ends.
use serde::{Deserialize, Serialize};

use crate::types::{BOARD_DESCRIPTION_MAX_CHARS, BOARD_NAME_MAX_CHARS};

/// Defaults applied when creating or updating boards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardDefaults {
    /// Columns created with every new board, in order.
    pub columns: Vec<String>,
    pub name_max_chars: usize,
    pub description_max_chars: usize,
}

impl Default for BoardDefaults {
    fn default() -> Self {
        Self {
            columns: vec![
                "To do".to_string(),
                "In Progress".to_string(),
                "Done".to_string(),
            ],
            name_max_chars: BOARD_NAME_MAX_CHARS,
            description_max_chars: BOARD_DESCRIPTION_MAX_CHARS,
        }
    }
}

impl BoardDefaults {
    /// Check a board name and optional description against the limits.
    /// Lengths are counted in characters, not bytes.
    pub fn validate(&self, name: Option<&str>, description: Option<&str>) -> Result<(), String> {
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err("board name must not be empty".to_string());
            }
            let len = name.chars().count();
            if len > self.name_max_chars {
                return Err(format!(
                    "board name is {} characters, limit is {}",
                    len, self.name_max_chars
                ));
            }
        }
        if let Some(description) = description {
            let len = description.chars().count();
            if len > self.description_max_chars {
                return Err(format!(
                    "board description is {} characters, limit is {}",
                    len, self.description_max_chars
                ));
            }
        }
        Ok(())
    }
}
