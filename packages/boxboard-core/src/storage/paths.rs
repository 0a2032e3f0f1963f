/// Storage path conventions for boards and their sub-resources.
///
/// `users/{owner}/boards/{board}` is the board root; columns and boxes live in
/// the `columns` and `boxes` collections beneath it.

pub const COLUMNS: &str = "columns";
pub const BOXES: &str = "boxes";

/// Collection holding all boards of one owner.
pub fn boards_collection(owner_id: &str) -> String {
    format!("users/{}/boards", owner_id)
}

pub fn board_path(owner_id: &str, board_id: &str) -> String {
    format!("users/{}/boards/{}", owner_id, board_id)
}

pub fn columns_collection(board_path: &str) -> String {
    format!("{}/{}", board_path, COLUMNS)
}

pub fn boxes_collection(board_path: &str) -> String {
    format!("{}/{}", board_path, BOXES)
}

pub fn column_path(board_path: &str, column_id: &str) -> String {
    format!("{}/{}/{}", board_path, COLUMNS, column_id)
}

pub fn box_path(board_path: &str, box_id: &str) -> String {
    format!("{}/{}/{}", board_path, BOXES, box_id)
}

/// Split a path into segments, rejecting empty segments and traversal.
pub fn segments(path: &str) -> Option<Vec<&str>> {
    let parts: Vec<&str> = path.split('/').collect();
    if parts
        .iter()
        .any(|p| p.is_empty() || *p == "." || *p == ".." || p.contains('\\'))
    {
        return None;
    }
    Some(parts)
}

/// True when the path names a document (even number of segments).
pub fn is_document_path(path: &str) -> bool {
    segments(path).map_or(false, |s| s.len() % 2 == 0)
}

/// True when the path names a collection (odd number of segments).
pub fn is_collection_path(path: &str) -> bool {
    segments(path).map_or(false, |s| s.len() % 2 == 1)
}
