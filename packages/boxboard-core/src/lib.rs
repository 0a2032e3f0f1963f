//! Client-side state engine for kanban boards kept in a document store.
//!
//! A [`board::BoardSession`] holds the in-memory projection of one board,
//! loads it from a [`storage::DocumentStore`], and applies box, column and
//! board mutations optimistically before writing them back.
pub mod board;
pub mod config;
pub mod storage;
pub mod types;
