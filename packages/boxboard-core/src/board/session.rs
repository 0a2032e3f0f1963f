/// Board session: owns the projection and its lifecycle.
///
/// `initialize_board` resolves the storage path and starts the board, box and
/// column fetches as independent tasks. Each fetch writes its own slice of the
/// projection when it lands; there is no combined "loaded" signal beyond
/// `status`.
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::projection::Projection;
use super::BoardError;
use crate::config::BoardDefaults;
use crate::storage::{paths, DocumentStore, StorageError};
use crate::types::{Board, BoardStatus, BoxItem, Builder, Column};

/// Handles for the three fetches started by `initialize_board`.
/// Dropping them leaves the fetches running.
pub struct SessionFetches {
    pub board: JoinHandle<Result<(), BoardError>>,
    pub boxes: JoinHandle<Result<(), BoardError>>,
    pub columns: JoinHandle<Result<(), BoardError>>,
}

impl SessionFetches {
    /// Wait for all three fetches. Returns the first failure, after every
    /// fetch has finished.
    pub async fn join(self) -> Result<(), BoardError> {
        let results = [
            flatten(self.board.await),
            flatten(self.boxes.await),
            flatten(self.columns.await),
        ];
        results.into_iter().collect()
    }
}

fn flatten<T>(joined: Result<Result<T, BoardError>, tokio::task::JoinError>) -> Result<T, BoardError> {
    joined.map_err(|e| BoardError::Task(e.to_string()))?
}

/// Explicit context object for one viewer looking at one board.
///
/// Cheap to clone; clones share the store handle and the projection.
#[derive(Clone)]
pub struct BoardSession {
    store: Arc<dyn DocumentStore>,
    state: Arc<watch::Sender<Projection>>,
    defaults: Arc<BoardDefaults>,
}

impl BoardSession {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_defaults(store, BoardDefaults::default())
    }

    pub fn with_defaults(store: Arc<dyn DocumentStore>, defaults: BoardDefaults) -> Self {
        let (tx, _) = watch::channel(Projection::default());
        Self {
            store,
            state: Arc::new(tx),
            defaults: Arc::new(defaults),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn defaults(&self) -> &BoardDefaults {
        &self.defaults
    }

    /// Current projection, cloned.
    pub fn snapshot(&self) -> Projection {
        self.state.borrow().clone()
    }

    /// Receiver notified after every projection change.
    pub fn subscribe(&self) -> watch::Receiver<Projection> {
        self.state.subscribe()
    }

    pub fn status(&self) -> BoardStatus {
        self.state.borrow().status
    }

    /// Read the projection without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&Projection) -> R) -> R {
        f(&self.state.borrow())
    }

    /// Apply a change to the projection atomically. Subscribers are notified
    /// only when `f` succeeds, so `f` must validate before it mutates.
    pub(crate) fn apply<R, E>(&self, f: impl FnOnce(&mut Projection) -> Result<R, E>) -> Result<R, E> {
        let mut outcome = None;
        self.state.send_if_modified(|projection| {
            let result = f(projection);
            let modified = result.is_ok();
            outcome = Some(result);
            modified
        });
        match outcome {
            Some(result) => result,
            None => unreachable!("send_if_modified always runs its closure"),
        }
    }

    /// Like [`apply`](Self::apply), but `Ok(None)` means `f` left the
    /// projection unchanged and subscribers are not woken.
    pub(crate) fn apply_if<R, E>(
        &self,
        f: impl FnOnce(&mut Projection) -> Result<Option<R>, E>,
    ) -> Result<Option<R>, E> {
        let mut outcome = Ok(None);
        self.state.send_if_modified(|projection| {
            outcome = f(projection);
            matches!(outcome, Ok(Some(_)))
        });
        outcome
    }

    /// Apply an infallible change and notify subscribers.
    pub(crate) fn modify(&self, f: impl FnOnce(&mut Projection)) {
        self.state.send_modify(f);
    }

    /// Board root of the current session.
    pub(crate) fn path(&self) -> Result<String, BoardError> {
        let path = self.state.borrow().path.clone();
        if path.is_empty() {
            Err(BoardError::NotInitialized)
        } else {
            Ok(path)
        }
    }

    /// Direct status override. Used on teardown to reset to `Uninitialized`.
    pub fn set_status(&self, status: BoardStatus) {
        self.state.send_modify(|p| p.status = status);
    }

    /// End the session: drop every fetched record and reset status to 0.
    pub fn teardown(&self) {
        log::debug!("[boxboard.session] Teardown");
        self.state.send_modify(|p| *p = Projection::default());
    }

    /// Start a session for `board_id` owned by `owner_id`, viewed by `user_id`.
    ///
    /// Empty owner or board ids end the current session, set status 404 and
    /// start nothing. Otherwise the three fetches are spawned on the current
    /// tokio runtime and their handles returned; callers are free to drop them.
    ///
    /// # Panics
    /// When called outside a tokio runtime.
    pub fn initialize_board(
        &self,
        owner_id: &str,
        board_id: &str,
        user_id: Option<&str>,
    ) -> Option<SessionFetches> {
        if owner_id.is_empty() || board_id.is_empty() {
            log::info!(
                "[boxboard.session] Missing owner or board id (owner={:?}, board={:?})",
                owner_id,
                board_id
            );
            // end any previous session so its in-flight fetches are discarded
            self.state.send_modify(|p| {
                *p = Projection::default();
                p.status = BoardStatus::NotFound;
            });
            return None;
        }

        let user_id = user_id.filter(|u| !u.is_empty()).map(str::to_string);
        let path = paths::board_path(owner_id, board_id);
        log::info!("[boxboard.session] Initializing {}", path);
        self.state
            .send_modify(|p| *p = Projection::for_session(owner_id, board_id, user_id, path.clone()));

        let board = {
            let (session, path) = (self.clone(), path.clone());
            spawn_fetch("board", async move { session.load_board(path).await.map(|_| ()) })
        };
        let boxes = {
            let (session, path) = (self.clone(), path.clone());
            spawn_fetch("boxes", async move { session.load_boxes(path).await })
        };
        let columns = {
            let session = self.clone();
            spawn_fetch("columns", async move { session.load_columns(path).await })
        };
        Some(SessionFetches {
            board,
            boxes,
            columns,
        })
    }

    /// Read the board document and settle the session status.
    ///
    /// Missing → 404. Private and viewer is not the owner → 401, with `order`
    /// and `board` left unset. Otherwise `order` and `board` are filled and
    /// status becomes 200.
    pub async fn fetch_board(&self) -> Result<BoardStatus, BoardError> {
        self.load_board(self.path()?).await
    }

    /// Read every column and seed a closed, empty builder for each.
    pub async fn fetch_columns(&self) -> Result<(), BoardError> {
        self.load_columns(self.path()?).await
    }

    /// Read every box into the flat box map. Order comes from the columns.
    pub async fn fetch_boxes(&self) -> Result<(), BoardError> {
        self.load_boxes(self.path()?).await
    }

    // The load_* fetches are bound to the session `path` they were started
    // for; a result is dropped when the projection has moved on.

    async fn load_board(&self, path: String) -> Result<BoardStatus, BoardError> {
        let doc = self.store.read_document(&path).await?;
        let board: Option<Board> = match doc {
            Some(value) => Some(serde_json::from_value(value).map_err(StorageError::from)?),
            None => None,
        };

        let applied = self.apply(|p| {
            if p.path != path {
                return Err(());
            }
            let status = match board {
                None => BoardStatus::NotFound,
                Some(board) => {
                    if !board.public && !p.is_owner() {
                        BoardStatus::Unauthorized
                    } else {
                        p.order = board.order.clone();
                        p.board = Some(board);
                        BoardStatus::Ready
                    }
                }
            };
            p.status = status;
            Ok(status)
        });

        match applied {
            Ok(status) => {
                log::info!("[boxboard.session] Board {} -> {}", path, status.code());
                Ok(status)
            }
            Err(()) => {
                log::debug!("[boxboard.session] Discarding board fetch for stale session {}", path);
                Ok(self.status())
            }
        }
    }

    async fn load_columns(&self, path: String) -> Result<(), BoardError> {
        let columns: Vec<(String, Column)> = self.read_records(&paths::columns_collection(&path)).await?;
        let count = columns.len();

        let applied = self.apply(|p| {
            if p.path != path {
                return Err(());
            }
            p.builder = columns
                .iter()
                .map(|(id, _)| (id.clone(), Builder::default()))
                .collect();
            p.columns = columns.into_iter().collect();
            Ok(())
        });
        match applied {
            Ok(()) => log::debug!("[boxboard.session] Fetched {} columns for {}", count, path),
            Err(()) => log::debug!("[boxboard.session] Discarding column fetch for stale session {}", path),
        }
        Ok(())
    }

    async fn load_boxes(&self, path: String) -> Result<(), BoardError> {
        let boxes: Vec<(String, BoxItem)> = self.read_records(&paths::boxes_collection(&path)).await?;
        let count = boxes.len();

        let applied = self.apply(|p| {
            if p.path != path {
                return Err(());
            }
            p.boxes = boxes.into_iter().collect();
            Ok(())
        });
        match applied {
            Ok(()) => log::debug!("[boxboard.session] Fetched {} boxes for {}", count, path),
            Err(()) => log::debug!("[boxboard.session] Discarding box fetch for stale session {}", path),
        }
        Ok(())
    }

    /// Read a collection, skipping documents that do not match `T`.
    async fn read_records<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<(String, T)>, BoardError> {
        let snapshots = self.store.read_collection(collection).await?;
        let records = snapshots
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<T>(doc.data) {
                Ok(record) => Some((doc.id, record)),
                Err(e) => {
                    log::warn!(
                        "[boxboard.session] Skipping malformed document {}/{}: {}",
                        collection,
                        doc.id,
                        e
                    );
                    None
                }
            })
            .collect();
        Ok(records)
    }
}

fn spawn_fetch<F>(what: &'static str, fetch: F) -> JoinHandle<Result<(), BoardError>>
where
    F: Future<Output = Result<(), BoardError>> + Send + 'static,
{
    tokio::spawn(async move {
        let result = fetch.await;
        if let Err(e) = &result {
            log::warn!("[boxboard.session] Fetch {} failed: {}", what, e);
        }
        result
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use serde_json::json;

    pub(crate) const ROOT: &str = "users/o1/boards/b1";

    /// Board `b1` of owner `o1`: columns c1 ["a","b","c"], c2 ["x"], c3 [].
    pub(crate) fn seeded_store(public: bool) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert(
            ROOT,
            json!({
                "name": "Work",
                "description": "daily",
                "public": public,
                "createdAt": "2024-01-01T10:00:00+00:00",
                "order": ["c1", "c2", "c3"],
            }),
        );
        store.insert(&format!("{}/columns/c1", ROOT), json!({ "name": "To do", "boxes": ["a", "b", "c"] }));
        store.insert(&format!("{}/columns/c2", ROOT), json!({ "name": "In Progress", "boxes": ["x"] }));
        store.insert(&format!("{}/columns/c3", ROOT), json!({ "name": "Done", "boxes": [] }));
        for id in ["a", "b", "c", "x"] {
            store.insert(&format!("{}/boxes/{}", ROOT, id), json!({ "name": format!("box {}", id) }));
        }
        store
    }

    /// Session over the seeded board, fully loaded, viewed by `user`.
    pub(crate) async fn loaded_session(store: &Arc<MemoryStore>, user: Option<&str>) -> BoardSession {
        let session = BoardSession::new(store.clone());
        session
            .initialize_board("o1", "b1", user)
            .expect("ids are non-empty")
            .join()
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_public_board_ready_for_any_viewer() {
        let store = seeded_store(true);
        for user in [Some("o1"), Some("someone"), None] {
            let session = loaded_session(&store, user).await;
            let p = session.snapshot();
            assert_eq!(p.status, BoardStatus::Ready);
            assert_eq!(p.order, vec!["c1", "c2", "c3"]);
            assert_eq!(p.board.as_ref().map(|b| b.name.as_str()), Some("Work"));
        }
    }

    #[tokio::test]
    async fn test_private_board_unauthorized_for_other_viewer() {
        let store = seeded_store(false);
        let session = loaded_session(&store, Some("intruder")).await;
        let p = session.snapshot();
        assert_eq!(p.status, BoardStatus::Unauthorized);
        assert!(p.order.is_empty());
        assert!(p.board.is_none());

        let anonymous = loaded_session(&store, None).await;
        assert_eq!(anonymous.status(), BoardStatus::Unauthorized);
    }

    #[tokio::test]
    async fn test_private_board_ready_for_owner() {
        let store = seeded_store(false);
        let session = loaded_session(&store, Some("o1")).await;
        assert_eq!(session.status(), BoardStatus::Ready);
    }

    #[tokio::test]
    async fn test_missing_board_not_found() {
        let store = Arc::new(MemoryStore::new());
        let session = BoardSession::new(store);
        let fetches = session.initialize_board("o1", "nope", Some("o1")).unwrap();
        fetches.join().await.unwrap();
        let p = session.snapshot();
        assert_eq!(p.status, BoardStatus::NotFound);
        assert!(p.board.is_none());
        assert!(p.columns.is_empty());
    }

    #[tokio::test]
    async fn test_empty_ids_fail_fast_without_fetching() {
        let store = seeded_store(true);
        let session = BoardSession::new(store.clone());

        assert!(session.initialize_board("", "b1", Some("u1")).is_none());
        assert_eq!(session.status(), BoardStatus::NotFound);
        assert!(session.snapshot().path.is_empty());

        session.set_status(BoardStatus::Uninitialized);
        assert!(session.initialize_board("o1", "", Some("u1")).is_none());
        assert_eq!(session.status(), BoardStatus::NotFound);
        assert_eq!(store.reads(), 0);
        assert!(store.journal().is_empty());
    }

    #[tokio::test]
    async fn test_empty_ids_end_previous_session() {
        let store = seeded_store(true);
        let session = BoardSession::new(store.clone());
        let first = session.initialize_board("o1", "b1", Some("o1")).unwrap();

        assert!(session.initialize_board("", "b1", Some("o1")).is_none());
        // the first session's fetches land after the 404
        first.join().await.unwrap();

        let p = session.snapshot();
        assert_eq!(p.status, BoardStatus::NotFound);
        assert!(p.path.is_empty());
        assert!(p.board.is_none());
        assert!(p.columns.is_empty());
        assert!(p.boxes.is_empty());

        assert!(matches!(
            session.edit_box("a", "renamed").await,
            Err(BoardError::NotInitialized)
        ));
        assert_eq!(store.get(&format!("{}/boxes/a", ROOT)), Some(json!({ "name": "box a" })));
        assert!(store.journal().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_seeds_builders_and_boxes() {
        let store = seeded_store(true);
        let session = loaded_session(&store, Some("o1")).await;
        let p = session.snapshot();
        assert_eq!(p.path, ROOT);
        assert_eq!(p.columns.len(), 3);
        assert_eq!(p.column_boxes("c1"), Some(&["a".to_string(), "b".to_string(), "c".to_string()][..]));
        assert_eq!(p.builder.len(), 3);
        assert!(p.builder.values().all(|b| *b == Builder::default()));
        assert_eq!(p.boxes["x"].name, "box x");
    }

    #[tokio::test]
    async fn test_malformed_column_skipped() {
        let store = seeded_store(true);
        store.insert(&format!("{}/columns/bad", ROOT), json!({ "boxes": 7 }));
        let session = loaded_session(&store, None).await;
        assert!(!session.snapshot().columns.contains_key("bad"));
    }

    #[tokio::test]
    async fn test_subscribers_see_status() {
        let store = seeded_store(true);
        let session = BoardSession::new(store);
        let mut rx = session.subscribe();
        // dropping the handles leaves the fetches running
        drop(session.initialize_board("o1", "b1", None));
        let ready = rx.wait_for(|p| p.status.is_ready()).await.unwrap();
        assert_eq!(ready.board_id, "b1");
    }

    #[tokio::test]
    async fn test_teardown_resets_projection() {
        let store = seeded_store(true);
        let session = loaded_session(&store, Some("o1")).await;
        session.teardown();
        assert_eq!(session.snapshot(), Projection::default());
        assert_eq!(session.status().code(), 0);
    }

    #[tokio::test]
    async fn test_reinitialize_replaces_previous_board() {
        let store = seeded_store(true);
        let session = BoardSession::new(store.clone());
        session.initialize_board("o1", "b1", None).unwrap().join().await.unwrap();

        let second = session.initialize_board("o1", "other", None).unwrap();
        second.join().await.unwrap();
        let p = session.snapshot();
        assert_eq!(p.board_id, "other");
        assert_eq!(p.status, BoardStatus::NotFound);
        assert!(p.columns.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_before_initialize() {
        let session = BoardSession::new(Arc::new(MemoryStore::new()));
        assert!(matches!(session.fetch_board().await, Err(BoardError::NotInitialized)));
    }
}
