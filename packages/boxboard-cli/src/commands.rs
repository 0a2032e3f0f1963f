/// Subcommands of the boxboard command line.
///
/// Every board command opens a session, waits for the initial fetches and
/// refuses to go on unless the board is ready for this viewer.
use std::io::Write;
use std::sync::Arc;

use boxboard_core::board::{create_board, BoardError, BoardSession, NewBoard, Projection};
use boxboard_core::config::BoardDefaults;
use boxboard_core::storage::DocumentStore;
use boxboard_core::types::{BoardStatus, BoardUpdate, BuilderUpdate, DropResult};
use clap::{Args, Subcommand};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Board(#[from] BoardError),

    #[error("Board unavailable (status {})", .0.code())]
    Status(BoardStatus),

    #[error("{0}")]
    Usage(String),

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CommandError::Board(_) | CommandError::Io(_) => 1,
            CommandError::Usage(_) => 2,
            CommandError::Status(BoardStatus::Unauthorized) => 3,
            CommandError::Status(_) => 4,
        }
    }
}

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub store: Arc<dyn DocumentStore>,
    pub user_id: Option<String>,
    pub defaults: BoardDefaults,
}

#[derive(Debug, Clone, Args)]
pub struct BoardRef {
    /// Board id
    pub board: String,
    /// Owner of the board (defaults to the current user)
    #[arg(long)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create a board with the default columns
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Only the owner can open the board
        #[arg(long)]
        private: bool,
    },
    /// Print a board with its columns and boxes
    Show {
        #[command(flatten)]
        board: BoardRef,
    },
    /// Add a box at the end of a column
    Add {
        #[command(flatten)]
        board: BoardRef,
        /// Column id or name
        column: String,
        name: String,
    },
    /// Rename a box
    Edit {
        #[command(flatten)]
        board: BoardRef,
        box_id: String,
        name: String,
    },
    /// Delete a box
    Remove {
        #[command(flatten)]
        board: BoardRef,
        box_id: String,
    },
    /// Delete every box in a column
    Clear {
        #[command(flatten)]
        board: BoardRef,
        /// Column id or name
        column: String,
    },
    /// Move a box to a column, at a position (default: the end)
    Move {
        #[command(flatten)]
        board: BoardRef,
        box_id: String,
        /// Destination column id or name
        to: String,
        #[arg(long)]
        at: Option<usize>,
    },
    /// Change board name, description or visibility (owner only)
    Update {
        #[command(flatten)]
        board: BoardRef,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, conflicts_with = "private")]
        public: bool,
        #[arg(long)]
        private: bool,
    },
    /// Delete a board (owner only)
    DeleteBoard {
        #[command(flatten)]
        board: BoardRef,
    },
}

pub async fn run(command: Command, ctx: &Context, out: &mut impl Write) -> Result<(), CommandError> {
    match command {
        Command::Create {
            name,
            description,
            private,
        } => {
            let owner = current_user(ctx)?;
            let new_board = NewBoard {
                name,
                description,
                public: !private,
            };
            let id = create_board(ctx.store.as_ref(), owner, new_board, &ctx.defaults).await?;
            writeln!(out, "{}", id)?;
        }
        Command::Show { board } => {
            let session = open(ctx, &board).await?;
            render(&session.snapshot(), out)?;
        }
        Command::Add { board, column, name } => {
            let session = open(ctx, &board).await?;
            let column_id = resolve_column(&session.snapshot(), &column)?;
            session.update_builder(&column_id, BuilderUpdate::draft(name));
            match session.add_box(&column_id).await? {
                Some(id) => writeln!(out, "{}", id)?,
                None => return Err(CommandError::Usage("box name must not be empty".to_string())),
            }
        }
        Command::Edit { board, box_id, name } => {
            let session = open(ctx, &board).await?;
            session.edit_box(&box_id, &name).await?;
        }
        Command::Remove { board, box_id } => {
            let session = open(ctx, &board).await?;
            let column_id = session
                .read(|p| p.column_of(&box_id).map(str::to_string))
                .ok_or_else(|| CommandError::Usage(format!("box {} is not on this board", box_id)))?;
            session.delete_box(&column_id, &box_id).await?;
        }
        Command::Clear { board, column } => {
            let session = open(ctx, &board).await?;
            let column_id = resolve_column(&session.snapshot(), &column)?;
            let pending = session.delete_all_column_boxes(&column_id).await?;
            let total = pending.len();
            let failed = pending
                .wait()
                .await
                .into_iter()
                .filter(|(_, outcome)| outcome.is_err())
                .count();
            writeln!(out, "Cleared {} boxes ({} deletes failed)", total, failed)?;
        }
        Command::Move { board, box_id, to, at } => {
            let session = open(ctx, &board).await?;
            let drop = plan_move(&session.snapshot(), &box_id, &to, at)?;
            session.drag_end(drop).await?;
        }
        Command::Update {
            board,
            name,
            description,
            public,
            private,
        } => {
            let session = open(ctx, &board).await?;
            let update = BoardUpdate {
                name,
                description,
                public: match (public, private) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                order: None,
            };
            if update.is_empty() {
                return Err(CommandError::Usage("nothing to update".to_string()));
            }
            if !session.update_board(update).await? {
                return Err(CommandError::Usage("only the owner can update this board".to_string()));
            }
        }
        Command::DeleteBoard { board } => {
            let session = open(ctx, &board).await?;
            if !session.delete_board().await? {
                return Err(CommandError::Usage("only the owner can delete this board".to_string()));
            }
        }
    }
    Ok(())
}

fn current_user(ctx: &Context) -> Result<&str, CommandError> {
    ctx.user_id
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| CommandError::Usage("no user configured; pass --user".to_string()))
}

/// Open a session and wait until the board, columns and boxes are loaded.
async fn open(ctx: &Context, board: &BoardRef) -> Result<BoardSession, CommandError> {
    let owner = match &board.owner {
        Some(owner) => owner.as_str(),
        None => current_user(ctx)?,
    };
    let session = BoardSession::with_defaults(ctx.store.clone(), ctx.defaults.clone());
    if let Some(fetches) = session.initialize_board(owner, &board.board, ctx.user_id.as_deref()) {
        fetches.join().await?;
    }
    let status = session.status();
    if !status.is_ready() {
        return Err(CommandError::Status(status));
    }
    Ok(session)
}

/// Accept a column id, or a column name (case-insensitive).
fn resolve_column(projection: &Projection, column: &str) -> Result<String, CommandError> {
    if projection.columns.contains_key(column) {
        return Ok(column.to_string());
    }
    projection
        .order
        .iter()
        .find(|id| {
            projection
                .columns
                .get(id.as_str())
                .map_or(false, |c| c.name.eq_ignore_ascii_case(column))
        })
        .cloned()
        .ok_or_else(|| CommandError::Usage(format!("no column named {}", column)))
}

/// Build the drop a drag of `box_id` onto `to` would report.
fn plan_move(projection: &Projection, box_id: &str, to: &str, at: Option<usize>) -> Result<DropResult, CommandError> {
    let source_id = projection
        .column_of(box_id)
        .ok_or_else(|| CommandError::Usage(format!("box {} is not on this board", box_id)))?;
    let source_index = projection
        .column_boxes(source_id)
        .and_then(|boxes| boxes.iter().position(|b| b == box_id))
        .ok_or_else(|| CommandError::Usage(format!("box {} is not on this board", box_id)))?;
    let destination_id = resolve_column(projection, to)?;

    let destination_len = projection.column_boxes(&destination_id).map_or(0, |b| b.len());
    let last = if destination_id == source_id {
        destination_len.saturating_sub(1)
    } else {
        destination_len
    };
    let index = at.unwrap_or(last).min(last);

    Ok(DropResult::new(
        box_id,
        (source_id, source_index),
        Some((destination_id.as_str(), index)),
    ))
}

fn render(projection: &Projection, out: &mut impl Write) -> std::io::Result<()> {
    if let Some(board) = &projection.board {
        let visibility = if board.public { "public" } else { "private" };
        match board.description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => writeln!(out, "{} ({}) - {}", board.name, visibility, description)?,
            None => writeln!(out, "{} ({})", board.name, visibility)?,
        }
    }
    for view in projection.ordered_columns() {
        writeln!(out, "== {} [{}]", view.column.name, view.id)?;
        for (id, item) in view.boxes {
            writeln!(out, "  - {} [{}]", item.name, id)?;
        }
    }
    Ok(())
}
