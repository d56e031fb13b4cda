use note_markup::MarkupError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("markup surgery failed: {0}")]
    Markup(#[from] MarkupError),
    #[error("nothing is selected")]
    EmptySelection,
    #[error("selection points at a detached node")]
    DetachedSelection,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("invalid argument for {command}: {message}")]
    InvalidArgument { command: String, message: String },
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

impl From<MarkupError> for CommandError {
    fn from(value: MarkupError) -> Self {
        CommandError::Surface(SurfaceError::Markup(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    #[error("{name} is empty or could not be read")]
    Empty { name: String },
    #[error("{name} is {size} bytes, over the {limit} byte limit")]
    TooLarge { name: String, size: usize, limit: usize },
    #[error("{name} has unsupported type {mime}")]
    UnsupportedType { name: String, mime: String },
    #[error("malformed data URI")]
    MalformedDataUri,
}

#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("node is not inside a widget")]
    NotAWidget,
    #[error("{action} is not supported by {kind} widgets")]
    Unsupported { kind: &'static str, action: &'static str },
    #[error("another resize session is already active")]
    ResizeInProgress,
    #[error("node is not a resize handle of a resizable widget")]
    NotResizable,
    #[error(transparent)]
    File(#[from] FileError),
    #[error(transparent)]
    Markup(#[from] MarkupError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Focused,
    Composing,
    TransientOverlay,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BlockReason::Focused => "surface is focused",
            BlockReason::Composing => "IME composition in progress",
            BlockReason::TransientOverlay => "transient overlay present",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("external update rejected: {reason}")]
    Conflict { reason: BlockReason },
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Widget(#[from] WidgetError),
    #[error(transparent)]
    File(#[from] FileError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Markup(#[from] MarkupError),
    #[error("no table menu is open")]
    NoTableMenu,
}
