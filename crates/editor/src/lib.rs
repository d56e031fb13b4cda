mod clock;
mod commands;
mod config;
mod editor;
mod error;
mod files;
mod history;
mod host;
mod media;
mod smart_links;
mod surface;
mod table;
mod tasks;
mod toolbar;
pub mod widgets;

pub use note_markup as markup;

pub use crate::clock::*;
pub use crate::commands::*;
pub use crate::config::*;
pub use crate::editor::*;
pub use crate::error::*;
pub use crate::files::*;
pub use crate::history::*;
pub use crate::host::*;
pub use crate::media::*;
pub use crate::smart_links::*;
pub use crate::surface::*;
pub use crate::table::*;
pub use crate::tasks::*;
pub use crate::toolbar::*;
