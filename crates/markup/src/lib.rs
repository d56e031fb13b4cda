mod node;
mod parse;
mod serialize;
mod style;
mod surgery;

pub use crate::node::*;
pub use crate::parse::decode_entities;
pub use crate::serialize::*;
pub use crate::style::*;
pub use crate::surgery::clamp_to_char_boundary;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("unknown node #{0}")]
    UnknownNode(usize),
    #[error("node #{0} is not an element")]
    NotElement(usize),
    #[error("node #{0} is not a text node")]
    NotText(usize),
    #[error("node #{0} is not attached to a parent")]
    Detached(usize),
    #[error("node #{0} is not a child of the given parent")]
    NotAChild(usize),
    #[error("inserting node #{0} would create a cycle")]
    Cycle(usize),
}
