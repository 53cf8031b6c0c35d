//! Line protocol wire types
//!
//! One JSON command per input line, one JSON record per output line.

pub mod command;
pub mod response;

pub use command::{Action, Command, SUPPORTED_ACTIONS};
pub use response::Reply;
