//! storyteller - terminal story narrator
//!
//! Generates a story through an external generator, splits it into
//! paragraphs and reads it aloud one paragraph at a time.

pub mod error;
pub mod session;
pub mod speech;
pub mod story;

pub use error::{Result, StoryError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name used for the config file and the history directory
pub const APP_NAME: &str = "storyteller";
