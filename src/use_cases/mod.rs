// Use cases layer: extraction, input debouncing and the session lifecycle.

pub mod commands;
pub mod debounce;
pub mod extractor;
pub mod session;

pub use commands::{CommandIntake, Submit, command_channel};
pub use debounce::InputEngine;
pub use extractor::{NoteWindowExtractor, extract};
pub use session::{Lifecycle, SessionCoordinator, SessionSettings, TickReport};
