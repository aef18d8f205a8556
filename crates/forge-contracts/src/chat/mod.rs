mod command_registry;
mod intent_parser;

pub use command_registry::{Operation, CHAT_HELP_COMMANDS};
pub use intent_parser::{interpret, parse_session_input, Command, SessionInput};
