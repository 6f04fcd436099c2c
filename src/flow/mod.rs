//! Conversation state machine: states, menu tables, transitions, prompts.

pub mod engine;
pub mod menu;
pub mod prompts;
pub mod state;

pub use engine::{Effect, StepOutcome, step};
pub use menu::{MenuIntent, match_menu};
pub use state::ConversationState;
