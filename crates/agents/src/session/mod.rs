//! Session-scoped conversation state.

pub mod assembler;
pub mod store;
pub mod types;

pub use assembler::assemble_query;
pub use store::{SessionStore, TurnTicket};
pub use types::{ConversationHistory, Session, SessionSummary, Turn};
