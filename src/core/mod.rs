//! Chat widget core
//!
//! Transcript storage, message dispatch, launcher visibility, and the
//! per-tab sessions that tie them together.

mod dispatcher;
mod sessions;
mod store;
mod visibility;

pub use dispatcher::{ChatSession, PendingSend, SendOutcome};
pub use sessions::{SessionHub, SharedSession, WidgetSession};
pub use store::{MemorySessionStorage, SessionStorage, StorageError, TranscriptStore};
pub use visibility::{VisibilityController, VisibilityState};
