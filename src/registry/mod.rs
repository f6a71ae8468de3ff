//! Session lifecycle: creation, history, documents, and idle eviction.

mod session;
mod session_registry;

pub use session_registry::{RegistryError, SessionRegistry};
pub use session::{ProcessingState, SessionInfo};
