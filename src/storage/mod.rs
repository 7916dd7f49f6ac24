//! Persistence collaborator boundary

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::{CanonicalMessage, MessageKind, MessageStore};
