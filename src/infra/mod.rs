//! Infrastructure adapters: storage backends and collaborator stand-ins.

pub mod directory;
pub mod memory;

pub use directory::InMemoryDirectory;
pub use memory::MemoryStore;
