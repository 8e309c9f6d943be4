/// The reference index seen as a query service.
pub mod index;

/// In-memory reference index.
pub mod memory;

/// Foreign-reference detection over the index.
pub mod resolver;

pub use index::ReferenceIndex;
pub use memory::MemoryIndex;
pub use resolver::ReferenceResolver;
