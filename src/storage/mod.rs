pub mod memory;
pub mod traits;

pub use memory::MemoryRepository;
pub use traits::SchemaRepository;
