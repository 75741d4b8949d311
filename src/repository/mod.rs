//! Repository layer: authoritative in-memory state

pub mod inventory;

pub use inventory::InventoryStore;

/// Main repository struct holding the authoritative stores
#[derive(Clone, Default)]
pub struct Repository {
    pub books: InventoryStore,
}

impl Repository {
    /// Create a new repository around the given inventory store
    pub fn new(books: InventoryStore) -> Self {
        Self { books }
    }
}
