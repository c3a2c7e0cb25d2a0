pub(crate) mod arena;
pub(crate) mod error;
pub(crate) mod pool;
pub(crate) mod size_class;
pub(crate) mod stats;

// Serializes tests that assert on the global diagnostic counters
// (write) against everything else that merely bumps them (read).
#[cfg(test)]
pub static TEST_MUTEX: std::sync::RwLock<()> = std::sync::RwLock::new(());
