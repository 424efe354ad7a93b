// Adapters layer: concrete implementations of the domain ports.

pub mod earth_engine;
pub mod memory;
pub mod storage;

pub use earth_engine::EarthEngineClient;
pub use memory::RecordingSink;
pub use storage::LocalStorage;
