//! LMDB storage backend for sensor telemetry.
//!
//! Implements `TelemetryStore` from `srt-store` using the `heed` LMDB bindings.
//! Readings live in a single database inside one environment.

pub mod environment;
pub mod error;
pub mod readings;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use readings::LmdbTelemetryStore;
