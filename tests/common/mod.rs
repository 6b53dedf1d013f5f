#![allow(dead_code)]

//! Shared fixture for the integration tests.

pub mod memory;

use std::sync::Arc;
use std::sync::Once;

use omnifs::backend::FsConfig;
use omnifs::FileSystem;

pub use memory::{Capabilities, MemoryFs};

static TRACING: Once = Once::new();

/// Installs the test log subscriber once per process.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub struct Fixture {
    pub fs: FileSystem,
}

impl Fixture {
    /// Fully capable in-memory repository.
    pub fn new() -> Self {
        Self::with(FsConfig::default(), Capabilities::full())
    }

    /// Repository with only whole-content load and save, driving every
    /// emulation fallback.
    pub fn minimal() -> Self {
        Self::with(FsConfig::default(), Capabilities::minimal())
    }

    /// Repository with explicit configuration and capabilities.
    pub fn with(config: FsConfig, caps: Capabilities) -> Self {
        init_tracing();
        let backend = Arc::new(MemoryFs::new("test", config, caps));
        Self { fs: FileSystem::new(backend) }
    }
}

/// Sorted copy of a listing, for order-independent comparison.
pub fn sorted(mut entries: Vec<String>) -> Vec<String> {
    entries.sort();
    entries
}
