//! Utilities for driving a mock service from integration tests.

#![allow(dead_code)]

pub mod http;

use testservice::MockService;

/// Installs a test-friendly tracing subscriber, honoring `RUST_LOG`. Safe
/// to call from every test, only the first call has any effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Starts a mock service with default options.
pub fn start_service() -> MockService {
    init_tracing();
    MockService::new()
}
