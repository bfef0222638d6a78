//! Common test utilities for session client tests

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use eutils_session::{ClientConfig, RetryConfig, SessionQueryClient, ThrottledUrlReader};
use wiremock::MockServer;

/// API key used by mocked clients
pub const MOCK_API_KEY: &str = "test_key_123";

/// PMIDs used throughout the tests
pub const TEST_PMIDS: &[u32] = &[28440906, 28256074];

/// Read a fixture from `tests/integration/test_data`
pub fn read_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/integration/test_data")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to read fixture: {:?}", path))
}

/// Configuration pointing at a mock server, with fast retries
pub fn mock_config(mock_server: &MockServer) -> ClientConfig {
    ClientConfig::new()
        .with_base_url(mock_server.uri())
        .with_api_key(MOCK_API_KEY)
        .with_rate_limit(100.0)
        .with_retry_config(
            RetryConfig::new()
                .with_max_retries(2)
                .with_initial_delay(Duration::from_millis(10))
                .with_max_delay(Duration::from_millis(50))
                .without_jitter(),
        )
}

/// Session client backed by a real throttled reader talking to `mock_server`
pub fn create_mock_client(mock_server: &MockServer) -> SessionQueryClient<ThrottledUrlReader> {
    let config = mock_config(mock_server);
    let reader = ThrottledUrlReader::with_config(&config).expect("reader should build");
    SessionQueryClient::new(config, reader)
}

/// Print client logs for live runs, filtered by `RUST_LOG` (default `info`)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Real API tests need the integration-tests feature and EUTILS_REAL_API_TESTS
pub fn should_run_real_api_tests() -> bool {
    #[cfg(not(feature = "integration-tests"))]
    {
        false
    }

    #[cfg(feature = "integration-tests")]
    {
        std::env::var("EUTILS_REAL_API_TESTS").is_ok()
    }
}
