//! Startup probing: SQL retry budget and the optional simulator.
//!
//! Validates that the harness waits for a slow database, gives up after
//! the configured attempt budget, and treats the simulator as optional.

use crate::helpers::backends::FlakyBackend;
use crate::helpers::fixtures::{test_config, test_config_with_simulator};
use crate::helpers::stub_simulator::{StubRoutes, StubSimulator};

use tsunagi_harness::E2eConnection;
use tsunagi_mock_services::InMemoryBackend;

#[tokio::test]
async fn test_startup_succeeds_with_ready_backend() {
    // 1. Connect with an always-ready backend and no simulator
    let connection = E2eConnection::with_backend(test_config(), InMemoryBackend::new())
        .await
        .expect("connect should succeed");

    // 2. Remote execution is disabled
    assert!(!connection.simulator_available());
}

#[tokio::test]
async fn test_startup_retries_probe_until_backend_is_ready() {
    // 1. Backend that refuses the first two probes
    let backend = FlakyBackend::failing(2);
    let mut config = test_config();
    config.sql.probe_attempts = 5;
    config.sql.probe_delay_secs = 0;

    // 2. Connection succeeds on the third probe
    E2eConnection::with_backend(config, backend.clone())
        .await
        .expect("connect should succeed after retries");
    assert_eq!(backend.probe_count(), 3);
}

#[tokio::test]
async fn test_startup_fails_after_probe_budget() {
    // 1. Backend that refuses more probes than the budget allows
    let backend = FlakyBackend::failing(10);
    let mut config = test_config();
    config.sql.probe_attempts = 3;
    config.sql.probe_delay_secs = 0;

    // 2. Connect exhausts the budget and reports every attempt
    let err = E2eConnection::with_backend(config, backend.clone())
        .await
        .expect_err("connect should fail");
    assert_eq!(backend.probe_count(), 3);

    // 3. The error names the service, the budget, and the last reason
    let message = err.to_string();
    assert!(message.contains("sql"), "{message}");
    assert!(message.contains("after 3 attempts"), "{message}");
    assert!(message.contains("starting up"), "{message}");
}

#[tokio::test]
async fn test_startup_detects_live_simulator() {
    // 1. Start a stub simulator and point the config at it
    let stub = StubSimulator::start().await;
    let config = test_config_with_simulator(stub.base_url());

    // 2. Connect and observe remote execution is enabled
    let connection = E2eConnection::with_backend(config, InMemoryBackend::new())
        .await
        .expect("connect should succeed");
    assert!(connection.simulator_available());
    assert_eq!(stub.health_requests(), 1);
}

#[tokio::test]
async fn test_startup_survives_unhealthy_simulator() {
    // 1. Stub that answers its health probe with 503
    let stub = StubSimulator::with_routes(StubRoutes {
        health_status: 503,
        ..StubRoutes::default()
    })
    .await;
    let mut config = test_config_with_simulator(stub.base_url());
    config.simulator.probe_attempts = 2;
    config.simulator.probe_delay_secs = 0;

    // 2. Connection still succeeds, with remote execution disabled
    let connection = E2eConnection::with_backend(config, InMemoryBackend::new())
        .await
        .expect("connect should succeed despite dead simulator");
    assert!(!connection.simulator_available());

    // 3. Every configured probe attempt was spent
    assert_eq!(stub.health_requests(), 2);
}
