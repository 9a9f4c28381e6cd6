//! Shared doubles for the integration tests.

#![allow(dead_code)]

pub mod fake_backend;
pub mod mock_broker;

use std::time::Duration;

pub use fake_backend::FakeBackend;
pub use mock_broker::MockBroker;

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
