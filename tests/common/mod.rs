//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use kernelflow_rs::pipeline::{Map, RunReport};
use std::time::{Duration, Instant};

/// Upper bound for a test map to quiesce
pub fn test_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Run `map` and fail the test instead of hanging if it deadlocks.
pub fn run_to_completion(map: &mut Map) -> RunReport {
    let mut running = map.spawn().expect("map should start");
    assert!(
        running.wait_timeout(test_timeout()),
        "map did not quiesce within {:?}",
        test_timeout()
    );
    running.join()
}

/// Poll `condition` until it holds or the test timeout passes.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + test_timeout();
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
