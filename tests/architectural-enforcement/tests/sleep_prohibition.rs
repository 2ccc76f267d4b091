//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the core MUST NOT call sleep methods.
//! Waiting happens on the response stream, on `tokio::time::interval` ticks
//! for render pacing, or on a cancellation token.

use architectural_enforcement::{production_sources, report};

#[test]
fn test_no_sleep_in_core() {
    let violations: Vec<String> = production_sources("conductor/core/src")
        .iter()
        .flat_map(|f| f.find(&["::sleep(", ".sleep(", "sleep_until("]))
        .collect();

    report(
        "Sleep calls found in core production code!",
        "✅ Use tokio::time::interval for pacing and CancellationToken for waiting.",
        &violations,
    );
}
