//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Nothing in the workspace may use a blocking HTTP client or
//! block the runtime on a future. Streams are consumed asynchronously.

use architectural_enforcement::{production_sources, report};

const FORBIDDEN: &[&str] = &["reqwest::blocking", "block_on(", "std::thread::sleep"];

#[test]
fn test_no_blocking_io_in_core() {
    let violations: Vec<String> = production_sources("conductor/core/src")
        .iter()
        .flat_map(|f| f.find(FORBIDDEN))
        .collect();

    report(
        "Blocking I/O found in core production code!",
        "✅ Use reqwest's async client and await the response stream.",
        &violations,
    );
}

#[test]
fn test_no_blocking_io_in_cli() {
    let violations: Vec<String> = production_sources("cli/src")
        .iter()
        .flat_map(|f| f.find(FORBIDDEN))
        .collect();

    report(
        "Blocking I/O found in CLI production code!",
        "✅ Read stdin with tokio::io and await conductor calls.",
        &violations,
    );
}
