//! Integration Test: Panic-Free Core
//!
//! **Policy**: Core production code propagates errors instead of panicking.
//! A malformed frame or a failed request must end a session, not the process.

use architectural_enforcement::{production_sources, report};

#[test]
fn test_no_unwrap_in_core() {
    let violations: Vec<String> = production_sources("conductor/core/src")
        .iter()
        .flat_map(|f| f.find(&[".unwrap()", ".expect(", "panic!(", "unreachable!("]))
        .collect();

    report(
        "Panicking calls found in core production code!",
        "✅ Return a Result, log with tracing::warn!, or fall back with unwrap_or*.",
        &violations,
    );
}
