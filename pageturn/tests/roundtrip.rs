//! Roundtrip tests for the differ and patcher, driven by datatest-stable.
//!
//! Each case is a file in `tests/roundtrip-cases/`:
//! ```text
//! <current HTML>
//! ===
//! <target HTML>
//! ```
//!
//! The live document is patched with `diff(snapshot(current), target)` and
//! must then serialize exactly like the target.

use pageturn::{LiveDom, apply, diff, parse};
use std::path::Path;

fn run_roundtrip_test(path: &Path) -> datatest_stable::Result<()> {
    facet_testhelpers::setup();

    let content = std::fs::read_to_string(path)?;
    let parts: Vec<&str> = content.split("\n===\n").collect();

    if parts.len() != 2 {
        return Err(format!(
            "Test file must have exactly one '===' separator, found {} parts",
            parts.len()
        )
        .into());
    }

    let current = parts[0].trim();
    let target = parts[1].trim();

    let mut live = parse(current);
    let target_doc = parse(target);

    let patch = diff(&live.snapshot(), &target_doc);
    apply(&mut live, &patch);

    let result = live.to_document_html();
    let expected = target_doc.to_document_html();
    if result != expected {
        return Err(format!(
            "Roundtrip failed!\nCurrent: {current}\nTarget: {target}\nResult: {result}\nExpected: {expected}"
        )
        .into());
    }

    // A second pass over an up-to-date document has nothing to do
    let again = diff(&live.snapshot(), &target_doc);
    if !again.is_noop() {
        return Err(format!("document still differs after patching: {again:?}").into());
    }

    Ok(())
}

datatest_stable::harness! {
    { test = run_roundtrip_test, root = "tests/roundtrip-cases", pattern = r".*\.html$" },
}
