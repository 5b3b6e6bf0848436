//! Assertion helpers for generated secrets

#![allow(dead_code)]

use super::fixtures::Testbed;
use secretgen_engine::{RunError, RunSummary};

/// Assert that every host in `hosts` can decrypt `name` and sees `expected`
pub fn assert_readable_by(testbed: &Testbed, name: &str, hosts: &[&str], expected: &[u8]) {
    for host in hosts {
        let plaintext = testbed
            .read_secret_as(host, name)
            .unwrap_or_else(|e| panic!("host {host} cannot read {name}: {e:#}"));
        assert_eq!(plaintext, expected, "host {host} sees different content for {name}");
    }
}

/// Assert that `host` cannot decrypt `name`
pub fn assert_not_readable_by(testbed: &Testbed, name: &str, host: &str) {
    assert!(
        testbed.read_secret_as(host, name).is_err(),
        "host {host} should not be able to read {name}"
    );
}

pub fn assert_generated(summary: &RunSummary, names: &[&str]) {
    let mut expected: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    expected.sort();
    assert_eq!(summary.generated, expected, "generated secrets");
}

pub fn assert_unchanged(summary: &RunSummary, names: &[&str]) {
    let mut expected: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    expected.sort();
    assert_eq!(summary.unchanged, expected, "unchanged secrets");
}

/// Assert that the run failed and its message mentions `needle`
pub fn assert_run_failed_with(result: Result<RunSummary, RunError>, needle: &str) -> RunError {
    match result {
        Ok(summary) => panic!("run unexpectedly succeeded: {summary:?}"),
        Err(err) => {
            let message = err.to_string();
            assert!(
                message.contains(needle),
                "error {message:?} does not mention {needle:?}"
            );
            err
        }
    }
}
