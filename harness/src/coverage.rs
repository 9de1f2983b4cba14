// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Per-conformance-clause coverage accounting, mirroring how the original
//! Python harness's `coverage.py` intersected a set of `[MQTT-x.y.z-n]`
//! identifiers scraped from source against the set actually logged during a
//! run. Here the "known" set is supplied by the caller (grepped out of the
//! broker's own log statements) rather than reflected out of loaded
//! modules, since Rust has no runtime source introspection to match.

use std::collections::HashSet;

/// Every conformance-clause identifier this broker's dispatcher and codec
/// are known to log when they enforce it.
pub const KNOWN_CLAUSES: &[&str] = &[
    "[MQTT-1.5.4-2]",
    "[MQTT-1.5.5-1]",
    "[MQTT-2.2.2-1]",
    "[MQTT-3.1.0-1]",
    "[MQTT-3.1.0-2]",
    "[MQTT-3.1.2-1]",
    "[MQTT-3.1.2-2]",
    "[MQTT-3.1.2-3]",
    "[MQTT-3.1.2-11]",
    "[MQTT-3.1.2-24]",
    "[MQTT-3.1.3-8]",
    "[MQTT-3.2.0-1]",
    "[MQTT-3.3.1-2]",
    "[MQTT-3.3.2-1]",
    "[MQTT-3.3.2-2]",
    "[MQTT-3.4.2-1]",
    "[MQTT-3.6.1-1]",
    "[MQTT-3.8.1-1]",
    "[MQTT-3.8.3-3]",
    "[MQTT-3.8.3-4]",
    "[MQTT-3.8.3-5]",
    "[MQTT-3.10.1-1]",
    "[MQTT-3.10.3-2]",
    "[MQTT-3.15.1-1]",
    "[MQTT-4.7.1-1]",
    "[MQTT-4.7.1-2]",
    "[MQTT-4.7.1-3]",
    "[MQTT-4.7.2-1]",
];

pub struct CoverageTracker {
    known: HashSet<&'static str>,
    seen: HashSet<&'static str>,
}

impl Default for CoverageTracker {
    fn default() -> Self {
        Self::new(KNOWN_CLAUSES)
    }
}

impl CoverageTracker {
    #[must_use]
    pub fn new(known: &[&'static str]) -> Self {
        Self {
            known: known.iter().copied().collect(),
            seen: HashSet::new(),
        }
    }

    /// Scans one log line for `[MQTT-...]` identifiers and records any that
    /// are in the known set.
    pub fn record_line(&mut self, line: &str) {
        for clause in extract_clauses(line) {
            if let Some(&known) = self.known.get(clause) {
                self.seen.insert(known);
            }
        }
    }

    #[must_use]
    pub fn percent(&self) -> u32 {
        if self.known.is_empty() {
            return 100;
        }
        (self.seen.len() as u32 * 100) / self.known.len() as u32
    }

    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing: Vec<&'static str> =
            self.known.difference(&self.seen).copied().collect();
        missing.sort_unstable();
        missing
    }
}

/// Pulls every `[MQTT-...]` bracketed token out of a line of text.
fn extract_clauses(line: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = line;
    while let Some(start) = rest.find("[MQTT-") {
        let after_start = &rest[start..];
        if let Some(end) = after_start.find(']') {
            found.push(&after_start[..=end]);
            rest = &after_start[end + 1..];
        } else {
            break;
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_clause() {
        assert_eq!(
            extract_clauses("[MQTT-3.1.0-1] first packet on socket was not CONNECT"),
            vec!["[MQTT-3.1.0-1]"]
        );
    }

    #[test]
    fn extracts_multiple_clauses_from_one_line() {
        let line = "see [MQTT-3.1.0-1] and also [MQTT-3.2.0-1] here";
        assert_eq!(extract_clauses(line), vec!["[MQTT-3.1.0-1]", "[MQTT-3.2.0-1]"]);
    }

    #[test]
    fn tracker_ignores_unknown_identifiers() {
        let mut tracker = CoverageTracker::new(&["[MQTT-3.1.0-1]"]);
        tracker.record_line("warn: [MQTT-9.9.9-9] not a real clause");
        assert_eq!(tracker.percent(), 0);
    }

    #[test]
    fn tracker_reaches_full_percent_when_all_seen() {
        let mut tracker = CoverageTracker::new(&["[MQTT-3.1.0-1]", "[MQTT-3.2.0-1]"]);
        tracker.record_line("[MQTT-3.1.0-1] ...");
        tracker.record_line("[MQTT-3.2.0-1] ...");
        assert_eq!(tracker.percent(), 100);
        assert!(tracker.missing().is_empty());
    }

    #[test]
    fn tracker_reports_missing_clauses() {
        let mut tracker = CoverageTracker::new(&["[MQTT-3.1.0-1]", "[MQTT-3.2.0-1]"]);
        tracker.record_line("[MQTT-3.1.0-1] ...");
        assert_eq!(tracker.missing(), vec!["[MQTT-3.2.0-1]"]);
        assert_eq!(tracker.percent(), 50);
    }
}
