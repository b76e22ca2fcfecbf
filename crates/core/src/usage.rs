use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Tool call counts for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub total_tool_calls: u64,
    pub tool_calls: BTreeMap<String, u64>,
}

/// Counts tool invocations so they can be logged when the session ends.
#[derive(Debug, Default)]
pub struct UsageCollector {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl UsageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, tool: &str) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        *counts.entry(tool.to_string()).or_default() += 1;
    }

    pub fn summary(&self) -> UsageSummary {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        UsageSummary {
            total_tool_calls: counts.values().sum(),
            tool_calls: counts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_tool() {
        let usage = UsageCollector::new();
        usage.record("show_diagram");
        usage.record("record_topic");
        usage.record("show_diagram");

        let summary = usage.summary();
        assert_eq!(summary.total_tool_calls, 3);
        assert_eq!(summary.tool_calls.get("show_diagram"), Some(&2));
        assert_eq!(
            serde_json::to_string(&summary).unwrap(),
            r#"{"total_tool_calls":3,"tool_calls":{"record_topic":1,"show_diagram":2}}"#
        );
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(UsageCollector::new().summary(), UsageSummary::default());
    }
}
