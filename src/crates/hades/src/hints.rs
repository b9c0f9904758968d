//! Rollback hint rules
//!
//! Advisory text stored with a completed operation describing how a human
//! could reverse it. Hints are rendered from templates and never executed.

use crate::classifier::{Classification, Target};
use crate::config::{RollbackConfig, StrategyRule};
use std::collections::BTreeMap;

/// Fallback when no rule exists for an operation type
pub const MANUAL_ROLLBACK_HINT: &str = "Manual rollback required";

/// Template table keyed by operation type
#[derive(Debug, Clone, Default)]
pub struct HintRules {
    rules: BTreeMap<String, StrategyRule>,
}

impl HintRules {
    pub fn new(rules: BTreeMap<String, StrategyRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &RollbackConfig) -> Self {
        Self::new(config.strategies.clone())
    }

    /// Render the hint for one operation
    ///
    /// Placeholders the classification cannot fill are left as written.
    pub fn render(
        &self,
        operation_type: &str,
        classification: &Classification,
        command: &str,
    ) -> String {
        let Some(rule) = self.rules.get(operation_type) else {
            return MANUAL_ROLLBACK_HINT.to_string();
        };

        let mut hint = rule.template.replace("{command}", command);
        match &classification.target {
            Target::File { path } => hint = hint.replace("{path}", path),
            Target::Container { name } => hint = hint.replace("{container}", name),
            Target::Rows { table, predicate } => {
                hint = hint.replace("{table}", table).replace("{predicate}", predicate);
            }
            Target::Unknown { .. } => {}
        }
        hint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;

    #[test]
    fn test_default_container_hint() {
        let rules = HintRules::from_config(&RollbackConfig::default());
        let classification = classify("docker_stop", "docker stop web");
        assert_eq!(
            rules.render("docker_stop", &classification, "docker stop web"),
            "docker start web"
        );
    }

    #[test]
    fn test_row_hint_fills_table_and_predicate() {
        let rules = HintRules::from_config(&RollbackConfig::default());
        let command = "DELETE FROM sessions WHERE expired = 1";
        let classification = classify("sql_delete", command);
        assert_eq!(
            rules.render("sql_delete", &classification, command),
            "Re-insert captured rows into sessions matching expired = 1"
        );
    }

    #[test]
    fn test_missing_rule_falls_back() {
        let rules = HintRules::from_config(&RollbackConfig::default());
        let classification = classify("docker_rm", "docker rm web");
        assert_eq!(
            rules.render("docker_rm", &classification, "docker rm web"),
            MANUAL_ROLLBACK_HINT
        );
    }

    #[test]
    fn test_command_placeholder() {
        let mut table = BTreeMap::new();
        table.insert(
            "file_write".to_string(),
            StrategyRule {
                template: "undo: {command}".to_string(),
                description: None,
            },
        );
        let rules = HintRules::new(table);
        let classification = classify("file_write", "echo x > /tmp/a");
        assert_eq!(
            rules.render("file_write", &classification, "echo x > /tmp/a"),
            "undo: echo x > /tmp/a"
        );
    }
}
