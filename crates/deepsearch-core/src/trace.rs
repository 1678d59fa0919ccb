//! Operator-facing rendering of the adaptation-decision log.

use std::fmt::Write as _;

use crate::state_machine::AdaptationDecision;

/// Human-readable audit view over one run's decision log.
#[derive(Debug, Clone, Default)]
pub struct DecisionTrace {
    decisions: Vec<AdaptationDecision>,
}

impl DecisionTrace {
    pub fn from_decisions(decisions: Vec<AdaptationDecision>) -> Self {
        Self { decisions }
    }

    pub fn decisions(&self) -> &[AdaptationDecision] {
        &self.decisions
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn render_markdown(&self) -> String {
        if self.decisions.is_empty() {
            return "No adaptation decisions recorded.".to_string();
        }
        let mut output = String::from("### Adaptation Trace\n");
        for (idx, decision) in self.decisions.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. {} -> {}: {} (confidence {:.2}, sources {})",
                idx + 1,
                decision.from.as_str(),
                decision.to.as_str(),
                decision.reason,
                decision.quality.confidence,
                decision.quality.source_count,
            );
        }
        output
    }

    pub fn render_mermaid(&self) -> String {
        if self.decisions.is_empty() {
            return "flowchart TD\n  %% no adaptation decisions captured".to_string();
        }

        let mut output = String::from("flowchart TD\n  %% auto-generated adaptation trace\n");
        for (idx, decision) in self.decisions.iter().enumerate() {
            let _ = writeln!(
                output,
                "  step{}[\"{}\"] --> step{}[\"{}\"]",
                idx + 1,
                sanitize_mermaid(&format!("{}: {}", decision.from.as_str(), decision.reason)),
                idx + 2,
                sanitize_mermaid(decision.to.as_str()),
            );
        }

        output
    }
}

fn sanitize_mermaid(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('[', "(")
        .replace(']', ")")
        .replace('\n', "<br/>")
}
