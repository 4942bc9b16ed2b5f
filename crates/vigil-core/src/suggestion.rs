//! Context-aware suggestion engine.
//!
//! A pure function of the conversation context: no side effects, no
//! clocks, no store access. Frequency within the 5-item intent window
//! dominates the score; ties break toward more recent occurrences.

use crate::config::EngineConfig;
use crate::session::ConversationContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What kind of next action a suggestion proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    /// Repeat or extend a recently used command family.
    RepeatIntent,
    /// Proceed with the current workflow step.
    WorkflowStep,
}

/// A proactively offered next action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextualSuggestion {
    pub suggestion_type: SuggestionType,
    pub content: String,
    pub reasoning: String,
    /// Relevance in `[0, 1]`, monotone non-decreasing in how often the
    /// underlying intent appears in the recent window.
    pub confidence: f64,
    pub actionable: bool,
    #[serde(default)]
    pub follow_up: Option<String>,
}

// Frequency dominates: one extra occurrence outweighs any recency
// bonus, keeping confidence monotone in frequency.
const BASE_SCORE: f64 = 0.3;
const FREQUENCY_WEIGHT: f64 = 0.12;
const RECENCY_WEIGHT: f64 = 0.02;

/// Produces suggestions for the next turn.
///
/// Returns an empty vector when the session has suggestions disabled.
pub fn suggest(context: &ConversationContext, config: &EngineConfig) -> Vec<ContextualSuggestion> {
    if !context.session.preferences.suggest_commands {
        return Vec::new();
    }

    let mut suggestions = Vec::new();

    // An active workflow step is the most relevant next action.
    if let Some(workflow) = &context.workflow {
        if let Some(step) = workflow.current() {
            suggestions.push(ContextualSuggestion {
                suggestion_type: SuggestionType::WorkflowStep,
                content: format!(
                    "Continue '{}': step {} of {} - {}",
                    workflow.name,
                    workflow.current_step + 1,
                    workflow.total_steps,
                    step.name
                ),
                reasoning: format!("workflow '{}' is in progress", workflow.workflow_id),
                confidence: 0.9,
                actionable: step.command.is_some(),
                follow_up: step.command.clone(),
            });
        }
    }

    // Score intent types by frequency, then by most recent position.
    let window_len = context.recent_intents.len();
    let mut frequency: HashMap<&str, usize> = HashMap::new();
    let mut last_seen: HashMap<&str, usize> = HashMap::new();
    for (index, intent) in context.recent_intents.iter().enumerate() {
        *frequency.entry(intent.intent_type.as_str()).or_default() += 1;
        last_seen.insert(intent.intent_type.as_str(), index);
    }

    let mut scored: Vec<(&str, f64)> = frequency
        .iter()
        .map(|(intent_type, &count)| {
            let recency = (last_seen[intent_type] + 1) as f64 / window_len as f64;
            let confidence =
                (BASE_SCORE + FREQUENCY_WEIGHT * count as f64 + RECENCY_WEIGHT * recency)
                    .min(1.0);
            (*intent_type, confidence)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(b.0)));

    for (intent_type, confidence) in scored {
        let target = context
            .recent_entities
            .latest()
            .map(|entity| format!(" on {}", entity.value))
            .unwrap_or_default();
        suggestions.push(ContextualSuggestion {
            suggestion_type: SuggestionType::RepeatIntent,
            content: format!("Run another {}{}", intent_type, target),
            reasoning: format!(
                "'{}' appeared {} time(s) in the last {} intents",
                intent_type, frequency[intent_type], window_len
            ),
            confidence,
            actionable: true,
            follow_up: context.recent_commands.latest().cloned(),
        });
    }

    suggestions.truncate(config.max_suggestions);
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Intent;

    fn context_with_intents(intents: &[&str]) -> ConversationContext {
        let mut context = ConversationContext::ephemeral("s-1");
        for intent_type in intents {
            context.recent_intents.push(Intent::new(*intent_type, 0.9));
        }
        context
    }

    #[test]
    fn disabled_preference_returns_empty() {
        let mut context = context_with_intents(&["threat_scan"]);
        context.session.preferences.suggest_commands = false;
        assert!(suggest(&context, &EngineConfig::default()).is_empty());
    }

    #[test]
    fn frequent_intent_outranks_rarer_one() {
        let context = context_with_intents(&["threat_scan", "threat_scan", "status_check"]);
        let suggestions = suggest(&context, &EngineConfig::default());

        let scan = suggestions
            .iter()
            .find(|s| s.content.contains("threat_scan"))
            .expect("threat_scan suggestion");
        let status = suggestions
            .iter()
            .find(|s| s.content.contains("status_check"))
            .expect("status_check suggestion");
        assert!(scan.confidence > status.confidence);
    }

    #[test]
    fn confidence_is_monotone_in_frequency() {
        let once = suggest(
            &context_with_intents(&["threat_scan"]),
            &EngineConfig::default(),
        );
        let thrice = suggest(
            &context_with_intents(&["threat_scan", "threat_scan", "threat_scan"]),
            &EngineConfig::default(),
        );
        assert!(thrice[0].confidence > once[0].confidence);
        assert!(thrice[0].confidence <= 1.0);
    }

    #[test]
    fn recency_breaks_frequency_ties() {
        let context = context_with_intents(&["status_check", "threat_scan"]);
        let suggestions = suggest(&context, &EngineConfig::default());
        // Both appear once; threat_scan is more recent and ranks first.
        assert!(suggestions[0].content.contains("threat_scan"));
    }

    #[test]
    fn active_workflow_step_is_suggested_first() {
        let mut context = context_with_intents(&["threat_scan"]);
        context.workflow = Some(
            crate::workflow::template::template("incident_response")
                .unwrap()
                .instantiate(),
        );
        let suggestions = suggest(&context, &EngineConfig::default());
        assert_eq!(suggestions[0].suggestion_type, SuggestionType::WorkflowStep);
        assert!(suggestions[0].content.contains("Identify"));
    }

    #[test]
    fn output_is_capped_by_config() {
        let context =
            context_with_intents(&["a", "b", "c", "d", "e"]);
        let config = EngineConfig {
            max_suggestions: 2,
            ..Default::default()
        };
        assert_eq!(suggest(&context, &config).len(), 2);
    }

    #[test]
    fn empty_window_yields_no_intent_suggestions() {
        let context = ConversationContext::ephemeral("s-1");
        assert!(suggest(&context, &EngineConfig::default()).is_empty());
    }
}
