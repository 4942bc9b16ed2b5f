//! Built-in keyword collaborators for running the shell without a
//! language-model or execution backend attached.
//!
//! The classifier matches on verbs; the executor prints canned results.
//! Both live behind the same traits a real deployment would implement.

use async_trait::async_trait;
use std::time::Instant;
use vigil_core::classifier::{Intent, IntentClassifier};
use vigil_core::error::Result;
use vigil_core::executor::{CommandExecutor, CommandOutput, ParsedCommand};
use vigil_core::session::ConversationContext;

/// (keyword, intent type, confidence, destructive)
const KEYWORDS: &[(&str, &str, f64, bool)] = &[
    ("scan", "threat_scan", 0.9, false),
    ("hunt", "hunt_query", 0.85, false),
    ("status", "status_check", 0.85, false),
    ("lookup", "ioc_lookup", 0.85, false),
    ("alerts", "list_alerts", 0.85, false),
    ("assets", "list_assets", 0.8, false),
    ("block", "block_ip", 0.9, true),
    ("quarantine", "quarantine_host", 0.9, true),
    ("isolate", "quarantine_host", 0.85, true),
    ("purge", "purge_logs", 0.9, true),
    ("delete", "delete_rule", 0.85, true),
];

/// Classifies input by the first known verb it contains.
///
/// Bare follow-up words (an IP, a hostname) inherit the session topic
/// at reduced confidence, which is what lets a clarification round
/// resolve.
pub struct KeywordClassifier;

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, text: &str, context: &ConversationContext) -> Result<Intent> {
        let lower = text.to_lowercase();
        for (keyword, intent_type, confidence, _) in KEYWORDS {
            if lower.split_whitespace().any(|word| word == *keyword) {
                let mut intent = Intent::new(*intent_type, *confidence);
                if let Some(target) = lower.split_whitespace().find(|w| w.contains('.')) {
                    intent
                        .entities
                        .insert("target".to_string(), serde_json::json!(target));
                }
                return Ok(intent);
            }
        }

        // No verb: a short reply during clarification leans on the
        // current topic, anything else stays unknown.
        if let Some(topic) = &context.session.current_topic {
            if text.split_whitespace().count() <= 2 {
                let mut intent = Intent::new(topic.clone(), 0.7);
                intent
                    .entities
                    .insert("target".to_string(), serde_json::json!(text.trim()));
                return Ok(intent);
            }
        }
        Ok(Intent::new("unknown", 0.3))
    }
}

/// Executes prepared commands as canned simulations.
pub struct DemoExecutor;

#[async_trait]
impl CommandExecutor for DemoExecutor {
    async fn prepare(&self, intent: &Intent) -> Result<ParsedCommand> {
        let destructive = KEYWORDS
            .iter()
            .any(|(_, intent_type, _, destructive)| {
                *intent_type == intent.intent_type && *destructive
            });
        Ok(ParsedCommand {
            name: intent.intent_type.clone(),
            destructive,
            args: intent.entities.clone(),
        })
    }

    async fn execute(&self, command: &ParsedCommand) -> Result<CommandOutput> {
        let started = Instant::now();
        let target = command
            .args
            .get("target")
            .and_then(|v| v.as_str())
            .unwrap_or("all monitored assets");

        let output = match command.name.as_str() {
            "threat_scan" => format!("Scan of {} finished: 0 critical, 2 informational findings.", target),
            "hunt_query" => format!("Hunt over {} returned 3 candidate events.", target),
            "status_check" => "All sensors reporting; ingest lag 4s.".to_string(),
            "ioc_lookup" => format!("{}: no matches in threat intel feeds.", target),
            "list_alerts" => "2 open alerts: suspicious login (medium), beaconing (low).".to_string(),
            "list_assets" => "128 assets in scope across 3 network segments.".to_string(),
            "block_ip" => format!("{} added to the block list on all egress points.", target),
            "quarantine_host" => format!("{} isolated from the network.", target),
            "purge_logs" => "Logs older than the retention window removed.".to_string(),
            "delete_rule" => format!("Rule '{}' deleted.", target),
            other => format!("'{}' completed.", other),
        };

        Ok(CommandOutput {
            output,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Entities the demo classifier may attach, for help output.
pub fn known_verbs() -> Vec<&'static str> {
    KEYWORDS.iter().map(|(keyword, ..)| *keyword).collect()
}
