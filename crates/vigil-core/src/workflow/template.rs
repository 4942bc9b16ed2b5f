//! Built-in workflow templates.
//!
//! Templates are static descriptions; starting one instantiates a
//! [`WorkflowState`] with a fresh step pointer and timestamps.

use super::model::{WorkflowStep, WorkflowState};
use crate::error::{Result, VigilError};
use chrono::Utc;
use std::collections::HashMap;

/// A static description of a guided procedure.
#[derive(Debug, Clone)]
pub struct WorkflowTemplate {
    pub template_id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub estimated_duration_min: u32,
    /// (step_id, name, description, bound command)
    pub steps: &'static [(&'static str, &'static str, &'static str, Option<&'static str>)],
}

impl WorkflowTemplate {
    /// Instantiates a running workflow from this template.
    pub fn instantiate(&self) -> WorkflowState {
        let steps = self
            .steps
            .iter()
            .map(|(step_id, name, description, command)| WorkflowStep {
                step_id: (*step_id).to_string(),
                name: (*name).to_string(),
                description: (*description).to_string(),
                command: command.map(str::to_string),
                completed: false,
                result: None,
                skipped: false,
            })
            .collect::<Vec<_>>();

        WorkflowState {
            workflow_id: self.template_id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            current_step: 0,
            total_steps: steps.len(),
            steps,
            start_time: Utc::now(),
            estimated_duration_min: Some(self.estimated_duration_min),
            variables: HashMap::new(),
        }
    }
}

const INCIDENT_RESPONSE: WorkflowTemplate = WorkflowTemplate {
    template_id: "incident_response",
    name: "Incident Response",
    description: "Guided containment and recovery for an active incident",
    estimated_duration_min: 45,
    steps: &[
        (
            "identify",
            "Identify",
            "Establish scope: affected hosts, accounts, and services",
            Some("list_alerts"),
        ),
        (
            "contain",
            "Contain",
            "Isolate affected hosts from the network",
            Some("quarantine_host"),
        ),
        (
            "collect",
            "Collect evidence",
            "Snapshot memory and disk artifacts before remediation",
            Some("collect_artifacts"),
        ),
        (
            "eradicate",
            "Eradicate",
            "Remove malicious artifacts and close the entry vector",
            None,
        ),
        (
            "recover",
            "Recover",
            "Restore services and re-admit hosts to the network",
            None,
        ),
        (
            "review",
            "Post-incident review",
            "Record the timeline and lessons learned",
            None,
        ),
    ],
};

const THREAT_HUNTING: WorkflowTemplate = WorkflowTemplate {
    template_id: "threat_hunting",
    name: "Threat Hunting",
    description: "Hypothesis-driven sweep for undetected activity",
    estimated_duration_min: 60,
    steps: &[
        (
            "hypothesis",
            "Form hypothesis",
            "Pick a technique or behavior to hunt for",
            None,
        ),
        (
            "scope",
            "Scope data",
            "Select the hosts and time range to sweep",
            None,
        ),
        (
            "sweep",
            "Sweep",
            "Run the hunt queries across the selected scope",
            Some("hunt_query"),
        ),
        (
            "triage",
            "Triage hits",
            "Separate true positives from benign matches",
            None,
        ),
        (
            "report",
            "Report",
            "Document findings and tune detections",
            None,
        ),
    ],
};

const VULNERABILITY_ASSESSMENT: WorkflowTemplate = WorkflowTemplate {
    template_id: "vulnerability_assessment",
    name: "Vulnerability Assessment",
    description: "Scan, prioritize, and verify remediation of vulnerabilities",
    estimated_duration_min: 90,
    steps: &[
        (
            "inventory",
            "Inventory",
            "Enumerate the assets in scope",
            Some("list_assets"),
        ),
        (
            "scan",
            "Scan",
            "Run the vulnerability scan across the inventory",
            Some("vuln_scan"),
        ),
        (
            "prioritize",
            "Prioritize",
            "Rank findings by exploitability and exposure",
            None,
        ),
        (
            "remediate",
            "Remediate",
            "Apply patches or mitigations for the top findings",
            None,
        ),
        (
            "verify",
            "Verify",
            "Re-scan to confirm remediation took effect",
            Some("vuln_scan"),
        ),
    ],
};

/// Looks up a built-in template by id.
///
/// # Errors
///
/// Returns [`VigilError::UnknownTemplate`] for ids with no built-in.
pub fn template(template_id: &str) -> Result<&'static WorkflowTemplate> {
    match template_id {
        "incident_response" => Ok(&INCIDENT_RESPONSE),
        "threat_hunting" => Ok(&THREAT_HUNTING),
        "vulnerability_assessment" => Ok(&VULNERABILITY_ASSESSMENT),
        other => Err(VigilError::UnknownTemplate(other.to_string())),
    }
}

/// Ids of all built-in templates, for completion and help output.
pub fn template_ids() -> &'static [&'static str] {
    &[
        "incident_response",
        "threat_hunting",
        "vulnerability_assessment",
    ]
}
