//! Prompt templates for the triage conversation and analysis stages.
//!
//! Templates are plain constants: they are recorded as run artifacts and
//! handed to the external collaborators, never interpreted here.

use serde_json::{Value, json};

/// System prompt for the triage chat agent.
pub const SYSTEM_PROMPT: &str = "You are a careful medical intake assistant. \
Ask one question at a time, gather the patient's symptoms, their onset, \
severity and relevant history. Never diagnose or prescribe; advise seeing \
a clinician for anything urgent.";

/// Opening utterance template.
pub const INITIAL_PROMPT: &str =
    "Hello, I'm here to help collect some information before your consultation. \
What brings you in today?";

/// Follow-up turn template.
pub const FOLLOW_UP_PROMPT: &str = "Ask a focused follow-up question about the \
symptom the patient just described: duration, severity, triggers, or \
associated symptoms.";

/// Template for the end-of-session symptom summary.
pub const SUMMARY_PROMPT: &str = "Summarize the conversation as a concise \
symptom report: chief complaint, onset, severity, relevant history. \
Use neutral clinical language and omit small talk.";

/// Template for the document-grounded report produced by the analysis stage.
pub const DOCTOR_REPORT_PROMPT: &str = "Using the symptom summary and the \
retrieved reference documents, draft a brief report for the reviewing \
clinician. Cite which retrieved documents informed each point.";

/// The chat-facing templates bundled for the `prompt_templates` artifact.
pub fn chat_templates() -> Value {
    json!({
        "system_prompt": SYSTEM_PROMPT,
        "initial_prompt": INITIAL_PROMPT,
        "follow_up_prompt": FOLLOW_UP_PROMPT,
    })
}
