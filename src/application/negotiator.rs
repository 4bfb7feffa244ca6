//! # Confirmation Negotiator
//!
//! Decides whether a plan needs the user's sign-off before it is queued, and
//! interprets the option the user picks. Power actions always ask, without
//! consulting the advisor; everything else is the advisor's call.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::application::parsing;
use crate::domain::traits::Advisor;
use crate::domain::types::{ActionPlan, PowerAction};
use crate::strings::prompts;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationCheck {
    NotNeeded,
    Required { question: String, options: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Execute,
    Modify(String),
    Cancel,
}

/// A question waiting on the user. Single-use.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub id: String,
    pub plan: ActionPlan,
    pub question: String,
    pub options: Vec<String>,
    pub source_text: String,
    pub created_at: Instant,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfirmationError {
    #[error("No pending confirmation with id {0}")]
    Unknown(String),
    #[error("Confirmation {0} has expired")]
    Expired(String),
}

/// Fixed question and options for a power action.
pub fn power_confirmation(action: PowerAction) -> ConfirmationCheck {
    let options: &[&str] = match action {
        PowerAction::Shutdown => &["Yes, shut down", "Restart instead", "Sleep instead", "Cancel"],
        PowerAction::Restart => &["Yes, restart", "Shut down instead", "Sleep instead", "Cancel"],
        PowerAction::Sleep => &["Yes, sleep", "Hibernate instead", "Shut down instead", "Cancel"],
        PowerAction::Hibernate => &["Yes, hibernate", "Sleep instead", "Shut down instead", "Cancel"],
    };
    ConfirmationCheck::Required {
        question: format!("Are you sure you want to {} your PC?", action.verb()),
        options: options.iter().map(|o| o.to_string()).collect(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CheckReply {
    needs_confirmation: bool,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    options: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ResolveReply {
    action: String,
    #[serde(default)]
    modified_command: Option<String>,
}

/// Deterministic reading of a choice when no advisor is configured.
pub fn resolve_locally(confirmation: &Confirmation, selected: &str) -> Resolution {
    let choice = selected.trim().to_lowercase();
    let words: Vec<&str> = choice.split(|c: char| !c.is_alphanumeric()).collect();
    if choice.is_empty()
        || choice.contains("cancel")
        || choice.contains("never mind")
        || words.iter().any(|w| matches!(*w, "no" | "nope" | "stop" | "abort"))
    {
        return Resolution::Cancel;
    }
    let is_first = confirmation
        .options
        .first()
        .is_some_and(|first| first.trim().to_lowercase() == choice);
    if is_first || choice.starts_with("yes") {
        return Resolution::Execute;
    }
    match choice.strip_suffix(" instead").map(str::trim) {
        Some(command) if !command.is_empty() => Resolution::Modify(command.to_string()),
        _ => Resolution::Cancel,
    }
}

pub struct Negotiator {
    advisor: Option<Arc<dyn Advisor>>,
}

impl Negotiator {
    pub fn new(advisor: Option<Arc<dyn Advisor>>) -> Self {
        Self { advisor }
    }

    /// Whether `plan` must be confirmed. Advisor failures of any kind mean "no".
    pub async fn check(&self, plan: &ActionPlan, source_text: &str) -> ConfirmationCheck {
        if let Some(action) = plan.power_action() {
            tracing::info!("Power action {} requires confirmation", action.as_str());
            return power_confirmation(action);
        }
        let Some(advisor) = &self.advisor else {
            return ConfirmationCheck::NotNeeded;
        };

        let mut prompt_plan = plan.clone();
        prompt_plan.source_text = source_text.to_string();
        let reply = match advisor
            .complete(&prompts::confirm_request(&prompt_plan), prompts::CONFIRM_CHECK_PROMPT)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Confirmation check failed, proceeding without: {}", e);
                return ConfirmationCheck::NotNeeded;
            }
        };

        match parsing::parse_reply::<CheckReply>(&reply) {
            Some(CheckReply {
                needs_confirmation: true,
                question: Some(question),
                options: Some(options),
            }) if !question.trim().is_empty() && !options.is_empty() => {
                tracing::info!("Advisor asks for confirmation: {}", question);
                ConfirmationCheck::Required { question, options }
            }
            Some(CheckReply {
                needs_confirmation: false,
                question: None,
                options: None,
            }) => ConfirmationCheck::NotNeeded,
            _ => {
                tracing::debug!("Confirmation reply had the wrong shape: {:.200}", reply);
                ConfirmationCheck::NotNeeded
            }
        }
    }

    /// Interprets the user's pick. Advisor failures of any kind mean [`Resolution::Cancel`].
    pub async fn resolve(&self, confirmation: &Confirmation, selected: &str) -> Resolution {
        let Some(advisor) = &self.advisor else {
            return resolve_locally(confirmation, selected);
        };
        let system_prompt = prompts::confirm_resolve(
            &confirmation.plan,
            &confirmation.question,
            &confirmation.options,
            selected,
        );
        let reply = match advisor.complete(selected, &system_prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Confirmation resolve failed, cancelling: {}", e);
                return Resolution::Cancel;
            }
        };
        let Some(parsed) = parsing::parse_reply::<ResolveReply>(&reply) else {
            tracing::debug!("Resolve reply had the wrong shape: {:.200}", reply);
            return Resolution::Cancel;
        };
        match (parsed.action.as_str(), parsed.modified_command) {
            ("execute", None) => Resolution::Execute,
            ("modify", Some(command)) if !command.trim().is_empty() => {
                Resolution::Modify(command.trim().to_string())
            }
            _ => Resolution::Cancel,
        }
    }
}

/// Pending confirmations keyed by id, each valid for `ttl`.
pub struct ConfirmationStore {
    pending: Mutex<HashMap<String, Confirmation>>,
    ttl: Duration,
}

impl ConfirmationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Stores a new confirmation, sweeping expired ones first.
    pub async fn store(
        &self,
        plan: ActionPlan,
        question: String,
        options: Vec<String>,
        source_text: &str,
    ) -> Confirmation {
        let confirmation = Confirmation {
            id: Uuid::new_v4().to_string(),
            plan,
            question,
            options,
            source_text: source_text.to_string(),
            created_at: Instant::now(),
        };
        let mut pending = self.pending.lock().await;
        let ttl = self.ttl;
        pending.retain(|_, c| c.created_at.elapsed() < ttl);
        pending.insert(confirmation.id.clone(), confirmation.clone());
        confirmation
    }

    /// Removes and returns a confirmation. Each id can be taken once.
    pub async fn take(&self, id: &str) -> Result<Confirmation, ConfirmationError> {
        let confirmation = self
            .pending
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| ConfirmationError::Unknown(id.to_string()))?;
        if confirmation.created_at.elapsed() >= self.ttl {
            return Err(ConfirmationError::Expired(id.to_string()));
        }
        Ok(confirmation)
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }
}
