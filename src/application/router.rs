//! # Command Router
//!
//! Drives one piece of user text through the pipeline: message guard,
//! interpreter, confirmation negotiator, plan guard and finally the queue.
//! Every outcome is reported to the [`Responder`] and returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use crate::application::guard;
use crate::application::interpreter;
use crate::application::negotiator::{
    Confirmation, ConfirmationCheck, ConfirmationError, ConfirmationStore, Negotiator, Resolution,
};
use crate::application::queue::PlanQueue;
use crate::domain::traits::{Advisor, Responder};
use crate::domain::types::{ActionPlan, PowerAction};
use crate::strings::messages;

#[derive(Debug, Clone)]
pub enum RouteOutcome {
    Blocked(String),
    NotAnAction(Option<&'static str>),
    AwaitingConfirmation(Confirmation),
    Queued(ActionPlan),
    Cancelled,
}

pub struct CommandRouter {
    queue: Arc<PlanQueue>,
    confirmations: Arc<ConfirmationStore>,
    negotiator: Negotiator,
    advisor: Option<Arc<dyn Advisor>>,
    connected_window: Duration,
}

async fn say(responder: &dyn Responder, text: &str) {
    if let Err(e) = responder.send_message(text).await {
        tracing::error!("Failed to send message: {}", e);
    }
}

async fn notify(responder: &dyn Responder, text: &str) {
    if let Err(e) = responder.send_notification(text).await {
        tracing::error!("Failed to send notification: {}", e);
    }
}

/// True when `selected` is one of the fixed options of a power confirmation and
/// names `action` ("Restart instead").
fn picked_power_option(confirmation: &Confirmation, selected: &str, action: PowerAction) -> bool {
    let selected = selected.trim().to_lowercase();
    confirmation.plan.power_action().is_some()
        && confirmation
            .options
            .iter()
            .any(|o| o.trim().to_lowercase() == selected)
        && selected.contains(action.verb())
}

impl CommandRouter {
    pub fn new(
        queue: Arc<PlanQueue>,
        confirmations: Arc<ConfirmationStore>,
        advisor: Option<Arc<dyn Advisor>>,
        connected_window: Duration,
    ) -> Self {
        Self {
            queue,
            confirmations,
            negotiator: Negotiator::new(advisor.clone()),
            advisor,
            connected_window,
        }
    }

    pub async fn route(&self, responder: &dyn Responder, text: &str) -> RouteOutcome {
        let text = text.trim();
        tracing::info!("Routing \"{}\"", text);

        let verdict = guard::check_message(text);
        if verdict.blocked {
            tracing::warn!("Message blocked: {}", verdict.reason());
            say(responder, &messages::blocked(verdict.reason())).await;
            return RouteOutcome::Blocked(verdict.reason().to_string());
        }

        let Some(plan) = self.interpret(text).await else {
            return self.not_an_action(responder, text).await;
        };

        self.negotiate(responder, plan, text).await
    }

    async fn negotiate(&self, responder: &dyn Responder, plan: ActionPlan, text: &str) -> RouteOutcome {
        match self.negotiator.check(&plan, text).await {
            ConfirmationCheck::NotNeeded => self.enqueue(responder, plan).await,
            ConfirmationCheck::Required { question, options } => {
                let confirmation = self
                    .confirmations
                    .store(plan, question, options, text)
                    .await;
                say(
                    responder,
                    &messages::confirmation_prompt(&confirmation.question, &confirmation.options),
                )
                .await;
                RouteOutcome::AwaitingConfirmation(confirmation)
            }
        }
    }

    /// Answers a stored confirmation. Unknown or expired ids are returned as errors.
    pub async fn confirm(
        &self,
        responder: &dyn Responder,
        confirmation_id: &str,
        selected: &str,
    ) -> Result<RouteOutcome, ConfirmationError> {
        let confirmation = self.confirmations.take(confirmation_id).await?;
        let resolution = self.negotiator.resolve(&confirmation, selected).await;
        tracing::info!("Confirmation {} resolved as {:?}", confirmation.id, resolution);

        let outcome = match resolution {
            Resolution::Execute => self.enqueue(responder, confirmation.plan).await,
            Resolution::Cancel => {
                say(responder, messages::CANCELLED).await;
                RouteOutcome::Cancelled
            }
            Resolution::Modify(command) => {
                let verdict = guard::check_message(&command);
                if verdict.blocked {
                    say(responder, &messages::blocked(verdict.reason())).await;
                    return Ok(RouteOutcome::Blocked(verdict.reason().to_string()));
                }
                match interpreter::detect(&command) {
                    Some(plan) => {
                        say(responder, &messages::modified(&command)).await;
                        match plan.power_action() {
                            Some(action) if !picked_power_option(&confirmation, selected, action) => {
                                tracing::warn!(
                                    "Modified command \"{}\" is a {} the user did not pick, asking again",
                                    command,
                                    action.as_str()
                                );
                                self.negotiate(responder, plan, &command).await
                            }
                            _ => self.enqueue(responder, plan).await,
                        }
                    }
                    None => {
                        tracing::warn!("Modified command \"{}\" is not an action, cancelling", command);
                        say(responder, messages::CANCELLED).await;
                        RouteOutcome::Cancelled
                    }
                }
            }
        };
        Ok(outcome)
    }

    async fn interpret(&self, text: &str) -> Option<ActionPlan> {
        if let Some(advisor) = &self.advisor
            && interpreter::looks_like_multi_step(text)
            && let Some(plan) = interpreter::detect_with_advisor(text, advisor.as_ref()).await
        {
            return Some(plan);
        }
        interpreter::detect(text)
    }

    async fn not_an_action(&self, responder: &dyn Responder, text: &str) -> RouteOutcome {
        let hint = interpreter::suggest(text);
        match hint {
            Some(hint) => say(responder, &messages::suggestion(hint)).await,
            None => say(responder, messages::NOT_AN_ACTION).await,
        }
        RouteOutcome::NotAnAction(hint)
    }

    async fn enqueue(&self, responder: &dyn Responder, plan: ActionPlan) -> RouteOutcome {
        let verdict = guard::check_plan(&plan);
        if verdict.blocked {
            tracing::warn!("Plan blocked: {}", verdict.reason());
            say(responder, &messages::blocked(verdict.reason())).await;
            return RouteOutcome::Blocked(verdict.reason().to_string());
        }
        let queued = self.queue.enqueue(plan).await;
        say(responder, &messages::queued(&queued)).await;
        if !self.queue.consumer_connected(self.connected_window).await {
            notify(responder, messages::BRIDGE_DISCONNECTED).await;
        }
        RouteOutcome::Queued(queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{intent, StepKind};
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingResponder {
        messages: std::sync::Mutex<Vec<String>>,
        notifications: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Responder for RecordingResponder {
        async fn send_message(&self, content: &str) -> Result<(), String> {
            self.messages.lock().unwrap().push(content.to_string());
            Ok(())
        }

        async fn send_notification(&self, content: &str) -> Result<(), String> {
            self.notifications.lock().unwrap().push(content.to_string());
            Ok(())
        }
    }

    /// Answers each advisor call with the next canned reply, in order.
    struct ScriptedAdvisor(std::sync::Mutex<std::collections::VecDeque<&'static str>>);

    impl ScriptedAdvisor {
        fn new(replies: &[&'static str]) -> Arc<Self> {
            Arc::new(Self(std::sync::Mutex::new(replies.iter().copied().collect())))
        }
    }

    #[async_trait]
    impl Advisor for ScriptedAdvisor {
        async fn complete(&self, _prompt: &str, _system_prompt: &str) -> Result<String, String> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .map(str::to_string)
                .ok_or_else(|| "no more replies".to_string())
        }
    }

    fn advised_router(advisor: Arc<ScriptedAdvisor>) -> (CommandRouter, Arc<PlanQueue>) {
        let queue = Arc::new(PlanQueue::new(50));
        let store = Arc::new(ConfirmationStore::new(Duration::from_secs(300)));
        let router = CommandRouter::new(queue.clone(), store, Some(advisor), Duration::from_secs(5));
        (router, queue)
    }

    const ASK: &str = r#"{"needsConfirmation":true,"question":"Close it?","options":["This one","Cancel"]}"#;

    fn router() -> (CommandRouter, Arc<PlanQueue>) {
        let queue = Arc::new(PlanQueue::new(50));
        let store = Arc::new(ConfirmationStore::new(Duration::from_secs(300)));
        let router = CommandRouter::new(queue.clone(), store, None, Duration::from_secs(5));
        (router, queue)
    }

    #[tokio::test]
    async fn test_simple_command_is_queued() {
        let (router, queue) = router();
        let responder = RecordingResponder::default();
        let RouteOutcome::Queued(plan) = router.route(&responder, "mute").await else {
            panic!("expected queued");
        };
        assert_eq!(plan.intent, intent::MEDIA_CONTROL);
        assert_eq!(queue.pending_len().await, 1);
        // nobody has polled yet
        assert_eq!(
            responder.notifications.lock().unwrap().as_slice(),
            &[messages::BRIDGE_DISCONNECTED.to_string()]
        );
    }

    #[tokio::test]
    async fn test_blocked_message_never_reaches_queue() {
        let (router, queue) = router();
        let responder = RecordingResponder::default();
        let outcome = router
            .route(&responder, "type del C:\\Windows\\System32\\drivers")
            .await;
        assert!(matches!(outcome, RouteOutcome::Blocked(_)));
        assert_eq!(queue.pending_len().await, 0);
        assert!(queue.history(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_not_an_action_gets_hint() {
        let (router, _) = router();
        let responder = RecordingResponder::default();
        let outcome = router.route(&responder, "can you lock my pc?").await;
        assert!(matches!(outcome, RouteOutcome::NotAnAction(Some(_))));
        let outcome = router.route(&responder, "tell me a joke").await;
        assert!(matches!(outcome, RouteOutcome::NotAnAction(None)));
    }

    #[tokio::test]
    async fn test_power_confirmation_flow() {
        let (router, queue) = router();
        let responder = RecordingResponder::default();
        let RouteOutcome::AwaitingConfirmation(confirmation) =
            router.route(&responder, "shut down this pc").await
        else {
            panic!("expected confirmation");
        };
        assert_eq!(confirmation.options[0], "Yes, shut down");
        assert_eq!(queue.pending_len().await, 0);

        let outcome = router
            .confirm(&responder, &confirmation.id, "Restart instead")
            .await
            .unwrap();
        let RouteOutcome::Queued(plan) = outcome else {
            panic!("expected queued");
        };
        assert_eq!(plan.power_action(), Some(PowerAction::Restart));
        assert!(matches!(
            plan.steps[0].kind,
            StepKind::PowerCommand { action: PowerAction::Restart }
        ));

        let again = router.confirm(&responder, &confirmation.id, "Yes").await;
        assert!(matches!(again, Err(ConfirmationError::Unknown(_))));
    }

    #[tokio::test]
    async fn test_cancelled_confirmation_queues_nothing() {
        let (router, queue) = router();
        let responder = RecordingResponder::default();
        let RouteOutcome::AwaitingConfirmation(confirmation) =
            router.route(&responder, "restart the computer").await
        else {
            panic!("expected confirmation");
        };
        let outcome = router.confirm(&responder, &confirmation.id, "Cancel").await.unwrap();
        assert!(matches!(outcome, RouteOutcome::Cancelled));
        assert_eq!(queue.pending_len().await, 0);
    }

    #[tokio::test]
    async fn test_connected_consumer_suppresses_warning() {
        let (router, queue) = router();
        let responder = RecordingResponder::default();
        queue.take_pending().await;
        router.route(&responder, "pause").await;
        assert!(responder.notifications.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_modify_into_power_asks_again() {
        let advisor = ScriptedAdvisor::new(&[
            ASK,
            r#"{"action":"modify","modifiedCommand":"shut down"}"#,
            r#"{"action":"execute"}"#,
        ]);
        let (router, queue) = advised_router(advisor);
        let responder = RecordingResponder::default();
        let RouteOutcome::AwaitingConfirmation(first) = router.route(&responder, "close window").await
        else {
            panic!("expected confirmation");
        };

        let outcome = router.confirm(&responder, &first.id, "This one").await.unwrap();
        let RouteOutcome::AwaitingConfirmation(second) = outcome else {
            panic!("expected a power confirmation, got {outcome:?}");
        };
        assert_eq!(second.plan.power_action(), Some(PowerAction::Shutdown));
        assert_eq!(
            second.options,
            vec!["Yes, shut down", "Restart instead", "Sleep instead", "Cancel"]
        );
        assert_eq!(queue.pending_len().await, 0);

        let outcome = router
            .confirm(&responder, &second.id, "Yes, shut down")
            .await
            .unwrap();
        assert!(matches!(outcome, RouteOutcome::Queued(_)));
        assert_eq!(queue.pending_len().await, 1);
    }

    #[tokio::test]
    async fn test_modify_must_match_the_picked_power_option() {
        let advisor = ScriptedAdvisor::new(&[r#"{"action":"modify","modifiedCommand":"hibernate"}"#]);
        let (router, queue) = advised_router(advisor);
        let responder = RecordingResponder::default();
        let RouteOutcome::AwaitingConfirmation(first) =
            router.route(&responder, "shut down this pc").await
        else {
            panic!("expected confirmation");
        };
        let outcome = router
            .confirm(&responder, &first.id, "Restart instead")
            .await
            .unwrap();
        let RouteOutcome::AwaitingConfirmation(second) = outcome else {
            panic!("expected a new confirmation, got {outcome:?}");
        };
        assert_eq!(second.plan.power_action(), Some(PowerAction::Hibernate));
        assert_eq!(queue.pending_len().await, 0);
    }

    #[tokio::test]
    async fn test_modify_into_protected_path_is_blocked() {
        let advisor = ScriptedAdvisor::new(&[
            ASK,
            r#"{"action":"modify","modifiedCommand":"type C:\\Windows\\System32\\config"}"#,
        ]);
        let (router, queue) = advised_router(advisor);
        let responder = RecordingResponder::default();
        let RouteOutcome::AwaitingConfirmation(first) = router.route(&responder, "close window").await
        else {
            panic!("expected confirmation");
        };
        let outcome = router.confirm(&responder, &first.id, "This one").await.unwrap();
        let RouteOutcome::Blocked(reason) = outcome else {
            panic!("expected blocked, got {outcome:?}");
        };
        assert!(reason.to_lowercase().contains("system32"), "{reason}");
        assert_eq!(queue.pending_len().await, 0);
        assert!(queue.history(10).await.is_empty());
    }
}
