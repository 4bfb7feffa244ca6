//! # Prompts
//!
//! System prompts and request bodies sent to the advisor model.

use crate::domain::types::ActionPlan;

pub const SPLIT_ACTIONS_PROMPT: &str = include_str!("../../prompts/split_actions.md");
pub const CONFIRM_CHECK_PROMPT: &str = include_str!("../../prompts/confirm_check.md");
pub const CONFIRM_REQUEST_TEMPLATE: &str = include_str!("../../prompts/confirm_request.md");
pub const CONFIRM_RESOLVE_TEMPLATE: &str = include_str!("../../prompts/confirm_resolve.md");

/// A builder for rendering `{{KEY}}` placeholders.
/// Substituted values are never re-scanned, so user text cannot inject placeholders.
pub struct PromptRenderer<'a> {
    template: &'a str,
    replacements: Vec<(&'a str, String)>,
}

impl<'a> PromptRenderer<'a> {
    pub fn new(template: &'a str) -> Self {
        Self {
            template,
            replacements: Vec::new(),
        }
    }

    pub fn set(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.replacements.push((key, value.into()));
        self
    }

    pub fn render(self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            let Some(end) = tail.find("}}") else {
                out.push_str(tail);
                rest = "";
                break;
            };
            let placeholder = &tail[..end + 2];
            match self.replacements.iter().find(|(key, _)| *key == placeholder) {
                Some((_, value)) => out.push_str(value),
                None => {
                    tracing::error!("Unreplaced placeholder in prompt: {}", placeholder);
                    out.push_str(placeholder);
                }
            }
            rest = &tail[end + 2..];
        }
        out.push_str(rest);
        out
    }
}

/// User-side prompt asking whether `plan` needs confirmation.
pub fn confirm_request(plan: &ActionPlan) -> String {
    let steps = plan
        .steps
        .iter()
        .map(|s| {
            if s.description.is_empty() {
                s.type_name().to_string()
            } else {
                s.description.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    PromptRenderer::new(CONFIRM_REQUEST_TEMPLATE)
        .set("{{SOURCE_TEXT}}", plan.source_text.as_str())
        .set("{{DESCRIPTION}}", plan.description.as_str())
        .set("{{INTENT}}", plan.intent.as_str())
        .set("{{STEPS}}", steps)
        .render()
}

/// System prompt for interpreting the option a user picked.
pub fn confirm_resolve(plan: &ActionPlan, question: &str, options: &[String], selected: &str) -> String {
    let options = serde_json::to_string(options).unwrap_or_else(|_| options.join(", "));
    PromptRenderer::new(CONFIRM_RESOLVE_TEMPLATE)
        .set("{{SOURCE_TEXT}}", plan.source_text.as_str())
        .set("{{DESCRIPTION}}", plan.description.as_str())
        .set("{{QUESTION}}", question)
        .set("{{OPTIONS}}", options)
        .set("{{SELECTED}}", selected)
        .render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{intent, ActionStep};

    #[test]
    fn test_render_does_not_rescan_values() {
        let out = PromptRenderer::new("a={{A}} b={{B}}")
            .set("{{A}}", "{{B}}")
            .set("{{B}}", "x")
            .render();
        assert_eq!(out, "a={{B}} b=x");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let out = PromptRenderer::new("hi {{WHO}} {{").render();
        assert_eq!(out, "hi {{WHO}} {{");
    }

    #[test]
    fn test_confirm_request_lists_steps() {
        let plan = ActionPlan::new(
            "mute",
            intent::MEDIA_CONTROL,
            "Muting audio",
            vec![ActionStep::key_press("VolumeMute", 0xAD, "Press VolumeMute")],
        );
        let prompt = confirm_request(&plan);
        assert!(prompt.contains("User said: \"mute\""));
        assert!(prompt.contains("Action type: media_control"));
        assert!(prompt.contains("Steps: Press VolumeMute"));
    }

    #[test]
    fn test_confirm_resolve_embeds_options() {
        let plan = ActionPlan::new("shut down", intent::POWER, "Shutting down PC", vec![]);
        let prompt = confirm_resolve(
            &plan,
            "Are you sure?",
            &["Yes".to_string(), "Cancel".to_string()],
            "Cancel",
        );
        assert!(prompt.contains(r#"Options presented: ["Yes","Cancel"]"#));
        assert!(prompt.contains("User selected: \"Cancel\""));
    }
}
