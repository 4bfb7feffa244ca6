//! # Domain Types
//!
//! Plans, steps and the small value types they carry between the interpreter,
//! the security guard, the script compiler and the execution bridge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Windows virtual-key code.
pub type KeyCode = u8;

/// Intent labels attached to plans.
pub mod intent {
    pub const COMPOUND: &str = "compound";
    pub const VISUAL_CLICK: &str = "visual_click";
    pub const WAIT: &str = "wait";
    pub const POWER: &str = "power";
    pub const FOCUS_WINDOW: &str = "focus_window";
    pub const GAME_ACTION: &str = "game_action";
    pub const HOLD_KEY: &str = "hold_key";
    pub const PLAY_MUSIC: &str = "play_music";
    pub const OPEN_APP: &str = "open_app";
    pub const CLOSE_WINDOW: &str = "close_window";
    pub const MEDIA_CONTROL: &str = "media_control";
    pub const VOLUME_SET: &str = "volume_set";
    pub const HOTKEY: &str = "hotkey";
    pub const KEY_PRESS: &str = "key_press";
    pub const TYPE_TEXT: &str = "type_text";
    pub const SEARCH_WEB: &str = "search_web";
    pub const SYSTEM_COMMAND: &str = "system_command";
    pub const SCRIPT_EXECUTE: &str = "script_execute";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    Shutdown,
    Restart,
    Sleep,
    Hibernate,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerAction::Shutdown => "shutdown",
            PowerAction::Restart => "restart",
            PowerAction::Sleep => "sleep",
            PowerAction::Hibernate => "hibernate",
        }
    }

    /// Verb phrase used in questions ("shut down", "restart", ...).
    pub fn verb(&self) -> &'static str {
        match self {
            PowerAction::Shutdown => "shut down",
            PowerAction::Restart => "restart",
            PowerAction::Sleep => "sleep",
            PowerAction::Hibernate => "hibernate",
        }
    }
}

/// One reference colour with a per-channel tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorTarget {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub tolerance: u8,
}

impl ColorTarget {
    pub const fn new(r: u8, g: u8, b: u8, tolerance: u8) -> Self {
        Self { r, g, b, tolerance }
    }
}

/// A named set of colours that identifies something on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorProfile {
    pub name: String,
    pub description: String,
    pub colors: Vec<ColorTarget>,
    /// Fraction of sampled pixels (0.0..1.0) that must match.
    pub match_threshold: f64,
}

/// Condition that ends a [`StepKind::RepeatSequence`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StopCondition {
    KeyPress { key: String, key_code: KeyCode },
    ColorMatch { profile: ColorProfile, threshold: f64 },
}

impl StopCondition {
    pub fn key(key: impl Into<String>, key_code: KeyCode) -> Self {
        StopCondition::KeyPress {
            key: key.into(),
            key_code,
        }
    }

    pub fn color(profile: ColorProfile) -> Self {
        let threshold = profile.match_threshold;
        StopCondition::ColorMatch { profile, threshold }
    }

    pub fn describe(&self) -> String {
        match self {
            StopCondition::KeyPress { key, .. } => format!("{key} pressed"),
            StopCondition::ColorMatch { profile, .. } => format!("{} detected", profile.name),
        }
    }
}

/// Variant-specific payload of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StepKind {
    Delay {
        duration_ms: u64,
    },
    KeyPress {
        key: String,
        key_code: KeyCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hold_ms: Option<u64>,
    },
    KeyDown {
        key: String,
        key_code: KeyCode,
    },
    KeyUp {
        key: String,
        key_code: KeyCode,
    },
    Hotkey {
        keys: Vec<String>,
        key_codes: Vec<KeyCode>,
    },
    TypeText {
        text: String,
    },
    FocusWindow {
        window_title: String,
    },
    LaunchApp {
        app: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    MouseMove {
        dx: i32,
        dy: i32,
    },
    HoldKey {
        key: String,
        key_code: KeyCode,
        until_key: String,
        until_key_code: KeyCode,
    },
    HoldClick {
        button: MouseButton,
        duration_ms: u64,
    },
    VisualClick {
        target: String,
        button: MouseButton,
    },
    RepeatSequence {
        sub_steps: Vec<ActionStep>,
        stop_conditions: Vec<StopCondition>,
        max_iterations: u32,
    },
    SetVolume {
        level: u8,
    },
    PowerCommand {
        action: PowerAction,
    },
    RunScript {
        filename: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Step type this build does not know about.
    #[serde(other)]
    Unrecognized,
}

/// A single unit of automation plus its human-readable description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    #[serde(flatten)]
    pub kind: StepKind,
    #[serde(default)]
    pub description: String,
}

impl ActionStep {
    pub fn new(kind: StepKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    pub fn delay(duration_ms: u64, description: impl Into<String>) -> Self {
        Self::new(StepKind::Delay { duration_ms }, description)
    }

    pub fn key_press(key: &str, key_code: KeyCode, description: impl Into<String>) -> Self {
        Self::new(
            StepKind::KeyPress {
                key: key.to_string(),
                key_code,
                hold_ms: None,
            },
            description,
        )
    }

    pub fn type_text(text: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(StepKind::TypeText { text: text.into() }, description)
    }

    /// Serialized tag of this step ("keyPress", "repeatSequence", ...).
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            StepKind::Delay { .. } => "delay",
            StepKind::KeyPress { .. } => "keyPress",
            StepKind::KeyDown { .. } => "keyDown",
            StepKind::KeyUp { .. } => "keyUp",
            StepKind::Hotkey { .. } => "hotkey",
            StepKind::TypeText { .. } => "typeText",
            StepKind::FocusWindow { .. } => "focusWindow",
            StepKind::LaunchApp { .. } => "launchApp",
            StepKind::MouseMove { .. } => "mouseMove",
            StepKind::HoldKey { .. } => "holdKey",
            StepKind::HoldClick { .. } => "holdClick",
            StepKind::VisualClick { .. } => "visualClick",
            StepKind::RepeatSequence { .. } => "repeatSequence",
            StepKind::SetVolume { .. } => "setVolume",
            StepKind::PowerCommand { .. } => "powerCommand",
            StepKind::RunScript { .. } => "runScript",
            StepKind::Unrecognized => "unrecognized",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Pending,
    Completed,
    Failed,
}

/// Structured, validated automation produced from one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlan {
    #[serde(default)]
    pub id: String,
    pub source_text: String,
    pub intent: String,
    pub description: String,
    pub steps: Vec<ActionStep>,
    pub status: PlanStatus,
    #[serde(default)]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionPlan {
    /// A fresh, not-yet-queued plan. Id and queue time are assigned on enqueue.
    pub fn new(
        source_text: impl Into<String>,
        intent: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<ActionStep>,
    ) -> Self {
        Self {
            id: String::new(),
            source_text: source_text.into(),
            intent: intent.into(),
            description: description.into(),
            steps,
            status: PlanStatus::Pending,
            queued_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// The first power step of the plan, nested sequences included.
    pub fn power_action(&self) -> Option<PowerAction> {
        first_power_action(&self.steps)
    }
}

fn first_power_action(steps: &[ActionStep]) -> Option<PowerAction> {
    steps.iter().find_map(|s| match &s.kind {
        StepKind::PowerCommand { action } => Some(*action),
        StepKind::RepeatSequence { sub_steps, .. } => first_power_action(sub_steps),
        _ => None,
    })
}

/// Terminal result of executing a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_serializes_with_type_tag() {
        let step = ActionStep::key_press("VOLUME_MUTE", 0xAD, "Mute volume");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["type"], "keyPress");
        assert_eq!(json["keyCode"], 0xAD);
        assert_eq!(json["description"], "Mute volume");
    }

    #[test]
    fn test_power_action_finds_nested_steps() {
        let power = ActionStep::new(
            StepKind::PowerCommand {
                action: PowerAction::Sleep,
            },
            "Sleep",
        );
        let looped = ActionStep::new(
            StepKind::RepeatSequence {
                sub_steps: vec![ActionStep::delay(100, "Wait"), power],
                stop_conditions: vec![],
                max_iterations: 1,
            },
            "Loop",
        );
        let plan = ActionPlan::new("x", intent::COMPOUND, "x", vec![ActionStep::delay(10, "Wait"), looped]);
        assert_eq!(plan.power_action(), Some(PowerAction::Sleep));

        let plain = ActionPlan::new("x", intent::COMPOUND, "x", vec![ActionStep::delay(10, "Wait")]);
        assert_eq!(plain.power_action(), None);
    }

    #[test]
    fn test_unknown_step_type_is_absorbed() {
        let json = r#"{"type":"teleport","description":"Beam me up"}"#;
        let step: ActionStep = serde_json::from_str(json).unwrap();
        assert_eq!(step.kind, StepKind::Unrecognized);
        assert_eq!(step.description, "Beam me up");
        assert_eq!(step.type_name(), "unrecognized");
    }

    #[test]
    fn test_plan_reads_camel_case_fields() {
        let json = r#"{
            "sourceText": "mute",
            "intent": "media_control",
            "description": "Mute",
            "steps": [{"type":"setVolume","level":40,"description":"Set volume"}],
            "status": "pending"
        }"#;
        let plan: ActionPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.steps[0].kind, StepKind::SetVolume { level: 40 });
        assert!(plan.id.is_empty());
        assert!(plan.queued_at.is_none());
    }

    #[test]
    fn test_power_action_lookup() {
        let plan = ActionPlan::new(
            "restart",
            intent::POWER,
            "Restart",
            vec![ActionStep::new(
                StepKind::PowerCommand {
                    action: PowerAction::Restart,
                },
                "Restart the PC",
            )],
        );
        assert_eq!(plan.power_action(), Some(PowerAction::Restart));
    }
}
