//! # Command Rules
//!
//! Ordered single-command rules. Each rule pairs a pattern over the lowercased
//! command with a builder; the first rule whose pattern matches *and* whose
//! builder accepts the captures produces the plan draft.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::catalog;
use crate::domain::keys::{self, vk};
use crate::domain::types::{
    intent, ActionPlan, ActionStep, KeyCode, MouseButton, PowerAction, StepKind, StopCondition,
};

/// Upper bound on mining iterations.
pub const MINE_MAX_ITERATIONS: u32 = 200;
/// Upper bound on movement iterations (each step holds the key for [`MOVE_STEP_MS`]).
pub const MOVE_MAX_ITERATIONS: u32 = 600;
pub const MOVE_STEP_MS: u64 = 200;

/// A command as typed, plus its lowercase form used for matching.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub lower: String,
    pub original: String,
}

impl Utterance {
    pub fn new(text: &str) -> Self {
        let original = text.trim().to_string();
        Self {
            lower: original.to_lowercase(),
            original,
        }
    }

    /// Capture group `i` in the user's original casing, when the offsets line up.
    fn original_group(&self, caps: &Captures<'_>, i: usize) -> Option<String> {
        let m = caps.get(i)?;
        if self.lower.len() == self.original.len()
            && let Some(slice) = self.original.get(m.start()..m.end())
        {
            return Some(slice.to_string());
        }
        Some(m.as_str().to_string())
    }
}

/// A matched command before it becomes a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub intent: &'static str,
    pub description: String,
    pub steps: Vec<ActionStep>,
}

impl Draft {
    fn new(intent: &'static str, description: impl Into<String>, steps: Vec<ActionStep>) -> Self {
        Self {
            intent,
            description: description.into(),
            steps,
        }
    }

    pub fn into_plan(self, source_text: &str) -> ActionPlan {
        ActionPlan::new(source_text.trim(), self.intent, self.description, self.steps)
    }
}

/// Joins drafts into one compound draft with a short pause between each.
pub fn join(drafts: Vec<Draft>) -> Draft {
    let mut steps = Vec::new();
    let mut descriptions = Vec::new();
    for (i, draft) in drafts.into_iter().enumerate() {
        if i > 0 {
            steps.push(ActionStep::delay(500, "Wait between actions"));
        }
        steps.extend(draft.steps);
        descriptions.push(draft.description);
    }
    Draft::new(intent::COMPOUND, descriptions.join(", then "), steps)
}

type Builder = fn(&Captures<'_>, &Utterance) -> Option<Draft>;

struct Rule {
    name: &'static str,
    pattern: &'static str,
    build: Builder,
}

const RULES: &[Rule] = &[
    Rule {
        name: "visual_click",
        pattern: r"^(?:(right|double)[\s-]+)?(?:click|tap)\s+(?:on\s+)?(?:the\s+)?(.+)$",
        build: visual_click,
    },
    Rule {
        name: "wait",
        pattern: r"^(?:wait|pause|delay)\s+(?:for\s+)?(\d+)\s*(seconds?|secs?|s|minutes?|mins?|ms|milliseconds?)?$",
        build: wait,
    },
    Rule {
        name: "shutdown",
        pattern: r"^(?:shut\s*down|power\s*(?:off|down)|turn\s*off)(?:\s+(?:this|the|my))?(?:\s*(?:pc|computer|machine|system))?$",
        build: shutdown,
    },
    Rule {
        name: "restart",
        pattern: r"^(?:restart|reboot)(?:\s+(?:this|the|my))?(?:\s*(?:pc|computer|machine|system))?$",
        build: restart,
    },
    Rule {
        name: "sleep",
        pattern: r"^(?:sleep|suspend)(?:\s+(?:this|the|my))?(?:\s*(?:pc|computer|machine|system))?$",
        build: sleep,
    },
    Rule {
        name: "hibernate",
        pattern: r"^hibernate(?:\s+(?:this|the|my))?(?:\s*(?:pc|computer|machine|system))?$",
        build: hibernate,
    },
    Rule {
        name: "focus_window",
        pattern: r"^(?:focus(?:\s+on)?|switch\s+to|bring\s+up|go\s+to|activate|alt[\s-]?tab\s+to)\s+(?:the\s+)?(.+)$",
        build: focus_window,
    },
    Rule {
        name: "focus_window_bring",
        pattern: r"^bring\s+(?:the\s+)?(.+?)\s+to\s+(?:the\s+)?(?:focus|front|foreground)$",
        build: focus_window,
    },
    Rule {
        name: "mine_until",
        pattern: r"^(?:mine|dig|attack|break|harvest|chop|punch)\s*(?:blocks?\s*)?(forwards?|ahead|backwards?|back|left|right|down|up)?\s+(?:unless|until|till)\s+(.+)$",
        build: mine_until,
    },
    Rule {
        name: "hold_key",
        pattern: r"^hold\s+(?:down\s+)?(\S+)(?:\s+key)?(?:\s+(?:until|till|untill)\s+(?:i\s+)?(?:press\s+|hit\s+)?(.+))?$",
        build: hold_key,
    },
    Rule {
        name: "unpause",
        pattern: r"^(?:unpause|resume)(?:\s+(?:the\s+)?game)?(?:\s+(?:in\s+)?(.+))?$",
        build: unpause,
    },
    Rule {
        name: "movement",
        pattern: r"^(?:go|move|walk|run|strafe|head)\s+(forwards?|ahead|backwards?|back|left|right)(?:\s+(?:until|till|untill)\s+(?:i\s+)?(?:press\s+|hit\s+)?(.+))?$",
        build: movement,
    },
    Rule {
        name: "play_service",
        pattern: r"^(?:play|listen\s+to|listen\s+on|start)\s+(?:(?:some|my)\s+)?(?:music\s+|songs?\s+)?(?:on\s+|from\s+)?(.+?)$",
        build: play_service,
    },
    Rule {
        name: "open_app",
        pattern: r"^(?:open|launch|start|run)\s+(?:the\s+)?(.+?)(?:\s+app(?:lication)?)?$",
        build: open_app,
    },
    Rule {
        name: "close_window",
        pattern: r"^close\s+(?:the\s+)?(?:window|this|app|it|application|current\s+window)$",
        build: close_window,
    },
    Rule {
        name: "mute",
        pattern: r"^(?:mute|unmute|toggle mute|(?:un)?mute (?:my |the )?(?:pc|computer|sound|audio|volume|speakers?))$",
        build: mute,
    },
    Rule {
        name: "volume_up",
        pattern: r"^(?:volume up|turn up the (?:volume|sound|audio)|(?:increase|raise|louder|turn up)(?: (?:the )?(?:volume|sound|audio))?)$",
        build: volume_up,
    },
    Rule {
        name: "volume_down",
        pattern: r"^(?:volume down|turn down the (?:volume|sound|audio)|(?:decrease|lower|quieter|turn down)(?: (?:the )?(?:volume|sound|audio))?)$",
        build: volume_down,
    },
    Rule {
        name: "play_pause",
        pattern: r"^(?:play|pause|play/pause|resume|toggle play|pause music|play music|resume music)$",
        build: play_pause,
    },
    Rule {
        name: "next_track",
        pattern: r"^(?:next(?: track| song)?|skip(?: track| song)?|next music)$",
        build: next_track,
    },
    Rule {
        name: "previous_track",
        pattern: r"^(?:prev(?:ious)?(?: track| song)?|go back(?: a)?(?: track| song)?|last track|last song)$",
        build: previous_track,
    },
    Rule {
        name: "stop_media",
        pattern: r"^stop(?: media| music| playback)?$",
        build: stop_media,
    },
    Rule {
        name: "brightness_up",
        pattern: r"^(?:(?:increase|raise|turn up|brighten)(?: (?:the )?(?:brightness|screen))?|brightness up|brighter)$",
        build: brightness,
    },
    Rule {
        name: "brightness_down",
        pattern: r"^(?:(?:decrease|lower|turn down|dim)(?: (?:the )?(?:brightness|screen))?|brightness down|dimmer)$",
        build: brightness,
    },
    Rule {
        name: "volume_set",
        pattern: r"^(?:(?:set|turn|change|put|make|adjust)\s+(?:the\s+)?volume\s+(?:to|at)|volume(?:\s+(?:to|at))?)\s*(\d+)\s*%?(?:\s*percent)?$",
        build: volume_set,
    },
    Rule {
        name: "hotkey",
        pattern: r"^(?:press|hit|tap)\s+(?:the\s+)?(.+?)(?:\s+key)?$",
        build: hotkey,
    },
    Rule {
        name: "type_text",
        pattern: r"^(?:type|write|enter\s+text|input)\s+(.+)$",
        build: type_text,
    },
    Rule {
        name: "search_web",
        pattern: r"^(?:search(?:\s+the\s+web)?(?:\s+for)?|google|look\s+up|bing)\s+(.+)$",
        build: search_web,
    },
    Rule {
        name: "system_command",
        pattern: r"^(copy|paste|cut|undo|redo|save|select all|find|new tab|close tab|refresh|minimize|maximize|switch window|switch app|screenshot|snip|lock|lock screen|show desktop|desktop|task view|emoji|clipboard)$",
        build: system_command,
    },
];

struct CompiledRule {
    name: &'static str,
    regex: Regex,
    build: Builder,
}

static COMPILED: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|rule| CompiledRule {
            name: rule.name,
            regex: Regex::new(rule.pattern).unwrap(),
            build: rule.build,
        })
        .collect()
});

/// Runs the rule table against one command. First accepted match wins.
pub fn match_single(utterance: &Utterance) -> Option<Draft> {
    COMPILED.iter().find_map(|rule| {
        let caps = rule.regex.captures(&utterance.lower)?;
        let draft = (rule.build)(&caps, utterance)?;
        tracing::debug!("Rule '{}' matched \"{}\"", rule.name, utterance.lower);
        Some(draft)
    })
}

/// Name of the rule that would handle `text`.
pub fn rule_for(text: &str) -> Option<&'static str> {
    let utterance = Utterance::new(text);
    COMPILED.iter().find_map(|rule| {
        let caps = rule.regex.captures(&utterance.lower)?;
        (rule.build)(&caps, &utterance).map(|_| rule.name)
    })
}

static VISUAL_CONDITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:you\s+)?(?:see|spot|detect|notice|find|there\s+is|there's)\s+(?:any\s+|some\s+|the\s+|a\s+|an\s+)?(.+)$")
        .unwrap()
});
static KEY_CONDITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:i\s+)?(?:press(?:es)?|hit|tap)\s+(?:the\s+)?(.+?)(?:\s+key)?$").unwrap()
});
static CONDITION_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+(?:or|and)\s+").unwrap());
static CONVERSATIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:type|write|enter\s+text|input)\s+(?:a|an|me|some|the|this|that|my|our|about|out|up|down|",
        r"code|script|program|function|class|method|essay|email|letter|story|poem|song|paragraph|",
        r"summary|report|document|list|guide|tutorial|example|test|html|css|json|javascript|python|",
        r"java|sql|query|app|application|file|page|template|blog|article|response|reply|message|",
        r"instructions|recipe|plan|review|analysis|description|explanation|api|readme|documentation|",
        r"comment|note)\b"
    ))
    .unwrap()
});

fn escape_condition() -> StopCondition {
    StopCondition::key("Escape", vk::ESCAPE)
}

/// Escape always ends a loop, whatever else the user asked for.
fn ensure_escape(conditions: &mut Vec<StopCondition>) {
    let has_escape = conditions
        .iter()
        .any(|c| matches!(c, StopCondition::KeyPress { key_code, .. } if *key_code == vk::ESCAPE));
    if !has_escape {
        conditions.push(escape_condition());
    }
}

/// Spoken stop key; anything unrecognised (or "stop"/"done") means Escape.
fn stop_key(spoken: &str) -> (String, KeyCode) {
    let name = spoken
        .trim()
        .trim_start_matches("the ")
        .trim_end_matches(" key")
        .trim();
    match keys::resolve(name) {
        Some(code) if !matches!(name, "stop" | "done" | "quit") => (keys::display_name(name), code),
        _ => ("Escape".to_string(), vk::ESCAPE),
    }
}

fn parse_stop_conditions(text: &str) -> Vec<StopCondition> {
    let mut conditions = Vec::new();
    for part in CONDITION_SPLIT.split(text) {
        let part = part.trim();
        if let Some(caps) = VISUAL_CONDITION.captures(part) {
            conditions.push(StopCondition::color(catalog::color_profile(caps[1].trim())));
        } else if let Some(caps) = KEY_CONDITION.captures(part) {
            let (key, key_code) = stop_key(&caps[1]);
            conditions.push(StopCondition::key(key, key_code));
        } else if matches!(part, "stop" | "done" | "i say stop" | "escape" | "esc") {
            conditions.push(escape_condition());
        } else {
            tracing::debug!("Ignoring stop condition \"{}\"", part);
        }
    }
    ensure_escape(&mut conditions);
    conditions
}

fn describe_conditions(conditions: &[StopCondition]) -> String {
    conditions
        .iter()
        .map(StopCondition::describe)
        .collect::<Vec<_>>()
        .join(" or ")
}

fn canonical_direction(word: Option<&str>) -> &'static str {
    match word {
        Some("backward" | "backwards" | "back") => "backward",
        Some("left") => "left",
        Some("right") => "right",
        Some("down") => "down",
        Some("up") => "up",
        _ => "forward",
    }
}

fn hold_click(duration_ms: u64, description: &str) -> ActionStep {
    ActionStep::new(
        StepKind::HoldClick {
            button: MouseButton::Left,
            duration_ms,
        },
        description,
    )
}

fn mining_steps(direction: &str) -> Vec<ActionStep> {
    match direction {
        "down" | "up" => {
            let dy = if direction == "down" { 300 } else { -300 };
            vec![
                ActionStep::new(StepKind::MouseMove { dx: 0, dy }, format!("Look {direction}")),
                ActionStep::delay(100, "Settle aim"),
                hold_click(1500, "Mine block"),
                ActionStep::delay(200, "Pause after mining"),
            ]
        }
        _ => {
            let step = keys::movement(direction).unwrap_or(keys::Movement {
                key: "W",
                key_code: 0x57,
                label: "move forward",
            });
            vec![
                hold_click(1200, "Mine block ahead"),
                ActionStep::delay(200, "Pause after mining"),
                ActionStep::new(
                    StepKind::KeyPress {
                        key: step.key.to_string(),
                        key_code: step.key_code,
                        hold_ms: Some(250),
                    },
                    format!("Step {direction} ({})", step.key),
                ),
                ActionStep::delay(200, "Pause after stepping"),
            ]
        }
    }
}

fn browser_steps(address: &str, what: &str) -> Vec<ActionStep> {
    vec![
        ActionStep::new(
            StepKind::LaunchApp {
                app: catalog::app_name("edge"),
                path: None,
            },
            "Open browser",
        ),
        ActionStep::delay(2000, "Wait for browser"),
        ActionStep::new(
            StepKind::Hotkey {
                keys: vec!["Ctrl".into(), "L".into()],
                key_codes: vec![vk::CONTROL, 0x4C],
            },
            "Focus address bar",
        ),
        ActionStep::delay(300, "Wait for address bar"),
        ActionStep::type_text(address, format!("Type {what}")),
        ActionStep::key_press("Enter", vk::RETURN, "Press Enter"),
    ]
}

fn preview(text: &str) -> String {
    const MAX: usize = 40;
    if text.chars().count() <= MAX {
        return text.to_string();
    }
    let head: String = text.chars().take(MAX).collect();
    format!("{head}...")
}

// ---- builders ----

fn visual_click(caps: &Captures<'_>, u: &Utterance) -> Option<Draft> {
    let modifier = caps.get(1).map(|m| m.as_str());
    let raw = u.original_group(caps, 2)?;
    let mut target = raw.trim().trim_matches(['"', '\'']).trim();
    if let Some(at) = target.len().checked_sub(" button".len())
        && at > 0
        && target.get(at..).is_some_and(|tail| tail.eq_ignore_ascii_case(" button"))
    {
        target = target[..at].trim_end();
    }
    if target.is_empty() {
        return None;
    }
    let button = match modifier {
        Some("right") => MouseButton::Right,
        _ => MouseButton::Left,
    };
    let click = |description: String| {
        ActionStep::new(
            StepKind::VisualClick {
                target: target.to_string(),
                button,
            },
            description,
        )
    };
    let mut steps = vec![click(format!("Find and click \"{target}\""))];
    let label = match modifier {
        Some("right") => "Right-clicking",
        Some("double") => {
            steps.push(ActionStep::delay(80, "Double-click interval"));
            steps.push(click(format!("Click \"{target}\" again")));
            "Double-clicking"
        }
        _ => "Clicking",
    };
    Some(Draft::new(
        intent::VISUAL_CLICK,
        format!("{label} \"{target}\""),
        steps,
    ))
}

fn wait(caps: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    let amount: u64 = caps[1].parse().ok()?;
    let unit = caps.get(2).map_or("seconds", |m| m.as_str());
    let plural = if amount == 1 { "" } else { "s" };
    let (duration_ms, label) = if unit == "ms" || unit.starts_with("milli") {
        (amount, format!("{amount} millisecond{plural}"))
    } else if unit.starts_with("min") {
        (amount.checked_mul(60_000)?, format!("{amount} minute{plural}"))
    } else {
        (amount.checked_mul(1000)?, format!("{amount} second{plural}"))
    };
    Some(Draft::new(
        intent::WAIT,
        format!("Waiting {label}"),
        vec![ActionStep::delay(duration_ms, format!("Wait {label}"))],
    ))
}

fn power(action: PowerAction) -> Option<Draft> {
    let description = match action {
        PowerAction::Shutdown => "Shutting down PC",
        PowerAction::Restart => "Restarting PC",
        PowerAction::Sleep => "Putting PC to sleep",
        PowerAction::Hibernate => "Hibernating PC",
    };
    Some(Draft::new(
        intent::POWER,
        description,
        vec![ActionStep::new(
            StepKind::PowerCommand { action },
            format!("Power: {}", action.as_str()),
        )],
    ))
}

fn shutdown(_: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    power(PowerAction::Shutdown)
}

fn restart(_: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    power(PowerAction::Restart)
}

fn sleep(_: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    power(PowerAction::Sleep)
}

fn hibernate(_: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    power(PowerAction::Hibernate)
}

fn focus_window(caps: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    let app = caps[1]
        .trim()
        .trim_end_matches(" window")
        .trim_end_matches(" application")
        .trim_end_matches(" app")
        .trim();
    if app.is_empty() {
        return None;
    }
    let title = catalog::window_title(app);
    Some(Draft::new(
        intent::FOCUS_WINDOW,
        format!("Focusing {title}"),
        vec![ActionStep::new(
            StepKind::FocusWindow {
                window_title: title.clone(),
            },
            format!("Bring {title} to the foreground"),
        )],
    ))
}

fn mine_until(caps: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    let direction = canonical_direction(caps.get(1).map(|m| m.as_str()));
    let stop_conditions = parse_stop_conditions(&caps[2]);
    let stops = describe_conditions(&stop_conditions);
    Some(Draft::new(
        intent::GAME_ACTION,
        format!("Mining {direction} until {stops}"),
        vec![ActionStep::new(
            StepKind::RepeatSequence {
                sub_steps: mining_steps(direction),
                stop_conditions,
                max_iterations: MINE_MAX_ITERATIONS,
            },
            format!("Repeat: mine {direction} until {stops}"),
        )],
    ))
}

fn hold_key(caps: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    let name = caps[1].trim();
    let key_code = keys::resolve(name)?;
    let key = keys::display_name(name);
    let (until_key, until_key_code) = caps
        .get(2)
        .map(|m| stop_key(m.as_str()))
        .unwrap_or_else(|| ("Escape".to_string(), vk::ESCAPE));
    Some(Draft::new(
        intent::HOLD_KEY,
        format!("Holding {key} until {until_key} is pressed"),
        vec![ActionStep::new(
            StepKind::HoldKey {
                key: key.clone(),
                key_code,
                until_key: until_key.clone(),
                until_key_code,
            },
            format!("Hold {key} until {until_key}"),
        )],
    ))
}

fn unpause(caps: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    let escape = ActionStep::key_press("Escape", vk::ESCAPE, "Press Escape to unpause");
    match caps.get(1).map(|m| m.as_str().trim()) {
        // "resume music" and friends are media controls
        Some("music" | "playback" | "song" | "the music") => None,
        Some(app) if !app.is_empty() => {
            let title = catalog::window_title(app);
            Some(Draft::new(
                intent::GAME_ACTION,
                format!("Unpausing {title}"),
                vec![
                    ActionStep::new(
                        StepKind::FocusWindow {
                            window_title: title.clone(),
                        },
                        format!("Bring {title} to the foreground"),
                    ),
                    ActionStep::delay(500, "Wait for window focus"),
                    escape,
                ],
            ))
        }
        _ => Some(Draft::new(intent::GAME_ACTION, "Unpausing game", vec![escape])),
    }
}

fn movement(caps: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    let step = keys::movement(&caps[1])?;
    let mut stop_conditions = Vec::new();
    if let Some(m) = caps.get(2) {
        let (key, key_code) = stop_key(m.as_str());
        stop_conditions.push(StopCondition::key(key, key_code));
    }
    ensure_escape(&mut stop_conditions);
    let stops = describe_conditions(&stop_conditions);
    let label = step.label;
    Some(Draft::new(
        intent::GAME_ACTION,
        format!("Moving: {label} until {stops}"),
        vec![ActionStep::new(
            StepKind::RepeatSequence {
                sub_steps: vec![ActionStep::new(
                    StepKind::KeyPress {
                        key: step.key.to_string(),
                        key_code: step.key_code,
                        hold_ms: Some(MOVE_STEP_MS),
                    },
                    format!("{label} ({})", step.key),
                )],
                stop_conditions,
                max_iterations: MOVE_MAX_ITERATIONS,
            },
            format!("Repeat: {label} until {stops}"),
        )],
    ))
}

fn play_service(caps: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    let name = caps[1].trim().trim_end_matches(" and play").trim();
    let service = catalog::music_service(name)?;
    let mut steps = browser_steps(service.url, &format!("{} address", service.title));
    steps.push(ActionStep::delay(
        service.load_ms,
        format!("Wait for {} to load", service.title),
    ));
    let (key, key_code) = service.play_key;
    steps.push(ActionStep::key_press(key, key_code, "Start playback"));
    Some(Draft::new(
        intent::PLAY_MUSIC,
        format!("Playing music on {}", service.title),
        steps,
    ))
}

fn open_app(caps: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    let spoken = caps[1].trim();
    if spoken.is_empty() {
        return None;
    }
    let app = catalog::app_name(spoken);
    Some(Draft::new(
        intent::OPEN_APP,
        format!("Opening {app}"),
        vec![ActionStep::new(
            StepKind::LaunchApp {
                app: app.clone(),
                path: None,
            },
            format!("Launch {app}"),
        )],
    ))
}

fn close_window(_: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    Some(Draft::new(
        intent::CLOSE_WINDOW,
        "Closing the active window",
        vec![ActionStep::new(
            StepKind::Hotkey {
                keys: vec!["Alt".into(), "F4".into()],
                key_codes: vec![vk::ALT, vk::F4],
            },
            "Alt+F4",
        )],
    ))
}

fn media(description: &str, key: &str, key_code: KeyCode, presses: usize) -> Option<Draft> {
    let steps = (0..presses)
        .map(|_| ActionStep::key_press(key, key_code, format!("Press {key}")))
        .collect();
    Some(Draft::new(intent::MEDIA_CONTROL, description, steps))
}

fn mute(_: &Captures<'_>, u: &Utterance) -> Option<Draft> {
    let description = if u.lower.starts_with("unmute") {
        "Unmuting audio (toggle mute)"
    } else {
        "Muting audio"
    };
    media(description, "VolumeMute", vk::VOLUME_MUTE, 1)
}

fn volume_up(_: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    media("Turning volume up", "VolumeUp", vk::VOLUME_UP, 5)
}

fn volume_down(_: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    media("Turning volume down", "VolumeDown", vk::VOLUME_DOWN, 5)
}

fn play_pause(_: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    media("Toggling play/pause", "MediaPlayPause", vk::MEDIA_PLAY_PAUSE, 1)
}

fn next_track(_: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    media("Skipping to next track", "MediaNextTrack", vk::MEDIA_NEXT_TRACK, 1)
}

fn previous_track(_: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    media("Going to previous track", "MediaPrevTrack", vk::MEDIA_PREV_TRACK, 1)
}

fn stop_media(_: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    media("Stopping media playback", "MediaStop", vk::MEDIA_STOP, 1)
}

fn brightness(_: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    Some(Draft::new(
        intent::SYSTEM_COMMAND,
        "Opening Quick Settings for brightness",
        vec![ActionStep::new(
            StepKind::Hotkey {
                keys: vec!["Win".into(), "A".into()],
                key_codes: vec![vk::LWIN, 0x41],
            },
            "Open Quick Settings (Win+A)",
        )],
    ))
}

fn volume_set(caps: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    // Out-of-range and overlong numbers both clamp to 100.
    let level = caps[1].parse::<u64>().map_or(100, |n| n.min(100)) as u8;
    Some(Draft::new(
        intent::VOLUME_SET,
        format!("Setting volume to {level}%"),
        vec![ActionStep::new(
            StepKind::SetVolume { level },
            format!("Set volume to {level}%"),
        )],
    ))
}

fn hotkey(caps: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    let combo = caps[1].trim();
    if combo.contains('+') {
        let names: Vec<&str> = combo.split('+').map(str::trim).collect();
        let key_codes = names
            .iter()
            .map(|name| keys::resolve(name))
            .collect::<Option<Vec<_>>>()?;
        let display: Vec<String> = names.iter().map(|name| keys::display_name(name)).collect();
        let label = display.join("+");
        return Some(Draft::new(
            intent::HOTKEY,
            format!("Pressing {label}"),
            vec![ActionStep::new(
                StepKind::Hotkey {
                    keys: display,
                    key_codes,
                },
                format!("Press {label}"),
            )],
        ));
    }
    let key_code = keys::resolve(combo)?;
    let key = keys::display_name(combo);
    Some(Draft::new(
        intent::KEY_PRESS,
        format!("Pressing {key}"),
        vec![ActionStep::key_press(&key, key_code, format!("Press {key}"))],
    ))
}

fn type_text(caps: &Captures<'_>, u: &Utterance) -> Option<Draft> {
    if CONVERSATIONAL.is_match(&u.lower) {
        return None;
    }
    let text = u.original_group(caps, 1)?;
    let shown = preview(&text);
    Some(Draft::new(
        intent::TYPE_TEXT,
        format!("Typing \"{shown}\""),
        vec![ActionStep::type_text(text, format!("Type \"{shown}\""))],
    ))
}

fn search_web(caps: &Captures<'_>, u: &Utterance) -> Option<Draft> {
    let query = u.original_group(caps, 1)?;
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    Some(Draft::new(
        intent::SEARCH_WEB,
        format!("Searching the web for \"{}\"", preview(query)),
        browser_steps(query, "search query"),
    ))
}

fn system_command(caps: &Captures<'_>, _: &Utterance) -> Option<Draft> {
    let shortcut = catalog::shortcut(&caps[1])?;
    Some(Draft::new(
        intent::SYSTEM_COMMAND,
        shortcut.label,
        vec![ActionStep::new(
            StepKind::Hotkey {
                keys: shortcut.keys.iter().map(|k| k.to_string()).collect(),
                key_codes: shortcut.key_codes.to_vec(),
            },
            shortcut.label,
        )],
    ))
}
