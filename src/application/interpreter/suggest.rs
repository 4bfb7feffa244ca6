//! Hints for text that mentions an action but matched no rule.

use regex::Regex;
use std::sync::LazyLock;

const HINTS: &[(&str, &str)] = &[
    (r"\b(?:volume|sound|audio|loud|quiet)\b", r#"Try: "mute", "unmute", "volume up", "volume down", or "set volume to 50""#),
    (r"\b(?:mute|unmute|silence)\b", r#"Try: "mute" or "unmute""#),
    (r"\b(?:brightness|bright|dim|screen)\b", r#"Try: "brightness up" or "brightness down""#),
    (r"\b(?:play|pause|resume|stop|skip|next|previous|track|song|music)\b", r#"Try: "play", "pause", "next track", "previous track", "stop music", or "play spotify" to open a music service"#),
    (r"\b(?:open|launch|start|run)\b.*\b(?:app|application|program|browser|notepad|chrome|edge|firefox|explorer|settings|terminal|calculator|spotify|discord)\b", r#"Try: "open [app name]", e.g. "open edge", "open notepad""#),
    (r"\b(?:focus|switch to|bring up|activate|alt.?tab)\b", r#"Try: "focus [app name]", e.g. "focus minecraft", "switch to chrome""#),
    (r"\b(?:unpause|resume game)\b", r#"Try: "unpause minecraft" or "unpause" to press Escape"#),
    (r"\b(?:go forward|go backward|walk|strafe|move forward|move backward)\b", r#"Try: "go forward until escape" or "go left until I press space""#),
    (r"\bhold\b.*\b(?:key|until)\b", r#"Try: "hold w until escape""#),
    (r"\b(?:mine|dig|break|harvest|chop|attack)\b", r#"Try: "mine forward unless you see lava or I press escape""#),
    (r"\b(?:close|exit|quit)\b.*\b(?:window|app|this|application)\b", r#"Try: "close window""#),
    (r"\b(?:copy|paste|cut|undo|redo|save|select all|find)\b", r#"Say the command directly, e.g. "copy", "paste", "undo", "save""#),
    (r"\b(?:screenshot|snip|screen\s*shot|capture)\b", r#"Try: "screenshot""#),
    (r"\b(?:lock|lock\s*screen)\b", r#"Try: "lock" or "lock screen""#),
    (r"\b(?:minimize|maximize|desktop)\b", r#"Try: "minimize", "maximize", or "show desktop""#),
    (r"\b(?:search|google|look\s*up|bing)\b", r#"Try: "search for [query]", e.g. "search for weather""#),
    (r"\b(?:type|write|enter)\b.*\b(?:text|word|message)\b", r#"Try: "type [text]", e.g. "type hello world""#),
    (r"\b(?:press|hit|tap)\b.*\b(?:key|button|enter|escape|tab)\b", r#"Try: "press [key]", e.g. "press enter", "press ctrl+c""#),
    (r"\b(?:click|tap)\b.*\b(?:button|link|icon|text|word)\b", r#"Try: "click [text on screen]", e.g. "click Submit""#),
];

static COMPILED: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    HINTS
        .iter()
        .map(|(pattern, hint)| (Regex::new(pattern).unwrap(), *hint))
        .collect()
});

/// A usage hint for unmatched text that looks like it wanted an action.
pub fn suggest(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    COMPILED
        .iter()
        .find(|(pattern, _)| pattern.is_match(&lower))
        .map(|(_, hint)| *hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest_finds_first_hint() {
        assert_eq!(
            suggest("the sound is too quiet"),
            Some(r#"Try: "mute", "unmute", "volume up", "volume down", or "set volume to 50""#)
        );
        assert_eq!(suggest("can you lock my pc?"), Some(r#"Try: "lock" or "lock screen""#));
        assert!(suggest("tell me a joke").is_none());
    }

    #[test]
    fn test_all_hint_patterns_compile() {
        assert_eq!(COMPILED.len(), HINTS.len());
    }
}
