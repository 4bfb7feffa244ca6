//! # Interpreter
//!
//! Turns a free-form command ("Hey Stephen, open notepad and type hello") into an
//! [`ActionPlan`], or `None` when the text is ordinary chat.
//!
//! Pipeline: wake-word stripping, trailing punctuation removal, compound
//! splitting, then the ordered rule table in [`rules`]. Deterministic: the same
//! text always yields the same plan.

pub mod catalog;
pub mod rules;
mod suggest;

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::application::parsing;
use crate::domain::traits::Advisor;
use crate::domain::types::ActionPlan;
use crate::strings::prompts;
use rules::{Draft, Utterance};

pub use suggest::suggest;

const ACTION_VERBS: &str = "play|pause|stop|next|skip|previous|open|launch|start|run|close|press|\
click|tap|type|search|mute|unmute|set|lock|sleep|shut|hold|go|move|walk|mine|dig|focus|switch|\
wait|listen|volume|turn|restart|hibernate|unpause|resume";

static WAKE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:hey\s+|ok\s+|okay\s+|yo\s+)?([a-z]+)[,!.;:\s]+").unwrap());
/// Leading words that modify the verb after them and are never a name.
const VERB_MODIFIERS: &[&str] = &[
    "right", "left", "double", "triple", "increase", "raise", "lower", "decrease", "louder",
    "quieter", "toggle",
];

static BARE_GREETING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:hey|ok|okay|yo)[,!.;:\s]+").unwrap());
static STARTS_WITH_VERB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)^(?:{ACTION_VERBS})\b")).unwrap());
static TRAILING_PUNCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.,!?;:]+$").unwrap());

static WORD_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:and|then|also|&)\s+").unwrap());
static COMMA_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s+").unwrap());
static COMPOUND_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:wait|open|launch|start|run|click|tap|press|close|type|search|mute|unmute|set|lock|sleep|shut|play|pause|stop|next|skip|focus|switch|hold|go|move|walk|unpause|resume|mine|dig|attack|break|harvest|chop|punch)\b",
    )
    .unwrap()
});

static SENTENCE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!;]\s+").unwrap());
const MULTI_STEP_VERBS: &[&str] = &[
    "open", "launch", "start", "run", "click", "tap", "press", "wait", "pause", "delay", "close",
    "type", "search", "mute", "unmute", "play", "stop", "minimize", "maximize", "lock",
    "screenshot", "set volume", "focus", "switch", "hold", "go", "move", "walk", "unpause",
    "resume", "mine", "dig", "attack", "break", "harvest", "chop", "punch",
];

/// Strips an addressed name ("Stephen, ...", "hey computer ...") and trailing punctuation.
///
/// The name is only dropped when what follows starts with an action verb and the
/// name itself is not one, so "click play" and "stop playing" are left alone.
/// Modifiers such as "right" in "right click" are kept too.
pub fn normalize(text: &str) -> String {
    let text = text.trim();
    let mut cleaned = text;

    if let Some(caps) = WAKE_PREFIX.captures(text) {
        let remainder = text[caps[0].len()..].trim();
        let name = &caps[1];
        let is_modifier = VERB_MODIFIERS.iter().any(|m| name.eq_ignore_ascii_case(m));
        if !is_modifier && !STARTS_WITH_VERB.is_match(name) && STARTS_WITH_VERB.is_match(remainder) {
            cleaned = remainder;
        }
    }
    if cleaned == text
        && let Some(m) = BARE_GREETING.find(text)
    {
        let remainder = text[m.end()..].trim();
        if STARTS_WITH_VERB.is_match(remainder) {
            cleaned = remainder;
        }
    }

    TRAILING_PUNCT.replace(cleaned, "").trim().to_string()
}

/// Splits on "and"/"then"/"also"/"&", and on commas that are followed by an action verb.
fn split_compound(text: &str) -> Vec<&str> {
    let mut cuts: Vec<(usize, usize)> = WORD_SEPARATOR
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();
    cuts.extend(
        COMMA_SEPARATOR
            .find_iter(text)
            .filter(|m| COMPOUND_VERB.is_match(&text[m.end()..]))
            .map(|m| (m.start(), m.end())),
    );
    cuts.sort_unstable();

    let mut parts = Vec::new();
    let mut pos = 0;
    for (start, end) in cuts {
        if start < pos {
            continue;
        }
        parts.push(&text[pos..start]);
        pos = end;
    }
    parts.push(&text[pos..]);

    parts
        .into_iter()
        .map(|p| p.trim().trim_end_matches(',').trim())
        .filter(|p| !p.is_empty())
        .collect()
}

/// A compound plan needs at least two fragments that match on their own.
/// Fragments that match nothing are dropped.
fn detect_compound(text: &str) -> Option<Draft> {
    let parts = split_compound(text);
    if parts.len() < 2 {
        return None;
    }
    let drafts: Vec<Draft> = parts
        .iter()
        .filter_map(|part| rules::match_single(&Utterance::new(part)))
        .collect();
    if drafts.len() < 2 {
        return None;
    }
    tracing::debug!("Compound command: {} of {} fragments matched", drafts.len(), parts.len());
    Some(rules::join(drafts))
}

/// Deterministic command detection.
pub fn detect(text: &str) -> Option<ActionPlan> {
    let cleaned = normalize(text);
    if cleaned.is_empty() {
        return None;
    }
    let draft = detect_compound(&cleaned).or_else(|| rules::match_single(&Utterance::new(&cleaned)))?;
    tracing::info!("Detected {} action: {}", draft.intent, draft.description);
    Some(draft.into_plan(text))
}

/// True when the text has two or more sentences that each start with an action verb.
pub fn looks_like_multi_step(text: &str) -> bool {
    let lower = text.to_lowercase();
    let sentences: Vec<&str> = SENTENCE_BREAK
        .split(&lower)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.len() < 2 {
        return false;
    }
    let action_count = sentences
        .iter()
        .filter(|s| MULTI_STEP_VERBS.iter().any(|verb| s.starts_with(verb)))
        .count();
    action_count >= 2
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SplitReply {
    is_action: bool,
    #[serde(default)]
    actions: Vec<String>,
}

/// Asks the advisor to split `text` into simple commands, then runs each through
/// the rule table. Advisor errors and unusable replies yield `None`.
pub async fn detect_with_advisor(text: &str, advisor: &dyn Advisor) -> Option<ActionPlan> {
    let reply = match advisor.complete(text, prompts::SPLIT_ACTIONS_PROMPT).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!("Advisor split failed: {}", e);
            return None;
        }
    };
    let parsed: SplitReply = parsing::parse_reply(&reply)?;
    if !parsed.is_action || parsed.actions.is_empty() {
        tracing::debug!("Advisor says this is not an action");
        return None;
    }
    tracing::info!("Advisor split into {} actions: {:?}", parsed.actions.len(), parsed.actions);

    let drafts: Vec<Draft> = parsed
        .actions
        .iter()
        .filter_map(|action| {
            let draft = rules::match_single(&Utterance::new(action));
            if draft.is_none() {
                tracing::debug!("No rule for advisor action \"{}\"", action);
            }
            draft
        })
        .collect();
    if drafts.is_empty() {
        return None;
    }
    Some(rules::join(drafts).into_plan(text))
}
