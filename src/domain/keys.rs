//! # Virtual Keys
//!
//! Windows virtual-key codes and the spoken-name lookup used when turning
//! commands like "press ctrl+c" or "hold w" into key events.

use crate::domain::types::KeyCode;

pub mod vk {
    use crate::domain::types::KeyCode;

    pub const BACK: KeyCode = 0x08;
    pub const TAB: KeyCode = 0x09;
    pub const RETURN: KeyCode = 0x0D;
    pub const SHIFT: KeyCode = 0x10;
    pub const CONTROL: KeyCode = 0x11;
    pub const ALT: KeyCode = 0x12;
    pub const PAUSE: KeyCode = 0x13;
    pub const CAPSLOCK: KeyCode = 0x14;
    pub const ESCAPE: KeyCode = 0x1B;
    pub const SPACE: KeyCode = 0x20;
    pub const PAGEUP: KeyCode = 0x21;
    pub const PAGEDOWN: KeyCode = 0x22;
    pub const END: KeyCode = 0x23;
    pub const HOME: KeyCode = 0x24;
    pub const LEFT: KeyCode = 0x25;
    pub const UP: KeyCode = 0x26;
    pub const RIGHT: KeyCode = 0x27;
    pub const DOWN: KeyCode = 0x28;
    pub const PRINTSCREEN: KeyCode = 0x2C;
    pub const INSERT: KeyCode = 0x2D;
    pub const DELETE: KeyCode = 0x2E;
    pub const LWIN: KeyCode = 0x5B;
    pub const F1: KeyCode = 0x70;
    pub const F4: KeyCode = 0x73;
    pub const F5: KeyCode = 0x74;
    pub const VOLUME_MUTE: KeyCode = 0xAD;
    pub const VOLUME_DOWN: KeyCode = 0xAE;
    pub const VOLUME_UP: KeyCode = 0xAF;
    pub const MEDIA_NEXT_TRACK: KeyCode = 0xB0;
    pub const MEDIA_PREV_TRACK: KeyCode = 0xB1;
    pub const MEDIA_STOP: KeyCode = 0xB2;
    pub const MEDIA_PLAY_PAUSE: KeyCode = 0xB3;
}

/// Spoken key names, lowercase.
const KEY_NAMES: &[(&str, KeyCode)] = &[
    ("enter", vk::RETURN),
    ("return", vk::RETURN),
    ("tab", vk::TAB),
    ("escape", vk::ESCAPE),
    ("esc", vk::ESCAPE),
    ("backspace", vk::BACK),
    ("delete", vk::DELETE),
    ("del", vk::DELETE),
    ("space", vk::SPACE),
    ("shift", vk::SHIFT),
    ("ctrl", vk::CONTROL),
    ("control", vk::CONTROL),
    ("alt", vk::ALT),
    ("win", vk::LWIN),
    ("windows", vk::LWIN),
    ("lwin", vk::LWIN),
    ("super", vk::LWIN),
    ("up", vk::UP),
    ("down", vk::DOWN),
    ("left", vk::LEFT),
    ("right", vk::RIGHT),
    ("home", vk::HOME),
    ("end", vk::END),
    ("pageup", vk::PAGEUP),
    ("pagedown", vk::PAGEDOWN),
    ("insert", vk::INSERT),
    ("capslock", vk::CAPSLOCK),
    ("printscreen", vk::PRINTSCREEN),
    ("pause", vk::PAUSE),
    ("volumemute", vk::VOLUME_MUTE),
    ("volumedown", vk::VOLUME_DOWN),
    ("volumeup", vk::VOLUME_UP),
    ("medianext", vk::MEDIA_NEXT_TRACK),
    ("mediaprev", vk::MEDIA_PREV_TRACK),
    ("mediastop", vk::MEDIA_STOP),
    ("mediaplaypause", vk::MEDIA_PLAY_PAUSE),
];

/// Looks up a named key ("enter", "ctrl", "f5", ...).
pub fn named(name: &str) -> Option<KeyCode> {
    if let Some(&(_, code)) = KEY_NAMES.iter().find(|(n, _)| *n == name) {
        return Some(code);
    }
    // f1..f12
    let n: u8 = name.strip_prefix('f')?.parse().ok()?;
    (1..=12).contains(&n).then(|| vk::F1 + n - 1)
}

/// Maps a single printable character to its key code.
pub fn char_to_vk(ch: char) -> Option<KeyCode> {
    let upper = ch.to_ascii_uppercase();
    if upper.is_ascii_uppercase() || upper.is_ascii_digit() {
        return Some(upper as KeyCode);
    }
    match ch {
        ' ' => Some(vk::SPACE),
        '.' => Some(0xBE),
        ',' => Some(0xBC),
        ';' => Some(0xBA),
        '/' => Some(0xBF),
        '\\' => Some(0xDC),
        '[' => Some(0xDB),
        ']' => Some(0xDD),
        '-' => Some(0xBD),
        '=' => Some(0xBB),
        '\'' => Some(0xDE),
        '`' => Some(0xC0),
        _ => None,
    }
}

/// Named key first, then a single character.
pub fn resolve(name: &str) -> Option<KeyCode> {
    named(name).or_else(|| {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => char_to_vk(ch),
            _ => None,
        }
    })
}

/// "ctrl" -> "Ctrl", "c" -> "C".
pub fn display_name(name: &str) -> String {
    if name.chars().count() == 1 {
        return name.to_uppercase();
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// WASD movement key for a direction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Movement {
    pub key: &'static str,
    pub key_code: KeyCode,
    pub label: &'static str,
}

pub fn movement(direction: &str) -> Option<Movement> {
    let (key, key_code, label) = match direction {
        "forward" | "forwards" | "ahead" => ("W", 0x57, "move forward"),
        "backward" | "backwards" | "back" => ("S", 0x53, "move backward"),
        "left" => ("A", 0x41, "strafe left"),
        "right" => ("D", 0x44, "strafe right"),
        _ => return None,
    };
    Some(Movement {
        key,
        key_code,
        label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_keys() {
        assert_eq!(named("enter"), Some(0x0D));
        assert_eq!(named("esc"), Some(0x1B));
        assert_eq!(named("f1"), Some(0x70));
        assert_eq!(named("f12"), Some(0x7B));
        assert_eq!(named("f13"), None);
        assert_eq!(named("banana"), None);
    }

    #[test]
    fn test_char_to_vk() {
        assert_eq!(char_to_vk('a'), Some(0x41));
        assert_eq!(char_to_vk('Z'), Some(0x5A));
        assert_eq!(char_to_vk('7'), Some(0x37));
        assert_eq!(char_to_vk('.'), Some(0xBE));
        assert_eq!(char_to_vk('é'), None);
    }

    #[test]
    fn test_resolve_rejects_words() {
        assert_eq!(resolve("w"), Some(0x57));
        assert_eq!(resolve("space"), Some(0x20));
        assert_eq!(resolve("hello"), None);
        assert_eq!(resolve(""), None);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("ctrl"), "Ctrl");
        assert_eq!(display_name("c"), "C");
    }

    #[test]
    fn test_movement() {
        assert_eq!(movement("ahead").map(|m| m.key), Some("W"));
        assert_eq!(movement("back").map(|m| m.key_code), Some(0x53));
        assert!(movement("sideways").is_none());
    }
}
