//! Lookup tables used by the rule builders: window titles, app aliases,
//! music services, shortcut commands and on-screen colour profiles.

use crate::domain::keys::vk;
use crate::domain::types::{ColorProfile, ColorTarget, KeyCode};

const WINDOW_TITLES: &[(&str, &str)] = &[
    ("minecraft", "Minecraft"),
    ("chrome", "Google Chrome"),
    ("edge", "Edge"),
    ("firefox", "Firefox"),
    ("notepad", "Notepad"),
    ("vscode", "Visual Studio Code"),
    ("vs code", "Visual Studio Code"),
    ("code", "Visual Studio Code"),
    ("discord", "Discord"),
    ("spotify", "Spotify"),
    ("steam", "Steam"),
    ("word", "Word"),
    ("excel", "Excel"),
    ("powershell", "PowerShell"),
    ("terminal", "Terminal"),
    ("explorer", "Explorer"),
    ("teams", "Teams"),
    ("obs", "OBS"),
    ("vlc", "VLC"),
];

/// Window title substring for a spoken app name.
pub fn window_title(app: &str) -> String {
    WINDOW_TITLES
        .iter()
        .find(|(name, _)| *name == app)
        .map(|(_, title)| title.to_string())
        .unwrap_or_else(|| app.to_string())
}

const APP_ALIASES: &[(&str, &str)] = &[
    ("edge", "microsoft edge"),
    ("chrome", "google chrome"),
    ("firefox", "mozilla firefox"),
    ("calc", "calculator"),
    ("command prompt", "cmd"),
    ("terminal", "windows terminal"),
    ("explorer", "file explorer"),
    ("files", "file explorer"),
    ("teams", "microsoft teams"),
    ("vscode", "visual studio code"),
    ("vs code", "visual studio code"),
    ("code", "visual studio code"),
    ("screenshot", "snipping tool"),
];

/// Canonical app name for launching.
pub fn app_name(spoken: &str) -> String {
    APP_ALIASES
        .iter()
        .find(|(alias, _)| *alias == spoken)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| spoken.to_string())
}

pub struct MusicService {
    pub title: &'static str,
    pub url: &'static str,
    pub load_ms: u64,
    pub play_key: (&'static str, KeyCode),
}

const SPACE: (&str, KeyCode) = ("Space", vk::SPACE);

const MUSIC_SERVICES: &[(&str, MusicService)] = &[
    ("spotify", MusicService { title: "Spotify", url: "https://open.spotify.com", load_ms: 3000, play_key: SPACE }),
    ("soundcloud", MusicService { title: "SoundCloud", url: "https://soundcloud.com/discover", load_ms: 3000, play_key: SPACE }),
    ("youtube music", MusicService { title: "YouTube Music", url: "https://music.youtube.com", load_ms: 3500, play_key: SPACE }),
    ("youtube", MusicService { title: "YouTube", url: "https://www.youtube.com", load_ms: 3000, play_key: ("K", 0x4B) }),
    ("pandora", MusicService { title: "Pandora", url: "https://www.pandora.com", load_ms: 3500, play_key: SPACE }),
    ("apple music", MusicService { title: "Apple Music", url: "https://music.apple.com", load_ms: 4000, play_key: SPACE }),
    ("tidal", MusicService { title: "Tidal", url: "https://listen.tidal.com", load_ms: 3500, play_key: SPACE }),
    ("deezer", MusicService { title: "Deezer", url: "https://www.deezer.com", load_ms: 3500, play_key: SPACE }),
];

/// Exact name first ("youtube music"), then without a trailing "music".
pub fn music_service(name: &str) -> Option<&'static MusicService> {
    let lookup = |n: &str| {
        MUSIC_SERVICES
            .iter()
            .find(|(key, _)| *key == n)
            .map(|(_, service)| service)
    };
    lookup(name).or_else(|| lookup(name.strip_suffix(" music")?.trim()))
}

pub struct Shortcut {
    pub keys: &'static [&'static str],
    pub key_codes: &'static [KeyCode],
    pub label: &'static str,
}

const CTRL: KeyCode = vk::CONTROL;
const WIN: KeyCode = vk::LWIN;

pub const SHORTCUTS: &[(&str, Shortcut)] = &[
    ("copy", Shortcut { keys: &["Ctrl", "C"], key_codes: &[CTRL, 0x43], label: "Copy (Ctrl+C)" }),
    ("paste", Shortcut { keys: &["Ctrl", "V"], key_codes: &[CTRL, 0x56], label: "Paste (Ctrl+V)" }),
    ("cut", Shortcut { keys: &["Ctrl", "X"], key_codes: &[CTRL, 0x58], label: "Cut (Ctrl+X)" }),
    ("undo", Shortcut { keys: &["Ctrl", "Z"], key_codes: &[CTRL, 0x5A], label: "Undo (Ctrl+Z)" }),
    ("redo", Shortcut { keys: &["Ctrl", "Y"], key_codes: &[CTRL, 0x59], label: "Redo (Ctrl+Y)" }),
    ("save", Shortcut { keys: &["Ctrl", "S"], key_codes: &[CTRL, 0x53], label: "Save (Ctrl+S)" }),
    ("select all", Shortcut { keys: &["Ctrl", "A"], key_codes: &[CTRL, 0x41], label: "Select All (Ctrl+A)" }),
    ("find", Shortcut { keys: &["Ctrl", "F"], key_codes: &[CTRL, 0x46], label: "Find (Ctrl+F)" }),
    ("new tab", Shortcut { keys: &["Ctrl", "T"], key_codes: &[CTRL, 0x54], label: "New Tab (Ctrl+T)" }),
    ("close tab", Shortcut { keys: &["Ctrl", "W"], key_codes: &[CTRL, 0x57], label: "Close Tab (Ctrl+W)" }),
    ("refresh", Shortcut { keys: &["F5"], key_codes: &[vk::F5], label: "Refresh (F5)" }),
    ("minimize", Shortcut { keys: &["Win", "Down"], key_codes: &[WIN, vk::DOWN], label: "Minimize (Win+Down)" }),
    ("maximize", Shortcut { keys: &["Win", "Up"], key_codes: &[WIN, vk::UP], label: "Maximize (Win+Up)" }),
    ("switch window", Shortcut { keys: &["Alt", "Tab"], key_codes: &[vk::ALT, vk::TAB], label: "Switch Window (Alt+Tab)" }),
    ("switch app", Shortcut { keys: &["Alt", "Tab"], key_codes: &[vk::ALT, vk::TAB], label: "Switch App (Alt+Tab)" }),
    ("screenshot", Shortcut { keys: &["Win", "Shift", "S"], key_codes: &[WIN, vk::SHIFT, 0x53], label: "Screenshot (Win+Shift+S)" }),
    ("snip", Shortcut { keys: &["Win", "Shift", "S"], key_codes: &[WIN, vk::SHIFT, 0x53], label: "Snip (Win+Shift+S)" }),
    ("lock", Shortcut { keys: &["Win", "L"], key_codes: &[WIN, 0x4C], label: "Lock Screen (Win+L)" }),
    ("lock screen", Shortcut { keys: &["Win", "L"], key_codes: &[WIN, 0x4C], label: "Lock Screen (Win+L)" }),
    ("show desktop", Shortcut { keys: &["Win", "D"], key_codes: &[WIN, 0x44], label: "Show Desktop (Win+D)" }),
    ("desktop", Shortcut { keys: &["Win", "D"], key_codes: &[WIN, 0x44], label: "Show Desktop (Win+D)" }),
    ("task view", Shortcut { keys: &["Win", "Tab"], key_codes: &[WIN, vk::TAB], label: "Task View (Win+Tab)" }),
    ("emoji", Shortcut { keys: &["Win", "."], key_codes: &[WIN, 0xBE], label: "Emoji Panel (Win+.)" }),
    ("clipboard", Shortcut { keys: &["Win", "V"], key_codes: &[WIN, 0x56], label: "Clipboard History (Win+V)" }),
];

pub fn shortcut(name: &str) -> Option<&'static Shortcut> {
    SHORTCUTS.iter().find(|(n, _)| *n == name).map(|(_, s)| s)
}

/// Built-in colour profiles for things worth stopping on.
const COLOR_PROFILES: &[(&str, &str, &[ColorTarget], f64)] = &[
    (
        "lava",
        "Lava (Minecraft)",
        &[
            ColorTarget::new(207, 92, 15, 40),
            ColorTarget::new(230, 127, 19, 35),
            ColorTarget::new(252, 172, 28, 30),
            ColorTarget::new(180, 60, 10, 35),
        ],
        0.02,
    ),
    (
        "water",
        "Water (Minecraft)",
        &[
            ColorTarget::new(44, 66, 201, 40),
            ColorTarget::new(63, 118, 228, 35),
            ColorTarget::new(36, 57, 163, 30),
        ],
        0.03,
    ),
    (
        "fire",
        "Fire (generic)",
        &[
            ColorTarget::new(226, 88, 34, 40),
            ColorTarget::new(252, 186, 3, 35),
            ColorTarget::new(200, 50, 20, 35),
        ],
        0.015,
    ),
    (
        "creeper",
        "Creeper (Minecraft)",
        &[ColorTarget::new(76, 153, 76, 30), ColorTarget::new(55, 125, 55, 25)],
        0.01,
    ),
    (
        "diamond",
        "Diamond ore (Minecraft)",
        &[ColorTarget::new(93, 236, 218, 35), ColorTarget::new(60, 200, 190, 30)],
        0.005,
    ),
];

const FALLBACK_COLOR: ColorTarget = ColorTarget::new(220, 100, 30, 50);
const FALLBACK_THRESHOLD: f64 = 0.03;

/// Built-in profile by name, or a generic warm-colour profile named after the thing.
pub fn color_profile(name: &str) -> ColorProfile {
    match COLOR_PROFILES.iter().find(|(n, ..)| *n == name) {
        Some((n, description, colors, threshold)) => ColorProfile {
            name: n.to_string(),
            description: description.to_string(),
            colors: colors.to_vec(),
            match_threshold: *threshold,
        },
        None => {
            tracing::info!("No colour profile for '{}', using generic warm colour", name);
            ColorProfile {
                name: name.to_string(),
                description: name.to_string(),
                colors: vec![FALLBACK_COLOR],
                match_threshold: FALLBACK_THRESHOLD,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_color_profiles() {
        let lava = color_profile("lava");
        assert_eq!(lava.colors.len(), 4);
        assert_eq!(lava.match_threshold, 0.02);
        assert_eq!(lava.colors[0], ColorTarget::new(207, 92, 15, 40));
        assert_eq!(color_profile("diamond").match_threshold, 0.005);
    }

    #[test]
    fn test_unknown_profile_falls_back() {
        let profile = color_profile("gold");
        assert_eq!(profile.name, "gold");
        assert_eq!(profile.colors, vec![ColorTarget::new(220, 100, 30, 50)]);
        assert_eq!(profile.match_threshold, 0.03);
    }

    #[test]
    fn test_music_service_lookup() {
        assert_eq!(music_service("youtube music").map(|s| s.title), Some("YouTube Music"));
        assert_eq!(music_service("spotify music").map(|s| s.title), Some("Spotify"));
        assert!(music_service("radio").is_none());
    }

    #[test]
    fn test_aliases() {
        assert_eq!(app_name("calc"), "calculator");
        assert_eq!(app_name("notepad"), "notepad");
        assert_eq!(window_title("vs code"), "Visual Studio Code");
        assert_eq!(window_title("blender"), "blender");
        assert!(shortcut("select all").is_some());
    }
}
