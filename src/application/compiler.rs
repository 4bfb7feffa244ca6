//! # Script Compiler
//!
//! Lowers plan steps to PowerShell text for the virtual-key host.
//! The output is inert: nothing here executes, and the Script Guard sees
//! exactly the text that will be written to disk and run.

use std::path::{Path, PathBuf};

use crate::domain::keys::vk;
use crate::domain::paths;
use crate::domain::types::{ActionStep, ColorTarget, KeyCode, MouseButton, PowerAction, StepKind, StopCondition};

/// Hard ceiling for any compiled loop, whatever the plan asks for.
pub const MAX_LOOP_ITERATIONS: u32 = 10_000;
/// Longest a held key waits for its release key.
pub const HOLD_KEY_MAX_SECS: u64 = 600;
pub const MAX_SCRIPT_ARGS_LEN: usize = 1000;

const KEYBOARD_HELPER: &str = r#"Add-Type -TypeDefinition @'
using System;
using System.Runtime.InteropServices;
public static class KbdHelper {
    [DllImport("user32.dll")] public static extern void keybd_event(byte vk, byte scan, uint flags, UIntPtr extra);
    [DllImport("user32.dll")] public static extern void mouse_event(uint flags, int dx, int dy, uint data, UIntPtr extra);
    [DllImport("user32.dll")] public static extern short GetAsyncKeyState(int vk);
    [DllImport("user32.dll")] public static extern bool SetCursorPos(int x, int y);
    [DllImport("user32.dll")] public static extern IntPtr GetForegroundWindow();
    public static void Down(byte vk) { keybd_event(vk, 0, 0, UIntPtr.Zero); }
    public static void Up(byte vk) { keybd_event(vk, 0, 2, UIntPtr.Zero); }
    public static void Press(byte vk) { Down(vk); System.Threading.Thread.Sleep(60); Up(vk); }
    public static void MouseMove(int dx, int dy) { mouse_event(0x0001, dx, dy, 0, UIntPtr.Zero); }
    public static void ButtonDown(bool right) { mouse_event(right ? 0x0008u : 0x0002u, 0, 0, 0, UIntPtr.Zero); }
    public static void ButtonUp(bool right) { mouse_event(right ? 0x0010u : 0x0004u, 0, 0, 0, UIntPtr.Zero); }
    public static bool IsPressed(int vk) { return (GetAsyncKeyState(vk) & 0x8000) != 0; }
    public static void ClickAt(int x, int y, bool right) {
        SetCursorPos(x, y);
        System.Threading.Thread.Sleep(50);
        ButtonDown(right);
        ButtonUp(right);
    }
}
'@ -ErrorAction SilentlyContinue"#;

const FORMS_HELPER: &str = "Add-Type -AssemblyName System.Windows.Forms -ErrorAction SilentlyContinue";

const VISUAL_HELPER: &str = r#"Add-Type -AssemblyName UIAutomationClient -ErrorAction SilentlyContinue
Add-Type -AssemblyName UIAutomationTypes -ErrorAction SilentlyContinue
function Find-AndClick([string]$Target, [bool]$Right) {
    $auto = [System.Windows.Automation.AutomationElement]
    $scopes = @()
    $fg = [KbdHelper]::GetForegroundWindow()
    if ($fg -ne [IntPtr]::Zero) { try { $scopes += $auto::FromHandle($fg) } catch { } }
    $scopes += $auto::RootElement
    $needle = $Target.ToLower()
    foreach ($scope in $scopes) {
        $all = $scope.FindAll([System.Windows.Automation.TreeScope]::Descendants, [System.Windows.Automation.Condition]::TrueCondition)
        $hit = $all | Where-Object { $_.Current.Name -and $_.Current.Name.ToLower() -eq $needle } | Select-Object -First 1
        if (-not $hit) { $hit = $all | Where-Object { $_.Current.Name -and $_.Current.Name.ToLower().Contains($needle) } | Select-Object -First 1 }
        if ($hit) {
            $r = $hit.Current.BoundingRectangle
            if (-not $r.IsEmpty) {
                [KbdHelper]::ClickAt([int]($r.X + $r.Width / 2), [int]($r.Y + $r.Height / 2), $Right)
                return $true
            }
        }
    }
    Write-Warning "Could not find '$Target' on screen"
    return $false
}"#;

const COLOR_HELPER: &str = r#"Add-Type -AssemblyName System.Drawing -ErrorAction SilentlyContinue
function Measure-ColorMatch([int[][]]$Colors) {
    $bounds = [System.Windows.Forms.Screen]::PrimaryScreen.Bounds
    $w = [int]($bounds.Width / 2)
    $h = [int]($bounds.Height / 2)
    $bmp = New-Object System.Drawing.Bitmap $w, $h
    $g = [System.Drawing.Graphics]::FromImage($bmp)
    $g.CopyFromScreen($bounds.X + [int]($bounds.Width / 4), $bounds.Y + [int]($bounds.Height / 4), 0, 0, $bmp.Size)
    $g.Dispose()
    $total = 0
    $hits = 0
    for ($py = 0; $py -lt $h; $py += 8) {
        for ($px = 0; $px -lt $w; $px += 8) {
            $p = $bmp.GetPixel($px, $py)
            $total++
            foreach ($c in $Colors) {
                if ([Math]::Abs($p.R - $c[0]) -le $c[3] -and [Math]::Abs($p.G - $c[1]) -le $c[3] -and [Math]::Abs($p.B - $c[2]) -le $c[3]) { $hits++; break }
            }
        }
    }
    $bmp.Dispose()
    if ($total -eq 0) { return 0.0 }
    return $hits / $total
}"#;

/// Executable (or URI) for well-known app names.
const APP_LAUNCH_MAP: &[(&str, &str)] = &[
    ("edge", "msedge.exe"),
    ("microsoft edge", "msedge.exe"),
    ("chrome", "chrome.exe"),
    ("google chrome", "chrome.exe"),
    ("firefox", "firefox.exe"),
    ("mozilla firefox", "firefox.exe"),
    ("notepad", "notepad.exe"),
    ("calculator", "calc.exe"),
    ("calc", "calc.exe"),
    ("explorer", "explorer.exe"),
    ("file explorer", "explorer.exe"),
    ("spotify", "spotify.exe"),
    ("discord", "discord.exe"),
    ("steam", "steam.exe"),
    ("vlc", "vlc.exe"),
    ("powershell", "powershell.exe"),
    ("terminal", "wt.exe"),
    ("windows terminal", "wt.exe"),
    ("cmd", "cmd.exe"),
    ("settings", "ms-settings:"),
    ("task manager", "taskmgr.exe"),
    ("paint", "mspaint.exe"),
    ("wordpad", "wordpad.exe"),
    ("control panel", "control.exe"),
    ("snipping tool", "snippingtool.exe"),
    ("obs", "obs64.exe"),
    ("teams", "teams.exe"),
    ("microsoft teams", "teams.exe"),
    ("outlook", "outlook.exe"),
    ("word", "WINWORD.EXE"),
    ("excel", "EXCEL.EXE"),
    ("powerpoint", "POWERPNT.EXE"),
    ("vscode", "code.exe"),
    ("vs code", "code.exe"),
    ("visual studio code", "code.exe"),
];

pub fn launch_target(app: &str) -> Option<&'static str> {
    let app = app.trim().to_lowercase();
    APP_LAUNCH_MAP
        .iter()
        .find(|(name, _)| *name == app)
        .map(|(_, exe)| *exe)
}

/// Single-quoted PowerShell literal. Typographic single quotes also close a
/// PowerShell string, so they are doubled too.
pub fn ps_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        if matches!(ch, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}') {
            out.push(ch);
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Escapes SendKeys metacharacters; newlines become Enter.
pub fn escape_send_keys(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '+' | '^' | '%' | '~' | '(' | ')' | '{' | '}' | '[' | ']' => {
                out.push('{');
                out.push(ch);
                out.push('}');
            }
            '\n' => out.push_str("{ENTER}"),
            '\r' => {}
            _ => out.push(ch),
        }
    }
    out
}

fn hex(code: KeyCode) -> String {
    format!("0x{code:02X}")
}

fn color_array(colors: &[ColorTarget]) -> String {
    let items: Vec<String> = colors
        .iter()
        .map(|c| format!("@({},{},{},{})", c.r, c.g, c.b, c.tolerance))
        .collect();
    if items.len() == 1 {
        // unary comma keeps a single colour from being flattened
        format!("@(,{})", items[0])
    } else {
        format!("@({})", items.join(","))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Helpers {
    keyboard: bool,
    forms: bool,
    visual: bool,
    color: bool,
}

/// Accumulates script lines for one compilation.
struct Emitter<'a> {
    scripts_dir: &'a Path,
    script_timeout_ms: u64,
    lines: Vec<String>,
    helpers: Helpers,
    indent: usize,
    loops: usize,
}

impl<'a> Emitter<'a> {
    fn line(&mut self, text: impl AsRef<str>) {
        let pad = "    ".repeat(self.indent);
        self.lines.push(format!("{pad}{}", text.as_ref()));
    }

    fn sleep(&mut self, ms: u64) {
        self.line(format!("Start-Sleep -Milliseconds {ms}"));
    }

    fn keyboard(&mut self) {
        self.helpers.keyboard = true;
    }

    fn step(&mut self, step: &ActionStep) {
        if !step.description.is_empty() {
            let comment = step.description.replace(['\r', '\n'], " ");
            self.line(format!("# {comment}"));
        }
        match &step.kind {
            StepKind::Delay { duration_ms } => self.sleep(*duration_ms),
            StepKind::KeyPress {
                key_code, hold_ms, ..
            } => {
                self.keyboard();
                match hold_ms {
                    Some(hold) => {
                        self.line(format!("[KbdHelper]::Down({})", hex(*key_code)));
                        self.sleep(*hold);
                        self.line(format!("[KbdHelper]::Up({})", hex(*key_code)));
                    }
                    None => {
                        self.line(format!("[KbdHelper]::Press({})", hex(*key_code)));
                        self.sleep(60);
                    }
                }
            }
            StepKind::KeyDown { key_code, .. } => {
                self.keyboard();
                self.line(format!("[KbdHelper]::Down({})", hex(*key_code)));
            }
            StepKind::KeyUp { key_code, .. } => {
                self.keyboard();
                self.line(format!("[KbdHelper]::Up({})", hex(*key_code)));
            }
            StepKind::Hotkey { key_codes, .. } => {
                self.keyboard();
                for code in key_codes {
                    self.line(format!("[KbdHelper]::Down({})", hex(*code)));
                    self.sleep(30);
                }
                for code in key_codes.iter().rev() {
                    self.line(format!("[KbdHelper]::Up({})", hex(*code)));
                    self.sleep(30);
                }
            }
            StepKind::TypeText { text } => {
                self.helpers.forms = true;
                self.line(format!(
                    "[System.Windows.Forms.SendKeys]::SendWait({})",
                    ps_quote(&escape_send_keys(text))
                ));
                self.sleep(50);
            }
            StepKind::FocusWindow { window_title } => {
                let needle = ps_quote(&window_title.to_lowercase());
                self.line(format!(
                    "$hpWnd = Get-Process | Where-Object {{ $_.MainWindowTitle -and $_.MainWindowTitle.ToLower().Contains({needle}) }} | Select-Object -First 1"
                ));
                self.line(format!(
                    "if ($hpWnd) {{ (New-Object -ComObject WScript.Shell).AppActivate($hpWnd.Id) | Out-Null }} else {{ Write-Warning ('No window matching ' + {}) }}",
                    ps_quote(window_title)
                ));
                self.sleep(300);
            }
            StepKind::LaunchApp { app, path } => self.launch(app, path.as_deref()),
            StepKind::MouseMove { dx, dy } => {
                self.keyboard();
                self.line(format!("[KbdHelper]::MouseMove({dx}, {dy})"));
            }
            StepKind::HoldKey {
                key_code,
                until_key_code,
                ..
            } => {
                self.keyboard();
                let mut stop = format!("-not [KbdHelper]::IsPressed({})", hex(*until_key_code));
                if *until_key_code != vk::ESCAPE {
                    stop.push_str(&format!(" -and -not [KbdHelper]::IsPressed({})", hex(vk::ESCAPE)));
                }
                self.line(format!("[KbdHelper]::Down({})", hex(*key_code)));
                self.line("$hpWait = [System.Diagnostics.Stopwatch]::StartNew()");
                self.line(format!(
                    "while ({stop} -and $hpWait.Elapsed.TotalSeconds -lt {HOLD_KEY_MAX_SECS}) {{ Start-Sleep -Milliseconds 50 }}"
                ));
                self.line(format!("[KbdHelper]::Up({})", hex(*key_code)));
            }
            StepKind::HoldClick {
                button,
                duration_ms,
            } => {
                self.keyboard();
                let right = matches!(button, MouseButton::Right);
                self.line(format!("[KbdHelper]::ButtonDown(${right})"));
                self.sleep(*duration_ms);
                self.line(format!("[KbdHelper]::ButtonUp(${right})"));
            }
            StepKind::VisualClick { target, button } => {
                self.keyboard();
                self.helpers.visual = true;
                let right = matches!(button, MouseButton::Right);
                self.line(format!("Find-AndClick {} ${right} | Out-Null", ps_quote(target)));
                self.sleep(200);
            }
            StepKind::RepeatSequence {
                sub_steps,
                stop_conditions,
                max_iterations,
            } => self.repeat(sub_steps, stop_conditions, *max_iterations),
            StepKind::SetVolume { level } => {
                self.keyboard();
                let ups = u32::from((*level).min(100)) / 2;
                self.line(format!(
                    "for ($hpI = 0; $hpI -lt 50; $hpI++) {{ [KbdHelper]::Press({}) }}",
                    hex(vk::VOLUME_DOWN)
                ));
                self.line(format!(
                    "for ($hpI = 0; $hpI -lt {ups}; $hpI++) {{ [KbdHelper]::Press({}) }}",
                    hex(vk::VOLUME_UP)
                ));
            }
            StepKind::PowerCommand { action } => self.power(*action),
            StepKind::RunScript { filename, args } => self.run_script(filename, args),
            StepKind::Unrecognized => {
                tracing::warn!("Compiling unrecognized step as a no-op");
                self.line("Write-Warning 'Skipping unrecognized step'");
            }
        }
    }

    fn launch(&mut self, app: &str, path: Option<&str>) {
        match (launch_target(app), path) {
            (Some(target), _) if target.ends_with(':') => {
                self.line(format!("Start-Process {}", ps_quote(target)));
            }
            (Some(target), _) => {
                self.line(format!("Start-Process {} -ErrorAction SilentlyContinue", ps_quote(target)));
            }
            (None, Some(path)) => {
                self.line(format!("Start-Process {} -ErrorAction SilentlyContinue", ps_quote(path)));
            }
            (None, None) => {
                // Unknown name: try it directly, then fall back to Start menu search.
                self.keyboard();
                self.helpers.forms = true;
                let name = ps_quote(app);
                let search = ps_quote(&escape_send_keys(app));
                self.line(format!("try {{ Start-Process {name} -ErrorAction Stop }} catch {{"));
                self.indent += 1;
                self.line(format!("[KbdHelper]::Press({})", hex(vk::LWIN)));
                self.sleep(600);
                self.line(format!("[System.Windows.Forms.SendKeys]::SendWait({search})"));
                self.sleep(800);
                self.line(format!("[KbdHelper]::Press({})", hex(vk::RETURN)));
                self.indent -= 1;
                self.line("}");
            }
        }
        self.sleep(500);
    }

    fn repeat(&mut self, sub_steps: &[ActionStep], stop_conditions: &[StopCondition], max_iterations: u32) {
        self.keyboard();
        self.loops += 1;
        let id = self.loops;
        let max = max_iterations.clamp(1, MAX_LOOP_ITERATIONS);
        let escape = StopCondition::key("Escape", vk::ESCAPE);
        let conditions: &[StopCondition] = if stop_conditions.is_empty() {
            std::slice::from_ref(&escape)
        } else {
            stop_conditions
        };

        self.line(format!("$hpIter{id} = 0"));
        self.line(format!(":hpLoop{id} while ($hpIter{id} -lt {max}) {{"));
        self.indent += 1;
        self.line(format!("$hpIter{id}++"));
        for condition in conditions {
            let test = match condition {
                StopCondition::KeyPress { key_code, .. } => {
                    format!("[KbdHelper]::IsPressed({})", hex(*key_code))
                }
                StopCondition::ColorMatch { profile, threshold } => {
                    self.helpers.forms = true;
                    self.helpers.color = true;
                    format!("(Measure-ColorMatch {}) -gt {threshold}", color_array(&profile.colors))
                }
            };
            let reason = ps_quote(&format!("Stopped: {}", condition.describe()));
            self.line(format!("if ({test}) {{ Write-Output {reason}; break hpLoop{id} }}"));
        }
        for step in sub_steps {
            self.step(step);
        }
        self.indent -= 1;
        self.line("}");
    }

    fn power(&mut self, action: PowerAction) {
        match action {
            PowerAction::Shutdown => self.line("Stop-Computer -Force"),
            PowerAction::Restart => self.line("Restart-Computer -Force"),
            PowerAction::Sleep | PowerAction::Hibernate => {
                self.helpers.forms = true;
                let state = if action == PowerAction::Sleep { "Suspend" } else { "Hibernate" };
                self.line(format!(
                    "[System.Windows.Forms.Application]::SetSuspendState([System.Windows.Forms.PowerState]::{state}, $false, $false) | Out-Null"
                ));
            }
        }
    }

    fn run_script(&mut self, filename: &str, args: &[String]) {
        let Some(path) = paths::resolve_in(self.scripts_dir, filename) else {
            self.line(format!("Write-Warning {}", ps_quote(&format!("Invalid script name: {filename}"))));
            return;
        };
        let ext = paths::extension(&path).unwrap_or_default();
        if !paths::is_script_extension(&ext) {
            self.line(format!("Write-Warning {}", ps_quote(&format!("Unsupported script type: {filename}"))));
            return;
        }
        let script = path.to_string_lossy().to_string();
        let (program, mut argv): (&str, Vec<String>) = match ext.as_str() {
            "py" => ("python", vec![script]),
            "js" => ("node", vec![script]),
            "ps1" => (
                "powershell.exe",
                ["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"]
                    .iter()
                    .map(|s| s.to_string())
                    .chain(std::iter::once(script))
                    .collect(),
            ),
            _ => ("cmd.exe", vec!["/c".to_string(), script]),
        };
        let joined: String = args.join(" ").chars().take(MAX_SCRIPT_ARGS_LEN).collect();
        argv.extend(joined.split_whitespace().map(str::to_string));

        let list = argv
            .iter()
            .map(|a| ps_quote(&format!("\"{}\"", a.replace('"', ""))))
            .collect::<Vec<_>>()
            .join(", ");
        let workdir = ps_quote(&self.scripts_dir.to_string_lossy());
        self.line(format!(
            "$hpProc = Start-Process -FilePath {} -ArgumentList @({list}) -WorkingDirectory {workdir} -NoNewWindow -PassThru",
            ps_quote(program)
        ));
        self.line(format!(
            "if (-not $hpProc.WaitForExit({})) {{ $hpProc.Kill(); Write-Warning {} }}",
            self.script_timeout_ms,
            ps_quote(&format!("Script {filename} timed out"))
        ));
    }
}

/// Compiles steps to PowerShell. Holds the workspace scripts directory that
/// `runScript` steps are resolved against.
#[derive(Debug, Clone)]
pub struct ScriptCompiler {
    scripts_dir: PathBuf,
    script_timeout_ms: u64,
}

impl ScriptCompiler {
    pub fn new(scripts_dir: impl Into<PathBuf>, script_timeout_secs: u64) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
            script_timeout_ms: script_timeout_secs.saturating_mul(1000),
        }
    }

    pub fn compile(&self, steps: &[ActionStep]) -> String {
        let mut emitter = Emitter {
            scripts_dir: &self.scripts_dir,
            script_timeout_ms: self.script_timeout_ms,
            lines: Vec::new(),
            helpers: Helpers::default(),
            indent: 0,
            loops: 0,
        };
        for step in steps {
            emitter.step(step);
        }

        let helpers = emitter.helpers;
        let mut out: Vec<String> = vec!["$ErrorActionPreference = 'Continue'".to_string()];
        if helpers.keyboard {
            out.push(KEYBOARD_HELPER.to_string());
        }
        if helpers.forms {
            out.push(FORMS_HELPER.to_string());
        }
        if helpers.visual {
            out.push(VISUAL_HELPER.to_string());
        }
        if helpers.color {
            out.push(COLOR_HELPER.to_string());
        }
        out.extend(emitter.lines);
        // Helper blocks are written with \n; normalize everything to CRLF.
        out.join("\n").replace("\r\n", "\n").replace('\n', "\r\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::guard;
    use crate::application::interpreter::catalog;

    fn compiler() -> ScriptCompiler {
        ScriptCompiler::new("/work/scripts", 30)
    }

    fn step(kind: StepKind) -> ActionStep {
        ActionStep::new(kind, "")
    }

    #[test]
    fn test_ps_quote_doubles_quotes() {
        assert_eq!(ps_quote("it's"), "'it''s'");
        assert_eq!(ps_quote("a\u{2019}b"), "'a\u{2019}\u{2019}b'");
    }

    #[test]
    fn test_send_keys_escaping() {
        assert_eq!(escape_send_keys("1+1=2 (ok) ~%^"), "1{+}1=2 {(}ok{)} {~}{%}{^}");
        assert_eq!(escape_send_keys("a\r\nb"), "a{ENTER}b");
    }

    #[test]
    fn test_helpers_only_when_needed() {
        let script = compiler().compile(&[ActionStep::delay(250, "Wait")]);
        assert!(script.contains("Start-Sleep -Milliseconds 250"));
        assert!(!script.contains("KbdHelper"));
        assert!(!script.contains("System.Windows.Forms"));

        let script = compiler().compile(&[ActionStep::type_text("hi", "Type")]);
        assert!(script.contains(FORMS_HELPER));
        assert!(!script.contains("KbdHelper"));
        assert!(script.contains("SendWait('hi')"));
    }

    #[test]
    fn test_hotkey_releases_in_reverse() {
        let script = compiler().compile(&[step(StepKind::Hotkey {
            keys: vec!["Ctrl".into(), "C".into()],
            key_codes: vec![0x11, 0x43],
        })]);
        let body: Vec<&str> = script
            .split("\r\n")
            .filter(|l| l.starts_with("[KbdHelper]::"))
            .collect();
        assert_eq!(
            body,
            vec![
                "[KbdHelper]::Down(0x11)",
                "[KbdHelper]::Down(0x43)",
                "[KbdHelper]::Up(0x43)",
                "[KbdHelper]::Up(0x11)"
            ]
        );
    }

    #[test]
    fn test_launch_known_unknown_and_uri() {
        let script = compiler().compile(&[
            step(StepKind::LaunchApp { app: "notepad".into(), path: None }),
            step(StepKind::LaunchApp { app: "settings".into(), path: None }),
            step(StepKind::LaunchApp { app: "blender".into(), path: None }),
        ]);
        assert!(script.contains("Start-Process 'notepad.exe' -ErrorAction SilentlyContinue"));
        assert!(script.contains("Start-Process 'ms-settings:'\r\n"));
        assert!(script.contains("try { Start-Process 'blender' -ErrorAction Stop } catch {"));
        assert!(script.contains("SendWait('blender')"));
    }

    #[test]
    fn test_repeat_sequence_is_bounded_with_stop_checks() {
        let lava = catalog::color_profile("lava");
        let script = compiler().compile(&[step(StepKind::RepeatSequence {
            sub_steps: vec![ActionStep::delay(100, "tick")],
            stop_conditions: vec![StopCondition::color(lava), StopCondition::key("Escape", vk::ESCAPE)],
            max_iterations: 50_000,
        })]);
        assert!(script.contains(":hpLoop1 while ($hpIter1 -lt 10000) {"));
        assert!(script.contains("(Measure-ColorMatch @(@(207,92,15,40),@(230,127,19,35),@(252,172,28,30),@(180,60,10,35))) -gt 0.02"));
        assert!(script.contains("if ([KbdHelper]::IsPressed(0x1B)) { Write-Output 'Stopped: Escape pressed'; break hpLoop1 }"));
        assert!(script.contains("function Measure-ColorMatch"));
    }

    #[test]
    fn test_repeat_without_conditions_gets_escape() {
        let script = compiler().compile(&[step(StepKind::RepeatSequence {
            sub_steps: vec![],
            stop_conditions: vec![],
            max_iterations: 0,
        })]);
        assert!(script.contains("while ($hpIter1 -lt 1)"));
        assert!(script.contains("IsPressed(0x1B)"));
    }

    #[test]
    fn test_nested_loops_get_distinct_labels() {
        let inner = step(StepKind::RepeatSequence {
            sub_steps: vec![],
            stop_conditions: vec![],
            max_iterations: 3,
        });
        let script = compiler().compile(&[step(StepKind::RepeatSequence {
            sub_steps: vec![inner],
            stop_conditions: vec![],
            max_iterations: 2,
        })]);
        assert!(script.contains(":hpLoop1 while"));
        assert!(script.contains("    :hpLoop2 while"));
    }

    #[test]
    fn test_single_colour_is_not_flattened() {
        assert_eq!(color_array(&[ColorTarget::new(1, 2, 3, 4)]), "@(,@(1,2,3,4))");
    }

    #[test]
    fn test_set_volume_normalizes() {
        let script = compiler().compile(&[step(StepKind::SetVolume { level: 40 })]);
        assert!(script.contains("$hpI -lt 50; $hpI++) { [KbdHelper]::Press(0xAE) }"));
        assert!(script.contains("$hpI -lt 20; $hpI++) { [KbdHelper]::Press(0xAF) }"));
    }

    #[test]
    fn test_power_commands() {
        let script = compiler().compile(&[step(StepKind::PowerCommand { action: PowerAction::Shutdown })]);
        assert!(script.contains("Stop-Computer -Force"));
        let script = compiler().compile(&[step(StepKind::PowerCommand { action: PowerAction::Hibernate })]);
        assert!(script.contains("PowerState]::Hibernate"));
    }

    #[test]
    fn test_run_script_validation() {
        let script = compiler().compile(&[step(StepKind::RunScript {
            filename: "tool.exe".into(),
            args: vec![],
        })]);
        assert!(script.contains("Write-Warning 'Unsupported script type: tool.exe'"));

        // sanitized to "runpy", which has no extension
        let script = compiler().compile(&[step(StepKind::RunScript {
            filename: "run..py".into(),
            args: vec![],
        })]);
        assert!(script.contains("Write-Warning 'Unsupported script type: run..py'"));
        assert!(!script.contains("Start-Process"));

        let script = compiler().compile(&[step(StepKind::RunScript {
            filename: "hello.py".into(),
            args: vec!["--name".into(), "Ada".into()],
        })]);
        assert!(script.contains("Start-Process -FilePath 'python'"));
        assert!(script.contains("'\"--name\"', '\"Ada\"'"));
        assert!(script.contains("WaitForExit(30000)"));
    }

    #[test]
    fn test_description_comment_cannot_break_lines() {
        let script = compiler().compile(&[ActionStep::delay(1, "a\nStop-Computer")]);
        assert!(script.contains("# a Stop-Computer"));
        assert!(!script.contains("\r\nStop-Computer"));
    }

    #[test]
    fn test_compiled_helpers_pass_script_guard() {
        let lava = catalog::color_profile("lava");
        let steps = vec![
            step(StepKind::VisualClick { target: "OK".into(), button: MouseButton::Left }),
            step(StepKind::RepeatSequence {
                sub_steps: vec![step(StepKind::HoldClick { button: MouseButton::Left, duration_ms: 10 })],
                stop_conditions: vec![StopCondition::color(lava)],
                max_iterations: 5,
            }),
            step(StepKind::LaunchApp { app: "something".into(), path: None }),
            step(StepKind::PowerCommand { action: PowerAction::Sleep }),
            step(StepKind::SetVolume { level: 10 }),
        ];
        let verdict = guard::check_script(&compiler().compile(&steps));
        assert!(!verdict.blocked, "{}", verdict.reason());
    }
}
