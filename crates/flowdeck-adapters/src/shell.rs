//! The real [`Launcher`]: platform shells and openers.
//!
//! Command lines run through `sh -c` (`cmd /C` on Windows) with piped
//! output.  Stdout and stderr are each truncated to [`MAX_OUTPUT_BYTES`].
//! Openers are `xdg-open`, `open` and `start`; they hand the target to the
//! desktop and return almost immediately.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{AdapterError, Result};
use crate::terminal::{TerminalEmulator, TerminalSpawner};
use crate::traits::{CommandOutput, Launcher, Platform};

/// Maximum output size in bytes (100 KB), applied to each stream.
pub const MAX_OUTPUT_BYTES: usize = 100 * 1024;

/// How long a directly executed application may take to fail at startup
/// before it is considered launched.
const LAUNCH_GRACE: Duration = Duration::from_secs(2);

/// Launches commands and applications on the local machine.
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    platform: Platform,
    terminals: TerminalSpawner,
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemLauncher {
    /// Launcher for the platform this binary runs on.
    pub fn new() -> Self {
        Self::for_platform(Platform::current())
    }

    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            terminals: TerminalSpawner::new(platform),
        }
    }

    /// Terminal emulators to try, in order, for detached windows.
    pub fn with_terminals(mut self, names: &[String]) -> Self {
        let emulators = names.iter().map(|n| TerminalEmulator::for_name(n)).collect();
        self.terminals = self.terminals.with_emulators(emulators);
        self
    }

    /// Directory detached-terminal scripts are written to.
    pub fn with_script_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.terminals = self.terminals.with_script_dir(dir);
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    async fn run_to_completion(&self, program: &str, args: &[String]) -> Result<()> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| spawn_failed(program, e))?;

        if output.status.success() {
            Ok(())
        } else {
            let (stderr, _) = truncate_output(&output.stderr);
            Err(AdapterError::CommandFailed {
                command: display_command(program, args),
                exit_code: output.status.code().unwrap_or(-1),
                stderr,
            })
        }
    }

    /// Start a long-lived program.  Fails only if it cannot be spawned or
    /// exits unsuccessfully within [`LAUNCH_GRACE`].
    async fn launch(&self, program: &str, args: &[String]) -> Result<()> {
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| spawn_failed(program, e))?;

        match tokio::time::timeout(LAUNCH_GRACE, child.wait()).await {
            Ok(Ok(status)) if !status.success() => Err(AdapterError::CommandFailed {
                command: display_command(program, args),
                exit_code: status.code().unwrap_or(-1),
                stderr: String::new(),
            }),
            Ok(Err(e)) => Err(AdapterError::IoError(e)),
            // Exited cleanly or still running.
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Launcher for SystemLauncher {
    async fn run_command_line(&self, command: &str, cwd: Option<&Path>) -> Result<CommandOutput> {
        let (program, args) = shell_invocation(self.platform, command);
        debug!(command, cwd = ?cwd, "running command line");

        let mut cmd = tokio::process::Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| spawn_failed(&program, e))?;

        // Runs until the command exits; there is no time limit.
        let output = child.wait_with_output().await?;

        let (stdout, stdout_truncated) = truncate_output(&output.stdout);
        let (stderr, stderr_truncated) = truncate_output(&output.stderr);

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            debug!(command, exit_code, "command failed");
            return Err(AdapterError::CommandFailed {
                command: command.to_string(),
                exit_code,
                stderr,
            });
        }

        Ok(CommandOutput {
            command: command.to_string(),
            stdout,
            stderr,
            truncated: stdout_truncated || stderr_truncated,
        })
    }

    async fn spawn_detached_terminal(
        &self,
        commands: &[String],
        cwd: Option<&Path>,
    ) -> Result<()> {
        self.terminals.spawn(commands, cwd).await
    }

    async fn open_path(&self, path: &str) -> Result<()> {
        info!(path, "opening path");
        let (program, args) = opener_invocation(self.platform, path);
        self.run_to_completion(&program, &args).await
    }

    async fn open_url(&self, url: &str) -> Result<()> {
        info!(url, "opening url");
        let (program, args) = opener_invocation(self.platform, url);
        self.run_to_completion(&program, &args).await
    }

    async fn open_application(&self, app: &str, cwd: Option<&Path>) -> Result<()> {
        info!(app, cwd = ?cwd, "opening application");

        // The VS Code CLI opens the folder properly where `open -a` may not.
        if self.platform == Platform::MacOs && cwd.is_some() && is_vscode(app) {
            match self.run_command_line("code .", cwd).await {
                Ok(_) => return Ok(()),
                Err(e) => debug!(error = %e, "`code .` failed, falling back to open -a"),
            }
        }

        let (program, args) = application_invocation(self.platform, app, cwd);
        match (self.platform, cwd) {
            (Platform::Linux | Platform::Windows, Some(_)) => self.launch(&program, &args).await,
            _ => self.run_to_completion(&program, &args).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Command-line construction
// ---------------------------------------------------------------------------

/// Program and arguments that run `command` through the platform shell.
pub fn shell_invocation(platform: Platform, command: &str) -> (String, Vec<String>) {
    match platform {
        Platform::Windows => ("cmd".into(), vec!["/C".into(), command.into()]),
        Platform::MacOs | Platform::Linux => ("sh".into(), vec!["-c".into(), command.into()]),
    }
}

/// Program and arguments that hand `target` to the desktop opener.
pub fn opener_invocation(platform: Platform, target: &str) -> (String, Vec<String>) {
    match platform {
        // The empty string is `start`'s window title.
        Platform::Windows => (
            "cmd".into(),
            vec!["/C".into(), "start".into(), String::new(), target.into()],
        ),
        Platform::MacOs => ("open".into(), vec![target.into()]),
        Platform::Linux => ("xdg-open".into(), vec![target.into()]),
    }
}

/// Program and arguments that launch `app`, opening `cwd` when given.
pub fn application_invocation(
    platform: Platform,
    app: &str,
    cwd: Option<&Path>,
) -> (String, Vec<String>) {
    let dir = cwd.map(|d| d.display().to_string());
    match (platform, dir) {
        (Platform::MacOs, Some(dir)) => ("open".into(), vec!["-a".into(), app.into(), dir]),
        (Platform::MacOs, None) => ("open".into(), vec!["-a".into(), app.into()]),
        (Platform::Linux | Platform::Windows, Some(dir)) => (app.into(), vec![dir]),
        (_, None) => opener_invocation(platform, app),
    }
}

fn is_vscode(app: &str) -> bool {
    let lower = app.to_lowercase();
    lower == "code" || lower.contains("visual studio code") || lower.contains("vscode")
}

fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn spawn_failed(program: &str, e: std::io::Error) -> AdapterError {
    AdapterError::SpawnFailed {
        program: program.to_string(),
        reason: e.to_string(),
    }
}

/// Truncate raw output to [`MAX_OUTPUT_BYTES`] as lossy UTF-8.  Returns
/// `(output, was_truncated)`.
fn truncate_output(raw: &[u8]) -> (String, bool) {
    if raw.len() <= MAX_OUTPUT_BYTES {
        (String::from_utf8_lossy(raw).into_owned(), false)
    } else {
        let mut s = String::from_utf8_lossy(&raw[..MAX_OUTPUT_BYTES]).into_owned();
        s.push_str("\n... [output truncated at 100 KB]");
        (s, true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_invocations() {
        assert_eq!(
            shell_invocation(Platform::Linux, "ls -la"),
            ("sh".to_string(), vec!["-c".to_string(), "ls -la".to_string()])
        );
        assert_eq!(
            shell_invocation(Platform::Windows, "dir").1,
            vec!["/C".to_string(), "dir".to_string()]
        );
    }

    #[test]
    fn opener_per_platform() {
        assert_eq!(opener_invocation(Platform::Linux, "https://x.y").0, "xdg-open");
        assert_eq!(opener_invocation(Platform::MacOs, "https://x.y").0, "open");
        let (program, args) = opener_invocation(Platform::Windows, "https://x.y");
        assert_eq!(program, "cmd");
        assert_eq!(args, vec!["/C", "start", "", "https://x.y"]);
    }

    #[test]
    fn application_with_directory() {
        let dir = Path::new("/work/proj");
        assert_eq!(
            application_invocation(Platform::MacOs, "Visual Studio Code", Some(dir)),
            (
                "open".to_string(),
                vec!["-a".into(), "Visual Studio Code".into(), "/work/proj".into()]
            )
        );
        assert_eq!(
            application_invocation(Platform::Linux, "code", Some(dir)),
            ("code".to_string(), vec!["/work/proj".to_string()])
        );
    }

    #[test]
    fn application_without_directory_uses_opener() {
        assert_eq!(
            application_invocation(Platform::MacOs, "Safari", None),
            ("open".to_string(), vec!["-a".to_string(), "Safari".to_string()])
        );
        assert_eq!(
            application_invocation(Platform::Linux, "/usr/bin/gimp", None),
            ("xdg-open".to_string(), vec!["/usr/bin/gimp".to_string()])
        );
    }

    #[test]
    fn vscode_detection() {
        assert!(is_vscode("code"));
        assert!(is_vscode("Visual Studio Code"));
        assert!(!is_vscode("codeblocks"));
    }

    #[test]
    fn truncate_output_short() {
        let (out, truncated) = truncate_output(b"hello");
        assert_eq!(out, "hello");
        assert!(!truncated);
    }

    #[test]
    fn truncate_output_long() {
        let raw = vec![b'x'; MAX_OUTPUT_BYTES + 10];
        let (out, truncated) = truncate_output(&raw);
        assert!(truncated);
        assert!(out.ends_with("[output truncated at 100 KB]"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_runs_to_completion() {
        let launcher = SystemLauncher::for_platform(Platform::Linux);
        let out = launcher
            .run_command_line("sleep 1 && echo done", None)
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "done");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_command_line_captures_stdout() {
        let launcher = SystemLauncher::for_platform(Platform::Linux);
        let out = launcher.run_command_line("echo hello", None).await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.command, "echo hello");
        assert!(!out.truncated);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_command_line_uses_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = SystemLauncher::for_platform(Platform::Linux);
        let out = launcher
            .run_command_line("pwd", Some(dir.path()))
            .await
            .unwrap();
        let reported = std::fs::canonicalize(out.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_command_failed() {
        let launcher = SystemLauncher::for_platform(Platform::Linux);
        let err = launcher
            .run_command_line("echo oops >&2; exit 3", None)
            .await
            .unwrap_err();
        match err {
            AdapterError::CommandFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr.trim(), "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
