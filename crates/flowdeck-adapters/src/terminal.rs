//! Detached terminal windows.
//!
//! A terminal step that asks for its own window is run by writing the
//! commands into a throwaway script and handing that script to a visible
//! terminal:
//!
//! - **Linux**: a `#!/bin/bash` script in the temp directory, launched with
//!   the first installed emulator from a preference list.
//! - **macOS**: `osascript` asking Terminal.app to `do script`.
//! - **Windows**: a `.bat` file started in a new `cmd.exe /k` window.
//!
//! Every variant waits for the user before the window closes.  Spawning is
//! fire-and-forget: the child handle is dropped without waiting.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::{debug, info};

use crate::error::{AdapterError, Result};
use crate::traits::Platform;

/// Placeholder replaced by the script path in emulator argument templates.
const SCRIPT_PLACEHOLDER: &str = "{script}";

// ---------------------------------------------------------------------------
// Emulators
// ---------------------------------------------------------------------------

/// A terminal emulator and the arguments that make it run a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalEmulator {
    /// Executable name looked up on `PATH`.
    pub name: String,
    /// Argument template; `{script}` is replaced by the script path.
    pub args: Vec<String>,
}

impl TerminalEmulator {
    pub fn new(name: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Argument template for a known emulator name.  Unknown names get the
    /// xterm-style `-e /bin/bash <script>`.
    pub fn for_name(name: &str) -> Self {
        match name {
            "gnome-terminal" => Self::new(name, &["--", "/bin/bash", SCRIPT_PLACEHOLDER]),
            "konsole" => Self::new(name, &["--noclose", "-e", "/bin/bash", SCRIPT_PLACEHOLDER]),
            "xfce4-terminal" => Self::new(name, &["--hold", "-e", "/bin/bash {script}"]),
            _ => Self::new(name, &["-e", "/bin/bash", SCRIPT_PLACEHOLDER]),
        }
    }

    /// Concrete arguments for running `script`.
    pub fn command_args(&self, script: &Path) -> Vec<String> {
        let script = script.display().to_string();
        self.args
            .iter()
            .map(|a| a.replace(SCRIPT_PLACEHOLDER, &script))
            .collect()
    }
}

/// Emulator names tried in order when nothing is configured.
pub const DEFAULT_EMULATORS: &[&str] = &["gnome-terminal", "xterm", "konsole", "xfce4-terminal"];

/// The default emulator preference list.
pub fn default_emulators() -> Vec<TerminalEmulator> {
    DEFAULT_EMULATORS
        .iter()
        .map(|n| TerminalEmulator::for_name(n))
        .collect()
}

// ---------------------------------------------------------------------------
// Script builders
// ---------------------------------------------------------------------------

/// Bash script: optional `cd`, the commands joined with `; `, then a pause.
pub fn posix_script(commands: &[String], cwd: Option<&Path>) -> String {
    let mut script = String::from("#!/bin/bash\n");
    if let Some(dir) = cwd {
        script.push_str(&format!("cd \"{}\"\n", dir.display()));
    }
    script.push_str(&commands.join("; "));
    script.push_str("\necho \"Press enter to close...\"\nread\n");
    script
}

/// Batch file: optional `cd /d`, one command per line, then `pause`.
pub fn batch_script(commands: &[String], cwd: Option<&Path>) -> String {
    let mut script = String::new();
    if let Some(dir) = cwd {
        script.push_str(&format!("cd /d \"{}\"\r\n", dir.display()));
    }
    for cmd in commands {
        script.push_str(cmd);
        script.push_str("\r\n");
    }
    script.push_str("pause\r\n");
    script
}

/// AppleScript telling Terminal.app to run the commands.
pub fn apple_script(commands: &[String], cwd: Option<&Path>) -> String {
    let joined = commands.join("; ");
    let body = match cwd {
        Some(dir) => format!("cd \"{}\" && {joined}", dir.display()),
        None => joined,
    };
    let escaped = body.replace('\\', "\\\\").replace('"', "\\\"");
    format!("tell application \"Terminal\" to do script \"{escaped}\"")
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Spawns visible terminal windows for a given platform.
#[derive(Debug, Clone)]
pub struct TerminalSpawner {
    platform: Platform,
    emulators: Vec<TerminalEmulator>,
    script_dir: PathBuf,
}

impl TerminalSpawner {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            emulators: default_emulators(),
            script_dir: std::env::temp_dir(),
        }
    }

    /// Replace the emulator preference list (Linux only).
    pub fn with_emulators(mut self, emulators: Vec<TerminalEmulator>) -> Self {
        self.emulators = emulators;
        self
    }

    /// Directory generated scripts are written to.
    pub fn with_script_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_dir = dir.into();
        self
    }

    /// Spawn a window running `commands`.  Does not wait for it.
    pub async fn spawn(&self, commands: &[String], cwd: Option<&Path>) -> Result<()> {
        if commands.is_empty() {
            return Err(AdapterError::InvalidInput(
                "no commands to run in terminal".into(),
            ));
        }

        match self.platform {
            Platform::Windows => {
                let path = self.write_script("bat", &batch_script(commands, cwd)).await?;
                let path = path.display().to_string();
                detach(
                    "cmd.exe",
                    &["/c".into(), "start".into(), "cmd.exe".into(), "/k".into(), path],
                )
            }
            Platform::MacOs => detach("osascript", &["-e".into(), apple_script(commands, cwd)]),
            Platform::Linux => {
                let emulator = self.find_emulator().await?;
                let path = self.write_script("sh", &posix_script(commands, cwd)).await?;
                info!(terminal = %emulator.name, script = %path.display(), "opening terminal window");
                detach(&emulator.name, &emulator.command_args(&path)).inspect_err(|_| {
                    if let Err(e) = std::fs::remove_file(&path) {
                        debug!(script = %path.display(), error = %e, "could not remove script");
                    }
                })
            }
        }
    }

    /// First emulator in the preference list that is on `PATH`.
    pub async fn find_emulator(&self) -> Result<TerminalEmulator> {
        for emulator in &self.emulators {
            if is_installed(&emulator.name).await {
                return Ok(emulator.clone());
            }
            debug!(terminal = %emulator.name, "terminal emulator not installed");
        }
        Err(AdapterError::NoTerminal {
            tried: self.emulators.iter().map(|e| e.name.clone()).collect(),
        })
    }

    async fn write_script(&self, extension: &str, contents: &str) -> Result<PathBuf> {
        let path = self
            .script_dir
            .join(format!("flowdeck_cmd_{}.{extension}", uuid::Uuid::now_v7().simple()));
        tokio::fs::write(&path, contents).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).await?;
        }

        debug!(script = %path.display(), "terminal script written");
        Ok(path)
    }
}

async fn is_installed(name: &str) -> bool {
    match tokio::process::Command::new("which")
        .arg(name)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
    {
        Ok(out) => out.status.success() && !out.stdout.trim_ascii().is_empty(),
        Err(_) => false,
    }
}

/// Spawn `program` with all stdio detached and drop the handle.
fn detach(program: &str, args: &[String]) -> Result<()> {
    tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(drop)
        .map_err(|e| AdapterError::SpawnFailed {
            program: program.to_string(),
            reason: e.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn cmds(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn posix_script_with_directory() {
        let script = posix_script(&cmds(&["npm i", "npm run dev"]), Some(Path::new("/srv/app")));
        assert_eq!(
            script,
            "#!/bin/bash\ncd \"/srv/app\"\nnpm i; npm run dev\necho \"Press enter to close...\"\nread\n"
        );
    }

    #[test]
    fn posix_script_without_directory() {
        let script = posix_script(&cmds(&["ls"]), None);
        assert!(script.starts_with("#!/bin/bash\nls\n"));
    }

    #[test]
    fn batch_script_lines() {
        let script = batch_script(&cmds(&["dir", "echo hi"]), Some(Path::new("C:\\work")));
        assert_eq!(script, "cd /d \"C:\\work\"\r\ndir\r\necho hi\r\npause\r\n");
    }

    #[test]
    fn apple_script_escapes_quotes() {
        let script = apple_script(&cmds(&["echo \"hi\""]), Some(Path::new("/tmp")));
        assert_eq!(
            script,
            "tell application \"Terminal\" to do script \"cd \\\"/tmp\\\" && echo \\\"hi\\\"\""
        );
    }

    #[test]
    fn emulator_argument_templates() {
        let script = Path::new("/tmp/x.sh");
        assert_eq!(
            TerminalEmulator::for_name("gnome-terminal").command_args(script),
            vec!["--", "/bin/bash", "/tmp/x.sh"]
        );
        assert_eq!(
            TerminalEmulator::for_name("xterm").command_args(script),
            vec!["-e", "/bin/bash", "/tmp/x.sh"]
        );
        assert_eq!(
            TerminalEmulator::for_name("konsole").command_args(script),
            vec!["--noclose", "-e", "/bin/bash", "/tmp/x.sh"]
        );
        assert_eq!(
            TerminalEmulator::for_name("xfce4-terminal").command_args(script),
            vec!["--hold", "-e", "/bin/bash /tmp/x.sh"]
        );
    }

    #[test]
    fn default_preference_order() {
        let names: Vec<String> = default_emulators().into_iter().map(|e| e.name).collect();
        assert_eq!(names, DEFAULT_EMULATORS);
    }

    #[tokio::test]
    async fn no_installed_emulator_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let spawner = TerminalSpawner::new(Platform::Linux)
            .with_emulators(vec![TerminalEmulator::for_name(
                "flowdeck-definitely-not-a-terminal",
            )])
            .with_script_dir(dir.path());

        let err = spawner.spawn(&cmds(&["true"]), None).await.unwrap_err();
        assert!(matches!(err, AdapterError::NoTerminal { .. }));
        assert!(err.to_string().starts_with("No suitable terminal found"));

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0, "no script should be left behind");
    }

    #[tokio::test]
    async fn empty_command_list_rejected() {
        let spawner = TerminalSpawner::new(Platform::Linux);
        let err = spawner.spawn(&[], None).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidInput(_)));
    }
}
