//! Command execution on the NIM master and on VIOS partitions.
//!
//! Every component talks to the outside world through [`RemoteExecutor`].
//! The shell implementation runs master commands locally and reaches a VIOS
//! through the NIM remote shell. Output is captured line by line with the
//! locale pinned to `C` so the text parsers see stable messages.

use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        self.stdout.join("\n")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to start [{command}] on {host}: {err}")]
    Start {
        host: String,
        command: String,
        err: std::io::Error,
    },
}

/// Runs a shell command line on a host.
///
/// `Err` means the command could not be launched at all; a command that ran
/// and failed is `Ok` with `success == false`.
pub trait RemoteExecutor: Send + Sync {
    fn execute(&self, host: &str, command: &str) -> Result<CommandOutput, ExecError>;
}

/// Default NIM remote shell.
pub const C_RSH: &str = "/usr/lpp/bos.sysmgt/nim/methods/c_rsh";

/// Shell-out executor: `/bin/sh -c` on the master, the remote shell elsewhere.
pub struct ShellExecutor {
    master: String,
    remote_shell: PathBuf,
    env: Vec<(String, String)>,
}

impl ShellExecutor {
    pub fn new(master: impl Into<String>, remote_shell: impl Into<PathBuf>) -> Self {
        Self {
            master: master.into(),
            remote_shell: remote_shell.into(),
            env: vec![
                ("LANG".to_string(), "C".to_string()),
                ("LC_ALL".to_string(), "C".to_string()),
            ],
        }
    }

    /// Adds or replaces an environment variable for every command.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.env.retain(|(k, _)| *k != key);
        self.env.push((key, value.into()));
        self
    }

    fn command_for(&self, host: &str, command: &str) -> Command {
        let mut cmd = if host == self.master {
            let mut cmd = Command::new("/bin/sh");
            cmd.arg("-c").arg(command);
            cmd
        } else {
            let mut cmd = Command::new(&self.remote_shell);
            cmd.arg(host).arg(command);
            cmd
        };
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd
    }
}

impl RemoteExecutor for ShellExecutor {
    fn execute(&self, host: &str, command: &str) -> Result<CommandOutput, ExecError> {
        debug!(host, command, "executing");
        let output = self
            .command_for(host, command)
            .output()
            .map_err(|err| ExecError::Start {
                host: host.to_string(),
                command: command.to_string(),
                err,
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: split_lines(&output.stdout),
            stderr: split_lines(&output.stderr),
        })
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
pub mod testing {
    //! A scripted executor for tests: canned output per command pattern.

    use std::sync::Mutex;

    use super::{CommandOutput, ExecError, RemoteExecutor};

    struct Rule {
        host: Option<String>,
        pattern: String,
        responses: Vec<CommandOutput>,
    }

    /// Answers commands from rules registered with [`ScriptedExecutor::on`].
    ///
    /// The first rule whose host matches and whose pattern is a substring of
    /// the command wins. Its responses are consumed in order; the last one
    /// repeats. Unmatched commands fail with empty output.
    #[derive(Default)]
    pub struct ScriptedExecutor {
        rules: Mutex<Vec<Rule>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers responses for commands on any host containing `pattern`.
        pub fn on(&self, pattern: &str, responses: Vec<CommandOutput>) -> &Self {
            self.add(None, pattern, responses)
        }

        /// Registers responses for commands on `host` containing `pattern`.
        pub fn on_host(&self, host: &str, pattern: &str, responses: Vec<CommandOutput>) -> &Self {
            self.add(Some(host.to_string()), pattern, responses)
        }

        fn add(&self, host: Option<String>, pattern: &str, responses: Vec<CommandOutput>) -> &Self {
            assert!(!responses.is_empty(), "a rule needs at least one response");
            self.rules.lock().unwrap().push(Rule {
                host,
                pattern: pattern.to_string(),
                responses,
            });
            self
        }

        /// Every `(host, command)` executed so far.
        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }

        /// Commands executed so far containing `pattern`.
        pub fn calls_matching(&self, pattern: &str) -> Vec<(String, String)> {
            self.calls()
                .into_iter()
                .filter(|(_, cmd)| cmd.contains(pattern))
                .collect()
        }
    }

    impl RemoteExecutor for ScriptedExecutor {
        fn execute(&self, host: &str, command: &str) -> Result<CommandOutput, ExecError> {
            self.calls
                .lock()
                .unwrap()
                .push((host.to_string(), command.to_string()));

            let mut rules = self.rules.lock().unwrap();
            let rule = rules.iter_mut().find(|r| {
                r.host.as_deref().is_none_or(|h| h == host) && command.contains(&r.pattern)
            });
            let Some(rule) = rule else {
                return Ok(CommandOutput::default());
            };
            if rule.responses.len() > 1 {
                Ok(rule.responses.remove(0))
            } else {
                Ok(rule.responses[0].clone())
            }
        }
    }

    /// A successful command printing `stdout`.
    pub fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            success: true,
            stdout: stdout.lines().map(str::to_string).collect(),
            stderr: Vec::new(),
        }
    }

    /// A failed command printing `stdout`.
    pub fn failed(stdout: &str) -> CommandOutput {
        CommandOutput {
            success: false,
            ..ok(stdout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ScriptedExecutor, failed, ok};
    use super::*;

    use std::ffi::OsStr;

    #[test]
    fn master_commands_run_under_sh() {
        let exec = ShellExecutor::new("master", C_RSH);
        let cmd = exec.command_for("master", "lsnim -t vios");

        assert_eq!(cmd.get_program(), "/bin/sh");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, ["-c", "lsnim -t vios"]);
    }

    #[test]
    fn vios_commands_go_through_remote_shell() {
        let exec = ShellExecutor::new("master", C_RSH);
        let cmd = exec.command_for("vios1", "oslevel -s");

        assert_eq!(cmd.get_program(), C_RSH);
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, ["vios1", "oslevel -s"]);
    }

    #[test]
    fn locale_is_pinned_and_overridable() {
        let exec = ShellExecutor::new("master", C_RSH).with_env("LANG", "POSIX");
        let cmd = exec.command_for("vios1", "true");
        let envs: Vec<_> = cmd.get_envs().collect();

        assert!(envs.contains(&(OsStr::new("LANG"), Some(OsStr::new("POSIX")))));
        assert!(envs.contains(&(OsStr::new("LC_ALL"), Some(OsStr::new("C")))));
    }

    #[test]
    fn local_command_output_is_captured() {
        let exec = ShellExecutor::new("master", C_RSH);
        let out = exec
            .execute("master", "echo one; echo two; echo oops >&2; exit 3")
            .unwrap();

        assert!(!out.success);
        assert_eq!(out.stdout, vec!["one", "two"]);
        assert_eq!(out.stderr, vec!["oops"]);
    }

    #[test]
    fn scripted_responses_are_consumed_in_order() {
        let exec = ScriptedExecutor::new();
        exec.on("lsnim", vec![failed("first"), ok("second")]);

        assert!(!exec.execute("master", "lsnim x").unwrap().success);
        assert!(exec.execute("master", "lsnim x").unwrap().success);
        assert!(exec.execute("master", "lsnim x").unwrap().success);
        assert_eq!(exec.calls_matching("lsnim").len(), 3);
    }
}
