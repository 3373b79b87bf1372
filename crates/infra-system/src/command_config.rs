// External generation tool invocation settings

use std::collections::HashMap;
use std::path::PathBuf;

/// Default program for the generation tool
pub const DEFAULT_PROGRAM: &str = "claude";

/// Environment variables a child process may inherit
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &[
    "PATH", "HOME", "USER", "LANG", "LC_ALL", "TMPDIR", "TERM",
];

/// How to launch the external generation tool
#[derive(Debug, Clone)]
pub struct CliCommandConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory (`~` expanded); inherits the daemon's when `None`
    pub working_dir: Option<PathBuf>,
    /// Inherited environment is cleared except for these names
    pub env_allowlist: Vec<String>,
    /// Arguments for the authentication probe invocation
    pub auth_check_args: Vec<String>,
}

impl Default for CliCommandConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: vec!["--print".to_string()],
            working_dir: None,
            env_allowlist: DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect(),
            auth_check_args: vec!["--version".to_string()],
        }
    }
}

impl CliCommandConfig {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            ..Self::default()
        }
    }

    pub fn with_working_dir(mut self, dir: &str) -> Self {
        self.working_dir = Some(PathBuf::from(shellexpand::tilde(dir).into_owned()));
        self
    }

    pub fn with_env_allowlist(mut self, names: Vec<String>) -> Self {
        self.env_allowlist = names;
        self
    }

    pub fn with_auth_check_args(mut self, args: Vec<String>) -> Self {
        self.auth_check_args = args;
        self
    }

    /// Filter environment variables to the allowlist only
    pub fn filter_env<I>(&self, env: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        env.into_iter()
            .filter(|(k, _)| self.env_allowlist.iter().any(|allowed| allowed == k))
            .collect()
    }

    /// Build a tokio command with the cleared, allowlisted environment
    pub(crate) fn command(&self, args: &[String]) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(args)
            .env_clear()
            .envs(self.filter_env(std::env::vars()));
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}
