//! Command descriptions and captured results

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Exit status used when the program could not be started at all
pub const STATUS_NOT_STARTED: i32 = 127;

/// One command line argument
#[derive(Debug)]
pub enum Arg {
    Plain(String),
    /// Passed to the process as-is but printed as `***`
    Secret(SecretString),
}

impl Arg {
    pub fn expose(&self) -> &str {
        match self {
            Arg::Plain(value) => value,
            Arg::Secret(value) => value.expose_secret(),
        }
    }
}

/// A program invocation: argv, environment and an optional payload
/// written to stdin.
#[derive(Debug)]
pub struct CommandSpec {
    program: String,
    args: Vec<Arg>,
    envs: Vec<(String, String)>,
    stdin: Option<String>,
    masks: Vec<SecretString>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            stdin: None,
            masks: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Plain(arg.into()));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|a| Arg::Plain(a.into())));
        self
    }

    pub fn secret_arg(mut self, arg: SecretString) -> Self {
        self.args.push(Arg::Secret(arg));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    /// Hide an additional value from captured output
    pub fn mask(mut self, value: SecretString) -> Self {
        self.masks.push(value);
        self
    }

    /// Replace every secret argument and masked value in `text` with `***`
    pub fn redact(&self, text: &str) -> String {
        let secrets = self
            .args
            .iter()
            .filter_map(|a| match a {
                Arg::Secret(s) => Some(s.expose_secret()),
                Arg::Plain(_) => None,
            })
            .chain(self.masks.iter().map(|m| m.expose_secret()))
            .filter(|s| !s.is_empty());

        let mut redacted = text.to_string();
        for secret in secrets {
            redacted = redacted.replace(secret, "***");
        }
        redacted
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments with secrets exposed, for handing to the OS
    pub fn exposed_args(&self) -> Vec<&str> {
        self.args.iter().map(Arg::expose).collect()
    }

    pub fn env_vars(&self) -> &[(String, String)] {
        &self.envs
    }

    pub fn stdin_payload(&self) -> Option<&str> {
        self.stdin.as_deref()
    }
}

impl fmt::Display for CommandSpec {
    /// Shell-like rendering for logs; secret arguments are masked
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            match arg {
                Arg::Plain(value) => write!(f, " {}", display_quote(value))?,
                Arg::Secret(_) => f.write_str(" ***")?,
            }
        }
        Ok(())
    }
}

fn display_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@^%,+".contains(c));
    if plain {
        value.to_string()
    } else {
        crate::exec::script::shell_quote(value)
    }
}

/// Exit status and captured output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.trim_end(), self.stderr.trim_end()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        }
    }

    /// Last non-empty line of the combined output, for error messages
    pub fn last_line(&self) -> String {
        self.combined()
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .map(|l| l.trim().to_string())
            .unwrap_or_else(|| format!("exit status {}", self.status))
    }
}
