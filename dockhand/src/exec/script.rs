//! Remote shell script builder
//!
//! Remote work is shipped to `bash -s` on the target as a script. Every value
//! that comes from the run (paths, names, ports) goes through [`shell_quote`],
//! so identifiers are never spliced into the script as raw text.

use crate::errors::DeployError;

/// Quote a value for POSIX shells using single quotes
pub fn shell_quote(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

/// Quote every element of an argv and join with spaces
pub fn quote_argv<I, S>(argv: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    argv.into_iter()
        .map(|a| shell_quote(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Line-oriented bash script
#[derive(Debug, Clone)]
pub struct RemoteScript {
    use_sudo: bool,
    lines: Vec<String>,
}

impl RemoteScript {
    /// A fail-fast script: the first failing line aborts it
    pub fn new(use_sudo: bool) -> Self {
        Self {
            use_sudo,
            lines: vec!["set -euo pipefail".to_string()],
        }
    }

    /// `sudo -n ` when privileged commands need elevation, otherwise empty
    pub fn sudo(&self) -> &'static str {
        if self.use_sudo {
            "sudo -n "
        } else {
            ""
        }
    }

    /// Run a command with quoted arguments
    pub fn command<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lines.push(quote_argv(argv));
        self
    }

    /// Run a command with quoted arguments under sudo
    pub fn privileged<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let line = format!("{}{}", self.sudo(), quote_argv(argv));
        self.lines.push(line);
        self
    }

    /// Change into a directory for the rest of the script
    pub fn cd(mut self, dir: &str) -> Self {
        self.lines.push(format!("cd {}", shell_quote(dir)));
        self
    }

    /// Append a line verbatim. Callers must quote dynamic values with
    /// [`shell_quote`] themselves.
    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Write `content` to `path` through a quoted heredoc, with sudo when
    /// `privileged` is set.
    pub fn write_file(self, path: &str, content: &str, privileged: bool) -> Result<Self, DeployError> {
        const DELIMITER: &str = "DOCKHAND_EOF";
        if content.lines().any(|l| l.trim() == DELIMITER) {
            return Err(DeployError::Internal(format!(
                "File content for {} contains the heredoc delimiter",
                path
            )));
        }
        let sudo = if privileged { self.sudo() } else { "" };
        let mut body = content.to_string();
        if !body.ends_with('\n') {
            body.push('\n');
        }
        let line = format!(
            "{}tee {} >/dev/null <<'{}'\n{}{}",
            sudo,
            shell_quote(path),
            DELIMITER,
            body,
            DELIMITER
        );
        Ok(self.line(line))
    }

    /// Render the script text
    pub fn render(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}
