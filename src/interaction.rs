//! User prompts used by the workflow.
//!
//! Every prompt returns `None` when the user cancels. The workflow only sees
//! the [`Interaction`] trait; the binary wires up a terminal implementation,
//! optionally fronted by answers given on the command line.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Prompt titles. Also the keys used by [`PrefilledInteraction`].
pub mod titles {
    pub const CSV_FILE: &str = "Select Student Data CSV";
    pub const REPORTS_DIR: &str = "Select PDF Reports Folder";
    pub const EMAIL: &str = "Email";
    pub const PASSWORD: &str = "Password";
    pub const SMTP_HOST: &str = "SMTP";
    pub const SMTP_PORT: &str = "Port";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => f.write_str("INFO"),
            Severity::Error => f.write_str("ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity: Severity::Info,
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FileFilter {
    pub description: &'static str,
    pub extension: &'static str,
}

pub const CSV_FILES: FileFilter = FileFilter {
    description: "CSV Files",
    extension: "csv",
};

impl FileFilter {
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension))
    }
}

pub trait Interaction {
    fn pick_file(&mut self, title: &str, filter: FileFilter) -> Option<PathBuf>;
    fn pick_directory(&mut self, title: &str) -> Option<PathBuf>;
    fn ask_text(&mut self, title: &str, prompt: &str) -> Option<String>;
    fn ask_secret(&mut self, title: &str, prompt: &str) -> Option<String>;
    fn ask_text_with_default(&mut self, title: &str, prompt: &str, default: &str)
        -> Option<String>;
    fn ask_integer_with_default(&mut self, title: &str, prompt: &str, default: i64)
        -> Option<i64>;
    fn notify(&mut self, notification: &Notification);
}

/// Line-oriented prompts over any reader/writer pair.
pub struct TerminalInteraction<R, W> {
    input: R,
    output: W,
    mask_secrets: bool,
}

impl TerminalInteraction<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self {
            input: io::stdin().lock(),
            output: io::stderr(),
            mask_secrets: true,
        }
    }
}

impl<R: BufRead, W: Write> TerminalInteraction<R, W> {
    /// Secrets are read as plain lines from `input`.
    #[cfg(test)]
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            mask_secrets: false,
        }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }

    fn prompt(&mut self, label: &str) -> Option<String> {
        let _ = write!(self.output, "{label}: ");
        let _ = self.output.flush();

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn say(&mut self, message: &str) {
        let _ = writeln!(self.output, "{message}");
    }
}

impl<R: BufRead, W: Write> Interaction for TerminalInteraction<R, W> {
    fn pick_file(&mut self, title: &str, filter: FileFilter) -> Option<PathBuf> {
        loop {
            let answer = self.prompt(&format!("{title} ({})", filter.description))?;
            if answer.is_empty() {
                return None;
            }
            let path = PathBuf::from(answer);
            if !path.is_file() {
                self.say(&format!("{} is not a readable file", path.display()));
            } else if !filter.accepts(&path) {
                self.say(&format!("expected a *.{} file", filter.extension));
            } else {
                return Some(path);
            }
        }
    }

    fn pick_directory(&mut self, title: &str) -> Option<PathBuf> {
        loop {
            let answer = self.prompt(title)?;
            if answer.is_empty() {
                return None;
            }
            let path = PathBuf::from(answer);
            if path.is_dir() {
                return Some(path);
            }
            self.say(&format!("{} is not a directory", path.display()));
        }
    }

    fn ask_text(&mut self, _title: &str, prompt: &str) -> Option<String> {
        self.prompt(prompt)
    }

    fn ask_secret(&mut self, title: &str, prompt: &str) -> Option<String> {
        if !self.mask_secrets {
            return self.ask_text(title, prompt);
        }
        rpassword::prompt_password(format!("{prompt}: "))
            .ok()
            .map(|secret| secret.trim().to_string())
    }

    fn ask_text_with_default(
        &mut self,
        _title: &str,
        prompt: &str,
        default: &str,
    ) -> Option<String> {
        let answer = self.prompt(&format!("{prompt} [{default}]"))?;
        if answer.is_empty() {
            Some(default.to_string())
        } else {
            Some(answer)
        }
    }

    fn ask_integer_with_default(
        &mut self,
        _title: &str,
        prompt: &str,
        default: i64,
    ) -> Option<i64> {
        loop {
            let answer = self.prompt(&format!("{prompt} [{default}]"))?;
            if answer.is_empty() {
                return Some(default);
            }
            match answer.parse() {
                Ok(value) => return Some(value),
                Err(_) => self.say("please enter a whole number"),
            }
        }
    }

    fn notify(&mut self, notification: &Notification) {
        let _ = writeln!(
            self.output,
            "[{}] {}\n{}",
            notification.severity, notification.title, notification.message
        );
    }
}

/// Answers prompts from values given up front and asks `inner` for the rest.
///
/// Prefilled values are matched by prompt title (see [`titles`]).
pub struct PrefilledInteraction<I> {
    inner: I,
    csv_file: Option<PathBuf>,
    reports_dir: Option<PathBuf>,
    email: Option<String>,
    password: Option<String>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
}

impl<I: Interaction> PrefilledInteraction<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            csv_file: None,
            reports_dir: None,
            email: None,
            password: None,
            smtp_host: None,
            smtp_port: None,
        }
    }

    pub fn csv_file(mut self, value: Option<PathBuf>) -> Self {
        self.csv_file = value;
        self
    }

    pub fn reports_dir(mut self, value: Option<PathBuf>) -> Self {
        self.reports_dir = value;
        self
    }

    pub fn email(mut self, value: Option<String>) -> Self {
        self.email = value;
        self
    }

    pub fn password(mut self, value: Option<String>) -> Self {
        self.password = value;
        self
    }

    pub fn smtp_host(mut self, value: Option<String>) -> Self {
        self.smtp_host = value;
        self
    }

    pub fn smtp_port(mut self, value: Option<u16>) -> Self {
        self.smtp_port = value;
        self
    }
}

impl<I: Interaction> Interaction for PrefilledInteraction<I> {
    fn pick_file(&mut self, title: &str, filter: FileFilter) -> Option<PathBuf> {
        if title == titles::CSV_FILE {
            if let Some(path) = self.csv_file.take() {
                return Some(path);
            }
        }
        self.inner.pick_file(title, filter)
    }

    fn pick_directory(&mut self, title: &str) -> Option<PathBuf> {
        if title == titles::REPORTS_DIR {
            if let Some(path) = self.reports_dir.take() {
                return Some(path);
            }
        }
        self.inner.pick_directory(title)
    }

    fn ask_text(&mut self, title: &str, prompt: &str) -> Option<String> {
        if title == titles::EMAIL {
            if let Some(email) = self.email.take() {
                return Some(email);
            }
        }
        self.inner.ask_text(title, prompt)
    }

    fn ask_secret(&mut self, title: &str, prompt: &str) -> Option<String> {
        if title == titles::PASSWORD {
            if let Some(password) = self.password.take() {
                return Some(password);
            }
        }
        self.inner.ask_secret(title, prompt)
    }

    fn ask_text_with_default(
        &mut self,
        title: &str,
        prompt: &str,
        default: &str,
    ) -> Option<String> {
        if title == titles::SMTP_HOST {
            if let Some(host) = self.smtp_host.take() {
                return Some(host);
            }
        }
        self.inner.ask_text_with_default(title, prompt, default)
    }

    fn ask_integer_with_default(
        &mut self,
        title: &str,
        prompt: &str,
        default: i64,
    ) -> Option<i64> {
        if title == titles::SMTP_PORT {
            if let Some(port) = self.smtp_port.take() {
                return Some(i64::from(port));
            }
        }
        self.inner.ask_integer_with_default(title, prompt, default)
    }

    fn notify(&mut self, notification: &Notification) {
        self.inner.notify(notification);
    }
}
