//! Report delivery by mail
//!
//! A report is the log of one top-level run, sent to every configured
//! receiver. Two transports ship with the crate:
//! - `mail`: pipes the message into the local `sendmail -t -i`
//! - `smtp`: hands the message to `curl` speaking SMTP

use crate::config::{MailerKind, MailerOptions, ReportConfig};
use crate::utils::command::ToolInvocation;
use crate::utils::executor::CommandExecutor;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::fs;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_FROM: &str = "backuping@localhost";

/// Payload bytes per RFC 2047 encoded word, keeping each word under 75 chars
const ENCODED_WORD_BYTES: usize = 45;

/// Header text safe to put on one header line
///
/// CR and LF become spaces. Non-ASCII text is sent as folded UTF-8
/// `=?UTF-8?B?...?=` encoded words.
fn encode_header_text(text: &str) -> String {
    let text: String = text
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    if text.is_ascii() {
        return text;
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in text.chars() {
        if chunk.len() + c.len_utf8() > ENCODED_WORD_BYTES {
            words.push(std::mem::take(&mut chunk));
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(chunk);
    }

    words
        .iter()
        .map(|word| format!("=?UTF-8?B?{}?=", STANDARD.encode(word.as_bytes())))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// A mailbox: address plus optional display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub name: String,
    pub address: String,
}

impl Mailbox {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    fn header_value(&self) -> String {
        let address = encode_header_text(&self.address);
        if self.name.trim().is_empty() {
            address
        } else if self.name.is_ascii() {
            format!("\"{}\" <{}>", encode_header_text(&self.name.replace('"', "")), address)
        } else {
            format!("{} <{}>", encode_header_text(&self.name), address)
        }
    }
}

/// A composed report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub subject: String,
    pub from: Mailbox,
    pub receivers: Vec<Mailbox>,
    pub message: String,
}

impl Report {
    pub fn new(subject: impl Into<String>, from: Mailbox) -> Self {
        Self {
            subject: subject.into(),
            from,
            receivers: Vec::new(),
            message: String::new(),
        }
    }

    pub fn add_receiver(mut self, receiver: Mailbox) -> Self {
        self.receivers.push(receiver);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// RFC 5322 rendering with CRLF line endings
    pub fn to_rfc5322(&self) -> String {
        let to = self
            .receivers
            .iter()
            .map(Mailbox::header_value)
            .collect::<Vec<_>>()
            .join(", ");

        let mut out = String::new();
        out.push_str(&format!("From: {}\r\n", self.from.header_value()));
        out.push_str(&format!("To: {}\r\n", to));
        out.push_str(&format!("Subject: {}\r\n", encode_header_text(&self.subject)));
        out.push_str(&format!("Date: {}\r\n", chrono::Utc::now().to_rfc2822()));
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        out.push_str("Content-Transfer-Encoding: 8bit\r\n");
        out.push_str("\r\n");
        for line in self.message.lines() {
            out.push_str(line);
            out.push_str("\r\n");
        }
        out
    }
}

/// A report transport
pub trait Mailer: Send + Sync {
    fn send(&self, report: &Report) -> Result<()>;
}

/// Local `sendmail` binary
pub struct SendmailMailer {
    executor: Arc<dyn CommandExecutor>,
}

impl SendmailMailer {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }
}

impl Mailer for SendmailMailer {
    fn send(&self, report: &Report) -> Result<()> {
        let invocation = ToolInvocation::new("sendmail")
            .args(["-t", "-i"])
            .stdin_bytes(report.to_rfc5322().into_bytes());

        self.executor
            .run(&invocation)
            .context("sendmail failed to accept the report")?;
        Ok(())
    }
}

/// SMTP relay reached through `curl`
pub struct SmtpMailer {
    executor: Arc<dyn CommandExecutor>,
    options: MailerOptions,
}

impl SmtpMailer {
    pub fn new(executor: Arc<dyn CommandExecutor>, options: MailerOptions) -> Self {
        Self { executor, options }
    }

    fn url(&self) -> String {
        let host = self.options.host.as_deref().unwrap_or("localhost");
        let port = self.options.port.unwrap_or(25);
        let scheme = if port == 465 { "smtps" } else { "smtp" };
        format!("{}://{}:{}", scheme, host, port)
    }

    fn authenticates(&self) -> bool {
        self.options.smtp_auth.unwrap_or(self.options.username.is_some())
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, report: &Report) -> Result<()> {
        let mut invocation = ToolInvocation::new("curl")
            .args(["--silent", "--show-error", "--url"])
            .arg(self.url())
            .args(["--mail-from", report.from.address.as_str()]);

        for receiver in &report.receivers {
            invocation = invocation.args(["--mail-rcpt", receiver.address.as_str()]);
        }

        if self.options.port == Some(587) {
            invocation = invocation.arg("--ssl-reqd");
        }

        // Credentials go through a netrc file so they never show on the command line
        let credentials = tempfile::tempdir().context("Failed to create credentials directory")?;
        if self.authenticates() {
            let netrc = credentials.path().join("netrc");
            fs::write(
                &netrc,
                format!(
                    "machine {} login {} password {}\n",
                    self.options.host.as_deref().unwrap_or("localhost"),
                    self.options.username.as_deref().unwrap_or_default(),
                    self.options.password.as_deref().unwrap_or_default()
                ),
            )
            .context("Failed to write SMTP credentials")?;

            invocation = invocation.arg("--netrc-file").arg(netrc.display().to_string());
            if let Some(ref auth) = self.options.auth_type {
                invocation = invocation
                    .arg("--login-options")
                    .arg(format!("AUTH={}", auth));
            }
        }

        invocation = invocation
            .args(["--upload-file", "-"])
            .stdin_bytes(report.to_rfc5322().into_bytes());

        self.executor
            .run(&invocation)
            .with_context(|| format!("SMTP delivery to {} failed", self.url()))?;
        Ok(())
    }
}

/// Sends run reports according to the `[report]` table
pub struct ReportManager {
    config: ReportConfig,
    mailer: Box<dyn Mailer>,
}

impl ReportManager {
    pub fn new(config: ReportConfig, mailer: Box<dyn Mailer>) -> Self {
        Self { config, mailer }
    }

    /// Pick the transport named in the configuration
    pub fn from_config(config: ReportConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        let mailer: Box<dyn Mailer> = match config.sender.mailer {
            MailerKind::Mail => Box::new(SendmailMailer::new(executor)),
            MailerKind::Smtp => Box::new(SmtpMailer::new(executor, config.sender.options.clone())),
        };
        Self::new(config, mailer)
    }

    /// Compose the report for one run kind (`backup`, `restore`, `cleanup`)
    pub fn compose(&self, kind: &str, body: &str) -> Report {
        let from = match self.config.sender.from {
            Some(ref from) => Mailbox::new(from.name.clone(), from.address.clone()),
            None => Mailbox::new("", DEFAULT_FROM),
        };

        self.config
            .receivers
            .iter()
            .fold(
                Report::new(format!("{} - {}", self.config.subject, kind), from),
                |report, receiver| {
                    report.add_receiver(Mailbox::new(receiver.name.clone(), receiver.mail.clone()))
                },
            )
            .with_message(body)
    }

    pub fn send(&self, kind: &str, body: &str) -> Result<()> {
        let report = self.compose(kind, body);
        debug!("Sending report '{}' to {} receivers", report.subject, report.receivers.len());
        self.mailer.send(&report)?;
        info!("Report sent: {}", report.subject);
        Ok(())
    }
}
