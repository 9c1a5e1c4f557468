// src/notify/mail.rs

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{error, info};

use crate::config::MailSection;
use crate::types::BoxFuture;

use super::{Notification, Notifier};

const DEFAULT_SENDER: &str = "runsync";

/// Sends notifications through a sendmail-compatible program.
///
/// The program gets the full message (headers included) on stdin, so
/// `sendmail -t` picks the recipients from the `To:` header.
#[derive(Debug, Clone)]
pub struct MailNotifier {
    argv: Vec<String>,
    recipients: Vec<String>,
    sender: String,
}

impl MailNotifier {
    /// `None` when no mail command is configured.
    pub fn from_config(mail: &MailSection) -> Option<Self> {
        let argv: Vec<String> = mail
            .command
            .as_deref()?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if argv.is_empty() {
            return None;
        }
        Some(Self {
            argv,
            recipients: mail.recipients.clone(),
            sender: mail.sender.clone().unwrap_or_else(|| DEFAULT_SENDER.to_string()),
        })
    }

    pub fn message(&self, notification: &Notification) -> String {
        format!(
            "From: {}\nTo: {}\nSubject: {}\n\n{}\n",
            self.sender,
            self.recipients.join(", "),
            notification.subject,
            notification.body
        )
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        let (program, args) = self
            .argv
            .split_first()
            .context("empty mail command")?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning mail command '{program}'"))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(self.message(notification).as_bytes())
                .await
                .context("writing message to mail command")?;
        }

        let output = child
            .wait_with_output()
            .await
            .context("waiting for mail command")?;
        if !output.status.success() {
            anyhow::bail!(
                "mail command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

impl Notifier for MailNotifier {
    fn notify<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if self.recipients.is_empty() {
                info!(subject = %notification.subject, "no mail recipients configured");
                return;
            }
            match self.send(notification).await {
                Ok(()) => info!(subject = %notification.subject, "notification mailed"),
                Err(err) => error!(
                    subject = %notification.subject,
                    error = %format!("{err:#}"),
                    "failed to send notification"
                ),
            }
        })
    }
}
