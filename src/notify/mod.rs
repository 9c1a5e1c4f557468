// src/notify/mod.rs

//! Operator notifications.
//!
//! The lifecycle code never talks to a mail server itself. It builds a
//! [`Notification`] and hands it to a [`Notifier`]:
//!
//! - [`mail::MailNotifier`] pipes the message into a sendmail-compatible
//!   program (production).
//! - [`LogNotifier`] only writes the message to the log; used when no mail
//!   command is configured.
//! - Tests provide a recording notifier.
//!
//! Delivery is fire-and-forget: a notifier never fails the caller, it logs
//! delivery problems instead.

pub mod mail;

use tracing::{info, warn};

use crate::run::RunId;
use crate::types::BoxFuture;

pub use mail::MailNotifier;

const OK_SUBJECT_PREFIX: &str = "Run successfully processed";
const ERROR_SUBJECT_PREFIX: &str = "Run processed with errors";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// A clean milestone for `run_id`.
    pub fn processed(run_id: &RunId, body: impl Into<String>) -> Self {
        Self::new(format!("{OK_SUBJECT_PREFIX}: {run_id}"), body)
    }

    /// Something went wrong for `run_id`.
    pub fn processed_with_errors(run_id: &RunId, body: impl Into<String>) -> Self {
        Self::new(format!("{ERROR_SUBJECT_PREFIX}: {run_id}"), body)
    }

    pub fn is_error(&self) -> bool {
        self.subject.starts_with(ERROR_SUBJECT_PREFIX)
    }
}

/// Trait abstracting how notifications reach an operator.
pub trait Notifier: Send + Sync {
    fn notify<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, ()>;
}

/// Writes notifications to the log and nowhere else.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if notification.is_error() {
                warn!(subject = %notification.subject, body = %notification.body, "notification");
            } else {
                info!(subject = %notification.subject, body = %notification.body, "notification");
            }
        })
    }
}
