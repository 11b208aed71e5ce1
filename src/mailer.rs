use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::config::SmtpSettings;
use crate::error::NotifyError;
use crate::submission::Submission;

/// Port on which SMTP servers expect TLS from the first byte
const IMPLICIT_TLS_PORT: u16 = 465;

/// Something that tells staff about a new submission
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, submission: &Submission) -> Result<(), NotifyError>;
}

pub struct SmtpNotifier {
    smtp: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let creds = Credentials::new(settings.username.clone(), settings.password.clone());
        let tls_parameters = TlsParameters::new(settings.host.clone())?;

        let tls = if settings.port == IMPLICIT_TLS_PORT {
            Tls::Wrapper(tls_parameters)
        } else {
            Tls::Required(tls_parameters)
        };

        let smtp = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?
            .credentials(creds)
            .port(settings.port)
            .tls(tls)
            .build();

        Ok(SmtpNotifier {
            smtp,
            from: settings.from.parse()?,
            to: settings.recipient.parse()?,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, submission: &Submission) -> Result<(), NotifyError> {
        let email = build_message(self.from.clone(), self.to.clone(), submission)?;
        self.smtp.send(email).await?;
        Ok(())
    }
}

/// Subject line for a submission notification
pub fn subject_for(submission: &Submission) -> String {
    format!("New Form Submission - {}", submission.id)
}

pub fn build_message(from: Mailbox, to: Mailbox, submission: &Submission) -> Result<Message, NotifyError> {
    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(subject_for(submission))
        .header(ContentType::TEXT_HTML)
        .body(render_html(submission))?;
    Ok(message)
}

/// HTML body listing every submitted field
///
/// Field values come straight from the public form and are escaped.
pub fn render_html(submission: &Submission) -> String {
    let form = &submission.form;
    format!(
        "<h2>New Form Submission</h2>\n\
         <p><strong>Submission ID:</strong> {}</p>\n\
         <p><strong>Date:</strong> {}</p>\n\
         <p><strong>Name:</strong> {}</p>\n\
         <p><strong>Phone:</strong> {}</p>\n\
         <p><strong>Email:</strong> {}</p>\n\
         <p><strong>Interest Type:</strong> {}</p>\n\
         <p><strong>Message:</strong></p>\n\
         <p>{}</p>\n",
        submission.id,
        submission.submitted_at.format("%Y-%m-%d"),
        escape_html(&form.full_name),
        escape_html(&form.phone),
        escape_html(&form.email),
        escape_html(&form.interest_type),
        escape_html(&form.message).replace('\n', "<br>"),
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Fire-and-forget delivery of notifications
///
/// Submissions are pushed onto a bounded channel and a background task hands
/// them to the [`Notifier`]. Nothing about delivery flows back to the caller:
/// a full queue, a stopped worker or an SMTP failure is only logged.
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<Submission>,
}

impl NotificationQueue {
    /// Start the worker task
    ///
    /// # Arguments
    /// * `notifier` - Delivery backend
    /// * `capacity` - How many notifications may wait before new ones are dropped
    ///
    /// # Returns
    /// * `(NotificationQueue, JoinHandle<()>)` - The queue handle and the worker, which ends once every handle is dropped
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<Submission>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(submission) = receiver.recv().await {
                match notifier.notify(&submission).await {
                    Ok(()) => log::info!("Notification sent for submission {}", submission.id),
                    Err(e) => log::error!(
                        "Failed to send notification for submission {}: {}",
                        submission.id,
                        e
                    ),
                }
            }
            log::debug!("Notification worker stopped");
        });

        (NotificationQueue { sender }, worker)
    }

    /// Queue a notification without waiting for delivery.
    pub fn enqueue(&self, submission: Submission) {
        match self.sender.try_send(submission) {
            Ok(()) => {}
            Err(TrySendError::Full(s)) => {
                log::error!("Notification queue full, dropping notification for {}", s.id)
            }
            Err(TrySendError::Closed(s)) => {
                log::error!("Notification worker gone, dropping notification for {}", s.id)
            }
        }
    }
}

/// Wait for the worker to flush what is still queued
///
/// The worker only finishes once every [`NotificationQueue`] handle has been
/// dropped, so call this after the server has stopped. Returns `false` when
/// `limit` elapses first; the remaining notifications are then abandoned.
pub async fn drain(worker: JoinHandle<()>, limit: Duration) -> bool {
    match tokio::time::timeout(limit, worker).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::error!("Notification worker failed: {}", e);
            false
        }
        Err(_) => {
            log::warn!(
                "Gave up waiting for queued notifications after {}s",
                limit.as_secs()
            );
            false
        }
    }
}
