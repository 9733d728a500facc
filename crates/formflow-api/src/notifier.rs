//! Status e-mails sent when a submission concludes.
use async_trait::async_trait;
use std::sync::Arc;

use formflow_core::{FormRecord, Notifier, Result, SubmissionRecord, SubmissionStatus, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Delivery backend.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Writes mail to the tracing output instead of sending it.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::info!(
            from = %message.from,
            to = %message.to.join(", "),
            subject = %message.subject,
            "mail\n{}",
            message.body
        );
        Ok(())
    }
}

pub struct MailNotifier {
    mailer: Arc<dyn Mailer>,
    from: String,
    admin_emails: Vec<String>,
}

impl MailNotifier {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>, admin_emails: Vec<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
            admin_emails,
        }
    }

    /// `None` when nobody would receive it.
    pub fn compose(
        &self,
        submission: &SubmissionRecord,
        form: &FormRecord,
        user: &User,
    ) -> Option<EmailMessage> {
        let to: Vec<String> = user
            .email
            .iter()
            .chain(self.admin_emails.iter())
            .cloned()
            .collect();
        if to.is_empty() {
            return None;
        }

        let file = &form.source_file_name;
        let (subject, status_text) = match submission.status {
            SubmissionStatus::Completed => {
                (format!("Form Submission Completed: {}", file), "successfully completed")
            }
            SubmissionStatus::Failed => (format!("Form Submission Failed: {}", file), "failed"),
            SubmissionStatus::InProgress => {
                (format!("Form Submission In Progress: {}", file), "in progress")
            }
            SubmissionStatus::Pending => (format!("Form Submission Update: {}", file), "pending"),
        };

        let mut body = format!(
            "The submission for form {} is now {}.\n\n\
             Submission ID: {}\n\
             Submitted By: {} ({})\n\
             Submitted At: {}\n\
             Target Website: {}\n",
            file,
            status_text,
            submission.id,
            user.name,
            user.email.as_deref().unwrap_or(&user.id),
            submission.submitted_at.to_rfc3339(),
            submission.target_website,
        );
        if let Some(at) = submission.completed_at {
            body.push_str(&format!("Completed At: {}\n", at.to_rfc3339()));
        }
        if let Some(error) = &submission.error_message {
            body.push_str(&format!("Error Message: {}\n", error));
        }
        body.push_str("\nFull details and logs are available in the FormFlow dashboard.\n");

        Some(EmailMessage {
            from: self.from.clone(),
            to,
            subject,
            body,
        })
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn notify(
        &self,
        submission: &SubmissionRecord,
        form: &FormRecord,
        user: &User,
    ) -> Result<bool> {
        match self.compose(submission, form, user) {
            Some(message) => {
                self.mailer.send(&message).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
