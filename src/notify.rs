//! Run-outcome notification
//!
//! Exactly one notification is sent per run. Delivery is fire-and-forget
//! from the pipeline's perspective: failures are logged here, never
//! retried.

use crate::config::EmailConfig;
use crate::error::NotifyError;
use crate::model::RunResult;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

/// Outcome notification collaborator
pub trait Notifier {
    /// Deliver a run with new reports, attaching the JSON artifact
    fn send_success(&self, run: &RunResult, attachment: &[u8]) -> Result<(), NotifyError>;

    /// Deliver a run that found nothing new
    fn send_no_reports(&self, run: &RunResult) -> Result<(), NotifyError>;

    /// Deliver a systemic failure
    fn send_error(&self, detail: &str) -> Result<(), NotifyError>;
}

/// Plain-text summary of a run, used as the message body
pub fn summarize(run: &RunResult) -> String {
    let mut body = format!(
        "PTR watch run at {}\nOutcome: {}\n",
        run.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        match run.outcome {
            crate::model::RunOutcome::SuccessWithReports => "new reports found",
            crate::model::RunOutcome::SuccessNoReports => "no new reports",
            crate::model::RunOutcome::Error => "run failed",
        }
    );

    if !run.reports.is_empty() {
        body.push_str(&format!(
            "\n{} new report(s), {} transaction(s):\n",
            run.reports.len(),
            run.transaction_count()
        ));
        for report in &run.reports {
            body.push_str(&format!(
                "- {} ({}): {} transaction(s)\n",
                report.identity.filer_name,
                report.identity.report_date,
                report.transactions.len()
            ));
            for warning in &report.warnings {
                body.push_str(&format!("    warning: {warning}\n"));
            }
        }
    }

    if !run.parse_failures.is_empty() {
        body.push_str(&format!(
            "\n{} report(s) failed to parse:\n",
            run.parse_failures.len()
        ));
        for failure in &run.parse_failures {
            body.push_str(&format!("- {failure}\n"));
        }
    }

    if let Some(ref detail) = run.error_detail {
        body.push_str(&format!("\nError detail: {detail}\n"));
    }

    body
}

/// SMTP email notifier over STARTTLS
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    /// Create a notifier from SMTP settings
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<SmtpTransport, NotifyError> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.clone(),
        );
        Ok(SmtpTransport::starttls_relay(&self.config.smtp_host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build())
    }

    fn deliver(&self, subject: &str, body: String, attachment: Option<&[u8]>) -> Result<(), NotifyError> {
        let mut builder = Message::builder()
            .from(
                self.config
                    .from_address
                    .parse()
                    .map_err(|_| NotifyError::BadAddress(self.config.from_address.clone()))?,
            )
            .subject(subject);
        for recipient in &self.config.recipients {
            builder = builder.to(recipient
                .parse()
                .map_err(|_| NotifyError::BadAddress(recipient.clone()))?);
        }

        let message = match attachment {
            Some(bytes) => {
                let json_type = ContentType::parse("application/json")
                    .map_err(|e| NotifyError::Build(e.to_string()))?;
                builder
                    .multipart(
                        MultiPart::mixed()
                            .singlepart(SinglePart::plain(body))
                            .singlepart(
                                Attachment::new("ptr-run.json".to_string())
                                    .body(bytes.to_vec(), json_type),
                            ),
                    )
                    .map_err(|e| NotifyError::Build(e.to_string()))?
            }
            None => builder
                .body(body)
                .map_err(|e| NotifyError::Build(e.to_string()))?,
        };

        self.transport()?
            .send(&message)
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        info!("Notification sent to {} recipient(s)", self.config.recipients.len());
        Ok(())
    }
}

impl Notifier for EmailNotifier {
    fn send_success(&self, run: &RunResult, attachment: &[u8]) -> Result<(), NotifyError> {
        let subject = format!("PTR watch: {} new report(s)", run.reports.len());
        self.deliver(&subject, summarize(run), Some(attachment))
    }

    fn send_no_reports(&self, run: &RunResult) -> Result<(), NotifyError> {
        self.deliver("PTR watch: no new reports", summarize(run), None)
    }

    fn send_error(&self, detail: &str) -> Result<(), NotifyError> {
        self.deliver(
            "PTR watch: run failed",
            format!("The scheduled run failed.\n\n{detail}\n"),
            None,
        )
    }
}

/// Log-only notifier used when no SMTP environment is configured
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_success(&self, run: &RunResult, _attachment: &[u8]) -> Result<(), NotifyError> {
        info!(
            "Run finished with {} new report(s)\n{}",
            run.reports.len(),
            summarize(run)
        );
        Ok(())
    }

    fn send_no_reports(&self, _run: &RunResult) -> Result<(), NotifyError> {
        info!("Run finished with no new reports");
        Ok(())
    }

    fn send_error(&self, detail: &str) -> Result<(), NotifyError> {
        info!("Run failed: {}", detail);
        Ok(())
    }
}
