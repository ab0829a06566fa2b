//! Report delivery over a single SMTP session.
//!
//! A [`Connector`] turns a [`SessionConfig`] into an authenticated
//! [`MailSession`]; the session is used for every report in the batch and
//! consumed by [`MailSession::close`]. Setup failures abort the batch, send
//! failures only affect their own recipient.

use std::path::Path;
use std::time::Duration;

use chrono::Local;
use lettre::message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::Message;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{RecipientError, SessionError};
use crate::models::{DispatchOutcome, DispatchSummary, MatchedPair};

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_SIGNATURE: &str = "[Your School]";

#[derive(Clone)]
pub struct SessionConfig {
    pub email: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub signature: String,
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self {
            signature: DEFAULT_SIGNATURE.to_string(),
        }
    }
}

impl MessageTemplate {
    pub fn subject(&self, student_name: &str) -> String {
        format!("Report Card: {student_name}")
    }

    pub fn body(&self, student_name: &str) -> String {
        format!(
            "Dear Parent/Guardian,\n\n\
             Please find attached the report card for {student_name}.\n\n\
             Best regards,\n{}",
            self.signature
        )
    }
}

pub trait Connector {
    type Session: MailSession;

    /// Connects, upgrades with STARTTLS and authenticates.
    fn open(&self, config: &SessionConfig) -> Result<Self::Session, SessionError>;
}

pub trait MailSession {
    fn send(&mut self, message: &Message) -> Result<(), RecipientError>;

    /// Ends the session. Errors are logged, never returned.
    fn close(self);
}

pub fn compose_message(
    sender: &str,
    template: &MessageTemplate,
    pair: &MatchedPair,
) -> Result<Message, RecipientError> {
    let student_name = pair.student.student_name();
    let from = parse_mailbox(sender)?;
    let to = parse_mailbox(pair.student.parent_email())?;

    let pdf = std::fs::read(&pair.report).map_err(|source| RecipientError::Attachment {
        path: pair.report.clone(),
        source,
    })?;
    let content_type = ContentType::parse("application/pdf")
        .map_err(|err| RecipientError::Build(err.to_string()))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(template.subject(student_name))
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(template.body(student_name)))
                .singlepart(Attachment::new(attachment_name(&pair.report)).body(pdf, content_type)),
        )
        .map_err(|err| RecipientError::Build(err.to_string()))
}

fn parse_mailbox(address: &str) -> Result<Mailbox, RecipientError> {
    address.parse().map_err(|err: lettre::address::AddressError| RecipientError::Address {
        address: address.to_string(),
        reason: err.to_string(),
    })
}

fn attachment_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.pdf".to_string())
}

/// Sends one report per pair over a single session.
///
/// `total_records` is the number of students loaded from the CSV and is carried
/// into the summary unchanged.
pub fn dispatch<C: Connector>(
    connector: &C,
    config: &SessionConfig,
    template: &MessageTemplate,
    pairs: &[MatchedPair],
    total_records: usize,
) -> Result<DispatchSummary, SessionError> {
    let run_id = Uuid::new_v4();
    let started_at = Local::now();

    let mut session = connector.open(config)?;
    debug!(
        "Run {run_id}: authenticated as {} on {}:{}",
        config.email, config.host, config.port
    );

    let mut outcomes = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let recipient = pair.student.parent_email().to_string();
        let result = compose_message(&config.email, template, pair)
            .and_then(|message| session.send(&message));

        match result {
            Ok(()) => {
                info!("Sent to {recipient}");
                outcomes.push(DispatchOutcome::Sent { recipient });
            }
            Err(err) => {
                error!("Failed to send to {recipient}: {err}");
                outcomes.push(DispatchOutcome::Failed {
                    recipient,
                    reason: err.to_string(),
                });
            }
        }
    }

    session.close();

    let summary = DispatchSummary {
        run_id,
        started_at,
        finished_at: Local::now(),
        outcomes,
        total_records,
    };
    info!(
        "Run {run_id}: sent {} of {} reports ({} attempted)",
        summary.sent(),
        summary.total_records,
        summary.attempted()
    );
    Ok(summary)
}

#[derive(Debug, Clone)]
pub struct SmtpConnector {
    timeout: Option<Duration>,
    starttls: bool,
}

impl Default for SmtpConnector {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(60)),
            starttls: true,
        }
    }
}

impl SmtpConnector {
    fn establish(&self, config: &SessionConfig) -> Result<SmtpConnection, SessionError> {
        let hello = ClientId::default();
        let mut connection = SmtpConnection::connect(
            (config.host.as_str(), config.port),
            self.timeout,
            &hello,
            None,
            None,
        )
        .map_err(|err| SessionError::Connect {
            host: config.host.clone(),
            port: config.port,
            reason: err.to_string(),
        })?;

        if self.starttls {
            let tls_failure = |reason: String| SessionError::Tls {
                host: config.host.clone(),
                reason,
            };
            if !connection.can_starttls() {
                connection.abort();
                return Err(tls_failure("server does not offer STARTTLS".to_string()));
            }
            let upgraded = TlsParameters::new(config.host.clone())
                .and_then(|tls| connection.starttls(&tls, &hello));
            if let Err(err) = upgraded {
                connection.abort();
                return Err(tls_failure(err.to_string()));
            }
        }

        let credentials = Credentials::new(config.email.clone(), config.password.clone());
        if let Err(err) = connection.auth(&[Mechanism::Plain, Mechanism::Login], &credentials) {
            connection.abort();
            return Err(SessionError::Auth {
                email: config.email.clone(),
                reason: err.to_string(),
            });
        }

        Ok(connection)
    }
}

impl Connector for SmtpConnector {
    type Session = SmtpSession;

    fn open(&self, config: &SessionConfig) -> Result<SmtpSession, SessionError> {
        let connection = self.establish(config)?;
        Ok(SmtpSession {
            connector: self.clone(),
            config: config.clone(),
            connection,
        })
    }
}

/// lettre drops the connection on any negative reply during a send, so a
/// broken connection is re-established before the next message goes out.
pub struct SmtpSession {
    connector: SmtpConnector,
    config: SessionConfig,
    connection: SmtpConnection,
}

impl MailSession for SmtpSession {
    fn send(&mut self, message: &Message) -> Result<(), RecipientError> {
        if self.connection.has_broken() {
            warn!(
                "SMTP connection to {}:{} was closed, reconnecting",
                self.config.host, self.config.port
            );
            self.connection = self
                .connector
                .establish(&self.config)
                .map_err(RecipientError::Reconnect)?;
        }
        self.connection
            .send(message.envelope(), &message.formatted())
            .map(|_| ())
            .map_err(|err| RecipientError::Send(err.to_string()))
    }

    fn close(mut self) {
        if self.connection.has_broken() {
            return;
        }
        if let Err(err) = self.connection.quit() {
            warn!("SMTP QUIT failed: {err}");
        }
    }
}
