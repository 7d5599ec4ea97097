use chrono::{DateTime, Utc};
use lettre::{
    message::{header::ContentType, Mailbox},
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    error::AppError,
    models::{participant::Participant, trip::Trip},
};

/// Outbound transactional email. Without an SMTP url the mailer is disabled
/// and every send becomes a logged no-op, so local development and tests run
/// without a mail server.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
    api_base_url: String,
    web_base_url: String,
}

impl Mailer {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let transport = match config.smtp_url.as_deref() {
            Some(url) => Some(
                AsyncSmtpTransport::<Tokio1Executor>::from_url(url)
                    .map_err(|err| AppError::Config(format!("invalid SMTP_URL: {err}")))?
                    .build(),
            ),
            None => None,
        };
        let from = config
            .mail_from
            .parse::<Mailbox>()
            .map_err(|err| AppError::Config(format!("invalid MAIL_FROM: {err}")))?;
        Ok(Self {
            transport,
            from,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            web_base_url: config.web_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Asks the owner to confirm the trip they just created.
    pub async fn send_trip_confirmation(
        &self,
        owner_name: &str,
        owner_email: &str,
        trip: &Trip,
    ) -> Result<(), AppError> {
        let confirmation_link = format!("{}/trips/{}/confirm", self.api_base_url, trip.id);
        let html = format!(
            r#"<div style="font-family: sans-serif; font-size: 16px; line-height: 1.6;">
  <p>You requested a trip to <strong>{destination}</strong> from <strong>{start}</strong> until <strong>{end}</strong>.</p>
  <p>To confirm the trip, use the link below:</p>
  <p><a href="{link}">Confirm trip</a></p>
  <p>If this email means nothing to you, just ignore it.</p>
</div>"#,
            destination = trip.destination,
            start = format_date(trip.starts_at),
            end = format_date(trip.ends_at),
            link = confirmation_link,
        );
        self.deliver(
            mailbox(Some(owner_name), owner_email)?,
            format!(
                "Confirm your trip to {} on {}",
                trip.destination,
                format_date(trip.starts_at)
            ),
            html,
        )
        .await
    }

    /// Tells every current participant the trip dates changed.
    pub async fn send_trip_updated(
        &self,
        participants: &[Participant],
        trip: &Trip,
    ) -> Result<(), AppError> {
        let details_link = format!("{}/trips/{}", self.web_base_url, trip.id);
        for participant in participants {
            let html = format!(
                r#"<div style="font-family: sans-serif; font-size: 16px; line-height: 1.6;">
  <p>Hello!</p>
  <p>The trip to <strong>{destination}</strong> was updated.</p>
  <p><strong>New dates:</strong> {start} until {end}</p>
  <p>For the full details, use the link below:</p>
  <p><a href="{link}">View trip details</a></p>
</div>"#,
                destination = trip.destination,
                start = format_date(trip.starts_at),
                end = format_date(trip.ends_at),
                link = details_link,
            );
            self.deliver(
                mailbox(participant.name.as_deref(), &participant.email)?,
                format!("Trip updated: {}", trip.destination),
                html,
            )
            .await?;
        }
        Ok(())
    }

    /// Notifies a removed participant.
    pub async fn send_removal_notice(
        &self,
        participant: &Participant,
        trip: &Trip,
    ) -> Result<(), AppError> {
        let html = format!(
            r#"<div style="font-family: sans-serif; font-size: 16px; line-height: 1.6;">
  <p>You were removed from the trip to <strong>{destination}</strong> planned for <strong>{start}</strong> until <strong>{end}</strong>.</p>
  <p>If you have questions about this, contact the trip organizer.</p>
  <p>If this email means nothing to you, just ignore it.</p>
</div>"#,
            destination = trip.destination,
            start = format_date(trip.starts_at),
            end = format_date(trip.ends_at),
        );
        self.deliver(
            mailbox(participant.name.as_deref(), &participant.email)?,
            format!("You were removed from the trip to {}", trip.destination),
            html,
        )
        .await
    }

    /// Invites an email address to join a trip.
    pub async fn send_trip_invite(&self, email: &str, trip: &Trip) -> Result<(), AppError> {
        let join_link = format!("{}/trips/{}/join", self.web_base_url, trip.id);
        let html = format!(
            r#"<div style="font-family: sans-serif; font-size: 16px; line-height: 1.6;">
  <p>You were invited to a trip to <strong>{destination}</strong> from <strong>{start}</strong> until <strong>{end}</strong>.</p>
  <p>To join, use the link below:</p>
  <p><a href="{link}">Join trip</a></p>
  <p>If this email means nothing to you, just ignore it.</p>
</div>"#,
            destination = trip.destination,
            start = format_date(trip.starts_at),
            end = format_date(trip.ends_at),
            link = join_link,
        );
        self.deliver(
            mailbox(None, email)?,
            format!("Join the trip to {}", trip.destination),
            html,
        )
        .await
    }

    async fn deliver(&self, to: Mailbox, subject: String, html: String) -> Result<(), AppError> {
        let Some(transport) = &self.transport else {
            warn!(%subject, "smtp transport not configured, skipping email");
            return Ok(());
        };
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.clone())
            .subject(subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|err| AppError::Mail(err.to_string()))?;
        transport
            .send(message)
            .await
            .map_err(|err| AppError::Mail(err.to_string()))?;
        info!(recipient = %to.email, %subject, "email sent");
        Ok(())
    }
}

fn mailbox(name: Option<&str>, email: &str) -> Result<Mailbox, AppError> {
    let address = email
        .parse::<Address>()
        .map_err(|err| AppError::Mail(format!("invalid recipient address {email}: {err}")))?;
    Ok(Mailbox::new(name.map(str::to_string), address))
}

fn format_date(when: DateTime<Utc>) -> String {
    when.format("%B %-d, %Y").to_string()
}
