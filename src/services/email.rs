use lettre::{
    Message, SmtpTransport, Transport,
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
};
use log::{info, error, warn};

use crate::models::BookingResponse;

/// Transactional email sender. Every public send is best-effort: failures
/// are logged and reported as `false`, never propagated, so a mail outage
/// cannot block booking creation or status updates.
pub struct EmailService;

impl EmailService {
    pub async fn send_otp_email(email: &str, token: i64) -> bool {
        let body = format!(
            r#"
            <div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
                <h2>Your One-Time Password</h2>
                <p>Use this code to verify your email address:</p>
                <div style="border: 2px dashed #667eea; border-radius: 8px; padding: 20px; text-align: center;">
                    <span style="font-size: 32px; font-weight: bold; letter-spacing: 5px;">{:06}</span>
                    <p style="color: #666; font-size: 14px;">Valid for 15 minutes</p>
                </div>
                <p>If you didn't request this code, please ignore this email.</p>
            </div>
            "#,
            token
        );

        Self::deliver(email, "Your Verification Code", body).await
    }

    pub async fn send_password_set_email(email: &str, name: &str) -> bool {
        let body = format!(
            r#"
            <div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
                <h2>Password Updated Successfully</h2>
                <p>Dear {},</p>
                <p><strong>Your password has been successfully updated.</strong></p>
                <p style="background: #fff3cd; border-left: 4px solid #ffc107; padding: 10px;">
                    If you did not make this change, please contact support immediately.
                </p>
            </div>
            "#,
            name
        );

        Self::deliver(email, "Password Updated Successfully", body).await
    }

    /// Rider-facing confirmation once an admin approves the price.
    pub async fn send_new_ride_email(email: &str, booking: &BookingResponse) -> bool {
        let body = Self::ride_body("Your Ride Is Confirmed", booking);
        Self::deliver(email, "Your Ride Is Confirmed", body).await
    }

    /// Admin-facing copy of a confirmed booking.
    pub async fn send_admin_booking_email(booking: &BookingResponse) -> bool {
        let admin_email = crate::config::Config::admin_notify_email();
        if admin_email.is_empty() {
            warn!("Admin notification email not configured. Skipping.");
            return false;
        }
        let body = Self::ride_body("New Confirmed Booking", booking);
        Self::deliver(&admin_email, "New Confirmed Booking", body).await
    }

    pub async fn send_ride_active_email(email: &str, booking: &BookingResponse) -> bool {
        let body = Self::ride_body("Your Ride Is Active", booking);
        Self::deliver(email, "Your Ride Is Active", body).await
    }

    pub async fn send_ride_completed_email(email: &str, booking: &BookingResponse) -> bool {
        let body = Self::ride_body("Your Ride Is Completed", booking);
        Self::deliver(email, "Your Ride Is Completed", body).await
    }

    pub async fn send_ride_cancelled_email(email: &str, booking: &BookingResponse) -> bool {
        let body = Self::ride_body("Your Ride Was Cancelled", booking);
        Self::deliver(email, "Your Ride Was Cancelled", body).await
    }

    fn ride_body(title: &str, booking: &BookingResponse) -> String {
        format!(
            r#"
            <div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
                <h2>{}</h2>
                <table style="width: 100%; border-collapse: collapse;">
                    <tr><td><strong>Booking</strong></td><td>{}</td></tr>
                    <tr><td><strong>Service</strong></td><td>{}</td></tr>
                    <tr><td><strong>Pickup</strong></td><td>{}</td></tr>
                    <tr><td><strong>Dropoff</strong></td><td>{}</td></tr>
                    <tr><td><strong>Pickup time</strong></td><td>{}</td></tr>
                    <tr><td><strong>Total price</strong></td><td>${:.2}</td></tr>
                    <tr><td><strong>Status</strong></td><td>{}</td></tr>
                </table>
            </div>
            "#,
            title,
            booking.id,
            booking.service_type.as_str(),
            booking.pickup_location.as_deref().unwrap_or("-"),
            booking.dropoff_location.as_deref().unwrap_or("-"),
            booking.pickup_time.as_deref().unwrap_or("-"),
            booking.total_price,
            booking.status.as_str(),
        )
    }

    async fn deliver(to: &str, subject: &str, html: String) -> bool {
        match Self::try_send(to, subject, html) {
            Ok(_) => {
                info!("Email '{}' sent to {}", subject, to);
                true
            }
            Err(e) => {
                error!("Failed to send '{}' to {}: {}", subject, to, e);
                false
            }
        }
    }

    fn try_send(to: &str, subject: &str, html: String) -> Result<(), Box<dyn std::error::Error>> {
        let mail_user = crate::config::Config::mail_user();
        let mail_password = crate::config::Config::mail_password();

        if mail_user.is_empty() || mail_password.is_empty() {
            warn!("Email credentials not configured. Skipping email send.");
            return Err("Email not configured".into());
        }

        let from_mailbox: Mailbox = crate::config::Config::mail_from().parse()?;
        let to_mailbox: Mailbox = to.parse()?;

        let email_message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)?;

        let creds = Credentials::new(mail_user, mail_password);
        let mailer = SmtpTransport::relay(&crate::config::Config::mail_host())?
            .credentials(creds)
            .build();

        mailer.send(&email_message)?;
        Ok(())
    }
}
