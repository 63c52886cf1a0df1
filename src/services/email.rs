use lettre::{
    Message, SmtpTransport, Transport,
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
};
use log::{info, error, warn};

use crate::config::Config;

type MailResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub struct EmailService;

impl EmailService {
    /// Delivers the registration code. Returns false when mail is not
    /// configured or delivery failed; callers treat the send as done either way.
    pub async fn send_otp_email(email: &str, otp: &str) -> bool {
        if !Config::is_mail_enabled() {
            warn!("Email credentials not configured. Skipping OTP email to {}", email);
            return false;
        }

        match Self::try_send_otp(email, otp).await {
            Ok(_) => {
                info!("OTP email sent successfully to {}", email);
                true
            }
            Err(e) => {
                error!("Failed to send OTP email to {}: {}", email, e);
                false
            }
        }
    }

    async fn try_send_otp(email: &str, otp: &str) -> MailResult {
        let email_body = format!(
            r#"
            <!DOCTYPE html>
            <html>
            <head>
                <style>
                    body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
                    .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
                    .header {{ background: #2f7d32; color: white; padding: 30px; text-align: center; border-radius: 10px 10px 0 0; }}
                    .content {{ background: #f6f9f4; padding: 30px; border-radius: 0 0 10px 10px; }}
                    .otp-code {{ font-size: 32px; font-weight: bold; letter-spacing: 5px; color: #2f7d32; text-align: center; }}
                </style>
            </head>
            <body>
                <div class="container">
                    <div class="header">
                        <h1>FarmRent</h1>
                        <p>Confirm your email address</p>
                    </div>
                    <div class="content">
                        <p>Enter this code on the registration page to verify your email:</p>
                        <div class="otp-code">{}</div>
                        <p>If you did not start a FarmRent registration, you can ignore this email.</p>
                    </div>
                </div>
            </body>
            </html>
            "#,
            otp
        );

        Self::deliver(email, "Your FarmRent verification code", email_body)
    }

    pub async fn send_welcome_email(email: &str, name: &str) -> bool {
        if !Config::is_mail_enabled() {
            warn!("Email credentials not configured. Skipping welcome email to {}", email);
            return false;
        }

        match Self::try_send_welcome(email, name).await {
            Ok(_) => {
                info!("Welcome email sent to {}", email);
                true
            }
            Err(e) => {
                error!("Failed to send welcome email: {}", e);
                false
            }
        }
    }

    async fn try_send_welcome(email: &str, name: &str) -> MailResult {
        let display_name = if name.is_empty() { "there" } else { name };

        let email_body = format!(
            r#"
            <!DOCTYPE html>
            <html>
            <body>
                <h1>Welcome to FarmRent!</h1>
                <p>Hi {},</p>
                <p>Your identity documents were received and your account is ready.</p>
                <p>With FarmRent, you can:</p>
                <ul>
                    <li>Rent tractors, harvesters and drones near your farm</li>
                    <li>Compare daily rates across provinces</li>
                    <li>List your own machinery as a lessor</li>
                </ul>
                <p>Best regards,<br><strong>FarmRent Team</strong></p>
            </body>
            </html>
            "#,
            display_name
        );

        Self::deliver(email, "Welcome to FarmRent!", email_body)
    }

    fn deliver(to: &str, subject: &str, body: String) -> MailResult {
        let from_mailbox: Mailbox = Config::mail_from().parse()?;
        let to_mailbox: Mailbox = to.parse()?;

        let message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)?;

        let creds = Credentials::new(Config::mail_user(), Config::mail_password());
        let mailer = SmtpTransport::relay(&Config::mail_host())?
            .port(Config::mail_port())
            .credentials(creds)
            .build();

        mailer.send(&message)?;
        Ok(())
    }
}
