//! Message bodies for transactional email and SMS.

use crate::db::format_amount;

pub struct EmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn wrap_html(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{ font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; background: #f5f5f5; margin: 0; }}
        .card {{ max-width: 520px; margin: 40px auto; background: #fff; border-radius: 8px; padding: 32px 24px; }}
        .code {{ font-size: 32px; letter-spacing: 8px; font-weight: 600; text-align: center; margin: 24px 0; }}
        .note {{ color: #6b7280; font-size: 13px; }}
    </style>
</head>
<body>
    <div class="card">
        <h1>{title}</h1>
        {body}
    </div>
</body>
</html>"#,
        title = html_escape(title),
        body = body,
    )
}

pub fn verification_email(name: &str, code: &str, ttl_minutes: i64) -> EmailContent {
    let subject = "Your verification code".to_string();
    let text = format!(
        "Hi {name},\n\nYour verification code is {code}.\n\nIt expires in {ttl_minutes} minutes. \
         If you did not start a registration you can ignore this email."
    );
    let html = wrap_html(
        "Verify your email",
        &format!(
            r#"<p>Hi {name},</p>
        <p>Use this code to verify your email address:</p>
        <div class="code">{code}</div>
        <p class="note">The code expires in {ttl_minutes} minutes. If you did not start a registration you can ignore this email.</p>"#,
            name = html_escape(name),
            code = html_escape(code),
        ),
    );
    EmailContent { subject, text, html }
}

pub fn verification_sms(code: &str, ttl_minutes: i64) -> String {
    format!("Your verification code is {code}. It expires in {ttl_minutes} minutes.")
}

pub fn viewing_decision_email(
    tenant_name: &str,
    listing_title: &str,
    preferred_date: &str,
    approved: bool,
    response_message: Option<&str>,
) -> EmailContent {
    let outcome = if approved { "approved" } else { "declined" };
    let subject = format!("Viewing request {outcome}: {listing_title}");
    let note_text = response_message
        .map(|m| format!("\n\nMessage from the landlord: {m}"))
        .unwrap_or_default();
    let text = format!(
        "Hi {tenant_name},\n\nYour request to view \"{listing_title}\" on {preferred_date} was {outcome}.{note_text}"
    );
    let note_html = response_message
        .map(|m| format!("<p><em>{}</em></p>", html_escape(m)))
        .unwrap_or_default();
    let html = wrap_html(
        &format!("Viewing {outcome}"),
        &format!(
            "<p>Hi {},</p>\n        <p>Your request to view <strong>{}</strong> on {} was {outcome}.</p>\n        {note_html}",
            html_escape(tenant_name),
            html_escape(listing_title),
            html_escape(preferred_date),
        ),
    );
    EmailContent { subject, text, html }
}

pub fn payment_confirmation_email(
    tenant_name: &str,
    amount: i64,
    period_start: &str,
    period_end: &str,
    reference: Option<&str>,
) -> EmailContent {
    let amount = format_amount(amount);
    let subject = format!("Payment received: {amount}");
    let reference_text = reference
        .map(|r| format!("\nReference: {r}"))
        .unwrap_or_default();
    let text = format!(
        "Hi {tenant_name},\n\nYour payment of {amount} for the period {period_start} to {period_end} has been confirmed.{reference_text}"
    );
    let html = wrap_html(
        "Payment confirmed",
        &format!(
            "<p>Hi {},</p>\n        <p>Your payment of <strong>{amount}</strong> for the period {period_start} to {period_end} has been confirmed.</p>\n        {}",
            html_escape(tenant_name),
            reference
                .map(|r| format!("<p class=\"note\">Reference: {}</p>", html_escape(r)))
                .unwrap_or_default(),
        ),
    );
    EmailContent { subject, text, html }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("Tom & Jerry"), "Tom &amp; Jerry");
        assert_eq!(html_escape("\"quoted\""), "&quot;quoted&quot;");
    }

    #[test]
    fn test_verification_email_contains_code() {
        let email = verification_email("Kofi <b>", "482913", 10);
        assert!(email.text.contains("482913"));
        assert!(email.html.contains("482913"));
        assert!(email.html.contains("Kofi &lt;b&gt;"));
        assert!(email.text.contains("10 minutes"));
    }

    #[test]
    fn test_viewing_decision_wording() {
        let approved = viewing_decision_email("Esi", "Sunny flat", "2026-11-02T10:00:00Z", true, None);
        assert!(approved.subject.contains("approved"));
        let declined = viewing_decision_email(
            "Esi",
            "Sunny flat",
            "2026-11-02T10:00:00Z",
            false,
            Some("Already let"),
        );
        assert!(declined.subject.contains("declined"));
        assert!(declined.text.contains("Already let"));
    }

    #[test]
    fn test_payment_confirmation_formats_amount() {
        let email = payment_confirmation_email("Esi", 150_000, "2026-01-01", "2026-02-01", Some("TX-9"));
        assert!(email.subject.contains("1500.00"));
        assert!(email.text.contains("TX-9"));
    }
}
