//! Renders a contact submission into the email sent to the site owner.
//!
//! The HTML and plain-text bodies are tera templates embedded at compile time.
//! Templates named `*.html` are autoescaped, so visitor input never reaches
//! the markup unescaped.

use crate::error::Result;
use crate::models::ContactSubmission;
use serde::Serialize;
use tera::{Context, Tera};

/// Prefix for the subject line of every relayed message.
pub(crate) const SUBJECT_PREFIX: &str = "Portfolio Contact:";

const HTML_TEMPLATE: &str = "contact.html";
const TEXT_TEMPLATE: &str = "contact.txt";

/// Subject and both bodies of a relayed email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Values exposed to the templates.
#[derive(Serialize)]
struct ContactContext<'a> {
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    message: &'a str,
    /// The message split on `\n` or `\r\n`; the HTML template joins it with `<br>`.
    message_lines: Vec<&'a str>,
    submitted_at: String,
    source_ip: &'a str,
    user_agent: &'a str,
}

impl<'a> ContactContext<'a> {
    fn new(submission: &'a ContactSubmission) -> Self {
        Self {
            name: &submission.name,
            email: &submission.email,
            subject: &submission.subject,
            message: &submission.message,
            message_lines: submission.message.lines().collect(),
            submitted_at: submission.submitted_at(),
            source_ip: &submission.source_ip,
            user_agent: &submission.user_agent,
        }
    }
}

/// Holds the compiled contact templates.
pub(crate) struct TemplateRenderer {
    engine: Tera,
}

impl TemplateRenderer {
    pub(crate) fn new() -> Result<Self> {
        let mut engine = Tera::default();
        engine.add_raw_templates(vec![
            (HTML_TEMPLATE, include_str!("../templates/contact.html")),
            (TEXT_TEMPLATE, include_str!("../templates/contact.txt")),
        ])?;
        Ok(Self { engine })
    }

    /// Renders subject and bodies. Output depends only on the submission,
    /// including its receipt timestamp.
    pub(crate) fn render(&self, submission: &ContactSubmission) -> Result<RenderedEmail> {
        let context = Context::from_serialize(ContactContext::new(submission))?;
        Ok(RenderedEmail {
            subject: email_subject(submission),
            html: self.engine.render(HTML_TEMPLATE, &context)?,
            text: self.engine.render(TEXT_TEMPLATE, &context)?,
        })
    }
}

/// Subject line of the relayed email.
pub(crate) fn email_subject(submission: &ContactSubmission) -> String {
    format!("{} {}", SUBJECT_PREFIX, submission.subject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidatedFields;
    use chrono::{TimeZone, Utc};

    fn submission(message: &str) -> ContactSubmission {
        ContactSubmission::new(
            ValidatedFields {
                name: "Ann".to_string(),
                email: "ann@x.com".to_string(),
                subject: "Hi".to_string(),
                message: message.to_string(),
            },
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            Some("203.0.113.7".to_string()),
            Some("Mozilla/5.0".to_string()),
        )
    }

    fn render(message: &str) -> RenderedEmail {
        TemplateRenderer::new()
            .unwrap()
            .render(&submission(message))
            .unwrap()
    }

    #[test]
    fn test_render_html_embeds_fields_and_footer() {
        let html = render("Hello").html;
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<strong>Name:</strong> Ann"));
        assert!(html.contains(r#"<a href="mailto:ann@x.com">ann@x.com</a>"#));
        assert!(html.contains("<strong>Subject:</strong> Hi"));
        assert!(html.contains("Submitted at: 2024-05-01T12:30:00.000Z"));
        assert!(html.contains("IP address: 203.0.113.7"));
        assert!(html.contains("User agent: Mozilla&#x2F;5.0"));
    }

    #[test]
    fn test_render_html_converts_newlines() {
        let html = render("line one\nline two\r\nline three").html;
        assert!(html.contains("line one<br>\nline two<br>\nline three</div>"));
    }

    #[test]
    fn test_render_html_escapes_markup() {
        let html = render("<script>alert('x')</script> & more").html;
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#x27;x&#x27;)&lt;&#x2F;script&gt; &amp; more"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = TemplateRenderer::new().unwrap();
        let s = submission("Hello");
        assert_eq!(renderer.render(&s).unwrap(), renderer.render(&s).unwrap());
    }

    #[test]
    fn test_render_text_and_subject() {
        let email = render("Hello <there>");
        assert_eq!(email.subject, "Portfolio Contact: Hi");
        assert!(
            email
                .text
                .contains("Name: Ann\nEmail: ann@x.com\nSubject: Hi\n\nHello <there>\n")
        );
        assert!(email.text.contains("IP address: 203.0.113.7"));
        assert!(email.text.contains("User agent: Mozilla/5.0"));
    }
}
