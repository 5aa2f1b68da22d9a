// src/notify/email.rs
use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::Digest;
use crate::config::SmtpConfig;

const SUBJECT: &str = "\u{1F4E2} Bolet\u{ed}n de Noticias Empresariales";

pub struct DigestMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl DigestMailer {
    pub fn new(cfg: &SmtpConfig) -> Result<Self> {
        let creds = Credentials::new(cfg.user.clone(), cfg.pass.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .context("invalid SMTP host")?
            .credentials(creds)
            .build();
        let from = cfg.from.parse().context("invalid digest From address")?;
        Ok(Self { mailer, from })
    }

    pub async fn send_digest(&self, digest: &Digest) -> Result<()> {
        let to: Mailbox = digest
            .recipient
            .parse()
            .with_context(|| format!("invalid recipient {}", digest.recipient))?;

        let msg = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(SUBJECT)
            .header(header::ContentType::TEXT_HTML)
            .body(render_digest_html(digest))
            .context("build digest email")?;

        self.mailer.send(msg).await.context("send digest email")?;
        Ok(())
    }
}

/// HTML bulletin: one list item per record, title bolded, company in
/// parentheses, details after a dash.
pub fn render_digest_html(digest: &Digest) -> String {
    let items: String = digest
        .items
        .iter()
        .map(|n| {
            format!(
                "<li><b>{}</b> ({}) - {}</li>",
                html_escape::encode_text(&n.title),
                html_escape::encode_text(&n.company),
                html_escape::encode_text(&n.details)
            )
        })
        .collect();

    format!(
        "<html>\n<body>\n<h2>\u{1F4E2} Noticias Empresariales Recientes</h2>\n\
         <p>Hola, aqu\u{ed} tienes las \u{fa}ltimas noticias relevantes seg\u{fa}n tus suscripciones:</p>\n\
         <ul>{items}</ul>\n\
         <p>Gracias por suscribirte a nuestro bolet\u{ed}n.</p>\n</body>\n</html>"
    )
}
