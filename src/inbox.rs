//! Inbox access — raw IMAP over TLS for reply detection.
//!
//! The reconciler needs two operations: list unseen messages and mark one
//! seen. Fetches use `BODY.PEEK[]` so reading a message never flags it;
//! a message only becomes seen once the reconciler has matched it to a
//! lead. The IMAP session is blocking and runs inside `spawn_blocking`.

use std::io::Write as IoWrite;
use std::net::TcpStream;
use std::sync::Arc;

use async_trait::async_trait;
use mail_parser::MessageParser;
use secrecy::ExposeSecret;

use crate::config::InboxConfig;
use crate::error::InboxError;

/// An unseen message pulled from the inbox.
#[derive(Debug, Clone)]
pub struct InboxMessage {
    /// IMAP UID, stable across sessions.
    pub uid: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
}

/// Narrow interface to the reply inbox.
#[async_trait]
pub trait Inbox: Send + Sync {
    async fn fetch_unseen(&self) -> Result<Vec<InboxMessage>, InboxError>;
    async fn mark_seen(&self, uid: &str) -> Result<(), InboxError>;
}

// ── IMAP implementation ─────────────────────────────────────────────

pub struct ImapInbox {
    config: InboxConfig,
}

impl ImapInbox {
    pub fn new(config: InboxConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Inbox for ImapInbox {
    async fn fetch_unseen(&self) -> Result<Vec<InboxMessage>, InboxError> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = ImapSession::connect(&config)?;
            let uids = session.search_unseen()?;
            let mut messages = Vec::new();
            for uid in &uids {
                let raw = session.fetch_peek(uid)?;
                if let Some(parsed) = MessageParser::default().parse(raw.as_bytes()) {
                    messages.push(InboxMessage {
                        uid: uid.clone(),
                        sender: extract_sender(&parsed),
                        subject: parsed.subject().unwrap_or("(no subject)").to_string(),
                        body: extract_text(&parsed),
                    });
                }
            }
            session.logout();
            tracing::info!(count = messages.len(), "Fetched unseen messages");
            Ok(messages)
        })
        .await
        .map_err(|e| InboxError::Protocol(format!("inbox task panicked: {e}")))?
    }

    async fn mark_seen(&self, uid: &str) -> Result<(), InboxError> {
        let config = self.config.clone();
        let uid = uid.to_string();
        tokio::task::spawn_blocking(move || {
            let mut session = ImapSession::connect(&config)?;
            session.mark_seen(&uid)?;
            session.logout();
            Ok(())
        })
        .await
        .map_err(|e| InboxError::Protocol(format!("inbox task panicked: {e}")))?
    }
}

// ── Blocking IMAP session ───────────────────────────────────────────

struct ImapSession {
    tls: rustls::StreamOwned<rustls::ClientConnection, TcpStream>,
    tag_counter: u32,
}

impl ImapSession {
    fn connect(config: &InboxConfig) -> Result<Self, InboxError> {
        let tcp = TcpStream::connect((&*config.imap_host, config.imap_port))
            .map_err(|e| InboxError::Connect(e.to_string()))?;
        tcp.set_read_timeout(Some(config.read_timeout))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name: rustls_pki_types::ServerName<'_> =
            rustls_pki_types::ServerName::try_from(config.imap_host.clone())
                .map_err(|e| InboxError::Tls(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| InboxError::Tls(e.to_string()))?;

        let mut session = Self {
            tls: rustls::StreamOwned::new(conn, tcp),
            tag_counter: 0,
        };

        let _greeting = session.read_line()?;

        let login = session.command(&format!(
            "LOGIN \"{}\" \"{}\"",
            config.username,
            config.password.expose_secret()
        ))?;
        if !login.last().is_some_and(|l| l.contains("OK")) {
            return Err(InboxError::Login);
        }

        session.command("SELECT \"INBOX\"")?;
        Ok(session)
    }

    fn read_line(&mut self) -> Result<String, InboxError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match std::io::Read::read(&mut self.tls, &mut byte) {
                Ok(0) => return Err(InboxError::Protocol("connection closed".into())),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Send a tagged command and collect every line through the tagged
    /// completion response.
    fn command(&mut self, cmd: &str) -> Result<Vec<String>, InboxError> {
        self.tag_counter += 1;
        let tag = format!("A{}", self.tag_counter);
        let full = format!("{tag} {cmd}\r\n");
        IoWrite::write_all(&mut self.tls, full.as_bytes())?;
        IoWrite::flush(&mut self.tls)?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(&tag);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    fn search_unseen(&mut self) -> Result<Vec<String>, InboxError> {
        let response = self.command("UID SEARCH UNSEEN")?;
        let mut uids = Vec::new();
        for line in &response {
            if line.starts_with("* SEARCH") {
                uids.extend(line.split_whitespace().skip(2).map(str::to_string));
            }
        }
        Ok(uids)
    }

    /// Fetch a message body without setting the `\Seen` flag.
    fn fetch_peek(&mut self, uid: &str) -> Result<String, InboxError> {
        let response = self.command(&format!("UID FETCH {uid} (BODY.PEEK[])"))?;
        // Everything between the untagged FETCH line and the closing lines
        // is the literal message.
        let raw: String = response
            .iter()
            .skip(1)
            .take(response.len().saturating_sub(3))
            .cloned()
            .collect();
        Ok(raw)
    }

    fn mark_seen(&mut self, uid: &str) -> Result<(), InboxError> {
        self.command(&format!("UID STORE {uid} +FLAGS (\\Seen)"))?;
        Ok(())
    }

    fn logout(mut self) {
        let _ = self.command("LOGOUT");
    }
}

// ── Message extraction (public for testing) ─────────────────────────

/// Sender address: the parsed From address when the header parses, else
/// the raw header value, else "unknown".
pub fn extract_sender(parsed: &mail_parser::Message) -> String {
    if let Some(address) = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
    {
        return address.to_string();
    }
    parsed
        .header_raw("From")
        .map(|raw| raw.trim().to_string())
        .unwrap_or_else(|| "unknown".into())
}

/// Readable text: the first plain-text body part, else stripped HTML,
/// else empty. Charset decoding inside the parser is lossy by design.
pub fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    String::new()
}

/// Strip HTML tags and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
