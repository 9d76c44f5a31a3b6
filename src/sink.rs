use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use url::Url;

use crate::utils::digits_only;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("phone number {0:?} has no digits")]
    InvalidPhone(String),
    #[error("could not build chat link: {0}")]
    Url(#[from] url::ParseError),
    #[error("could not open chat link: {0}")]
    Open(#[from] std::io::Error),
}

/// Fire-and-forget destination for greetings. Success means the hand-off
/// happened, not that anyone received the message.
#[async_trait]
pub trait SendSink: Send + Sync {
    async fn send(&self, phone: &str, text: &str) -> Result<(), SinkError>;
}

/// `https://wa.me/<digits>?text=<encoded>` for the given number and message.
pub fn whatsapp_link(phone: &str, text: &str) -> Result<Url, SinkError> {
    let digits = digits_only(phone);
    if digits.is_empty() {
        return Err(SinkError::InvalidPhone(phone.to_string()));
    }
    let link = format!("https://wa.me/{}?text={}", digits, urlencoding::encode(text));
    Ok(Url::parse(&link)?)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Browser,
    Log,
}

pub fn from_kind(kind: SinkKind) -> Box<dyn SendSink> {
    match kind {
        SinkKind::Browser => Box::new(BrowserSink::default()),
        SinkKind::Log => Box::new(LogSink),
    }
}

/// Opens the chat link with the desktop's default handler, or with `opener`
/// when one is set. The hand-off fails when the opener exits unsuccessfully.
#[derive(Debug, Clone, Default)]
pub struct BrowserSink {
    opener: Option<String>,
}

impl BrowserSink {
    pub fn with_opener(program: impl Into<String>) -> Self {
        Self {
            opener: Some(program.into()),
        }
    }

    fn command(&self, url: &str) -> Command {
        if let Some(program) = &self.opener {
            let mut cmd = Command::new(program);
            cmd.arg(url);
            return cmd;
        }
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(url);
            cmd
        } else if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", url]);
            cmd
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            cmd
        }
    }
}

#[async_trait]
impl SendSink for BrowserSink {
    async fn send(&self, phone: &str, text: &str) -> Result<(), SinkError> {
        let link = whatsapp_link(phone, text)?;
        info!("opening {link}");
        let status = self.command(link.as_str()).status().await?;
        if !status.success() {
            return Err(SinkError::Open(std::io::Error::other(format!(
                "link opener exited with {status}"
            ))));
        }
        Ok(())
    }
}

/// Prints the chat link instead of opening it.
pub struct LogSink;

#[async_trait]
impl SendSink for LogSink {
    async fn send(&self, phone: &str, text: &str) -> Result<(), SinkError> {
        let link = whatsapp_link(phone, text)?;
        info!("greeting for {phone}: {link}");
        println!("{link}");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Remembers every hand-off; phones listed in `fail_for` error out.
    #[derive(Default)]
    pub struct RecordingSink {
        pub sent: Mutex<Vec<(String, String)>>,
        pub fail_for: Vec<String>,
    }

    impl RecordingSink {
        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SendSink for RecordingSink {
        async fn send(&self, phone: &str, text: &str) -> Result<(), SinkError> {
            if self.fail_for.iter().any(|p| p == phone) {
                return Err(SinkError::InvalidPhone(phone.to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((phone.to_string(), text.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_strips_phone_formatting_and_encodes_text() {
        let link = whatsapp_link("+55 (11) 99988-7766", "Parabéns João! 🎉 & mais").unwrap();
        assert_eq!(link.host_str(), Some("wa.me"));
        assert_eq!(link.path(), "/5511999887766");
        let text: Vec<_> = link.query_pairs().filter(|(k, _)| k == "text").collect();
        assert_eq!(text.len(), 1);
        assert_eq!(text[0].1, "Parabéns João! 🎉 & mais");
        assert!(!link.as_str().contains(' '));
    }

    #[test]
    fn link_requires_digits() {
        assert!(matches!(
            whatsapp_link("none", "hi"),
            Err(SinkError::InvalidPhone(_))
        ));
    }

    #[test]
    fn sink_kind_reads_lowercase() {
        #[derive(Deserialize)]
        struct Wrap {
            sink: SinkKind,
        }
        let w: Wrap = toml::from_str("sink = \"log\"").unwrap();
        assert_eq!(w.sink, SinkKind::Log);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn browser_sink_reports_opener_exit_status() {
        BrowserSink::with_opener("true")
            .send("5511999887766", "oi")
            .await
            .unwrap();
        let err = BrowserSink::with_opener("false")
            .send("5511999887766", "oi")
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Open(_)));
    }

    #[tokio::test]
    async fn browser_sink_reports_missing_opener() {
        let err = BrowserSink::with_opener("no-such-link-opener-binary")
            .send("5511999887766", "oi")
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Open(_)));
    }
}
