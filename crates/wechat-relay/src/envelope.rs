//! WeChat passive-reply XML envelopes.
//!
//! Inbound messages arrive as a flat `<xml>` document whose children carry the
//! fields. Only the four fields the relay needs are read; everything else
//! (`CreateTime`, `MsgId`, `PicUrl`, ...) is ignored.
//!
//! Outbound replies are rendered from a fixed template. Every string field is
//! wrapped in CDATA, with any `]]>` inside the value split across two sections,
//! so model or user text can never close the section early and inject markup.
//! Characters XML 1.0 does not allow at all (C0 controls other than tab, line
//! feed and carriage return) are dropped, since CDATA cannot carry them.

use serde::Deserialize;
use thiserror::Error;

use crate::clock::UnixClock;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("malformed envelope: {0}")]
    Xml(String),
}

/// A message delivered by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundEnvelope {
    #[serde(rename = "MsgType")]
    pub msg_type: String,
    /// The sender's openid.
    #[serde(rename = "FromUserName")]
    pub from_user: String,
    /// The official account id.
    #[serde(rename = "ToUserName")]
    pub to_user: String,
    /// Absent for non-text messages.
    #[serde(rename = "Content", default)]
    pub content: String,
}

impl InboundEnvelope {
    pub fn parse(raw: &[u8]) -> Result<Self, EnvelopeError> {
        let text = std::str::from_utf8(raw)?;
        quick_xml::de::from_str(text).map_err(|e| EnvelopeError::Xml(e.to_string()))
    }

    pub fn is_text(&self) -> bool {
        self.msg_type == "text"
    }

    /// Starts a text reply addressed back to the sender, sent as the account
    /// that received the message.
    pub fn reply(&self, content: impl Into<String>) -> OutboundEnvelope {
        OutboundEnvelope::text(&self.from_user, &self.to_user, content)
    }
}

/// A passive text reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEnvelope {
    pub to_user: String,
    pub from_user: String,
    pub content: String,
}

impl OutboundEnvelope {
    pub fn text(
        to_user: impl Into<String>,
        from_user: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            to_user: to_user.into(),
            from_user: from_user.into(),
            content: content.into(),
        }
    }

    /// Renders the envelope with `CreateTime` taken from `clock`.
    pub fn to_xml<C: UnixClock>(&self, clock: &C) -> String {
        format!(
            "<xml>\n  \
             <ToUserName>{}</ToUserName>\n  \
             <FromUserName>{}</FromUserName>\n  \
             <CreateTime>{}</CreateTime>\n  \
             <MsgType><![CDATA[text]]></MsgType>\n  \
             <Content>{}</Content>\n\
             </xml>",
            cdata(&self.to_user),
            cdata(&self.from_user),
            clock.unix_now(),
            cdata(&self.content),
        )
    }
}

/// Shorthand for `OutboundEnvelope::text(..).to_xml(clock)`.
pub fn build_reply<C: UnixClock>(clock: &C, to_user: &str, from_user: &str, content: &str) -> String {
    OutboundEnvelope::text(to_user, from_user, content).to_xml(clock)
}

fn cdata(value: &str) -> String {
    let text: String = value.chars().filter(|&c| is_xml_char(c)).collect();
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
}
