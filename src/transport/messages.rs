//! Typed inbound messages from the speech service.
//!
//! The service sends text frames with a header preamble before the JSON
//! content:
//!
//! ```text
//! X-RequestId:5FD045C3…
//! Path:speech.phrase
//!
//! {"RecognitionStatus":"Success", …}
//! ```
//!
//! Binary frames carry a big-endian u16 header-section length, the same
//! header text, and a raw payload (synthesized translation audio). Every
//! parsed message keeps the raw JSON body so results can surface it to the
//! consumer verbatim.

use std::collections::HashMap;

use bytes::Bytes;
use serde::Deserialize;

// =============================================================================
// Recognition status
// =============================================================================

/// Outcome of a recognition attempt in phrase messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionStatus {
    Success,
    NoMatch,
    InitialSilenceTimeout,
    BabbleTimeout,
    Error,
    EndOfDictation,
    /// Unknown status value, kept for forward compatibility.
    Unknown(String),
}

impl RecognitionStatus {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::str::FromStr for RecognitionStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s {
            "Success" => Self::Success,
            "NoMatch" => Self::NoMatch,
            "InitialSilenceTimeout" => Self::InitialSilenceTimeout,
            "BabbleTimeout" => Self::BabbleTimeout,
            "Error" => Self::Error,
            "EndOfDictation" => Self::EndOfDictation,
            _ => Self::Unknown(s.to_string()),
        };
        Ok(status)
    }
}

impl<'de> Deserialize<'de> for RecognitionStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap())
    }
}

// =============================================================================
// Speech messages
// =============================================================================

/// `speech.startDetected`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpeechStartDetectedMsg {
    pub offset: u64,
    #[serde(skip)]
    pub json: String,
}

/// `speech.endDetected`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpeechEndDetectedMsg {
    pub offset: u64,
    #[serde(skip)]
    pub json: String,
}

/// `speech.hypothesis`: interim text that may still change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpeechHypothesisMsg {
    pub text: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub duration: u64,
    #[serde(skip)]
    pub json: String,
}

/// `speech.fragment`: incremental update in continuous modes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpeechFragmentMsg {
    pub text: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub duration: u64,
    #[serde(skip)]
    pub json: String,
}

/// `speech.phrase`: completed recognition for a speech segment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpeechPhraseMsg {
    pub recognition_status: RecognitionStatus,
    #[serde(default)]
    pub display_text: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub duration: u64,
    #[serde(skip)]
    pub json: String,
}

impl Default for SpeechPhraseMsg {
    fn default() -> Self {
        Self {
            recognition_status: RecognitionStatus::Error,
            display_text: String::new(),
            offset: 0,
            duration: 0,
            json: String::new(),
        }
    }
}

// =============================================================================
// Translation messages
// =============================================================================

/// Translation outcome carried inside translation messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationStatus {
    Success,
    Error,
    Unknown(String),
}

impl<'de> Deserialize<'de> for TranslationStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "Success" => Self::Success,
            "Error" => Self::Error,
            _ => Self::Unknown(s),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TranslationEntry {
    language: String,
    text: String,
}

/// The translation block shared by hypothesis and phrase messages.
#[derive(Debug, Clone, Default)]
pub struct TranslationPayload {
    pub status: Option<TranslationStatus>,
    /// Target language → translated text.
    pub translations: HashMap<String, String>,
    pub failure_reason: String,
}

impl<'de> Deserialize<'de> for TranslationPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Wire {
            #[serde(default)]
            translation_status: Option<TranslationStatus>,
            #[serde(default)]
            translations: Vec<TranslationEntry>,
            #[serde(default)]
            failure_reason: String,
        }

        let wire = Wire::deserialize(deserializer)?;
        Ok(Self {
            status: wire.translation_status,
            translations: wire
                .translations
                .into_iter()
                .map(|entry| (entry.language, entry.text))
                .collect(),
            failure_reason: wire.failure_reason,
        })
    }
}

/// `translation.hypothesis`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranslationHypothesisMsg {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub translation: TranslationPayload,
    #[serde(skip)]
    pub json: String,
}

/// `translation.phrase`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranslationPhraseMsg {
    pub recognition_status: RecognitionStatus,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub translation: TranslationPayload,
    #[serde(skip)]
    pub json: String,
}

/// `translation.synthesis`: a binary frame of synthesized audio.
#[derive(Debug, Clone)]
pub struct TranslationSynthesisMsg {
    pub audio: Bytes,
}

/// Synthesis outcome for `translation.synthesis.end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisStatus {
    Success,
    Error,
    Unknown(String),
}

impl<'de> Deserialize<'de> for SynthesisStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "Success" => Self::Success,
            "Error" => Self::Error,
            _ => Self::Unknown(s),
        })
    }
}

/// `translation.synthesis.end`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranslationSynthesisEndMsg {
    pub synthesis_status: SynthesisStatus,
    #[serde(default)]
    pub failure_reason: String,
    #[serde(skip)]
    pub json: String,
}

// =============================================================================
// Turn messages
// =============================================================================

/// `turn.start`: carries the service-side correlation tag.
#[derive(Debug, Clone, Default)]
pub struct TurnStartMsg {
    pub context_service_tag: String,
    pub json: String,
}

impl<'de> Deserialize<'de> for TurnStartMsg {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Default, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Context {
            #[serde(default)]
            service_tag: String,
        }

        #[derive(Deserialize)]
        struct Wire {
            #[serde(default)]
            context: Context,
        }

        let wire = Wire::deserialize(deserializer)?;
        Ok(Self {
            context_service_tag: wire.context.service_tag,
            json: String::new(),
        })
    }
}

// =============================================================================
// Unified message enum and parsing
// =============================================================================

/// Every message the service can deliver, plus the user-message escape
/// hatch for unrecognized paths.
#[derive(Debug, Clone)]
pub enum UspMessage {
    SpeechStartDetected(SpeechStartDetectedMsg),
    SpeechEndDetected(SpeechEndDetectedMsg),
    SpeechHypothesis(SpeechHypothesisMsg),
    SpeechFragment(SpeechFragmentMsg),
    SpeechPhrase(SpeechPhraseMsg),
    TranslationHypothesis(TranslationHypothesisMsg),
    TranslationPhrase(TranslationPhraseMsg),
    TranslationSynthesis(TranslationSynthesisMsg),
    TranslationSynthesisEnd(TranslationSynthesisEndMsg),
    TurnStart(TurnStartMsg),
    TurnEnd,
    /// A message on a path the adapter does not model; delivered to the
    /// user-message callback.
    User {
        path: String,
        content_type: String,
        body: Bytes,
    },
}

/// Message-parsing failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MessageError {
    #[error("failed to parse {path} body: {source}")]
    Body {
        path: String,
        #[source]
        source: std::sync::Arc<serde_json::Error>,
    },

    #[error("message has no Path header")]
    MissingPath,

    #[error("malformed binary frame")]
    MalformedBinary,
}

fn body_err(path: &str, source: serde_json::Error) -> MessageError {
    MessageError::Body {
        path: path.to_string(),
        source: std::sync::Arc::new(source),
    }
}

/// Headers extracted from a frame preamble.
#[derive(Debug, Default)]
struct FrameHeaders {
    path: String,
    content_type: String,
}

fn parse_headers(section: &str) -> FrameHeaders {
    let mut headers = FrameHeaders::default();
    for line in section.lines() {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "path" => headers.path = value.trim().to_string(),
                "content-type" => headers.content_type = value.trim().to_string(),
                _ => {}
            }
        }
    }
    headers
}

/// Split a text frame into its header section and body.
fn split_text_frame(text: &str) -> (&str, &str) {
    if let Some(pos) = text.find("\r\n\r\n") {
        (&text[..pos], &text[pos + 4..])
    } else if let Some(pos) = text.find("\n\n") {
        (&text[..pos], &text[pos + 2..])
    } else {
        ("", text)
    }
}

impl UspMessage {
    /// Parse a text frame (headers + JSON body).
    pub fn parse_text(text: &str) -> Result<Self, MessageError> {
        let (header_section, body) = split_text_frame(text);
        let headers = parse_headers(header_section);
        if headers.path.is_empty() {
            return Err(MessageError::MissingPath);
        }
        Self::parse_with_path(&headers.path, &headers.content_type, body.trim())
    }

    /// Parse a binary frame: u16 big-endian header length, header text,
    /// raw payload.
    pub fn parse_binary(data: &[u8]) -> Result<Self, MessageError> {
        if data.len() < 2 {
            return Err(MessageError::MalformedBinary);
        }
        let header_len = usize::from(u16::from_be_bytes([data[0], data[1]]));
        let rest = &data[2..];
        if rest.len() < header_len {
            return Err(MessageError::MalformedBinary);
        }

        let header_section =
            std::str::from_utf8(&rest[..header_len]).map_err(|_| MessageError::MalformedBinary)?;
        let headers = parse_headers(header_section);
        let payload = Bytes::copy_from_slice(&rest[header_len..]);

        match headers.path.as_str() {
            "translation.synthesis" => {
                Ok(Self::TranslationSynthesis(TranslationSynthesisMsg { audio: payload }))
            }
            "" => Err(MessageError::MissingPath),
            path => Ok(Self::User {
                path: path.to_string(),
                content_type: headers.content_type,
                body: payload,
            }),
        }
    }

    /// Dispatch a JSON body by message path.
    pub fn parse_with_path(
        path: &str,
        content_type: &str,
        json: &str,
    ) -> Result<Self, MessageError> {
        let msg = match path {
            "speech.startDetected" => {
                let mut msg: SpeechStartDetectedMsg =
                    serde_json::from_str(json).map_err(|e| body_err(path, e))?;
                msg.json = json.to_string();
                Self::SpeechStartDetected(msg)
            }
            "speech.endDetected" => {
                let mut msg: SpeechEndDetectedMsg =
                    serde_json::from_str(json).map_err(|e| body_err(path, e))?;
                msg.json = json.to_string();
                Self::SpeechEndDetected(msg)
            }
            "speech.hypothesis" => {
                let mut msg: SpeechHypothesisMsg =
                    serde_json::from_str(json).map_err(|e| body_err(path, e))?;
                msg.json = json.to_string();
                Self::SpeechHypothesis(msg)
            }
            "speech.fragment" => {
                let mut msg: SpeechFragmentMsg =
                    serde_json::from_str(json).map_err(|e| body_err(path, e))?;
                msg.json = json.to_string();
                Self::SpeechFragment(msg)
            }
            "speech.phrase" => {
                let mut msg: SpeechPhraseMsg =
                    serde_json::from_str(json).map_err(|e| body_err(path, e))?;
                msg.json = json.to_string();
                Self::SpeechPhrase(msg)
            }
            "translation.hypothesis" => {
                let mut msg: TranslationHypothesisMsg =
                    serde_json::from_str(json).map_err(|e| body_err(path, e))?;
                msg.json = json.to_string();
                Self::TranslationHypothesis(msg)
            }
            "translation.phrase" => {
                let mut msg: TranslationPhraseMsg =
                    serde_json::from_str(json).map_err(|e| body_err(path, e))?;
                msg.json = json.to_string();
                Self::TranslationPhrase(msg)
            }
            "translation.synthesis.end" => {
                let mut msg: TranslationSynthesisEndMsg =
                    serde_json::from_str(json).map_err(|e| body_err(path, e))?;
                msg.json = json.to_string();
                Self::TranslationSynthesisEnd(msg)
            }
            "turn.start" => {
                let mut msg: TurnStartMsg =
                    serde_json::from_str(json).map_err(|e| body_err(path, e))?;
                msg.json = json.to_string();
                Self::TurnStart(msg)
            }
            "turn.end" => Self::TurnEnd,
            other => Self::User {
                path: other.to_string(),
                content_type: content_type.to_string(),
                body: Bytes::copy_from_slice(json.as_bytes()),
            },
        };

        Ok(msg)
    }
}
