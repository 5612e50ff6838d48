//! Endpoint selection, recognition modes, and authentication.

use url::Url;

use crate::error::AdapterError;

/// Which service endpoint family a connection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndpointType {
    /// Default speech recognition service.
    #[default]
    Speech,
    /// Cortana device SDK service.
    Cdsdk,
    /// Speech translation service.
    Translation,
    /// Custom-speech service parameterized by a trained model id.
    CustomSpeech,
    /// A caller-supplied URL.
    Custom,
}

/// Recognition mode, reflected in the endpoint path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecognitionMode {
    #[default]
    Interactive,
    Conversation,
    Dictation,
}

impl RecognitionMode {
    /// The path segment carried in recognition URLs.
    #[inline]
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::Conversation => "conversation",
            Self::Dictation => "dictation",
        }
    }

    /// Parse the `Speech.RecoMode` property value. Unknown values are a
    /// hard configuration error; an empty value means "not set".
    pub fn from_property(value: &str) -> Result<Option<Self>, AdapterError> {
        if value.is_empty() {
            return Ok(None);
        }
        match value.to_ascii_uppercase().as_str() {
            "INTERACTIVE" => Ok(Some(Self::Interactive)),
            "CONVERSATION" => Ok(Some(Self::Conversation)),
            "DICTATION" => Ok(Some(Self::Dictation)),
            _ => Err(AdapterError::InvalidArgument(format!(
                "unknown recognition mode '{value}'"
            ))),
        }
    }

    /// Scan a custom endpoint URL for a mode path segment.
    pub fn from_endpoint_url(url: &str) -> Option<Self> {
        if url.contains("/interactive/") {
            Some(Self::Interactive)
        } else if url.contains("/conversation/") {
            Some(Self::Conversation)
        } else if url.contains("/dictation/") {
            Some(Self::Dictation)
        } else {
            None
        }
    }
}

/// Credential presented during the WebSocket upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    SubscriptionKey(String),
    AuthorizationToken(String),
    SearchDelegationRpsToken(String),
}

impl Authentication {
    /// The HTTP header (name, value) carrying this credential.
    pub fn header(&self) -> (&'static str, String) {
        match self {
            Self::SubscriptionKey(key) => ("Ocp-Apim-Subscription-Key", key.clone()),
            Self::AuthorizationToken(token) => ("Authorization", format!("Bearer {token}")),
            Self::SearchDelegationRpsToken(token) => {
                ("X-Search-DelegationRPSToken", token.clone())
            }
        }
    }
}

/// Validated connection parameters produced by the client builder.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint_type: EndpointType,
    /// Set only for `EndpointType::Custom`.
    pub endpoint_url: String,
    pub language: String,
    pub translation_source_language: String,
    pub translation_target_languages: String,
    pub translation_voice: String,
    pub model_id: String,
    pub reco_mode: RecognitionMode,
    pub authentication: Authentication,
}

impl ClientConfig {
    /// Derive the WebSocket URL for this configuration.
    pub fn connection_url(&self) -> Result<Url, AdapterError> {
        let url = match self.endpoint_type {
            EndpointType::Custom => Url::parse(&self.endpoint_url).map_err(|e| {
                AdapterError::InvalidArgument(format!(
                    "invalid endpoint URL '{}': {e}",
                    self.endpoint_url
                ))
            })?,

            EndpointType::Speech => {
                let mut url = Url::parse(&format!(
                    "wss://speech.platform.bing.com/speech/recognition/{}/cognitiveservices/v1",
                    self.reco_mode.path_segment()
                ))
                .expect("static URL");
                if !self.language.is_empty() {
                    url.query_pairs_mut().append_pair("language", &self.language);
                }
                url
            }

            EndpointType::CustomSpeech => Url::parse(&format!(
                "wss://{}.api.cris.ai/speech/recognition/{}/cognitiveservices/v1",
                self.model_id,
                self.reco_mode.path_segment()
            ))
            .map_err(|e| {
                AdapterError::InvalidArgument(format!(
                    "invalid custom-speech model id '{}': {e}",
                    self.model_id
                ))
            })?,

            EndpointType::Translation => {
                let mut url =
                    Url::parse("wss://dev.microsofttranslator.com/speech/translate")
                        .expect("static URL");
                {
                    let mut query = url.query_pairs_mut();
                    query.append_pair("api-version", "1.0");
                    query.append_pair("from", &self.translation_source_language);
                    query.append_pair("to", &self.translation_target_languages);
                    if !self.translation_voice.is_empty() {
                        query.append_pair("features", "texttospeech");
                        query.append_pair("voice", &self.translation_voice);
                    }
                }
                url
            }

            EndpointType::Cdsdk => {
                Url::parse("wss://speech.platform.bing.com/cortana/api/v1?environment=Home")
                    .expect("static URL")
            }
        };

        Ok(url)
    }
}
