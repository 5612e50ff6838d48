//! Connection configuration builder.
//!
//! Mirrors the service client's fluent setup surface: endpoint selection,
//! languages, translation parameters, model id, recognition mode, and
//! authentication, validated into a [`ClientConfig`].

use crate::error::AdapterError;

use super::endpoint::{Authentication, ClientConfig, EndpointType, RecognitionMode};

#[derive(Debug, Clone, Default)]
pub struct Client {
    endpoint_type: EndpointType,
    endpoint_url: String,
    language: String,
    translation_source_language: String,
    translation_target_languages: String,
    translation_voice: String,
    model_id: String,
    reco_mode: RecognitionMode,
    authentication: Option<Authentication>,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint_type(mut self, endpoint_type: EndpointType) -> Self {
        self.endpoint_type = endpoint_type;
        self
    }

    /// Use a caller-supplied URL; implies `EndpointType::Custom`.
    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_type = EndpointType::Custom;
        self.endpoint_url = url.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn translation_source_language(mut self, language: impl Into<String>) -> Self {
        self.translation_source_language = language.into();
        self
    }

    /// Comma-separated list of translation targets.
    pub fn translation_target_languages(mut self, languages: impl Into<String>) -> Self {
        self.translation_target_languages = languages.into();
        self
    }

    pub fn translation_voice(mut self, voice: impl Into<String>) -> Self {
        self.translation_voice = voice.into();
        self
    }

    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn recognition_mode(mut self, mode: RecognitionMode) -> Self {
        self.reco_mode = mode;
        self
    }

    pub fn authentication(mut self, authentication: Authentication) -> Self {
        self.authentication = Some(authentication);
        self
    }

    /// Validate and produce the connection configuration.
    pub fn build(self) -> Result<ClientConfig, AdapterError> {
        let authentication = self.authentication.ok_or_else(|| {
            AdapterError::InvalidArgument("no authentication parameters were specified".to_string())
        })?;

        let config = ClientConfig {
            endpoint_type: self.endpoint_type,
            endpoint_url: self.endpoint_url,
            language: self.language,
            translation_source_language: self.translation_source_language,
            translation_target_languages: self.translation_target_languages,
            translation_voice: self.translation_voice,
            model_id: self.model_id,
            reco_mode: self.reco_mode,
            authentication,
        };

        // surface a bad custom URL at build time, not at connect time
        config.connection_url()?;

        Ok(config)
    }
}
