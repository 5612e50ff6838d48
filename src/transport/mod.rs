//! The USP transport boundary.
//!
//! The adapter drives a [`UspConnection`] (outbound) and implements
//! [`UspObserver`] (inbound). Connections are created through a
//! [`UspConnector`], so tests can substitute a scripted transport for the
//! production WebSocket implementation in [`ws`].

use std::sync::Weak;

use crate::error::{AdapterError, TransportError};

pub mod client;
pub mod endpoint;
pub mod messages;
pub mod ws;

pub use client::Client;
pub use endpoint::{Authentication, ClientConfig, EndpointType, RecognitionMode};
pub use messages::UspMessage;
pub use ws::WsConnector;

use messages::{
    SpeechEndDetectedMsg, SpeechFragmentMsg, SpeechHypothesisMsg, SpeechPhraseMsg,
    SpeechStartDetectedMsg, TranslationHypothesisMsg, TranslationPhraseMsg,
    TranslationSynthesisEndMsg, TranslationSynthesisMsg, TurnStartMsg,
};

/// A live connection to the service.
///
/// The handle is uniquely owned by the adapter; dropping it shuts the
/// connection down (blocking on transport teardown).
pub trait UspConnection: Send + Sync {
    /// Send a named message (e.g. `speech.context`) with a JSON body.
    fn send_message(&self, path: &str, body: &[u8]) -> Result<(), TransportError>;

    /// Send a chunk of audio.
    fn write_audio(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Signal end-of-audio for the current turn.
    fn flush_audio(&self) -> Result<(), TransportError>;
}

/// Receiver of typed inbound events. Callbacks arrive on the transport's
/// thread(s), in wire arrival order.
pub trait UspObserver: Send + Sync {
    fn on_speech_start_detected(&self, msg: SpeechStartDetectedMsg);
    fn on_speech_end_detected(&self, msg: SpeechEndDetectedMsg);
    fn on_speech_hypothesis(&self, msg: SpeechHypothesisMsg);
    fn on_speech_fragment(&self, msg: SpeechFragmentMsg);
    fn on_speech_phrase(&self, msg: SpeechPhraseMsg);
    fn on_translation_hypothesis(&self, msg: TranslationHypothesisMsg);
    fn on_translation_phrase(&self, msg: TranslationPhraseMsg);
    fn on_translation_synthesis(&self, msg: TranslationSynthesisMsg);
    fn on_translation_synthesis_end(&self, msg: TranslationSynthesisEndMsg);
    fn on_turn_start(&self, msg: TurnStartMsg);
    fn on_turn_end(&self);
    fn on_error(&self, message: String);
    fn on_user_message(&self, path: &str, content_type: &str, body: &[u8]);
}

/// Factory for connections.
pub trait UspConnector: Send + Sync {
    fn connect(
        &self,
        config: &ClientConfig,
        observer: Weak<dyn UspObserver>,
    ) -> Result<std::sync::Arc<dyn UspConnection>, AdapterError>;
}

/// Route a parsed message to the matching observer callback.
pub fn dispatch(observer: &dyn UspObserver, message: UspMessage) {
    match message {
        UspMessage::SpeechStartDetected(msg) => observer.on_speech_start_detected(msg),
        UspMessage::SpeechEndDetected(msg) => observer.on_speech_end_detected(msg),
        UspMessage::SpeechHypothesis(msg) => observer.on_speech_hypothesis(msg),
        UspMessage::SpeechFragment(msg) => observer.on_speech_fragment(msg),
        UspMessage::SpeechPhrase(msg) => observer.on_speech_phrase(msg),
        UspMessage::TranslationHypothesis(msg) => observer.on_translation_hypothesis(msg),
        UspMessage::TranslationPhrase(msg) => observer.on_translation_phrase(msg),
        UspMessage::TranslationSynthesis(msg) => observer.on_translation_synthesis(msg),
        UspMessage::TranslationSynthesisEnd(msg) => observer.on_translation_synthesis_end(msg),
        UspMessage::TurnStart(msg) => observer.on_turn_start(msg),
        UspMessage::TurnEnd => observer.on_turn_end(),
        UspMessage::User {
            path,
            content_type,
            body,
        } => observer.on_user_message(&path, &content_type, &body),
    }
}
