//! The site contract: the hosting consumer of the adapter.
//!
//! The site supplies configuration (named properties, listen-for hints,
//! intent-provider info) and receives recognition events. All callbacks are
//! fire-and-forget; failures inside the site never propagate back into the
//! adapter. The adapter holds only a weak reference to its site.

use crate::result::{RecognitionResult, ResultKind};

/// Intent-provider configuration returned by [`Site::intent_info`].
///
/// The intent fragment of the speech context is produced only when all
/// three fields are non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentInfo {
    pub provider: String,
    pub id: String,
    pub key: String,
}

impl IntentInfo {
    pub fn is_complete(&self) -> bool {
        !self.provider.is_empty() && !self.id.is_empty() && !self.key.is_empty()
    }
}

/// Hosting consumer of a recognition adapter.
///
/// Offsets are in 100-nanosecond units from the start of the audio stream,
/// as reported by the service.
pub trait Site: Send + Sync {
    // --- turn lifecycle ----------------------------------------------------

    /// The adapter is about to start a turn (first audio accepted).
    fn starting_turn(&self);

    /// The service acknowledged the turn. `service_tag` is the service-side
    /// correlation tag from the turn-start message.
    fn started_turn(&self, service_tag: &str);

    /// The turn completed; no more results will arrive for it.
    fn stopped_turn(&self);

    /// A single-shot turn finished; the audio feed should go idle.
    fn requesting_audio_idle(&self);

    /// A null-format stop request completed.
    fn completed_set_format_stop(&self);

    // --- recognition events ------------------------------------------------

    fn speech_start_detected(&self, offset: u64);

    fn speech_end_detected(&self, offset: u64);

    fn intermediate_result(&self, offset: u64, result: RecognitionResult);

    fn final_result(&self, offset: u64, result: RecognitionResult);

    fn translation_synthesis(&self, result: RecognitionResult);

    /// An asynchronous transport or service error.
    fn error(&self, message: &str);

    // --- configuration -----------------------------------------------------

    /// Named string property; empty string when unset.
    fn string_property(&self, name: &str) -> String;

    /// Named boolean property.
    fn bool_property(&self, name: &str, default: bool) -> bool;

    /// Grammar hints biasing recognition. Items shaped `{name:ref}` become
    /// reference grammars; everything else is a generic phrase.
    fn listen_for_list(&self) -> Vec<String> {
        Vec::new()
    }

    /// Intent-provider configuration, if any.
    fn intent_info(&self) -> IntentInfo {
        IntentInfo::default()
    }

    // --- result factory ----------------------------------------------------

    /// Build an intermediate result. Sites may override to attach their own
    /// result machinery.
    fn create_intermediate_result(&self, text: &str, kind: ResultKind) -> RecognitionResult {
        RecognitionResult::new(kind, text, false)
    }

    /// Build a final result.
    fn create_final_result(&self, text: &str, kind: ResultKind) -> RecognitionResult {
        RecognitionResult::new(kind, text, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_info_completeness() {
        assert!(!IntentInfo::default().is_complete());
        assert!(!IntentInfo {
            provider: "LUIS".to_string(),
            id: "app".to_string(),
            key: String::new(),
        }
        .is_complete());
        assert!(IntentInfo {
            provider: "LUIS".to_string(),
            id: "app".to_string(),
            key: "secret".to_string(),
        }
        .is_complete());
    }
}
