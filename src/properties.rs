//! Recognized property names.
//!
//! The site exposes configuration as named string/boolean properties; these
//! constants are the full set the adapter consults. Result objects carry
//! their own named properties, listed at the bottom.

/// Endpoint override. The literal `CORTANA` (case-insensitive) selects the
/// CDSDK endpoint; any other non-empty value is used as a custom URL.
pub const ENDPOINT: &str = "Endpoint";

/// Source language for speech translation. Non-empty selects the
/// translation endpoint.
pub const TRANSLATION_FROM_LANGUAGE: &str = "Translation.FromLanguage";

/// Comma-separated target languages for translation. Required when
/// `Translation.FromLanguage` is set.
pub const TRANSLATION_TO_LANGUAGES: &str = "Translation.ToLanguages";

/// Optional synthesis voice for translation.
pub const TRANSLATION_VOICE: &str = "Translation.Voice";

/// Custom speech model id. Non-empty selects the custom-speech endpoint.
pub const SPEECH_MODEL_ID: &str = "Speech.ModelId";

/// Recognition language for the default speech endpoint.
pub const SPEECH_RECO_LANGUAGE: &str = "Speech.RecoLanguage";

/// Recognition mode: `INTERACTIVE`, `CONVERSATION`, or `DICTATION`
/// (case-insensitive).
pub const SPEECH_RECO_MODE: &str = "Speech.RecoMode";

pub const SPEECH_RECO_MODE_INTERACTIVE: &str = "INTERACTIVE";
pub const SPEECH_RECO_MODE_CONVERSATION: &str = "CONVERSATION";
pub const SPEECH_RECO_MODE_DICTATION: &str = "DICTATION";

/// Subscription-key authentication (first priority).
pub const SPEECH_SUBSCRIPTION_KEY: &str = "Speech.SubscriptionKey";

/// Bearer-token authentication (second priority).
pub const SPEECH_AUTH_TOKEN: &str = "Speech.AuthToken";

/// RPS delegation token authentication (third priority).
pub const SPEECH_RPS_TOKEN: &str = "Speech.RpsToken";

/// When true, suppress the DGI fragment of the speech context.
pub const INTERNAL_NO_DGI: &str = "INTERNAL-NoDGI";

/// When true, suppress the intent fragment of the speech context.
pub const INTERNAL_NO_INTENT_JSON: &str = "INTERNAL-NoIntentJson";

/// When true (and a format is held), a transport error resets the adapter
/// to Ready instead of parking it in the Error state.
pub const INTERNAL_RESET_AFTER_ERROR: &str = "INTERNAL-ResetAfterError";

/// Result property holding the raw server JSON for the message that
/// produced the result.
pub const RESULT_JSON: &str = "RESULT_Json";

/// Result property holding the language-understanding (LUIS) JSON when a
/// final result was enriched by an intent response.
pub const RESULT_LANGUAGE_UNDERSTANDING_JSON: &str = "RESULT_LanguageUnderstandingJson";
