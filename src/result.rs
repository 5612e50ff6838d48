//! Recognition result values delivered to the site.

use std::collections::HashMap;

use bytes::Bytes;

use crate::properties;

/// What a result represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Plain speech recognition text.
    Speech,
    /// Translated recognition text.
    TranslationText,
    /// Synthesized translation audio.
    TranslationSynthesis,
}

/// Outcome of a translation carried on a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationStatus {
    Success,
    Error,
}

/// Outcome of a synthesis segment carried on a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisStatus {
    /// Audio bytes are attached.
    Success,
    /// The synthesis stream for the current phrase has ended.
    SynthesisEnd,
    Error,
}

/// Translation payload attached to translation results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationResult {
    pub status: Option<TranslationStatus>,
    /// Target language → translated text.
    pub translations: HashMap<String, String>,
    pub failure_reason: String,
}

/// Synthesis payload attached to translation-synthesis results.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    pub status: SynthesisStatus,
    pub audio: Option<Bytes>,
    pub failure_reason: String,
}

/// A single recognition event, intermediate or final.
///
/// Every result carries the raw server JSON under
/// [`properties::RESULT_JSON`]; intent-enriched finals additionally carry
/// [`properties::RESULT_LANGUAGE_UNDERSTANDING_JSON`].
#[derive(Debug, Clone)]
pub struct RecognitionResult {
    kind: ResultKind,
    is_final: bool,
    text: String,
    translation: Option<TranslationResult>,
    synthesis: Option<SynthesisResult>,
    properties: HashMap<String, String>,
}

impl RecognitionResult {
    pub fn new(kind: ResultKind, text: impl Into<String>, is_final: bool) -> Self {
        Self {
            kind,
            is_final,
            text: text.into(),
            translation: None,
            synthesis: None,
            properties: HashMap::new(),
        }
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn translation(&self) -> Option<&TranslationResult> {
        self.translation.as_ref()
    }

    pub fn synthesis(&self) -> Option<&SynthesisResult> {
        self.synthesis.as_ref()
    }

    /// Look up a named string property (e.g. the raw server JSON).
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// The raw server JSON that produced this result.
    pub fn raw_json(&self) -> Option<&str> {
        self.property(properties::RESULT_JSON)
    }

    /// The language-understanding JSON, when intent enrichment applied.
    pub fn language_understanding_json(&self) -> Option<&str> {
        self.property(properties::RESULT_LANGUAGE_UNDERSTANDING_JSON)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn set_translation(&mut self, translation: TranslationResult) {
        self.translation = Some(translation);
    }

    pub fn set_synthesis(&mut self, synthesis: SynthesisResult) {
        self.synthesis = Some(synthesis);
    }
}
