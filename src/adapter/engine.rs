//! The recognition engine adapter.
//!
//! One adapter mediates one recognition session: it turns the consumer's
//! format/audio calls into the service's message sequence and demultiplexes
//! the service's response stream back into site callbacks.
//!
//! Locking discipline: a single reader/writer lock guards all mutable
//! state. Each entry point and inbound handler takes the lock, checks for a
//! bad state (Error/Terminating/Zombie), validates and performs its
//! transition, and releases the lock before any call to the site or the
//! transport. Handlers that need a follow-up transition after a side effect
//! re-acquire the lock (the intent-lapse paths).

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::adapter::buffer::ChunkBuffer;
use crate::adapter::context;
use crate::adapter::state::{AudioState, ProtocolState, StateController};
use crate::error::AdapterError;
use crate::properties;
use crate::result::{ResultKind, SynthesisResult, SynthesisStatus, TranslationResult, TranslationStatus};
use crate::site::Site;
use crate::transport::messages::{
    self, SpeechEndDetectedMsg, SpeechFragmentMsg, SpeechHypothesisMsg, SpeechPhraseMsg,
    SpeechStartDetectedMsg, TranslationHypothesisMsg, TranslationPayload, TranslationPhraseMsg,
    TranslationSynthesisEndMsg, TranslationSynthesisMsg, TurnStartMsg,
};
use crate::transport::ws::WsConnector;
use crate::transport::{
    Authentication, Client, EndpointType, RecognitionMode, UspConnection, UspConnector,
    UspObserver,
};
use crate::wave::{self, WaveFormat};

/// Service-preferred duration of one outbound audio chunk.
const SERVICE_PREFERRED_MS: u64 = 200;

/// All mutable adapter state, guarded by one lock.
struct Inner {
    state: StateController,
    format: Option<WaveFormat>,
    connection: Option<Arc<dyn UspConnection>>,
    single_shot: bool,
    reco_mode: RecognitionMode,
    custom_endpoint: bool,
    expect_intent_response: bool,
    pending_final_phrase: Option<SpeechPhraseMsg>,
    /// Single-shot idle request observed at speech-end, delivered at
    /// turn-end so it follows the stop notification.
    idle_pending: bool,
    chunk_size: usize,
    buffer: Option<ChunkBuffer>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            state: StateController::default(),
            format: None,
            connection: None,
            single_shot: false,
            reco_mode: RecognitionMode::Interactive,
            custom_endpoint: false,
            expect_intent_response: false,
            pending_final_phrase: None,
            idle_pending: false,
            chunk_size: 0,
            buffer: None,
        }
    }
}

/// Mediator between a local audio feed and the remote recognition service.
pub struct UspRecoEngineAdapter {
    weak_self: Weak<UspRecoEngineAdapter>,
    site: RwLock<Option<Weak<dyn Site>>>,
    connector: Arc<dyn UspConnector>,
    inner: RwLock<Inner>,
}

impl UspRecoEngineAdapter {
    /// Create an adapter using the production WebSocket transport.
    pub fn new() -> Arc<Self> {
        Self::with_connector(Arc::new(WsConnector))
    }

    /// Create an adapter over a caller-supplied transport.
    pub fn with_connector(connector: Arc<dyn UspConnector>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            weak_self: weak.clone(),
            site: RwLock::new(None),
            connector,
            inner: RwLock::new(Inner::default()),
        })
    }

    /// Attach the hosting site. The adapter never owns its site.
    pub fn set_site(&self, site: Weak<dyn Site>) {
        *self.site.write() = Some(site);
    }

    /// Validate that the adapter is ready for a session.
    pub fn init(&self) -> Result<(), AdapterError> {
        if self.site().is_none() {
            return Err(AdapterError::Uninitialized("site not set"));
        }
        let inner = self.inner.read();
        if inner.connection.is_some() {
            return Err(AdapterError::AlreadyInitialized);
        }
        debug_assert!(inner.state.is_pair(AudioState::Idle, ProtocolState::Idle));
        Ok(())
    }

    /// Select single-shot (one phrase, then audio idle) vs continuous
    /// consumption. Orthogonal to the recognition mode.
    pub fn set_single_shot(&self, single_shot: bool) {
        debug!("single_shot={single_shot}");
        self.inner.write().single_shot = single_shot;
    }

    pub fn audio_state(&self) -> AudioState {
        self.inner.read().state.audio()
    }

    pub fn protocol_state(&self) -> ProtocolState {
        self.inner.read().state.protocol()
    }

    /// True when a user-supplied URL overrides derived endpoint selection.
    pub fn custom_endpoint(&self) -> bool {
        self.inner.read().custom_endpoint
    }

    /// Announce the audio format (`Some`) or request a stop (`None`).
    pub fn set_format(&self, format: Option<&WaveFormat>) {
        let mut inner = self.inner.write();

        if inner.state.is_bad() && !inner.state.is_protocol(ProtocolState::Terminating) {
            debug!("set_format: ignoring ({:?})", state_of(&inner));
        } else if format.is_some()
            && inner.state.is_protocol(ProtocolState::Idle)
            && inner.state.transition_audio(AudioState::Idle, AudioState::Ready)
        {
            inner.format = format.cloned();
            inner.chunk_size = 0;
            inner.buffer = None;
            // the connection is opened lazily on the first audio chunk
        } else if format.is_none()
            && (inner.state.set_audio(AudioState::Idle)
                || inner.state.is_protocol(ProtocolState::Terminating))
        {
            drop(inner);

            if let Some(site) = self.site() {
                site.completed_set_format_stop();
            }
            self.inner.write().format = None;
        } else {
            warn!("set_format: unexpected state transition ({:?})", state_of(&inner));
        }
    }

    /// Feed audio. A zero-length call flushes the outbound buffer.
    pub fn process_audio(&self, data: &[u8]) -> Result<(), AdapterError> {
        let inner = self.inner.write();

        if inner.state.is_bad() {
            debug!("process_audio: ignoring ({:?})", state_of(&inner));
            return Ok(());
        }

        let mut inner = inner;
        if !data.is_empty()
            && inner.state.transition(
                AudioState::Ready,
                ProtocolState::Idle,
                AudioState::Sending,
                ProtocolState::WaitingForTurnStart,
            )
        {
            drop(inner);

            debug!("process_audio: starting turn, size={}", data.len());
            if let Err(e) = self.start_turn(data) {
                self.inner.write().state.set_protocol(ProtocolState::Error);
                return Err(e);
            }

            if let Some(site) = self.site() {
                site.starting_turn();
            }
        } else if !data.is_empty() && inner.state.is_audio(AudioState::Sending) {
            drop(inner);
            self.usp_write(data);
        } else if data.is_empty() && inner.state.is_audio(AudioState::Sending) {
            drop(inner);
            self.usp_write_flush();
        } else if !inner.state.is_audio(AudioState::Sending) {
            debug!(
                "process_audio: ignoring {} bytes ({:?})",
                data.len(),
                state_of(&inner)
            );
        } else {
            warn!(
                "process_audio: unexpected state transition ({:?})",
                state_of(&inner)
            );
        }

        Ok(())
    }

    /// Terminate the adapter. After this only Zombie remains; every later
    /// input is ignored.
    pub fn term(&self) {
        let mut inner = self.inner.write();
        if inner.state.set_protocol(ProtocolState::Terminating) {
            let connection = inner.connection.take();
            drop(inner);

            debug!("term: disposing connection");
            drop(connection); // blocks on transport shutdown

            self.inner.write().state.set_protocol(ProtocolState::Zombie);
        } else {
            warn!("term: unexpected state transition ({:?})", state_of(&inner));
        }
    }

    // -------------------------------------------------------------------
    // Turn setup
    // -------------------------------------------------------------------

    fn site(&self) -> Option<Arc<dyn Site>> {
        self.site.read().as_ref()?.upgrade()
    }

    /// Build the connection configuration from site properties, following
    /// the endpoint priority ladder.
    fn build_client_config(
        &self,
        site: &Arc<dyn Site>,
    ) -> Result<(crate::transport::ClientConfig, bool), AdapterError> {
        let mut client = Client::new();
        let mut custom_endpoint = false;

        let endpoint = site.string_property(properties::ENDPOINT);
        if endpoint.eq_ignore_ascii_case("CORTANA") {
            client = client.endpoint_type(EndpointType::Cdsdk);
        } else if !endpoint.is_empty() {
            debug!("using custom endpoint URL: {endpoint}");
            custom_endpoint = true;
            client = client.endpoint_url(&endpoint);
        } else {
            let from_language = site.string_property(properties::TRANSLATION_FROM_LANGUAGE);
            if !from_language.is_empty() {
                let to_languages = site.string_property(properties::TRANSLATION_TO_LANGUAGES);
                if to_languages.is_empty() {
                    return Err(AdapterError::InvalidArgument(
                        "translation target languages must be set".to_string(),
                    ));
                }
                client = client
                    .endpoint_type(EndpointType::Translation)
                    .translation_source_language(from_language)
                    .translation_target_languages(to_languages)
                    .translation_voice(site.string_property(properties::TRANSLATION_VOICE))
                    .model_id(site.string_property(properties::SPEECH_MODEL_ID));
            } else {
                let model_id = site.string_property(properties::SPEECH_MODEL_ID);
                if !model_id.is_empty() {
                    client = client
                        .endpoint_type(EndpointType::CustomSpeech)
                        .model_id(model_id);
                } else {
                    client = client.endpoint_type(EndpointType::Speech);
                    let language = site.string_property(properties::SPEECH_RECO_LANGUAGE);
                    if !language.is_empty() {
                        client = client.language(language);
                    }
                }
            }
        }

        // recognition mode: property first, then the custom URL path
        let mode_value = site.string_property(properties::SPEECH_RECO_MODE);
        let mode = match RecognitionMode::from_property(&mode_value)? {
            Some(mode) => mode,
            None if custom_endpoint => {
                RecognitionMode::from_endpoint_url(&endpoint).unwrap_or_default()
            }
            None => RecognitionMode::default(),
        };
        client = client.recognition_mode(mode);

        // authentication: first non-empty credential wins
        let subscription_key = site.string_property(properties::SPEECH_SUBSCRIPTION_KEY);
        let auth_token = site.string_property(properties::SPEECH_AUTH_TOKEN);
        let rps_token = site.string_property(properties::SPEECH_RPS_TOKEN);
        if !subscription_key.is_empty() {
            client = client.authentication(Authentication::SubscriptionKey(subscription_key));
        } else if !auth_token.is_empty() {
            client = client.authentication(Authentication::AuthorizationToken(auth_token));
        } else if !rps_token.is_empty() {
            client = client.authentication(Authentication::SearchDelegationRpsToken(rps_token));
        }

        Ok((client.build()?, custom_endpoint))
    }

    /// Open the connection if there is none.
    fn ensure_connection(&self) -> Result<(), AdapterError> {
        if self.inner.read().connection.is_some() {
            return Ok(());
        }

        let site = self
            .site()
            .ok_or(AdapterError::Uninitialized("site not set"))?;
        let (config, custom_endpoint) = self.build_client_config(&site)?;
        let reco_mode = config.reco_mode;
        debug!("connecting: endpoint={:?} mode={:?}", config.endpoint_type, reco_mode);

        let observer: Weak<dyn UspObserver> = self.weak_self.clone();
        let connection = self.connector.connect(&config, observer)?;

        let mut inner = self.inner.write();
        inner.custom_endpoint = custom_endpoint;
        inner.reco_mode = reco_mode;
        inner.connection = Some(connection);
        Ok(())
    }

    /// The first-audio sequence: connect, speech context, WAVE preamble,
    /// chunk-size installation, first audio bytes.
    fn start_turn(&self, data: &[u8]) -> Result<(), AdapterError> {
        self.ensure_connection()?;

        let site = self
            .site()
            .ok_or(AdapterError::Uninitialized("site not set"))?;

        // speech context, composed fresh for every turn
        let dgi = if site.bool_property(properties::INTERNAL_NO_DGI, false) {
            None
        } else {
            context::dgi_json(&site.listen_for_list())
        };
        let intent = if site.bool_property(properties::INTERNAL_NO_INTENT_JSON, false) {
            None
        } else {
            let info = site.intent_info();
            context::intent_json(&info.provider, &info.id, &info.key)
        };

        let format = {
            let mut inner = self.inner.write();
            inner.expect_intent_response = intent.is_some();
            inner.idle_pending = false;
            inner.format.clone()
        };
        let format = format.ok_or(AdapterError::Uninitialized("no format announced"))?;

        if let Some(payload) = context::speech_context_json(dgi, intent) {
            debug!("{}='{}'", context::SPEECH_CONTEXT_PATH, payload);
            let connection = self.inner.read().connection.clone();
            if let Some(connection) = connection {
                connection.send_message(context::SPEECH_CONTEXT_PATH, payload.as_bytes())?;
            }
        }

        // the preamble goes out unbuffered: chunk_size is still zero
        self.usp_write(&wave::stream_preamble(&format));

        {
            let mut inner = self.inner.write();
            inner.chunk_size = format.samples_per_sec as usize
                * usize::from(format.block_align)
                * SERVICE_PREFERRED_MS as usize
                / 1000;
        }

        self.usp_write(data);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Outbound audio
    // -------------------------------------------------------------------

    /// Write audio, direct or buffered by the current chunk size. Chunks
    /// are drained under the lock and sent after it is released.
    fn usp_write(&self, data: &[u8]) {
        let (connection, chunks) = {
            let mut inner = self.inner.write();
            if matches!(
                inner.state.protocol(),
                ProtocolState::Terminating | ProtocolState::Zombie
            ) {
                return;
            }
            let Some(connection) = inner.connection.clone() else {
                return;
            };

            if inner.chunk_size == 0 {
                (connection, vec![bytes::Bytes::copy_from_slice(data)])
            } else {
                let chunk_size = inner.chunk_size;
                let buffer = inner
                    .buffer
                    .get_or_insert_with(|| ChunkBuffer::new(chunk_size));
                (connection, buffer.write(data))
            }
        };

        for chunk in chunks {
            if let Err(e) = connection.write_audio(&chunk) {
                warn!("audio write failed: {e}");
                return;
            }
        }
    }

    /// Drain the buffer and signal end-of-audio.
    fn usp_write_flush(&self) {
        let (connection, tail) = {
            let mut inner = self.inner.write();
            if matches!(
                inner.state.protocol(),
                ProtocolState::Terminating | ProtocolState::Zombie
            ) {
                return;
            }
            let Some(connection) = inner.connection.clone() else {
                return;
            };
            let tail = inner.buffer.take().and_then(|mut buffer| buffer.flush());
            (connection, tail)
        };

        if let Some(tail) = tail {
            if let Err(e) = connection.write_audio(&tail) {
                warn!("audio flush write failed: {e}");
            }
        }
        if let Err(e) = connection.flush_audio() {
            warn!("audio flush failed: {e}");
        }
    }

    // -------------------------------------------------------------------
    // Result delivery
    // -------------------------------------------------------------------

    fn fire_intermediate(&self, text: &str, offset: u64, json: &str) {
        let Some(site) = self.site() else { return };
        let mut result = site.create_intermediate_result(text, ResultKind::Speech);
        result.set_property(properties::RESULT_JSON, json);
        site.intermediate_result(offset, result);
    }

    fn fire_final_now(&self, msg: &SpeechPhraseMsg, luis_json: &str) {
        let Some(site) = self.site() else { return };
        let mut result = site.create_final_result(&msg.display_text, ResultKind::Speech);
        result.set_property(properties::RESULT_JSON, msg.json.clone());
        if !luis_json.is_empty() {
            result.set_property(properties::RESULT_LANGUAGE_UNDERSTANDING_JSON, luis_json);
        }
        site.final_result(msg.offset, result);
    }

    /// Fire a deferred final, if one is actually pending. The slot is
    /// taken by the caller, so a lapse after enrichment fires nothing and
    /// each phrase yields at most one final result.
    fn fire_pending_final(&self, pending: Option<SpeechPhraseMsg>, luis_json: &str) {
        if let Some(msg) = pending {
            self.fire_final_now(&msg, luis_json);
        } else {
            debug!("no deferred final pending");
        }
    }

    fn translation_of(payload: &TranslationPayload) -> TranslationResult {
        let status = payload.status.as_ref().map(|status| match status {
            messages::TranslationStatus::Success => TranslationStatus::Success,
            messages::TranslationStatus::Error => TranslationStatus::Error,
            messages::TranslationStatus::Unknown(value) => {
                warn!("unknown translation status '{value}'");
                TranslationStatus::Error
            }
        });
        TranslationResult {
            status,
            translations: payload.translations.clone(),
            failure_reason: payload.failure_reason.clone(),
        }
    }
}

fn state_of(inner: &Inner) -> (AudioState, ProtocolState) {
    (inner.state.audio(), inner.state.protocol())
}

// =============================================================================
// Inbound event handling
// =============================================================================

impl UspObserver for UspRecoEngineAdapter {
    fn on_turn_start(&self, msg: TurnStartMsg) {
        debug!("turn.start, serviceTag={}", msg.context_service_tag);

        let mut inner = self.inner.write();
        if inner.state.is_bad() {
            debug!("turn.start: ignoring ({:?})", state_of(&inner));
        } else if inner.state.transition_protocol(
            ProtocolState::WaitingForTurnStart,
            ProtocolState::WaitingForPhrase,
        ) {
            drop(inner);
            if let Some(site) = self.site() {
                site.started_turn(&msg.context_service_tag);
            }
        } else {
            warn!("turn.start: unexpected state transition ({:?})", state_of(&inner));
        }
    }

    fn on_speech_start_detected(&self, msg: SpeechStartDetectedMsg) {
        debug!("speech.startDetected at offset {}", msg.offset);

        let inner = self.inner.write();
        if inner.state.is_bad() {
            debug!("speech.startDetected: ignoring ({:?})", state_of(&inner));
        } else if inner.state.is_protocol(ProtocolState::WaitingForPhrase) {
            drop(inner);
            if let Some(site) = self.site() {
                site.speech_start_detected(msg.offset);
            }
        } else {
            warn!(
                "speech.startDetected: unexpected state transition ({:?})",
                state_of(&inner)
            );
        }
    }

    fn on_speech_end_detected(&self, msg: SpeechEndDetectedMsg) {
        debug!("speech.endDetected at offset {}", msg.offset);

        let deliver = {
            let mut inner = self.inner.write();
            // the audio axis may stop even while the protocol axis is in
            // Error; the idle request itself is delivered at turn-end
            if inner.single_shot
                && inner
                    .state
                    .transition_audio(AudioState::Sending, AudioState::Stopping)
            {
                inner.idle_pending = true;
            }

            if inner.state.is_bad() {
                debug!("speech.endDetected: ignoring ({:?})", state_of(&inner));
                false
            } else if inner.state.protocol_in_range(
                ProtocolState::WaitingForPhrase,
                ProtocolState::WaitingForTurnEnd,
            ) && matches!(
                inner.state.audio(),
                AudioState::Idle | AudioState::Sending | AudioState::Stopping
            ) {
                true
            } else {
                warn!(
                    "speech.endDetected: unexpected state transition ({:?})",
                    state_of(&inner)
                );
                false
            }
        };

        if deliver {
            if let Some(site) = self.site() {
                site.speech_end_detected(msg.offset);
            }
        }

        self.usp_write_flush();
    }

    fn on_speech_hypothesis(&self, msg: SpeechHypothesisMsg) {
        debug!("speech.hypothesis at {}+{}: {}", msg.offset, msg.duration, msg.text);

        let inner = self.inner.read();
        if inner.state.is_bad() {
            debug!("speech.hypothesis: ignoring ({:?})", state_of(&inner));
        } else if inner.state.is_protocol(ProtocolState::WaitingForPhrase) {
            drop(inner);
            self.fire_intermediate(&msg.text, msg.offset, &msg.json);
        } else {
            warn!(
                "speech.hypothesis: unexpected state transition ({:?})",
                state_of(&inner)
            );
        }
    }

    fn on_speech_fragment(&self, msg: SpeechFragmentMsg) {
        debug!("speech.fragment at {}+{}: {}", msg.offset, msg.duration, msg.text);

        let send_intermediate = {
            let mut inner = self.inner.write();
            if inner.state.is_bad() {
                debug!("speech.fragment: ignoring ({:?})", state_of(&inner));
                false
            } else if inner.state.transition_protocol(
                ProtocolState::WaitingForIntent,
                ProtocolState::WaitingForIntent2,
            ) {
                // the intent response never came; release the deferred
                // final before the new intermediate
                debug!("speech.fragment: intent response never arrived");
                let pending = inner.pending_final_phrase.take();
                drop(inner);
                self.fire_pending_final(pending, "");

                self.inner.write().state.transition_protocol(
                    ProtocolState::WaitingForIntent2,
                    ProtocolState::WaitingForPhrase,
                );
                true
            } else if inner.state.is_protocol(ProtocolState::WaitingForPhrase) {
                true
            } else {
                warn!(
                    "speech.fragment: unexpected state transition ({:?})",
                    state_of(&inner)
                );
                false
            }
        };

        if send_intermediate {
            self.fire_intermediate(&msg.text, msg.offset, &msg.json);
        }
    }

    fn on_speech_phrase(&self, msg: SpeechPhraseMsg) {
        debug!(
            "speech.phrase, status={:?}, text={}",
            msg.recognition_status, msg.display_text
        );

        let mut inner = self.inner.write();
        if inner.state.is_bad() {
            debug!("speech.phrase: ignoring ({:?})", state_of(&inner));
        } else if inner.expect_intent_response
            && msg.recognition_status.is_success()
            && inner.state.transition_protocol(
                ProtocolState::WaitingForPhrase,
                ProtocolState::WaitingForIntent,
            )
        {
            // defer the final until the intent response (or its lapse)
            inner.pending_final_phrase = Some(msg);
        } else {
            let interactive = inner.reco_mode == RecognitionMode::Interactive;
            if (interactive
                && inner.state.transition_protocol(
                    ProtocolState::WaitingForPhrase,
                    ProtocolState::WaitingForTurnEnd,
                ))
                || (!interactive
                    && inner.state.transition_protocol(
                        ProtocolState::WaitingForPhrase,
                        ProtocolState::WaitingForPhrase,
                    ))
            {
                drop(inner);
                self.fire_final_now(&msg, "");
            } else {
                warn!(
                    "speech.phrase: unexpected state transition ({:?})",
                    state_of(&inner)
                );
            }
        }
    }

    fn on_translation_hypothesis(&self, msg: TranslationHypothesisMsg) {
        debug!(
            "translation.hypothesis at {}+{}: {}",
            msg.offset, msg.duration, msg.text
        );

        let inner = self.inner.write();
        if inner.state.is_bad() {
            debug!("translation.hypothesis: ignoring ({:?})", state_of(&inner));
        } else if inner.state.is_protocol(ProtocolState::WaitingForPhrase) {
            drop(inner);

            let Some(site) = self.site() else { return };
            let mut result = site.create_intermediate_result(&msg.text, ResultKind::TranslationText);
            result.set_property(properties::RESULT_JSON, msg.json.clone());
            result.set_translation(Self::translation_of(&msg.translation));
            site.intermediate_result(msg.offset, result);
        } else {
            warn!(
                "translation.hypothesis: unexpected state transition ({:?})",
                state_of(&inner)
            );
        }
    }

    fn on_translation_phrase(&self, msg: TranslationPhraseMsg) {
        debug!(
            "translation.phrase, status={:?}, text={}",
            msg.recognition_status, msg.text
        );

        let mut inner = self.inner.write();
        if inner.state.is_bad() {
            debug!("translation.phrase: ignoring ({:?})", state_of(&inner));
            return;
        }

        let interactive = inner.reco_mode == RecognitionMode::Interactive;
        if (interactive
            && inner.state.transition_protocol(
                ProtocolState::WaitingForPhrase,
                ProtocolState::WaitingForTurnEnd,
            ))
            || (!interactive
                && inner.state.transition_protocol(
                    ProtocolState::WaitingForPhrase,
                    ProtocolState::WaitingForPhrase,
                ))
        {
            drop(inner);

            let Some(site) = self.site() else { return };
            let mut result = site.create_final_result(&msg.text, ResultKind::TranslationText);
            result.set_property(properties::RESULT_JSON, msg.json.clone());
            result.set_translation(Self::translation_of(&msg.translation));
            site.final_result(msg.offset, result);
        } else {
            warn!(
                "translation.phrase: unexpected state transition ({:?})",
                state_of(&inner)
            );
        }
    }

    fn on_translation_synthesis(&self, msg: TranslationSynthesisMsg) {
        debug!("translation.synthesis, {} bytes", msg.audio.len());

        if self.inner.read().state.is_bad() {
            debug!("translation.synthesis: ignoring");
            return;
        }

        let Some(site) = self.site() else { return };
        let mut result = site.create_final_result("", ResultKind::TranslationSynthesis);
        result.set_synthesis(SynthesisResult {
            status: SynthesisStatus::Success,
            audio: Some(msg.audio),
            failure_reason: String::new(),
        });
        site.translation_synthesis(result);
    }

    fn on_translation_synthesis_end(&self, msg: TranslationSynthesisEndMsg) {
        debug!(
            "translation.synthesis.end, status={:?}, reason={}",
            msg.synthesis_status, msg.failure_reason
        );

        if self.inner.read().state.is_bad() {
            debug!("translation.synthesis.end: ignoring");
            return;
        }

        let status = match &msg.synthesis_status {
            messages::SynthesisStatus::Success => SynthesisStatus::SynthesisEnd,
            messages::SynthesisStatus::Error => SynthesisStatus::Error,
            messages::SynthesisStatus::Unknown(value) => {
                warn!("unknown synthesis status '{value}'");
                SynthesisStatus::Error
            }
        };

        let Some(site) = self.site() else { return };
        let mut result = site.create_final_result("", ResultKind::TranslationSynthesis);
        result.set_synthesis(SynthesisResult {
            status,
            audio: None,
            failure_reason: msg.failure_reason.clone(),
        });
        site.translation_synthesis(result);
    }

    fn on_turn_end(&self) {
        debug!("turn.end");

        let (prepare_ready, request_idle, turn_stopped) = {
            let mut inner = self.inner.write();
            let prepare_ready = !inner.single_shot
                && inner
                    .state
                    .transition_audio(AudioState::Sending, AudioState::Ready);
            let request_idle = inner.single_shot
                && (inner
                    .state
                    .transition_audio(AudioState::Sending, AudioState::Stopping)
                    || std::mem::take(&mut inner.idle_pending));

            let interactive = inner.reco_mode == RecognitionMode::Interactive;
            if inner.state.is_bad() {
                debug!("turn.end: ignoring ({:?})", state_of(&inner));
                (prepare_ready, false, false)
            } else if (interactive
                && inner
                    .state
                    .transition_protocol(ProtocolState::WaitingForTurnEnd, ProtocolState::Idle))
                || (!interactive
                    && inner
                        .state
                        .transition_protocol(ProtocolState::WaitingForPhrase, ProtocolState::Idle))
            {
                (prepare_ready, request_idle, true)
            } else if inner.state.transition_protocol(
                ProtocolState::WaitingForIntent,
                ProtocolState::WaitingForIntent2,
            ) {
                debug!("turn.end: intent response never arrived");
                let pending = inner.pending_final_phrase.take();
                drop(inner);
                self.fire_pending_final(pending, "");

                self.inner
                    .write()
                    .state
                    .transition_protocol(ProtocolState::WaitingForIntent2, ProtocolState::Idle);
                (prepare_ready, request_idle, true)
            } else {
                warn!("turn.end: unexpected state transition ({:?})", state_of(&inner));
                (prepare_ready, request_idle, false)
            }
        };

        if prepare_ready && !self.inner.read().state.is_bad() {
            // re-arm for the next turn; a dropped connection is reopened
            // lazily by the next first-audio chunk
            let mut inner = self.inner.write();
            inner.chunk_size = 0;
            inner.buffer = None;
        }

        if turn_stopped {
            if let Some(site) = self.site() {
                site.stopped_turn();
            }
        }

        if request_idle {
            self.usp_write_flush();
            if let Some(site) = self.site() {
                site.requesting_audio_idle();
            }
        }
    }

    fn on_error(&self, message: String) {
        debug!("transport error: {message}");

        let reset_configured = self
            .site()
            .map_or(false, |site| {
                site.bool_property(properties::INTERNAL_RESET_AFTER_ERROR, false)
            });

        let mut inner = self.inner.write();
        if inner.state.is_bad() {
            debug!("error: ignoring ({:?})", state_of(&inner));
            return;
        }

        let should_reset = reset_configured && inner.format.is_some();
        let current_audio = inner.state.audio();
        let current_protocol = inner.state.protocol();
        if should_reset
            && inner.state.transition(
                current_audio,
                current_protocol,
                AudioState::Ready,
                ProtocolState::Idle,
            )
        {
            let connection = inner.connection.take();
            inner.chunk_size = 0;
            inner.buffer = None;
            inner.pending_final_phrase = None;
            inner.idle_pending = false;
            drop(inner);

            debug!("resetting after error: {message}");
            if let Some(site) = self.site() {
                site.error(&message);
            }
            drop(connection); // next audio chunk reconnects
        } else if inner.state.set_protocol(ProtocolState::Error) {
            drop(inner);
            if let Some(site) = self.site() {
                site.error(&message);
            }
        } else {
            warn!("error: unexpected state transition ({:?})", state_of(&inner));
        }
    }

    fn on_user_message(&self, path: &str, content_type: &str, body: &[u8]) {
        debug!("user message: path={path}, content-type={content_type}");

        if path != "response" {
            return;
        }

        let mut inner = self.inner.write();
        if inner.state.is_bad() {
            debug!("user message: ignoring ({:?})", state_of(&inner));
        } else if inner.state.is_protocol(ProtocolState::WaitingForIntent) {
            let pending = inner.pending_final_phrase.take();
            drop(inner);

            let luis_json = String::from_utf8_lossy(body).into_owned();
            debug!("intent response: {luis_json}");
            self.fire_pending_final(pending, &luis_json);
        } else {
            warn!(
                "user message: unexpected state transition ({:?})",
                state_of(&inner)
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::site::IntentInfo;

    /// Site backed by a plain property map; callbacks are no-ops.
    struct MapSite {
        strings: HashMap<String, String>,
    }

    impl MapSite {
        fn new(pairs: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                strings: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            })
        }
    }

    impl Site for MapSite {
        fn starting_turn(&self) {}
        fn started_turn(&self, _service_tag: &str) {}
        fn stopped_turn(&self) {}
        fn requesting_audio_idle(&self) {}
        fn completed_set_format_stop(&self) {}
        fn speech_start_detected(&self, _offset: u64) {}
        fn speech_end_detected(&self, _offset: u64) {}
        fn intermediate_result(&self, _offset: u64, _result: crate::result::RecognitionResult) {}
        fn final_result(&self, _offset: u64, _result: crate::result::RecognitionResult) {}
        fn translation_synthesis(&self, _result: crate::result::RecognitionResult) {}
        fn error(&self, _message: &str) {}

        fn string_property(&self, name: &str) -> String {
            self.strings.get(name).cloned().unwrap_or_default()
        }

        fn bool_property(&self, _name: &str, default: bool) -> bool {
            default
        }

        fn intent_info(&self) -> IntentInfo {
            IntentInfo::default()
        }
    }

    fn config_for(pairs: &[(&str, &str)]) -> (crate::transport::ClientConfig, bool) {
        let adapter = UspRecoEngineAdapter::new();
        let site = MapSite::new(pairs);
        let site_dyn: Arc<dyn Site> = site;
        adapter.build_client_config(&site_dyn).unwrap()
    }

    fn config_err(pairs: &[(&str, &str)]) -> AdapterError {
        let adapter = UspRecoEngineAdapter::new();
        let site: Arc<dyn Site> = MapSite::new(pairs);
        adapter.build_client_config(&site).unwrap_err()
    }

    const KEY: (&str, &str) = (properties::SPEECH_SUBSCRIPTION_KEY, "sk");

    #[test]
    fn test_endpoint_priority_cortana_first() {
        let (config, custom) = config_for(&[
            (properties::ENDPOINT, "cortana"),
            (properties::TRANSLATION_FROM_LANGUAGE, "en-US"),
            (properties::TRANSLATION_TO_LANGUAGES, "de"),
            (properties::SPEECH_MODEL_ID, "model"),
            KEY,
        ]);
        assert_eq!(config.endpoint_type, EndpointType::Cdsdk);
        assert!(!custom);
    }

    #[test]
    fn test_endpoint_priority_custom_url_beats_translation() {
        let (config, custom) = config_for(&[
            (properties::ENDPOINT, "wss://example.org/speech/v1"),
            (properties::TRANSLATION_FROM_LANGUAGE, "en-US"),
            (properties::TRANSLATION_TO_LANGUAGES, "de"),
            KEY,
        ]);
        assert_eq!(config.endpoint_type, EndpointType::Custom);
        assert!(custom);
    }

    #[test]
    fn test_endpoint_priority_translation_beats_model() {
        let (config, _) = config_for(&[
            (properties::TRANSLATION_FROM_LANGUAGE, "en-US"),
            (properties::TRANSLATION_TO_LANGUAGES, "de,fr"),
            (properties::TRANSLATION_VOICE, "de-DE-Hedda"),
            (properties::SPEECH_MODEL_ID, "model"),
            KEY,
        ]);
        assert_eq!(config.endpoint_type, EndpointType::Translation);
        assert_eq!(config.translation_target_languages, "de,fr");
        assert_eq!(config.model_id, "model");
    }

    #[test]
    fn test_translation_without_targets_is_an_error() {
        let err = config_err(&[(properties::TRANSLATION_FROM_LANGUAGE, "en-US"), KEY]);
        assert!(matches!(err, AdapterError::InvalidArgument(_)));
    }

    #[test]
    fn test_endpoint_priority_model_beats_language() {
        let (config, _) = config_for(&[
            (properties::SPEECH_MODEL_ID, "model-1"),
            (properties::SPEECH_RECO_LANGUAGE, "de-DE"),
            KEY,
        ]);
        assert_eq!(config.endpoint_type, EndpointType::CustomSpeech);
        assert_eq!(config.model_id, "model-1");
    }

    #[test]
    fn test_endpoint_priority_language_then_default() {
        let (config, _) = config_for(&[(properties::SPEECH_RECO_LANGUAGE, "fr-FR"), KEY]);
        assert_eq!(config.endpoint_type, EndpointType::Speech);
        assert_eq!(config.language, "fr-FR");

        let (config, _) = config_for(&[KEY]);
        assert_eq!(config.endpoint_type, EndpointType::Speech);
        assert!(config.language.is_empty());
    }

    #[test]
    fn test_mode_from_property_beats_custom_url() {
        let (config, _) = config_for(&[
            (
                properties::ENDPOINT,
                "wss://host/speech/recognition/dictation/cognitiveservices/v1",
            ),
            (properties::SPEECH_RECO_MODE, "conversation"),
            KEY,
        ]);
        assert_eq!(config.reco_mode, RecognitionMode::Conversation);
    }

    #[test]
    fn test_mode_scanned_from_custom_url() {
        let (config, custom) = config_for(&[
            (
                properties::ENDPOINT,
                "wss://host/speech/recognition/dictation/cognitiveservices/v1",
            ),
            KEY,
        ]);
        assert!(custom);
        assert_eq!(config.reco_mode, RecognitionMode::Dictation);
    }

    #[test]
    fn test_mode_defaults_to_interactive() {
        let (config, _) = config_for(&[KEY]);
        assert_eq!(config.reco_mode, RecognitionMode::Interactive);
    }

    #[test]
    fn test_unknown_mode_value_fails() {
        let err = config_err(&[(properties::SPEECH_RECO_MODE, "fastmode"), KEY]);
        assert!(matches!(err, AdapterError::InvalidArgument(_)));
    }

    #[test]
    fn test_authentication_priority() {
        let (config, _) = config_for(&[
            KEY,
            (properties::SPEECH_AUTH_TOKEN, "tok"),
            (properties::SPEECH_RPS_TOKEN, "rps"),
        ]);
        assert_eq!(
            config.authentication,
            Authentication::SubscriptionKey("sk".to_string())
        );

        let (config, _) = config_for(&[
            (properties::SPEECH_AUTH_TOKEN, "tok"),
            (properties::SPEECH_RPS_TOKEN, "rps"),
        ]);
        assert_eq!(
            config.authentication,
            Authentication::AuthorizationToken("tok".to_string())
        );

        let (config, _) = config_for(&[(properties::SPEECH_RPS_TOKEN, "rps")]);
        assert_eq!(
            config.authentication,
            Authentication::SearchDelegationRpsToken("rps".to_string())
        );
    }

    #[test]
    fn test_missing_authentication_fails() {
        let err = config_err(&[]);
        assert!(matches!(err, AdapterError::InvalidArgument(_)));
        assert!(err.to_string().contains("authentication"));
    }

    #[test]
    fn test_init_requires_site() {
        let adapter = UspRecoEngineAdapter::new();
        assert!(matches!(
            adapter.init(),
            Err(AdapterError::Uninitialized(_))
        ));

        let site: Arc<dyn Site> = MapSite::new(&[]);
        adapter.set_site(Arc::downgrade(&site));
        assert!(adapter.init().is_ok());
    }
}
