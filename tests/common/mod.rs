//! Shared test support: a recording site and a scripted transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use usp_reco::error::TransportError;
use usp_reco::transport::{
    dispatch, ClientConfig, UspConnection, UspConnector, UspMessage, UspObserver,
};
use usp_reco::{AdapterError, IntentInfo, RecognitionResult, Site};

// =============================================================================
// Recording site
// =============================================================================

/// One observed site callback, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteCall {
    StartingTurn,
    StartedTurn(String),
    SpeechStartDetected(u64),
    SpeechEndDetected(u64),
    Intermediate { offset: u64, text: String },
    Final { offset: u64, text: String },
    TranslationSynthesis,
    StoppedTurn,
    RequestingAudioIdle,
    CompletedSetFormatStop,
    Error(String),
}

/// Site double that records every callback and serves configuration from
/// plain maps.
#[derive(Default)]
pub struct RecordingSite {
    calls: Mutex<Vec<SiteCall>>,
    strings: Mutex<HashMap<String, String>>,
    bools: Mutex<HashMap<String, bool>>,
    listen_for: Mutex<Vec<String>>,
    intent: Mutex<IntentInfo>,
    final_results: Mutex<Vec<RecognitionResult>>,
    intermediate_results: Mutex<Vec<RecognitionResult>>,
}

impl RecordingSite {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_string(&self, name: &str, value: &str) {
        self.strings.lock().insert(name.to_string(), value.to_string());
    }

    pub fn set_bool(&self, name: &str, value: bool) {
        self.bools.lock().insert(name.to_string(), value);
    }

    pub fn set_listen_for(&self, items: &[&str]) {
        *self.listen_for.lock() = items.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_intent(&self, provider: &str, id: &str, key: &str) {
        *self.intent.lock() = IntentInfo {
            provider: provider.to_string(),
            id: id.to_string(),
            key: key.to_string(),
        };
    }

    pub fn calls(&self) -> Vec<SiteCall> {
        self.calls.lock().clone()
    }

    pub fn final_results(&self) -> Vec<RecognitionResult> {
        self.final_results.lock().clone()
    }

    pub fn intermediate_results(&self) -> Vec<RecognitionResult> {
        self.intermediate_results.lock().clone()
    }

    fn record(&self, call: SiteCall) {
        self.calls.lock().push(call);
    }
}

impl Site for RecordingSite {
    fn starting_turn(&self) {
        self.record(SiteCall::StartingTurn);
    }

    fn started_turn(&self, service_tag: &str) {
        self.record(SiteCall::StartedTurn(service_tag.to_string()));
    }

    fn stopped_turn(&self) {
        self.record(SiteCall::StoppedTurn);
    }

    fn requesting_audio_idle(&self) {
        self.record(SiteCall::RequestingAudioIdle);
    }

    fn completed_set_format_stop(&self) {
        self.record(SiteCall::CompletedSetFormatStop);
    }

    fn speech_start_detected(&self, offset: u64) {
        self.record(SiteCall::SpeechStartDetected(offset));
    }

    fn speech_end_detected(&self, offset: u64) {
        self.record(SiteCall::SpeechEndDetected(offset));
    }

    fn intermediate_result(&self, offset: u64, result: RecognitionResult) {
        self.record(SiteCall::Intermediate {
            offset,
            text: result.text().to_string(),
        });
        self.intermediate_results.lock().push(result);
    }

    fn final_result(&self, offset: u64, result: RecognitionResult) {
        self.record(SiteCall::Final {
            offset,
            text: result.text().to_string(),
        });
        self.final_results.lock().push(result);
    }

    fn translation_synthesis(&self, result: RecognitionResult) {
        self.record(SiteCall::TranslationSynthesis);
        self.final_results.lock().push(result);
    }

    fn error(&self, message: &str) {
        self.record(SiteCall::Error(message.to_string()));
    }

    fn string_property(&self, name: &str) -> String {
        self.strings.lock().get(name).cloned().unwrap_or_default()
    }

    fn bool_property(&self, name: &str, default: bool) -> bool {
        self.bools.lock().get(name).copied().unwrap_or(default)
    }

    fn listen_for_list(&self) -> Vec<String> {
        self.listen_for.lock().clone()
    }

    fn intent_info(&self) -> IntentInfo {
        self.intent.lock().clone()
    }
}

// =============================================================================
// Scripted transport
// =============================================================================

/// One outbound call observed by the mock connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportWrite {
    Message { path: String, body: Vec<u8> },
    Audio(Vec<u8>),
    Flush,
}

#[derive(Default)]
pub struct MockConnection {
    writes: Mutex<Vec<TransportWrite>>,
}

impl MockConnection {
    pub fn writes(&self) -> Vec<TransportWrite> {
        self.writes.lock().clone()
    }

    /// Concatenation of every audio write, preamble included.
    pub fn audio_bytes(&self) -> Vec<u8> {
        self.writes()
            .into_iter()
            .filter_map(|write| match write {
                TransportWrite::Audio(data) => Some(data),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl UspConnection for MockConnection {
    fn send_message(&self, path: &str, body: &[u8]) -> Result<(), TransportError> {
        self.writes.lock().push(TransportWrite::Message {
            path: path.to_string(),
            body: body.to_vec(),
        });
        Ok(())
    }

    fn write_audio(&self, data: &[u8]) -> Result<(), TransportError> {
        self.writes.lock().push(TransportWrite::Audio(data.to_vec()));
        Ok(())
    }

    fn flush_audio(&self) -> Result<(), TransportError> {
        self.writes.lock().push(TransportWrite::Flush);
        Ok(())
    }
}

/// Connector whose connections are driven by the test: outbound traffic is
/// recorded, inbound frames are injected through [`MockConnector::deliver`].
#[derive(Default)]
pub struct MockConnector {
    connection: Mutex<Option<Arc<MockConnection>>>,
    observer: Mutex<Option<Weak<dyn UspObserver>>>,
    last_config: Mutex<Option<ClientConfig>>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn connection(&self) -> Arc<MockConnection> {
        self.connection.lock().clone().expect("no connection opened")
    }

    pub fn last_config(&self) -> ClientConfig {
        self.last_config.lock().clone().expect("no connection opened")
    }

    fn observer(&self) -> Arc<dyn UspObserver> {
        self.observer
            .lock()
            .clone()
            .expect("no observer registered")
            .upgrade()
            .expect("observer dropped")
    }

    /// Parse a wire frame and dispatch it, as the transport thread would.
    pub fn deliver(&self, frame: &str) {
        let message = UspMessage::parse_text(frame).expect("unparseable test frame");
        dispatch(self.observer().as_ref(), message);
    }

    pub fn deliver_error(&self, message: &str) {
        self.observer().on_error(message.to_string());
    }
}

impl UspConnector for MockConnector {
    fn connect(
        &self,
        config: &ClientConfig,
        observer: Weak<dyn UspObserver>,
    ) -> Result<Arc<dyn UspConnection>, AdapterError> {
        let connection = Arc::new(MockConnection::default());
        *self.connection.lock() = Some(connection.clone());
        *self.observer.lock() = Some(observer);
        *self.last_config.lock() = Some(config.clone());
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(connection)
    }
}

// =============================================================================
// Wire frame builders
// =============================================================================

pub fn turn_start_frame(service_tag: &str) -> String {
    format!("Path:turn.start\r\n\r\n{{\"context\":{{\"serviceTag\":\"{service_tag}\"}}}}")
}

pub fn turn_end_frame() -> String {
    "Path:turn.end\r\n\r\n{}".to_string()
}

pub fn speech_start_frame(offset: u64) -> String {
    format!("Path:speech.startDetected\r\n\r\n{{\"Offset\":{offset}}}")
}

pub fn speech_end_frame(offset: u64) -> String {
    format!("Path:speech.endDetected\r\n\r\n{{\"Offset\":{offset}}}")
}

pub fn hypothesis_frame(text: &str, offset: u64) -> String {
    format!(
        "Path:speech.hypothesis\r\n\r\n{{\"Text\":\"{text}\",\"Offset\":{offset},\"Duration\":0}}"
    )
}

pub fn fragment_frame(text: &str, offset: u64) -> String {
    format!(
        "Path:speech.fragment\r\n\r\n{{\"Text\":\"{text}\",\"Offset\":{offset},\"Duration\":0}}"
    )
}

pub fn phrase_frame(status: &str, text: &str, offset: u64) -> String {
    format!(
        "Path:speech.phrase\r\n\r\n{{\"RecognitionStatus\":\"{status}\",\"DisplayText\":\"{text}\",\"Offset\":{offset},\"Duration\":0}}"
    )
}

pub fn response_frame(luis_json: &str) -> String {
    format!("Path:response\r\nContent-Type:application/json\r\n\r\n{luis_json}")
}

pub fn translation_hypothesis_frame(text: &str, language: &str, translated: &str) -> String {
    format!(
        "Path:translation.hypothesis\r\n\r\n{{\"Text\":\"{text}\",\"Offset\":0,\"Duration\":0,\"Translation\":{{\"TranslationStatus\":\"Success\",\"Translations\":[{{\"Language\":\"{language}\",\"Text\":\"{translated}\"}}]}}}}"
    )
}

pub fn translation_phrase_frame(text: &str, language: &str, translated: &str) -> String {
    format!(
        "Path:translation.phrase\r\n\r\n{{\"RecognitionStatus\":\"Success\",\"Text\":\"{text}\",\"Offset\":0,\"Duration\":0,\"Translation\":{{\"TranslationStatus\":\"Success\",\"Translations\":[{{\"Language\":\"{language}\",\"Text\":\"{translated}\"}}]}}}}"
    )
}
