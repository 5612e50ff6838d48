//! Recognition engine adapter for streaming speech services.
//!
//! This crate mediates between a local audio-capture pipeline and a remote
//! cloud recognizer speaking the USP WebSocket dialect: raw audio frames
//! and recognition configuration go in; a correctly ordered sequence of
//! protocol messages goes out; and the service's asynchronous response
//! stream comes back as structured events on the hosting [`Site`].
//!
//! The heart of the crate is [`UspRecoEngineAdapter`], a dual-axis state
//! machine coordinating the local audio lifecycle and the remote turn
//! lifecycle under a single reader/writer lock.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use usp_reco::{Site, UspRecoEngineAdapter, WaveFormat};
//! # use usp_reco::RecognitionResult;
//! # struct MySite;
//! # impl Site for MySite {
//! #     fn starting_turn(&self) {}
//! #     fn started_turn(&self, _: &str) {}
//! #     fn stopped_turn(&self) {}
//! #     fn requesting_audio_idle(&self) {}
//! #     fn completed_set_format_stop(&self) {}
//! #     fn speech_start_detected(&self, _: u64) {}
//! #     fn speech_end_detected(&self, _: u64) {}
//! #     fn intermediate_result(&self, _: u64, _: RecognitionResult) {}
//! #     fn final_result(&self, _: u64, r: RecognitionResult) { println!("{}", r.text()); }
//! #     fn translation_synthesis(&self, _: RecognitionResult) {}
//! #     fn error(&self, m: &str) { eprintln!("{m}"); }
//! #     fn string_property(&self, name: &str) -> String {
//! #         if name == "Speech.SubscriptionKey" { "my-key".into() } else { String::new() }
//! #     }
//! #     fn bool_property(&self, _: &str, default: bool) -> bool { default }
//! # }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let site: Arc<dyn Site> = Arc::new(MySite);
//! let adapter = UspRecoEngineAdapter::new();
//! adapter.set_site(Arc::downgrade(&site));
//! adapter.init()?;
//!
//! adapter.set_format(Some(&WaveFormat::pcm(16_000, 16, 1)));
//! adapter.process_audio(&vec![0u8; 3200])?; // opens the turn
//! adapter.process_audio(&[])?;              // flush
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod error;
pub mod properties;
pub mod result;
pub mod site;
pub mod transport;
pub mod wave;

pub use adapter::{AudioState, ProtocolState, UspRecoEngineAdapter};
pub use error::{AdapterError, TransportError};
pub use result::{
    RecognitionResult, ResultKind, SynthesisResult, SynthesisStatus, TranslationResult,
    TranslationStatus,
};
pub use site::{IntentInfo, Site};
pub use wave::WaveFormat;
