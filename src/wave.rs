//! Waveform descriptor and the synthetic RIFF/WAVE stream preamble.

/// PCM waveform descriptor announced by the audio pipeline.
///
/// Mirrors the classic WAVEFORMATEX layout; [`WaveFormat::descriptor_bytes`]
/// produces the little-endian wire image, `extra` being the trailing
/// format-specific bytes counted by the embedded `cb_size` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub samples_per_sec: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub extra: Vec<u8>,
}

/// Format tag for integer PCM.
pub const WAVE_FORMAT_PCM: u16 = 1;

impl WaveFormat {
    /// Canonical 16-bit PCM format.
    pub fn pcm(samples_per_sec: u32, bits_per_sample: u16, channels: u16) -> Self {
        let block_align = channels * bits_per_sample / 8;
        Self {
            format_tag: WAVE_FORMAT_PCM,
            channels,
            samples_per_sec,
            avg_bytes_per_sec: samples_per_sec * u32::from(block_align),
            block_align,
            bits_per_sample,
            extra: Vec::new(),
        }
    }

    /// Little-endian WAVEFORMATEX image: the 18-byte header followed by the
    /// `extra` bytes.
    pub fn descriptor_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(18 + self.extra.len());
        bytes.extend_from_slice(&self.format_tag.to_le_bytes());
        bytes.extend_from_slice(&self.channels.to_le_bytes());
        bytes.extend_from_slice(&self.samples_per_sec.to_le_bytes());
        bytes.extend_from_slice(&self.avg_bytes_per_sec.to_le_bytes());
        bytes.extend_from_slice(&self.block_align.to_le_bytes());
        bytes.extend_from_slice(&self.bits_per_sample.to_le_bytes());
        bytes.extend_from_slice(&(self.extra.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&self.extra);
        bytes
    }
}

/// Synthesize the RIFF/WAVE header announcing `format` to the service.
///
/// The RIFF and data chunk sizes are written as zero: the audio stream is
/// open-ended and the service tolerates length-less headers.
pub fn stream_preamble(format: &WaveFormat) -> Vec<u8> {
    let descriptor = format.descriptor_bytes();

    let mut header = Vec::with_capacity(28 + descriptor.len());
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&0u32.to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&(descriptor.len() as u32).to_le_bytes());
    header.extend_from_slice(&descriptor);
    header.extend_from_slice(b"data");
    header.extend_from_slice(&0u32.to_le_bytes());
    header
}
