//! Audio normalization using symphonia
//!
//! Decodes an uploaded container (WebM/Opus from browser recorders, Ogg, MP4,
//! WAV, FLAC, MP3, ...) fully in memory, downmixes to mono, resamples to
//! 16 kHz and re-encodes as a canonical WAV container.

use crate::audio::resampler::resample_mono;
use crate::audio::{NormalizedAudio, TARGET_SAMPLE_RATE};
use crate::error::{StageError, StageResult};
use std::io::Cursor;
use std::sync::OnceLock;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{CodecRegistry, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use symphonia_adapter_libopus::OpusDecoder;
use tracing::{debug, warn};

/// Codec registry with Opus support.
///
/// symphonia has no native Opus decoder; the libopus adapter is registered
/// first so it wins over any placeholder.
fn codec_registry() -> &'static CodecRegistry {
    static CODEC_REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();
    CODEC_REGISTRY.get_or_init(|| {
        let mut registry = CodecRegistry::new();
        registry.register_all::<OpusDecoder>();
        symphonia::default::register_enabled_codecs(&mut registry);
        registry
    })
}

/// Converts uploaded audio into the canonical container
#[derive(Debug, Clone)]
pub struct AudioNormalizer {
    /// Output sample rate (16 kHz for the speech models in use)
    target_sample_rate: u32,
}

impl Default for AudioNormalizer {
    fn default() -> Self {
        Self {
            target_sample_rate: TARGET_SAMPLE_RATE,
        }
    }
}

impl AudioNormalizer {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Decode `raw` under `container_format` and produce mono canonical WAV at
    /// the target rate.
    ///
    /// `container_format` is a file extension ("webm", ".ogg") or MIME type
    /// ("audio/webm;codecs=opus"); it is a probe hint, so a mislabelled but
    /// recognisable container still decodes.
    ///
    /// # Errors
    /// `StageError::Decode` for empty input, unrecognised containers, missing
    /// audio tracks, unsupported codecs, unreadable packets, or a stream where
    /// no packet decoded.
    pub fn normalize(&self, raw: &[u8], container_format: &str) -> StageResult<NormalizedAudio> {
        if raw.is_empty() {
            return Err(StageError::Decode("Empty audio input".to_string()));
        }

        let (mono, native_rate) = decode_to_mono(raw, container_format)?;

        let native_rate = native_rate.unwrap_or(self.target_sample_rate);
        debug!(
            "Decoded {} mono samples at {} Hz (target {} Hz)",
            mono.len(),
            native_rate,
            self.target_sample_rate
        );

        let resampled = resample_mono(&mono, native_rate, self.target_sample_rate)
            .map_err(|e| StageError::Decode(e.to_string()))?;

        let bytes = write_canonical_wav(&resampled, self.target_sample_rate)
            .map_err(|e| StageError::Decode(format!("Failed to encode WAV: {}", e)))?;

        Ok(NormalizedAudio::from_bytes(bytes))
    }
}

/// Encode mono f32 samples as a RIFF/WAVE (IEEE float, 32-bit) container
pub fn write_canonical_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(64 + samples.len() * 4));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Reduce a format string to a probe hint extension.
///
/// "audio/webm;codecs=opus" -> "webm", ".OGG" -> "ogg"
fn container_hint(container_format: &str) -> String {
    let format = container_format.trim();
    let format = format.split(';').next().unwrap_or(format);
    let format = format.rsplit('/').next().unwrap_or(format);
    format.trim_start_matches('.').to_ascii_lowercase()
}

/// Decode every packet of the first audio track and downmix to mono.
///
/// Returns the samples and the native sample rate (None if the stream carried
/// no packets and the container did not declare one).
fn decode_to_mono(raw: &[u8], container_format: &str) -> StageResult<(Vec<f32>, Option<u32>)> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(raw.to_vec())), Default::default());

    let mut hint = Hint::new();
    let extension = container_hint(container_format);
    if !extension.is_empty() {
        hint.with_extension(&extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| {
            StageError::Decode(format!(
                "Failed to probe {} container: {}",
                if extension.is_empty() { "unknown" } else { extension.as_str() },
                e
            ))
        })?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| StageError::Decode("No audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut sample_rate = codec_params.sample_rate;

    let mut decoder = codec_registry()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| StageError::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();
    let mut decoded_packets = 0usize;
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                // Chained stream or mid-stream track change; only the first is decoded
                warn!(
                    "Container requested a decoder reset after {} packets, ignoring remaining streams",
                    decoded_packets + skipped_packets
                );
                break;
            }
            Err(e) => {
                return Err(StageError::Decode(format!("Failed to read packet: {}", e)));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_rate.is_none() {
                    sample_rate = Some(decoded.spec().rate);
                }
                downmix_ref(&decoded, &mut samples);
                decoded_packets += 1;
            }
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt packet inside an otherwise valid stream
                warn!("Skipping undecodable packet: {}", e);
                skipped_packets += 1;
            }
            Err(e) => {
                return Err(StageError::Decode(format!("Decoder failed: {}", e)));
            }
        }
    }

    if decoded_packets == 0 && skipped_packets > 0 {
        return Err(StageError::Decode(format!(
            "None of {} packets could be decoded",
            skipped_packets
        )));
    }

    debug!(
        "Decoded {} packets ({} skipped), {} mono samples",
        decoded_packets,
        skipped_packets,
        samples.len()
    );

    Ok((samples, sample_rate))
}

fn downmix_ref(decoded: &AudioBufferRef<'_>, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::U8(buf) => downmix(&**buf, out),
        AudioBufferRef::U16(buf) => downmix(&**buf, out),
        AudioBufferRef::U24(buf) => downmix(&**buf, out),
        AudioBufferRef::U32(buf) => downmix(&**buf, out),
        AudioBufferRef::S8(buf) => downmix(&**buf, out),
        AudioBufferRef::S16(buf) => downmix(&**buf, out),
        AudioBufferRef::S24(buf) => downmix(&**buf, out),
        AudioBufferRef::S32(buf) => downmix(&**buf, out),
        AudioBufferRef::F32(buf) => downmix(&**buf, out),
        AudioBufferRef::F64(buf) => downmix(&**buf, out),
    }
}

/// Append the arithmetic mean of all channels, frame by frame
fn downmix<S>(buf: &AudioBuffer<S>, out: &mut Vec<f32>)
where
    S: Sample + IntoSample<f32>,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    if channels == 0 {
        return;
    }

    out.reserve(frames);
    let scale = 1.0 / channels as f32;

    for i in 0..frames {
        let mut acc = 0.0f32;
        for ch in 0..channels {
            let sample: f32 = buf.chan(ch)[i].into_sample();
            acc += sample;
        }
        out.push(acc * scale);
    }
}
