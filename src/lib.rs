//! # wasinn-piper
//!
//! A Piper text-to-speech backend exposed through a WASI-NN style
//! graph/context lifecycle.
//!
//! ## Features
//!
//! - **Graph lifecycle**: `load`, `init_exec_ctx`, `set_input`, `compute`, `get_output`
//! - **JSON configuration**: model paths, prosody defaults and per-phoneme silences
//! - **JSON input mode**: per-request overrides that never leak into the next request
//! - **Piper voices**: ONNX inference with espeak-ng phonemization (feature `piper`)
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! wasinn-piper = { version = "2026.2", features = ["piper"] }
//! ```
//!
//! ```ignore
//! use wasinn_piper::backend::{new_backend, Device, Tensor};
//!
//! let mut backend = new_backend();
//! let config = br#"{"model":"en_US-lessac-medium.onnx","espeak_data":"espeak-ng-data"}"#;
//! let graph = backend.load(&[config.as_slice()], Device::Cpu)?;
//! let context = backend.init_exec_ctx(graph)?;
//! backend.set_input(context, 0, &Tensor::new(&[1], b"Hello, world!"))?;
//! backend.compute(context)?;
//!
//! let mut wav = vec![0u8; 4 * 1024 * 1024];
//! let written = backend.get_output(context, 0, &mut wav)?;
//! wav.truncate(written as usize);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backend;
pub mod engines;

use std::io::Cursor;
use std::path::Path;

use engines::{EngineConfig, EngineSynthesisConfig, PhonemeType};

/// The result of a synthesis (text-to-speech) operation.
///
/// Contains 16-bit PCM samples and the format needed to play them back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisResult {
    /// Interleaved signed 16-bit PCM samples
    pub samples: Vec<i16>,
    /// Sample rate of the audio (22050 for most Piper voices)
    pub sample_rate: u32,
    pub channels: u16,
}

impl SynthesisResult {
    fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels.max(1),
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    /// Encode the audio as a 16-bit PCM WAV container in memory.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, hound::Error> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut buffer, self.wav_spec())?;
            for &sample in &self.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }
        Ok(buffer.into_inner())
    }

    /// The samples as a flat native-endian byte sequence, without a header.
    pub fn to_raw_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
    }

    /// Write the audio to a 16-bit PCM WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let mut writer = hound::WavWriter::create(path, self.wav_spec())?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        let frames = self.samples.len() / self.channels.max(1) as usize;
        frames as f64 / self.sample_rate as f64
    }
}

/// A loaded voice as seen by the backend.
pub trait VoiceHandle {
    /// How this voice phonemizes text.
    fn phoneme_type(&self) -> PhonemeType;

    /// The espeak-ng voice name from the voice config (e.g. `"en-us"`, `"ar"`).
    fn espeak_voice(&self) -> &str;

    /// Resolve a speaker name through the voice's speaker table.
    fn speaker_id(&self, name: &str) -> Option<i64>;

    fn synthesis_config(&self) -> &EngineSynthesisConfig;

    fn synthesis_config_mut(&mut self) -> &mut EngineSynthesisConfig;
}

/// Common interface for text-to-speech synthesis engines.
///
/// The backend treats the engine as opaque: it loads voices, initializes
/// process state from an [`EngineConfig`], and turns text into audio using
/// whatever the voice's live [`EngineSynthesisConfig`] says.
pub trait SynthesisEngine {
    type Voice: VoiceHandle;

    /// Load a voice model and its companion config.
    ///
    /// `speaker_id` selects the initial speaker of a multi-speaker voice.
    fn load_voice(
        &self,
        model_path: &Path,
        model_config_path: &Path,
        speaker_id: Option<i64>,
    ) -> Result<Self::Voice, Box<dyn std::error::Error>>;

    /// Prepare process-level resources (phonemizer data, auxiliary models).
    fn initialize(&self, config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>>;

    /// Synthesize speech from the given text as raw PCM samples.
    fn text_to_audio(
        &self,
        config: &EngineConfig,
        voice: &mut Self::Voice,
        text: &str,
    ) -> Result<SynthesisResult, Box<dyn std::error::Error>>;

    /// Synthesize speech from the given text as an in-memory WAV file.
    ///
    /// Default implementation calls `text_to_audio()` then `SynthesisResult::to_wav_bytes()`.
    fn text_to_wav(
        &self,
        config: &EngineConfig,
        voice: &mut Self::Voice,
        text: &str,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(self.text_to_audio(config, voice, text)?.to_wav_bytes()?)
    }
}

#[cfg(test)]
mod tests {
    use super::SynthesisResult;

    #[test]
    fn raw_bytes_are_native_endian_samples() {
        let result = SynthesisResult {
            samples: vec![1, -2, i16::MAX],
            sample_rate: 22050,
            channels: 1,
        };
        let mut expected = Vec::new();
        for s in [1i16, -2, i16::MAX] {
            expected.extend_from_slice(&s.to_ne_bytes());
        }
        assert_eq!(result.to_raw_bytes(), expected);
    }

    #[test]
    fn wav_bytes_carry_riff_header_and_samples() {
        let result = SynthesisResult {
            samples: vec![0, 100, -100, 2000],
            sample_rate: 16000,
            channels: 1,
        };
        let wav = result.to_wav_bytes().unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().bits_per_sample, 16);
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 100, -100, 2000]);
    }

    #[test]
    fn write_wav_creates_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let result = SynthesisResult {
            samples: vec![5, -5],
            sample_rate: 22050,
            channels: 1,
        };
        result.write_wav(&path).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 2);
    }

    #[test]
    fn duration_counts_frames() {
        let result = SynthesisResult {
            samples: vec![0; 44100],
            sample_rate: 22050,
            channels: 2,
        };
        assert!((result.duration_secs() - 1.0).abs() < f64::EPSILON);
    }
}
