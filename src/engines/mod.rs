//! Speech synthesis engines.
//!
//! This module contains the engine-native configuration shared by every
//! engine and the engine implementations themselves.
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `piper` - Piper VITS voices (ONNX format, espeak-ng required for eSpeak voices)

#[cfg(feature = "piper")]
pub mod piper;

use std::collections::HashMap;
use std::path::PathBuf;

use derive_builder::Builder;

/// Per-phoneme silence durations, in seconds.
pub type PhonemeSilenceMap = HashMap<char, f32>;

/// How a voice turns text into phonemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhonemeType {
    /// IPA phonemes produced by espeak-ng.
    #[default]
    ESpeak,
    /// Every codepoint of the text is a phoneme.
    Text,
}

/// Process-level engine configuration, one per graph.
///
/// Built once the voice is known, since the voice decides whether the
/// espeak-ng data directory or the diacritization model is needed.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(default)]
pub struct EngineConfig {
    /// Directory handed to espeak-ng as its data path.
    #[builder(setter(into, strip_option))]
    pub espeak_data_path: Option<PathBuf>,
    /// Phonemize through espeak-ng.
    pub use_espeak: bool,
    /// Run the Arabic diacritization model before phonemizing.
    pub use_tashkeel: bool,
    #[builder(setter(into, strip_option))]
    pub tashkeel_model_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            espeak_data_path: None,
            use_espeak: true,
            use_tashkeel: false,
            tashkeel_model_path: None,
        }
    }
}

/// The live synthesis settings of a loaded voice.
///
/// There is exactly one of these per voice and every request against the
/// voice reads it, so request-scoped changes must be undone afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSynthesisConfig {
    pub noise_scale: f32,
    pub length_scale: f32,
    pub noise_w: f32,
    pub sentence_silence_seconds: f32,
    pub phoneme_silence_seconds: Option<PhonemeSilenceMap>,
    /// Selected speaker, only meaningful for multi-speaker voices.
    pub speaker_id: Option<i64>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for EngineSynthesisConfig {
    fn default() -> Self {
        Self {
            noise_scale: 0.667,
            length_scale: 1.0,
            noise_w: 0.8,
            sentence_silence_seconds: 0.2,
            phoneme_silence_seconds: None,
            speaker_id: None,
            sample_rate: 22050,
            channels: 1,
        }
    }
}
