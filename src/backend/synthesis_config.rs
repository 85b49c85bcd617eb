//! Sparse synthesis settings and how they reach a voice.
//!
//! A [`SynthesisConfig`] only carries what a caller asked for; every `None`
//! means "keep whatever the voice currently uses". It comes from two places:
//! the graph-load config (graph defaults) and, in JSON input mode, each
//! request (overrides).

use std::ops::{Deref, DerefMut};

use serde_json::{Map, Value};

use super::options::{get_option, get_optional_option, get_optional_option_as};
use super::BackendError;
use crate::engines::{EngineSynthesisConfig, PhonemeSilenceMap};
use crate::VoiceHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputType {
    /// A WAV container with 16-bit PCM audio.
    #[default]
    Wav,
    /// Headerless native-endian 16-bit PCM samples.
    Raw,
}

impl OutputType {
    fn parse(literal: &str) -> Option<Self> {
        match literal {
            "wav" => Some(Self::Wav),
            "raw" => Some(Self::Raw),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisConfig {
    pub output_type: Option<OutputType>,
    pub speaker_id: Option<i64>,
    pub noise_scale: Option<f32>,
    pub length_scale: Option<f32>,
    pub noise_w: Option<f32>,
    pub sentence_silence_seconds: Option<f32>,
    /// Partial map: phonemes without an entry are not affected.
    pub phoneme_silence_seconds: Option<PhonemeSilenceMap>,
}

/// True if `s` is exactly one Unicode scalar value.
pub fn is_single_codepoint(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some() && chars.next().is_none()
}

/// Read a [`SynthesisConfig`] out of a JSON object.
///
/// The speaker is read from `speaker_id` when `json_input` is set (request
/// objects, where `speaker` is a name), and from `speaker` otherwise
/// (graph-load objects).
pub fn parse_synthesis_config(
    object: &Map<String, Value>,
    json_input: bool,
) -> Result<SynthesisConfig, BackendError> {
    let mut config = SynthesisConfig::default();

    if let Some(literal) = get_option::<&str>(object, "output_type")? {
        let output_type = OutputType::parse(literal).ok_or_else(|| {
            BackendError::invalid_argument(format!(
                "The output_type option has an unknown value {literal}."
            ))
        })?;
        config.output_type = Some(output_type);
    }

    let speaker_key = if json_input { "speaker_id" } else { "speaker" };
    get_optional_option(object, speaker_key, &mut config.speaker_id)?;

    let narrow = |v: f64| v as f32;
    get_optional_option_as(object, "noise_scale", &mut config.noise_scale, narrow)?;
    get_optional_option_as(object, "length_scale", &mut config.length_scale, narrow)?;
    get_optional_option_as(object, "noise_w", &mut config.noise_w, narrow)?;
    get_optional_option_as(
        object,
        "sentence_silence",
        &mut config.sentence_silence_seconds,
        narrow,
    )?;

    if let Some(entries) = get_option::<Map<String, Value>>(object, "phoneme_silence")? {
        for (phoneme, value) in &entries {
            if !is_single_codepoint(phoneme) {
                return Err(BackendError::invalid_argument(format!(
                    "Phoneme '{phoneme}' is not a single codepoint (phoneme_silence)."
                )));
            }
            let seconds = value.as_f64().ok_or_else(|| {
                BackendError::invalid_argument(format!(
                    "Failed to get silence seconds for phoneme '{phoneme}' as a double: found {value}"
                ))
            })?;
            if let Some(ch) = phoneme.chars().next() {
                config
                    .phoneme_silence_seconds
                    .get_or_insert_with(PhonemeSilenceMap::new)
                    .insert(ch, seconds as f32);
            }
        }
    }

    Ok(config)
}

/// Push the fields set in `config` into a voice's live settings.
///
/// With `force_overwrite` the phoneme silence map and the speaker are
/// replaced wholesale, `None` included; this is how graph defaults are
/// restored after a request. Otherwise a new phoneme map is adopted only if
/// the voice has none, and merged without replacing existing entries if it
/// does.
pub fn update_synthesis_config(
    config: &SynthesisConfig,
    engine: &mut EngineSynthesisConfig,
    force_overwrite: bool,
) {
    if let Some(noise_scale) = config.noise_scale {
        engine.noise_scale = noise_scale;
    }
    if let Some(length_scale) = config.length_scale {
        engine.length_scale = length_scale;
    }
    if let Some(noise_w) = config.noise_w {
        engine.noise_w = noise_w;
    }
    if let Some(seconds) = config.sentence_silence_seconds {
        engine.sentence_silence_seconds = seconds;
    }

    if force_overwrite {
        engine.speaker_id = config.speaker_id;
        engine.phoneme_silence_seconds = config.phoneme_silence_seconds.clone();
        return;
    }

    if config.speaker_id.is_some() {
        engine.speaker_id = config.speaker_id;
    }
    if let Some(incoming) = &config.phoneme_silence_seconds {
        match &mut engine.phoneme_silence_seconds {
            None => engine.phoneme_silence_seconds = Some(incoming.clone()),
            Some(existing) => {
                for (&phoneme, &seconds) in incoming {
                    existing.entry(phoneme).or_insert(seconds);
                }
            }
        }
    }
}

/// Copy a voice's resolved settings back into a sparse config.
///
/// After this every prosody field is set, so restoring from `config` puts
/// the voice back exactly where it started.
pub fn backfill_synthesis_config(config: &mut SynthesisConfig, engine: &EngineSynthesisConfig) {
    config.speaker_id = engine.speaker_id;
    config.noise_scale = Some(engine.noise_scale);
    config.length_scale = Some(engine.length_scale);
    config.noise_w = Some(engine.noise_w);
    config.sentence_silence_seconds = Some(engine.sentence_silence_seconds);
    config.phoneme_silence_seconds = engine.phoneme_silence_seconds.clone();
}

/// A voice with a request override applied.
///
/// Dropping the guard restores the graph defaults, whether synthesis
/// succeeded or not.
pub struct ScopedOverride<'a, V: VoiceHandle> {
    voice: &'a mut V,
    defaults: &'a SynthesisConfig,
}

impl<'a, V: VoiceHandle> ScopedOverride<'a, V> {
    pub fn apply(
        voice: &'a mut V,
        overrides: Option<&SynthesisConfig>,
        defaults: &'a SynthesisConfig,
    ) -> Self {
        if let Some(overrides) = overrides {
            update_synthesis_config(overrides, voice.synthesis_config_mut(), false);
        }
        Self { voice, defaults }
    }
}

impl<V: VoiceHandle> Deref for ScopedOverride<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        &*self.voice
    }
}

impl<V: VoiceHandle> DerefMut for ScopedOverride<'_, V> {
    fn deref_mut(&mut self) -> &mut V {
        &mut *self.voice
    }
}

impl<V: VoiceHandle> Drop for ScopedOverride<'_, V> {
    fn drop(&mut self) {
        update_synthesis_config(self.defaults, self.voice.synthesis_config_mut(), true);
    }
}
