use std::path::Path;

use crate::engines::{EngineConfig, EngineSynthesisConfig, PhonemeType};
use crate::{SynthesisEngine, SynthesisResult, VoiceHandle};

use super::model::{silence_samples, PiperModel};
use super::phonemizer::{check_espeak, phonemize, phonemes_to_ids, split_phrases};
use super::voice_config::{load_voice_config, VoiceModelConfig};

/// Parameters for configuring Piper model loading.
#[derive(Debug, Clone, Default)]
pub struct PiperModelParams {
    /// Number of CPU threads to use for inference.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
}

/// A loaded Piper voice: model session, companion config and live settings.
pub struct PiperVoice {
    config: VoiceModelConfig,
    synthesis_config: EngineSynthesisConfig,
    model: PiperModel,
}

impl PiperVoice {
    pub fn model_config(&self) -> &VoiceModelConfig {
        &self.config
    }

    fn model_speaker(&self) -> Option<i64> {
        (self.config.num_speakers > 1).then(|| self.synthesis_config.speaker_id.unwrap_or(0))
    }
}

impl VoiceHandle for PiperVoice {
    fn phoneme_type(&self) -> PhonemeType {
        self.config.phoneme_type
    }

    fn espeak_voice(&self) -> &str {
        &self.config.espeak_voice
    }

    fn speaker_id(&self, name: &str) -> Option<i64> {
        self.config.speaker_id_map.get(name).copied()
    }

    fn synthesis_config(&self) -> &EngineSynthesisConfig {
        &self.synthesis_config
    }

    fn synthesis_config_mut(&mut self) -> &mut EngineSynthesisConfig {
        &mut self.synthesis_config
    }
}

/// Piper text-to-speech engine.
///
/// Runs Piper VITS voices exported to ONNX. eSpeak voices phonemize through
/// the `espeak-ng` binary.
///
/// # Quick Start
///
/// ```rust,no_run
/// use wasinn_piper::engines::piper::PiperEngine;
/// use wasinn_piper::engines::EngineConfig;
/// use wasinn_piper::SynthesisEngine;
/// use std::path::Path;
///
/// let engine = PiperEngine::new();
/// let mut voice = engine.load_voice(
///     Path::new("en_US-lessac-medium.onnx"),
///     Path::new("en_US-lessac-medium.onnx.json"),
///     None,
/// )?;
/// let config = EngineConfig::default();
/// engine.initialize(&config)?;
/// let result = engine.text_to_audio(&config, &mut voice, "Hello, world!")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Default)]
pub struct PiperEngine {
    params: PiperModelParams,
}

impl PiperEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: PiperModelParams) -> Self {
        Self { params }
    }
}

impl SynthesisEngine for PiperEngine {
    type Voice = PiperVoice;

    fn load_voice(
        &self,
        model_path: &Path,
        model_config_path: &Path,
        speaker_id: Option<i64>,
    ) -> Result<PiperVoice, Box<dyn std::error::Error>> {
        let config = load_voice_config(model_config_path)?;
        let model = PiperModel::load(model_path, self.params.num_threads)?;

        let mut synthesis_config = config.synthesis.clone();
        if config.num_speakers > 1 {
            synthesis_config.speaker_id = Some(speaker_id.unwrap_or(0));
        }

        log::info!(
            "Loaded Piper voice: espeak voice '{}', {} speaker(s), {} Hz",
            config.espeak_voice,
            config.num_speakers,
            config.sample_rate
        );

        Ok(PiperVoice {
            config,
            synthesis_config,
            model,
        })
    }

    fn initialize(&self, config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
        if config.use_espeak {
            check_espeak()?;
        }
        if config.use_tashkeel {
            // TODO: run the libtashkeel model over Arabic input before phonemizing.
            log::warn!(
                "Diacritization model {:?} registered; Arabic text is phonemized as given",
                config.tashkeel_model_path
            );
        }
        Ok(())
    }

    fn text_to_audio(
        &self,
        config: &EngineConfig,
        voice: &mut PiperVoice,
        text: &str,
    ) -> Result<SynthesisResult, Box<dyn std::error::Error>> {
        let sentences = phonemize(text, config, &voice.config)?;
        let speaker_id = voice.model_speaker();
        let settings = voice.synthesis_config.clone();

        let mut samples = Vec::new();
        let mut missing = 0;
        let phoneme_silence = settings.phoneme_silence_seconds.as_ref();
        for sentence in &sentences {
            for (phrase, silence) in split_phrases(sentence, phoneme_silence) {
                let (ids, phrase_missing) = phonemes_to_ids(phrase, &voice.config.phoneme_id_map);
                missing += phrase_missing;
                samples.extend(voice.model.synthesize(&ids, &settings, speaker_id)?);
                if let Some(seconds) = silence {
                    let count = silence_samples(seconds, settings.sample_rate, settings.channels);
                    samples.resize(samples.len() + count, 0);
                }
            }
            let count = silence_samples(
                settings.sentence_silence_seconds,
                settings.sample_rate,
                settings.channels,
            );
            samples.resize(samples.len() + count, 0);
        }

        if missing > 0 {
            log::warn!("{missing} phoneme(s) had no id in the voice's phoneme_id_map");
        }

        Ok(SynthesisResult {
            samples,
            sample_rate: settings.sample_rate,
            channels: settings.channels,
        })
    }
}
