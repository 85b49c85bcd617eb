use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::model::PiperError;
use crate::engines::{EngineSynthesisConfig, PhonemeSilenceMap, PhonemeType};

/// A Piper voice's companion config (`<model>.onnx.json`), resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceModelConfig {
    pub sample_rate: u32,
    /// espeak-ng voice name, e.g. `"en-us"`.
    pub espeak_voice: String,
    pub phoneme_type: PhonemeType,
    pub phoneme_id_map: HashMap<char, Vec<i64>>,
    /// Phoneme rewrites applied after phonemization.
    pub phoneme_map: HashMap<char, Vec<char>>,
    pub num_speakers: u32,
    pub speaker_id_map: HashMap<String, i64>,
    /// Synthesis defaults from the `inference` section.
    pub synthesis: EngineSynthesisConfig,
}

#[derive(Debug, Deserialize)]
struct RawVoiceConfig {
    audio: RawAudio,
    #[serde(default)]
    espeak: Option<RawEspeak>,
    #[serde(default)]
    phoneme_type: Option<String>,
    phoneme_id_map: HashMap<String, Vec<i64>>,
    #[serde(default)]
    phoneme_map: HashMap<String, Vec<String>>,
    #[serde(default = "default_num_speakers")]
    num_speakers: u32,
    #[serde(default)]
    speaker_id_map: HashMap<String, i64>,
    #[serde(default)]
    inference: RawInference,
}

#[derive(Debug, Deserialize)]
struct RawAudio {
    sample_rate: u32,
}

#[derive(Debug, Deserialize)]
struct RawEspeak {
    voice: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawInference {
    noise_scale: Option<f32>,
    length_scale: Option<f32>,
    noise_w: Option<f32>,
    phoneme_silence: Option<HashMap<String, f32>>,
}

fn default_num_speakers() -> u32 {
    1
}

/// Load a voice config from disk.
pub fn load_voice_config(config_path: &Path) -> Result<VoiceModelConfig, PiperError> {
    let content = std::fs::read_to_string(config_path)?;
    parse_voice_config(&content)
}

pub fn parse_voice_config(content: &str) -> Result<VoiceModelConfig, PiperError> {
    let raw: RawVoiceConfig = serde_json::from_str(content)?;

    let phoneme_type = match raw.phoneme_type.as_deref() {
        None | Some("espeak") => PhonemeType::ESpeak,
        Some("text") => PhonemeType::Text,
        Some(other) => {
            return Err(PiperError::Config(format!(
                "Unsupported phoneme_type {other:?}"
            )))
        }
    };

    let mut phoneme_id_map = HashMap::with_capacity(raw.phoneme_id_map.len());
    for (phoneme, ids) in raw.phoneme_id_map {
        phoneme_id_map.insert(single_char(&phoneme, "phoneme_id_map")?, ids);
    }

    let mut phoneme_map = HashMap::with_capacity(raw.phoneme_map.len());
    for (from, to) in raw.phoneme_map {
        let to = to
            .iter()
            .map(|p| single_char(p, "phoneme_map"))
            .collect::<Result<Vec<_>, _>>()?;
        phoneme_map.insert(single_char(&from, "phoneme_map")?, to);
    }

    let mut synthesis = EngineSynthesisConfig {
        sample_rate: raw.audio.sample_rate,
        ..Default::default()
    };
    let inference = raw.inference;
    if let Some(noise_scale) = inference.noise_scale {
        synthesis.noise_scale = noise_scale;
    }
    if let Some(length_scale) = inference.length_scale {
        synthesis.length_scale = length_scale;
    }
    if let Some(noise_w) = inference.noise_w {
        synthesis.noise_w = noise_w;
    }
    if let Some(entries) = inference.phoneme_silence {
        let mut silence = PhonemeSilenceMap::with_capacity(entries.len());
        for (phoneme, seconds) in entries {
            silence.insert(single_char(&phoneme, "phoneme_silence")?, seconds);
        }
        synthesis.phoneme_silence_seconds = Some(silence);
    }

    Ok(VoiceModelConfig {
        sample_rate: raw.audio.sample_rate,
        espeak_voice: raw
            .espeak
            .map(|e| e.voice)
            .unwrap_or_else(|| "en-us".to_string()),
        phoneme_type,
        phoneme_id_map,
        phoneme_map,
        num_speakers: raw.num_speakers,
        speaker_id_map: raw.speaker_id_map,
        synthesis,
    })
}

fn single_char(s: &str, field: &str) -> Result<char, PiperError> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Ok(ch),
        _ => Err(PiperError::Config(format!(
            "{field} key {s:?} is not a single codepoint"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LESSAC: &str = r#"{
        "audio": {"sample_rate": 22050},
        "espeak": {"voice": "en-us"},
        "inference": {"noise_scale": 0.5, "length_scale": 1.1, "noise_w": 0.9},
        "phoneme_type": "espeak",
        "phoneme_id_map": {"_": [0], "^": [1], "$": [2], "a": [14], "ə": [59]},
        "num_speakers": 1,
        "speaker_id_map": {}
    }"#;

    #[test]
    fn parses_single_speaker_voice() {
        let config = parse_voice_config(LESSAC).unwrap();
        assert_eq!(config.sample_rate, 22050);
        assert_eq!(config.espeak_voice, "en-us");
        assert_eq!(config.phoneme_type, PhonemeType::ESpeak);
        assert_eq!(config.phoneme_id_map.get(&'ə'), Some(&vec![59]));
        assert_eq!(config.num_speakers, 1);
        assert_eq!(config.synthesis.noise_scale, 0.5);
        assert_eq!(config.synthesis.length_scale, 1.1);
        assert_eq!(config.synthesis.noise_w, 0.9);
        assert_eq!(config.synthesis.sentence_silence_seconds, 0.2);
        assert_eq!(config.synthesis.phoneme_silence_seconds, None);
    }

    #[test]
    fn missing_sections_take_piper_defaults() {
        let config = parse_voice_config(
            r#"{"audio": {"sample_rate": 16000}, "phoneme_id_map": {"a": [5]}}"#,
        )
        .unwrap();
        assert_eq!(config.espeak_voice, "en-us");
        assert_eq!(config.num_speakers, 1);
        assert_eq!(config.synthesis.noise_scale, 0.667);
        assert_eq!(config.synthesis.sample_rate, 16000);
    }

    #[test]
    fn reads_speakers_text_phonemes_and_silences() {
        let config = parse_voice_config(
            r#"{
                "audio": {"sample_rate": 22050},
                "phoneme_type": "text",
                "phoneme_id_map": {"a": [5]},
                "phoneme_map": {"à": ["a"]},
                "num_speakers": 3,
                "speaker_id_map": {"alice": 0, "bob": 2},
                "inference": {"phoneme_silence": {".": 0.3}}
            }"#,
        )
        .unwrap();
        assert_eq!(config.phoneme_type, PhonemeType::Text);
        assert_eq!(config.num_speakers, 3);
        assert_eq!(config.speaker_id_map.get("bob"), Some(&2));
        assert_eq!(config.phoneme_map.get(&'à'), Some(&vec!['a']));
        assert_eq!(
            config.synthesis.phoneme_silence_seconds,
            Some(PhonemeSilenceMap::from([('.', 0.3)]))
        );
    }

    #[test]
    fn rejects_multi_codepoint_phoneme_keys() {
        let err = parse_voice_config(
            r#"{"audio": {"sample_rate": 22050}, "phoneme_id_map": {"ab": [5]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PiperError::Config(_)));
    }

    #[test]
    fn rejects_unknown_phoneme_type() {
        let err = parse_voice_config(
            r#"{"audio": {"sample_rate": 22050}, "phoneme_type": "pinyin", "phoneme_id_map": {}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PiperError::Config(_)));
    }
}
