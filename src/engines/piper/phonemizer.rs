use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use super::model::PiperError;
use super::voice_config::VoiceModelConfig;
use crate::engines::{EngineConfig, PhonemeSilenceMap, PhonemeType};

/// Beginning of utterance.
pub const BOS: char = '^';
/// End of utterance.
pub const EOS: char = '$';
/// Interspersed after every phoneme.
pub const PAD: char = '_';

/// Convert text to phonemes, one `Vec` per sentence.
pub fn phonemize(
    text: &str,
    engine: &EngineConfig,
    voice: &VoiceModelConfig,
) -> Result<Vec<Vec<char>>, PiperError> {
    let sentences = match voice.phoneme_type {
        PhonemeType::ESpeak => {
            let output = run_espeak(
                text,
                &voice.espeak_voice,
                engine.espeak_data_path.as_deref(),
            )?;
            ipa_sentences(&output)
        }
        PhonemeType::Text => text_sentences(text),
    };

    if voice.phoneme_map.is_empty() {
        return Ok(sentences);
    }
    Ok(sentences
        .into_iter()
        .map(|sentence| apply_phoneme_map(&sentence, &voice.phoneme_map))
        .collect())
}

/// Codepoint phonemes: every non-empty line is a sentence.
fn text_sentences(text: &str) -> Vec<Vec<char>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.chars().flat_map(char::to_lowercase).collect())
        .collect()
}

/// espeak-ng prints one line of IPA per clause.
fn ipa_sentences(ipa: &str) -> Vec<Vec<char>> {
    ipa.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.chars().collect())
        .collect()
}

fn apply_phoneme_map(sentence: &[char], map: &HashMap<char, Vec<char>>) -> Vec<char> {
    let mut mapped = Vec::with_capacity(sentence.len());
    for phoneme in sentence {
        match map.get(phoneme) {
            Some(replacement) => mapped.extend_from_slice(replacement),
            None => mapped.push(*phoneme),
        }
    }
    mapped
}

/// Turn phonemes into model ids: BOS, then each phoneme followed by PAD, then EOS.
///
/// Returns the ids and how many phonemes had no id.
pub fn phonemes_to_ids(phonemes: &[char], id_map: &HashMap<char, Vec<i64>>) -> (Vec<i64>, usize) {
    let mut ids = Vec::with_capacity(phonemes.len() * 2 + 3);
    let mut missing = 0;
    let pad = id_map.get(&PAD);

    if let Some(bos) = id_map.get(&BOS) {
        ids.extend_from_slice(bos);
    }
    if let Some(pad) = pad {
        ids.extend_from_slice(pad);
    }
    for phoneme in phonemes {
        let Some(phoneme_ids) = id_map.get(phoneme) else {
            missing += 1;
            continue;
        };
        ids.extend_from_slice(phoneme_ids);
        if let Some(pad) = pad {
            ids.extend_from_slice(pad);
        }
    }
    if let Some(eos) = id_map.get(&EOS) {
        ids.extend_from_slice(eos);
    }

    (ids, missing)
}

/// Split a sentence after every phoneme that has a silence entry.
///
/// Each phrase comes with the seconds of silence that follow it.
pub fn split_phrases<'a>(
    sentence: &'a [char],
    silence: Option<&PhonemeSilenceMap>,
) -> Vec<(&'a [char], Option<f32>)> {
    let Some(silence) = silence else {
        return vec![(sentence, None)];
    };

    let mut phrases = Vec::new();
    let mut start = 0;
    for (i, phoneme) in sentence.iter().enumerate() {
        if let Some(&seconds) = silence.get(phoneme) {
            phrases.push((&sentence[start..=i], Some(seconds)));
            start = i + 1;
        }
    }
    if start < sentence.len() {
        phrases.push((&sentence[start..], None));
    }
    phrases
}

/// Check that espeak-ng can be launched.
pub fn check_espeak() -> Result<(), PiperError> {
    Command::new("espeak-ng")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|_| ())
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PiperError::EspeakNotFound
            } else {
                PiperError::Io(e)
            }
        })
}

fn run_espeak(input: &str, voice: &str, data_path: Option<&Path>) -> Result<String, PiperError> {
    let mut command = Command::new("espeak-ng");
    command.args(["--ipa", "--stdin", "-q", "-v", voice]);
    if let Some(data_path) = data_path {
        command.arg(format!("--path={}", data_path.display()));
    }

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PiperError::EspeakNotFound
            } else {
                PiperError::Io(e)
            }
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        // espeak-ng under-processes a final line without a terminator.
        let stdin_payload = canonicalize_espeak_stdin_payload(input);
        stdin
            .write_all(stdin_payload.as_bytes())
            .map_err(PiperError::Io)?;
    }

    let output = child.wait_with_output().map_err(PiperError::Io)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PiperError::PhonemizerFailed(format!(
            "espeak-ng exited with code {:?}: {stderr}",
            output.status.code()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn canonicalize_espeak_stdin_payload(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}
