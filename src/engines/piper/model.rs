use std::path::Path;

use ndarray::{arr1, Array2};
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use crate::engines::EngineSynthesisConfig;

/// Peak amplitude of 16-bit PCM.
const MAX_WAV_VALUE: f32 = 32767.0;

/// Floor for the normalization peak, so near-silence is not amplified.
const MIN_PEAK: f32 = 0.01;

#[derive(thiserror::Error, Debug)]
pub enum PiperError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Invalid voice config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid voice config: {0}")]
    Config(String),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    PhonemizerFailed(String),
}

/// A Piper VITS model session.
pub struct PiperModel {
    session: Session,
}

impl PiperModel {
    pub fn load(onnx_path: &Path, num_threads: Option<usize>) -> Result<Self, PiperError> {
        log::info!("Loading Piper model from {}", onnx_path.display());
        let session = init_session(onnx_path, num_threads)?;
        Ok(Self { session })
    }

    /// Run the model on one phrase of phoneme ids and return 16-bit PCM.
    ///
    /// `speaker_id` must be set for multi-speaker voices and `None` otherwise.
    pub fn synthesize(
        &mut self,
        phoneme_ids: &[i64],
        config: &EngineSynthesisConfig,
        speaker_id: Option<i64>,
    ) -> Result<Vec<i16>, PiperError> {
        let ids = Array2::from_shape_vec((1, phoneme_ids.len()), phoneme_ids.to_vec())?;
        let lengths = arr1(&[phoneme_ids.len() as i64]);
        let scales = arr1(&[config.noise_scale, config.length_scale, config.noise_w]);

        let output = match speaker_id {
            Some(sid) => {
                let sid = arr1(&[sid]);
                let inputs = inputs![
                    "input" => TensorRef::from_array_view(ids.view())?,
                    "input_lengths" => TensorRef::from_array_view(lengths.view())?,
                    "scales" => TensorRef::from_array_view(scales.view())?,
                    "sid" => TensorRef::from_array_view(sid.view())?,
                ];
                self.session.run(inputs)?
            }
            None => {
                let inputs = inputs![
                    "input" => TensorRef::from_array_view(ids.view())?,
                    "input_lengths" => TensorRef::from_array_view(lengths.view())?,
                    "scales" => TensorRef::from_array_view(scales.view())?,
                ];
                self.session.run(inputs)?
            }
        };

        let first_output = output
            .iter()
            .next()
            .ok_or_else(|| PiperError::Ort(ort::Error::new("No output from model")))?;
        let audio = first_output.1.try_extract_array::<f32>()?;
        let audio: Vec<f32> = audio.iter().copied().collect();

        Ok(audio_to_pcm(&audio))
    }
}

/// Scale float audio so its peak hits full 16-bit range.
pub fn audio_to_pcm(audio: &[f32]) -> Vec<i16> {
    let peak = audio
        .iter()
        .fold(0.0f32, |max, sample| max.max(sample.abs()))
        .max(MIN_PEAK);
    let scale = MAX_WAV_VALUE / peak;
    audio
        .iter()
        .map(|sample| (sample * scale).clamp(-MAX_WAV_VALUE, MAX_WAV_VALUE) as i16)
        .collect()
}

/// Number of silent samples for `seconds` of audio.
pub fn silence_samples(seconds: f32, sample_rate: u32, channels: u16) -> usize {
    (seconds.max(0.0) * sample_rate as f32 * channels as f32) as usize
}

fn init_session(onnx_path: &Path, num_threads: Option<usize>) -> Result<Session, PiperError> {
    let providers = vec![CPUExecutionProvider::default().build()];

    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers(providers)?;

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(onnx_path)?)
}
