//! Piper text-to-speech engine implementation.
//!
//! Runs Piper VITS voices exported to ONNX. A voice is a model file plus a
//! companion JSON config (by convention `<model>.onnx.json`) that carries the
//! sample rate, phoneme inventory, speaker table and inference defaults.
//!
//! # System Requirements
//!
//! Voices with `"phoneme_type": "espeak"` need **espeak-ng**:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>
//!
//! # Voice Layout
//!
//! ```text
//! voices/
//! ├── en_US-lessac-medium.onnx        # VITS model
//! └── en_US-lessac-medium.onnx.json   # companion config
//! ```
//!
//! Voices: <https://huggingface.co/rhasspy/piper-voices>

pub mod engine;
pub mod model;
pub mod phonemizer;
pub mod voice_config;

pub use engine::{PiperEngine, PiperModelParams, PiperVoice};
pub use model::PiperError;
pub use voice_config::VoiceModelConfig;
