//! Graph-load configuration.
//!
//! ```json
//! {
//!   "model": "en_US-lessac-medium.onnx",
//!   "config": "en_US-lessac-medium.onnx.json",
//!   "espeak_data": "espeak-ng-data",
//!   "output_type": "wav",
//!   "length_scale": 1.1,
//!   "json_input": true
//! }
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::options::{get_option, parse_object};
use super::synthesis_config::{parse_synthesis_config, SynthesisConfig};
use super::BackendError;

/// Suffix appended to the model path when no companion config is given.
pub const MODEL_CONFIG_SUFFIX: &str = ".json";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConfig {
    pub model_path: PathBuf,
    pub model_config_path: PathBuf,
    /// Only required by voices that phonemize through espeak-ng.
    pub espeak_data_path: Option<PathBuf>,
    /// Only required by the Arabic voice.
    pub tashkeel_model_path: Option<PathBuf>,
    /// Requests are JSON objects with a `text` field and overrides.
    pub json_input: bool,
    pub default_synthesis_config: SynthesisConfig,
}

/// `<model><suffix>`, e.g. `voice.onnx` becomes `voice.onnx.json`.
pub fn default_model_config_path(model_path: &Path) -> PathBuf {
    let mut path = OsString::from(model_path.as_os_str());
    path.push(MODEL_CONFIG_SUFFIX);
    PathBuf::from(path)
}

/// Parse and validate the graph-load JSON text.
///
/// The model and its companion config must exist on disk. The espeak-ng
/// data directory and diacritization model are only checked once the voice
/// says it needs them.
pub fn parse_run_config(text: &str) -> Result<RunConfig, BackendError> {
    let object = parse_object(text, "run config")?;

    let model_path = match get_option::<&str>(&object, "model")? {
        Some(model) => PathBuf::from(model),
        None => {
            return Err(BackendError::invalid_argument(
                "The model option is required but not provided",
            ))
        }
    };
    if !model_path.exists() {
        return Err(BackendError::invalid_argument(format!(
            "Model file doesn't exist: {}",
            model_path.display()
        )));
    }

    let model_config_path = match get_option::<&str>(&object, "config")? {
        Some(config) => PathBuf::from(config),
        None => default_model_config_path(&model_path),
    };
    if !model_config_path.exists() {
        return Err(BackendError::invalid_argument(format!(
            "Model config doesn't exist: {}",
            model_config_path.display()
        )));
    }

    let default_synthesis_config = parse_synthesis_config(&object, false)?;

    let espeak_data_path = get_option::<&str>(&object, "espeak_data")?.map(PathBuf::from);
    let tashkeel_model_path = get_option::<&str>(&object, "tashkeel_model")?.map(PathBuf::from);
    let json_input = get_option::<bool>(&object, "json_input")?.unwrap_or(false);

    Ok(RunConfig {
        model_path,
        model_config_path,
        espeak_data_path,
        tashkeel_model_path,
        json_input,
        default_synthesis_config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OutputType;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        model: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let model = dir.path().join("voice.onnx");
            fs::write(&model, b"onnx").unwrap();
            fs::write(dir.path().join("voice.onnx.json"), b"{}").unwrap();
            Self { dir, model }
        }

        fn model(&self) -> &str {
            self.model.to_str().unwrap()
        }
    }

    #[test]
    fn config_path_defaults_to_model_plus_json() {
        let fixture = Fixture::new();
        let text = json!({"model": fixture.model()}).to_string();
        let config = parse_run_config(&text).unwrap();
        assert_eq!(config.model_path, fixture.model);
        assert_eq!(
            config.model_config_path,
            fixture.dir.path().join("voice.onnx.json")
        );
        assert!(!config.json_input);
        assert_eq!(config.espeak_data_path, None);
    }

    #[test]
    fn explicit_config_path_is_used() {
        let fixture = Fixture::new();
        let custom = fixture.dir.path().join("custom.json");
        fs::write(&custom, b"{}").unwrap();
        let text =
            json!({"model": fixture.model(), "config": custom.to_str().unwrap()}).to_string();
        assert_eq!(parse_run_config(&text).unwrap().model_config_path, custom);
    }

    #[test]
    fn missing_model_is_invalid_argument() {
        assert!(matches!(
            parse_run_config("{}"),
            Err(BackendError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_run_config(r#"{"model": "/definitely/not/here.onnx"}"#),
            Err(BackendError::InvalidArgument(_))
        ));
    }

    #[test]
    fn missing_companion_config_is_invalid_argument() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("lonely.onnx");
        fs::write(&model, b"onnx").unwrap();
        let text = json!({"model": model.to_str().unwrap()}).to_string();
        assert!(matches!(
            parse_run_config(&text),
            Err(BackendError::InvalidArgument(_))
        ));
    }

    #[test]
    fn malformed_json_is_invalid_encoding() {
        assert!(matches!(
            parse_run_config("{\"model\": "),
            Err(BackendError::InvalidEncoding(_))
        ));
        assert!(matches!(
            parse_run_config("\"voice.onnx\""),
            Err(BackendError::InvalidArgument(_))
        ));
    }

    #[test]
    fn reads_defaults_and_auxiliary_paths() {
        let fixture = Fixture::new();
        let text = json!({
            "model": fixture.model(),
            "output_type": "raw",
            "speaker": 1,
            "length_scale": 1.5,
            "espeak_data": "/opt/espeak-ng-data",
            "tashkeel_model": "/opt/libtashkeel.onnx",
            "json_input": true
        })
        .to_string();
        let config = parse_run_config(&text).unwrap();
        assert!(config.json_input);
        assert_eq!(
            config.espeak_data_path,
            Some(PathBuf::from("/opt/espeak-ng-data"))
        );
        assert_eq!(
            config.tashkeel_model_path,
            Some(PathBuf::from("/opt/libtashkeel.onnx"))
        );
        let defaults = &config.default_synthesis_config;
        assert_eq!(defaults.output_type, Some(OutputType::Raw));
        assert_eq!(defaults.speaker_id, Some(1));
        assert_eq!(defaults.length_scale, Some(1.5));
    }

    #[test]
    fn non_boolean_json_input_is_rejected() {
        let fixture = Fixture::new();
        let text = json!({"model": fixture.model(), "json_input": "yes"}).to_string();
        assert!(matches!(
            parse_run_config(&text),
            Err(BackendError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unknown_output_type_fails_at_load() {
        let fixture = Fixture::new();
        let text = json!({"model": fixture.model(), "output_type": "mp3"}).to_string();
        assert!(matches!(
            parse_run_config(&text),
            Err(BackendError::InvalidArgument(_))
        ));
    }
}
