//! Graph/context lifecycle on top of a [`SynthesisEngine`].

use super::options::{get_option, parse_object};
use super::registry::Registry;
use super::run_config::{parse_run_config, RunConfig};
use super::synthesis_config::{
    backfill_synthesis_config, parse_synthesis_config, update_synthesis_config, OutputType,
    ScopedOverride, SynthesisConfig,
};
use super::{BackendError, ContextId, Device, GraphBackend, GraphId, Tensor};
use crate::engines::{EngineConfig, EngineConfigBuilder, PhonemeType};
use crate::{SynthesisEngine, VoiceHandle};

/// espeak-ng voice name of the voice that needs diacritization.
const ARABIC_VOICE: &str = "ar";

/// A loaded voice and everything decided at load time.
pub struct Graph<V> {
    pub config: RunConfig,
    pub engine_config: EngineConfig,
    pub voice: V,
}

/// Per-request state. Refers to its graph by id only.
#[derive(Debug, Default)]
pub struct Context {
    pub graph_id: GraphId,
    pub line: Option<String>,
    /// Request overrides, only set in JSON input mode.
    pub json_input_config: Option<SynthesisConfig>,
    pub output: Option<Vec<u8>>,
}

pub struct PiperBackend<E: SynthesisEngine> {
    engine: E,
    graphs: Registry<Graph<E::Voice>>,
    contexts: Registry<Context>,
}

impl<E: SynthesisEngine> PiperBackend<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            graphs: Registry::new(),
            contexts: Registry::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The graph defaults after load, including values the voice filled in.
    pub fn default_synthesis_config(&self, graph_id: GraphId) -> Option<&SynthesisConfig> {
        self.graphs
            .get(graph_id)
            .map(|graph| &graph.config.default_synthesis_config)
    }

    pub fn graph(&self, graph_id: GraphId) -> Option<&Graph<E::Voice>> {
        self.graphs.get(graph_id)
    }

    pub fn context(&self, context_id: ContextId) -> Option<&Context> {
        self.contexts.get(context_id)
    }

    fn context_mut(&mut self, context_id: ContextId) -> Result<&mut Context, BackendError> {
        self.contexts.get_mut(context_id).ok_or_else(|| {
            BackendError::invalid_argument(format!("Unknown context id {context_id}."))
        })
    }

    fn load_graph(&self, builder: &[u8]) -> Result<Graph<E::Voice>, BackendError> {
        let text = std::str::from_utf8(builder).map_err(|e| {
            BackendError::invalid_encoding(format!("Run config is not valid UTF-8: {e}"))
        })?;
        let mut config = parse_run_config(text).map_err(|err| {
            log::error!("{} Failed to parse run config.", super::LOG_PREFIX);
            err
        })?;

        let mut voice = self
            .engine
            .load_voice(
                &config.model_path,
                &config.model_config_path,
                config.default_synthesis_config.speaker_id,
            )
            .map_err(|e| BackendError::engine("Failed to load voice", e))?;

        let mut engine_config = EngineConfigBuilder::default();
        if voice.phoneme_type() == PhonemeType::ESpeak {
            let Some(data_path) = &config.espeak_data_path else {
                return Err(BackendError::invalid_argument(
                    "espeak-ng data directory is required for eSpeakPhonemes",
                ));
            };
            if !data_path.exists() {
                return Err(BackendError::invalid_argument(format!(
                    "espeak-ng data directory doesn't exist: {}",
                    data_path.display()
                )));
            }
            engine_config.espeak_data_path(data_path.as_path());
        } else {
            engine_config.use_espeak(false);
        }

        if voice.espeak_voice() == ARABIC_VOICE {
            let Some(model_path) = &config.tashkeel_model_path else {
                return Err(BackendError::invalid_argument(
                    "libtashkeel ort model is required for Arabic",
                ));
            };
            if !model_path.exists() {
                return Err(BackendError::invalid_argument(format!(
                    "libtashkeel ort model doesn't exist: {}",
                    model_path.display()
                )));
            }
            engine_config
                .use_tashkeel(true)
                .tashkeel_model_path(model_path.as_path());
        }

        let engine_config = engine_config
            .build()
            .map_err(|e| BackendError::invalid_argument(format!("Invalid engine config: {e}")))?;
        self.engine
            .initialize(&engine_config)
            .map_err(|e| BackendError::engine("Failed to initialize engine", e))?;

        // Caller values win; anything left unset takes the voice default.
        update_synthesis_config(
            &config.default_synthesis_config,
            voice.synthesis_config_mut(),
            false,
        );
        backfill_synthesis_config(
            &mut config.default_synthesis_config,
            voice.synthesis_config(),
        );

        Ok(Graph {
            config,
            engine_config,
            voice,
        })
    }

    /// Decode a request line, returning the text and any overrides.
    fn decode_input(
        graph: &Graph<E::Voice>,
        line: String,
    ) -> Result<(String, Option<SynthesisConfig>), BackendError> {
        if !graph.config.json_input {
            return Ok((line, None));
        }

        let object = parse_object(&line, "json input")?;
        let text = match object.get("text").and_then(|v| v.as_str()) {
            Some(text) => text.to_string(),
            None => {
                return Err(BackendError::invalid_argument(
                    "Unable to retrieve required \"text\" from json input",
                ))
            }
        };

        let mut overrides = parse_synthesis_config(&object, true)?;
        if overrides.speaker_id.is_none() {
            if let Some(name) = get_option::<&str>(&object, "speaker")? {
                match graph.voice.speaker_id(name) {
                    Some(id) => overrides.speaker_id = Some(id),
                    None => log::warn!("{} No speaker named: {name}", super::LOG_PREFIX),
                }
            }
        }
        Ok((text, Some(overrides)))
    }
}

impl<E: SynthesisEngine> GraphBackend for PiperBackend<E> {
    fn load(&mut self, builders: &[&[u8]], _device: Device) -> Result<GraphId, BackendError> {
        if builders.len() != 1 {
            return Err(BackendError::invalid_argument(format!(
                "Wrong GraphBuilder Length {}, expect 1",
                builders.len()
            )));
        }
        let graph = self.load_graph(builders[0])?;
        let graph_id = self.graphs.insert(graph);
        log::debug!("{} Loaded graph {graph_id}", super::LOG_PREFIX);
        Ok(graph_id)
    }

    fn init_exec_ctx(&mut self, graph_id: GraphId) -> Result<ContextId, BackendError> {
        if !self.graphs.contains(graph_id) {
            return Err(BackendError::invalid_argument(format!(
                "Unknown graph id {graph_id}."
            )));
        }
        Ok(self.contexts.insert(Context {
            graph_id,
            ..Default::default()
        }))
    }

    fn set_input(
        &mut self,
        context_id: ContextId,
        index: u32,
        tensor: &Tensor<'_>,
    ) -> Result<(), BackendError> {
        if index != 0 {
            return Err(BackendError::invalid_argument("Input index must be 0."));
        }
        if tensor.dimensions != [1] {
            return Err(BackendError::invalid_argument(
                "Input tensor dimension must be [1].",
            ));
        }

        let graph_id = self.context_mut(context_id)?.graph_id;
        let graph = self.graphs.get(graph_id).ok_or_else(|| {
            BackendError::invalid_argument(format!("Unknown graph id {graph_id}."))
        })?;

        let line = String::from_utf8(tensor.data.to_vec()).map_err(|e| {
            BackendError::invalid_encoding(format!("Input is not valid UTF-8: {e}"))
        })?;
        let (line, overrides) = Self::decode_input(graph, line)?;

        let context = self.context_mut(context_id)?;
        if overrides.is_some() {
            context.json_input_config = overrides;
        }
        context.line = Some(line);
        Ok(())
    }

    fn compute(&mut self, context_id: ContextId) -> Result<(), BackendError> {
        let context = self.contexts.get_mut(context_id).ok_or_else(|| {
            BackendError::invalid_argument(format!("Unknown context id {context_id}."))
        })?;
        let graph = self.graphs.get_mut(context.graph_id).ok_or_else(|| {
            BackendError::invalid_argument(format!("Unknown graph id {}.", context.graph_id))
        })?;
        let Some(line) = &context.line else {
            return Err(BackendError::invalid_argument("Input is not set."));
        };

        let overrides = context.json_input_config.as_ref();
        let output_type = overrides
            .and_then(|c| c.output_type)
            .or(graph.config.default_synthesis_config.output_type)
            .unwrap_or_default();

        let mut voice = ScopedOverride::apply(
            &mut graph.voice,
            overrides,
            &graph.config.default_synthesis_config,
        );
        let output = match output_type {
            OutputType::Wav => self
                .engine
                .text_to_wav(&graph.engine_config, &mut voice, line),
            OutputType::Raw => self
                .engine
                .text_to_audio(&graph.engine_config, &mut voice, line)
                .map(|result| result.to_raw_bytes()),
        };
        drop(voice);

        let output = output.map_err(|e| BackendError::engine("Synthesis failed", e))?;
        context.output = Some(output);
        Ok(())
    }

    fn get_output(
        &mut self,
        context_id: ContextId,
        index: u32,
        out: &mut [u8],
    ) -> Result<u32, BackendError> {
        if index != 0 {
            return Err(BackendError::invalid_argument("Output index must be 0."));
        }
        let context = self.context_mut(context_id)?;
        let Some(output) = &context.output else {
            return Err(BackendError::invalid_argument("No output available."));
        };

        let written = u32::try_from(output.len())
            .ok()
            .filter(|&len| len != u32::MAX)
            .ok_or_else(|| {
                BackendError::invalid_argument(format!(
                    "Output size {} is greater than u32::MAX {}.",
                    output.len(),
                    u32::MAX
                ))
            })?;
        if output.len() > out.len() {
            return Err(BackendError::invalid_argument(format!(
                "Output size {} is greater than buffer size {}.",
                output.len(),
                out.len()
            )));
        }

        out[..output.len()].copy_from_slice(output);
        Ok(written)
    }

    fn delete_graph(&mut self, graph_id: GraphId) {
        self.graphs.remove(graph_id);
    }

    fn delete_context(&mut self, context_id: ContextId) {
        self.contexts.remove(context_id);
    }
}
