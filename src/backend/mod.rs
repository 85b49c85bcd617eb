//! WASI-NN style graph/context backend.
//!
//! A host drives a backend through five operations: load a graph from
//! builder buffers, create an execution context on it, set the input
//! tensor, compute, and read the output tensor back. Ids are plain `u32`
//! handles into backend-owned tables, and contexts refer to their graph
//! by id only.
//!
//! Every operation takes `&mut self`, so a host sharing one backend across
//! threads has to serialize calls itself (e.g. behind a `Mutex`). The live
//! synthesis settings of a graph are shared by all of its contexts.

pub mod options;
pub mod piper;
pub mod registry;
pub mod run_config;
pub mod synthesis_config;

pub use piper::PiperBackend;
pub use run_config::RunConfig;
pub use synthesis_config::{OutputType, SynthesisConfig};

pub type GraphId = u32;
pub type ContextId = u32;

/// Log prefix shared by every backend message.
pub(crate) const LOG_PREFIX: &str = "[WASI-NN] Piper backend:";

/// Numeric error codes reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrNo {
    Success = 0,
    InvalidArgument = 1,
    InvalidEncoding = 2,
    RuntimeError = 5,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
    #[error("engine failure: {0}")]
    Engine(String),
}

impl BackendError {
    /// Log the message and build an [`BackendError::InvalidArgument`].
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("{LOG_PREFIX} {message}");
        Self::InvalidArgument(message)
    }

    /// Log the message and build an [`BackendError::InvalidEncoding`].
    pub(crate) fn invalid_encoding(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("{LOG_PREFIX} {message}");
        Self::InvalidEncoding(message)
    }

    pub(crate) fn engine(context: &str, err: Box<dyn std::error::Error>) -> Self {
        let message = format!("{context}: {err}");
        log::error!("{LOG_PREFIX} {message}");
        Self::Engine(message)
    }

    /// The code a host reports for this error.
    pub fn errno(&self) -> ErrNo {
        match self {
            Self::InvalidArgument(_) => ErrNo::InvalidArgument,
            Self::InvalidEncoding(_) => ErrNo::InvalidEncoding,
            Self::Engine(_) => ErrNo::RuntimeError,
        }
    }
}

/// Flatten a backend result into the host's error code.
pub fn errno_of<T>(result: &Result<T, BackendError>) -> ErrNo {
    match result {
        Ok(_) => ErrNo::Success,
        Err(err) => err.errno(),
    }
}

/// Execution target requested by the host. Piper always runs on the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    Gpu,
    Tpu,
    Auto,
}

/// A host tensor: its dimensions and backing bytes.
#[derive(Debug, Clone, Copy)]
pub struct Tensor<'a> {
    pub dimensions: &'a [u32],
    pub data: &'a [u8],
}

impl<'a> Tensor<'a> {
    pub fn new(dimensions: &'a [u32], data: &'a [u8]) -> Self {
        Self { dimensions, data }
    }
}

/// The host-facing lifecycle contract.
pub trait GraphBackend {
    /// Load a graph from builder buffers and return its id.
    fn load(&mut self, builders: &[&[u8]], device: Device) -> Result<GraphId, BackendError>;

    /// Create an execution context bound to `graph_id`.
    fn init_exec_ctx(&mut self, graph_id: GraphId) -> Result<ContextId, BackendError>;

    fn set_input(
        &mut self,
        context_id: ContextId,
        index: u32,
        tensor: &Tensor<'_>,
    ) -> Result<(), BackendError>;

    fn compute(&mut self, context_id: ContextId) -> Result<(), BackendError>;

    /// Copy the output into `out` and return the number of bytes written.
    fn get_output(
        &mut self,
        context_id: ContextId,
        index: u32,
        out: &mut [u8],
    ) -> Result<u32, BackendError>;

    /// Drop a graph and everything it owns.
    fn delete_graph(&mut self, graph_id: GraphId);

    fn delete_context(&mut self, context_id: ContextId);
}

/// Backend used when the crate is built without an engine.
///
/// Every operation fails with `InvalidArgument`.
#[derive(Debug, Default)]
pub struct UnsupportedBackend;

impl UnsupportedBackend {
    fn report<T>() -> Result<T, BackendError> {
        log::error!("[WASI-NN] Piper backend is not supported.");
        Err(BackendError::InvalidArgument(
            "Piper backend is not supported".to_string(),
        ))
    }
}

impl GraphBackend for UnsupportedBackend {
    fn load(&mut self, _: &[&[u8]], _: Device) -> Result<GraphId, BackendError> {
        Self::report()
    }

    fn init_exec_ctx(&mut self, _: GraphId) -> Result<ContextId, BackendError> {
        Self::report()
    }

    fn set_input(&mut self, _: ContextId, _: u32, _: &Tensor<'_>) -> Result<(), BackendError> {
        Self::report()
    }

    fn compute(&mut self, _: ContextId) -> Result<(), BackendError> {
        Self::report()
    }

    fn get_output(&mut self, _: ContextId, _: u32, _: &mut [u8]) -> Result<u32, BackendError> {
        Self::report()
    }

    fn delete_graph(&mut self, _: GraphId) {}

    fn delete_context(&mut self, _: ContextId) {}
}

/// Create the backend this build supports.
#[cfg(feature = "piper")]
pub fn new_backend() -> Box<dyn GraphBackend> {
    Box::new(PiperBackend::new(crate::engines::piper::PiperEngine::new()))
}

/// Create the backend this build supports.
#[cfg(not(feature = "piper"))]
pub fn new_backend() -> Box<dyn GraphBackend> {
    Box::new(UnsupportedBackend)
}
