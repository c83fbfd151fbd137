use std::fmt;
use std::str::FromStr;

#[cfg(any(target_os = "macos", target_os = "windows"))]
use ort::execution_providers::ExecutionProvider;

use crate::shared::error::ConfigError;

/// Backend preference as requested by the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InferenceBackend {
    /// Probe for a platform accelerator, fall back to CPU.
    #[default]
    Auto,
    Cpu,
}

impl FromStr for InferenceBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" | "onnxrt" => Ok(Self::Cpu),
            _ => Err(ConfigError::UnknownVariant {
                kind: "backend",
                value: s.to_string(),
            }),
        }
    }
}

/// The concrete execution backend chosen at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionBackend {
    Cpu,
    CoreMl,
    DirectMl,
}

impl ExecutionBackend {
    /// Resolves a preference to a backend that is actually usable here.
    pub fn probe(requested: InferenceBackend) -> Self {
        let chosen = match requested {
            InferenceBackend::Cpu => ExecutionBackend::Cpu,
            InferenceBackend::Auto => probe_accelerator().unwrap_or(ExecutionBackend::Cpu),
        };
        log::info!("Inference backend: {chosen} (requested {requested:?})");
        chosen
    }

    /// ONNX Runtime providers to register; empty means the default CPU provider.
    pub fn execution_providers(self) -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
        match self {
            #[cfg(target_os = "macos")]
            ExecutionBackend::CoreMl => {
                vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
            }
            #[cfg(target_os = "windows")]
            ExecutionBackend::DirectMl => {
                vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for ExecutionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionBackend::Cpu => "cpu",
            ExecutionBackend::CoreMl => "coreml",
            ExecutionBackend::DirectMl => "directml",
        };
        f.write_str(name)
    }
}

#[cfg(target_os = "macos")]
fn probe_accelerator() -> Option<ExecutionBackend> {
    let ep = ort::execution_providers::CoreMLExecutionProvider::default();
    ep.is_available()
        .unwrap_or(false)
        .then_some(ExecutionBackend::CoreMl)
}

#[cfg(target_os = "windows")]
fn probe_accelerator() -> Option<ExecutionBackend> {
    let ep = ort::execution_providers::DirectMLExecutionProvider::default();
    ep.is_available()
        .unwrap_or(false)
        .then_some(ExecutionBackend::DirectMl)
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn probe_accelerator() -> Option<ExecutionBackend> {
    None
}
