//! Configuration for the Anthropic-over-Bedrock proxy.
//!
//! Layers compose as: compiled defaults, overlaid by an optional TOML file,
//! overlaid by environment variables (see [`loader::load`]).

mod aws;
mod error;
mod llm;
pub mod loader;
mod model_mapping;
mod ptc;
mod server;

pub use aws::AwsConfig;
pub use error::Error;
pub use llm::LlmConfig;
pub use model_mapping::ModelMappingConfig;
pub use ptc::{PtcConfig, StandaloneConfig};
pub use server::ServerConfig;

/// Root configuration object.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub aws: AwsConfig,
    pub llm: LlmConfig,
    pub model_mapping: ModelMappingConfig,
    pub ptc: PtcConfig,
    pub standalone: StandaloneConfig,
}

impl Config {
    /// Validate every section, failing fast with the first offending key.
    pub fn validate(&self) -> Result<(), Error> {
        self.aws.validate()?;
        self.llm.validate()?;
        self.ptc.validate()?;
        self.standalone.validate()?;

        if self.ptc.enabled && self.standalone.enabled {
            log::warn!(
                "Both programmatic tool calling and standalone code execution are enabled; \
                 a single request must not mix PTC-style and standalone-style tools (see the \
                 request-level validation in the `ptc`/`codeexec` crates)."
            );
        }

        Ok(())
    }
}
