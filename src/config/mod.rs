use serde::Deserialize;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const REMOTE_BASE_URL_VAR: &str = "REMOTE_BASE_URL";
pub const REMOTE_MCP_URL_VAR: &str = "REMOTE_MCP_URL";

const LOCAL_BASE_URL: &str = "http://localhost:8321";
const LOCAL_MCP_URL: &str = "http://host.containers.internal:8000/sse";

const DEFAULT_CONFIG_PATH: &str = "config/agent.toml";
const DEFAULT_MODEL: &str = "llama3.2:3b";
const DEFAULT_TOOLGROUP_ID: &str = "mcp::openshift";
const DEFAULT_PROVIDER_ID: &str = "model-context-protocol";
const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant. You have access to a number of tools. \
Whenever a tool is called, be sure return the Response in a friendly and helpful tone. \
When you are asked to search the web you must use a tool.";
const DEFAULT_AUTO_PROMPT: &str = "Get the pods in the namespace mcp-server-operator-system \
without using the labelSelector and print just their names";

/// Where the agent service and the MCP tool endpoint live for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub base_url: String,
    pub mcp_url: String,
}

impl Endpoints {
    /// Resolve the endpoint pair from the remote flag.
    ///
    /// Remote runs read both environment variables verbatim; an unset
    /// variable resolves to an empty string and is handed through
    /// uninspected, so misconfiguration surfaces as a failed remote
    /// call rather than here.
    pub fn resolve(remote: bool) -> Self {
        if remote {
            Self {
                base_url: env::var(REMOTE_BASE_URL_VAR).unwrap_or_default(),
                mcp_url: env::var(REMOTE_MCP_URL_VAR).unwrap_or_default(),
            }
        } else {
            Self {
                base_url: LOCAL_BASE_URL.to_string(),
                mcp_url: LOCAL_MCP_URL.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model: String,
    pub instructions: String,
    pub toolgroup_id: String,
    pub provider_id: String,
    pub auto_prompts: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    model: Option<String>,
    instructions: Option<String>,
    toolgroup_id: Option<String>,
    provider_id: Option<String>,
    auto_prompts: Option<Vec<String>>,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return read_config(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        match read_config(default_path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Configuration file not found; using defaults");
                Ok(Self::default())
            }
            Err(other) => Err(other),
        }
    }

    pub fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            toolgroup_id: DEFAULT_TOOLGROUP_ID.to_string(),
            provider_id: DEFAULT_PROVIDER_ID.to_string(),
            auto_prompts: vec![DEFAULT_AUTO_PROMPT.to_string()],
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading agent configuration file");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(AppConfig {
        model: parsed.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        instructions: parsed
            .instructions
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
        toolgroup_id: parsed
            .toolgroup_id
            .unwrap_or_else(|| DEFAULT_TOOLGROUP_ID.to_string()),
        provider_id: parsed
            .provider_id
            .unwrap_or_else(|| DEFAULT_PROVIDER_ID.to_string()),
        auto_prompts: parsed
            .auto_prompts
            .unwrap_or_else(|| vec![DEFAULT_AUTO_PROMPT.to_string()]),
    })
}
