//! Server state and configuration.

use std::path::PathBuf;
use std::sync::Arc;

use crate::bridge::{PrintTarget, PrinterBridge};
use crate::error::Result;
use crate::llm::{OpenAiChatModel, OpenAiConfig};
use crate::llm::openai::DEFAULT_USER;
use crate::pipeline::{Orchestrator, PipelineConfig};
use crate::printer::{PrinterModel, TransportKind};

/// Server configuration. Every option can also come from the environment.
#[derive(Debug, Clone, clap::Args)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "LABELBOT_LISTEN", default_value = "0.0.0.0:8000")]
    pub listen_addr: String,

    /// Directory for uploads and print-by-name images
    #[arg(long, env = "LABELBOT_IMAGES_DIR", default_value = "images")]
    pub images_dir: PathBuf,

    /// Printer model used by the pipeline
    #[arg(long, env = "PRINTER_MODEL", value_enum, default_value = "b1")]
    pub printer_model: PrinterModel,

    #[arg(long, env = "PRINTER_CONNECTION", value_enum, default_value = "usb")]
    pub printer_connection: TransportKind,

    /// Serial device path or Bluetooth MAC (USB auto-detects when omitted)
    #[arg(long, env = "PRINTER_ADDRESS")]
    pub printer_address: Option<String>,

    /// Print density for pipeline labels (clamped per model)
    #[arg(long, env = "PRINTER_DENSITY", default_value_t = 5)]
    pub density: u8,

    /// OpenAI-compatible endpoint, including the version segment
    #[arg(long, env = "LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub llm_base_url: String,

    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o")]
    pub llm_model: String,
}

impl ServerConfig {
    pub fn print_target(&self) -> PrintTarget {
        PrintTarget::new(
            self.printer_model,
            self.printer_connection,
            self.printer_address.clone(),
        )
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::new(self.images_dir.clone(), self.print_target());
        config.density = self.density;
        config
    }

    pub fn llm_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            base_url: self.llm_base_url.clone(),
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            user: DEFAULT_USER.to_string(),
        }
    }
}

/// Application state shared across handlers.
pub struct AppState {
    pub pipeline: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(pipeline: Orchestrator) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Wire the real chat endpoint and printer from `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let model = Arc::new(OpenAiChatModel::new(config.llm_config())?);
        let pipeline_config = config.pipeline_config();
        let bridge = PrinterBridge::device(pipeline_config.timeouts.printer);
        Ok(Self::new(Orchestrator::new(model, bridge, pipeline_config)))
    }

    /// Printer the pipeline prints to; also the default for `/print` and `/status`.
    pub fn default_target(&self) -> &PrintTarget {
        &self.pipeline.config().target
    }
}
