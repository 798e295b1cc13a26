use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::infra::stream::DEFAULT_CHUNK_SIZE;

const DEFAULT_QUEUE_LIMIT: u32 = 50;

/// Command-line arguments for the amberlink binary.
#[derive(Debug, Parser)]
#[command(
    name = "amberlink",
    version,
    about = "Annotate outbound links with cached-copy availability"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "AMBERLINK_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Stream an HTML document through the annotation pipeline.
    Annotate(AnnotateArgs),
    /// Create or upgrade the cache state schema.
    Migrate,
    /// List URLs waiting for capture, oldest first.
    Queue(QueueArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the cache state database path.
    #[arg(long = "database-path", value_name = "PATH", global = true)]
    pub database_path: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct AnnotateArgs {
    /// Request path used to pick the directory scope.
    #[arg(long, value_name = "URI", default_value = "/")]
    pub uri: String,

    /// Declared content type of the document.
    #[arg(long = "content-type", value_name = "TYPE", default_value = "text/html")]
    pub content_type: String,

    /// Size of the chunks fed to the pipeline.
    #[arg(long = "chunk-size", value_name = "BYTES", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Input document; stdin when omitted.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,
}

impl Default for AnnotateArgs {
    fn default() -> Self {
        Self {
            uri: "/".to_string(),
            content_type: "text/html".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            file: None,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct QueueArgs {
    /// Maximum number of entries to list.
    #[arg(long, value_name = "COUNT", default_value_t = DEFAULT_QUEUE_LIMIT)]
    pub limit: u32,
}
