use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "mirror",
    about = "Mirror - resolve direct media streams from third-party mirror pages",
    version,
    author
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Per-request timeout in seconds, overrides the configuration
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Proxy URL for outbound requests (supports http, https, socks5)
    #[arg(long, global = true)]
    pub proxy: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a list of mirrors into ranked streams
    Resolve {
        /// JSON file holding the mirror list, `-` for stdin
        input: PathBuf,

        /// Content id the mirrors belong to, e.g. `mal:21:1000`
        #[arg(long, default_value = "unknown:0:0")]
        content_id: String,

        /// Anime name used in filenames
        #[arg(long)]
        name: Option<String>,

        /// Allow providers that require a privileged request
        #[arg(long, env = "MIRROR_PRIVILEGED")]
        privileged: bool,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// Save output to file
        #[arg(short = 'O', long)]
        output_file: Option<PathBuf>,
    },

    /// Sign a URL for the edge proxy
    Sign {
        /// The manifest URL to sign
        url: String,

        /// Referer to sign alongside the URL
        #[arg(long)]
        referer: Option<String>,
    },

    /// Verify a proxy token and print the URL it carries
    Verify {
        token: String,
    },

    /// List supported providers
    Providers {
        /// Show domain patterns and aliases
        #[arg(short, long)]
        detailed: bool,
    },

    /// Run the HTTP front end
    Serve {
        /// Listen address, overrides the configuration
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Show configuration information
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Reset configuration to defaults
        #[arg(long)]
        reset: bool,
    },
}

#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed human-readable output
    #[default]
    Pretty,
    /// JSON output
    Json,
    /// Compact JSON output
    JsonCompact,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Pretty => write!(f, "pretty"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonCompact => write!(f, "json-compact"),
        }
    }
}
