use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::io::HttpOptions;

#[derive(Parser, Debug)]
#[command(name = "rezip")]
#[command(version)]
#[command(about = "Streaming ZIP reader, rewriter and writer with HTTP URL support", long_about = None)]
#[command(after_help = "Examples:\n  \
  rezip list https://example.com/archive.zip            list files from remote ZIP\n  \
  rezip extract data.zip meta.json | jq .             send one entry to stdout\n  \
  rezip patch flyer.pptx out.pptx --set name=World     fill in slide placeholders")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// More log output (-vv for trace)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// HTTP request timeout in seconds
    #[arg(long, env = "REZIP_TIMEOUT", default_value_t = 30, global = true)]
    pub timeout: u64,

    /// Attempts on HTTP connection failures
    #[arg(long, env = "REZIP_MAX_RETRY", default_value_t = 10, global = true)]
    pub max_retry: u32,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the entries of an archive
    List {
        /// ZIP file path or HTTP URL
        #[arg(value_name = "ARCHIVE")]
        archive: String,

        /// Show sizes, compression ratio and timestamps
        #[arg(short = 'l', long)]
        long: bool,
    },

    /// Extract entries to stdout or a directory
    Extract {
        /// ZIP file path or HTTP URL
        #[arg(value_name = "ARCHIVE")]
        archive: String,

        /// Entries to extract
        #[arg(value_name = "ENTRY", required = true)]
        entries: Vec<String>,

        /// Extract into this directory instead of stdout
        #[arg(short = 'd', value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// Rewrite an archive, filling in ${name} placeholders
    Patch {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Placeholder value
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_variable)]
        vars: Vec<(String, String)>,

        /// Patch entries starting with this prefix instead of slides
        #[arg(long, value_name = "PREFIX")]
        pattern: Option<String>,
    },

    /// Create an archive from local files
    Create {
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Archive comment
        #[arg(long)]
        comment: Option<String>,

        /// Entries up to this many bytes are stored uncompressed
        #[arg(long, default_value_t = 32)]
        threshold: usize,
    },
}

impl Cli {
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: Duration::from_secs(self.timeout),
            max_retry: self.max_retry,
        }
    }

    /// Default log filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

pub fn is_http_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

fn parse_variable(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", arg))
}
