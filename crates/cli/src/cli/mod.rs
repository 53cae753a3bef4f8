pub mod config_cmd;
pub mod info;
pub mod layers;
pub mod scan;
pub mod tensors;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gguf_parser::{GGUFFile, GGUFReadOptions};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "gguf-inspect",
    version,
    about = "Inspect GGUF model files without loading their weights"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Args, Clone)]
pub struct GlobalArgs {
    /// Size metadata arrays (e.g. tokenizer vocabularies) without decoding them.
    #[arg(long, global = true, env = "GGUF_SKIP_LARGE_METADATA")]
    pub skip_large_metadata: bool,

    /// Memory-map files instead of reading them through a buffer.
    #[arg(long, global = true, env = "GGUF_MMAP")]
    pub mmap: bool,
}

impl GlobalArgs {
    /// Flags switch options on; otherwise the saved configuration decides.
    pub fn read_options(&self, cfg: &AppConfig) -> GGUFReadOptions {
        GGUFReadOptions {
            skip_large_metadata: self.skip_large_metadata || cfg.skip_large_metadata,
            mmap: self.mmap || cfg.mmap,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show model metadata and the size summary of a GGUF file.
    Info(InfoArgs),

    /// List the tensors of a GGUF file.
    Tensors(TensorsArgs),

    /// Show tensors grouped by layer.
    Layers(LayersArgs),

    /// Find GGUF models under a directory.
    Scan(ScanArgs),

    /// View / edit configuration.
    Config(ConfigArgs),
}

//  Subcommand argument structs

#[derive(Debug, clap::Args, Clone)]
pub struct InfoArgs {
    /// Path to the GGUF file.
    pub file: PathBuf,

    /// Dump the whole decoded file as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, clap::Args, Clone)]
pub struct TensorsArgs {
    /// Path to the GGUF file.
    pub file: PathBuf,

    /// Only list tensors whose name matches this regex.
    #[arg(long)]
    pub filter: Option<String>,
}

#[derive(Debug, clap::Args, Clone)]
pub struct LayersArgs {
    /// Path to the GGUF file.
    pub file: PathBuf,

    /// Hide a top-level layer or tensor (can be repeated; overrides config).
    #[arg(long = "ignore")]
    pub ignores: Vec<String>,
}

#[derive(Debug, clap::Args, Clone)]
pub struct ScanArgs {
    /// Directory to search recursively.
    pub dir: PathBuf,
}

#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Display the current configuration.
    Show,
    /// Set a configuration value.
    Set { key: String, value: String },
}

/// Decode `path` on the blocking pool.
pub async fn decode(path: PathBuf, options: GGUFReadOptions) -> anyhow::Result<GGUFFile> {
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || gguf_parser::parse_gguf_file(&path, &options))
        .await
        .context("decode task panicked")?
        .with_context(|| format!("failed to decode {display}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["gguf-inspect", "info", "m.gguf", "--json"]).unwrap();
        let Commands::Info(a) = cli.command else {
            panic!("expected info");
        };
        assert_eq!(a.file, PathBuf::from("m.gguf"));
        assert!(a.json);

        let cli = Cli::try_parse_from([
            "gguf-inspect",
            "layers",
            "m.gguf",
            "--ignore",
            "output.weight",
            "--ignore",
            "token_embd.weight",
            "--mmap",
        ])
        .unwrap();
        assert!(cli.global.mmap);
        let Commands::Layers(a) = cli.command else {
            panic!("expected layers");
        };
        assert_eq!(a.ignores, vec!["output.weight", "token_embd.weight"]);

        assert!(Cli::try_parse_from(["gguf-inspect"]).is_err());
    }

    #[test]
    fn test_read_options_merge() {
        let global = GlobalArgs {
            skip_large_metadata: false,
            mmap: true,
        };
        let cfg = AppConfig {
            skip_large_metadata: true,
            ..AppConfig::default()
        };
        let opts = global.read_options(&cfg);
        assert!(opts.skip_large_metadata);
        assert!(opts.mmap);

        let opts = global.read_options(&AppConfig::default());
        assert!(!opts.skip_large_metadata);
    }
}
