use anyhow::Context;
use gguf_parser::{GGUFError, GGUFFile, GGUFFileType, GGUFReadOptions};
use tracing::{debug, warn};

use crate::cli::{GlobalArgs, ScanArgs};
use crate::config::AppConfig;
use crate::scan::{ModelEntry, discover};

struct ScanRow {
    entry: ModelEntry,
    file: Option<GGUFFile>,
    file_type: GGUFFileType,
}

pub async fn execute(global: GlobalArgs, args: ScanArgs) -> anyhow::Result<()> {
    if !args.dir.is_dir() {
        anyhow::bail!("{} is not a directory", args.dir.display());
    }

    let cfg = AppConfig::load_or_default()?;
    // Vocabularies are not needed for the listing.
    let options = GGUFReadOptions {
        skip_large_metadata: true,
        ..global.read_options(&cfg)
    };

    let dir = args.dir.clone();
    let rows = tokio::task::spawn_blocking(move || scan(&dir, &options))
        .await
        .context("scan task panicked")??;

    if rows.is_empty() {
        println!("No GGUF models found in {}", args.dir.display());
        return Ok(());
    }

    println!(
        "{:<40} {:<16} {:>10} {:>10} {:>10} {:>6}",
        "Name", "File type", "Size", "Params", "BPW", "Parts"
    );
    println!("{}", "-".repeat(97));
    for row in &rows {
        let (size, params, bpw) = match &row.file {
            Some(gf) => (
                gf.model_size.to_string(),
                gf.model_parameters.to_string(),
                gf.model_bits_per_weight.to_string(),
            ),
            None => ("-".into(), "-".into(), "-".into()),
        };
        println!(
            "{:<40} {:<16} {:>10} {:>10} {:>10} {:>6}",
            row.entry.name,
            row.file_type.to_string(),
            size,
            params,
            bpw,
            row.entry.parts.len()
        );
    }
    println!("\n{} model(s) found.", rows.len());
    Ok(())
}

fn scan(dir: &std::path::Path, options: &GGUFReadOptions) -> anyhow::Result<Vec<ScanRow>> {
    let entries =
        discover(dir).with_context(|| format!("failed to scan {}", dir.display()))?;
    debug!(dir = %dir.display(), models = entries.len(), "discovered models");

    let rows = entries
        .into_iter()
        .map(|entry| {
            let file = match gguf_parser::parse_gguf_file(entry.path(), options) {
                Ok(gf) => Some(gf),
                Err(e) => {
                    warn!(
                        path = %entry.path().display(),
                        error = %describe(e),
                        "skipping unreadable model"
                    );
                    None
                }
            };
            let file_type = file
                .as_ref()
                .and_then(|gf| gf.model().ok())
                .map_or(GGUFFileType::Unknown, |m| m.file_type);
            ScanRow {
                entry,
                file,
                file_type,
            }
        })
        .collect();
    Ok(rows)
}

/// The error with every cause, outermost first.
fn describe(err: GGUFError) -> String {
    format!("{:#}", anyhow::Error::from(err))
}
