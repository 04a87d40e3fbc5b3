//! Main entry point for the rezip CLI application.

use anyhow::{Context, Result, bail};
use clap::Parser;
use futures::stream;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rezip::cli::{Command, is_http_url};
use rezip::io::{file_stream, write_stream};
use rezip::zip::DosDateTime;
use rezip::{
    Cli, HttpRangeReader, LocalFileReader, PlaceholderSelector, ReadAt, WriterOptions,
    ZipExtractor, ZipItem, create_zip, modify_zip,
};

/// Input chunk size for streaming rewrites
const CHUNK_SIZE: usize = 64 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::List { archive, .. } | Command::Extract { archive, .. } => {
            if is_http_url(archive) {
                // Remote archive via HTTP Range requests
                let reader = Arc::new(HttpRangeReader::with_options(archive.clone(), cli.http_options()).await?);
                read_archive(reader.clone(), &cli.command).await?;
                info!("Total bytes transferred: {}", format_size(reader.transferred_bytes()));
            } else {
                let reader = Arc::new(LocalFileReader::new(Path::new(archive))?);
                read_archive(reader, &cli.command).await?;
            }
        }
        Command::Patch {
            input,
            output,
            vars,
            pattern,
        } => patch(input, output, vars, pattern.as_deref()).await?,
        Command::Create {
            output,
            files,
            comment,
            threshold,
        } => {
            let options = WriterOptions {
                deflate_threshold: *threshold,
                comment: comment.clone(),
                ..WriterOptions::default()
            };
            create(output, files, options).await?
        }
    }

    Ok(())
}

async fn read_archive<R: ReadAt + 'static>(reader: Arc<R>, command: &Command) -> Result<()> {
    let mut extractor = ZipExtractor::new(reader);
    extractor.open().await?;

    match command {
        Command::List { long, .. } => list_files(&extractor, *long)?,
        Command::Extract { entries, dir, .. } => {
            for name in entries {
                match dir {
                    Some(dir) => {
                        let path = dir.join(safe_path(name)?);
                        extractor.extract_to_file(name, &path).await?;
                        println!("  extracting: {}", name);
                    }
                    None => extractor.extract_to_stdout(name).await?,
                }
            }
        }
        Command::Patch { .. } | Command::Create { .. } => {}
    }

    extractor.close();
    Ok(())
}

fn list_files<R: ReadAt>(extractor: &ZipExtractor<R>, long: bool) -> Result<()> {
    let entries = extractor.list_files()?;

    if !long {
        for entry in entries {
            println!("{}", entry.file_name);
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        let time = entry.last_modified;
        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            time.year(),
            time.month(),
            time.day(),
            time.hour(),
            time.minute(),
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );
    Ok(())
}

/// Space saved by compression as a percentage
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Reject entry names that would land outside the output directory.
fn safe_path(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        bail!("Refusing to extract {} outside the target directory", name);
    }
    Ok(path.to_path_buf())
}

async fn patch(input: &Path, output: &Path, vars: &[(String, String)], pattern: Option<&str>) -> Result<()> {
    let vars: HashMap<String, String> = vars.iter().cloned().collect();
    let mut selector = PlaceholderSelector::new(vars);
    if let Some(prefix) = pattern {
        let prefix = prefix.to_string();
        selector = selector.with_filter(move |name| name.starts_with(&prefix));
    }
    let report = selector.report();

    let source = file_stream(input, CHUNK_SIZE)
        .await
        .with_context(|| format!("Cannot open {}", input.display()))?;
    let mut file = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("Cannot create {}", output.display()))?;
    let written = write_stream(modify_zip(source, selector), &mut file).await?;

    info!(
        patched = report.patched(),
        finished = report.finished(),
        "wrote {} ({})",
        output.display(),
        format_size(written)
    );
    Ok(())
}

async fn create(output: &Path, files: &[PathBuf], options: WriterOptions) -> Result<()> {
    let mut items = Vec::with_capacity(files.len());
    for path in files {
        let name = entry_name(path)?;
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let item = if metadata.is_dir() {
            ZipItem::directory(name)
        } else {
            ZipItem::file(name, tokio::fs::read(path).await?)
        };
        items.push(match metadata.modified() {
            Ok(time) => item.with_last_modified(DosDateTime::from_system_time(time)),
            Err(_) => item,
        });
    }

    let mut file = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("Cannot create {}", output.display()))?;
    let written = write_stream(create_zip(stream::iter(items), options), &mut file).await?;
    info!("wrote {} ({})", output.display(), format_size(written));
    Ok(())
}

/// Archive name for a local path: relative, `/`-separated.
fn entry_name(path: &Path) -> Result<String> {
    let parts: Vec<_> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        bail!("Cannot derive an entry name from {}", path.display());
    }
    Ok(parts.join("/"))
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
