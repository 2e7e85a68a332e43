//! spanio CLI - inspect and read layered byte streams
//!
//! Joins file ranges and zero-filled holes into one virtual stream, and reads
//! files through concurrent substreams of a shared stream.

mod layout;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use layout::{build_stream, PartArg};
use spanio_core::{
    bytes_to_binary_unit, bytes_to_decimal_bit_unit, hex_dump, IoStream, PositionedSource,
};
use spanio_pipeline::{open_source, PartKind, SharedConfig, SharedStream, SourceConfig, Substream};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "spanio")]
#[command(about = "Layered random-access byte streams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Memory-map input files instead of reading them
    #[arg(long, env = "SPANIO_MMAP", global = true)]
    mmap: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Show the layout and length of a virtual stream
    Info {
        /// Parts in order: PATH[:START[:LENGTH]] or hole:LENGTH
        #[arg(required = true)]
        parts: Vec<PartArg>,

        /// Zero bytes before the first part
        #[arg(long, default_value = "0")]
        lead_hole: u64,

        /// Print the layout as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a virtual stream to a file or stdout
    Cat {
        /// Parts in order: PATH[:START[:LENGTH]] or hole:LENGTH
        #[arg(required = true)]
        parts: Vec<PartArg>,

        /// Zero bytes before the first part
        #[arg(long, default_value = "0")]
        lead_hole: u64,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Hex dump a range of a file, read through concurrent substreams
    Dump {
        /// File to read
        file: PathBuf,

        /// First byte of the range
        #[arg(long, default_value = "0")]
        offset: u64,

        /// Bytes to dump
        #[arg(long, default_value = "256")]
        length: u64,

        /// Number of concurrent readers
        #[arg(long, default_value = "1")]
        readers: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `cat` output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let config = SourceConfig { use_mmap: cli.mmap };

    match cli.command {
        Command::Info {
            parts,
            lead_hole,
            json,
        } => cmd_info(&parts, lead_hole, json, &config),
        Command::Cat {
            parts,
            lead_hole,
            output,
        } => cmd_cat(&parts, lead_hole, output, &config),
        Command::Dump {
            file,
            offset,
            length,
            readers,
        } => cmd_dump(file, offset, length, readers, &config),
    }
}

fn cmd_info(parts: &[PartArg], lead_hole: u64, json: bool, config: &SourceConfig) -> Result<()> {
    let mut stream = build_stream(parts, lead_hole, config)?;
    let length = stream.length()?;
    let layout = stream.parts();
    stream.close()?;

    if json {
        let report = serde_json::json!({
            "length": length,
            "parts": layout,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== Stream Layout ===");
    println!("Parts:  {}", layout.len());
    println!("Length: {} bytes ({})", length, bytes_to_binary_unit(length, 2));
    println!();
    println!("{:<4} {:<5} {:>16} {:>16} {:>16}", "#", "Kind", "Virtual", "Source", "Length");
    for part in &layout {
        let kind = match part.kind {
            PartKind::Data => "data",
            PartKind::Hole => "hole",
        };
        println!(
            "{:<4} {:<5} {:>#16x} {:>#16x} {:>16}",
            part.index, kind, part.virtual_start, part.source_start, part.length
        );
    }

    Ok(())
}

fn cmd_cat(
    parts: &[PartArg],
    lead_hole: u64,
    output: Option<PathBuf>,
    config: &SourceConfig,
) -> Result<()> {
    let stream = build_stream(parts, lead_hole, config)?;
    let mut reader = IoStream::new(stream);

    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let started = Instant::now();
    let copied = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;

    let elapsed = started.elapsed().as_secs_f64();
    let rate = if elapsed > 0.0 { (copied as f64 / elapsed) as u64 } else { copied };
    tracing::info!(
        "Wrote {} in {:.2}s ({}/s)",
        bytes_to_binary_unit(copied, 2),
        elapsed,
        bytes_to_decimal_bit_unit(rate, 1)
    );

    reader.get_mut().close()?;
    Ok(())
}

fn cmd_dump(
    file: PathBuf,
    offset: u64,
    length: u64,
    readers: usize,
    config: &SourceConfig,
) -> Result<()> {
    if readers == 0 {
        bail!("--readers must be at least 1");
    }

    let source = open_source(&file, config)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let shared = Arc::new(SharedStream::with_config(source, SharedConfig::from_env()));

    let result = dump_range(&shared, offset, length, readers);
    shared.close()?;
    let data = result?;

    println!("=== {} ===", file.display());
    println!(
        "Range: {:#x}..{:#x} ({})",
        offset,
        offset + data.len() as u64,
        bytes_to_binary_unit(data.len() as u64, 2)
    );
    print!("{}", hex_dump(&data, offset));
    Ok(())
}

/// Read `offset..offset+length` (clamped to the end) with `readers` substreams
/// in parallel, each filling its own slice of the output
fn dump_range(
    shared: &Arc<SharedStream>,
    offset: u64,
    length: u64,
    readers: usize,
) -> Result<Vec<u8>> {
    let available = shared.length()?.saturating_sub(offset);
    let length = usize::try_from(length.min(available)).context("range too large")?;
    let mut data = vec![0u8; length];
    if length == 0 {
        return Ok(data);
    }

    let chunk_size = length.div_ceil(readers);
    std::thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::new();
        for (index, chunk) in data.chunks_mut(chunk_size).enumerate() {
            let mut sub = Substream::new(Arc::clone(shared))?;
            let start = offset + (index * chunk_size) as u64;
            handles.push(scope.spawn(move || -> Result<()> {
                let id = sub.referrer();
                tracing::debug!("Reader {} at {:#x} ({} bytes)", id, start, chunk.len());
                let read = sub.seek(start).and_then(|()| sub.read_fully(chunk));
                sub.close()?;
                Ok(read?)
            }));
        }

        for handle in handles {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => bail!("reader thread panicked"),
            }
        }
        Ok(())
    })?;

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spanio_core::IoSource;
    use std::io::Cursor;

    #[test]
    fn test_cli_parses_parts() {
        let args = ["spanio", "info", "a.img:512", "hole:0x200", "--json"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Info { parts, lead_hole, json } => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[1], PartArg::Hole { length: 512 });
                assert_eq!(lead_hole, 0);
                assert!(json);
            }
            _ => panic!("expected info"),
        }
        assert!(Cli::try_parse_from(["spanio", "info"]).is_err());
    }

    #[test]
    fn test_dump_range_with_several_readers() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let shared = Arc::new(SharedStream::new(IoSource::new(Cursor::new(data.clone()))));

        let out = dump_range(&shared, 100, 333, 4).unwrap();
        assert_eq!(&out[..], &data[100..433]);
        assert_eq!(shared.ref_count().unwrap(), 1);

        // Clamped at the end of the stream
        let out = dump_range(&shared, 990, 100, 3).unwrap();
        assert_eq!(&out[..], &data[990..]);
        assert!(dump_range(&shared, 2000, 16, 2).unwrap().is_empty());

        shared.close().unwrap();
        assert!(shared.is_released().unwrap());
    }
}
