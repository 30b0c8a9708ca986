use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use cabfile::lvfs::{compare_versions, LvfsCabinet};
use cabfile::{Cabinet, CompressionType, FileEntry, FolderEntry};
use clap::{Parser, Subcommand};

// ========================================================================= //

/// Inspects CAB files.
#[derive(Parser)]
#[command(name = "cabtool", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Concatenates and prints files from the cabinet
    Cat {
        cab: PathBuf,
        files: Vec<String>,
    },
    /// Lists files in the cabinet
    Ls {
        /// Lists in long format
        #[arg(short, long)]
        long: bool,
        cab: PathBuf,
    },
    /// Reads every file in order, printing its name, size and mtime
    Walk { cab: PathBuf },
    /// Prints the component ID and version of an LVFS firmware cabinet
    Lvfs { cab: PathBuf },
    /// Compares the firmware versions of two LVFS cabinets
    Compare { first: PathBuf, second: PathBuf },
}

fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Command::Cat { cab, files } => {
            let mut cabinet = open_cab(&cab)?;
            let mut stdout = io::stdout().lock();
            for name in files {
                let data = cabinet
                    .content(&name)
                    .with_context(|| format!("reading {}", name))?;
                stdout.write_all(&data)?;
            }
        }
        Command::Ls { long, cab } => {
            let cabinet = open_cab(&cab)?;
            for folder in cabinet.folder_entries() {
                for file in folder.file_entries() {
                    list_file(&folder, file, long);
                }
            }
        }
        Command::Walk { cab } => {
            let mut cabinet = open_cab(&cab)?;
            cabinet.entries().for_each_file(|info, data| {
                let mtime = match info.modified() {
                    Some(time) => time.to_string(),
                    None => "invalid datetime".to_string(),
                };
                println!(
                    "{:o} {:>10} {} {}",
                    info.mode(),
                    data.len(),
                    mtime,
                    info.name()
                );
                Ok(())
            })?;
        }
        Command::Lvfs { cab } => {
            let cabinet = open_lvfs(&cab)?;
            println!("{} {}", cabinet.id(), cabinet.version());
        }
        Command::Compare { first, second } => {
            let first = open_lvfs(&first)?;
            let second = open_lvfs(&second)?;
            if first.id() != second.id() {
                anyhow::bail!(
                    "cabinets hold different components: {} and {}",
                    first.id(),
                    second.id()
                );
            }
            let relation = match compare_versions(first.version(), second.version())
            {
                Ordering::Less => "older than",
                Ordering::Equal => "the same as",
                Ordering::Greater => "newer than",
            };
            println!("{} is {} {}", first.version(), relation, second.version());
        }
    }
    Ok(())
}

// ========================================================================= //

fn list_file(folder: &FolderEntry, file: &FileEntry, long: bool) {
    if !long {
        println!("{}", file.name());
        return;
    }
    let ctype = match folder.compression_type() {
        CompressionType::None => "None",
        CompressionType::MsZip => "MsZip",
    };
    let file_size = if file.uncompressed_size() >= 100_000_000 {
        format!("{} MB", file.uncompressed_size() / (1 << 20))
    } else if file.uncompressed_size() >= 1_000_000 {
        format!("{} kB", file.uncompressed_size() / (1 << 10))
    } else {
        format!("{} B ", file.uncompressed_size())
    };
    let datetime = file
        .datetime()
        .map(|dt| dt.to_string())
        .unwrap_or_else(|| "invalid datetime".to_string());
    println!(
        "{}{}{}{}{}{} {:>2} {:<5} {:>10} {} {}",
        if file.is_read_only() { 'R' } else { '-' },
        if file.is_hidden() { 'H' } else { '-' },
        if file.is_system() { 'S' } else { '-' },
        if file.is_archive() { 'A' } else { '-' },
        if file.is_exec() { 'E' } else { '-' },
        if file.is_name_utf() { 'U' } else { '-' },
        folder.index(),
        ctype,
        file_size,
        datetime,
        file.name()
    );
}

fn open_cab(path: &Path) -> anyhow::Result<Cabinet<BufReader<File>>> {
    let file = File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    Cabinet::new(BufReader::new(file))
        .with_context(|| format!("reading {}", path.display()))
}

fn open_lvfs(path: &Path) -> anyhow::Result<LvfsCabinet<BufReader<File>>> {
    let file = File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    LvfsCabinet::open(BufReader::new(file))
        .with_context(|| format!("reading {}", path.display()))
}

// ========================================================================= //
