use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use dmlcap_dml::{Catalog, ErrorPolicy};
use dmlcap_frame::FrameReader;
use dmlcap_pipeline::{ReadErrorPolicy, DEFAULT_QUEUE_CAPACITY};

use crate::exit::{catalog_error, io_error, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod frames;
pub mod services;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a capture into one JSON object per message.
    Decode(DecodeArgs),
    /// List the frames in a capture.
    Frames(FramesArgs),
    /// List the message kinds defined by service definition files.
    Services(ServicesArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args),
        Command::Frames(args) => frames::run(args, format),
        Command::Services(args) => services::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Directories of `*.service.json` definitions.
#[derive(Args, Debug)]
pub struct ServiceDirs {
    /// Directory of `*.service.json` definitions (repeatable).
    #[arg(
        long = "services",
        value_name = "DIR",
        env = "DMLCAP_SERVICES",
        value_delimiter = ','
    )]
    pub dirs: Vec<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PolicyArg {
    Fail,
    Skip,
}

impl From<PolicyArg> for ErrorPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Fail => ErrorPolicy::Fail,
            PolicyArg::Skip => ErrorPolicy::Skip,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ReadErrorArg {
    Fail,
    Truncate,
}

impl From<ReadErrorArg> for ReadErrorPolicy {
    fn from(arg: ReadErrorArg) -> Self {
        match arg {
            ReadErrorArg::Fail => ReadErrorPolicy::Propagate,
            ReadErrorArg::Truncate => ReadErrorPolicy::Truncate,
        }
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file to decode.
    pub input: PathBuf,
    /// Write messages here instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub services: ServiceDirs,
    /// Read frames on a separate thread while decoding.
    #[arg(long)]
    pub pipelined: bool,
    /// Frames buffered between reader and decoder in pipelined mode.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    /// What to do with messages no service defines.
    #[arg(long, value_enum, value_name = "POLICY", default_value = "fail")]
    pub on_unknown: PolicyArg,
    /// What to do with envelopes or records that fail to decode.
    #[arg(long, value_enum, value_name = "POLICY", default_value = "fail")]
    pub on_malformed: PolicyArg,
    /// What to do when the capture ends mid-frame or is corrupt.
    #[arg(long, value_enum, value_name = "POLICY", default_value = "fail")]
    pub on_read_error: ReadErrorArg,
    /// One message per line instead of indented JSON.
    #[arg(long)]
    pub compact: bool,
}

#[derive(Args, Debug)]
pub struct FramesArgs {
    /// Capture file to list.
    pub input: PathBuf,
    /// Stop after this many listed frames.
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
    /// Hide control frames.
    #[arg(long)]
    pub data_only: bool,
}

#[derive(Args, Debug)]
pub struct ServicesArgs {
    #[command(flatten)]
    pub services: ServiceDirs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Include build and feature details.
    #[arg(long)]
    pub extended: bool,
}

/// Open a capture for buffered frame reading.
pub(crate) fn open_capture(path: &Path) -> CliResult<FrameReader<BufReader<File>>> {
    let file = File::open(path)
        .map_err(|err| io_error(&format!("cannot open capture {}", path.display()), err))?;
    Ok(FrameReader::new(BufReader::new(file)))
}

/// Load and merge the definitions found in every directory.
pub(crate) fn load_catalog(dirs: &ServiceDirs) -> CliResult<Catalog> {
    let mut catalog = Catalog::new();
    for dir in &dirs.dirs {
        let loaded = Catalog::from_directory(dir)
            .map_err(|err| catalog_error(&format!("loading {}", dir.display()), err))?;
        for definition in loaded.services() {
            catalog
                .add(definition.clone())
                .map_err(|err| catalog_error(&format!("loading {}", dir.display()), err))?;
        }
    }

    if catalog.is_empty() {
        tracing::warn!("no service definitions loaded; every data frame is an unknown message");
    } else {
        tracing::debug!(services = catalog.len(), "service catalog ready");
    }
    Ok(catalog)
}
