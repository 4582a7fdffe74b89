//! Command-line surface.
//!
//! An invocation is one or more command segments separated by `--`:
//!
//! ```text
//! imgpipe -i in.jpg -o out/ resize 300 -- rotate 90 -- sharpen
//! ```
//!
//! Every segment is parsed on its own against [`Cli`]. Global flags may
//! appear in any segment and are merged; each segment's command handler
//! runs as soon as that segment has been parsed, so operations are queued
//! in argv order.

use crate::commands::{Command, Enqueue};
use crate::constants::{
    COMMAND_SEPARATOR, MAX_COMPRESSION_LEVEL, MAX_EFFORT, MAX_QUALITY, MIN_QUALITY,
};
use crate::error::PipelineError;
use crate::formats::FormatChoice;
use crate::queue::OperationQueue;
use clap::error::ErrorKind;
use clap::{Args, Parser};
use std::ffi::OsString;
use std::iter;

const BIN_NAME: &str = "imgpipe";

#[derive(Parser, Debug)]
#[command(
    name = "imgpipe",
    version,
    about = "Chainable image processing pipelines for the command line",
    long_about = "imgpipe decodes images, applies a chain of transformations and encodes the \
                  result. Commands are chained with '--'; every input is processed by the \
                  same chain, in parallel. Without --input an image is read from stdin and \
                  written to stdout.",
    after_help = "EXAMPLES:\n  \
    imgpipe -i photo.jpg -o thumbs/ resize 300 300 --fit inside\n  \
    imgpipe -i 'raw/*.png' -o '{dir}/{name}-small.webp' resize 800 -- sharpen\n  \
    imgpipe -i scan.tiff -o scan.jpg -q 90 rotate 90 -- grayscale\n  \
    cat in.png | imgpipe -f webp flip > out.webp"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Flags that configure the whole invocation rather than one command.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct GlobalArgs {
    #[arg(
        short = 'i',
        long = "input",
        global = true,
        value_name = "PATH",
        help = "Input file, directory or quoted glob (repeatable)",
        long_help = "Input image path. May be a file, a directory or a quoted glob such as \
                     'photos/*.jpg'. Repeat the flag for several inputs. Without any input \
                     the image is read from stdin."
    )]
    pub input: Vec<String>,

    #[arg(
        short = 'o',
        long,
        global = true,
        value_name = "PATH",
        help = "Output file, directory or template",
        long_help = "Where to write results. A path containing '{' is a template with the \
                     placeholders {root}, {dir}, {base}, {name} and {ext}. An existing \
                     directory, or a path ending in a separator, receives one file per input. \
                     Anything else is a single output file."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'f',
        long,
        global = true,
        help = "Output format (jpeg, png, webp, avif, gif, tiff, bmp or input)",
        long_help = "Force the output format. 'input' keeps the format of each source; \
                     otherwise the output extension decides."
    )]
    pub format: Option<FormatChoice>,

    #[arg(
        short = 'q',
        long,
        global = true,
        value_parser = clap::value_parser!(u8).range(MIN_QUALITY as i64..=MAX_QUALITY as i64),
        help = "Quality for lossy encoders (1-100, default: 80)"
    )]
    pub quality: Option<u8>,

    #[arg(
        long,
        global = true,
        help = "Progressive (JPEG) or interlaced (PNG) output"
    )]
    pub progressive: bool,

    #[arg(
        long,
        global = true,
        value_parser = clap::value_parser!(u8).range(0..=MAX_COMPRESSION_LEVEL as i64),
        help = "PNG compression level (0-9, default: 6)",
        long_help = "zlib-style PNG compression level. 0 skips optimisation, 9 uses Zopfli."
    )]
    pub compression_level: Option<u8>,

    #[arg(
        long,
        global = true,
        value_parser = clap::value_parser!(u8).range(0..=MAX_EFFORT as i64),
        help = "CPU effort for AVIF encoding (0-9, default: 4)"
    )]
    pub effort: Option<u8>,

    #[arg(
        long,
        global = true,
        value_name = "PIXELS",
        help = "Refuse inputs with more pixels than this (0 disables the check)"
    )]
    pub limit_input_pixels: Option<u64>,

    #[arg(
        long,
        global = true,
        help = "Copy EXIF and ICC metadata from the input"
    )]
    pub with_metadata: bool,

    #[arg(
        short = 'r',
        long,
        global = true,
        help = "Walk input directories recursively"
    )]
    pub recursive: bool,

    #[arg(
        short = 'j',
        long,
        global = true,
        help = "Number of parallel threads (default: auto)"
    )]
    pub threads: Option<usize>,

    #[arg(long, global = true, help = "Only report errors")]
    pub quiet: bool,

    #[arg(short = 'v', long, global = true, help = "Verbose output")]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Folds the flags of a later segment into `self`. Inputs accumulate,
    /// later values win, switches stay on once set.
    pub fn merge(&mut self, later: GlobalArgs) {
        self.input.extend(later.input);
        self.output = later.output.or(self.output.take());
        self.format = later.format.or(self.format);
        self.quality = later.quality.or(self.quality);
        self.progressive |= later.progressive;
        self.compression_level = later.compression_level.or(self.compression_level);
        self.effort = later.effort.or(self.effort);
        self.limit_input_pixels = later.limit_input_pixels.or(self.limit_input_pixels);
        self.with_metadata |= later.with_metadata;
        self.recursive |= later.recursive;
        self.threads = later.threads.or(self.threads);
        self.quiet |= later.quiet;
        self.verbose |= later.verbose;
    }
}

/// The parsed invocation: merged global flags and the command operations
/// queued so far.
#[derive(Debug)]
pub struct Invocation {
    pub global: GlobalArgs,
    pub queue: OperationQueue,
}

/// Splits argv (without the binary name) on the command separator. Empty
/// segments are dropped.
pub fn split_segments<I>(args: I) -> Vec<Vec<OsString>>
where
    I: IntoIterator<Item = OsString>,
{
    let mut segments = vec![Vec::new()];
    for arg in args {
        if arg == COMMAND_SEPARATOR {
            segments.push(Vec::new());
        } else if let Some(current) = segments.last_mut() {
            current.push(arg);
        }
    }
    segments.retain(|segment| !segment.is_empty());
    segments
}

/// Parses every segment and runs its command handler.
///
/// `--help` and `--version` surface as the original [`clap::Error`] so the
/// caller can print them; every other parse failure becomes
/// [`PipelineError::Argument`].
pub fn parse_invocation<I, T>(argv: I) -> anyhow::Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut argv = argv.into_iter().map(Into::into);
    let bin = argv.next().unwrap_or_else(|| OsString::from(BIN_NAME));

    let mut global = GlobalArgs::default();
    let mut queue = OperationQueue::new();

    for segment in split_segments(argv) {
        let cli = Cli::try_parse_from(iter::once(bin.clone()).chain(segment))
            .map_err(argument_error)?;
        global.merge(cli.global);
        if let Some(command) = cli.command {
            command.enqueue(&mut queue)?;
        }
    }

    Ok(Invocation { global, queue })
}

fn argument_error(err: clap::Error) -> anyhow::Error {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.into(),
        _ => {
            let rendered = err.to_string();
            let first = rendered.lines().next().unwrap_or_default();
            let message = first.strip_prefix("error: ").unwrap_or(first).trim();
            PipelineError::Argument(message.to_string()).into()
        }
    }
}
