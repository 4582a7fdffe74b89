//! Invocation orchestration.
//!
//! `run` moves through parsing, global option resolution, conversion
//! (batch or stream) and reporting. Only reporting decides what is printed
//! and which exit code the process ends with.

use crate::cli::{parse_invocation, Invocation};
use crate::constants::{ERROR_PREFIX, HINT_PREFIX};
use crate::convert::{collect_inputs, convert_files, convert_stream, ConversionResult};
use crate::error::PipelineError;
use crate::logger;
use crate::options::{resolve_global_options, Mode};
use anyhow::Context;
use clap::error::ErrorKind;
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::process::ExitCode;

/// What a successful invocation produced.
#[derive(Debug)]
pub enum Outcome {
    Files(Vec<ConversionResult>),
    Stream(ConversionResult),
}

/// Runs one invocation end to end and reports the result.
pub fn run<I, T>(argv: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let stdin_is_terminal = io::stdin().is_terminal();
    match execute(argv, stdin_is_terminal) {
        Ok(outcome) => report_success(&outcome),
        Err(err) => report_failure(&err),
    }
}

/// Parses, resolves and converts. Stream mode reads stdin and writes
/// stdout; batch mode only touches the filesystem.
pub fn execute<I, T>(argv: I, stdin_is_terminal: bool) -> anyhow::Result<Outcome>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let Invocation { global, mut queue } = parse_invocation(argv)?;
    logger::init(global.quiet, global.verbose);

    let inputs = collect_inputs(&global.input, global.recursive)?;
    let mode = resolve_global_options(&global, inputs.len(), stdin_is_terminal, &mut queue)?;
    let plan = queue.take_plan();
    log::debug!("plan: [{}]", plan.labels().join(", "));

    match mode {
        Mode::Batch(target) => {
            let results = match global.threads {
                Some(threads) => rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .context("failed to build thread pool")?
                    .install(|| convert_files(&inputs, &target, &plan))?,
                None => convert_files(&inputs, &target, &plan)?,
            };
            Ok(Outcome::Files(results))
        }
        Mode::Stream => {
            let stdin = io::stdin().lock();
            let stdout = io::stdout().lock();
            Ok(Outcome::Stream(convert_stream(stdin, stdout, &plan)?))
        }
    }
}

fn report_success(outcome: &Outcome) -> ExitCode {
    match outcome {
        Outcome::Files(results) => {
            for result in results {
                if let Some(destination) = &result.destination {
                    println!("{}", destination.display());
                }
                log::info!("{}", result.info);
            }
        }
        // stdout carries the image itself
        Outcome::Stream(result) => log::info!("{}", result.info),
    }
    ExitCode::SUCCESS
}

/// Whether `err` came from how the tool was invoked rather than from
/// processing.
pub fn is_usage_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<PipelineError>()
        .map(PipelineError::is_usage)
        .unwrap_or(false)
}

fn report_failure(err: &anyhow::Error) -> ExitCode {
    if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
        if matches!(
            clap_err.kind(),
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
        ) {
            if clap_err.print().is_err() {
                return ExitCode::FAILURE;
            }
            return ExitCode::SUCCESS;
        }
    }

    // The logger may not be installed yet, so failures go straight to stderr.
    match err.downcast_ref::<PipelineError>() {
        // PipelineError messages already embed their source
        Some(pipeline_err) => eprintln!("{} {}", ERROR_PREFIX, pipeline_err),
        None => eprintln!("{} {:#}", ERROR_PREFIX, err),
    }
    if is_usage_error(err) {
        eprintln!("{} Use --help for usage information", HINT_PREFIX);
    }
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::OutputFormat;
    use bytes::Bytes;
    use image::{DynamicImage, RgbImage};
    use img_parts::png::Png;
    use img_parts::ImageEXIF;
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_png(path: &Path) {
        DynamicImage::ImageRgb8(RgbImage::new(8, 6)).save(path).unwrap();
    }

    fn args(path: &Path, rest: &[&str]) -> Vec<OsString> {
        let mut argv = vec![OsString::from("imgpipe"), "-i".into(), path.into()];
        argv.extend(rest.iter().map(OsString::from));
        argv
    }

    #[test]
    fn test_execute_batch_single_file() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in.png");
        write_png(&input);
        let output = temp.path().join("out.webp");

        let outcome = execute(
            args(&input, &["-o", output.to_str().unwrap(), "rotate", "90"]),
            true,
        )
        .unwrap();

        match outcome {
            Outcome::Files(results) => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].info.format, OutputFormat::WebP);
                assert_eq!((results[0].info.width, results[0].info.height), (6, 8));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(output.exists());
    }

    fn write_png_with_exif(path: &Path) {
        let mut raw = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(8, 6))
            .write_to(&mut Cursor::new(&mut raw), image::ImageFormat::Png)
            .unwrap();
        let mut png = Png::from_bytes(Bytes::from(raw)).unwrap();
        png.set_exif(Some(Bytes::from_static(b"MM\x00\x2a\x00\x00\x00\x08\x00\x00")));
        let mut file = std::fs::File::create(path).unwrap();
        png.encoder().write_to(&mut file).unwrap();
    }

    fn output_exif(path: &Path) -> Option<Bytes> {
        let bytes = std::fs::read(path).unwrap();
        Png::from_bytes(Bytes::from(bytes)).unwrap().exif()
    }

    #[test]
    fn test_execute_with_metadata_keeps_exif() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in.png");
        write_png_with_exif(&input);
        let kept = temp.path().join("kept.png");
        let stripped = temp.path().join("stripped.png");

        execute(
            args(&input, &["-o", kept.to_str().unwrap(), "--with-metadata", "flip"]),
            true,
        )
        .unwrap();
        execute(args(&input, &["-o", stripped.to_str().unwrap(), "flip"]), true).unwrap();

        assert!(output_exif(&kept).is_some());
        assert!(output_exif(&stripped).is_none());
    }

    #[test]
    fn test_execute_with_thread_pool() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in.png");
        write_png(&input);
        let out_dir = format!("{}/", temp.path().join("out").display());

        let outcome = execute(args(&input, &["-o", &out_dir, "-j", "2", "negate"]), true).unwrap();
        assert!(matches!(outcome, Outcome::Files(ref r) if r.len() == 1));
    }

    #[test]
    fn test_missing_output_is_usage_error() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in.png");
        write_png(&input);

        let err = execute(args(&input, &["flip"]), true).unwrap_err();
        assert!(is_usage_error(&err));
    }

    #[test]
    fn test_no_input_on_terminal_is_usage_error() {
        let err = execute(["imgpipe", "flip"], true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingInput)
        ));
        assert!(is_usage_error(&err));
    }

    #[test]
    fn test_decode_failure_is_not_usage_error() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("broken.png");
        std::fs::write(&input, b"nope").unwrap();
        let output = temp.path().join("out.png");

        let err = execute(args(&input, &["-o", output.to_str().unwrap()]), true).unwrap_err();
        assert!(!is_usage_error(&err));
    }
}
