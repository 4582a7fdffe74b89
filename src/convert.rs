//! Batch and stream conversion.
//!
//! Both modes replay one [`Plan`] onto a fresh [`ImageHandle`] per input.
//! Batch mode converts every input in parallel with rayon; stream mode
//! reads one image from a reader and writes it to a writer.

use crate::constants::{PROGRESS_BAR_TEMPLATE, SUPPORTED_IMAGE_EXTENSIONS};
use crate::engine::{ImageHandle, RenderInfo};
use crate::error::{PipelineError, Result};
use crate::logger;
use crate::queue::Plan;
use crate::template::OutputTarget;
use glob::glob;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The outcome of converting one input.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    /// Input file, `None` in stream mode
    pub source: Option<PathBuf>,
    /// Written file, `None` when the result went to a writer
    pub destination: Option<PathBuf>,
    pub info: RenderInfo,
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Expands `--input` values into image files, keeping argument order.
///
/// Plain files are taken as given, whatever their extension. Directories
/// are walked (top level only unless `recursive`) for image extensions,
/// skipping hidden entries. Glob patterns are expanded. A value that
/// matches nothing is an error.
pub fn collect_inputs(patterns: &[String], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        let path = Path::new(pattern);
        let before = files.len();

        if path.is_file() {
            files.push(path.to_path_buf());
        } else if path.is_dir() {
            let walker = if recursive {
                WalkDir::new(path)
            } else {
                WalkDir::new(path).max_depth(1)
            };
            let mut found = Vec::new();
            for entry in walker
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
            {
                let entry = entry?;
                if entry.file_type().is_file() && is_image_file(entry.path()) {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            files.extend(found);
        } else if has_glob_meta(pattern) {
            let entries = glob(pattern).map_err(|e| {
                PipelineError::Argument(format!("invalid glob pattern {:?}: {}", pattern, e))
            })?;
            for entry in entries.flatten() {
                if entry.is_file() && is_image_file(&entry) {
                    files.push(entry);
                }
            }
        } else {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }

        if files.len() == before {
            return Err(PipelineError::NoInputFilesFound(pattern.clone()));
        }
    }

    log::debug!("collected {} input file(s)", files.len());
    Ok(files)
}

fn progress_bar(len: usize) -> ProgressBar {
    if logger::is_quiet() || len < 2 {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::with_draw_target(Some(len as u64), ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::with_template(PROGRESS_BAR_TEMPLATE) {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}

/// Converts every input to its destination under `target`.
///
/// All destinations are computed before any work starts. Conversions run
/// in parallel; results keep input order and the first failure, in input
/// order, fails the batch.
pub fn convert_files(
    inputs: &[PathBuf],
    target: &OutputTarget,
    plan: &Plan,
) -> Result<Vec<ConversionResult>> {
    if inputs.len() > 1 {
        if let OutputTarget::File(path) = target {
            return Err(PipelineError::AmbiguousOutput(inputs.len(), path.clone()));
        }
    }

    let destinations = target.destinations(inputs, plan.output_format())?;
    log::debug!(
        "converting {} input(s) with plan [{}]",
        inputs.len(),
        plan.labels().join(", ")
    );

    let progress = progress_bar(inputs.len());
    let results: Vec<Result<ConversionResult>> = inputs
        .par_iter()
        .zip(destinations.par_iter())
        .map(|(source, destination)| {
            let result = convert_one(source, destination, plan);
            progress.inc(1);
            if let Err(e) = &result {
                log::debug!("failed to convert {}: {}", source.display(), e);
            }
            result
        })
        .collect();
    progress.finish_and_clear();

    results.into_iter().collect()
}

fn convert_one(source: &Path, destination: &Path, plan: &Plan) -> Result<ConversionResult> {
    let handle = plan.replay(ImageHandle::from_path(source))?;

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|_| PipelineError::DirectoryCreationFailed(parent.to_path_buf()))?;
    }

    let info = handle.render_to_file(destination)?;
    log::info!(
        "{} -> {} ({})",
        source.display(),
        destination.display(),
        info
    );

    Ok(ConversionResult {
        source: Some(source.to_path_buf()),
        destination: Some(destination.to_path_buf()),
        info,
    })
}

/// Reads one image from `input`, replays `plan` and writes the result to
/// `output`.
pub fn convert_stream<R: Read, W: Write>(
    mut input: R,
    output: W,
    plan: &Plan,
) -> Result<ConversionResult> {
    let mut data = Vec::new();
    input.read_to_end(&mut data)?;
    if data.is_empty() {
        return Err(PipelineError::MissingInput);
    }

    let handle = plan.replay(ImageHandle::from_bytes(data))?;
    let info = handle.render_to_writer(output)?;
    log::info!("stream -> stdout ({})", info);

    Ok(ConversionResult {
        source: None,
        destination: None,
        info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::OutputFormat;
    use crate::operation::{Operation, ResizeOptions};
    use crate::queue::OperationQueue;
    use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
        DynamicImage::ImageRgb8(img).save(path).unwrap();
    }

    fn plan(operations: Vec<Operation>) -> Plan {
        let mut queue = OperationQueue::new();
        for operation in operations {
            queue.push(operation);
        }
        queue.take_plan()
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a.JPG")));
        assert!(is_image_file(Path::new("a.webp")));
        assert!(!is_image_file(Path::new("a.txt")));
        assert!(!is_image_file(Path::new("noext")));
    }

    #[test]
    fn test_collect_inputs_walks_directories() {
        let temp = TempDir::new().unwrap();
        write_png(&temp.path().join("b.png"), 2, 2);
        write_png(&temp.path().join("a.png"), 2, 2);
        fs::write(temp.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        write_png(&temp.path().join("nested").join("c.png"), 2, 2);
        write_png(&temp.path().join(".hidden.png"), 2, 2);

        let dir = temp.path().to_string_lossy().into_owned();
        let flat = collect_inputs(&[dir.clone()], false).unwrap();
        let names: Vec<_> = flat
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);

        let deep = collect_inputs(&[dir], true).unwrap();
        assert_eq!(deep.len(), 3);
    }

    #[test]
    fn test_collect_inputs_expands_globs() {
        let temp = TempDir::new().unwrap();
        write_png(&temp.path().join("one.png"), 2, 2);
        write_png(&temp.path().join("two.png"), 2, 2);
        let pattern = temp.path().join("*.png").to_string_lossy().into_owned();

        assert_eq!(collect_inputs(&[pattern], false).unwrap().len(), 2);
    }

    #[test]
    fn test_collect_inputs_errors() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.png").to_string_lossy().into_owned();
        assert!(matches!(
            collect_inputs(&[missing], false),
            Err(PipelineError::FileNotFound(_))
        ));

        let empty_glob = temp.path().join("*.jpg").to_string_lossy().into_owned();
        assert!(matches!(
            collect_inputs(&[empty_glob], false),
            Err(PipelineError::NoInputFilesFound(_))
        ));
    }

    #[test]
    fn test_convert_files_rejects_file_target_for_many_inputs() {
        let temp = TempDir::new().unwrap();
        let inputs = vec![temp.path().join("a.png"), temp.path().join("b.png")];
        let target = OutputTarget::File(temp.path().join("out.png"));

        let result = convert_files(&inputs, &target, &Plan::default());
        assert!(matches!(result, Err(PipelineError::AmbiguousOutput(2, _))));
        // nothing was read or written
        assert!(!temp.path().join("out.png").exists());
    }

    #[test]
    fn test_convert_files_to_directory() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("photo.png");
        write_png(&input, 40, 20);
        let out_dir = temp.path().join("out").join("nested");

        let plan = plan(vec![
            Operation::Format(OutputFormat::Jpeg),
            Operation::Resize(ResizeOptions {
                width: Some(10),
                ..Default::default()
            }),
        ]);
        let results = convert_files(
            &[input.clone()],
            &OutputTarget::Directory(out_dir.clone()),
            &plan,
        )
        .unwrap();

        assert_eq!(results.len(), 1);
        let destination = results[0].destination.clone().unwrap();
        assert_eq!(destination, out_dir.join("photo.jpg"));
        assert_eq!(results[0].source.as_deref(), Some(input.as_path()));
        assert_eq!(results[0].info.format, OutputFormat::Jpeg);
        assert_eq!((results[0].info.width, results[0].info.height), (10, 5));

        let written = image::open(&destination).unwrap();
        assert_eq!(written.dimensions(), (10, 5));
    }

    #[test]
    fn test_same_input_twice_gets_distinct_destinations() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("dup.png");
        write_png(&input, 4, 4);
        let out_dir = temp.path().join("out");

        let results = convert_files(
            &[input.clone(), input.clone()],
            &OutputTarget::Directory(out_dir.clone()),
            &plan(vec![Operation::Flip]),
        )
        .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, results[1].source);
        assert_ne!(results[0].destination, results[1].destination);
        assert!(out_dir.join("dup.png").exists());
        assert!(out_dir.join("dup-1.png").exists());
    }

    #[test]
    fn test_convert_files_first_error_fails_batch() {
        let temp = TempDir::new().unwrap();
        let good = temp.path().join("good.png");
        write_png(&good, 4, 4);
        let bad = temp.path().join("bad.png");
        fs::write(&bad, b"definitely not a png").unwrap();

        let result = convert_files(
            &[good, bad],
            &OutputTarget::Directory(temp.path().join("out")),
            &Plan::default(),
        );
        assert!(matches!(result, Err(PipelineError::Image(_))));
    }

    #[test]
    fn test_convert_stream_flips_and_keeps_format() {
        let img = RgbImage::from_fn(3, 1, |x, _| Rgb([x as u8 * 100, 0, 0]));
        let mut input = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut input), image::ImageFormat::Png)
            .unwrap();

        let mut output = Vec::new();
        let result = convert_stream(
            Cursor::new(input),
            &mut output,
            &plan(vec![Operation::Flop]),
        )
        .unwrap();

        assert_eq!(result.destination, None);
        assert_eq!(result.source, None);
        assert_eq!(result.info.format, OutputFormat::Png);
        assert_eq!(result.info.size, output.len() as u64);

        let decoded = image::load_from_memory(&output).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([200, 0, 0]));
    }

    #[test]
    fn test_convert_stream_empty_input() {
        let mut output = Vec::new();
        let result = convert_stream(Cursor::new(Vec::new()), &mut output, &Plan::default());
        assert!(matches!(result, Err(PipelineError::MissingInput)));
    }
}
