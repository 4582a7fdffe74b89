//! Output destinations: single files, directories and path templates.

use crate::error::{PipelineError, Result};
use crate::formats::OutputFormat;
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

/// Rewrites URL-encoded separators (`%2F`, `%5C`, any case) to the host
/// path separator.
pub fn normalize_separators(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let code = candidate.get(1..3).map(str::to_ascii_uppercase);
        match code.as_deref() {
            Some("2F") | Some("5C") => {
                out.push(MAIN_SEPARATOR);
                rest = &candidate[3..];
            }
            _ => {
                out.push('%');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// The pieces of a source path a template can refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceParts {
    /// Filesystem root, e.g. `/`
    pub root: String,
    /// Absolute parent directory
    pub dir: String,
    /// File name with extension
    pub base: String,
    /// File name without extension
    pub name: String,
    /// Extension including the leading dot, or empty
    pub ext: String,
}

impl SourceParts {
    pub fn from_path(path: &Path) -> Result<Self> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            env::current_dir()?.join(path)
        };

        let root: PathBuf = absolute
            .components()
            .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
            .collect();
        let dir = absolute.parent().unwrap_or(&absolute);
        let lossy = |s: Option<&std::ffi::OsStr>| {
            s.map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
        };

        Ok(Self {
            root: root.to_string_lossy().into_owned(),
            dir: dir.to_string_lossy().into_owned(),
            base: lossy(absolute.file_name()),
            name: lossy(absolute.file_stem()),
            ext: absolute
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Root,
    Dir,
    Base,
    Name,
    Ext,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "root" => Some(Placeholder::Root),
            "dir" => Some(Placeholder::Dir),
            "base" => Some(Placeholder::Base),
            "name" => Some(Placeholder::Name),
            "ext" => Some(Placeholder::Ext),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A parsed output template such as `{dir}/{name}-small{ext}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let error = |message: String| PipelineError::Template {
            template: template.to_string(),
            message,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices();

        while let Some((index, c)) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, '{')) | None => {
                                return Err(error(format!("unclosed '{{' at position {}", index)))
                            }
                            Some((_, c)) => name.push(c),
                        }
                    }
                    let placeholder = Placeholder::from_name(&name).ok_or_else(|| {
                        error(format!(
                            "unknown placeholder {{{}}}; expected one of {{root}}, {{dir}}, \
                             {{base}}, {{name}}, {{ext}}",
                            name
                        ))
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(normalize_separators(&literal)));
                        literal.clear();
                    }
                    segments.push(Segment::Placeholder(placeholder));
                }
                '}' => return Err(error(format!("unmatched '}}' at position {}", index))),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(normalize_separators(&literal)));
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    pub fn expand(&self, parts: &SourceParts) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Placeholder(Placeholder::Root) => parts.root.as_str(),
                Segment::Placeholder(Placeholder::Dir) => parts.dir.as_str(),
                Segment::Placeholder(Placeholder::Base) => parts.base.as_str(),
                Segment::Placeholder(Placeholder::Name) => parts.name.as_str(),
                Segment::Placeholder(Placeholder::Ext) => parts.ext.as_str(),
            })
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Where converted images are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    File(PathBuf),
    Directory(PathBuf),
    Template(PathTemplate),
}

impl OutputTarget {
    /// Classifies an `--output` value: anything containing `{` is a
    /// template, an existing directory or a path ending in a separator is a
    /// directory, the rest is a file.
    pub fn parse(spec: &str) -> Result<Self> {
        if spec.contains('{') || spec.contains('}') {
            return PathTemplate::parse(spec).map(OutputTarget::Template);
        }
        let normalized = normalize_separators(spec);
        let path = PathBuf::from(&normalized);
        if path.is_dir() || normalized.ends_with('/') || normalized.ends_with(MAIN_SEPARATOR) {
            Ok(OutputTarget::Directory(path))
        } else {
            Ok(OutputTarget::File(path))
        }
    }

    /// Destination for one source. `format` is the output format requested
    /// by the plan, used for the extension of directory targets.
    pub fn destination_for(&self, source: &Path, format: Option<OutputFormat>) -> Result<PathBuf> {
        match self {
            OutputTarget::File(path) => Ok(path.clone()),
            OutputTarget::Directory(dir) => {
                let stem = source.file_stem().ok_or_else(|| {
                    PipelineError::UnsupportedFormat(format!("invalid file name: {:?}", source))
                })?;
                let extension = format
                    .map(|f| f.extension().to_string())
                    .or_else(|| source.extension().map(|e| e.to_string_lossy().into_owned()));
                let mut file_name = stem.to_os_string();
                if let Some(extension) = extension {
                    file_name.push(".");
                    file_name.push(extension);
                }
                Ok(dir.join(file_name))
            }
            OutputTarget::Template(template) => {
                let parts = SourceParts::from_path(source)?;
                Ok(PathBuf::from(template.expand(&parts)))
            }
        }
    }

    /// Destinations for every source, in order. Collisions get `-1`, `-2`,
    /// ... appended to the stem so no two conversions write the same file.
    pub fn destinations(
        &self,
        sources: &[PathBuf],
        format: Option<OutputFormat>,
    ) -> Result<Vec<PathBuf>> {
        let mut taken = HashSet::with_capacity(sources.len());
        sources
            .iter()
            .map(|source| {
                let destination = self.destination_for(source, format)?;
                let unique = dedupe(destination, &taken);
                taken.insert(unique.clone());
                Ok(unique)
            })
            .collect()
    }
}

fn dedupe(destination: PathBuf, taken: &HashSet<PathBuf>) -> PathBuf {
    if !taken.contains(&destination) {
        return destination;
    }
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = destination
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|n| destination.with_file_name(format!("{}-{}{}", stem, n, extension)))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parts(path: &str) -> SourceParts {
        SourceParts::from_path(Path::new(path)).unwrap()
    }

    #[test]
    fn test_normalize_separators() {
        let sep = MAIN_SEPARATOR.to_string();
        assert_eq!(normalize_separators("a%2Fb"), format!("a{}b", sep));
        assert_eq!(normalize_separators("a%2fb%5cc"), format!("a{}b{}c", sep, sep));
        assert_eq!(normalize_separators("100%"), "100%");
        assert_eq!(normalize_separators("50%off"), "50%off");
    }

    #[cfg(unix)]
    #[test]
    fn test_source_parts() {
        let p = parts("/photos/2024/beach.JPG");
        assert_eq!(p.root, "/");
        assert_eq!(p.dir, "/photos/2024");
        assert_eq!(p.base, "beach.JPG");
        assert_eq!(p.name, "beach");
        assert_eq!(p.ext, ".JPG");

        assert_eq!(parts("/tmp/README").ext, "");
    }

    #[test]
    fn test_source_parts_relative_path_is_absolutised() {
        let p = parts("relative.png");
        assert!(Path::new(&p.dir).is_absolute());
        assert_eq!(p.base, "relative.png");
    }

    #[cfg(unix)]
    #[test]
    fn test_template_expansion() {
        let template = PathTemplate::parse("{dir}/{name}-small{ext}").unwrap();
        assert_eq!(
            template.expand(&parts("/in/cat.png")),
            "/in/cat-small.png"
        );

        let template = PathTemplate::parse("out/{base}.webp").unwrap();
        assert_eq!(template.expand(&parts("/in/cat.png")), "out/cat.png.webp");
    }

    #[cfg(unix)]
    #[test]
    fn test_template_literal_separators_are_normalized() {
        let template = PathTemplate::parse("out%2F{name}.png").unwrap();
        assert_eq!(template.expand(&parts("/in/cat.png")), "out/cat.png");
    }

    #[test]
    fn test_template_errors() {
        for bad in ["{nope}.png", "{name", "name}", "{na{me}}"] {
            assert!(
                matches!(PathTemplate::parse(bad), Err(PipelineError::Template { .. })),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_output_target_classification() {
        let temp = TempDir::new().unwrap();
        let existing = temp.path().to_string_lossy().into_owned();

        assert!(matches!(
            OutputTarget::parse(&existing).unwrap(),
            OutputTarget::Directory(_)
        ));
        assert!(matches!(
            OutputTarget::parse("not-yet-created/").unwrap(),
            OutputTarget::Directory(_)
        ));
        assert!(matches!(
            OutputTarget::parse("out.png").unwrap(),
            OutputTarget::File(_)
        ));
        assert!(matches!(
            OutputTarget::parse("{name}.png").unwrap(),
            OutputTarget::Template(_)
        ));
        assert!(OutputTarget::parse("{bogus}").is_err());
    }

    #[test]
    fn test_directory_destination_uses_plan_format() {
        let target = OutputTarget::Directory(PathBuf::from("out"));
        assert_eq!(
            target
                .destination_for(Path::new("in/photo.png"), Some(OutputFormat::Jpeg))
                .unwrap(),
            PathBuf::from("out/photo.jpg")
        );
        assert_eq!(
            target.destination_for(Path::new("in/photo.png"), None).unwrap(),
            PathBuf::from("out/photo.png")
        );
    }

    #[test]
    fn test_destinations_are_deduplicated() {
        let target = OutputTarget::Directory(PathBuf::from("out"));
        let sources = vec![
            PathBuf::from("a/photo.png"),
            PathBuf::from("b/photo.png"),
            PathBuf::from("c/photo.png"),
        ];
        let destinations = target.destinations(&sources, None).unwrap();
        assert_eq!(
            destinations,
            vec![
                PathBuf::from("out/photo.png"),
                PathBuf::from("out/photo-1.png"),
                PathBuf::from("out/photo-2.png"),
            ]
        );
    }
}
