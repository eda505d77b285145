//! Task-list builder: sources × widths × formats → output specs.
//!
//! Building a plan is pure apart from probing each source's dimensions
//! through the backend. Nothing is written; the plan can be printed
//! (`srcset-forge plan`) or handed to the [`executor`](crate::executor).
//!
//! ## Fan-out per source
//!
//! ```text
//! hero.jpg (3000×2000), widths [480, 1024], every kind enabled, one root:
//!
//!   hero-480.webp       480×320    resize → WebP
//!   hero-480.jpg        480×320    resize → native
//!   hero-1024.webp      1024×683   resize → WebP
//!   hero-1024.jpg       1024×683   resize → native
//!   hero-20.webp        20×13      resize (+ optional blur) → WebP
//!   hero-original.webp  3000×2000  re-encode → WebP
//!   hero-original.jpg              byte copy
//! ```
//!
//! With several output roots every artifact is planned once per root.
//!
//! ## Codec ceiling
//!
//! WebP cannot encode past [`CODEC_CEILING`] pixels on either axis. A source
//! larger than that is scaled down uniformly *before* any target width is
//! applied, and a [`ClampNotice`] is recorded. Because a byte copy of such a
//! source would still break the ceiling, its `-original.{ext}` artifact is
//! re-encoded at the clamped size instead of copied.
//!
//! A source whose dimensions cannot be read still gets its full set of specs,
//! marked [`Action::Unreadable`], so every expected artifact shows up either on
//! disk or as a reported failure.

use crate::config::{OutputRoot, PipelineConfig};
use crate::imaging::calculations::{CODEC_CEILING, ceiling_scale, clamp_to_ceiling, fit_width};
use crate::imaging::{Dimensions, ImageBackend, OutputFormat, Quality};
use crate::naming::{PlaceholderNaming, SizeTag, artifact_file_name};
use crate::scan::SourceImage;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Config error: no target widths configured")]
    NoWidths,
    #[error("Config error: {first} and {second} would both write {path}")]
    DuplicateOutput {
        path: PathBuf,
        first: String,
        second: String,
    },
}

/// Which artifacts to emit per source.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatPolicy {
    /// `{name}-{width}.webp` per width.
    pub webp: bool,
    /// `{name}-{width}.{ext}` per width.
    pub native: bool,
    pub placeholder: Option<PlaceholderPolicy>,
    /// `{name}-original.webp`.
    pub original_webp: bool,
    /// `{name}-original.{ext}`.
    pub original_copy: bool,
    pub quality: Quality,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceholderPolicy {
    pub width: u32,
    pub naming: PlaceholderNaming,
    pub blur_sigma: Option<f32>,
}

impl FormatPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            webp: config.images.webp,
            native: config.images.native,
            placeholder: config.placeholder.enabled.then(|| PlaceholderPolicy {
                width: config.placeholder.width,
                naming: config.placeholder.naming,
                blur_sigma: config.placeholder_blur(),
            }),
            original_webp: config.original.webp,
            original_copy: config.original.copy,
            quality: Quality::new(config.images.quality),
        }
    }
}

/// What kind of artifact a spec produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Sized(u32),
    Placeholder,
    OriginalWebp,
    OriginalNative,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Sized(w) => write!(f, "{w}px"),
            ArtifactKind::Placeholder => f.write_str("placeholder"),
            ArtifactKind::OriginalWebp | ArtifactKind::OriginalNative => f.write_str("original"),
        }
    }
}

/// How an artifact gets produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Decode, resize to exactly `width`×`height`, encode.
    Resize {
        width: u32,
        height: u32,
        blur_sigma: Option<f32>,
    },
    /// Copy the source bytes.
    Copy,
    /// The source could not be probed; the task reports this message.
    Unreadable(String),
}

/// One artifact to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    /// Index into [`Plan::sources`].
    pub source: usize,
    pub kind: ArtifactKind,
    pub format: OutputFormat,
    pub action: Action,
    /// Tag of the output root this spec writes into.
    pub root: String,
    pub path: PathBuf,
}

impl OutputSpec {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Target dimensions, when known ahead of execution.
    pub fn dimensions(&self) -> Option<Dimensions> {
        match self.action {
            Action::Resize { width, height, .. } => Some(Dimensions::new(width, height)),
            _ => None,
        }
    }
}

/// A source scaled down to fit the codec ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct ClampNotice {
    pub source: usize,
    pub file_name: String,
    pub original: Dimensions,
    pub clamped: Dimensions,
    pub scale: f64,
}

/// The complete artifact list for one run.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Sources with `dimensions` filled in where probing succeeded.
    pub sources: Vec<SourceImage>,
    pub specs: Vec<OutputSpec>,
    pub clamps: Vec<ClampNotice>,
}

impl Plan {
    /// Number of specs belonging to each source, indexed like `sources`.
    pub fn specs_per_source(&self) -> Vec<usize> {
        let mut counts = vec![0; self.sources.len()];
        for spec in &self.specs {
            counts[spec.source] += 1;
        }
        counts
    }
}

/// Build the plan for `sources`.
///
/// `widths` should already be deduplicated (see
/// [`PipelineConfig::resolution_matrix`]).
pub fn build(
    backend: &impl ImageBackend,
    mut sources: Vec<SourceImage>,
    widths: &[u32],
    policy: &FormatPolicy,
    roots: &[OutputRoot],
) -> Result<Plan, PlanError> {
    if widths.is_empty() {
        return Err(PlanError::NoWidths);
    }

    let mut specs = Vec::new();
    let mut clamps = Vec::new();

    for (index, source) in sources.iter_mut().enumerate() {
        // Ok(working dimensions, already inside the ceiling) or the identify error.
        let working: Result<(u32, u32), String> = match backend.identify(&source.path) {
            Ok(dims) => {
                source.dimensions = Some(dims);
                let native = dims.as_tuple();
                let working = clamp_to_ceiling(native, CODEC_CEILING);
                if let Some(scale) = ceiling_scale(native, CODEC_CEILING) {
                    tracing::warn!(
                        source = %source.file_name,
                        width = dims.width,
                        height = dims.height,
                        clamped_width = working.0,
                        clamped_height = working.1,
                        "source exceeds the {CODEC_CEILING}px codec limit, scaling by {scale:.4}"
                    );
                    clamps.push(ClampNotice {
                        source: index,
                        file_name: source.file_name.clone(),
                        original: dims,
                        clamped: working.into(),
                        scale,
                    });
                }
                Ok(working)
            }
            Err(e) => {
                tracing::warn!(source = %source.file_name, "could not read dimensions: {e}");
                Err(e.to_string())
            }
        };
        let clamped = clamps.last().is_some_and(|c: &ClampNotice| c.source == index);

        let resize_to = |target: Option<u32>, blur_sigma: Option<f32>| match &working {
            Ok(dims) => {
                let (width, height) = match target {
                    Some(w) => fit_width(*dims, w, CODEC_CEILING),
                    None => *dims,
                };
                Action::Resize {
                    width,
                    height,
                    blur_sigma,
                }
            }
            Err(message) => Action::Unreadable(message.clone()),
        };

        let artifacts: Vec<(ArtifactKind, SizeTag, OutputFormat, Action)> =
            fan_out(source, widths, policy)
                .into_iter()
                .map(|(kind, tag, format)| {
                    let action = match kind {
                        ArtifactKind::Sized(w) => resize_to(Some(w), None),
                        ArtifactKind::Placeholder => {
                            let blur = policy.placeholder.and_then(|p| p.blur_sigma);
                            let width = policy.placeholder.map_or(0, |p| p.width);
                            resize_to(Some(width), blur)
                        }
                        ArtifactKind::OriginalWebp => resize_to(None, None),
                        ArtifactKind::OriginalNative => match &working {
                            Ok(_) if clamped => resize_to(None, None),
                            Ok(_) => Action::Copy,
                            Err(message) => Action::Unreadable(message.clone()),
                        },
                    };
                    (kind, tag, format, action)
                })
                .collect();

        for root in roots {
            for (kind, tag, format, action) in &artifacts {
                specs.push(OutputSpec {
                    source: index,
                    kind: *kind,
                    format: *format,
                    action: action.clone(),
                    root: root.tag.clone(),
                    path: output_path(root, source, *tag, *format),
                });
            }
        }
    }

    check_unique_paths(specs.iter().map(|s| (s.path.as_path(), s.source)), &sources)?;

    Ok(Plan {
        sources,
        specs,
        clamps,
    })
}

/// Artifact kinds, size tags and formats emitted for one source, in order.
fn fan_out(
    source: &SourceImage,
    widths: &[u32],
    policy: &FormatPolicy,
) -> Vec<(ArtifactKind, SizeTag, OutputFormat)> {
    let mut artifacts = Vec::new();
    for &w in widths {
        if policy.webp {
            artifacts.push((ArtifactKind::Sized(w), SizeTag::Pixels(w), OutputFormat::WebP));
        }
        if policy.native {
            artifacts.push((ArtifactKind::Sized(w), SizeTag::Pixels(w), source.format));
        }
    }
    if let Some(placeholder) = policy.placeholder {
        artifacts.push((
            ArtifactKind::Placeholder,
            SizeTag::placeholder(placeholder.width, placeholder.naming),
            OutputFormat::WebP,
        ));
    }
    if policy.original_webp {
        artifacts.push((ArtifactKind::OriginalWebp, SizeTag::Original, OutputFormat::WebP));
    }
    if policy.original_copy {
        artifacts.push((ArtifactKind::OriginalNative, SizeTag::Original, source.format));
    }
    artifacts
}

fn output_path(root: &OutputRoot, source: &SourceImage, tag: SizeTag, format: OutputFormat) -> PathBuf {
    let ext = match format {
        OutputFormat::WebP => "webp",
        _ => source.extension.as_str(),
    };
    root.dir.join(artifact_file_name(&source.base_name, tag, ext))
}

/// Check that no two artifacts of a run would share a path, from file names
/// alone.
///
/// Output names never depend on pixel dimensions, so this needs no probing
/// and can run before any output directory is touched.
pub fn check_output_names(
    sources: &[SourceImage],
    widths: &[u32],
    policy: &FormatPolicy,
    roots: &[OutputRoot],
) -> Result<(), PlanError> {
    let mut paths = Vec::new();
    for (index, source) in sources.iter().enumerate() {
        let artifacts = fan_out(source, widths, policy);
        for root in roots {
            for &(_, tag, format) in &artifacts {
                paths.push((output_path(root, source, tag, format), index));
            }
        }
    }
    check_unique_paths(paths.iter().map(|(p, i)| (p.as_path(), *i)), sources)
}

/// No two specs may write the same file.
fn check_unique_paths<'p>(
    paths: impl Iterator<Item = (&'p Path, usize)>,
    sources: &[SourceImage],
) -> Result<(), PlanError> {
    let mut seen: HashMap<&Path, usize> = HashMap::new();
    for (path, source) in paths {
        if let Some(&other) = seen.get(path) {
            return Err(PlanError::DuplicateOutput {
                path: path.to_path_buf(),
                first: sources[other].file_name.clone(),
                second: sources[source].file_name.clone(),
            });
        }
        seen.insert(path, source);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use std::path::Path;

    fn source(name: &str) -> SourceImage {
        SourceImage::from_path(&Path::new("/in").join(name)).unwrap()
    }

    fn all_kinds() -> FormatPolicy {
        FormatPolicy {
            webp: true,
            native: true,
            placeholder: Some(PlaceholderPolicy {
                width: 20,
                naming: PlaceholderNaming::Width,
                blur_sigma: None,
            }),
            original_webp: true,
            original_copy: true,
            quality: Quality::default(),
        }
    }

    fn one_root() -> Vec<OutputRoot> {
        vec![OutputRoot::new("dist", "/out")]
    }

    fn file_names(plan: &Plan) -> Vec<String> {
        plan.specs.iter().map(|s| s.file_name()).collect()
    }

    #[test]
    fn fans_out_every_width_and_format() {
        let backend = MockBackend::with_sizes(&[("hero.jpg", 3000, 2000)]);
        let plan = build(&backend, vec![source("hero.jpg")], &[480, 1024], &all_kinds(), &one_root())
            .unwrap();

        assert_eq!(
            file_names(&plan),
            vec![
                "hero-480.webp",
                "hero-480.jpg",
                "hero-1024.webp",
                "hero-1024.jpg",
                "hero-20.webp",
                "hero-original.webp",
                "hero-original.jpg",
            ]
        );
        assert_eq!(plan.sources[0].dimensions, Some(Dimensions::new(3000, 2000)));
        assert!(plan.clamps.is_empty());
    }

    #[test]
    fn sized_specs_preserve_aspect() {
        let backend = MockBackend::with_sizes(&[("hero.jpg", 3000, 2000)]);
        let plan = build(&backend, vec![source("hero.jpg")], &[480, 1024], &all_kinds(), &one_root())
            .unwrap();

        assert_eq!(plan.specs[0].dimensions(), Some(Dimensions::new(480, 320)));
        assert_eq!(plan.specs[2].dimensions(), Some(Dimensions::new(1024, 683)));
        assert_eq!(plan.specs[4].dimensions(), Some(Dimensions::new(20, 13)));
        assert_eq!(plan.specs[5].dimensions(), Some(Dimensions::new(3000, 2000)));
        assert_eq!(plan.specs[6].action, Action::Copy);
    }

    #[test]
    fn native_format_follows_source_extension() {
        let backend = MockBackend::with_sizes(&[("b.PNG", 100, 100)]);
        let plan = build(&backend, vec![source("b.PNG")], &[480], &all_kinds(), &one_root())
            .unwrap();

        let native = &plan.specs[1];
        assert_eq!(native.format, OutputFormat::Png);
        assert_eq!(native.file_name(), "b-480.PNG");
        assert_eq!(plan.specs[4].file_name(), "b-original.PNG");
    }

    #[test]
    fn lowres_placeholder_naming_and_blur() {
        let backend = MockBackend::with_sizes(&[("foo.png", 800, 400)]);
        let mut policy = all_kinds();
        policy.placeholder = Some(PlaceholderPolicy {
            width: 20,
            naming: PlaceholderNaming::Lowres,
            blur_sigma: Some(1.5),
        });
        let plan = build(&backend, vec![source("foo.png")], &[480], &policy, &one_root()).unwrap();

        let placeholder = plan
            .specs
            .iter()
            .find(|s| s.kind == ArtifactKind::Placeholder)
            .unwrap();
        assert_eq!(placeholder.file_name(), "foo-lowres.webp");
        assert_eq!(
            placeholder.action,
            Action::Resize {
                width: 20,
                height: 10,
                blur_sigma: Some(1.5)
            }
        );
    }

    #[test]
    fn disabled_kinds_are_skipped() {
        let backend = MockBackend::with_sizes(&[("a.jpg", 800, 600)]);
        let policy = FormatPolicy {
            native: false,
            placeholder: None,
            original_copy: false,
            ..all_kinds()
        };
        let plan = build(&backend, vec![source("a.jpg")], &[480, 768], &policy, &one_root()).unwrap();
        assert_eq!(
            file_names(&plan),
            vec!["a-480.webp", "a-768.webp", "a-original.webp"]
        );
    }

    #[test]
    fn every_root_gets_every_artifact() {
        let backend = MockBackend::with_sizes(&[("a.jpg", 800, 600)]);
        let roots = vec![
            OutputRoot::new("public", "/public/img"),
            OutputRoot::new("dist", "/dist/img"),
        ];
        let plan = build(&backend, vec![source("a.jpg")], &[480], &all_kinds(), &roots).unwrap();

        assert_eq!(plan.specs.len(), 10);
        let public: Vec<_> = plan.specs.iter().filter(|s| s.root == "public").collect();
        assert_eq!(public.len(), 5);
        assert!(public.iter().all(|s| s.path.starts_with("/public/img")));
        assert_eq!(plan.specs_per_source(), vec![10]);
    }

    #[test]
    fn oversized_source_is_clamped_everywhere() {
        let backend = MockBackend::with_sizes(&[("huge.jpg", 20000, 8000)]);
        let plan = build(
            &backend,
            vec![source("huge.jpg")],
            &[480, 3840, 16000],
            &all_kinds(),
            &one_root(),
        )
        .unwrap();

        assert_eq!(plan.clamps.len(), 1);
        let notice = &plan.clamps[0];
        assert_eq!(notice.original, Dimensions::new(20000, 8000));
        assert_eq!(notice.clamped, Dimensions::new(16383, 6553));
        assert!((notice.scale - 16383.0 / 20000.0).abs() < 1e-9);

        for spec in &plan.specs {
            let dims = spec.dimensions().expect("oversized sources are never copied");
            assert!(dims.width <= CODEC_CEILING && dims.height <= CODEC_CEILING);
            let ratio = dims.width as f64 / dims.height as f64;
            if dims.width >= 480 {
                assert!((ratio - 2.5).abs() < 0.01, "{spec:?}");
            }
        }

        let original = plan
            .specs
            .iter()
            .find(|s| s.kind == ArtifactKind::OriginalNative)
            .unwrap();
        assert_eq!(original.file_name(), "huge-original.jpg");
        assert_eq!(original.dimensions(), Some(Dimensions::new(16383, 6553)));
    }

    #[test]
    fn tall_source_wide_target_stays_inside_ceiling() {
        let backend = MockBackend::with_sizes(&[("pole.png", 100, 20000)]);
        let plan = build(&backend, vec![source("pole.png")], &[3840], &all_kinds(), &one_root())
            .unwrap();

        assert_eq!(plan.clamps.len(), 1);
        for spec in &plan.specs {
            let dims = spec.dimensions().unwrap();
            assert!(dims.width <= CODEC_CEILING && dims.height <= CODEC_CEILING);
        }
    }

    #[test]
    fn unreadable_source_keeps_its_specs() {
        // No mock dimensions for broken.jpg → identify fails.
        let backend = MockBackend::with_sizes(&[("ok.jpg", 800, 600)]);
        let plan = build(
            &backend,
            vec![source("broken.jpg"), source("ok.jpg")],
            &[480],
            &all_kinds(),
            &one_root(),
        )
        .unwrap();

        let broken: Vec<_> = plan.specs.iter().filter(|s| s.source == 0).collect();
        assert_eq!(broken.len(), 5);
        assert!(broken.iter().all(|s| matches!(s.action, Action::Unreadable(_))));
        assert_eq!(plan.sources[0].dimensions, None);
        assert_eq!(plan.specs_per_source(), vec![5, 5]);
    }

    #[test]
    fn empty_widths_is_config_error() {
        let backend = MockBackend::with_sizes(&[("a.jpg", 800, 600)]);
        let result = build(&backend, vec![source("a.jpg")], &[], &all_kinds(), &one_root());
        assert!(matches!(result, Err(PlanError::NoWidths)));
    }

    #[test]
    fn colliding_base_names_are_rejected() {
        let backend = MockBackend::with_sizes(&[("a.jpg", 800, 600), ("a.png", 800, 600)]);
        let result = build(
            &backend,
            vec![source("a.jpg"), source("a.png")],
            &[480],
            &all_kinds(),
            &one_root(),
        );
        match result {
            Err(PlanError::DuplicateOutput { path, first, second }) => {
                assert_eq!(path, PathBuf::from("/out/a-480.webp"));
                assert_eq!(first, "a.jpg");
                assert_eq!(second, "a.png");
            }
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn output_name_check_needs_no_dimensions() {
        let sources = vec![source("a.jpg"), source("a.png")];
        let result = check_output_names(&sources, &[480], &all_kinds(), &one_root());
        assert!(matches!(
            result,
            Err(PlanError::DuplicateOutput { ref first, ref second, .. })
                if first == "a.jpg" && second == "a.png"
        ));

        let sources = vec![source("a.jpg"), source("b.png")];
        assert!(check_output_names(&sources, &[480], &all_kinds(), &one_root()).is_ok());
    }

    #[test]
    fn output_name_check_agrees_with_build() {
        let mut policy = all_kinds();
        policy.webp = false;
        policy.native = false;
        policy.placeholder = None;
        policy.original_webp = false;
        let sources = vec![source("a.jpg"), source("b.jpg")];
        let backend = MockBackend::with_sizes(&[("a.jpg", 800, 600), ("b.jpg", 800, 600)]);
        assert!(check_output_names(&sources, &[480], &policy, &one_root()).is_ok());
        assert!(build(&backend, sources, &[480], &policy, &one_root()).is_ok());

        let two_roots_same_dir =
            vec![OutputRoot::new("dist", "/out"), OutputRoot::new("public", "/out")];
        let sources = vec![source("a.jpg")];
        assert!(check_output_names(&sources, &[480], &policy, &two_roots_same_dir).is_err());
        assert!(build(&backend, sources, &[480], &policy, &two_roots_same_dir).is_err());
    }

    #[test]
    fn policy_from_default_config() {
        let policy = FormatPolicy::from_config(&PipelineConfig::default());
        assert!(policy.webp && policy.native && policy.original_webp && policy.original_copy);
        assert_eq!(
            policy.placeholder,
            Some(PlaceholderPolicy {
                width: 20,
                naming: PlaceholderNaming::Width,
                blur_sigma: None,
            })
        );
        assert_eq!(policy.quality, Quality::new(82));
    }
}
