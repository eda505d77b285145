use clap::{Parser, Subcommand};
use srcset_forge::config::{self, OutputRoot, PipelineConfig};
use srcset_forge::imaging::RustBackend;
use srcset_forge::{logging, output, process};
use std::collections::HashSet;
use std::path::PathBuf;

fn version_string() -> &'static str {
    let on_tag = env!("FORGE_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("FORGE_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "srcset-forge")]
#[command(about = "Generate responsive image derivatives for srcset")]
#[command(long_about = "\
Generate responsive image derivatives for srcset

Every .jpg/.jpeg/.png in the input directory is resized to each configured
width in WebP and in its own format, plus a tiny WebP placeholder and
full-size originals:

  src/assets/images/hero.jpg
    → dist/assets/images/hero-480.webp     hero-480.jpg
      dist/assets/images/hero-768.webp     hero-768.jpg
      ...
      dist/assets/images/hero-20.webp      (placeholder)
      dist/assets/images/hero-original.webp
      dist/assets/images/hero-original.jpg

The output directory is cleared first unless --no-clear is given.

Run 'srcset-forge gen-config' to generate a documented srcset-forge.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (missing file means built-in defaults)
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Source image directory (overrides input_dir)
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Output directory; repeat for several roots (replaces [[outputs]])
    #[arg(long, global = true)]
    output: Vec<PathBuf>,

    /// Maximum artifacts encoded at once (overrides processing.concurrency)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Keep existing files in the output directories
    #[arg(long, global = true)]
    no_clear: bool,

    /// Debug-level diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Diagnostics as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Generate every derivative (the default)
    Process,
    /// List the artifacts a run would produce, without encoding anything
    Plan,
    /// Print a stock srcset-forge.toml with all options documented
    GenConfig,
}

impl Cli {
    /// Load the config file and apply command-line overrides on top.
    fn resolve_config(&self) -> Result<PipelineConfig, config::ConfigError> {
        let mut config = config::load_config(&self.config)?;
        if let Some(input) = &self.input {
            config.input_dir = input.clone();
        }
        if !self.output.is_empty() {
            config.outputs = output_roots(&self.output);
        }
        if let Some(n) = self.concurrency {
            config.processing.concurrency = n;
        }
        if self.no_clear {
            config.clear_output = false;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Roots from `--output` flags, tagged by directory name.
///
/// A repeated name gets the first `-{n}` suffix that is neither another
/// root's directory name nor already handed out, so every tag is unique.
fn output_roots(dirs: &[PathBuf]) -> Vec<OutputRoot> {
    let names: Vec<String> = dirs
        .iter()
        .enumerate()
        .map(|(i, dir)| {
            dir.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("output-{i}"))
        })
        .collect();
    let mut taken: HashSet<String> = names.iter().cloned().collect();
    let mut used: HashSet<String> = HashSet::new();

    names
        .into_iter()
        .zip(dirs)
        .map(|(name, dir)| {
            let tag = if used.insert(name.clone()) {
                name
            } else {
                let mut n = 1;
                while taken.contains(&format!("{name}-{n}")) {
                    n += 1;
                }
                let tag = format!("{name}-{n}");
                taken.insert(tag.clone());
                used.insert(tag.clone());
                tag
            };
            OutputRoot::new(tag, dir)
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_json);

    match cli.command.as_ref().unwrap_or(&Command::Process) {
        Command::Process => {
            let config = cli.resolve_config()?;
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_process_event(&event);
                }
            });
            let result = process::process(&config, Some(tx));
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            output::print_summary(&result?);
        }
        Command::Plan => {
            let config = cli.resolve_config()?;
            let plan = process::plan_with_backend(&RustBackend::new(), &config)?;
            output::print_plan(&plan);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_process() {
        let cli = Cli::parse_from(["srcset-forge"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("srcset-forge.toml"));
        assert!(cli.output.is_empty());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "srcset-forge",
            "--config",
            "/nonexistent/srcset-forge.toml",
            "--input",
            "/photos",
            "--output",
            "/site/public/img",
            "--output",
            "/site/dist/img",
            "--concurrency",
            "3",
            "--no-clear",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.input_dir, PathBuf::from("/photos"));
        assert_eq!(config.processing.concurrency, 3);
        assert!(!config.clear_output);
        let tags: Vec<&str> = config.outputs.iter().map(|o| o.tag.as_str()).collect();
        assert_eq!(tags, vec!["img", "img-1"]);
    }

    #[test]
    fn zero_concurrency_flag_is_rejected() {
        let cli = Cli::parse_from([
            "srcset-forge",
            "--config",
            "/nonexistent/srcset-forge.toml",
            "--concurrency",
            "0",
        ]);
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::parse_from(["srcset-forge", "plan", "--verbose"]);
        assert!(matches!(cli.command, Some(Command::Plan)));
        assert!(cli.verbose);
        let cli = Cli::parse_from(["srcset-forge", "gen-config"]);
        assert!(matches!(cli.command, Some(Command::GenConfig)));
    }

    #[test]
    fn output_tags_skip_real_directory_names() {
        let dirs: Vec<PathBuf> = ["/a/img", "/b/img", "/c/img-1", "/d/img"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        let tags: Vec<String> = output_roots(&dirs).into_iter().map(|r| r.tag).collect();
        assert_eq!(tags, vec!["img", "img-2", "img-1", "img-3"]);
    }

    #[test]
    fn colliding_suffix_flags_still_validate() {
        let cli = Cli::parse_from([
            "srcset-forge",
            "--config",
            "/nonexistent/srcset-forge.toml",
            "--output",
            "/a/img",
            "--output",
            "/b/img",
            "--output",
            "/c/img-1",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.outputs.len(), 3);
    }

    #[test]
    fn root_without_file_name_is_tagged_by_position() {
        let tags: Vec<String> = output_roots(&[PathBuf::from("/"), PathBuf::from("/site/dist")])
            .into_iter()
            .map(|r| r.tag)
            .collect();
        assert_eq!(tags, vec!["output-0", "dist"]);
    }
}
