use clap::{Parser, Subcommand, ValueEnum};
use imagecache::batch;
use imagecache::cache::{DerivedImageCache, MemoryStore};
use imagecache::config::{self, EngineConfig};
use imagecache::imaging::{
    Anchor, ArtifactStore, CropRatios, FsArtifactStore, FsSourceLoader, OutputFormat, Rgb,
    TransformMode, TransformRequest,
};
use imagecache::output;
use imagecache::service::ImageService;
use std::path::{Path, PathBuf};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "imagecache")]
#[command(about = "Derived-image engine: fit, crop and bound images on demand")]
#[command(long_about = "\
Derived-image engine: fit, crop and bound images on demand

Sources are paths relative to --source. Outputs are paths relative to --output.
The source name \"Default\" renders the placeholder instead of loading a file.

Modes:
  fit          Scale to fit inside WIDTHxHEIGHT, letterbox with the background
  fill-crop    Scale to cover WIDTHxHEIGHT, clip the overflow (see --anchor)
  ratio-crop   Stretch a fractional region (see --crop) onto WIDTHxHEIGHT
  bounded-max  Scale into WIDTHxHEIGHT preserving aspect, never upscale

Configuration is read from imagecache.toml in the source directory, or from
--config. Run 'imagecache gen-config' to print a documented config file.")]
#[command(version = version_string())]
struct Cli {
    /// Source image directory
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Output directory for rendered and saved images
    #[arg(long, default_value = "out", global = true)]
    output: PathBuf,

    /// Config file (defaults to <source>/imagecache.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Fit,
    FillCrop,
    RatioCrop,
    BoundedMax,
}

/// Flags shared by commands that render one request.
#[derive(clap::Args)]
struct RenderArgs {
    /// Source image (relative to --source), or "Default" for the placeholder
    image: String,

    /// Output file (relative to --output)
    target: String,

    /// Output format: png, jpeg, gif or hq-jpeg
    #[arg(long, default_value = "png")]
    format: OutputFormat,

    /// Background colour as six hex digits, e.g. AABB22
    #[arg(long)]
    background: Option<Rgb>,
}

#[derive(Subcommand)]
enum Command {
    /// Render one request and write it to the output directory
    Get {
        #[command(flatten)]
        render: RenderArgs,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[arg(long, value_enum, default_value = "fit")]
        mode: ModeArg,
        /// Edge kept visible by fill-crop: center, top, bottom, left, right
        #[arg(long, default_value = "center")]
        anchor: Anchor,
        /// Region for ratio-crop as "width,height,left,top" fractions
        #[arg(long, default_value = "1,1,0,0")]
        crop: CropRatios,
    },
    /// Stretch a fractional region of an image onto WIDTHxHEIGHT
    Crop {
        #[command(flatten)]
        render: RenderArgs,
        width: u32,
        height: u32,
        /// Region as "width,height,left,top" fractions
        ratios: CropRatios,
    },
    /// Save a PNG copy bounded by max_image_dimension
    SaveForWeb {
        /// Source image (relative to --source)
        image: String,
        /// Target file (relative to --output)
        target: String,
    },
    /// Delete a previously saved file from the output directory
    Delete {
        /// Target file (relative to --output)
        target: String,
    },
    /// Render a JSON list of jobs in parallel through one shared cache
    Batch {
        /// Batch file
        jobs: PathBuf,
    },
    /// Print a stock imagecache.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let artifacts = FsArtifactStore::new(&cli.output);
    let service = || open_service(&cli.source, cli.config.as_deref());

    match cli.command {
        Command::Get {
            render,
            width,
            height,
            mode,
            anchor,
            crop,
        } => {
            let mode = match mode {
                ModeArg::Fit => TransformMode::Fit,
                ModeArg::FillCrop => TransformMode::FillCrop { anchor },
                ModeArg::RatioCrop => TransformMode::RatioCrop(crop),
                ModeArg::BoundedMax => TransformMode::BoundedMax,
            };
            let request = build_request(&render, width, height, mode);
            let bytes = service()?.get(&request)?;
            artifacts.put(&render.target, &bytes)?;
            print_lines(output::format_render(&request, &render.target, bytes.len()));
        }
        Command::Crop {
            render,
            width,
            height,
            ratios,
        } => {
            let request = build_request(&render, width, height, TransformMode::RatioCrop(ratios));
            let bytes = service()?.get(&request)?;
            artifacts.put(&render.target, &bytes)?;
            print_lines(output::format_render(&request, &render.target, bytes.len()));
        }
        Command::SaveForWeb { image, target } => {
            let dims = service()?.save_for_web(&image, &target, &artifacts)?;
            println!("{}", output::format_saved(&image, &target, dims));
        }
        Command::Delete { target } => {
            service()?.delete(&target, &artifacts)?;
            println!("Deleted {target}");
        }
        Command::Batch { jobs } => {
            let service = service()?;
            init_thread_pool(&service.config().processing);
            let jobs = batch::load_jobs(&jobs)?;
            let outcomes = batch::run_batch(&service, &jobs, &artifacts);
            for outcome in &outcomes {
                println!("{}", output::format_batch_outcome(outcome));
            }
            print_lines(output::format_batch_summary(&outcomes, &service.cache_stats()));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn build_request(
    render: &RenderArgs,
    width: u32,
    height: u32,
    mode: TransformMode,
) -> TransformRequest {
    let request = TransformRequest::new(render.image.as_str(), width, height, mode, render.format);
    match render.background {
        Some(colour) => request.with_background(colour),
        None => request,
    }
}

type FsService = ImageService<FsSourceLoader, MemoryStore>;

/// Load configuration and build a service reading from `source`.
///
/// An explicit config file must exist; otherwise `<source>/imagecache.toml`
/// is used when present.
fn open_service(
    source: &Path,
    config_file: Option<&Path>,
) -> Result<FsService, config::ConfigError> {
    let engine_config: EngineConfig = match config_file {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(source)?,
    };
    let cache = DerivedImageCache::new(MemoryStore::new(), engine_config.sliding_expiration());
    Ok(ImageService::new(
        FsSourceLoader::new(source),
        cache,
        engine_config,
    ))
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
