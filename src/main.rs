use clap::{Parser, Subcommand};
use imgchain::config::{self, ServiceConfig};
use imgchain::fetch::{LocalFetcher, source_extension};
use imgchain::imaging::{Color, ManipulationRequest, RustEngine};
use imgchain::output::{self, TransformReport};
use imgchain::pipeline::{Pipeline, RequestContext};
use imgchain::raster::GifRaster;
use imgchain::throttle::MemoryThrottler;
use rayon::prelude::*;
use std::collections::HashSet;
use std::net::IpAddr;
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
#[command(name = "imgchain")]
#[command(about = "Transform images with URL-style parameters")]
#[command(long_about = "\
Transform images with URL-style parameters

Each source runs through a fixed chain of operators, each switched on by a
request parameter:

  trim         trim=10                 Crop away a uniform border
  orientation  or=90|180|270           Rotate clockwise
  crop         crop=w,h,x,y            Extract a region
  size         w=300 h=200 t=square    Resize (fit, fitup, square, squaredown,
               a=top dpr=2              absolute, letterbox)
  shape        shape=circle            Mask to a shape
  adjust       bri=20 con=-10 gam=2.2  Brightness, contrast, gamma
  filter       filt=greyscale|sepia|negate
  sharpen      sharp=flat,jagged,sigma
  blur         blur=5
  background   bg=white                Flatten transparency onto a colour

Output format: output=jpg|png|webp|gif, q=0-100, level=0-9, il (interlace).
Malformed parameters fall back to defaults instead of failing.

Example:

  imgchain transform photo.jpg --query 'w=300&h=300&t=square&output=webp'

Run 'imgchain gen-config' to generate a documented config file.")]
#[command(version = version_string())]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run sources through the pipeline and write the results
    Transform(TransformArgs),
    /// Print a stock config file with all options documented
    GenConfig,
    /// Print the RGBA value a colour parameter resolves to
    CheckColor {
        /// Colour as hex (RGB, ARGB, RRGGBB, AARRGGBB) or a CSS name
        spec: String,
    },
}

#[derive(clap::Args)]
struct TransformArgs {
    /// Source paths or file:// URLs
    #[arg(required = true)]
    sources: Vec<String>,

    /// Single parameter as key=value (repeatable; overrides --query)
    #[arg(short, long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Parameters as a query string, e.g. 'w=300&output=png'
    #[arg(short, long)]
    query: Option<String>,

    /// Directory for the transformed images
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Client address used for throttling
    #[arg(long)]
    client_ip: Option<IpAddr>,

    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print one JSON object per result
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Transform(args) => transform(args)?,
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::CheckColor { spec } => {
            println!("{}", output::format_color(&spec, Color::parse(Some(&spec))));
        }
    }

    Ok(())
}

fn transform(args: TransformArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(args.config.as_deref())?;
    init_thread_pool(&config.processing);
    std::fs::create_dir_all(&args.out_dir)?;

    let request = build_request(args.query.as_deref(), &args.params);
    log::debug!("request parameters: {request:?}");

    let fetcher = LocalFetcher::new(config.fetch.max_image_size);
    let engine = RustEngine::new();
    let throttler = MemoryThrottler::new(config.throttler.policy());
    let shim = GifRaster::new();
    let pipeline = build_pipeline(&config, &fetcher, &engine, &throttler, &shim);
    let ctx = RequestContext::new(args.client_ip);

    let stems = output_stems(&args.sources);
    let reports: Vec<TransformReport> = args
        .sources
        .par_iter()
        .zip(stems.par_iter())
        .map(|(source, stem)| transform_one(&pipeline, &ctx, source, stem, &request, &args.out_dir))
        .collect();

    for report in &reports {
        if args.json {
            println!("{}", output::format_report_json(report)?);
        } else {
            output::print_report(report);
        }
    }
    if !args.json {
        output::print_summary(&reports);
    }

    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    if failed > 0 {
        return Err(format!("{failed} of {} sources failed", reports.len()).into());
    }
    Ok(())
}

fn build_pipeline<'a>(
    config: &ServiceConfig,
    fetcher: &'a LocalFetcher,
    engine: &'a RustEngine,
    throttler: &'a MemoryThrottler,
    shim: &'a GifRaster,
) -> Pipeline<'a> {
    let mut pipeline = Pipeline::new(fetcher, engine);
    if config.throttler.enabled {
        pipeline = pipeline.with_throttler(throttler);
    }
    if config.output.gif_fallback {
        pipeline = pipeline.with_shim(shim);
    }
    pipeline
}

/// Merge `--query` and `--param` values; `--param` wins on conflicts.
fn build_request(query: Option<&str>, params: &[String]) -> ManipulationRequest {
    let from_query = ManipulationRequest::from_query(query.unwrap_or_default());
    let from_params = params.iter().map(|p| match p.split_once('=') {
        Some((k, v)) => (k.to_string(), v.to_string()),
        None => (p.clone(), String::new()),
    });
    from_query
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .chain(from_params)
        .collect()
}

fn source_path(source: &str) -> &Path {
    Path::new(source.strip_prefix("file://").unwrap_or(source))
}

/// One output stem per source. Repeated stems get `-2`, `-3`, ... so a batch
/// never writes two results to the same file.
fn output_stems(sources: &[String]) -> Vec<String> {
    let mut taken = HashSet::new();
    sources
        .iter()
        .map(|source| {
            let stem = source_path(source)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output");
            let mut candidate = stem.to_string();
            let mut n = 1;
            while !taken.insert(candidate.clone()) {
                n += 1;
                candidate = format!("{stem}-{n}");
            }
            candidate
        })
        .collect()
}

/// Whether `output` already exists and is the same file as `source`.
fn overwrites_source(output: &Path, source: &str) -> bool {
    match (output.canonicalize(), source_path(source).canonicalize()) {
        (Ok(out), Ok(src)) => out == src,
        _ => false,
    }
}

fn transform_one(
    pipeline: &Pipeline<'_>,
    ctx: &RequestContext,
    source: &str,
    stem: &str,
    request: &ManipulationRequest,
    out_dir: &Path,
) -> TransformReport {
    let transformed = match pipeline.run(ctx, source, &source_extension(source), request) {
        Ok(t) => t,
        Err(e) => return TransformReport::failure(source, e),
    };

    let path = out_dir.join(format!("{stem}.{}", transformed.extension));
    if overwrites_source(&path, source) {
        return TransformReport::failure(
            source,
            format!("refusing to overwrite the source with {}", path.display()),
        );
    }
    if let Err(e) = std::fs::write(&path, &transformed.buffer) {
        return TransformReport::failure(source, e);
    }

    log::info!("{source}: wrote {} bytes to {}", transformed.buffer.len(), path.display());
    TransformReport::success(
        source,
        path,
        &transformed.extension,
        transformed.mime_type,
        transformed.buffer.len(),
    )
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use tempfile::TempDir;

    fn sources(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        DynamicImage::ImageRgb8(RgbImage::new(4, 4)).save(&path).unwrap();
        path
    }

    #[test]
    fn repeated_stems_are_suffixed() {
        let stems = output_stems(&sources(&[
            "a/photo.jpg",
            "b/photo.png",
            "file:///c/photo.webp",
            "other.png",
        ]));
        assert_eq!(stems, vec!["photo", "photo-2", "photo-3", "other"]);
    }

    #[test]
    fn suffix_skips_stems_already_in_the_batch() {
        let stems = output_stems(&sources(&["x.png", "x-2.png", "y/x.jpg"]));
        assert_eq!(stems, vec!["x", "x-2", "x-3"]);
    }

    #[test]
    fn same_file_is_detected_through_relative_paths() {
        let tmp = TempDir::new().unwrap();
        let source = write_png(tmp.path(), "dawn.png");
        let dotted = tmp.path().join(".").join("dawn.png");
        let url = format!("file://{}", source.display());

        assert!(overwrites_source(&dotted, source.to_str().unwrap()));
        assert!(overwrites_source(&dotted, &url));
        assert!(!overwrites_source(&tmp.path().join("dawn.webp"), &url));
    }

    #[test]
    fn transform_into_source_directory_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        let source = write_png(tmp.path(), "dawn.png");
        let before = std::fs::read(&source).unwrap();

        let fetcher = LocalFetcher::default();
        let engine = RustEngine::new();
        let pipeline = Pipeline::new(&fetcher, &engine);
        let src = source.to_str().unwrap();
        let report = transform_one(
            &pipeline,
            &RequestContext::default(),
            src,
            "dawn",
            &ManipulationRequest::from_query("w=2"),
            tmp.path(),
        );

        assert!(!report.is_ok());
        assert!(report.error.unwrap().contains("refusing to overwrite"));
        assert_eq!(std::fs::read(&source).unwrap(), before);
    }

    #[test]
    fn different_format_lands_next_to_source() {
        let tmp = TempDir::new().unwrap();
        let source = write_png(tmp.path(), "dawn.png");

        let fetcher = LocalFetcher::default();
        let engine = RustEngine::new();
        let pipeline = Pipeline::new(&fetcher, &engine);
        let report = transform_one(
            &pipeline,
            &RequestContext::default(),
            source.to_str().unwrap(),
            "dawn",
            &ManipulationRequest::from_query("output=webp"),
            tmp.path(),
        );

        assert!(report.is_ok(), "{report:?}");
        assert_eq!(report.output, Some(tmp.path().join("dawn.webp")));
        assert!(tmp.path().join("dawn.webp").exists());
    }
}
