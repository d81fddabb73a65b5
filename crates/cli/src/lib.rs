use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_engine::{ByteFetcher, DocumentSource, LopdfEngine, PdfEngine, SourceFetcher};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use viewer_core::{
    AccessPolicy, ScrollMetrics, SecurePdfViewer, ViewerConfig, ViewerEvent, ViewerOptions,
};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

#[derive(Debug, Parser)]
#[command(name = "secure-viewer")]
#[command(about = "Headless driver for the secure document viewer")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args)]
struct SourceArgs {
    /// File path or http(s) URL.
    #[arg(value_name = "SOURCE")]
    source: String,
    /// Bearer token sent with HTTP requests.
    #[arg(long)]
    token: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable document metadata.
    Info {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Render pages through the viewer and write one PNG per page.
    Render {
        #[command(flatten)]
        source: SourceArgs,
        /// Zoom factor; defaults to the responsive scale for --viewport-width.
        #[arg(long)]
        scale: Option<f32>,
        /// Device pixel ratio of the target display.
        #[arg(long)]
        dpr: Option<f32>,
        /// 1-based pages to render, comma separated. Defaults to all pages.
        #[arg(long, value_delimiter = ',')]
        pages: Vec<u32>,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        #[arg(long, default_value_t = 1024.0)]
        viewport_width: f32,
        /// Render as a restricted viewer.
        #[arg(long)]
        restricted: bool,
        /// JSON viewer configuration; SECURE_VIEWER_* variables are used otherwise.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Feed scroll offsets to the viewer and print each page change.
    Track {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, value_delimiter = ',', required = true)]
        offsets: Vec<f32>,
        #[arg(long, default_value_t = 900.0)]
        viewport_height: f32,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    source: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct RenderOutput {
    source: String,
    page_count: u32,
    scale: f32,
    restricted: bool,
    selection_enabled: bool,
    pages: Vec<RenderedPage>,
    failed: Vec<u32>,
}

#[derive(Debug, Serialize)]
struct RenderedPage {
    page: u32,
    width_px: u32,
    height_px: u32,
    path: String,
}

#[derive(Debug, Serialize)]
struct PageChange {
    offset: f32,
    page: u32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { source } => run_info(&source),
        Commands::Render {
            source,
            scale,
            dpr,
            pages,
            output_dir,
            viewport_width,
            restricted,
            config,
        } => {
            let config = load_config(config.as_deref(), dpr)?;
            let access = AccessPolicy::from_privileged(!restricted);
            let mut options = ViewerOptions::default()
                .with_access(access)
                .with_config(config)
                .with_viewport(viewport_width, 768.0);
            if let Some(scale) = scale {
                options = options.with_initial_scale(scale);
            }
            run_render(&source, options, &pages, &output_dir)
        }
        Commands::Track { source, offsets, viewport_height } => {
            run_track(&source, &offsets, viewport_height)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_info(args: &SourceArgs) -> Result<()> {
    let source = DocumentSource::parse(&args.source);
    let bytes = fetcher(args)
        .fetch(&source)
        .with_context(|| format!("failed to fetch {}", source.describe()))?;

    let document = LopdfEngine::new().get_document(bytes).context("failed to open PDF")?;
    let page_count = document.num_pages();
    let first_page_size_pt = if page_count > 0 {
        let size = document.get_page(1)?.size();
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let payload = InfoOutput { source: args.source.clone(), page_count, first_page_size_pt };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

fn run_render(
    args: &SourceArgs,
    options: ViewerOptions,
    pages: &[u32],
    output_dir: &Path,
) -> Result<()> {
    let mut viewer = open_viewer(args, options)?;
    let page_count = viewer.num_pages();

    let pages: Vec<u32> = if pages.is_empty() { (1..=page_count).collect() } else { pages.to_vec() };
    if let Some(page) = pages.iter().find(|page| **page == 0 || **page > page_count) {
        anyhow::bail!("page {page} out of range (document has {page_count} pages)");
    }

    for &page in &pages {
        viewer.on_visible(page);
    }

    let mut failed = Vec::new();
    while !viewer.is_idle() {
        let report = viewer.poll(Instant::now());
        failed.extend(report.failed);
        std::thread::sleep(POLL_INTERVAL);
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let mut rendered = Vec::new();
    for &page in &pages {
        let Some(image) = viewer.surface(page).and_then(|surface| surface.pixels()) else {
            continue;
        };
        let path = output_dir.join(format!("page-{page}.png"));
        image
            .save(&path)
            .with_context(|| format!("failed to write image to {}", path.display()))?;
        rendered.push(RenderedPage {
            page,
            width_px: image.width(),
            height_px: image.height(),
            path: path.display().to_string(),
        });
    }

    let payload = RenderOutput {
        source: args.source.clone(),
        page_count,
        scale: viewer.scale(),
        restricted: viewer.access().is_restricted(),
        selection_enabled: viewer.selection_enabled(),
        pages: rendered,
        failed,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    viewer.teardown();
    Ok(())
}

fn run_track(args: &SourceArgs, offsets: &[f32], viewport_height: f32) -> Result<()> {
    let options = ViewerOptions::default().with_viewport(1024.0, viewport_height);
    let mut viewer = open_viewer(args, options)?;

    let (sender, receiver) = mpsc::channel();
    viewer.set_on_page_change(Box::new(move |page| {
        let _ = sender.send(page);
    }));

    let scroll_height = viewer.layout().total_height();
    let now = Instant::now();
    for &offset in offsets {
        let metrics = ScrollMetrics {
            scroll_offset: offset,
            viewport_height,
            scroll_height,
            ..ScrollMetrics::default()
        };
        viewer.handle_event(ViewerEvent::Scroll(metrics), now);

        for page in receiver.try_iter() {
            println!("{}", serde_json::to_string(&PageChange { offset, page })?);
        }
    }

    viewer.teardown();
    Ok(())
}

fn open_viewer(args: &SourceArgs, options: ViewerOptions) -> Result<SecurePdfViewer> {
    let mut viewer =
        SecurePdfViewer::new(Arc::new(LopdfEngine::new()), Arc::new(fetcher(args)), options);
    let source = DocumentSource::parse(&args.source);

    if let Err(err) = viewer.load_document(source) {
        let prompt = err.retry_prompt();
        return Err(anyhow::Error::new(err).context(format!("failed to open document ({prompt})")));
    }

    log::info!("opened {} ({} pages)", args.source, viewer.num_pages());
    Ok(viewer)
}

fn fetcher(args: &SourceArgs) -> SourceFetcher {
    match &args.token {
        Some(token) => SourceFetcher::new().with_bearer_token(token.clone()),
        None => SourceFetcher::new(),
    }
}

fn load_config(path: Option<&Path>, dpr: Option<f32>) -> Result<ViewerConfig> {
    let config = match path {
        Some(path) => ViewerConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ViewerConfig::from_env().context("invalid SECURE_VIEWER_* environment")?,
    };

    match dpr {
        Some(ratio) if !(ratio > 0.0) => anyhow::bail!("--dpr must be positive"),
        Some(ratio) => Ok(config.with_device_pixel_ratio(ratio)),
        None => Ok(config),
    }
}
