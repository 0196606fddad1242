use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};

use cardsheet::{
    BackSource, BacksJob, FrontsJob, RenderThreading, RunSummary, SheetConfig, SlotMatching,
};

#[derive(Parser, Debug)]
#[command(name = "cardsheet", version, about = "Lay out card artwork onto printable 8-up sheets")]
struct Cli {
    /// Log debug output (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render card fronts from a manifest into a multi-page PDF.
    Fronts(FrontsArgs),
    /// Render one sheet of card backs.
    Backs(BacksArgs),
}

#[derive(Args, Debug)]
struct SheetArgs {
    /// Cut-line template PDF (first page is used).
    #[arg(long)]
    template: Option<PathBuf>,

    /// Output PDF path.
    #[arg(long)]
    out: PathBuf,

    /// JSON layout config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Uniform offset in millimetres, as `X,Y`.
    #[arg(long, value_parser = parse_offset, allow_hyphen_values = true)]
    offset_mm: Option<[f64; 2]>,

    /// Printed card width in millimetres.
    #[arg(long)]
    card_width_mm: Option<f64>,

    /// Draw horizontal edge guides.
    #[arg(long)]
    edge_guides: bool,

    /// Draw vertical column guides.
    #[arg(long)]
    column_guides: bool,

    /// Skip recompression.
    #[arg(long)]
    no_compress: bool,

    /// Ghostscript executable.
    #[arg(long)]
    gs: Option<String>,

    /// Keep per-page PDFs in this directory.
    #[arg(long)]
    keep_pages: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FrontsArgs {
    /// Card manifest XML.
    #[arg(long)]
    manifest: PathBuf,

    /// Directory holding card front images.
    #[arg(long)]
    assets: PathBuf,

    /// How cards are matched to image files.
    #[arg(long = "match", value_enum)]
    match_mode: Option<MatchChoice>,

    /// Render pages in parallel.
    #[arg(long)]
    parallel: bool,

    /// Worker threads for --parallel.
    #[arg(long)]
    threads: Option<usize>,

    #[command(flatten)]
    sheet: SheetArgs,
}

#[derive(Args, Debug)]
struct BacksArgs {
    /// Card back image.
    #[arg(long, conflicts_with = "manifest", required_unless_present = "manifest")]
    image: Option<PathBuf>,

    /// Manifest naming the card back.
    #[arg(long, requires = "backs_dir")]
    manifest: Option<PathBuf>,

    /// Directory holding card back images.
    #[arg(long)]
    backs_dir: Option<PathBuf>,

    #[command(flatten)]
    sheet: SheetArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MatchChoice {
    Identity,
    Name,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let summary = match cli.cmd {
        Command::Fronts(args) => cmd_fronts(args)?,
        Command::Backs(args) => cmd_backs(args)?,
    };
    tracing::info!(
        pages = summary.pages,
        slots = summary.slots,
        filled = summary.filled_slots,
        unique_assets = summary.unique_assets,
        compressed = summary.compressed_pages,
        blank = summary.blank_render_failures,
        "done"
    );
    Ok(())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("cardsheet=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_offset(s: &str) -> Result<[f64; 2], String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("bad offset component '{v}': {e}"))
    };
    Ok([parse(x)?, parse(y)?])
}

fn load_config(args: &SheetArgs) -> anyhow::Result<SheetConfig> {
    let mut cfg = match &args.config {
        Some(path) => SheetConfig::from_path(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => SheetConfig::default(),
    };
    if let Some(offset) = args.offset_mm {
        cfg.offset_mm = offset;
    }
    if let Some(width) = args.card_width_mm {
        cfg.target_width_mm = width;
    }
    if args.edge_guides && cfg.guides.edges.is_none() {
        cfg.guides.edges = Some(Default::default());
    }
    if args.column_guides && cfg.guides.columns.is_none() {
        cfg.guides.columns = Some(Default::default());
    }
    if args.no_compress {
        cfg.compression.enabled = false;
    }
    if let Some(gs) = &args.gs {
        cfg.compression.program = gs.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

fn cmd_fronts(args: FrontsArgs) -> anyhow::Result<RunSummary> {
    let mut config = load_config(&args.sheet)?;
    if let Some(choice) = args.match_mode {
        config.match_mode = match choice {
            MatchChoice::Identity => SlotMatching::Identity,
            MatchChoice::Name => SlotMatching::Name,
        };
    }

    let job = FrontsJob {
        manifest: args.manifest,
        assets_dir: args.assets,
        template: args.sheet.template,
        output: args.sheet.out,
        keep_pages: args.sheet.keep_pages,
        config,
        threading: RenderThreading {
            parallel: args.parallel,
            threads: args.threads,
        },
    };
    Ok(cardsheet::render_fronts(&job)?)
}

fn cmd_backs(args: BacksArgs) -> anyhow::Result<RunSummary> {
    let config = load_config(&args.sheet)?;
    let source = match (args.image, args.manifest, args.backs_dir) {
        (Some(image), _, _) => BackSource::Image(image),
        (None, Some(manifest), Some(backs_dir)) => BackSource::Manifest {
            manifest,
            backs_dir,
        },
        _ => anyhow::bail!("pass --image, or --manifest together with --backs-dir"),
    };

    let job = BacksJob {
        source,
        template: args.sheet.template,
        output: args.sheet.out,
        keep_pages: args.sheet.keep_pages,
        config,
    };
    Ok(cardsheet::render_backs(&job)?)
}
