use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "facepatch", version)]
struct Cli {
    /// Session options JSON (defaults apply for anything it omits).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a drag on a displayed image and print the committed square as JSON.
    Select(SelectArgs),
    /// Extract a square region to PNG, downscaled to the configured maximum.
    Crop(CropArgs),
    /// Feather-blend a patch PNG into a base PNG over a square region.
    Composite(CompositeArgs),
    /// Render the before/after wipe view of a base and a composite.
    Compare(CompareArgs),
    /// Write the feather mask for a patch size as a grayscale PNG.
    Mask(MaskArgs),
}

#[derive(Parser, Debug)]
struct SelectArgs {
    /// Natural image width.
    #[arg(long)]
    width: u32,

    /// Natural image height.
    #[arg(long)]
    height: u32,

    /// Display rect as `x0,y0,x1,y1`. Defaults to 1:1 at the origin.
    #[arg(long, value_parser = parse_rect)]
    display: Option<facepatch::Rect>,

    /// Pointer-down position `x,y` in display coordinates.
    #[arg(long, value_parser = parse_point)]
    from: facepatch::Point,

    /// Pointer-up position `x,y` in display coordinates.
    #[arg(long, value_parser = parse_point)]
    to: facepatch::Point,
}

#[derive(Parser, Debug)]
struct CropArgs {
    /// Source image.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Square region as `x,y,size` in native pixels.
    #[arg(long = "box", value_parser = parse_box)]
    region: facepatch::SelectionBox,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct CompositeArgs {
    /// Base photo.
    #[arg(long)]
    base: PathBuf,

    /// Generated patch.
    #[arg(long)]
    patch: PathBuf,

    /// Target square as `x,y,size` in the base's native pixels.
    #[arg(long = "box", value_parser = parse_box)]
    region: facepatch::SelectionBox,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct CompareArgs {
    /// Original photo ("before").
    #[arg(long)]
    base: PathBuf,

    /// Composited photo ("after").
    #[arg(long)]
    composite: PathBuf,

    /// Wipe position in [0, 1]; defaults to the configured split.
    #[arg(long)]
    split: Option<f32>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct MaskArgs {
    #[arg(long)]
    width: u32,

    #[arg(long)]
    height: u32,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let opts = load_opts(cli.config.as_deref())?;
    match cli.cmd {
        Command::Select(args) => cmd_select(&opts, args),
        Command::Crop(args) => cmd_crop(&opts, args),
        Command::Composite(args) => cmd_composite(&opts, args),
        Command::Compare(args) => cmd_compare(&opts, args),
        Command::Mask(args) => cmd_mask(&opts, args),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("FACEPATCH_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_opts(path: Option<&Path>) -> anyhow::Result<facepatch::SessionOpts> {
    let opts = match path {
        Some(p) => facepatch::SessionOpts::load(p)
            .with_context(|| format!("load config '{}'", p.display()))?,
        None => facepatch::SessionOpts::default(),
    }
    .with_env_overrides();
    opts.validate()?;
    Ok(opts)
}

fn read_bitmap(path: &Path) -> anyhow::Result<facepatch::Bitmap> {
    let bytes = std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
    let bmp = facepatch::decode_bitmap(&bytes)
        .with_context(|| format!("decode image '{}'", path.display()))?;
    Ok(bmp)
}

fn write_png(path: &Path, bmp: &facepatch::Bitmap) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let bytes = facepatch::encode_png(bmp)?;
    std::fs::write(path, bytes).with_context(|| format!("write png '{}'", path.display()))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn cmd_select(opts: &facepatch::SessionOpts, args: SelectArgs) -> anyhow::Result<()> {
    let display = args.display.unwrap_or_else(|| {
        facepatch::Rect::new(0.0, 0.0, f64::from(args.width), f64::from(args.height))
    });
    let viewport = facepatch::Viewport::new(display, args.width, args.height)?;
    let mut selector = facepatch::SquareSelector::new(facepatch::SquareRules {
        min_size: opts.min_selection_px,
    });
    selector.handle(facepatch::GestureEvent::Start(args.from), &viewport);
    selector.handle(facepatch::GestureEvent::Move(args.to), &viewport);
    let change = selector.handle(facepatch::GestureEvent::End, &viewport);

    let selection = change.and_then(facepatch::SelectionChange::selection);
    let out = serde_json::json!({ "selection": selection });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_crop(opts: &facepatch::SessionOpts, args: CropArgs) -> anyhow::Result<()> {
    let src = read_bitmap(&args.in_path)?;
    let crop = facepatch::extract(&src, args.region, opts.max_crop_dim)?;
    write_png(&args.out, &crop)
}

fn cmd_composite(opts: &facepatch::SessionOpts, args: CompositeArgs) -> anyhow::Result<()> {
    let base = read_bitmap(&args.base)?;
    let patch = read_bitmap(&args.patch)?;
    let out = facepatch::composite_with_ratio(&base, &patch, args.region, opts.feather_ratio)?;
    write_png(&args.out, &out)
}

fn cmd_compare(opts: &facepatch::SessionOpts, args: CompareArgs) -> anyhow::Result<()> {
    let base = read_bitmap(&args.base)?;
    let composite = read_bitmap(&args.composite)?;
    let split = facepatch::CompareState::new(args.split.unwrap_or(opts.default_split)).split();
    let out = facepatch::render_compare(&base, Some(&composite), split)?;
    write_png(&args.out, &out)
}

fn cmd_mask(opts: &facepatch::SessionOpts, args: MaskArgs) -> anyhow::Result<()> {
    let mask = facepatch::FeatherMask::new(args.width, args.height, opts.feather_ratio)?;
    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    mask.to_luma8()
        .save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;
    eprintln!(
        "wrote {} (feather {:.1}px)",
        args.out.display(),
        mask.feather()
    );
    Ok(())
}

fn parse_f64_list(s: &str, n: usize) -> Result<Vec<f64>, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("'{p}': {e}")))
        .collect::<Result<_, _>>()?;
    if parts.len() != n {
        return Err(format!("expected {n} comma-separated numbers, got {}", parts.len()));
    }
    Ok(parts)
}

fn parse_point(s: &str) -> Result<facepatch::Point, String> {
    let v = parse_f64_list(s, 2)?;
    Ok(facepatch::Point::new(v[0], v[1]))
}

fn parse_rect(s: &str) -> Result<facepatch::Rect, String> {
    let v = parse_f64_list(s, 4)?;
    Ok(facepatch::Rect::new(v[0], v[1], v[2], v[3]))
}

fn parse_box(s: &str) -> Result<facepatch::SelectionBox, String> {
    let parts: Vec<u32> = s
        .split(',')
        .map(|p| p.trim().parse::<u32>().map_err(|e| format!("'{p}': {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [x, y, size] => Ok(facepatch::SelectionBox::square(*x, *y, *size)),
        _ => Err(format!("expected x,y,size, got '{s}'")),
    }
}
