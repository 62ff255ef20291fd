use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use text_watermark::{
    Color, Error, ExportFormat, Renderer, Session, TextFont, WatermarkSettings,
};

#[derive(Parser)]
#[command(
    name = "text-watermark",
    about = "Overlay a repeating, rotated, semi-transparent text watermark on an image",
    version,
    after_help = "Simple usage: text-watermark photo.jpg --text \"CONFIDENTIAL\"\n\
                  (writes watermarked.png next to the input)\n\n\
                  Accepted inputs: JPEG, PNG, WebP. Flags override values from --settings."
)]
struct Cli {
    /// Input image (.jpg, .jpeg, .png or .webp)
    input: PathBuf,

    /// Output file (default: watermarked.<format> next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format: png, jpeg or webp (default: from --output extension, else png)
    #[arg(short, long)]
    format: Option<ExportFormat>,

    /// JSON settings file, e.g. {"text": "DRAFT", "fontSize": 32}
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Watermark text
    #[arg(short, long)]
    text: Option<String>,

    /// Font size in pixels (12-72)
    #[arg(long)]
    font_size: Option<f32>,

    /// Opacity (0.1-0.8)
    #[arg(long)]
    opacity: Option<f32>,

    /// Rotation in degrees, positive is clockwise (-90 to 90)
    #[arg(long, allow_negative_numbers = true)]
    rotation: Option<f32>,

    /// Extra gap between tiles in pixels (50-300)
    #[arg(long)]
    spacing: Option<f32>,

    /// Text color as #RGB or #RRGGBB
    #[arg(long)]
    color: Option<Color>,

    /// TrueType/OpenType font file (default: embedded DejaVu Sans)
    #[arg(long)]
    font: Option<PathBuf>,

    /// Clamp numeric settings into their supported ranges
    #[arg(long)]
    clamp: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::new("text_watermark=debug")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<(), Error> {
    let settings = load_settings(cli)?;
    if !settings.has_watermark() {
        return Err(Error::ExportUnavailable(
            "watermark text is empty (use --text or a settings file)",
        ));
    }

    let renderer = match &cli.font {
        Some(path) => Renderer::with_font(TextFont::open(path)?),
        None => Renderer::new()?,
    };

    let mut session = Session::with_renderer(renderer);
    session.set_settings(settings)?;
    session.upload_file(&cli.input)?;

    let format = output_format(cli)?;
    let file = session.export(format)?;
    let output = match &cli.output {
        Some(path) => path.clone(),
        None => default_output_path(&cli.input, format),
    };
    file.save_as(&output)?;

    if !cli.quiet {
        let (width, height) = session
            .image()
            .map_or((0, 0), |img| (img.width(), img.height()));
        eprintln!(
            "[OK] {} ({width}x{height}, {} bytes)",
            output.display(),
            file.bytes.len()
        );
    }
    Ok(())
}

/// Settings file first, then individual flags on top.
fn load_settings(cli: &Cli) -> Result<WatermarkSettings, Error> {
    let mut settings = match &cli.settings {
        Some(path) => WatermarkSettings::from_json(&std::fs::read_to_string(path)?)?,
        None => WatermarkSettings::default(),
    };

    if let Some(text) = &cli.text {
        settings.text.clone_from(text);
    }
    if let Some(v) = cli.font_size {
        settings.font_size = v;
    }
    if let Some(v) = cli.opacity {
        settings.opacity = v;
    }
    if let Some(v) = cli.rotation {
        settings.rotation = v;
    }
    if let Some(v) = cli.spacing {
        settings.spacing = v;
    }
    if let Some(v) = cli.color {
        settings.color = v;
    }

    Ok(if cli.clamp { settings.clamped() } else { settings })
}

fn output_format(cli: &Cli) -> Result<ExportFormat, Error> {
    if let Some(format) = cli.format {
        return Ok(format);
    }
    match cli.output.as_deref().and_then(Path::extension) {
        Some(ext) => ext.to_string_lossy().parse(),
        None => Ok(ExportFormat::default()),
    }
}

/// `watermarked.<ext>` in the input's directory.
fn default_output_path(input: &Path, format: ExportFormat) -> PathBuf {
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format.file_name())
}
