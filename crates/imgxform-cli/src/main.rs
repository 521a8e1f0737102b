use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use imgxform_core::{
    sniff, FilterType, ImageFormat, Quality, RawImage, TransformConfig, TransformOptions,
    Transformer,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Resampling filter choices exposed on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Filter {
    Nearest,
    Bilinear,
    Lanczos3,
}

impl From<Filter> for FilterType {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Nearest => FilterType::Nearest,
            Filter::Bilinear => FilterType::Bilinear,
            Filter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Parser)]
#[command(name = "imgxform")]
#[command(about = "Resize and re-encode JPEG, PNG and WebP images")]
#[command(long_about = "\
Resize and re-encode JPEG, PNG and WebP images

The source format is detected from the file contents. With no size and no
format the input is copied to the output unchanged.

Sizing:
  --width and --height   exact output size, aspect ratio not preserved
  --width only           height follows the source aspect ratio
  --height only          width follows the source aspect ratio

Set RUST_LOG=debug to see codec initialization and per-stage timing.")]
#[command(version)]
struct Cli {
    /// Source image, or '-' to read from stdin
    input: PathBuf,

    /// Output file (stdout if omitted). The format's extension is appended
    /// when the path has none.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target width in pixels
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    width: Option<u32>,

    /// Target height in pixels
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    height: Option<u32>,

    /// Output format: jpg, jpeg, png or webp (defaults to the source format)
    #[arg(short, long, value_parser = parse_format)]
    format: Option<ImageFormat>,

    /// Quality for lossy output formats (1-100)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Quality used when --quality is not given
    #[arg(long, default_value_t = Quality::DEFAULT.value(), value_parser = clap::value_parser!(u8).range(1..=100))]
    default_quality: u8,

    /// Resampling filter
    #[arg(long, value_enum, default_value = "lanczos3")]
    filter: Filter,

    /// Rotate JPEG sources according to their EXIF orientation
    #[arg(long)]
    auto_orient: bool,

    /// Reject sources or resize targets with more pixels than this
    #[arg(long, default_value_t = TransformConfig::default().max_source_pixels)]
    max_pixels: u64,
}

impl Cli {
    fn config(&self) -> TransformConfig {
        TransformConfig {
            default_quality: Quality::new(self.default_quality),
            resize_filter: self.filter.into(),
            apply_orientation: self.auto_orient,
            max_source_pixels: self.max_pixels,
        }
    }

    fn options(&self) -> TransformOptions {
        let mut options = TransformOptions::new();
        if let Some(width) = self.width {
            options = options.width(width);
        }
        if let Some(height) = self.height {
            options = options.height(height);
        }
        if let Some(format) = self.format {
            options = options.format(format);
        }
        if let Some(quality) = self.quality {
            options = options.quality(quality);
        }
        options
    }
}

fn parse_format(value: &str) -> Result<ImageFormat, String> {
    value
        .parse()
        .map_err(|_| format!("unsupported output format '{value}' (expected jpg, png or webp)"))
}

/// Append the format's extension when `path` has none.
fn output_path(path: &Path, format: Option<ImageFormat>) -> PathBuf {
    match format {
        Some(format) if path.extension().is_none() => path.with_extension(format.extension()),
        _ => path.to_path_buf(),
    }
}

async fn read_input(input: &Path) -> std::io::Result<Vec<u8>> {
    if input == Path::new("-") {
        let mut bytes = Vec::new();
        tokio::io::stdin().read_to_end(&mut bytes).await?;
        Ok(bytes)
    } else {
        tokio::fs::read(input).await
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let raw = RawImage::from(read_input(&cli.input).await?);
    log::debug!("Read {} bytes from {}", raw.len(), cli.input.display());

    let transformer = Transformer::new(cli.config());
    let encoded = transformer.transform(&raw, &cli.options()).await?;

    match &cli.output {
        Some(path) => {
            // Pass-through output may not be a recognised image; keep its path as given
            let format = cli.format.or_else(|| sniff::detect(&encoded).ok());
            let path = output_path(path, format);
            tokio::fs::write(&path, &encoded).await?;
            log::info!("Wrote {} bytes to {}", encoded.len(), path.display());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&encoded).await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}
