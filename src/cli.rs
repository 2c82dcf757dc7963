use crate::config::load_config;
use crate::render::{render_svg, write_output_svg};
use crate::scene::{PlacementReport, load_scene};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lblp", version, about = "Place map labels without overlap")]
pub struct Args {
    /// Scene file (.json or .json5)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output file. Defaults to stdout for JSON and SVG.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Canvas width, overrides the scene
    #[arg(short = 'w', long = "width")]
    pub width: Option<f64>,

    /// Canvas height, overrides the scene
    #[arg(short = 'H', long = "height")]
    pub height: Option<f64>,

    /// Scale factor applied to every style distance
    #[arg(short = 's', long = "scale")]
    pub scale: Option<f64>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Svg,
    Png,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(scale) = args.scale {
        anyhow::ensure!(scale > 0.0, "scale factor must be positive, got {scale}");
        config.scale_factor = scale;
    }

    let mut scene = load_scene(&args.input)?;
    if args.width.is_some() {
        scene.width = args.width;
    }
    if args.height.is_some() {
        scene.height = args.height;
    }

    let report = scene.place(&config);
    tracing::info!(
        features = report.features.len(),
        placed = report.placed(),
        "placement pass finished"
    );
    write_report(&report, args.output_format, args.output.as_deref())
}

fn write_report(report: &PlacementReport, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report)?;
            match output {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{json}"),
            }
        }
        OutputFormat::Svg => {
            write_output_svg(&render_svg(report), output)?;
        }
        OutputFormat::Png => {
            let output = ensure_output(output, "png")?;
            write_png(report, output)?;
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
fn write_png(report: &PlacementReport, output: &Path) -> Result<()> {
    crate::render::write_output_png(&render_svg(report), output, report.width, report.height)
}

#[cfg(not(feature = "png"))]
fn write_png(_report: &PlacementReport, _output: &Path) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn ensure_output<'p>(output: Option<&'p Path>, ext: &str) -> Result<&'p Path> {
    output.ok_or_else(|| anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_flags() {
        let args = Args::try_parse_from([
            "lblp", "-i", "scene.json", "-e", "svg", "-w", "640", "-H", "480", "-s", "2",
        ])
        .expect("args");
        assert_eq!(args.input, PathBuf::from("scene.json"));
        assert!(matches!(args.output_format, OutputFormat::Svg));
        assert_eq!(args.width, Some(640.0));
        assert_eq!(args.height, Some(480.0));
        assert_eq!(args.scale, Some(2.0));
    }

    #[test]
    fn png_needs_an_output_path() {
        assert!(ensure_output(None, "png").is_err());
        assert!(ensure_output(Some(Path::new("out.png")), "png").is_ok());
    }
}
