use clap::{Parser, Subcommand, ValueEnum};
use fiducial_pose::aruco::builtins::{builtin_dictionary, BUILTIN_DICTIONARY_NAMES};
use fiducial_pose::aruco::draw_marker;
use fiducial_pose::io::{CalibrationProvider, ImageFileSource, JsonLinesSink, RawStreamSource};
use fiducial_pose::{
    ImageFormat, JsonCalibration, MarkerPipeline, PipelineConfig, PipelineError,
};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "fiducial-pose",
    version,
    about = "Detect square fiducial markers and estimate their pose"
)]
struct Cli {
    /// Log level for stderr diagnostics [default: $FIDUCIAL_POSE_LOG or warn]
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,
    /// Emit structured JSON logs (requires the `tracing` feature).
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a raw frame stream (stdin by default), printing JSON lines
    Run {
        #[arg(long)]
        config: PathBuf,
        /// Overrides `calibration_path` from the config
        #[arg(long)]
        calibration: Option<PathBuf>,
        #[arg(long)]
        width: usize,
        #[arg(long)]
        height: usize,
        /// Overrides `image_format` from the config (gray8, nv12)
        #[arg(long)]
        format: Option<ImageFormat>,
        /// Raw input file; `-` or absent reads stdin
        #[arg(long)]
        input: Option<PathBuf>,
        /// Stamp frames at this interval instead of wall-clock time
        #[arg(long)]
        frame_interval_ns: Option<u64>,
    },
    /// Detect markers in image files, printing JSON lines
    Detect {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        calibration: Option<PathBuf>,
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Write a marker image (PNG) with a white quiet zone
    Render {
        #[arg(long, default_value = "DICT_4X4_50")]
        dictionary: String,
        #[arg(long)]
        id: u32,
        #[arg(long, default_value_t = 20)]
        cell_px: usize,
        /// Quiet zone width in cells
        #[arg(long, default_value_t = 1)]
        margin: usize,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print the default pipeline configuration
    DefaultConfig,
    /// List the built-in dictionaries
    Dictionaries,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => Self::Off,
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("{path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("unknown dictionary {0} (see `fiducial-pose dictionaries`)")]
    UnknownDictionary(String),
    #[error("id {id} is outside {dictionary}")]
    UnknownId { dictionary: String, id: u32 },
    #[error("cell size must be positive")]
    EmptyCell,
    #[error("invalid frame geometry: {0}")]
    Geometry(#[from] fiducial_pose::core::ImageError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_json);

    let result = match cli.command {
        Command::Run {
            config,
            calibration,
            width,
            height,
            format,
            input,
            frame_interval_ns,
        } => run_cmd(
            &config,
            calibration,
            width,
            height,
            format,
            input.as_deref(),
            frame_interval_ns,
        ),
        Command::Detect {
            config,
            calibration,
            images,
        } => detect_cmd(config.as_deref(), calibration, images),
        Command::Render {
            dictionary,
            id,
            cell_px,
            margin,
            output,
        } => render_cmd(&dictionary, id, cell_px, margin, &output),
        Command::DefaultConfig => default_config_cmd(),
        Command::Dictionaries => {
            for name in BUILTIN_DICTIONARY_NAMES {
                println!("{name}");
            }
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_level: Option<LogLevel>, json: bool) {
    fiducial_pose::core::init_tracing(json);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: Option<LogLevel>, json: bool) {
    if json {
        eprintln!("warning: --log-json needs the `tracing` feature; using plain logs");
    }
    let level = match level {
        Some(level) => level.into(),
        None => fiducial_pose::core::level_from_env(log::LevelFilter::Warn),
    };
    let _ = fiducial_pose::core::init_with_level(level);
}

fn load_config(path: &Path) -> Result<PipelineConfig, CliError> {
    Ok(PipelineConfig::load_json(path).map_err(PipelineError::from)?)
}

fn build_pipeline(
    config: &PipelineConfig,
    calibration: Option<PathBuf>,
) -> Result<MarkerPipeline, CliError> {
    let pipeline = match calibration {
        Some(path) => {
            let camera = JsonCalibration::new(path)
                .load()
                .map_err(PipelineError::from)?;
            MarkerPipeline::new(config, camera)?
        }
        None => MarkerPipeline::from_config(config)?,
    };
    Ok(pipeline)
}

fn run_cmd(
    config: &Path,
    calibration: Option<PathBuf>,
    width: usize,
    height: usize,
    format: Option<ImageFormat>,
    input: Option<&Path>,
    frame_interval_ns: Option<u64>,
) -> Result<(), CliError> {
    let mut config = load_config(config)?;
    if let Some(format) = format {
        config.image_format = format;
    }
    let pipeline = build_pipeline(&config, calibration)?;

    let reader: Box<dyn Read> = match input {
        Some(path) if path != Path::new("-") => {
            let file = File::open(path).map_err(|source| CliError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            Box::new(BufReader::new(file))
        }
        _ => Box::new(io::stdin().lock()),
    };
    let mut source = RawStreamSource::new(reader, config.image_format, width, height)?;
    if let Some(interval) = frame_interval_ns {
        source = source.with_frame_clock(0, interval);
    }
    let mut sink = JsonLinesSink::new(BufWriter::new(io::stdout().lock()));
    let frames = pipeline.run(&mut source, &mut sink)?;
    log::info!("processed {frames} frames");
    Ok(())
}

fn detect_cmd(
    config: Option<&Path>,
    calibration: Option<PathBuf>,
    images: Vec<PathBuf>,
) -> Result<(), CliError> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };
    let pipeline = build_pipeline(&config, calibration)?;
    let mut source = ImageFileSource::new(images);
    let mut sink = JsonLinesSink::new(BufWriter::new(io::stdout().lock()));
    pipeline.run(&mut source, &mut sink)?;
    Ok(())
}

fn render_cmd(
    dictionary: &str,
    id: u32,
    cell_px: usize,
    margin: usize,
    output: &Path,
) -> Result<(), CliError> {
    if cell_px == 0 {
        return Err(CliError::EmptyCell);
    }
    let dict = builtin_dictionary(dictionary)
        .ok_or_else(|| CliError::UnknownDictionary(dictionary.to_string()))?;
    let marker = draw_marker(&dict, id, cell_px).ok_or_else(|| CliError::UnknownId {
        dictionary: dictionary.to_string(),
        id,
    })?;

    let pad = margin * cell_px;
    let side = marker.width + 2 * pad;
    let out = image::GrayImage::from_fn(side as u32, side as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let inside =
            (pad..pad + marker.width).contains(&x) && (pad..pad + marker.height).contains(&y);
        image::Luma([if inside { marker.get(x - pad, y - pad) } else { 255 }])
    });
    out.save(output)?;
    log::info!("wrote {} ({side}x{side})", output.display());
    Ok(())
}

fn default_config_cmd() -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(&PipelineConfig::default())?;
    println!("{json}");
    Ok(())
}
