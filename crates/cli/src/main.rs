use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use facemask_core::anonymization::domain::anonymization_config::{
    parse_size, AnonymizationConfig, MaskShape, ReplaceMode, DEFAULT_MASK_SCALE, DEFAULT_THRESHOLD,
};
use facemask_core::anonymization::infrastructure::mask_compositor::CpuMaskCompositor;
use facemask_core::detection::domain::face_detector::{FaceDetector, InferenceDetector, SharedDetector};
use facemask_core::detection::infrastructure::execution_provider::{ExecutionBackend, InferenceBackend};
use facemask_core::detection::infrastructure::onnx_centerface_adapter::OnnxCenterFaceAdapter;
use facemask_core::pipeline::anonymize_image_use_case::AnonymizeImageUseCase;
use facemask_core::pipeline::anonymize_video_use_case::AnonymizeVideoUseCase;
use facemask_core::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
use facemask_core::pipeline::pipeline_executor::ProgressFn;
use facemask_core::shared::constants::{CENTERFACE_MODEL_NAME, CENTERFACE_MODEL_URL};
use facemask_core::shared::error::{AnonymizeError, PipelineAbort};
use facemask_core::shared::media_kind::{anonymized_output_path, collect_media_files, MediaKind};
use facemask_core::shared::model_resolver;
use facemask_core::video::domain::video_reader::VideoReader;
use facemask_core::video::domain::video_writer::VideoWriter;
use facemask_core::video::infrastructure::fanout_writer::FanoutWriter;
use facemask_core::video::infrastructure::ffmpeg_reader::{camera_device_path, FfmpegReader};
use facemask_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use facemask_core::video::infrastructure::image_file_reader::ImageFileReader;
use facemask_core::video::infrastructure::image_file_writer::ImageFileWriter;
use facemask_core::video::infrastructure::preview_writer::PreviewWriter;

/// Video anonymization by face detection.
#[derive(Parser, Debug)]
#[command(name = "facemask", version)]
struct Cli {
    /// Video, image or directory path, or a camera name like <video0>.
    #[arg(default_value = "<video0>")]
    input: String,

    /// Output file (defaults to the input path with an "_anonymized" suffix).
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Detection threshold; lower finds more faces and more false positives.
    #[arg(long, short, default_value_t = DEFAULT_THRESHOLD)]
    thresh: f64,

    /// Downscale frames to WxH for inference, e.g. 640x360.
    #[arg(long, short, value_parser = parse_size)]
    scale: Option<(u32, u32)>,

    /// Disable the preview window for single videos and cameras.
    #[arg(long, short = 'q')]
    disable_gui: bool,

    /// Draw detection numbers and scores into the output.
    #[arg(long, short = 'e')]
    enable_enum: bool,

    /// Use boxes instead of ellipse masks.
    #[arg(long)]
    enable_boxes: bool,

    /// Mask size relative to the detected box (>= 1.0).
    #[arg(long, default_value_t = DEFAULT_MASK_SCALE)]
    mask_scale: f64,

    /// Filter for face regions: solid, blur or none.
    #[arg(long, default_value = "blur")]
    replacewith: ReplaceMode,

    /// Inference backend: auto or cpu.
    #[arg(long, default_value = "auto")]
    backend: InferenceBackend,

    /// Only process files with this extension when the input is a directory.
    #[arg(long, default_value = "*")]
    ext: String,

    /// Path to CenterFace ONNX weights (downloaded on first use if omitted).
    #[arg(long)]
    model: Option<PathBuf>,
}

/// What the positional input refers to.
#[derive(Debug, PartialEq)]
enum Input {
    Camera(u32),
    File(PathBuf),
    Directory(PathBuf),
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let input = validate(&cli)?;
    let config = build_config(&cli)?;

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))?;

    let detector = SharedDetector::new(build_detector(&cli, &config)?);

    match input {
        Input::Camera(index) => {
            let reader = Box::new(FfmpegReader::camera());
            run_video(
                reader,
                &camera_device_path(index),
                cli.output.as_deref(),
                !cli.disable_gui,
                detector,
                &config,
                &cancelled,
            )
        }
        Input::File(path) => {
            let output = cli
                .output
                .clone()
                .unwrap_or_else(|| anonymized_output_path(&path));
            match MediaKind::of_path(&path) {
                MediaKind::Image => run_image(&path, &output, detector, &config),
                MediaKind::Video => run_video(
                    Box::new(FfmpegReader::new()),
                    &path,
                    Some(&output),
                    !cli.disable_gui,
                    detector,
                    &config,
                    &cancelled,
                ),
                _ => Err(format!("{} has an unknown media type", path.display()).into()),
            }
        }
        Input::Directory(dir) => run_directory(&dir, &cli.ext, detector, &config, &cancelled),
    }
}

fn build_config(cli: &Cli) -> Result<AnonymizationConfig, Box<dyn std::error::Error>> {
    let shape = if cli.enable_boxes {
        MaskShape::Box
    } else {
        MaskShape::Ellipse
    };
    Ok(AnonymizationConfig::new(
        cli.thresh,
        cli.scale,
        cli.mask_scale,
        cli.replacewith,
        shape,
        cli.enable_enum,
    )?)
}

fn build_detector(
    cli: &Cli,
    config: &AnonymizationConfig,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let backend = ExecutionBackend::probe(cli.backend);
    let model_path = model_resolver::resolve(
        CENTERFACE_MODEL_NAME,
        CENTERFACE_MODEL_URL,
        cli.model.as_deref(),
        Some(Box::new(download_progress)),
    )?;
    let adapter = OnnxCenterFaceAdapter::new(&model_path, backend)?;
    Ok(Box::new(InferenceDetector::new(
        Box::new(adapter),
        config.threshold,
        config.inference_scale,
    )))
}

#[allow(clippy::too_many_arguments)]
fn run_video(
    reader: Box<dyn VideoReader>,
    input: &Path,
    output: Option<&Path>,
    preview: bool,
    detector: SharedDetector,
    config: &AnonymizationConfig,
    cancelled: &Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sinks: Vec<Box<dyn VideoWriter>> = Vec::new();
    if output.is_some() {
        sinks.push(Box::new(FfmpegWriter::new()));
    }
    if preview {
        sinks.push(Box::new(PreviewWriter::new(cancelled.clone())));
    }
    let writer: Box<dyn VideoWriter> = match sinks.len() {
        1 => sinks.remove(0),
        _ => Box::new(FanoutWriter::new(sinks)),
    };
    // the preview window uses this as its title
    let target = output.unwrap_or(input);

    let summary = AnonymizeVideoUseCase::new(
        reader,
        writer,
        Box::new(detector),
        Box::new(CpuMaskCompositor::new(config)),
        Box::new(ThreadedPipelineExecutor::new()),
    )
    .with_cancel_flag(cancelled.clone())
    .with_progress(frame_progress())
    .execute(input, target);
    eprintln!();

    let summary = summary?;
    if let Some(output) = output {
        log::info!(
            "Output written to {} ({} frames)",
            output.display(),
            summary.frames_emitted
        );
    }
    Ok(())
}

fn run_image(
    input: &Path,
    output: &Path,
    detector: SharedDetector,
    config: &AnonymizationConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut use_case = AnonymizeImageUseCase::new(
        Box::new(ImageFileReader::new()),
        Box::new(ImageFileWriter::new()),
        Box::new(detector),
        Box::new(CpuMaskCompositor::new(config)),
    );
    use_case.execute(input, output)?;
    Ok(())
}

fn run_directory(
    dir: &Path,
    ext: &str,
    detector: SharedDetector,
    config: &AnonymizationConfig,
    cancelled: &Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = collect_media_files(dir, ext)?;
    log::info!("Found {} files in {}", files.len(), dir.display());

    for (i, path) in files.iter().enumerate() {
        if cancelled.load(Ordering::Relaxed) {
            log::info!("Interrupted, {} files left unprocessed", files.len() - i);
            break;
        }
        let output = anonymized_output_path(path);
        let result = match MediaKind::of_path(path) {
            MediaKind::Image => run_image(path, &output, detector.clone(), config),
            MediaKind::Video => {
                eprintln!("[{}/{}] {}", i + 1, files.len(), path.display());
                run_video(
                    Box::new(FfmpegReader::new()),
                    path,
                    Some(&output),
                    false,
                    detector.clone(),
                    config,
                    cancelled,
                )
            }
            _ => {
                log::warn!("Skipping {}: unknown media type", path.display());
                Ok(())
            }
        };
        skip_unreadable(path, result)?;
    }
    Ok(())
}

/// Lets a batch continue past a file that could not be read at all.
/// Failures after output was written still abort.
fn skip_unreadable(
    path: &Path,
    result: Result<(), Box<dyn std::error::Error>>,
) -> Result<(), Box<dyn std::error::Error>> {
    match result {
        Err(e) if is_unreadable(e.as_ref()) => {
            log::warn!("Skipping {}: {e}", path.display());
            Ok(())
        }
        other => other,
    }
}

fn is_unreadable(error: &(dyn std::error::Error + 'static)) -> bool {
    matches!(
        error.downcast_ref::<PipelineAbort>(),
        Some(PipelineAbort {
            last_completed: None,
            error: AnonymizeError::SourceFailure(_),
        })
    )
}

fn validate(cli: &Cli) -> Result<Input, Box<dyn std::error::Error>> {
    let input = match MediaKind::of(&cli.input) {
        MediaKind::Camera(index) => Input::Camera(index),
        _ => {
            let path = PathBuf::from(&cli.input);
            if path.is_dir() {
                Input::Directory(path)
            } else if path.is_file() {
                Input::File(path)
            } else {
                return Err(format!("Input not found: {}", cli.input).into());
            }
        }
    };

    match &input {
        Input::Camera(_) if cli.disable_gui && cli.output.is_none() => {
            return Err("Camera input with --disable-gui needs --output".into());
        }
        Input::Directory(_) if cli.output.is_some() => {
            log::warn!("--output is ignored for directory input; writing next to each file");
        }
        _ => {}
    }
    if cli.ext.trim().is_empty() {
        return Err("--ext must not be empty (use * for all files)".into());
    }
    Ok(input)
}

fn frame_progress() -> ProgressFn {
    Box::new(|current, total| {
        if total > 0 {
            eprint!("\rProcessing frame {current}/{total}");
        } else {
            eprint!("\rProcessing frame {current}");
        }
        true
    })
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
