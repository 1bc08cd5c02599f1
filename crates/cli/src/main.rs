use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use vidforensic_core::detection::domain::face_detector::{DetectionParams, FaceDetector};
use vidforensic_core::detection::infrastructure::haar_face_detector::HaarFaceDetector;
use vidforensic_core::detection::infrastructure::model_resolver::ModelResolver;
use vidforensic_core::integrity::digest_verifier::DigestVerifier;
use vidforensic_core::metadata::metadata_extractor::MetadataExtractor;
use vidforensic_core::pipeline::capture_session::CaptureSettings;
use vidforensic_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use vidforensic_core::pipeline::record_video_use_case::{ProgressFn, RecordVideoUseCase};
use vidforensic_core::shared::constants::{
    CASCADE_MODEL_NAME, DEFAULT_CAMERA_INDEX, DEFAULT_DURATION_SECS, DEFAULT_FPS,
    DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, DEFAULT_MIN_NEIGHBORS, DEFAULT_OUTPUT_FILENAME,
    DEFAULT_SCALE_FACTOR, VIDEO_EXTENSIONS,
};
use vidforensic_core::shared::media_metadata::MediaMetadata;
use vidforensic_core::shared::video_handle::VideoHandle;
use vidforensic_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use vidforensic_core::video::infrastructure::ffplay_preview_sink::FfplayPreviewSink;
use vidforensic_core::video::infrastructure::nokhwa_camera::NokhwaCamera;
use vidforensic_core::video::infrastructure::threaded_preview_sink::ThreadedPreviewSink;

/// Record face-annotated video, fingerprint files and inspect media metadata.
#[derive(Parser)]
#[command(name = "vidforensic", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record from the camera, outlining detected faces.
    Record(RecordArgs),
    /// Print the MD5 digest of a file.
    Digest { file: PathBuf },
    /// Check a file against an expected MD5 digest.
    Verify { file: PathBuf, expected: String },
    /// Print duration, frame rate, size and byte size as JSON.
    Metadata { file: PathBuf },
    /// Print digest and metadata of a file as one JSON document.
    Inspect { file: PathBuf },
}

#[derive(Args)]
struct RecordArgs {
    /// Recording length in seconds.
    #[arg(long, default_value_t = DEFAULT_DURATION_SECS)]
    duration: f64,

    /// Output video file.
    #[arg(long, default_value = DEFAULT_OUTPUT_FILENAME)]
    output: PathBuf,

    /// Output frame rate.
    #[arg(long, default_value_t = DEFAULT_FPS)]
    fps: f64,

    #[arg(long, default_value_t = DEFAULT_FRAME_WIDTH)]
    width: u32,

    #[arg(long, default_value_t = DEFAULT_FRAME_HEIGHT)]
    height: u32,

    /// Camera device index.
    #[arg(long, default_value_t = DEFAULT_CAMERA_INDEX)]
    camera: u32,

    /// Detector pyramid step (> 1.0).
    #[arg(long, default_value_t = DEFAULT_SCALE_FACTOR)]
    scale_factor: f64,

    /// Raw hits a face needs to exceed to be reported.
    #[arg(long, default_value_t = DEFAULT_MIN_NEIGHBORS)]
    min_neighbors: u32,

    /// Haar cascade XML (downloaded on first use when omitted).
    #[arg(long)]
    cascade: Option<PathBuf>,

    /// Show a live preview window (requires ffplay).
    #[arg(long)]
    preview: bool,
}

#[derive(Serialize)]
struct InspectReport<'a> {
    path: &'a Path,
    md5: String,
    metadata: &'a MediaMetadata,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Record(args) => run_record(&args),
        Command::Digest { file } => {
            let digest = VideoHandle::new(&file).digest(&DigestVerifier::new())?;
            println!("{digest}  {}", file.display());
            Ok(())
        }
        Command::Verify { file, expected } => run_verify(&file, &expected),
        Command::Metadata { file } => {
            let mut handle = VideoHandle::new(&file);
            let metadata = handle.metadata(&MetadataExtractor::with_ffmpeg())?;
            println!("{}", serde_json::to_string_pretty(metadata)?);
            Ok(())
        }
        Command::Inspect { file } => run_inspect(&file),
    }
}

fn run_record(args: &RecordArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = capture_settings(args);
    validate_record(&settings)?;

    let detector = build_detector(args.cascade.as_deref())?;
    let cancelled = Arc::new(AtomicBool::new(false));
    spawn_stop_listener(cancelled.clone());

    let mut use_case = RecordVideoUseCase::new(
        Box::new(NokhwaCamera::new()),
        Box::new(FfmpegWriter::new()),
        detector,
    )
    .with_logger(Box::new(StdoutPipelineLogger::default()))
    .with_progress(record_progress())
    .with_cancellation(cancelled);

    if args.preview {
        use_case = use_case.with_preview(Box::new(ThreadedPreviewSink::new(Box::new(
            FfplayPreviewSink::new("vidforensic - recording", settings.fps),
        ))));
    }

    eprintln!("Recording... type q and press Enter to stop early.");
    let outcome = use_case.execute(&settings)?;
    eprintln!();

    if outcome.cancelled {
        log::info!(
            "Stopped early: {}/{} frames",
            outcome.frames_written,
            outcome.total_frames
        );
    }
    if outcome.faces_detected {
        log::info!(
            "Faces seen in {} of {} frames",
            outcome.frames_with_faces,
            outcome.frames_written
        );
    } else {
        log::info!("No faces detected");
    }
    log::info!("Output written to {}", outcome.output_path.display());
    Ok(())
}

fn run_verify(file: &Path, expected: &str) -> Result<(), Box<dyn std::error::Error>> {
    if DigestVerifier::new().verify(file, expected)? {
        println!("OK  {}", file.display());
        Ok(())
    } else {
        Err(format!("digest mismatch for {}", file.display()).into())
    }
}

fn run_inspect(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut handle = VideoHandle::new(file);
    let md5 = handle.digest(&DigestVerifier::new())?.to_hex();
    let metadata = handle.metadata(&MetadataExtractor::with_ffmpeg())?.clone();
    let report = InspectReport {
        path: file,
        md5,
        metadata: &metadata,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn capture_settings(args: &RecordArgs) -> CaptureSettings {
    CaptureSettings {
        output_path: args.output.clone(),
        duration_secs: args.duration,
        fps: args.fps,
        frame_width: args.width,
        frame_height: args.height,
        camera_index: args.camera,
        detection: DetectionParams::new(args.scale_factor, args.min_neighbors),
    }
}

fn validate_record(settings: &CaptureSettings) -> Result<(), Box<dyn std::error::Error>> {
    settings.validate()?;
    if !is_video(&settings.output_path) {
        return Err(format!(
            "Output must have a video extension ({}), got {}",
            VIDEO_EXTENSIONS.join(", "),
            settings.output_path.display()
        )
        .into());
    }
    Ok(())
}

fn build_detector(cascade: Option<&Path>) -> Result<Arc<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {CASCADE_MODEL_NAME}");
    let path = ModelResolver::frontal_face().resolve(cascade, Some(Box::new(download_progress)))?;
    let detector = HaarFaceDetector::load(&path)?;
    Ok(Arc::new(detector))
}

/// Sets `cancelled` when the user types `q` on stdin.
fn spawn_stop_listener(cancelled: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().eq_ignore_ascii_case("q") {
                cancelled.store(true, Ordering::Relaxed);
                break;
            }
        }
    });
}

fn record_progress() -> ProgressFn {
    Box::new(|current, total| {
        eprint!("\rRecording frame {current}/{total}");
        true
    })
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face cascade... {pct}%");
    } else {
        eprint!("\rDownloading face cascade... {downloaded} bytes");
    }
}
