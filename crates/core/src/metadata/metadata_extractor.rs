use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::media_metadata::MediaMetadata;
use crate::video::domain::media_probe::MediaProbe;
use crate::video::infrastructure::ffmpeg_probe::FfmpegProbe;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("unreadable media {path}: {reason}")]
    UnreadableMedia { path: PathBuf, reason: String },
}

impl MetadataError {
    fn unreadable(path: &Path, reason: impl Into<String>) -> Self {
        MetadataError::UnreadableMedia {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Reports duration, frame rate, frame size and byte size of a media file.
///
/// Stateless between calls; one extractor can serve any number of files.
pub struct MetadataExtractor {
    probe: Box<dyn MediaProbe>,
}

impl MetadataExtractor {
    pub fn new(probe: Box<dyn MediaProbe>) -> Self {
        Self { probe }
    }

    pub fn with_ffmpeg() -> Self {
        Self::new(Box::new(FfmpegProbe::new()))
    }

    pub fn extract(&self, path: &Path) -> Result<MediaMetadata, MetadataError> {
        let fs_meta = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MetadataError::unreadable(path, "file not found"));
            }
            Err(e) => return Err(MetadataError::unreadable(path, e.to_string())),
        };
        if !fs_meta.is_file() {
            return Err(MetadataError::unreadable(path, "not a regular file"));
        }
        if fs_meta.len() == 0 {
            return Err(MetadataError::unreadable(path, "file is empty"));
        }

        let info = self
            .probe
            .probe(path)
            .map_err(|e| MetadataError::unreadable(path, e.to_string()))?;

        let metadata = MediaMetadata {
            duration: info.duration,
            fps: info.fps,
            size: (info.width, info.height),
            file_size: fs_meta.len(),
        };
        log::debug!("Metadata for {}: {metadata:?}", path.display());
        Ok(metadata)
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::with_ffmpeg()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::shared::frame::{Frame, PixelFormat};
    use crate::video::domain::media_probe::{ContainerInfo, ProbeError};
    use crate::video::domain::video_writer::{EncoderSettings, VideoWriter};
    use crate::video::infrastructure::ffmpeg_writer::FfmpegWriter;

    struct StubProbe {
        result: Result<ContainerInfo, String>,
        calls: Arc<AtomicUsize>,
    }

    impl MediaProbe for StubProbe {
        fn probe(&self, _path: &Path) -> Result<ContainerInfo, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(ProbeError::Open)
        }
    }

    fn stub(result: Result<ContainerInfo, String>) -> (MetadataExtractor, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = StubProbe {
            result,
            calls: calls.clone(),
        };
        (MetadataExtractor::new(Box::new(probe)), calls)
    }

    fn info() -> ContainerInfo {
        ContainerInfo {
            duration: 5.0,
            fps: 20.0,
            width: 640,
            height: 480,
        }
    }

    #[test]
    fn test_combines_probe_and_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, vec![7u8; 1234]).unwrap();

        let (extractor, _) = stub(Ok(info()));
        let meta = extractor.extract(&path).unwrap();
        assert_eq!(meta.duration, 5.0);
        assert_eq!(meta.fps, 20.0);
        assert_eq!(meta.size, (640, 480));
        assert_eq!(meta.file_size, 1234);
    }

    #[test]
    fn test_zero_length_file_rejected_before_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.mp4");
        std::fs::write(&path, b"").unwrap();

        let (extractor, calls) = stub(Ok(info()));
        let result = extractor.extract(&path);
        assert!(matches!(result, Err(MetadataError::UnreadableMedia { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let (extractor, _) = stub(Ok(info()));
        match extractor.extract(Path::new("/nonexistent/clip.mp4")) {
            Err(MetadataError::UnreadableMedia { reason, .. }) => {
                assert_eq!(reason, "file not found")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_directory_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let (extractor, _) = stub(Ok(info()));
        assert!(extractor.extract(dir.path()).is_err());
    }

    #[test]
    fn test_probe_failure_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.mp4");
        std::fs::write(&path, b"junk").unwrap();

        let (extractor, _) = stub(Err("invalid data".into()));
        match extractor.extract(&path) {
            Err(MetadataError::UnreadableMedia { path: p, reason }) => {
                assert_eq!(p, path);
                assert!(reason.contains("invalid data"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_ffmpeg_zero_byte_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.mp4");
        std::fs::File::create(&path).unwrap();
        let result = MetadataExtractor::with_ffmpeg().extract(&path);
        assert!(matches!(result, Err(MetadataError::UnreadableMedia { .. })));
    }

    #[test]
    fn test_ffmpeg_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.mp4");
        std::fs::write(&path, vec![0xABu8; 4096]).unwrap();
        let result = MetadataExtractor::default().extract(&path);
        assert!(matches!(result, Err(MetadataError::UnreadableMedia { .. })));
    }

    #[test]
    fn test_ffmpeg_known_video() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known.mp4");
        let mut writer = FfmpegWriter::new();
        writer
            .open(&path, &EncoderSettings::new(320, 240, 20.0))
            .unwrap();
        for i in 0..40 {
            writer
                .write(&Frame::filled(320, 240, PixelFormat::Bgr24, (i * 5) as u8, i))
                .unwrap();
        }
        writer.close().unwrap();

        let meta = MetadataExtractor::with_ffmpeg().extract(&path).unwrap();
        assert_eq!(meta.size, (320, 240));
        assert_abs_diff_eq!(meta.fps, 20.0, epsilon = 0.5);
        assert_abs_diff_eq!(meta.duration, 2.0, epsilon = 0.2);
        assert_eq!(meta.file_size, std::fs::metadata(&path).unwrap().len());
    }
}
