use std::path::{Path, PathBuf};

use crate::integrity::digest_verifier::{DigestError, DigestVerifier, IntegrityDigest};
use crate::metadata::metadata_extractor::{MetadataError, MetadataExtractor};
use crate::shared::media_metadata::MediaMetadata;

/// A media file the tool operates on, either recorded or supplied by the user.
///
/// Metadata is extracted at most once and cached. The digest is recomputed
/// on every request since the file may change underneath the handle.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoHandle {
    path: PathBuf,
    metadata: Option<MediaMetadata>,
}

impl VideoHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            metadata: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cached_metadata(&self) -> Option<&MediaMetadata> {
        self.metadata.as_ref()
    }

    pub fn metadata(&mut self, extractor: &MetadataExtractor) -> Result<&MediaMetadata, MetadataError> {
        let metadata = match self.metadata.take() {
            Some(m) => m,
            None => extractor.extract(&self.path)?,
        };
        Ok(self.metadata.insert(metadata))
    }

    pub fn digest(&self, verifier: &DigestVerifier) -> Result<IntegrityDigest, DigestError> {
        verifier.digest(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::video::domain::media_probe::{ContainerInfo, MediaProbe, ProbeError};

    struct CountingProbe(Arc<AtomicUsize>);

    impl MediaProbe for CountingProbe {
        fn probe(&self, _path: &Path) -> Result<ContainerInfo, ProbeError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ContainerInfo {
                duration: 1.0,
                fps: 20.0,
                width: 64,
                height: 48,
            })
        }
    }

    #[test]
    fn test_metadata_extracted_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"data").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let extractor = MetadataExtractor::new(Box::new(CountingProbe(calls.clone())));
        let mut handle = VideoHandle::new(&path);
        assert!(handle.cached_metadata().is_none());

        let size = handle.metadata(&extractor).unwrap().size;
        assert_eq!(size, (64, 48));
        handle.metadata(&extractor).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.cached_metadata().map(|m| m.file_size), Some(4));
    }

    #[test]
    fn test_digest_tracks_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"first").unwrap();

        let handle = VideoHandle::new(&path);
        let verifier = DigestVerifier::new();
        let before = handle.digest(&verifier).unwrap();
        std::fs::write(&path, b"second").unwrap();
        let after = handle.digest(&verifier).unwrap();
        assert_ne!(before, after);
    }
}
