use serde::{Deserialize, Serialize};

/// Descriptive facts about a media file, derived from its container.
///
/// Serializes to the report shape `{"duration", "fps", "size": [w, h], "file_size"}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Seconds.
    pub duration: f64,
    pub fps: f64,
    /// `(width, height)` in pixels.
    pub size: (u32, u32),
    /// Bytes on disk.
    pub file_size: u64,
}

impl MediaMetadata {
    pub fn width(&self) -> u32 {
        self.size.0
    }

    pub fn height(&self) -> u32 {
        self.size.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MediaMetadata {
        MediaMetadata {
            duration: 5.0,
            fps: 20.0,
            size: (640, 480),
            file_size: 123_456,
        }
    }

    #[test]
    fn test_accessors() {
        let meta = sample();
        assert_eq!(meta.width(), 640);
        assert_eq!(meta.height(), 480);
    }

    #[test]
    fn test_report_keys() {
        let value = serde_json::to_value(sample()).unwrap();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["duration", "file_size", "fps", "size"]);
        assert_eq!(value["size"], serde_json::json!([640, 480]));
        assert_eq!(value["file_size"], serde_json::json!(123_456));
    }

    #[test]
    fn test_report_parses_back() {
        let text = r#"{"duration": 1.5, "fps": 25.0, "size": [320, 240], "file_size": 10}"#;
        let meta: MediaMetadata = serde_json::from_str(text).unwrap();
        assert_eq!(meta.size, (320, 240));
        assert_eq!(meta.file_size, 10);
    }
}
