//! Intermediate caption file
//!
//! Video analysis writes its caption records to a JSON array
//! (`[{image_id, caption, timestamp, source}, ...]`) which the index build
//! step can read back.

use crate::{CaptionRecord, Result, TsvaError};
use std::path::Path;

/// Read caption records from a JSON array file
pub fn read_caption_file(path: impl AsRef<Path>) -> Result<Vec<CaptionRecord>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| TsvaError::io(path, e))?;

    serde_json::from_str(&content).map_err(|e| {
        TsvaError::SerializationError(format!("Invalid caption file {}: {e}", path.display()))
    })
}

/// Write caption records as a pretty-printed JSON array
pub fn write_caption_file(path: impl AsRef<Path>, records: &[CaptionRecord]) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| TsvaError::SerializationError(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| TsvaError::io(parent, e))?;
    }

    std::fs::write(path, json).map_err(|e| TsvaError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("captions_output.json");

        let records = vec![
            CaptionRecord::new("a.jpg", "bus turning left", "00:00:00", "v.mp4"),
            CaptionRecord::new("b.jpg", "cyclist waiting", "00:00:02", "v.mp4"),
        ];

        write_caption_file(&path, &records).unwrap();
        assert_eq!(read_caption_file(&path).unwrap(), records);
    }

    #[test]
    fn test_caption_file_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captions.json");
        std::fs::write(
            &path,
            r#"[{"image_id": "f.jpg", "caption": "c", "timestamp": "00:01:00", "source": "s.webm"}]"#,
        )
        .unwrap();

        let records = read_caption_file(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp(), "00:01:00");
    }

    #[test]
    fn test_caption_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            read_caption_file(&missing),
            Err(TsvaError::Io { .. })
        ));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, r#"[{"image_id": "f.jpg"}]"#).unwrap();
        assert!(matches!(
            read_caption_file(&broken),
            Err(TsvaError::SerializationError(_))
        ));
    }
}
