//! JSON output file.

use crate::collector::RecordSink;
use crate::error::WriteError;
use crate::record::Record;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Serialize `value` as pretty JSON with a 4-space indent.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, WriteError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Overwrite `path` with the full record list.
pub fn write_records(path: &Path, records: &[Record]) -> Result<(), WriteError> {
    let contents = to_pretty_json(records)?;
    std::fs::write(path, contents).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Sink that rewrites one JSON file with every snapshot it receives.
#[derive(Debug, Clone)]
pub struct JsonFileWriter {
    path: PathBuf,
    writes: usize,
}

impl JsonFileWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writes: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl RecordSink for JsonFileWriter {
    fn persist(&mut self, records: &[Record]) -> Result<(), WriteError> {
        write_records(&self.path, records)?;
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, rating: f64) -> Record {
        Record {
            id: id.to_string(),
            last_updated: "2024-05-01".to_string(),
            category: "Garden".to_string(),
            material: "Wood".to_string(),
            price: "$19.99".to_string(),
            weight_kg: "2.0".to_string(),
            item: "Rake".to_string(),
            rating,
            manufacturer: "Acme".to_string(),
        }
    }

    #[test]
    fn test_each_persist_overwrites_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("products.json");
        let mut writer = JsonFileWriter::new(&path);

        writer.persist(&[record("1", 4.0)]).unwrap();
        writer
            .persist(&[record("1", 4.0), record("2", 0.0)])
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<Record> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].id, "2");
        assert_eq!(writer.writes(), 2);
    }

    #[test]
    fn test_output_uses_four_space_indent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.json");
        write_records(&path, &[record("5", 1.5)]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("[\n    {\n        \"ID\": \"5\""), "{}", contents);
        assert!(contents.contains("\"Weight (kg)\": \"2.0\""));
    }

    #[test]
    fn test_empty_result_writes_empty_array() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.json");
        write_records(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("no-such-dir").join("out.json");
        let err = write_records(&path, &[record("1", 0.0)]).unwrap_err();
        assert!(matches!(err, WriteError::Io { .. }));
    }
}
