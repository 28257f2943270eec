use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

/// One row in the unanswered-question log. Write-once, never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnansweredEntry {
    pub timestamp: String,
    pub question: String,
    pub failed_sql: String,
}

/// Append-only CSV log of questions the system could not confidently answer.
///
/// The file is opened, appended to, and closed on every write; concurrent
/// writers may interleave, which is accepted for this best-effort log.
#[derive(Debug, Clone)]
pub struct QuestionLog {
    path: PathBuf,
}

impl QuestionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry, writing the header first if the file is new.
    pub fn append(&self, question: &str, failed_sql: &str) -> Result<(), io::Error> {
        let new_file = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if new_file {
            writer.write_record(["timestamp", "question", "failed_sql"])?;
        }
        writer.write_record([
            Utc::now().to_rfc3339().as_str(),
            question,
            failed_sql,
        ])?;
        writer.flush()?;
        Ok(())
    }

    /// Reads the full log. A file that does not exist yet reads as empty.
    pub fn read(&self) -> Result<Vec<UnansweredEntry>, io::Error> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut entries = Vec::new();
        for record in reader.deserialize() {
            let entry: UnansweredEntry = record?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Wholesale truncation back to just the header. Administrative reset.
    pub fn clear(&self) -> Result<(), io::Error> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(["timestamp", "question", "failed_sql"])?;
        writer.flush()?;
        Ok(())
    }
}
