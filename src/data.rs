// src/data.rs
use chrono::Local;
use csv::Writer;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::session::{RepRow, SessionSummary};

pub struct SessionExporter {
    output_dir: PathBuf,
    session_name: String,
}

impl SessionExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    /// Writes `reps.csv` and `session.json`, returning the session directory.
    pub fn export(&self, summary: &SessionSummary, reps: &[RepRow]) -> Result<PathBuf> {
        let dir = self.session_dir();
        fs::create_dir_all(&dir)?;

        let mut writer = Writer::from_writer(File::create(dir.join("reps.csv"))?);
        for rep in reps {
            writer.serialize(rep)?;
        }
        writer.flush()?;

        fs::write(dir.join("session.json"), serde_json::to_string_pretty(summary)?)?;
        Ok(dir)
    }
}
