//! Report storage - one pretty-printed JSON file per report

use crate::report::ErrorReport;
use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct ReportStorage {
    dir: PathBuf,
}

impl ReportStorage {
    pub fn new() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME not set")?;
        Self::with_dir(PathBuf::from(home).join(".bugtrail"))
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn save(&self, report: &ErrorReport) -> Result<PathBuf> {
        let filename = format!("{}.json", file_stem(&report.report_id));
        let path = self.dir.join(&filename);

        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, report)?;
        writeln!(w)?;
        w.flush()?;

        tracing::debug!(path = %path.display(), "report saved");
        Ok(path)
    }

    pub fn load(&self, filename: &str) -> Result<ErrorReport> {
        let path = self.resolve(filename)?;
        let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let report = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(report)
    }

    /// Saved report files, oldest id first.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(s) = name.to_str() {
                if s.ends_with(".json") {
                    files.push(s.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn delete(&self, filename: &str) -> Result<()> {
        let path = self.resolve(filename)?;
        fs::remove_file(&path).with_context(|| format!("deleting {}", path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Accept `err_x.json` or bare `err_x`; never leave the storage dir.
    fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let stem = filename.strip_suffix(".json").unwrap_or(filename);
        if stem.is_empty() || file_stem(stem) != stem {
            bail!("invalid report file name: {}", filename);
        }
        Ok(self.dir.join(format!("{}.json", stem)))
    }
}

fn file_stem(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
