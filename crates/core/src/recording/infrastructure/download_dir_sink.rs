use std::fs;
use std::path::PathBuf;

use crate::recording::domain::artifact_sink::ArtifactSink;

/// Saves artifacts into a directory, by default the user's downloads folder.
pub struct DownloadDirSink {
    dir: PathBuf,
}

impl DownloadDirSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Downloads folder, falling back to home, then the working directory.
    pub fn default_dir() -> PathBuf {
        dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

impl Default for DownloadDirSink {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

impl ArtifactSink for DownloadDirSink {
    fn save(&mut self, filename: &str, data: &[u8]) -> Result<PathBuf, Box<dyn std::error::Error>> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        let tmp = path.with_extension("part");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }
}
