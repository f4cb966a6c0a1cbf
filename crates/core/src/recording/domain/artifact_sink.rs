use std::path::PathBuf;

/// Destination for downloaded artifacts (the save-as action).
pub trait ArtifactSink: Send {
    /// Stores `data` under `filename` and returns where it went.
    fn save(&mut self, filename: &str, data: &[u8]) -> Result<PathBuf, Box<dyn std::error::Error>>;
}
