use crate::types::{EnhancedImagery, SarError, SarResult};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Per-request identifier for persisted images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactId(Uuid);

impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier received from a caller
    pub fn parse(s: &str) -> SarResult<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SarError::Validation(format!("invalid image id '{}'", s)))
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Directory holding the raw and enhanced image of every request
///
/// Files are keyed by [`ArtifactId`], so concurrent requests never write
/// the same path.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(root: P) -> SarResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        log::debug!("Artifact store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_path(&self, id: &ArtifactId) -> PathBuf {
        self.root.join(format!("{}_raw.png", id))
    }

    pub fn enhanced_path(&self, id: &ArtifactId) -> PathBuf {
        self.root.join(format!("{}.png", id))
    }

    /// Persist the undecoded provider image
    pub fn write_raw(&self, id: &ArtifactId, bytes: &[u8]) -> SarResult<PathBuf> {
        let path = self.raw_path(id);
        std::fs::write(&path, bytes)?;
        log::debug!("Wrote raw image ({} bytes) to {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Persist the enhanced raster as PNG
    pub fn write_enhanced(&self, id: &ArtifactId, image: &EnhancedImagery) -> SarResult<PathBuf> {
        let path = self.enhanced_path(id);
        let png = image.to_png()?;
        std::fs::write(&path, &png)?;
        log::info!("Saved enhanced image to {}", path.display());
        Ok(path)
    }

    /// Delete the raw image of `id`; a missing file is not an error
    pub fn remove_raw(&self, id: &ArtifactId) -> SarResult<()> {
        match std::fs::remove_file(self.raw_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SarError::Io(e)),
        }
    }

    /// Encoded enhanced image, or `None` if nothing was stored under `id`
    pub fn read_enhanced(&self, id: &ArtifactId) -> SarResult<Option<Vec<u8>>> {
        match std::fs::read(self.enhanced_path(id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SarError::Io(e)),
        }
    }
}
