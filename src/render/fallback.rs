use std::path::{Path, PathBuf};

/// The fixed "preview unavailable" image served whenever rendering fails.
/// It is a permanent asset: never cleaned up, never thumbnailed.
#[derive(Debug, Clone)]
pub struct FallbackProvider {
    path: PathBuf,
}

impl FallbackProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn placeholder(&self) -> &Path {
        &self.path
    }

    pub fn is_placeholder(&self, path: &Path) -> bool {
        path == self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_its_own_path_only() {
        let fallback = FallbackProvider::new("public/preview-unavailable.png");
        assert!(fallback.is_placeholder(Path::new("public/preview-unavailable.png")));
        assert!(!fallback.is_placeholder(Path::new("cache/screenshot_ab.jpg")));
    }
}
