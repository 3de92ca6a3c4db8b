use std::{
    env,
    path::{Path, PathBuf},
};

/// Resolves where the app keeps its local files (debug log, SQLite store).
#[derive(Debug)]
pub struct OutputManager {
    root: PathBuf,
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::with_root("data")
    }
}

impl OutputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn output_directory(&self) -> Result<PathBuf, String> {
        Self::resolve(&self.root)
    }

    /// Anchor a possibly relative path at the current working directory.
    pub fn resolve(path: &Path) -> Result<PathBuf, String> {
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }

        match env::current_dir() {
            Ok(mut dir) => {
                dir.push(path);
                Ok(dir)
            }
            Err(err) => Err(format!("failed to resolve current directory: {}", err)),
        }
    }
}
