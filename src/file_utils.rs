use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

// @module: File and directory utilities for project files

// @const: extension used for project files
pub const PROJECT_EXTENSION: &str = "subtrans";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path).with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @generates: Project file path next to a subtitle source
    pub fn project_path_for<P: AsRef<Path>>(source: P) -> PathBuf {
        source.as_ref().with_extension(PROJECT_EXTENSION)
    }

    // @generates: Output path for translated subtitles
    // @params: source, target_language
    pub fn output_path_for<P: AsRef<Path>>(source: P, target_language: &str) -> PathBuf {
        let source = source.as_ref();
        let stem = source.file_stem().unwrap_or_default().to_string_lossy();
        let extension = source.extension().map(|e| e.to_string_lossy().to_string());

        let mut filename = format!("{}.{}", stem, target_language);
        if let Some(extension) = extension {
            filename.push('.');
            filename.push_str(&extension);
        }
        source.with_file_name(filename)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file, replacing it atomically.
    ///
    /// The content goes to a temporary file in the same directory, which is
    /// then renamed over the target, so readers never see a partial file.
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)
            .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
        temp.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write temporary file for {:?}", path))?;
        temp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to flush temporary file for {:?}", path))?;
        temp.persist(path)
            .with_context(|| format!("Failed to replace file: {:?}", path))?;

        Ok(())
    }
}
