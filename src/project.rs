/*!
 * Subtitle translation project.
 *
 * A project owns one `SubtitleFile`, the event hub its translations publish
 * to, and the location of its project file.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::document::SubtitleFile;
use crate::document::serialization::{from_json, to_json};
use crate::file_utils::FileManager;
use crate::translation::TranslationEvents;

/// A subtitle file plus everything needed to translate and persist it.
#[derive(Debug, Default)]
pub struct SubtitleProject {
    /// The subtitles being translated
    pub subtitles: SubtitleFile,

    /// Path of the project file, if it has one
    pub project_path: Option<PathBuf>,

    /// Whether commands should write the project file after changing it
    pub write_project: bool,

    events: TranslationEvents,
}

impl SubtitleProject {
    pub fn new(subtitles: SubtitleFile) -> Self {
        Self {
            subtitles,
            ..Self::default()
        }
    }

    /// Persist to `path` after every state-changing command.
    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_path = Some(path.into());
        self.write_project = true;
        self
    }

    /// Event hub for `BatchTranslated` notifications.
    pub fn events(&self) -> &TranslationEvents {
        &self.events
    }

    /// Split borrow of the subtitles and the event hub.
    pub fn parts_mut(&mut self) -> (&mut SubtitleFile, &TranslationEvents) {
        (&mut self.subtitles, &self.events)
    }

    /// Load a project file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = FileManager::read_to_string(path)?;
        let subtitles = from_json(&json).with_context(|| format!("Failed to load project: {:?}", path))?;

        info!(
            "Loaded project {:?}: {} scenes, {} lines",
            path,
            subtitles.scene_count(),
            subtitles.line_count()
        );
        Ok(Self::new(subtitles).with_project_path(path))
    }

    /// Write the project file, replacing any previous version atomically.
    pub fn save(&self) -> Result<()> {
        let path = self
            .project_path
            .as_ref()
            .context("Project has no project file path")?;
        self.save_to(path)
    }

    /// Write the project to `path`.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = to_json(&self.subtitles).with_context(|| format!("Failed to serialize project for {:?}", path))?;
        FileManager::write_atomic(path, &json)?;
        debug!("Saved project to {:?}", path);
        Ok(())
    }

    /// Save if project writing is enabled and a path is set.
    ///
    /// Returns whether the file was written.
    pub fn save_if_enabled(&self) -> Result<bool> {
        if !self.write_project || self.project_path.is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }
}
