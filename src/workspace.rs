//! Project persistence.
//!
//! A workspace is a directory of pretty-printed JSON projects, one file per
//! project, named after the project's slug and a short form of its id.

use crate::score::Project;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable that overrides the default workspace location.
pub const WORKSPACE_ENV: &str = "SONGSMITH_WORKSPACE";

const WORKSPACE_DIR: &str = ".songsmith";
const EXTENSION: &str = "json";

/// Directory holding saved projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens the workspace at `root`, or at the default location.
    ///
    /// The default is `~/.songsmith`, or `./.songsmith` when no home
    /// directory can be determined.
    pub fn open(root: Option<PathBuf>) -> Self {
        Self::new(root.unwrap_or_else(default_root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a project with this name is stored in.
    ///
    /// Accepts a stored name with or without the `.json` extension.
    pub fn path_for(&self, name: &str) -> PathBuf {
        let name = name.strip_suffix(".json").unwrap_or(name);
        self.root.join(format!("{name}.{EXTENSION}"))
    }

    /// Saves a project as `<root>/<file stem>.json`, creating the directory
    /// if needed. Returns the path written.
    ///
    /// The stem carries part of the workspace id, so projects with the same
    /// title are kept apart.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file writing fails
    pub fn save(&self, project: &Project) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(&project.file_stem());
        let json = serde_json::to_string_pretty(project)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&path, json)?;
        info!(path = %path.display(), "Saved project");
        Ok(path)
    }

    /// Loads a project by its stored name.
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing, unreadable or not a project
    pub fn load(&self, name: &str) -> io::Result<Project> {
        let path = self.path_for(name);
        let json = fs::read_to_string(&path)?;
        let project = serde_json::from_str(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        debug!(path = %path.display(), "Loaded project");
        Ok(project)
    }

    /// Stored names of the saved projects, sorted. A missing workspace is empty.
    ///
    /// # Errors
    ///
    /// Returns error if the directory exists but cannot be read
    pub fn list(&self) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => names.push(stem.to_string()),
                None => warn!(path = %path.display(), "Skipping non UTF-8 file name"),
            }
        }
        names.sort();
        Ok(names)
    }
}

/// `~/.songsmith`, falling back to `./.songsmith`.
pub fn default_root() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(WORKSPACE_DIR))
        .unwrap_or_else(|| PathBuf::from(WORKSPACE_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::create_project;
    use crate::template::Catalog;
    use tempfile::TempDir;

    fn project(seed: u64) -> Project {
        prompted("summer", seed)
    }

    fn prompted(prompt: &str, seed: u64) -> Project {
        let catalog = Catalog::builtin().unwrap();
        create_project(&catalog, Some("pop"), prompt, Some(seed), &Default::default()).unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path().join("projects"));
        let mut project = project(4);
        project.lyrics = Some("hold on".to_string());

        let path = workspace.save(&project).unwrap();
        assert_eq!(path, workspace.path_for(&project.file_stem()));
        assert!(path.exists());

        let loaded = workspace.load(&project.file_stem()).unwrap();
        assert_eq!(loaded.score, project.score);
        assert_eq!(loaded.title, project.title);
        assert_eq!(loaded.workspace_id, project.workspace_id);
        assert_eq!(loaded.lyrics, project.lyrics);
        assert_eq!(loaded.render, project.render);

        // Extension is optional
        let with_ext = workspace.load(&format!("{}.json", project.file_stem())).unwrap();
        assert_eq!(with_ext.score, project.score);
    }

    #[test]
    fn test_saved_json_is_pretty() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());
        let path = workspace.save(&project(1)).unwrap();
        let json = fs::read_to_string(path).unwrap();
        assert!(json.contains("\n  \"title\""));
    }

    #[test]
    fn test_list() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());
        assert!(workspace.list().unwrap().is_empty());

        let a = project(1);
        let b = project(2);
        workspace.save(&a).unwrap();
        workspace.save(&b).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut expected = vec![a.file_stem(), b.file_stem()];
        expected.sort();
        assert_eq!(workspace.list().unwrap(), expected);
    }

    #[test]
    fn test_same_title_projects_are_kept_apart() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());
        let road_trip = prompted("summer road trip", 5);
        let funeral = prompted("winter funeral", 5);
        // The title comes from the template and seed alone
        assert_eq!(road_trip.title, funeral.title);

        let first = workspace.save(&road_trip).unwrap();
        let second = workspace.save(&funeral).unwrap();
        assert_ne!(first, second);
        assert_eq!(workspace.list().unwrap().len(), 2);

        for original in [&road_trip, &funeral] {
            let loaded = workspace.load(&original.file_stem()).unwrap();
            assert_eq!(loaded.prompt, original.prompt);
            assert_eq!(loaded.workspace_id, original.workspace_id);
            assert_eq!(loaded.score, original.score);
        }
    }

    #[test]
    fn test_missing_workspace_lists_nothing() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path().join("absent"));
        assert!(workspace.list().unwrap().is_empty());
        assert_eq!(
            workspace.load("nothing").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_corrupt_project_is_invalid_data() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());
        fs::write(workspace.path_for("broken"), "{ not json").unwrap();
        assert_eq!(
            workspace.load("broken").unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
    }

    #[test]
    fn test_open_prefers_explicit_root() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::open(Some(dir.path().to_path_buf()));
        assert_eq!(workspace.root(), dir.path());
        assert!(Workspace::open(None).root().ends_with(WORKSPACE_DIR));
    }
}
