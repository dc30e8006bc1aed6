//! Template source loading.
//!
//! The engine never reads templates itself; it asks its [`TemplateLocator`]s
//! in descending priority order and compiles the first source returned.
//!
//! # File System Layout
//!
//! [`FileSystemLocator`] serves every file under a root directory whose
//! extension is one of [`TEMPLATE_EXTENSIONS`]. Names are relative paths
//! with `/` separators and may omit the extension:
//!
//! ```text
//! templates/
//! ├── page.mustache        → "page" or "page.mustache"
//! └── mail/
//!     └── welcome.txt      → "mail/welcome" or "mail/welcome.txt"
//! ```
//!
//! When several files share a base name, the extension listed first in
//! [`TEMPLATE_EXTENSIONS`] serves the extensionless name.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::OnceCell;

use crate::error::{Result, WhiskerError};

/// Recognized template file extensions in priority order.
pub const TEMPLATE_EXTENSIONS: &[&str] = &[".mustache", ".hbs", ".html", ".txt"];

/// A source of template text.
pub trait TemplateLocator: Send + Sync {
    /// Higher priorities are asked first.
    fn priority(&self) -> i32 {
        0
    }

    /// Returns the source for `name`, or `None` if this locator lacks it.
    fn locate(&self, name: &str) -> Result<Option<String>>;

    /// Every name this locator can serve; used to precompile.
    fn all_identifiers(&self) -> Result<Vec<String>>;

    /// Forgets anything learned about the underlying source so that
    /// added or removed templates are seen.
    fn refresh(&self) {}
}

/// In-memory templates.
#[derive(Debug, Clone, Default)]
pub struct MapLocator {
    templates: HashMap<String, String>,
    priority: i32,
}

impl MapLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }

    pub fn template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateLocator for MapLocator {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn locate(&self, name: &str) -> Result<Option<String>> {
        Ok(self.templates.get(name).cloned())
    }

    fn all_identifiers(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.templates.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// A template file discovered under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TemplateFile {
    /// `"mail/welcome"`
    name: String,
    /// `"mail/welcome.txt"`
    name_with_ext: String,
    path: PathBuf,
}

impl TemplateFile {
    /// Lower is preferred; unknown extensions sort last.
    fn extension_priority(&self) -> usize {
        TEMPLATE_EXTENSIONS
            .iter()
            .position(|ext| self.name_with_ext.ends_with(ext))
            .unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Default)]
struct Index {
    paths: HashMap<String, PathBuf>,
    names: BTreeSet<String>,
}

/// Templates read from a directory tree.
///
/// The tree is walked once, on first use;
/// [`refresh`](TemplateLocator::refresh) forgets the walk so new files are
/// picked up. File contents are read on every `locate` call.
pub struct FileSystemLocator {
    root: PathBuf,
    priority: i32,
    index: RwLock<Arc<OnceCell<Index>>>,
}

impl FileSystemLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            priority: 0,
            index: RwLock::new(Arc::new(OnceCell::new())),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs `f` against the directory index, walking the tree first if
    /// needed. The walk happens outside the lock.
    fn with_index<T>(&self, f: impl FnOnce(&Index) -> T) -> Result<T> {
        let cell = Arc::clone(&self.index.read().unwrap_or_else(PoisonError::into_inner));
        let index = cell.get_or_try_init(|| self.scan())?;
        Ok(f(index))
    }

    fn scan(&self) -> Result<Index> {
        let root = self.root.canonicalize().map_err(|e| self.error("", &self.root, e))?;
        let mut files = Vec::new();
        walk_dir(&root, &root, &mut files).map_err(|(path, e)| self.error("", &path, e))?;

        // higher priority extensions claim the extensionless name first
        files.sort_by_key(TemplateFile::extension_priority);
        let mut index = Index::default();
        for file in files {
            index
                .paths
                .insert(file.name_with_ext.clone(), file.path.clone());
            if !index.paths.contains_key(&file.name) {
                index.paths.insert(file.name.clone(), file.path);
            }
            index.names.insert(file.name);
        }
        Ok(index)
    }

    fn error(&self, name: &str, path: &Path, err: std::io::Error) -> WhiskerError {
        WhiskerError::Locator {
            name: name.to_string(),
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl fmt::Debug for FileSystemLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystemLocator")
            .field("root", &self.root)
            .field("priority", &self.priority)
            .field(
                "scanned",
                &self
                    .index
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get()
                    .is_some(),
            )
            .finish()
    }
}

impl TemplateLocator for FileSystemLocator {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn locate(&self, name: &str) -> Result<Option<String>> {
        let Some(path) = self.with_index(|index| index.paths.get(name).cloned())? else {
            return Ok(None);
        };
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| self.error(name, &path, e))
    }

    fn all_identifiers(&self) -> Result<Vec<String>> {
        self.with_index(|index| index.names.iter().cloned().collect())
    }

    fn refresh(&self) {
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(OnceCell::new());
    }
}

fn walk_dir(
    current: &Path,
    root: &Path,
    files: &mut Vec<TemplateFile>,
) -> std::result::Result<(), (PathBuf, std::io::Error)> {
    let entries = std::fs::read_dir(current).map_err(|e| (current.to_path_buf(), e))?;
    for entry in entries {
        let path = entry.map_err(|e| (current.to_path_buf(), e))?.path();
        if path.is_dir() {
            walk_dir(&path, root, files)?;
        } else if path.is_file() {
            if let Some(file) = template_file(&path, root) {
                files.push(file);
            }
        }
    }
    Ok(())
}

fn template_file(path: &Path, root: &Path) -> Option<TemplateFile> {
    let relative = path.strip_prefix(root).ok()?.to_string_lossy();
    let name_with_ext = relative.replace(std::path::MAIN_SEPARATOR, "/");
    let extension = TEMPLATE_EXTENSIONS
        .iter()
        .find(|ext| name_with_ext.ends_with(*ext))?;
    let name = name_with_ext.strip_suffix(extension)?.to_string();
    Some(TemplateFile {
        name,
        name_with_ext,
        path: path.to_path_buf(),
    })
}
