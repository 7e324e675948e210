//! Locating class bytes on a search path of directories, loose `.class`
//! files and `.jar`/`.zip` archives.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::class::ClassReader;
use crate::error::LoadError;

/// A class search path. `preload` indexes every reachable class name to the
/// file or archive providing it; lookups then read the raw bytes on demand.
/// The first location found for a name wins.
#[derive(Default)]
pub struct ClassPath {
    search_path: Vec<PathBuf>,
    found_classes: HashMap<String, PathBuf>,
    open_jars: HashMap<PathBuf, ZipArchive<BufReader<File>>>,
}

impl ClassPath {
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        ClassPath {
            search_path,
            found_classes: HashMap::new(),
            open_jars: HashMap::new(),
        }
    }

    /// Walk the search path and index every `.class` file and archive entry.
    pub fn preload(&mut self) -> Result<(), LoadError> {
        for root in self.search_path.clone() {
            info!("indexing class path entry {}", root.display());
            if root.is_dir() {
                self.preload_dir(&root)?;
            } else {
                self.preload_file(&root, &root)?;
            }
        }
        Ok(())
    }

    fn preload_dir(&mut self, root: &Path) -> Result<(), LoadError> {
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(v) => v,
                Err(e) => {
                    warn!("skipping unreadable class path entry: {}", e);
                    continue;
                }
            };
            if entry.path().is_file() {
                self.preload_file(root, entry.path())?;
            }
        }
        Ok(())
    }

    fn preload_file(&mut self, root: &Path, file: &Path) -> Result<(), LoadError> {
        match file.extension().and_then(OsStr::to_str) {
            Some("jar") | Some("zip") => self.preload_jar(file),
            Some("class") => self.preload_class(root, file),
            _ => Ok(()),
        }
    }

    fn preload_class(&mut self, root: &Path, file: &Path) -> Result<(), LoadError> {
        debug!("indexing class file {}", file.display());

        // Prefer the path-derived name; fall back to peeking the header for
        // loose files outside a package tree.
        let name = match file.strip_prefix(root).ok().and_then(|relative| {
            relative
                .to_str()
                .and_then(|s| s.strip_suffix(".class"))
                .map(|s| s.replace(std::path::MAIN_SEPARATOR, "/"))
        }) {
            Some(name) if !name.is_empty() => name,
            _ => {
                let mut data = Vec::new();
                BufReader::new(File::open(file)?).read_to_end(&mut data)?;
                ClassReader::new(data)?.class_name()?.to_string()
            }
        };

        if !self.found_classes.contains_key(&name) {
            self.found_classes.insert(name, file.to_path_buf());
        } else {
            info!(
                "ignoring {}; {} already present on the class path",
                file.display(),
                name
            );
        }
        Ok(())
    }

    fn preload_jar(&mut self, file: &Path) -> Result<(), LoadError> {
        debug!("indexing archive {}", file.display());
        let jar = ZipArchive::new(BufReader::new(File::open(file)?))?;

        for entry_name in jar.file_names() {
            if let Some(class_name) = entry_name.strip_suffix(".class") {
                if !self.found_classes.contains_key(class_name) {
                    self.found_classes
                        .insert(class_name.to_string(), file.to_path_buf());
                }
            }
        }

        self.open_jars.insert(file.to_path_buf(), jar);
        Ok(())
    }

    /// Whether `name` (internal form, e.g. `java/lang/Object`) was indexed.
    pub fn contains(&self, name: &str) -> bool {
        self.found_classes.contains_key(name)
    }

    /// The raw bytes of class `name`.
    pub fn class_bytes(&mut self, name: &str) -> Result<Vec<u8>, LoadError> {
        let location = match self.found_classes.get(name) {
            Some(v) => v.clone(),
            None => {
                if !name.starts_with('[') {
                    warn!("unable to find class {} in class path", name);
                }
                return Err(LoadError::NotFound(name.to_string()));
            }
        };

        if location.extension().and_then(OsStr::to_str) == Some("class") {
            let mut data = Vec::new();
            BufReader::new(File::open(&location)?).read_to_end(&mut data)?;
            return Ok(data);
        }

        if !self.open_jars.contains_key(&location) {
            let archive = ZipArchive::new(BufReader::new(File::open(&location)?))?;
            self.open_jars.insert(location.clone(), archive);
        }
        let jar = match self.open_jars.get_mut(&location) {
            Some(v) => v,
            None => return Err(LoadError::NotFound(name.to_string())),
        };

        let mut entry = match jar.by_name(&format!("{}.class", name)) {
            Ok(v) => v,
            Err(ZipError::FileNotFound) => return Err(LoadError::NotFound(name.to_string())),
            Err(e) => return Err(e.into()),
        };
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Locate class `name` and wrap its bytes in a [`ClassReader`].
    pub fn reader(&mut self, name: &str) -> Result<ClassReader, LoadError> {
        Ok(ClassReader::new(self.class_bytes(name)?)?)
    }
}
