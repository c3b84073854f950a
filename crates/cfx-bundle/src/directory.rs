use anyhow::{bail, Context, Result};
use cfx_model::{ConfigurationAreaProperties, Pid};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{BundleCodec, JsonCodec};

/// Where bundle files live and how they are named.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSettings {
    pub directory: PathBuf,
    /// Without the dot.
    pub extension: String,
    /// Appended to a bundle file name when it is moved aside.
    pub backup_suffix: String,
}

impl Default for BundleSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("bundles"),
            extension: "json".to_string(),
            backup_suffix: "bak".to_string(),
        }
    }
}

/// Directory of bundle files, one per configuration area.
pub struct BundleDirectory<C: BundleCodec = JsonCodec> {
    root: PathBuf,
    extension: String,
    backup_suffix: String,
    codec: C,
}

impl BundleDirectory<JsonCodec> {
    /// Opens (and creates if missing) the directory described by `settings`.
    pub fn open(settings: &BundleSettings) -> Result<Self> {
        Self::with_codec(settings, JsonCodec)
    }
}

impl<C: BundleCodec> BundleDirectory<C> {
    pub fn with_codec(settings: &BundleSettings, codec: C) -> Result<Self> {
        if settings.backup_suffix.is_empty() {
            bail!("bundle backup suffix must not be empty");
        }
        let root = settings.directory.clone();
        fs::create_dir_all(&root)
            .with_context(|| format!("create bundle dir failed: {}", root.display()))?;
        let extension = if settings.extension.is_empty() {
            codec.extension().to_string()
        } else {
            settings.extension.clone()
        };
        Ok(Self {
            root,
            extension,
            backup_suffix: settings.backup_suffix.clone(),
            codec,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<AreaPid>.<extension>`.
    pub fn path_for(&self, area: &Pid) -> Result<PathBuf> {
        let name = area.as_str();
        if area.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            bail!("area pid '{name}' cannot name a bundle file");
        }
        Ok(self.root.join(format!("{name}.{}", self.extension)))
    }

    /// Writes the bundle of `area`, moving an existing file to its backup name first.
    pub fn write_area(&self, area: &ConfigurationAreaProperties) -> Result<PathBuf> {
        let path = self.path_for(&area.header.pid)?;
        if path.exists() {
            let backup = self.free_backup_name(&path);
            fs::rename(&path, &backup).with_context(|| {
                format!("rotate bundle failed: {} -> {}", path.display(), backup.display())
            })?;
            debug!(from = %path.display(), to = %backup.display(), "bundle rotated");
        }
        let bytes = self.codec.encode(area)?;
        fs::write(&path, bytes).with_context(|| format!("write bundle failed: {}", path.display()))?;
        info!(area = %area.header.pid, objects = area.objects.len(), path = %path.display(), "bundle written");
        Ok(path)
    }

    pub fn read_area(&self, area: &Pid) -> Result<ConfigurationAreaProperties> {
        let path = self.path_for(area)?;
        self.read_path(&path)
    }

    /// Every bundle file of the directory, by file name. Backups are ignored.
    pub fn read_all(&self) -> Result<Vec<ConfigurationAreaProperties>> {
        let mut paths = Vec::new();
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("read bundle dir failed: {}", self.root.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("read bundle dir entry failed: {}", self.root.display()))?
                .path();
            let matches = path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str());
            if matches {
                paths.push(path);
            }
        }
        paths.sort();
        paths.iter().map(|p| self.read_path(p)).collect()
    }

    fn read_path(&self, path: &Path) -> Result<ConfigurationAreaProperties> {
        let bytes = fs::read(path).with_context(|| format!("read bundle failed: {}", path.display()))?;
        self.codec
            .decode(&bytes)
            .with_context(|| format!("decode bundle failed: {}", path.display()))
    }

    /// First unused of `<file>.<suffix>`, `<file>.<suffix>.1`, `<file>.<suffix>.2`, ...
    fn free_backup_name(&self, path: &Path) -> PathBuf {
        let base = format!("{}.{}", path.display(), self.backup_suffix);
        let mut candidate = PathBuf::from(&base);
        let mut n = 1u32;
        while candidate.exists() {
            candidate = PathBuf::from(format!("{base}.{n}"));
            n += 1;
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfx_model::PropertyHeader;

    fn settings(dir: &Path) -> BundleSettings {
        BundleSettings {
            directory: dir.join("bundles"),
            ..BundleSettings::default()
        }
    }

    fn area(pid: &str) -> ConfigurationAreaProperties {
        ConfigurationAreaProperties::new(PropertyHeader::new(pid, pid), "authority.default")
    }

    #[test]
    fn open_creates_the_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = BundleDirectory::open(&settings(tmp.path())).unwrap();
        assert!(dir.root().is_dir());
    }

    #[test]
    fn path_for_rejects_names_escaping_the_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = BundleDirectory::open(&settings(tmp.path())).unwrap();
        assert!(dir.path_for(&Pid::new("../etc")).is_err());
        assert!(dir.path_for(&Pid::new("  ")).is_err());
        assert_eq!(
            dir.path_for(&Pid::new("kv.a")).unwrap(),
            dir.root().join("kv.a.json")
        );
    }

    #[test]
    fn rewriting_rotates_existing_files_to_numbered_backups() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = BundleDirectory::open(&settings(tmp.path())).unwrap();
        let mut a = area("kv.a");

        let path = dir.write_area(&a).unwrap();
        a.header.name = "second".into();
        dir.write_area(&a).unwrap();
        a.header.name = "third".into();
        dir.write_area(&a).unwrap();

        let first_backup = dir.root().join("kv.a.json.bak");
        let second_backup = dir.root().join("kv.a.json.bak.1");
        assert!(first_backup.is_file());
        assert!(second_backup.is_file());
        assert_eq!(dir.read_area(&Pid::new("kv.a")).unwrap().header.name, "third");
        assert_eq!(dir.read_path(&first_backup).unwrap().header.name, "kv.a");
        assert_eq!(dir.read_path(&second_backup).unwrap().header.name, "second");
        assert!(path.ends_with("kv.a.json"));
    }

    #[test]
    fn read_all_skips_backups_and_foreign_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = BundleDirectory::open(&settings(tmp.path())).unwrap();
        dir.write_area(&area("kv.b")).unwrap();
        dir.write_area(&area("kv.a")).unwrap();
        dir.write_area(&area("kv.a")).unwrap();
        fs::write(dir.root().join("notes.txt"), "ignored").unwrap();

        let all = dir.read_all().unwrap();
        let pids: Vec<&str> = all.iter().map(|a| a.header.pid.as_str()).collect();
        assert_eq!(pids, vec!["kv.a", "kv.b"]);
    }
}
