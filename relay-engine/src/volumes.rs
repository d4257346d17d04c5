//! Path/volume resolution
//!
//! Turns a step's path mappings into pass-through bindings for the remote
//! mount and performs the staging the remote task cannot do itself: copying
//! writable inputs into the output directory, creating writable directories
//! and writing generated files.

use relay_core::domain::mapping::{MappingKind, PathMappingEntry, VolumeBinding};
use std::fs::{self, DirBuilder};
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{EngineError, Result};

/// Mode for directories created for placeholder writable directories
const CREATED_DIR_MODE: u32 = 0o755;

/// Write bits added to copied writable inputs
const WRITABLE_BITS: u32 = 0o222;

/// Filesystem action performed while resolving a mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingAction {
    CopiedFile { from: PathBuf, to: PathBuf },
    CopiedTree { from: PathBuf, to: PathBuf },
    CreatedDir(PathBuf),
    WroteFile(PathBuf),
}

/// Outcome of resolving a set of mappings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub bindings: Vec<VolumeBinding>,
    pub actions: Vec<StagingAction>,
}

impl Resolution {
    /// Appends the result of a later resolution pass
    pub fn extend(&mut self, other: Resolution) {
        self.bindings.extend(other.bindings);
        self.actions.extend(other.actions);
    }
}

/// Resolves mappings for one job
#[derive(Debug, Clone)]
pub struct VolumeResolver {
    host_outdir: PathBuf,
    container_outdir: String,
    tmpdir: PathBuf,
    inplace_update: bool,
}

impl VolumeResolver {
    pub fn new(
        host_outdir: impl Into<PathBuf>,
        container_outdir: impl Into<String>,
        tmpdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host_outdir: host_outdir.into(),
            container_outdir: container_outdir.into(),
            tmpdir: tmpdir.into(),
            inplace_update: false,
        }
    }

    /// Binds writable inputs in place instead of copying them
    pub fn with_inplace_update(mut self, inplace_update: bool) -> Self {
        self.inplace_update = inplace_update;
        self
    }

    /// Maps a container path below the container outdir onto the host outdir
    pub fn host_target(&self, target: &str) -> Option<PathBuf> {
        let prefix = format!("{}/", self.container_outdir.trim_end_matches('/'));
        target
            .strip_prefix(&prefix)
            .map(|rest| self.host_outdir.join(rest))
    }

    pub fn resolve(&self, entries: &[PathMappingEntry]) -> Result<Resolution> {
        let mut resolution = Resolution::default();

        for entry in entries.iter().filter(|e| e.staged) {
            let host_target = self.host_target(&entry.target);

            match entry.kind {
                MappingKind::File | MappingKind::Directory => {
                    if !entry.is_placeholder() {
                        resolution
                            .bindings
                            .push(VolumeBinding::new(&entry.resolved, &entry.target));
                    }
                }
                MappingKind::WritableFile => {
                    if self.inplace_update {
                        resolution
                            .bindings
                            .push(VolumeBinding::new(&entry.resolved, &entry.target));
                    } else {
                        let to = self.require_host_target(entry, host_target)?;
                        let from = PathBuf::from(&entry.resolved);
                        copy_file(&from, &to)?;
                        ensure_writable(&to)?;
                        resolution
                            .actions
                            .push(StagingAction::CopiedFile { from, to });
                    }
                }
                MappingKind::WritableDirectory => {
                    if entry.is_placeholder() {
                        let dir = host_target.unwrap_or_else(|| PathBuf::from(&entry.target));
                        if !dir.exists() {
                            DirBuilder::new()
                                .recursive(true)
                                .mode(CREATED_DIR_MODE)
                                .create(&dir)
                                .map_err(|e| EngineError::io("creating directory", &dir, e))?;
                            resolution.actions.push(StagingAction::CreatedDir(dir));
                        }
                    } else if !self.inplace_update {
                        let to = self.require_host_target(entry, host_target)?;
                        let from = PathBuf::from(&entry.resolved);
                        copy_tree(&from, &to)?;
                        ensure_writable(&to)?;
                        resolution
                            .actions
                            .push(StagingAction::CopiedTree { from, to });
                    }
                }
                MappingKind::CreateFile => {
                    let path = match host_target {
                        Some(path) => path,
                        None => {
                            fs::create_dir_all(&self.tmpdir).map_err(|e| {
                                EngineError::io("creating temp directory", &self.tmpdir, e)
                            })?;
                            self.tmpdir.join(format!("createfile-{}", Uuid::new_v4()))
                        }
                    };
                    fs::write(&path, entry.resolved.as_bytes())
                        .map_err(|e| EngineError::io("writing generated file", &path, e))?;
                    resolution.actions.push(StagingAction::WroteFile(path));
                }
            }
        }

        debug!(
            "Resolved {} binding(s), {} staging action(s)",
            resolution.bindings.len(),
            resolution.actions.len()
        );

        Ok(resolution)
    }

    fn require_host_target(
        &self,
        entry: &PathMappingEntry,
        host_target: Option<PathBuf>,
    ) -> Result<PathBuf> {
        host_target.ok_or_else(|| EngineError::WritableOutsideOutdir {
            target: entry.target.clone(),
            outdir: self.container_outdir.clone(),
        })
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| EngineError::io("creating directory", parent, e))?;
    }
    fs::copy(from, to).map_err(|e| EngineError::io("copying", from, e))?;
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            EngineError::io("walking", &path, e.into())
        })?;
        let rel = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let dest = to.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| EngineError::io("creating directory", &dest, e))?;
        } else {
            fs::copy(entry.path(), &dest)
                .map_err(|e| EngineError::io("copying", entry.path(), e))?;
        }
    }
    Ok(())
}

/// Adds write permission for everyone to a path and, for directories,
/// everything below it
pub fn ensure_writable(path: &Path) -> Result<()> {
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|e| {
            let p = e.path().unwrap_or(path).to_path_buf();
            EngineError::io("walking", &p, e.into())
        })?;
        if entry.file_type().is_symlink() {
            continue;
        }
        let meta = entry
            .metadata()
            .map_err(|e| EngineError::io("reading metadata of", entry.path(), e.into()))?;
        let mut perms = meta.permissions();
        perms.set_mode(perms.mode() | WRITABLE_BITS);
        fs::set_permissions(entry.path(), perms)
            .map_err(|e| EngineError::io("changing permissions of", entry.path(), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::domain::mapping::PathMappingEntry;

    struct Scratch(PathBuf);

    impl Scratch {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("relay-volumes-{}", Uuid::new_v4()));
            fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn resolver(scratch: &Scratch) -> VolumeResolver {
        let outdir = scratch.0.join("out");
        fs::create_dir_all(&outdir).unwrap();
        VolumeResolver::new(outdir, "/var/spool/cwl", scratch.0.join("tmp"))
    }

    #[test]
    fn test_unstaged_entries_are_ignored() {
        let scratch = Scratch::new();
        let r = resolver(&scratch);
        let entries = vec![
            PathMappingEntry::new("/data/a.txt", "/var/lib/cwl/s/a.txt", MappingKind::File)
                .unstaged(),
            PathMappingEntry::new("content", "/var/spool/cwl/gen.txt", MappingKind::CreateFile)
                .unstaged(),
            PathMappingEntry::new("_:d", "/var/spool/cwl/d", MappingKind::WritableDirectory)
                .unstaged(),
        ];

        let resolution = r.resolve(&entries).unwrap();
        assert_eq!(resolution, Resolution::default());
        assert!(!scratch.0.join("out/gen.txt").exists());
        assert!(!scratch.0.join("out/d").exists());
    }

    #[test]
    fn test_read_only_inputs_become_bindings() {
        let scratch = Scratch::new();
        let r = resolver(&scratch);
        let entries = vec![
            PathMappingEntry::new("/data/a.txt", "/var/lib/cwl/s/a.txt", MappingKind::File),
            PathMappingEntry::new("/data/dir", "/var/lib/cwl/s/dir", MappingKind::Directory),
            PathMappingEntry::new("_:literal", "/var/lib/cwl/s/lit", MappingKind::File),
        ];

        let resolution = r.resolve(&entries).unwrap();
        assert_eq!(
            resolution.bindings,
            vec![
                VolumeBinding::new("/data/a.txt", "/var/lib/cwl/s/a.txt"),
                VolumeBinding::new("/data/dir", "/var/lib/cwl/s/dir"),
            ]
        );
        assert!(resolution.actions.is_empty());
    }

    #[test]
    fn test_writable_file_is_copied_and_made_writable() {
        let scratch = Scratch::new();
        let r = resolver(&scratch);
        let src = scratch.0.join("input.txt");
        fs::write(&src, "payload").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o444)).unwrap();

        let entries = vec![PathMappingEntry::new(
            src.to_string_lossy(),
            "/var/spool/cwl/input.txt",
            MappingKind::WritableFile,
        )];
        let resolution = r.resolve(&entries).unwrap();

        let dest = scratch.0.join("out/input.txt");
        assert_eq!(fs::read_to_string(&dest).unwrap(), "payload");
        assert_ne!(fs::metadata(&dest).unwrap().permissions().mode() & 0o200, 0);
        assert!(resolution.bindings.is_empty());
        assert_eq!(
            resolution.actions,
            vec![StagingAction::CopiedFile { from: src, to: dest }]
        );
    }

    #[test]
    fn test_writable_file_inplace_is_bound() {
        let scratch = Scratch::new();
        let r = resolver(&scratch).with_inplace_update(true);
        let entries = vec![PathMappingEntry::new(
            "/data/input.txt",
            "/var/spool/cwl/input.txt",
            MappingKind::WritableFile,
        )];

        let resolution = r.resolve(&entries).unwrap();
        assert_eq!(
            resolution.bindings,
            vec![VolumeBinding::new("/data/input.txt", "/var/spool/cwl/input.txt")]
        );
        assert!(!scratch.0.join("out/input.txt").exists());
    }

    #[test]
    fn test_writable_file_outside_outdir_is_rejected() {
        let scratch = Scratch::new();
        let r = resolver(&scratch);
        let entries = vec![PathMappingEntry::new(
            "/data/input.txt",
            "/elsewhere/input.txt",
            MappingKind::WritableFile,
        )];

        let err = r.resolve(&entries).unwrap_err();
        assert!(matches!(err, EngineError::WritableOutsideOutdir { .. }));
    }

    #[test]
    fn test_placeholder_writable_directory_is_created_once() {
        let scratch = Scratch::new();
        let r = resolver(&scratch);
        let entry =
            PathMappingEntry::new("_:work", "/var/spool/cwl/work", MappingKind::WritableDirectory);

        let first = r.resolve(std::slice::from_ref(&entry)).unwrap();
        let dir = scratch.0.join("out/work");
        assert_eq!(first.actions, vec![StagingAction::CreatedDir(dir.clone())]);
        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o700, 0o700);
        assert_eq!(mode & 0o022, 0);

        let second = r.resolve(&[entry]).unwrap();
        assert!(second.actions.is_empty());
    }

    #[test]
    fn test_writable_directory_is_copied() {
        let scratch = Scratch::new();
        let r = resolver(&scratch);
        let src = scratch.0.join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested/f.txt"), "x").unwrap();
        fs::set_permissions(src.join("nested/f.txt"), fs::Permissions::from_mode(0o444)).unwrap();

        let entries = vec![PathMappingEntry::new(
            src.to_string_lossy(),
            "/var/spool/cwl/copy",
            MappingKind::WritableDirectory,
        )];
        r.resolve(&entries).unwrap();

        let copied = scratch.0.join("out/copy/nested/f.txt");
        assert_eq!(fs::read_to_string(&copied).unwrap(), "x");
        assert_ne!(fs::metadata(&copied).unwrap().permissions().mode() & 0o200, 0);
    }

    #[test]
    fn test_writable_directory_inplace_does_nothing() {
        let scratch = Scratch::new();
        let r = resolver(&scratch).with_inplace_update(true);
        let entries = vec![PathMappingEntry::new(
            "/data/dir",
            "/var/spool/cwl/dir",
            MappingKind::WritableDirectory,
        )];

        assert_eq!(r.resolve(&entries).unwrap(), Resolution::default());
    }

    #[test]
    fn test_create_file_in_outdir() {
        let scratch = Scratch::new();
        let r = resolver(&scratch);
        let entries = vec![PathMappingEntry::new(
            "héllo\n",
            "/var/spool/cwl/gen.txt",
            MappingKind::CreateFile,
        )];

        r.resolve(&entries).unwrap();
        assert_eq!(
            fs::read(scratch.0.join("out/gen.txt")).unwrap(),
            "héllo\n".as_bytes()
        );
    }

    #[test]
    fn test_create_file_outside_outdir_goes_to_tmpdir() {
        let scratch = Scratch::new();
        let r = resolver(&scratch);
        let entries = vec![PathMappingEntry::new(
            "content",
            "/var/lib/cwl/gen.txt",
            MappingKind::CreateFile,
        )];

        let resolution = r.resolve(&entries).unwrap();
        match &resolution.actions[..] {
            [StagingAction::WroteFile(path)] => {
                assert!(path.starts_with(scratch.0.join("tmp")));
                assert_eq!(fs::read_to_string(path).unwrap(), "content");
            }
            other => panic!("unexpected actions: {:?}", other),
        }
    }
}
