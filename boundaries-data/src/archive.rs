//! Resolve a configured source path into shapefile data sources.
//!
//! Zip archives are unpacked into scratch directories owned by the returned
//! [`Resolution`]; the directories are removed by [`Resolution::cleanup`] or
//! when the resolution is dropped.

use std::io::{Cursor, Read};

use boundaries_fs::PathKind;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use tempfile::TempDir;
use thiserror::Error;
use zip::ZipArchive;

/// Errors raised while resolving a source path.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Nothing exists at the configured path.
    #[error("source {path} does not exist")]
    Missing {
        /// Configured path.
        path: Utf8PathBuf,
    },
    /// The path is not a zip archive, shapefile or directory.
    #[error("source {path} is not a zip archive, shapefile or directory")]
    UnsupportedSource {
        /// Configured path.
        path: Utf8PathBuf,
    },
    /// The archive holds no `.shp` file.
    #[error("no shapefile found in {path}")]
    NoShapefileFound {
        /// Archive path.
        path: Utf8PathBuf,
    },
    /// Reading the source failed.
    #[error("failed to read {path}")]
    Io {
        /// Path being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The archive could not be decoded.
    #[error("failed to read zip archive {path}")]
    Zip {
        /// Archive path.
        path: Utf8PathBuf,
        /// Source error returned by `zip`.
        #[source]
        source: zip::result::ZipError,
    },
    /// A scratch directory could not be created or populated.
    #[error("failed to unpack {path} into a scratch directory")]
    Scratch {
        /// Archive path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Data sources found for one configured path, plus the scratch
/// directories backing any unpacked archives.
#[derive(Debug, Default)]
pub struct Resolution {
    sources: Vec<Utf8PathBuf>,
    scratch: Vec<TempDir>,
}

impl Resolution {
    /// Paths of the `.shp` files found, in resolution order.
    #[must_use]
    pub fn sources(&self) -> &[Utf8PathBuf] {
        &self.sources
    }

    /// Whether no data source was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Scratch directories created while resolving.
    pub fn scratch_dirs(&self) -> impl Iterator<Item = &std::path::Path> {
        self.scratch.iter().map(TempDir::path)
    }

    fn absorb(&mut self, other: Self) {
        self.sources.extend(other.sources);
        self.scratch.extend(other.scratch);
    }

    /// Remove every scratch directory. Failures are logged.
    pub fn cleanup(self) {
        for dir in self.scratch {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("removed scratch directory {}", path.display()),
                Err(err) => warn!("failed to remove scratch directory {}: {err}", path.display()),
            }
        }
    }
}

/// Turns directories, zip archives and `.shp` paths into data sources.
#[derive(Debug, Clone, Default)]
pub struct ArchiveResolver {
    scratch_root: Option<Utf8PathBuf>,
}

impl ArchiveResolver {
    /// Resolver unpacking archives under the system temporary directory.
    #[must_use]
    pub const fn new() -> Self {
        Self { scratch_root: None }
    }

    /// Resolver unpacking archives under `root`.
    #[must_use]
    pub fn with_scratch_root(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            scratch_root: Some(root.into()),
        }
    }

    /// Resolve `path`.
    ///
    /// - `*.zip` is unpacked and every `.shp` inside becomes a source, in
    ///   archive order.
    /// - `*.shp` is a single source.
    /// - A directory contributes each `.zip` and `.shp` entry directly
    ///   inside it, sorted by file name.
    pub fn resolve(&self, path: &Utf8Path) -> Result<Resolution, ArchiveError> {
        let kind = boundaries_fs::path_kind(path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match kind {
            PathKind::Missing => Err(ArchiveError::Missing {
                path: path.to_path_buf(),
            }),
            PathKind::Directory => self.resolve_directory(path),
            PathKind::File if has_extension(path, "zip") => self.unpack(path),
            PathKind::File if has_extension(path, "shp") => Ok(Resolution {
                sources: vec![path.to_path_buf()],
                scratch: Vec::new(),
            }),
            PathKind::File | PathKind::Other => Err(ArchiveError::UnsupportedSource {
                path: path.to_path_buf(),
            }),
        }
    }

    fn resolve_directory(&self, dir: &Utf8Path) -> Result<Resolution, ArchiveError> {
        let entries = boundaries_fs::list_dir_sorted(dir).map_err(|source| ArchiveError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut resolution = Resolution::default();
        for entry in entries {
            if !(has_extension(&entry, "zip") || has_extension(&entry, "shp")) {
                continue;
            }
            let kind = boundaries_fs::path_kind(&entry).map_err(|source| ArchiveError::Io {
                path: entry.clone(),
                source,
            })?;
            if kind == PathKind::File {
                resolution.absorb(self.resolve(&entry)?);
            }
        }
        Ok(resolution)
    }

    fn scratch_dir(&self, archive: &Utf8Path) -> Result<TempDir, ArchiveError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("boundaries-");
        let created = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        created.map_err(|source| ArchiveError::Scratch {
            path: archive.to_path_buf(),
            source,
        })
    }

    fn unpack(&self, archive_path: &Utf8Path) -> Result<Resolution, ArchiveError> {
        let bytes = boundaries_fs::read_file(archive_path).map_err(|source| ArchiveError::Io {
            path: archive_path.to_path_buf(),
            source,
        })?;
        let zip_error = |source| ArchiveError::Zip {
            path: archive_path.to_path_buf(),
            source,
        };
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;

        let scratch = self.scratch_dir(archive_path)?;
        let scratch_error = |source| ArchiveError::Scratch {
            path: archive_path.to_path_buf(),
            source,
        };
        let root = Utf8Path::from_path(scratch.path())
            .ok_or_else(|| {
                scratch_error(std::io::Error::other("scratch directory is not valid UTF-8"))
            })?
            .to_path_buf();

        let mut sources = Vec::new();
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(zip_error)?;
            let Some(relative) = entry
                .enclosed_name()
                .and_then(|name| Utf8PathBuf::from_path_buf(name.to_path_buf()).ok())
            else {
                warn!("skipping unsafe entry {:?} in {archive_path}", entry.name());
                continue;
            };
            if entry.is_dir() {
                boundaries_fs::create_dir_beneath(&root, &relative).map_err(scratch_error)?;
                continue;
            }
            let mut contents = Vec::new();
            entry
                .read_to_end(&mut contents)
                .map_err(|source| ArchiveError::Io {
                    path: archive_path.to_path_buf(),
                    source,
                })?;
            boundaries_fs::write_beneath(&root, &relative, &contents).map_err(scratch_error)?;
            if has_extension(&relative, "shp") {
                sources.push(root.join(&relative));
            }
        }

        if sources.is_empty() {
            if let Err(err) = scratch.close() {
                warn!("failed to remove scratch directory for {archive_path}: {err}");
            }
            return Err(ArchiveError::NoShapefileFound {
                path: archive_path.to_path_buf(),
            });
        }
        debug!(
            "unpacked {archive_path} into {root} with {} shapefile(s)",
            sources.len()
        );
        Ok(Resolution {
            sources,
            scratch: vec![scratch],
        })
    }
}

/// Resolve `path` with scratch directories under the system temporary
/// directory.
pub fn resolve(path: &Utf8Path) -> Result<Resolution, ArchiveError> {
    ArchiveResolver::new().resolve(path)
}

fn has_extension(path: &Utf8Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ShapefileFixture, square, write_zip};
    use rstest::{fixture, rstest};

    #[fixture]
    fn scratch() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        (dir, path)
    }

    fn fixture() -> ShapefileFixture {
        ShapefileFixture::new(["NAME"]).with_record(square(0.0, 0.0, 1.0), ["Ward"])
    }

    fn entries(dir: &Utf8Path) -> Vec<Utf8PathBuf> {
        boundaries_fs::list_dir_sorted(dir).expect("list")
    }

    #[rstest]
    fn single_shapefile_is_its_own_source(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        let shp = fixture().write_to(&root, "wards").expect("write");
        let resolution = resolve(&shp).expect("resolves");
        assert_eq!(resolution.sources(), [shp]);
        assert_eq!(resolution.scratch_dirs().count(), 0);
    }

    #[rstest]
    fn zip_sources_live_until_cleanup(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        let work = root.join("work");
        boundaries_fs::create_dir_beneath(&root, Utf8Path::new("work")).expect("work dir");
        let archive = root.join("wards.zip");
        fixture()
            .write_zip(&archive, "nested/", "wards")
            .expect("write zip");

        let resolution = ArchiveResolver::with_scratch_root(work.clone())
            .resolve(&archive)
            .expect("resolves");
        let source = resolution.sources().first().expect("one source").clone();
        assert!(source.ends_with("nested/wards.shp"));
        assert_eq!(
            boundaries_fs::path_kind(&source).expect("kind"),
            PathKind::File
        );
        resolution.cleanup();
        assert!(entries(&work).is_empty());
    }

    #[rstest]
    fn zip_without_shapefile_leaves_no_scratch(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        let work = root.join("work");
        boundaries_fs::create_dir_beneath(&root, Utf8Path::new("work")).expect("work dir");
        let archive = root.join("empty.zip");
        write_zip(&archive, &[("readme.txt".to_owned(), b"no data".to_vec())]).expect("zip");

        let err = ArchiveResolver::with_scratch_root(work.clone())
            .resolve(&archive)
            .expect_err("no shapefile");
        assert!(matches!(err, ArchiveError::NoShapefileFound { .. }));
        assert!(entries(&work).is_empty());
    }

    #[rstest]
    fn unsafe_entries_are_skipped(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        let work = root.join("work");
        boundaries_fs::create_dir_beneath(&root, Utf8Path::new("work")).expect("work dir");
        let archive = root.join("evil.zip");
        let mut files = fixture().files("wards");
        files.push(("../escaped.txt".to_owned(), b"x".to_vec()));
        write_zip(&archive, &files).expect("zip");

        let resolution = ArchiveResolver::with_scratch_root(work.clone())
            .resolve(&archive)
            .expect("resolves");
        assert_eq!(resolution.sources().len(), 1);
        assert_eq!(
            boundaries_fs::path_kind(&work.join("escaped.txt")).expect("kind"),
            PathKind::Missing
        );
        resolution.cleanup();
    }

    #[rstest]
    fn directories_resolve_sorted_and_flat(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        fixture().write_to(&root, "b_wards").expect("write b");
        fixture()
            .write_zip(&root.join("a_wards.zip"), "", "a_wards")
            .expect("write a");
        boundaries_fs::create_dir_beneath(&root, Utf8Path::new("nested")).expect("nested");
        fixture()
            .write_to(&root.join("nested"), "ignored")
            .expect("write nested");

        let resolution = resolve(&root).expect("resolves");
        let names: Vec<_> = resolution
            .sources()
            .iter()
            .filter_map(|path| path.file_name().map(str::to_owned))
            .collect();
        assert_eq!(names, ["a_wards.shp", "b_wards.shp"]);
        resolution.cleanup();
    }

    #[rstest]
    fn other_files_are_unsupported(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        let path = root.join("notes.txt");
        boundaries_fs::write_file(&path, b"hello").expect("write");
        assert!(matches!(
            resolve(&path),
            Err(ArchiveError::UnsupportedSource { .. })
        ));
        assert!(matches!(
            resolve(&root.join("absent.zip")),
            Err(ArchiveError::Missing { .. })
        ));
    }
}
