//! Shared helpers for boundary loading behaviour tests.

use boundaries_data::test_support::{ShapefileFixture, WGS84_PRJ, square};
use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

/// A temporary data directory removed when dropped.
pub struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap_or_else(|err| panic!("failed to create tempdir: {err}"));
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .unwrap_or_else(|path| panic!("tempdir {path:?} is not UTF-8"));
        Self { _dir: dir, root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Write `fixture` as `<dir>/<stem>.zip` alongside a definition naming
    /// it `set_name`, with names from `NAME` and ids from `DISTRICT`.
    pub fn write_set(&self, dir: &str, set_name: &str, stem: &str, fixture: &ShapefileFixture) {
        let set_dir = self.root.join(dir);
        let archive = set_dir.join(format!("{stem}.zip"));
        boundaries_fs::ensure_parent_dir(&archive)
            .unwrap_or_else(|err| panic!("failed to create {set_dir}: {err}"));
        fixture
            .write_zip(&archive, "", stem)
            .unwrap_or_else(|err| panic!("failed to write {archive}: {err}"));
        let definition = format!(
            "[[boundary_set]]\n\
             name = \"{set_name}\"\n\
             file = \"{stem}.zip\"\n\
             name_func = {{ kind = \"simple\", fields = [\"NAME\"] }}\n\
             id_func = {{ kind = \"simple\", fields = [\"DISTRICT\"] }}\n"
        );
        boundaries_fs::write_file(&set_dir.join("definition.toml"), definition.as_bytes())
            .unwrap_or_else(|err| panic!("failed to write definition in {set_dir}: {err}"));
    }
}

/// Two adjacent square districts with `NAME` and `DISTRICT` attributes.
pub fn districts() -> ShapefileFixture {
    ShapefileFixture::new(["NAME", "DISTRICT"])
        .with_projection(WGS84_PRJ)
        .with_record(square(0.0, 0.0, 1.0), ["North District", "1"])
        .with_record(square(1.0, 0.0, 1.0), ["South District", "2"])
}
