//! Test helpers for composing data directories for the load command.

use super::*;
use boundaries_data::test_support::{ShapefileFixture, WGS84_PRJ, square, write_zip};
use tempfile::TempDir;

/// A temporary data directory and database path.
#[derive(Debug)]
pub(super) struct DatasetFiles {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl DatasetFiles {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root =
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir path");
        boundaries_fs::create_dir_beneath(&root, Utf8Path::new("shapefiles"))
            .expect("create data directory");
        Self { _dir: dir, root }
    }

    pub(super) fn data_dir(&self) -> Utf8PathBuf {
        self.root.join("shapefiles")
    }

    pub(super) fn database(&self) -> Utf8PathBuf {
        self.root.join("out/boundaries.db")
    }

    pub(super) fn missing_dir(&self) -> Utf8PathBuf {
        self.root.join("absent")
    }

    /// Add `<dir>/wards.zip` with two wards and a definition naming it
    /// `set_name`.
    pub(super) fn write_wards(&self, dir: &str, set_name: &str) {
        let set_dir = self.data_dir().join(dir);
        let archive = set_dir.join("wards.zip");
        boundaries_fs::ensure_parent_dir(&archive).expect("create set directory");
        ShapefileFixture::new(["NAME", "WARD"])
            .with_projection(WGS84_PRJ)
            .with_record(square(0.0, 0.0, 1.0), ["Ward One", "1"])
            .with_record(square(1.0, 0.0, 1.0), ["Ward Two", "2"])
            .write_zip(&archive, "", "wards")
            .expect("write wards archive");
        self.write_definition(&set_dir, set_name, "wards.zip");
    }

    /// Add a set whose archive holds no shapefile.
    pub(super) fn write_broken(&self, dir: &str, set_name: &str) {
        let set_dir = self.data_dir().join(dir);
        let archive = set_dir.join("broken.zip");
        boundaries_fs::ensure_parent_dir(&archive).expect("create set directory");
        write_zip(
            &archive,
            &[("README.txt".to_owned(), b"no shapes here".to_vec())],
        )
        .expect("write broken archive");
        self.write_definition(&set_dir, set_name, "broken.zip");
    }

    fn write_definition(&self, set_dir: &Utf8Path, set_name: &str, file: &str) {
        let definition = format!(
            "[[boundary_set]]\n\
             name = \"{set_name}\"\n\
             file = \"{file}\"\n\
             name_func = {{ kind = \"simple\", fields = [\"NAME\"] }}\n\
             id_func = {{ kind = \"simple\", fields = [\"WARD\"] }}\n"
        );
        boundaries_fs::write_file(&set_dir.join("definition.toml"), definition.as_bytes())
            .expect("write definition");
    }

    /// Arguments pointing the load command at this dataset.
    pub(super) fn path_args(&self) -> Vec<String> {
        vec![
            format!("--{ARG_DATA_DIR}"),
            self.data_dir().into_string(),
            format!("--{ARG_DATABASE}"),
            self.database().into_string(),
        ]
    }
}

/// Parse `extra` after `boundaries load` and run the load without
/// consulting configuration files or the environment.
pub(super) fn load_with_args<I, S>(extra: I) -> Result<LoadSummary, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut invocation = vec!["boundaries".to_owned(), "load".to_owned()];
    invocation.extend(extra.into_iter().map(Into::into));
    let cli = Cli::try_parse_from(invocation).map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Load(args) => run_load(&LoadConfig::from(args)),
    }
}
