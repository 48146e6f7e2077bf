//! Reader for ESRI shapefiles.
//!
//! A shapefile is a `.shp` geometry file with a `.dbf` attribute table and an
//! optional `.prj` projection description beside it. Companion files are
//! matched on stem with a case-insensitive extension, as archives from
//! different publishers mix `.SHP` and `.shp` freely.
//!
//! Files are read into memory when a [`Layer`] opens; records are decoded
//! lazily while iterating [`Layer::features`].

mod bytes;
mod dbf;
mod shp;

use boundaries_core::RawValue;
use camino::{Utf8Path, Utf8PathBuf};
use geo::Geometry;
use log::{debug, warn};
use thiserror::Error;

/// Structural problems in shapefile data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The data ended inside a structure.
    #[error("unexpected end of data at byte {offset}")]
    Truncated {
        /// Byte offset of the structure that was cut short.
        offset: usize,
    },
    /// A count or length field holds a negative value.
    #[error("negative count {value} at byte {offset}")]
    NegativeCount {
        /// Byte offset of the field.
        offset: usize,
        /// Value found.
        value: i32,
    },
    /// The main file does not start with the shapefile magic number.
    #[error("expected file code 9994, found {found}")]
    FileCode {
        /// File code found.
        found: i32,
    },
    /// The record uses a shape type this reader cannot represent.
    #[error("unsupported shape type {shape_type}")]
    ShapeType {
        /// Type code found.
        shape_type: i32,
    },
    /// The part table of a record points outside its point array.
    #[error("record at byte {offset} has an invalid part table")]
    Parts {
        /// Byte offset of the record content.
        offset: usize,
    },
    /// The attribute table header is inconsistent.
    #[error("invalid dBASE header: {reason}")]
    DbfHeader {
        /// What was wrong.
        reason: &'static str,
    },
    /// Geometry and attribute record counts differ.
    #[error("{shapes} geometry records but {records} attribute records")]
    RecordCount {
        /// Records in the `.shp` file.
        shapes: usize,
        /// Records in the `.dbf` file.
        records: usize,
    },
}

/// Errors raised while opening or reading a shapefile.
#[derive(Debug, Error)]
pub enum ShapefileError {
    /// A file could not be read.
    #[error("failed to read {path}")]
    Read {
        /// File that could not be read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A required companion file is missing.
    #[error("shapefile {path} has no .{extension} companion")]
    MissingCompanion {
        /// The `.shp` file.
        path: Utf8PathBuf,
        /// Extension of the missing file.
        extension: &'static str,
    },
    /// The file contents are malformed.
    #[error("malformed shapefile data in {path}")]
    Format {
        /// File holding the malformed data.
        path: Utf8PathBuf,
        /// What was malformed.
        #[source]
        source: FormatError,
    },
}

/// One record of a layer before any decoding or normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    /// Zero-based record position in the layer.
    pub index: usize,
    /// Geometry, or `None` for a null shape.
    pub geometry: Option<Geometry<f64>>,
    /// Attributes in table order.
    pub attributes: Vec<(String, RawValue)>,
}

/// The single layer of a shapefile.
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    shp_path: Utf8PathBuf,
    dbf_path: Utf8PathBuf,
    shp: Vec<u8>,
    dbf: Vec<u8>,
    projection: Option<String>,
    records: Vec<(usize, usize)>,
    table: dbf::Table,
}

impl Layer {
    /// Open the shapefile whose main file is `shp_path`.
    pub fn open(shp_path: &Utf8Path) -> Result<Self, ShapefileError> {
        let read = |path: &Utf8Path| {
            boundaries_fs::read_file(path).map_err(|source| ShapefileError::Read {
                path: path.to_path_buf(),
                source,
            })
        };
        let shp = read(shp_path)?;
        let dbf_path =
            companion(shp_path, "dbf")?.ok_or_else(|| ShapefileError::MissingCompanion {
                path: shp_path.to_path_buf(),
                extension: "dbf",
            })?;
        let dbf = read(&dbf_path)?;
        let projection = match companion(shp_path, "prj")? {
            Some(prj_path) => Some(String::from_utf8_lossy(&read(&prj_path)?).into_owned()),
            None => None,
        };

        let records = shp::record_offsets(&shp).map_err(malformed(shp_path))?;
        let table = dbf::Table::parse(&dbf).map_err(malformed(&dbf_path))?;
        if records.len() != table.record_count() {
            return Err(ShapefileError::Format {
                path: shp_path.to_path_buf(),
                source: FormatError::RecordCount {
                    shapes: records.len(),
                    records: table.record_count(),
                },
            });
        }

        let name = shp_path.file_stem().unwrap_or_default().to_owned();
        debug!(
            "opened layer {name} with {} records from {shp_path}",
            records.len()
        );
        Ok(Self {
            name,
            shp_path: shp_path.to_path_buf(),
            dbf_path,
            shp,
            dbf,
            projection,
            records,
            table,
        })
    }

    /// Layer name, the stem of the `.shp` file.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the `.shp` file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.shp_path
    }

    /// Contents of the `.prj` file, when present.
    #[must_use]
    pub fn projection(&self) -> Option<&str> {
        self.projection.as_deref()
    }

    /// Attribute field names in table order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.table.field_names()
    }

    /// Number of records, including deleted ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the layer has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate live records in file order. Records flagged as deleted in
    /// the attribute table are skipped along with their geometry.
    #[must_use]
    pub fn features(&self) -> Features<'_> {
        Features {
            layer: self,
            position: 0,
            failed: false,
        }
    }

    fn read_feature(&self, index: usize) -> Result<Option<RawFeature>, ShapefileError> {
        let Some(attributes) = self
            .table
            .record(&self.dbf, index)
            .map_err(malformed(&self.dbf_path))?
        else {
            return Ok(None);
        };
        let (offset, len) = self
            .records
            .get(index)
            .copied()
            .ok_or_else(|| ShapefileError::Format {
                path: self.shp_path.clone(),
                source: FormatError::RecordCount {
                    shapes: self.records.len(),
                    records: self.table.record_count(),
                },
            })?;
        let geometry =
            shp::read_shape(&self.shp, offset, len).map_err(malformed(&self.shp_path))?;
        Ok(Some(RawFeature {
            index,
            geometry,
            attributes,
        }))
    }
}

/// Iterator over the live records of a [`Layer`].
///
/// Iteration stops after the first error.
#[derive(Debug)]
pub struct Features<'a> {
    layer: &'a Layer,
    position: usize,
    failed: bool,
}

impl Iterator for Features<'_> {
    type Item = Result<RawFeature, ShapefileError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed && self.position < self.layer.len() {
            let index = self.position;
            self.position += 1;
            match self.layer.read_feature(index) {
                Ok(Some(feature)) => return Some(Ok(feature)),
                Ok(None) => debug!("skipping deleted record {index} of {}", self.layer.name),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

/// A source of layers. A shapefile always has exactly one.
#[derive(Debug, Clone)]
pub struct DataSource {
    path: Utf8PathBuf,
    layers: Vec<Layer>,
}

impl DataSource {
    /// Open the shapefile at `path`.
    pub fn open(path: &Utf8Path) -> Result<Self, ShapefileError> {
        Ok(Self {
            path: path.to_path_buf(),
            layers: vec![Layer::open(path)?],
        })
    }

    /// A source holding `layers` in order.
    #[cfg(test)]
    pub(crate) fn from_layers(path: &Utf8Path, layers: Vec<Layer>) -> Self {
        Self {
            path: path.to_path_buf(),
            layers,
        }
    }

    /// Path the source was opened from.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The layer to load. Sources with several layers use the first and
    /// log a warning.
    #[must_use]
    pub fn primary_layer(&self) -> Option<&Layer> {
        if self.layers.len() > 1 {
            warn!(
                "{} has {} layers; only the first is loaded",
                self.path,
                self.layers.len()
            );
        }
        self.layers.first()
    }
}

fn malformed(path: &Utf8Path) -> impl FnOnce(FormatError) -> ShapefileError + use<> {
    let path = path.to_path_buf();
    move |source| ShapefileError::Format { path, source }
}

/// Find the companion of `shp_path` with `extension`, ignoring case.
fn companion(shp_path: &Utf8Path, extension: &str) -> Result<Option<Utf8PathBuf>, ShapefileError> {
    let parent = match shp_path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let stem = shp_path.file_stem().unwrap_or_default();
    let entries = boundaries_fs::list_dir_sorted(parent).map_err(|source| ShapefileError::Read {
        path: parent.to_path_buf(),
        source,
    })?;
    Ok(entries.into_iter().find(|entry| {
        entry.file_stem() == Some(stem)
            && entry
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
    }))
}
