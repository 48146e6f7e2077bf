//! Writers for small shapefiles and zip archives used in tests.
//!
//! [`ShapefileFixture`] produces byte-exact `.shp`, `.shx` and `.dbf` files
//! with character attribute fields, so tests exercise the real reader rather
//! than a stub.
//!
//! ```
//! use boundaries_data::test_support::{ShapefileFixture, square};
//!
//! let fixture = ShapefileFixture::new(["NAME"]).with_record(square(0.0, 0.0, 1.0), ["Ward 1"]);
//! assert_eq!(fixture.files("wards").len(), 3);
//! ```

use std::io::{self, Cursor, Write};

use camino::Utf8Path;
use geo::{BoundingRect, Coord, Geometry, LineString, Polygon, Rect, Winding, polygon};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// `.prj` text for WGS 84 longitude/latitude, as written by ESRI tools.
pub const WGS84_PRJ: &str = "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",\
    SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],PRIMEM[\"Greenwich\",0.0],\
    UNIT[\"Degree\",0.0174532925199433]]";

const FILE_CODE: i32 = 9994;
const VERSION: i32 = 1000;

#[derive(Debug, Clone)]
struct FixtureRecord {
    geometry: Option<Geometry<f64>>,
    values: Vec<Vec<u8>>,
    deleted: bool,
}

/// Builder for an in-memory shapefile.
#[derive(Debug, Clone, Default)]
pub struct ShapefileFixture {
    fields: Vec<String>,
    records: Vec<FixtureRecord>,
    projection: Option<String>,
}

/// Axis-aligned square polygon with its lower-left corner at `(x, y)`.
#[must_use]
pub fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
    Geometry::Polygon(polygon![
        (x: x, y: y),
        (x: x + size, y: y),
        (x: x + size, y: y + size),
        (x: x, y: y + size),
        (x: x, y: y),
    ])
}

impl ShapefileFixture {
    /// Start a fixture with character fields named `fields`.
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Add a `.prj` companion with `wkt`.
    #[must_use]
    pub fn with_projection(mut self, wkt: impl Into<String>) -> Self {
        self.projection = Some(wkt.into());
        self
    }

    /// Append a live record. Missing values are written blank.
    #[must_use]
    pub fn with_record<I, V>(mut self, geometry: impl Into<Option<Geometry<f64>>>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[u8]>,
    {
        self.push(geometry.into(), values, false);
        self
    }

    /// Append a record flagged as deleted in the attribute table.
    #[must_use]
    pub fn with_deleted_record<I, V>(
        mut self,
        geometry: impl Into<Option<Geometry<f64>>>,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[u8]>,
    {
        self.push(geometry.into(), values, true);
        self
    }

    fn push<I, V>(&mut self, geometry: Option<Geometry<f64>>, values: I, deleted: bool)
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[u8]>,
    {
        self.records.push(FixtureRecord {
            geometry,
            values: values
                .into_iter()
                .map(|value| value.as_ref().to_vec())
                .collect(),
            deleted,
        });
    }

    /// Every file of the shapefile, named after `stem`.
    #[must_use]
    pub fn files(&self, stem: &str) -> Vec<(String, Vec<u8>)> {
        let (shp, shx) = self.shp_and_shx();
        let mut files = vec![
            (format!("{stem}.shp"), shp),
            (format!("{stem}.shx"), shx),
            (format!("{stem}.dbf"), self.dbf_bytes()),
        ];
        if let Some(projection) = &self.projection {
            files.push((format!("{stem}.prj"), projection.as_bytes().to_vec()));
        }
        files
    }

    /// Write the shapefile into `dir` and return the `.shp` path.
    pub fn write_to(&self, dir: &Utf8Path, stem: &str) -> io::Result<camino::Utf8PathBuf> {
        for (name, bytes) in self.files(stem) {
            boundaries_fs::write_beneath(dir, Utf8Path::new(&name), &bytes)?;
        }
        Ok(dir.join(format!("{stem}.shp")))
    }

    /// Write the shapefile as a zip archive at `path`, with entries placed
    /// under `prefix` inside the archive.
    pub fn write_zip(&self, path: &Utf8Path, prefix: &str, stem: &str) -> io::Result<()> {
        let entries: Vec<_> = self
            .files(stem)
            .into_iter()
            .map(|(name, bytes)| (format!("{prefix}{name}"), bytes))
            .collect();
        write_zip(path, &entries)
    }

    /// The attribute table.
    #[must_use]
    pub fn dbf_bytes(&self) -> Vec<u8> {
        let widths: Vec<usize> = self
            .fields
            .iter()
            .enumerate()
            .map(|(column, _)| {
                self.records
                    .iter()
                    .filter_map(|record| record.values.get(column).map(Vec::len))
                    .max()
                    .unwrap_or(0)
                    .clamp(1, 254)
            })
            .collect();
        let header_len = 32 + 32 * self.fields.len() + 1;
        let record_len = 1 + widths.iter().sum::<usize>();

        let mut bytes = vec![0x03, 124, 1, 1];
        put_u32_le(&mut bytes, self.records.len());
        put_u16_le(&mut bytes, header_len);
        put_u16_le(&mut bytes, record_len);
        bytes.extend_from_slice(&[0; 20]);
        for (name, width) in self.fields.iter().zip(&widths) {
            let mut descriptor = [0_u8; 32];
            for (slot, byte) in descriptor.iter_mut().zip(name.bytes().take(10)) {
                *slot = byte;
            }
            if let Some(kind) = descriptor.get_mut(11) {
                *kind = b'C';
            }
            if let Some(length) = descriptor.get_mut(16) {
                *length = u8::try_from(*width).unwrap_or(u8::MAX);
            }
            bytes.extend_from_slice(&descriptor);
        }
        bytes.push(0x0D);
        for record in &self.records {
            bytes.push(if record.deleted { b'*' } else { b' ' });
            for (column, width) in widths.iter().enumerate() {
                let value = record.values.get(column).map_or(&[][..], Vec::as_slice);
                let mut cell = value.get(..*width).unwrap_or(value).to_vec();
                cell.resize(*width, b' ');
                bytes.extend_from_slice(&cell);
            }
        }
        bytes.push(0x1A);
        bytes
    }

    fn shp_and_shx(&self) -> (Vec<u8>, Vec<u8>) {
        let contents: Vec<Vec<u8>> = self
            .records
            .iter()
            .map(|record| shape_content(record.geometry.as_ref()))
            .collect();
        let shape_type = self
            .records
            .iter()
            .find_map(|record| record.geometry.as_ref())
            .map_or(5, shape_code);
        let bounds = self
            .records
            .iter()
            .filter_map(|record| record.geometry.as_ref()?.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            });

        let shp_len = 100 + contents.iter().map(|c| 8 + c.len()).sum::<usize>();
        let shx_len = 100 + 8 * contents.len();
        let mut shp = file_header(shp_len, shape_type, bounds);
        let mut shx = file_header(shx_len, shape_type, bounds);
        for (number, content) in contents.iter().enumerate() {
            put_i32_be(&mut shx, words(shp.len()));
            put_i32_be(&mut shx, words(content.len()));
            put_i32_be(&mut shp, i32::try_from(number + 1).unwrap_or(i32::MAX));
            put_i32_be(&mut shp, words(content.len()));
            shp.extend_from_slice(content);
        }
        (shp, shx)
    }
}

/// Write a zip archive at `path` holding `entries` in order.
pub fn write_zip(path: &Utf8Path, entries: &[(String, Vec<u8>)]) -> io::Result<()> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        if name.ends_with('/') {
            writer.add_directory(name.as_str(), options)?;
        } else {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(bytes)?;
        }
    }
    let archive = writer.finish()?.into_inner();
    boundaries_fs::write_file(path, &archive)
}

fn words(len: usize) -> i32 {
    i32::try_from(len / 2).unwrap_or(i32::MAX)
}

fn put_i32_be(bytes: &mut Vec<u8>, value: i32) {
    bytes.extend_from_slice(&value.to_be_bytes());
}

fn put_i32_le(bytes: &mut Vec<u8>, value: i32) {
    bytes.extend_from_slice(&value.to_le_bytes());
}

fn put_usize_le(bytes: &mut Vec<u8>, value: usize) {
    put_i32_le(bytes, i32::try_from(value).unwrap_or(i32::MAX));
}

fn put_u16_le(bytes: &mut Vec<u8>, value: usize) {
    bytes.extend_from_slice(&u16::try_from(value).unwrap_or(u16::MAX).to_le_bytes());
}

fn put_u32_le(bytes: &mut Vec<u8>, value: usize) {
    bytes.extend_from_slice(&u32::try_from(value).unwrap_or(u32::MAX).to_le_bytes());
}

fn put_f64_le(bytes: &mut Vec<u8>, value: f64) {
    bytes.extend_from_slice(&value.to_le_bytes());
}

fn put_box(bytes: &mut Vec<u8>, bounds: Option<Rect<f64>>) {
    let (min, max) = bounds.map_or((Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.0 }), |rect| {
        (rect.min(), rect.max())
    });
    for value in [min.x, min.y, max.x, max.y] {
        put_f64_le(bytes, value);
    }
}

fn file_header(len: usize, shape_type: i32, bounds: Option<Rect<f64>>) -> Vec<u8> {
    let mut header = Vec::with_capacity(100);
    put_i32_be(&mut header, FILE_CODE);
    header.extend_from_slice(&[0; 20]);
    put_i32_be(&mut header, words(len));
    put_i32_le(&mut header, VERSION);
    put_i32_le(&mut header, shape_type);
    put_box(&mut header, bounds);
    header.extend_from_slice(&[0; 32]);
    header
}

fn shape_code(geometry: &Geometry<f64>) -> i32 {
    match geometry {
        Geometry::Point(_) => 1,
        Geometry::LineString(_) | Geometry::MultiLineString(_) => 3,
        Geometry::MultiPoint(_) => 8,
        _ => 5,
    }
}

fn shape_content(geometry: Option<&Geometry<f64>>) -> Vec<u8> {
    let mut content = Vec::new();
    let Some(geometry) = geometry else {
        put_i32_le(&mut content, 0);
        return content;
    };
    put_i32_le(&mut content, shape_code(geometry));
    match geometry {
        Geometry::Point(point) => {
            put_f64_le(&mut content, point.x());
            put_f64_le(&mut content, point.y());
        }
        Geometry::MultiPoint(points) => {
            put_box(&mut content, geometry.bounding_rect());
            put_usize_le(&mut content, points.0.len());
            for point in points {
                put_f64_le(&mut content, point.x());
                put_f64_le(&mut content, point.y());
            }
        }
        Geometry::LineString(line) => put_parts(&mut content, geometry, vec![line.clone()]),
        Geometry::MultiLineString(lines) => put_parts(&mut content, geometry, lines.0.clone()),
        Geometry::Polygon(polygon) => put_parts(&mut content, geometry, rings(polygon)),
        Geometry::MultiPolygon(polygons) => {
            put_parts(&mut content, geometry, polygons.iter().flat_map(rings).collect());
        }
        _ => put_parts(&mut content, geometry, Vec::new()),
    }
    content
}

/// Rings in shapefile order: clockwise exterior, counter-clockwise holes.
fn rings(polygon: &Polygon<f64>) -> Vec<LineString<f64>> {
    let mut exterior = polygon.exterior().clone();
    exterior.make_cw_winding();
    let mut rings = vec![exterior];
    for interior in polygon.interiors() {
        let mut hole = interior.clone();
        hole.make_ccw_winding();
        rings.push(hole);
    }
    rings
}

fn put_parts(content: &mut Vec<u8>, geometry: &Geometry<f64>, parts: Vec<LineString<f64>>) {
    put_box(content, geometry.bounding_rect());
    put_usize_le(content, parts.len());
    put_usize_le(content, parts.iter().map(|part| part.0.len()).sum());
    let mut start = 0;
    for part in &parts {
        put_usize_le(content, start);
        start += part.0.len();
    }
    for part in &parts {
        for coord in &part.0 {
            put_f64_le(content, coord.x);
            put_f64_le(content, coord.y);
        }
    }
}
