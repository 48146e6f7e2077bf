//! Geometry records of the `.shp` main file.

use geo::{
    Area, Coord, Geometry, Intersects, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon, Winding,
};

use super::FormatError;
use super::bytes::ByteReader;

const FILE_CODE: i32 = 9994;
const HEADER_LEN: usize = 100;
const RECORD_HEADER_LEN: usize = 8;

/// Shape types defined by the ESRI shapefile format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
}

impl ShapeType {
    /// Map a type code onto its two-dimensional family. Z and M variants
    /// lay out their X/Y data exactly like the plain types.
    const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Null),
            1 | 11 | 21 => Some(Self::Point),
            3 | 13 | 23 => Some(Self::PolyLine),
            5 | 15 | 25 => Some(Self::Polygon),
            8 | 18 | 28 => Some(Self::MultiPoint),
            _ => None,
        }
    }
}

/// Validate the main file header and return the byte offset of every
/// record's content, in file order.
pub(super) fn record_offsets(bytes: &[u8]) -> Result<Vec<(usize, usize)>, FormatError> {
    let mut header = ByteReader::new(bytes);
    let file_code = header.i32_be()?;
    if file_code != FILE_CODE {
        return Err(FormatError::FileCode { found: file_code });
    }
    header.skip(20)?;
    let declared_words = header.i32_be()?;
    header.skip(HEADER_LEN - 28)?;

    let declared_len = usize::try_from(declared_words)
        .ok()
        .and_then(|words| words.checked_mul(2))
        .map_or(bytes.len(), |len| len.min(bytes.len()));

    let mut offsets = Vec::new();
    let mut reader = ByteReader::at(bytes, HEADER_LEN);
    while reader.offset() + RECORD_HEADER_LEN <= declared_len {
        let record_start = reader.offset();
        let _record_number = reader.i32_be()?;
        let words = reader.i32_be()?;
        let content_len = usize::try_from(words)
            .ok()
            .and_then(|w| w.checked_mul(2))
            .ok_or(FormatError::NegativeCount {
                offset: record_start + 4,
                value: words,
            })?;
        let content_start = reader.offset();
        reader.skip(content_len)?;
        offsets.push((content_start, content_len));
    }
    Ok(offsets)
}

/// Decode one record's content into a geometry. Null shapes yield `None`.
pub(super) fn read_shape(
    bytes: &[u8],
    offset: usize,
    len: usize,
) -> Result<Option<Geometry<f64>>, FormatError> {
    let content = bytes
        .get(offset..offset.saturating_add(len))
        .ok_or(FormatError::Truncated { offset })?;
    let mut reader = ByteReader::new(content);
    let code = reader.i32_le()?;
    let shape_type = ShapeType::from_code(code).ok_or(FormatError::ShapeType { shape_type: code })?;
    let geometry = match shape_type {
        ShapeType::Null => return Ok(None),
        ShapeType::Point => Geometry::Point(Point::from(read_coord(&mut reader)?)),
        ShapeType::MultiPoint => {
            reader.skip(32)?;
            let count = reader.count_le()?;
            let points = read_coords(&mut reader, count)?
                .into_iter()
                .map(Point::from)
                .collect();
            Geometry::MultiPoint(MultiPoint::new(points))
        }
        ShapeType::PolyLine => {
            let mut lines = read_parts(&mut reader, offset)?;
            if lines.len() == 1 {
                Geometry::LineString(lines.remove(0))
            } else {
                Geometry::MultiLineString(MultiLineString::new(lines))
            }
        }
        ShapeType::Polygon => {
            let rings = read_parts(&mut reader, offset)?;
            let mut polygons = assemble_polygons(rings);
            if polygons.len() == 1 {
                Geometry::Polygon(polygons.remove(0))
            } else {
                Geometry::MultiPolygon(MultiPolygon::new(polygons))
            }
        }
    };
    Ok(Some(geometry))
}

fn read_coord(reader: &mut ByteReader<'_>) -> Result<Coord<f64>, FormatError> {
    Ok(Coord {
        x: reader.f64_le()?,
        y: reader.f64_le()?,
    })
}

fn read_coords(reader: &mut ByteReader<'_>, count: usize) -> Result<Vec<Coord<f64>>, FormatError> {
    if count.saturating_mul(16) > reader.remaining() {
        return Err(FormatError::Truncated {
            offset: reader.offset(),
        });
    }
    (0..count).map(|_| read_coord(reader)).collect()
}

/// Read the box, part table and points shared by polylines and polygons.
fn read_parts(
    reader: &mut ByteReader<'_>,
    record_offset: usize,
) -> Result<Vec<LineString<f64>>, FormatError> {
    reader.skip(32)?;
    let part_count = reader.count_le()?;
    let point_count = reader.count_le()?;
    if part_count.saturating_mul(4) > reader.remaining() {
        return Err(FormatError::Truncated {
            offset: reader.offset(),
        });
    }
    let starts = (0..part_count)
        .map(|_| reader.count_le())
        .collect::<Result<Vec<_>, _>>()?;
    let coords = read_coords(reader, point_count)?;

    let mut parts = Vec::with_capacity(part_count);
    for (position, start) in starts.iter().enumerate() {
        let end = starts.get(position + 1).copied().unwrap_or(point_count);
        let slice = coords
            .get(*start..end)
            .ok_or(FormatError::Parts {
                offset: record_offset,
            })?;
        parts.push(LineString::from(slice.to_vec()));
    }
    Ok(parts)
}

/// Group rings into polygons. Clockwise rings are exteriors; each
/// counter-clockwise ring becomes a hole of the smallest exterior that
/// contains it, or an exterior of its own when none does.
fn assemble_polygons(rings: Vec<LineString<f64>>) -> Vec<Polygon<f64>> {
    let (mut exteriors, holes): (Vec<_>, Vec<_>) = rings
        .into_iter()
        .filter(|ring| ring.0.len() >= 3)
        .map(|mut ring| {
            ring.close();
            ring
        })
        .partition(|ring| ring.is_cw());

    if exteriors.is_empty() {
        return holes
            .into_iter()
            .map(|ring| Polygon::new(ring, Vec::new()))
            .collect();
    }

    let outlines: Vec<Polygon<f64>> = exteriors
        .iter()
        .map(|ring| Polygon::new(ring.clone(), Vec::new()))
        .collect();
    let mut interiors: Vec<Vec<LineString<f64>>> = vec![Vec::new(); exteriors.len()];
    let mut orphans = Vec::new();
    for hole in holes {
        let owner = hole.0.first().and_then(|first| {
            let probe = Point::from(*first);
            outlines
                .iter()
                .enumerate()
                .filter(|(_, outline)| outline.intersects(&probe))
                .min_by(|(_, a), (_, b)| a.unsigned_area().total_cmp(&b.unsigned_area()))
                .map(|(index, _)| index)
        });
        match owner.and_then(|index| interiors.get_mut(index)) {
            Some(slot) => slot.push(hole),
            None => orphans.push(hole),
        }
    }

    exteriors.extend(orphans);
    interiors.resize(exteriors.len(), Vec::new());
    exteriors
        .into_iter()
        .zip(interiors)
        .map(|(exterior, holes)| Polygon::new(exterior, holes))
        .collect()
}
