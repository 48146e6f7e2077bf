//! Conversions between stored rows and domain values.

use boundaries_core::{Boundary, BoundarySet, Crs};
use chrono::NaiveDate;
use geo::{Point, Rect, coord};
use rusqlite::Row;
use rusqlite::types::Type;
use serde::de::DeserializeOwned;

/// Columns selected for a set, in `set_from_row` order.
pub(super) const SET_COLUMNS: &str = "s.slug, s.name, s.singular, s.authority, s.domain, \
    s.last_updated, s.source_url, s.licence_url, s.data_url, s.notes, s.extra, s.count, \
    s.metadata_fields";

/// Columns selected for a boundary, in `boundary_from_row` order.
pub(super) const BOUNDARY_COLUMNS: &str = "s.slug, b.set_name, b.slug, b.external_id, b.name, \
    b.metadata, b.shape, b.simple_shape, b.centroid_x, b.centroid_y, b.min_x, b.min_y, \
    b.max_x, b.max_y, b.crs";

fn conversion<E>(index: usize) -> impl FnOnce(E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, index: usize) -> rusqlite::Result<T> {
    let text: String = row.get(index)?;
    serde_json::from_str(&text).map_err(conversion(index))
}

pub(super) fn set_from_row(row: &Row<'_>) -> rusqlite::Result<BoundarySet> {
    let last_updated = row
        .get::<_, Option<String>>(5)?
        .map(|value| value.parse::<NaiveDate>())
        .transpose()
        .map_err(conversion(5))?;
    let count: i64 = row.get(11)?;
    Ok(BoundarySet {
        slug: row.get(0)?,
        name: row.get(1)?,
        singular: row.get(2)?,
        authority: row.get(3)?,
        domain: row.get(4)?,
        last_updated,
        source_url: row.get(6)?,
        licence_url: row.get(7)?,
        data_url: row.get(8)?,
        notes: row.get(9)?,
        extra: json_column(row, 10)?,
        count: u64::try_from(count)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(11, count))?,
        metadata_fields: json_column(row, 12)?,
    })
}

pub(super) fn boundary_from_row(row: &Row<'_>) -> rusqlite::Result<Boundary> {
    let bounds: [Option<f64>; 4] = [row.get(10)?, row.get(11)?, row.get(12)?, row.get(13)?];
    let extent = match bounds {
        [Some(min_x), Some(min_y), Some(max_x), Some(max_y)] => Some(Rect::new(
            coord! { x: min_x, y: min_y },
            coord! { x: max_x, y: max_y },
        )),
        _ => None,
    };
    let crs: String = row.get(14)?;
    Ok(Boundary {
        set_slug: row.get(0)?,
        set_name: row.get(1)?,
        slug: row.get(2)?,
        external_id: row.get(3)?,
        name: row.get(4)?,
        metadata: json_column(row, 5)?,
        shape: json_column(row, 6)?,
        simple_shape: json_column(row, 7)?,
        centroid: Point::new(row.get(8)?, row.get(9)?),
        extent,
        crs: Crs::try_from(crs).map_err(conversion(14))?,
    })
}

/// Bounding box columns, all `None` for an empty shape.
pub(super) fn extent_columns(extent: Option<Rect<f64>>) -> [Option<f64>; 4] {
    extent.map_or([None; 4], |rect| {
        [
            Some(rect.min().x),
            Some(rect.min().y),
            Some(rect.max().x),
            Some(rect.max().y),
        ]
    })
}
