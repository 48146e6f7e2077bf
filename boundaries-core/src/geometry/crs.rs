//! Coordinate reference systems and the transforms between them.

use std::fmt;
use std::str::FromStr;

use geo::{Coord, MapCoordsInPlace, MultiPolygon};
use proj4rs::Proj;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::GeometryError;

/// A coordinate reference system, named by EPSG code or PROJ string.
///
/// ```
/// use boundaries_core::Crs;
///
/// assert_eq!("EPSG:4269".parse::<Crs>().unwrap(), Crs::Epsg(4269));
/// assert_eq!(Crs::WGS84.to_string(), "EPSG:4326");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    /// A code from the built-in EPSG table.
    Epsg(u32),
    /// A raw PROJ definition such as `+proj=longlat +datum=WGS84`.
    Proj(String),
}

/// Errors raised while naming or inferring a coordinate reference system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrsError {
    /// The value is neither `EPSG:<code>` nor a PROJ string.
    #[error("{value:?} is not an EPSG code or PROJ string")]
    Invalid {
        /// The rejected value.
        value: String,
    },
    /// The EPSG code is missing from the built-in table.
    #[error("EPSG:{code} is not a supported coordinate system")]
    UnknownEpsgCode {
        /// The unsupported code.
        code: u32,
    },
    /// A `.prj` description did not match any known system.
    #[error("unrecognised projection {name:?}")]
    UnrecognizedPrj {
        /// Name of the outermost coordinate system in the description.
        name: String,
    },
}

impl Crs {
    /// WGS 84 longitude/latitude.
    pub const WGS84: Self = Self::Epsg(4326);

    /// Parse `EPSG:<code>`, a bare code, or a PROJ string.
    pub fn parse(value: &str) -> Result<Self, CrsError> {
        let trimmed = value.trim();
        if trimmed.starts_with('+') {
            return Ok(Self::Proj(trimmed.to_owned()));
        }
        let digits = trimmed
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("epsg:"))
            .and_then(|_| trimmed.get(5..))
            .unwrap_or(trimmed);
        digits
            .trim()
            .parse::<u32>()
            .map(Self::Epsg)
            .map_err(|_| CrsError::Invalid {
                value: value.to_owned(),
            })
    }

    /// PROJ definition for this system.
    pub fn proj_definition(&self) -> Result<String, CrsError> {
        match self {
            Self::Proj(definition) => Ok(definition.clone()),
            Self::Epsg(code) => {
                epsg_definition(*code).ok_or(CrsError::UnknownEpsgCode { code: *code })
            }
        }
    }

    /// Infer the system described by the WKT of a `.prj` companion file.
    ///
    /// An EPSG authority code wins when the table knows it. Otherwise the
    /// projected system's name (UTM zones, Web Mercator, Statistics Canada
    /// Lambert) or the geographic datum decides.
    pub fn from_prj(wkt: &str) -> Result<Self, CrsError> {
        if let Some(code) = last_epsg_authority(wkt).filter(|c| epsg_definition(*c).is_some()) {
            return Ok(Self::Epsg(code));
        }
        let upper = wkt.trim().to_ascii_uppercase();
        let name = first_quoted(&upper).unwrap_or_default();
        let unrecognized = || CrsError::UnrecognizedPrj {
            name: first_quoted(wkt.trim()).unwrap_or_default().to_owned(),
        };
        if upper.starts_with("PROJCS") {
            return projected_from_name(name).ok_or_else(unrecognized);
        }
        if upper.starts_with("GEOGCS") {
            let datum = upper
                .find("DATUM[")
                .and_then(|at| upper.get(at..))
                .and_then(first_quoted)
                .unwrap_or(name);
            return geographic_from_datum(datum).ok_or_else(unrecognized);
        }
        Err(unrecognized())
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epsg(code) => write!(f, "EPSG:{code}"),
            Self::Proj(definition) => f.write_str(definition),
        }
    }
}

impl FromStr for Crs {
    type Err = CrsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Crs {
    type Error = CrsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.to_string()
    }
}

fn epsg_definition(code: u32) -> Option<String> {
    let definition = match code {
        4326 => "+proj=longlat +datum=WGS84 +no_defs".to_owned(),
        4269 => "+proj=longlat +datum=NAD83 +no_defs".to_owned(),
        4267 => "+proj=longlat +ellps=clrk66 +towgs84=-8,160,176,0,0,0,0 +no_defs".to_owned(),
        4617 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs".to_owned(),
        3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 \
                 +units=m +no_defs"
            .to_owned(),
        3347 => "+proj=lcc +lat_0=63.390675 +lon_0=-91.8666666666667 +lat_1=49 +lat_2=77 \
                 +x_0=6200000 +y_0=3000000 +datum=NAD83 +units=m +no_defs"
            .to_owned(),
        32601..=32660 => utm(code - 32600, "WGS84", false),
        32701..=32760 => utm(code - 32700, "WGS84", true),
        26901..=26923 => utm(code - 26900, "NAD83", false),
        _ => return None,
    };
    Some(definition)
}

fn utm(zone: u32, datum: &str, south: bool) -> String {
    let hemisphere = if south { " +south" } else { "" };
    format!("+proj=utm +zone={zone}{hemisphere} +datum={datum} +units=m +no_defs")
}

fn last_epsg_authority(wkt: &str) -> Option<u32> {
    const MARKER: &str = "AUTHORITY[\"EPSG\",";
    let at = wkt.to_ascii_uppercase().rfind(MARKER)?;
    let rest = wkt.get(at + MARKER.len()..)?;
    let digits: String = rest
        .trim_start_matches([' ', '"'])
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

fn first_quoted(text: &str) -> Option<&str> {
    let start = text.find('"')? + 1;
    let rest = text.get(start..)?;
    let end = rest.find('"')?;
    rest.get(..end)
}

fn projected_from_name(name: &str) -> Option<Crs> {
    let normalized: String = name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();
    if normalized.contains("MERCATOR")
        && ["WEB", "PSEUDO", "AUXILIARY_SPHERE"]
            .iter()
            .any(|marker| normalized.contains(marker))
    {
        return Some(Crs::Epsg(3857));
    }
    if normalized.contains("STATISTICS_CANADA_LAMBERT") {
        return Some(Crs::Epsg(3347));
    }
    let zone_at = normalized.find("UTM_ZONE_")?;
    let zone_text = normalized.get(zone_at + "UTM_ZONE_".len()..)?;
    let digits: String = zone_text.chars().take_while(char::is_ascii_digit).collect();
    let zone: u32 = digits.parse().ok()?;
    let south = zone_text.get(digits.len()..)?.starts_with('S');
    let code = if is_nad83(&normalized) {
        (!south).then_some(26900 + zone)?
    } else if is_wgs84(&normalized) {
        if south { 32700 + zone } else { 32600 + zone }
    } else {
        return None;
    };
    epsg_definition(code).map(|_| Crs::Epsg(code))
}

fn geographic_from_datum(datum: &str) -> Option<Crs> {
    let normalized: String = datum
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();
    if is_nad83(&normalized) {
        Some(Crs::Epsg(4269))
    } else if is_wgs84(&normalized) {
        Some(Crs::Epsg(4326))
    } else if normalized.contains("NORTH_AMERICAN_1927") || normalized.contains("NAD27") {
        Some(Crs::Epsg(4267))
    } else {
        None
    }
}

fn is_nad83(normalized: &str) -> bool {
    ["NORTH_AMERICAN_1983", "NAD_1983", "NAD83"]
        .iter()
        .any(|marker| normalized.contains(marker))
}

fn is_wgs84(normalized: &str) -> bool {
    ["WGS_1984", "WGS84", "WGS_84"]
        .iter()
        .any(|marker| normalized.contains(marker))
}

/// Transformation between two coordinate systems, built once per load and
/// applied to every feature.
#[derive(Debug, Clone)]
pub struct CoordinateTransform {
    source: Crs,
    target: Crs,
    projections: Option<Projections>,
}

#[derive(Debug, Clone)]
struct Projections {
    source: Proj,
    target: Proj,
}

impl CoordinateTransform {
    /// Build a transform from `source` to `target`.
    ///
    /// Equal systems produce an identity transform that never touches
    /// coordinates.
    pub fn new(source: Crs, target: Crs) -> Result<Self, GeometryError> {
        if source == target {
            return Ok(Self::identity(target));
        }
        let projections = Projections {
            source: build_projection(&source)?,
            target: build_projection(&target)?,
        };
        Ok(Self {
            source,
            target,
            projections: Some(projections),
        })
    }

    /// A transform that leaves coordinates in `crs`.
    #[must_use]
    pub fn identity(crs: Crs) -> Self {
        Self {
            source: crs.clone(),
            target: crs,
            projections: None,
        }
    }

    /// Whether coordinates pass through unchanged.
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.projections.is_none()
    }

    /// System the input coordinates are in.
    #[must_use]
    pub const fn source(&self) -> &Crs {
        &self.source
    }

    /// System the output coordinates are in.
    #[must_use]
    pub const fn target(&self) -> &Crs {
        &self.target
    }

    /// Transform `geometry` in place. Geographic coordinates are in degrees
    /// on both sides.
    pub fn apply(&self, geometry: &mut MultiPolygon<f64>) -> Result<(), GeometryError> {
        let Some(projections) = &self.projections else {
            return Ok(());
        };
        if projections.source.is_latlong() {
            geometry.map_coords_in_place(|c| Coord {
                x: c.x.to_radians(),
                y: c.y.to_radians(),
            });
        }
        proj4rs::transform::transform(&projections.source, &projections.target, geometry)
            .map_err(|source| GeometryError::Reprojection {
                from: self.source.to_string(),
                to: self.target.to_string(),
                source,
            })?;
        if projections.target.is_latlong() {
            geometry.map_coords_in_place(|c| Coord {
                x: c.x.to_degrees(),
                y: c.y.to_degrees(),
            });
        }
        Ok(())
    }
}

fn build_projection(crs: &Crs) -> Result<Proj, GeometryError> {
    let definition = crs.proj_definition()?;
    Proj::from_proj_string(&definition).map_err(|source| GeometryError::Projection {
        crs: crs.to_string(),
        source,
    })
}
