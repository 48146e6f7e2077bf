//! Loading configured boundary sets into a [`BoundaryStore`].
//!
//! A load walks one set through [`LoadState`]: resolve its data sources,
//! normalize and extract every feature, then replace the stored set inside
//! a single transaction. Any feature failure fails the whole set and
//! nothing is written. Scratch directories created for archives are removed
//! on every path.
//!
//! ```no_run
//! use boundaries_core::{Registry, test_support::MemoryStore};
//! use boundaries_data::loader::{BoundarySetLoader, LoadOptions};
//!
//! let registry = Registry::new();
//! let mut store = MemoryStore::default();
//! let report = BoundarySetLoader::new(&registry).load_all(&mut store, &LoadOptions::default());
//! assert!(!report.has_failures());
//! ```

mod options;
mod state;

use std::collections::{HashMap, HashSet, hash_map::Entry};

use boundaries_core::{
    Boundary, BoundarySet, BoundarySetConfig, BoundaryStore, BoundaryStoreTransaction,
    CoordinateTransform, Crs, CrsError, DecodeError, ExtractError, Feature, FeatureExtractor,
    GeoEngine, GeometryEngine, GeometryError, Registry,
};
use camino::Utf8PathBuf;
use log::{error, info, warn};
use thiserror::Error;

use crate::archive::{ArchiveError, ArchiveResolver};
use crate::shapefile::{DataSource, Layer, RawFeature, ShapefileError};

pub use options::{LoadOptions, LoadOutcome, LoadReport, LoadStatus};
pub use state::LoadState;

use state::Progress;

/// Errors that fail the load of one boundary set.
#[derive(Debug, Error)]
pub enum LoadError {
    /// No definition is registered under the name.
    #[error("unknown boundary set {name:?}")]
    UnknownBoundarySet {
        /// Requested name.
        name: String,
    },
    /// The configured path could not be resolved.
    #[error("failed to resolve data for boundary set {set:?}")]
    Archive {
        /// Boundary set name.
        set: String,
        /// Source error from the resolver.
        #[source]
        source: ArchiveError,
    },
    /// The configured path held nothing to load.
    #[error("no data sources found for boundary set {set:?} at {path}")]
    NoDataSources {
        /// Boundary set name.
        set: String,
        /// Configured path.
        path: Utf8PathBuf,
    },
    /// A shapefile could not be read.
    #[error("failed to read shapefile for boundary set {set:?}")]
    Shapefile {
        /// Boundary set name.
        set: String,
        /// Source error from the reader.
        #[source]
        source: ShapefileError,
    },
    /// A layer has no `.prj` and the set gives no coordinate system.
    #[error("layer {layer} of boundary set {set:?} has no projection and the set sets no crs")]
    UnknownProjection {
        /// Boundary set name.
        set: String,
        /// Path of the layer's `.shp` file.
        layer: Utf8PathBuf,
    },
    /// A layer's `.prj` did not name a supported system.
    #[error("layer {layer} of boundary set {set:?} has an unsupported projection")]
    UnrecognizedProjection {
        /// Boundary set name.
        set: String,
        /// Path of the layer's `.shp` file.
        layer: Utf8PathBuf,
        /// Source error from projection inference.
        #[source]
        source: CrsError,
    },
    /// No transform to the store's coordinate system could be built.
    #[error("failed to build a transform for boundary set {set:?}")]
    Transform {
        /// Boundary set name.
        set: String,
        /// Source error from the geometry engine.
        #[source]
        source: GeometryError,
    },
    /// A feature's geometry could not be normalized.
    #[error("feature {index} of {layer} in boundary set {set:?} has unusable geometry")]
    Geometry {
        /// Boundary set name.
        set: String,
        /// Path of the layer's `.shp` file.
        layer: Utf8PathBuf,
        /// Zero-based feature index within the layer.
        index: usize,
        /// Source error from the geometry engine.
        #[source]
        source: GeometryError,
    },
    /// A feature's text attributes are not valid in the set's encoding.
    #[error("feature {index} of {layer} in boundary set {set:?} failed to decode")]
    DecodeFailure {
        /// Boundary set name.
        set: String,
        /// Path of the layer's `.shp` file.
        layer: Utf8PathBuf,
        /// Zero-based feature index within the layer.
        index: usize,
        /// Source error from attribute decoding.
        #[source]
        source: DecodeError,
    },
    /// An id, name or slug normalized to nothing.
    #[error("feature {index} of {layer} in boundary set {set:?} failed normalization")]
    NormalizationFailure {
        /// Boundary set name.
        set: String,
        /// Path of the layer's `.shp` file.
        layer: Utf8PathBuf,
        /// Zero-based feature index within the layer.
        index: usize,
        /// Source error from extraction.
        #[source]
        source: ExtractError,
    },
    /// Two features of the set produced the same slug.
    #[error("feature {index} of {layer} in boundary set {set:?} repeats slug {slug:?}")]
    DuplicateSlug {
        /// Boundary set name.
        set: String,
        /// Path of the layer's `.shp` file.
        layer: Utf8PathBuf,
        /// Zero-based feature index within the layer.
        index: usize,
        /// The repeated slug.
        slug: String,
    },
    /// The store rejected a read or the replacing transaction.
    #[error("store operation failed for boundary set {set:?}")]
    Store {
        /// Boundary set name.
        set: String,
        /// Source error from the store.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl LoadError {
    fn store<E>(set: &str) -> impl FnOnce(E) -> Self + use<'_, E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        move |source| Self::Store {
            set: set.to_owned(),
            source: Box::new(source),
        }
    }
}

/// A set ready to be written: descriptive fields plus every boundary.
#[derive(Debug)]
struct StagedSet {
    set: BoundarySet,
    boundaries: Vec<Boundary>,
}

/// Per-set feature processing state.
struct Staging<'c> {
    config: &'c BoundarySetConfig,
    target: Crs,
    extractor: FeatureExtractor<'c>,
    transforms: HashMap<Crs, CoordinateTransform>,
    slugs: HashSet<String>,
    staged: StagedSet,
}

impl<'c> Staging<'c> {
    fn new(config: &'c BoundarySetConfig, target: Crs) -> Self {
        Self {
            config,
            target,
            extractor: FeatureExtractor::new(
                &config.id_func,
                &config.name_func,
                config.slug_func.as_ref(),
            ),
            transforms: HashMap::new(),
            slugs: HashSet::new(),
            staged: StagedSet {
                set: BoundarySet::from_config(config),
                boundaries: Vec::new(),
            },
        }
    }
}

/// Loads boundary sets from a [`Registry`] into a store.
#[derive(Debug)]
pub struct BoundarySetLoader<'r, E = GeoEngine> {
    registry: &'r Registry,
    engine: E,
    resolver: ArchiveResolver,
}

impl<'r> BoundarySetLoader<'r> {
    /// Loader using the default geometry engine and resolver.
    #[must_use]
    pub const fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            engine: GeoEngine,
            resolver: ArchiveResolver::new(),
        }
    }
}

impl<'r, E: GeometryEngine> BoundarySetLoader<'r, E> {
    /// Replace the geometry engine.
    #[must_use]
    pub fn with_engine<F: GeometryEngine>(self, engine: F) -> BoundarySetLoader<'r, F> {
        BoundarySetLoader {
            registry: self.registry,
            engine,
            resolver: self.resolver,
        }
    }

    /// Replace the archive resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: ArchiveResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Load every selected set in registry order.
    ///
    /// Set failures are logged and recorded in the report; the batch
    /// continues. Names in `only` that match no registered set are
    /// reported as [`LoadError::UnknownBoundarySet`].
    pub fn load_all<S: BoundaryStore>(&self, store: &mut S, options: &LoadOptions) -> LoadReport {
        let mut report = LoadReport::default();
        for name in options.unmatched_only(self.registry.names()) {
            warn!("no boundary set matches {name:?}");
            report.push(
                name.clone(),
                LoadOutcome::Failed(LoadError::UnknownBoundarySet { name: name.clone() }),
            );
        }
        for config in self.registry {
            if !options.selects(&config.name) {
                info!("skipping boundary set {:?}: not selected", config.name);
                continue;
            }
            let outcome = match self.load_set(store, &config.name, options) {
                Ok(status) => LoadOutcome::from(status),
                Err(err) => {
                    error!("failed to load boundary set {:?}: {err}", config.name);
                    LoadOutcome::Failed(err)
                }
            };
            report.push(config.name.clone(), outcome);
        }
        report
    }

    /// Load the set registered as `name`.
    ///
    /// A set already in the store is skipped unless `options.reload` is
    /// set; reloading replaces it atomically.
    pub fn load_set<S: BoundaryStore>(
        &self,
        store: &mut S,
        name: &str,
        options: &LoadOptions,
    ) -> Result<LoadStatus, LoadError> {
        let mut progress = Progress::new(name);
        let result = self.run(store, name, options, &mut progress);
        if result.is_err() {
            progress.fail();
        }
        result
    }

    fn run<S: BoundaryStore>(
        &self,
        store: &mut S,
        name: &str,
        options: &LoadOptions,
        progress: &mut Progress<'_>,
    ) -> Result<LoadStatus, LoadError> {
        let config = self
            .registry
            .get(name)
            .ok_or_else(|| LoadError::UnknownBoundarySet {
                name: name.to_owned(),
            })?;
        let exists = store
            .set_exists(&config.name)
            .map_err(LoadError::store(name))?;
        if exists && !options.reload {
            info!("boundary set {name:?} is already loaded; skipping");
            return Ok(LoadStatus::Skipped);
        }

        progress.advance(LoadState::ResolvingSources);
        let resolution = self
            .resolver
            .resolve(&config.file)
            .map_err(|source| LoadError::Archive {
                set: name.to_owned(),
                source,
            })?;
        let staged = if resolution.is_empty() {
            Err(LoadError::NoDataSources {
                set: name.to_owned(),
                path: config.file.clone(),
            })
        } else {
            progress.advance(LoadState::ProcessingFeatures);
            self.stage(config, store.target_crs(), resolution.sources())
        };
        resolution.cleanup();
        let staged = staged?;

        progress.advance(LoadState::Finalizing);
        let count = replace_set(store, &staged).map_err(LoadError::store(name))?;
        progress.advance(LoadState::Committed);
        info!("loaded {count} boundaries into {name:?}");
        Ok(LoadStatus::Loaded { count })
    }

    fn stage(
        &self,
        config: &BoundarySetConfig,
        target: Crs,
        sources: &[Utf8PathBuf],
    ) -> Result<StagedSet, LoadError> {
        let mut staging = Staging::new(config, target);
        for path in sources {
            let source = DataSource::open(path).map_err(|source| LoadError::Shapefile {
                set: config.name.clone(),
                source,
            })?;
            self.stage_source(&mut staging, &source)?;
        }
        Ok(staging.staged)
    }

    /// Stage the primary layer of `source`; further layers are ignored.
    fn stage_source(&self, staging: &mut Staging<'_>, source: &DataSource) -> Result<(), LoadError> {
        match source.primary_layer() {
            Some(layer) => self.stage_layer(staging, layer),
            None => {
                warn!("{} has no layers; skipping", source.path());
                Ok(())
            }
        }
    }

    fn stage_layer(&self, staging: &mut Staging<'_>, layer: &Layer) -> Result<(), LoadError> {
        let config = staging.config;
        let crs = source_crs(config, layer)?;
        let transform = match staging.transforms.entry(crs) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let transform = CoordinateTransform::new(entry.key().clone(), staging.target.clone())
                    .map_err(|source| LoadError::Transform {
                        set: config.name.clone(),
                        source,
                    })?;
                entry.insert(transform)
            }
        };
        let fields = &mut staging.staged.set.metadata_fields;
        for field in layer.field_names() {
            if !fields.iter().any(|known| known == field) {
                fields.push(field.to_owned());
            }
        }
        info!(
            "loading {} feature(s) from {} into {:?}",
            layer.len(),
            layer.path(),
            config.name
        );
        for raw in layer.features() {
            let raw = raw.map_err(|source| LoadError::Shapefile {
                set: config.name.clone(),
                source,
            })?;
            let index = raw.index;
            let boundary = self.build_boundary(
                config,
                &staging.staged.set,
                layer,
                raw,
                transform,
                &mut staging.extractor,
            )?;
            if !staging.slugs.insert(boundary.slug.clone()) {
                return Err(LoadError::DuplicateSlug {
                    set: config.name.clone(),
                    layer: layer.path().to_path_buf(),
                    index,
                    slug: boundary.slug,
                });
            }
            staging.staged.boundaries.push(boundary);
        }
        Ok(())
    }

    fn build_boundary(
        &self,
        config: &BoundarySetConfig,
        set: &BoundarySet,
        layer: &Layer,
        raw: RawFeature,
        transform: &CoordinateTransform,
        extractor: &mut FeatureExtractor<'_>,
    ) -> Result<Boundary, LoadError> {
        let RawFeature {
            index,
            geometry,
            attributes,
        } = raw;
        let geometry_error = |source| LoadError::Geometry {
            set: config.name.clone(),
            layer: layer.path().to_path_buf(),
            index,
            source,
        };
        let geometry = geometry.ok_or_else(|| geometry_error(GeometryError::EmptyGeometry))?;
        let shape = self
            .engine
            .to_multipolygon(geometry)
            .and_then(|shape| self.engine.reproject(shape, transform))
            .map_err(geometry_error)?;
        let simple_shape = self
            .engine
            .simplify(&shape, config.simplification_tolerance);
        let centroid = self.engine.centroid(&shape).map_err(geometry_error)?;
        let extent = self.engine.extent(&shape);

        let feature = Feature::decode(index, attributes, config.encoding).map_err(|source| {
            LoadError::DecodeFailure {
                set: config.name.clone(),
                layer: layer.path().to_path_buf(),
                index,
                source,
            }
        })?;
        let extracted =
            extractor
                .extract(&feature)
                .map_err(|source| LoadError::NormalizationFailure {
                    set: config.name.clone(),
                    layer: layer.path().to_path_buf(),
                    index,
                    source,
                })?;

        Ok(Boundary {
            set_slug: set.slug.clone(),
            set_name: set.singular.clone(),
            slug: extracted.slug,
            external_id: extracted.external_id,
            name: extracted.name,
            metadata: feature.metadata(),
            shape,
            simple_shape,
            centroid,
            extent,
            crs: transform.target().clone(),
        })
    }
}

fn source_crs(config: &BoundarySetConfig, layer: &Layer) -> Result<Crs, LoadError> {
    if let Some(crs) = &config.crs {
        return Ok(crs.clone());
    }
    let wkt = layer
        .projection()
        .ok_or_else(|| LoadError::UnknownProjection {
            set: config.name.clone(),
            layer: layer.path().to_path_buf(),
        })?;
    Crs::from_prj(wkt).map_err(|source| LoadError::UnrecognizedProjection {
        set: config.name.clone(),
        layer: layer.path().to_path_buf(),
        source,
    })
}

/// Delete, recreate and fill the set in one transaction. Returns the
/// stored boundary count.
fn replace_set<S: BoundaryStore>(store: &mut S, staged: &StagedSet) -> Result<u64, S::Error> {
    let mut tx = store.begin()?;
    if tx.delete_set_by_name(&staged.set.name)? {
        info!("replacing boundary set {:?}", staged.set.name);
    }
    let handle = tx.create_set(&staged.set)?;
    tx.bulk_create_boundaries(handle, &staged.boundaries)?;
    let count = tx.count_boundaries(handle)?;
    tx.finalize_count(handle, count)?;
    tx.commit()?;
    Ok(count)
}
