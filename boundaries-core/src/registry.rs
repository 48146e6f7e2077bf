//! In-memory registry of boundary set definitions.

use log::debug;

use crate::{BoundarySetConfig, ConfigError};

/// Named boundary set configurations, iterated in first-registration order.
///
/// The registry is built explicitly and handed to the loader; nothing is
/// shared globally.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<BoundarySetConfig>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Validate and insert `config`, replacing any entry with the same name.
    ///
    /// A replaced entry keeps its position and is returned.
    pub fn register(
        &mut self,
        config: BoundarySetConfig,
    ) -> Result<Option<BoundarySetConfig>, ConfigError> {
        config.validate()?;
        if let Some(existing) = self.entries.iter_mut().find(|c| c.name == config.name) {
            debug!("replacing definition of boundary set {:?}", config.name);
            return Ok(Some(std::mem::replace(existing, config)));
        }
        self.entries.push(config);
        Ok(None)
    }

    /// Configuration registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoundarySetConfig> {
        self.entries.iter().find(|c| c.name == name)
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|c| c.name.as_str())
    }

    /// Registered configurations in order.
    pub fn iter(&self) -> std::slice::Iter<'_, BoundarySetConfig> {
        self.entries.iter()
    }

    /// Number of registered sets.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a BoundarySetConfig;
    type IntoIter = std::slice::Iter<'a, BoundarySetConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
