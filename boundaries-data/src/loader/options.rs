use super::LoadError;

/// Selection and reload behaviour for a batch load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Replace sets that are already stored.
    pub reload: bool,
    /// Load only these sets; every set when empty.
    pub only: Vec<String>,
    /// Never load these sets.
    pub except: Vec<String>,
}

/// Compare names with whitespace removed, ignoring case.
fn comparable(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl LoadOptions {
    /// Split a comma-separated list of set names, dropping blank entries.
    ///
    /// ```
    /// use boundaries_data::loader::LoadOptions;
    ///
    /// assert_eq!(
    ///     LoadOptions::parse_list("Wards, Federal districts,,"),
    ///     ["Wards", "Federal districts"]
    /// );
    /// ```
    #[must_use]
    pub fn parse_list(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Whether the set named `name` passes the `only` and `except` filters.
    #[must_use]
    pub fn selects(&self, name: &str) -> bool {
        let name = comparable(name);
        let listed = |names: &[String]| names.iter().any(|n| comparable(n) == name);
        (self.only.is_empty() || listed(&self.only)) && !listed(&self.except)
    }

    /// Entries of `only` matching none of `names`.
    pub(super) fn unmatched_only<'a, I>(&self, names: I) -> Vec<&String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let known: Vec<String> = names.into_iter().map(comparable).collect();
        self.only
            .iter()
            .filter(|requested| !known.contains(&comparable(requested)))
            .collect()
    }
}

/// Result of a successful [`load_set`](super::BoundarySetLoader::load_set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The set was written with `count` boundaries.
    Loaded {
        /// Stored boundary count.
        count: u64,
    },
    /// The set was already stored and reload was off.
    Skipped,
}

/// Per-set outcome recorded in a [`LoadReport`].
#[derive(Debug)]
pub enum LoadOutcome {
    /// The set was written with `count` boundaries.
    Loaded {
        /// Stored boundary count.
        count: u64,
    },
    /// The set was already stored and reload was off.
    Skipped,
    /// The set failed; nothing was written for it.
    Failed(LoadError),
}

impl From<LoadStatus> for LoadOutcome {
    fn from(status: LoadStatus) -> Self {
        match status {
            LoadStatus::Loaded { count } => Self::Loaded { count },
            LoadStatus::Skipped => Self::Skipped,
        }
    }
}

impl LoadOutcome {
    /// Whether the set failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Outcomes of a batch load in processing order.
#[derive(Debug, Default)]
pub struct LoadReport {
    outcomes: Vec<(String, LoadOutcome)>,
}

impl LoadReport {
    pub(super) fn push(&mut self, name: String, outcome: LoadOutcome) {
        self.outcomes.push((name, outcome));
    }

    /// Every `(set name, outcome)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LoadOutcome)> {
        self.outcomes
            .iter()
            .map(|(name, outcome)| (name.as_str(), outcome))
    }

    /// Outcome recorded for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LoadOutcome> {
        self.iter()
            .find_map(|(set, outcome)| (set == name).then_some(outcome))
    }

    /// Failed sets and their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &LoadError)> {
        self.iter().filter_map(|(name, outcome)| match outcome {
            LoadOutcome::Failed(err) => Some((name, err)),
            _ => None,
        })
    }

    /// Whether any set failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|(_, outcome)| outcome.is_failure())
    }

    /// Total boundaries written across loaded sets.
    #[must_use]
    pub fn loaded_boundaries(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                LoadOutcome::Loaded { count } => *count,
                _ => 0,
            })
            .sum()
    }

    /// Number of recorded outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
