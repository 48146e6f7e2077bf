use std::fmt;

use log::debug;

/// Progress of one boundary set load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Not started.
    Pending,
    /// Turning the configured path into data sources.
    ResolvingSources,
    /// Normalizing geometry and extracting values for each feature.
    ProcessingFeatures,
    /// Replacing the stored set inside one transaction.
    Finalizing,
    /// The transaction committed.
    Committed,
    /// The load stopped with an error; nothing was committed.
    Failed,
}

impl LoadState {
    /// Whether moving from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::ResolvingSources)
                | (Self::ResolvingSources, Self::ProcessingFeatures)
                | (Self::ProcessingFeatures, Self::Finalizing)
                | (Self::Finalizing, Self::Committed)
                | (
                    Self::Pending
                        | Self::ResolvingSources
                        | Self::ProcessingFeatures
                        | Self::Finalizing,
                    Self::Failed
                )
        )
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::ResolvingSources => "resolving sources",
            Self::ProcessingFeatures => "processing features",
            Self::Finalizing => "finalizing",
            Self::Committed => "committed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks and logs the state of one set's load.
#[derive(Debug)]
pub(super) struct Progress<'a> {
    set: &'a str,
    state: LoadState,
}

impl<'a> Progress<'a> {
    pub(super) const fn new(set: &'a str) -> Self {
        Self {
            set,
            state: LoadState::Pending,
        }
    }

    pub(super) fn advance(&mut self, next: LoadState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid load transition {} -> {next}",
            self.state
        );
        debug!("boundary set {:?}: {} -> {next}", self.set, self.state);
        self.state = next;
    }

    pub(super) fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.advance(LoadState::Failed);
        }
    }
}
