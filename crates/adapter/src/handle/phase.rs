use std::fmt;

/// Where an [`IntegratorHandle`](crate::IntegratorHandle) is in its lifecycle.
///
/// ```text
/// Unconfigured → Initialized → Stepping → (Initialized → Stepping)* → Destroyed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Engine memory exists but no state is bound.
    Unconfigured,

    /// State and right-hand side are bound; no step taken since the last
    /// `init` or `reinit`.
    Initialized,

    /// At least one step taken.
    Stepping,

    /// Engine memory released.
    Destroyed,
}

impl Phase {
    /// Whether the handle has bound state it can step.
    #[must_use]
    pub fn is_bound(self) -> bool {
        matches!(self, Self::Initialized | Self::Stepping)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfigured => "unconfigured",
            Self::Initialized => "initialized",
            Self::Stepping => "stepping",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}
