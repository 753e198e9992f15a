//! Stage errors.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use verdure_mask::MaskError;

/// The steps of a pipeline run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    /// Upstream style/species text generation.
    Analyze,
    /// Stage 1: layout and style application with canopy freedom.
    Layout,
    /// Stage 2: species-accurate refinement inside the hard mask.
    Refine,
    /// Stage 3: light global harmonization.
    Harmonize,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analyze => f.write_str("analyze"),
            Self::Layout => f.write_str("layout"),
            Self::Refine => f.write_str("refine"),
            Self::Harmonize => f.write_str("harmonize"),
        }
    }
}

/// Failure reported by an external collaborator.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// The service refused the request (bad input, policy, quota).
    #[error("edit service rejected the request: {0}")]
    Rejected(String),

    /// The request did not complete (network, protocol, server error).
    #[error("edit service transport failure: {0}")]
    Transport(String),

    /// The service answered with something that is not an image.
    #[error("edit service returned an unreadable image: {0}")]
    InvalidResponse(#[source] MaskError),
}

/// A failed stage, always tagged with the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Decoding an input or deriving a mask failed.
    #[error("{stage}: {source}")]
    Mask {
        /// The failing stage.
        stage: StageName,
        /// What went wrong.
        #[source]
        source: MaskError,
    },

    /// The edit service reported a failure.
    #[error("{stage}: {source}")]
    Edit {
        /// The failing stage.
        stage: StageName,
        /// What went wrong.
        #[source]
        source: EditError,
    },

    /// A collaborator call (edit or summarizer) did not return in time.
    #[error("{stage}: collaborator call timed out after {}s", timeout.as_secs())]
    Timeout {
        /// The failing stage.
        stage: StageName,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// The vision summarizer failed.
    #[error("{stage}: analysis failed: {source}")]
    Analysis {
        /// The failing stage.
        stage: StageName,
        /// What went wrong.
        #[source]
        source: EditError,
    },
}

impl StageError {
    /// The stage that failed.
    #[must_use]
    pub const fn stage(&self) -> StageName {
        match self {
            Self::Mask { stage, .. }
            | Self::Edit { stage, .. }
            | Self::Timeout { stage, .. }
            | Self::Analysis { stage, .. } => *stage,
        }
    }

    pub(crate) fn mask(stage: StageName) -> impl Fn(MaskError) -> Self {
        move |source| Self::Mask { stage, source }
    }
}
