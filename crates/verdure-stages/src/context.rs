//! Per-run inputs.

use crate::prompt::{AnalysisBlocks, UserPrompt};

/// Everything one pipeline run needs, owned by that run alone.
///
/// Nothing here is shared between runs: plant references live in the
/// context and come back in [`crate::PipelineRun::plant_refs`], so two
/// concurrent sessions can never see each other's uploads.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Encoded photograph to edit.
    pub base_image: Vec<u8>,
    /// Encoded painted overlay, if the designer marked planting areas.
    pub overlay: Option<Vec<u8>>,
    /// Encoded style reference images.
    pub style_refs: Vec<Vec<u8>>,
    /// Encoded plant reference images.
    pub plant_refs: Vec<Vec<u8>>,
    /// Caller instructions appended to every stage prompt.
    pub user_prompts: Vec<UserPrompt>,
    /// Analysis text from an earlier call. When set, the analyze step
    /// is skipped.
    pub analysis: Option<AnalysisBlocks>,
}

impl RunContext {
    /// A context for `base_image` with nothing else attached.
    #[must_use]
    pub fn new(base_image: Vec<u8>) -> Self {
        Self {
            base_image,
            ..Self::default()
        }
    }

    /// Attach a painted overlay.
    #[must_use]
    pub fn with_overlay(mut self, overlay: Vec<u8>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Attach precomputed analysis blocks.
    #[must_use]
    pub fn with_analysis(mut self, analysis: AnalysisBlocks) -> Self {
        self.analysis = Some(analysis);
        self
    }
}
