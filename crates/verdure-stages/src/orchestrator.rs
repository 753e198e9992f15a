//! Stage sequencing: Analyze -> Layout -> Refine -> Harmonize.
//!
//! Each stage takes an encoded input image, derives its own mask fresh
//! against that image's actual dimensions, composes its prompt, and
//! makes exactly one edit call. Stages never reuse a mask from an
//! earlier stage's coordinate space.
//!
//! The orchestrator holds configuration and collaborators only. It keeps
//! no state between calls, so one instance can serve concurrent runs.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use verdure_mask::{
    BinaryMask, CanopyGrowth, Dimensions, MaskConfig, MaskError, MaskPipeline, RgbaImage, brush,
    codec, resize,
};

use crate::context::RunContext;
use crate::error::{EditError, StageError, StageName};
use crate::hooks::PostProcess;
use crate::invoker::{
    AnalysisRequest, EditInvoker, EditRequest, TargetSize, VisionSummarizer, external_mask_png,
};
use crate::prompt::{
    AnalysisBlocks, UserPrompt, compose_harmonize_prompt, compose_layout_prompt,
    compose_refine_prompt, render_user_prompts,
};

/// How the harmonization stage restricts its edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HarmonizeMask {
    /// Unmasked edit over the whole image.
    Global,
    /// Edit inside a wide soft mask derived from the overlay.
    SoftMask,
}

/// An explicit mask for the refine stage, overriding the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalMask {
    /// A disk around a drop point, in the stage input's pixel space.
    Brush {
        /// Drop point.
        center: (u32, u32),
        /// Disk radius (raised to [`brush::MIN_BRUSH_RADIUS`]).
        radius: u32,
    },
    /// A caller-encoded mask image (white = editable).
    Encoded(Vec<u8>),
}

impl LocalMask {
    /// Materialize the mask at `dimensions`.
    fn resolve(&self, dimensions: Dimensions) -> Result<BinaryMask, MaskError> {
        match self {
            Self::Brush { center, radius } => {
                Ok(brush::circular_mask(dimensions, *center, *radius))
            }
            Self::Encoded(bytes) => {
                let mask = codec::decode_mask(bytes)?;
                Ok(resize::fit(&mask, Some(dimensions)))
            }
        }
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Segmentation and cleanup settings shared by every stage.
    pub mask: MaskConfig,
    /// Canopy growth for the layout stage's soft mask.
    pub layout_growth: CanopyGrowth,
    /// Canopy growth for a masked harmonization stage.
    pub harmonize_growth: CanopyGrowth,
    /// Whether `run_all` performs the refine stage.
    pub refine: bool,
    /// Harmonization mode for `run_all`; `None` skips the stage.
    pub harmonize: Option<HarmonizeMask>,
    /// Output size requested from the edit service.
    pub size: TargetSize,
    /// Upper bound on one edit or analysis call, in seconds.
    pub edit_timeout_secs: u64,
}

impl OrchestratorConfig {
    /// Default per-call timeout in seconds.
    pub const DEFAULT_EDIT_TIMEOUT_SECS: u64 = 600;

    /// Per-call timeout.
    #[must_use]
    pub const fn edit_timeout(&self) -> Duration {
        Duration::from_secs(self.edit_timeout_secs)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mask: MaskConfig::default(),
            layout_growth: CanopyGrowth::LAYOUT,
            harmonize_growth: CanopyGrowth::HARMONIZE,
            refine: true,
            harmonize: None,
            size: TargetSize::default(),
            edit_timeout_secs: Self::DEFAULT_EDIT_TIMEOUT_SECS,
        }
    }
}

/// What a single stage consumes.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    /// Encoded image to edit. Its dimensions are authoritative.
    pub image: &'a [u8],
    /// Encoded overlay, if any.
    pub overlay: Option<&'a [u8]>,
    /// Style and species text.
    pub analysis: &'a AnalysisBlocks,
    /// Caller instructions.
    pub user_prompts: &'a [UserPrompt],
}

/// One completed stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    /// Which stage produced this.
    pub stage: StageName,
    /// Encoded edited image.
    pub output_image: Vec<u8>,
    /// The prompt sent to the edit service.
    pub prompt: String,
    /// The mask the edit was restricted to, `None` for unmasked edits.
    pub mask_used: Option<BinaryMask>,
}

impl StageResult {
    /// The mask as a grayscale PNG (white = editable), or empty bytes
    /// for an unmasked edit.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::Encode`] if PNG encoding fails.
    pub fn mask_png(&self) -> Result<Vec<u8>, MaskError> {
        self.mask_used
            .as_ref()
            .map_or_else(|| Ok(Vec::new()), codec::encode_mask_png)
    }
}

/// The outcome of [`Orchestrator::run_all`].
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// The analysis blocks every stage used.
    pub analysis: AnalysisBlocks,
    /// Completed stages in execution order.
    pub stages: Vec<StageResult>,
    /// The run's plant references, handed back to the caller.
    pub plant_refs: Vec<Vec<u8>>,
}

impl PipelineRun {
    /// The last stage that ran.
    #[must_use]
    pub fn final_result(&self) -> Option<&StageResult> {
        self.stages.last()
    }

    /// The result of a specific stage, if it ran.
    #[must_use]
    pub fn stage(&self, stage: StageName) -> Option<&StageResult> {
        self.stages.iter().find(|r| r.stage == stage)
    }
}

/// Sequences edit stages against the external collaborators.
pub struct Orchestrator<E, V> {
    invoker: E,
    summarizer: V,
    config: OrchestratorConfig,
    hooks: Vec<Box<dyn PostProcess>>,
}

impl<E, V> std::fmt::Debug for Orchestrator<E, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field(
                "hooks",
                &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl<E: EditInvoker, V: VisionSummarizer> Orchestrator<E, V> {
    /// Create an orchestrator with no post-processing hooks.
    pub fn new(invoker: E, summarizer: V, config: OrchestratorConfig) -> Self {
        Self {
            invoker,
            summarizer,
            config,
            hooks: Vec::new(),
        }
    }

    /// Register a post-processing hook. Hooks run in registration order.
    #[must_use]
    pub fn with_hook(mut self, hook: impl PostProcess + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Produce the style and species blocks for `ctx`.
    ///
    /// Precomputed analysis on the context is returned as is, without
    /// calling the summarizer.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Analysis`] if the summarizer fails, or
    /// [`StageError::Timeout`] if it does not answer in time.
    #[tracing::instrument(skip_all, fields(stage = %StageName::Analyze))]
    pub async fn analyze(&self, ctx: &RunContext) -> Result<AnalysisBlocks, StageError> {
        if let Some(analysis) = &ctx.analysis {
            debug!("using precomputed analysis");
            return Ok(analysis.clone());
        }
        let request = AnalysisRequest {
            base_image: &ctx.base_image,
            style_refs: &ctx.style_refs,
            plant_refs: &ctx.plant_refs,
        };
        let stage = StageName::Analyze;
        let blocks = self
            .bounded(stage, self.summarizer.summarize(request))
            .await?
            .map_err(|source| StageError::Analysis { stage, source })?;
        info!(
            style_len = blocks.style.len(),
            species_len = blocks.species.len(),
            "analysis complete"
        );
        Ok(blocks)
    }

    /// Stage 1: layout inside the soft mask derived from the overlay.
    ///
    /// With no overlay, or an overlay with nothing painted, the edit is
    /// unmasked.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] tagged [`StageName::Layout`] if an input
    /// cannot be decoded or the edit call fails.
    #[tracing::instrument(skip_all, fields(stage = %StageName::Layout))]
    pub async fn stage1_layout(&self, input: StageInput<'_>) -> Result<StageResult, StageError> {
        let stage = StageName::Layout;
        let image = codec::decode_rgba(input.image).map_err(StageError::mask(stage))?;
        let dims = Dimensions::of(&image);

        let mask = match input.overlay {
            Some(bytes) => {
                let overlay = codec::decode_rgba(bytes).map_err(StageError::mask(stage))?;
                let pair = MaskPipeline::new(overlay, self.config.mask.clone())
                    .segment()
                    .refine()
                    .expand(self.config.layout_growth)
                    .fit(Some(dims));
                non_blank(stage, pair.soft.into_mask())
            }
            None => None,
        };

        let user_block = render_user_prompts(input.user_prompts, mask.is_some());
        let prompt = compose_layout_prompt(input.analysis, &user_block);
        self.execute(stage, input.image, &image, prompt, mask).await
    }

    /// Stage 2: species refinement inside the hard mask.
    ///
    /// An explicit `local` mask always wins and the overlay is not
    /// segmented at all. A local mask that covers nothing (a brush
    /// dropped off-image) degrades to an unmasked edit. Otherwise the hard mask is recomputed from the
    /// overlay against this stage's input dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] tagged [`StageName::Refine`] if an input
    /// cannot be decoded or the edit call fails.
    #[tracing::instrument(skip_all, fields(stage = %StageName::Refine, local = local.is_some()))]
    pub async fn stage2_refine(
        &self,
        input: StageInput<'_>,
        local: Option<&LocalMask>,
    ) -> Result<StageResult, StageError> {
        let stage = StageName::Refine;
        let image = codec::decode_rgba(input.image).map_err(StageError::mask(stage))?;
        let dims = Dimensions::of(&image);

        let mask = match (local, input.overlay) {
            (Some(local), _) => {
                let local = local.resolve(dims).map_err(StageError::mask(stage))?;
                non_blank(stage, local)
            }
            (None, Some(bytes)) => {
                let overlay = codec::decode_rgba(bytes).map_err(StageError::mask(stage))?;
                let refined = MaskPipeline::new(overlay, self.config.mask.clone())
                    .segment()
                    .refine();
                non_blank(stage, resize::fit(refined.hard(), Some(dims)))
            }
            (None, None) => None,
        };

        let user_block = render_user_prompts(input.user_prompts, mask.is_some());
        let prompt = compose_refine_prompt(input.analysis, &user_block);
        self.execute(stage, input.image, &image, prompt, mask).await
    }

    /// Stage 3: light harmonization, global or inside a wide soft mask.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] tagged [`StageName::Harmonize`] if an input
    /// cannot be decoded or the edit call fails.
    #[tracing::instrument(skip_all, fields(stage = %StageName::Harmonize, ?mode))]
    pub async fn stage3_harmonize(
        &self,
        input: StageInput<'_>,
        mode: HarmonizeMask,
    ) -> Result<StageResult, StageError> {
        let stage = StageName::Harmonize;
        let image = codec::decode_rgba(input.image).map_err(StageError::mask(stage))?;
        let dims = Dimensions::of(&image);

        let mask = match (mode, input.overlay) {
            (HarmonizeMask::SoftMask, Some(bytes)) => {
                let overlay = codec::decode_rgba(bytes).map_err(StageError::mask(stage))?;
                let pair = MaskPipeline::new(overlay, self.config.mask.clone())
                    .segment()
                    .refine()
                    .expand(self.config.harmonize_growth)
                    .fit(Some(dims));
                non_blank(stage, pair.soft.into_mask())
            }
            _ => None,
        };

        let user_block = render_user_prompts(input.user_prompts, mask.is_some());
        let prompt = compose_harmonize_prompt(input.analysis, &user_block);
        self.execute(stage, input.image, &image, prompt, mask).await
    }

    /// Run every configured stage, chaining each output into the next
    /// stage's input.
    ///
    /// Any failure aborts the run and is reported with the failing
    /// stage. Callers who need partial results should drive the stage
    /// methods individually.
    ///
    /// # Errors
    ///
    /// Returns the first [`StageError`] encountered.
    #[tracing::instrument(skip_all, fields(
        refine = self.config.refine,
        harmonize = ?self.config.harmonize,
    ))]
    pub async fn run_all(&self, ctx: RunContext) -> Result<PipelineRun, StageError> {
        let analysis = self.analyze(&ctx).await?;
        let base = StageInput {
            image: &ctx.base_image,
            overlay: ctx.overlay.as_deref(),
            analysis: &analysis,
            user_prompts: &ctx.user_prompts,
        };

        let mut stages = Vec::with_capacity(3);
        let layout = self.stage1_layout(base).await?;
        stages.push(layout);

        if self.config.refine {
            let image = last_output(&stages, &ctx.base_image);
            let refined = self
                .stage2_refine(StageInput { image, ..base }, None)
                .await?;
            stages.push(refined);
        }

        if let Some(mode) = self.config.harmonize {
            let image = last_output(&stages, &ctx.base_image);
            let harmonized = self
                .stage3_harmonize(StageInput { image, ..base }, mode)
                .await?;
            stages.push(harmonized);
        }

        info!(stages = stages.len(), "pipeline run complete");
        Ok(PipelineRun {
            analysis,
            stages,
            plant_refs: ctx.plant_refs,
        })
    }

    /// Make one edit call and package the result.
    async fn execute(
        &self,
        stage: StageName,
        image_png: &[u8],
        image: &RgbaImage,
        prompt: String,
        mask: Option<BinaryMask>,
    ) -> Result<StageResult, StageError> {
        let dims = Dimensions::of(image);
        let mask_png = mask
            .as_ref()
            .map(|m| external_mask_png(m, dims))
            .transpose()
            .map_err(StageError::mask(stage))?;

        debug!(%dims, masked = mask_png.is_some(), prompt_len = prompt.len(), "invoking edit");
        let request = EditRequest {
            image_png: image_png.to_vec(),
            prompt: prompt.clone(),
            mask_png,
            size: self.config.size,
        };
        let output = self
            .bounded(stage, self.invoker.edit(request))
            .await?
            .map_err(|source| StageError::Edit { stage, source })?;

        let edited = codec::decode_rgba(&output).map_err(|e| StageError::Edit {
            stage,
            source: EditError::InvalidResponse(e),
        })?;
        let output_image = self.post_process(stage, image, edited, mask.as_ref(), output)?;

        info!(output_bytes = output_image.len(), "stage complete");
        Ok(StageResult {
            stage,
            output_image,
            prompt,
            mask_used: mask,
        })
    }

    /// Run registered hooks for `stage`. Returns `raw` untouched when
    /// none apply.
    fn post_process(
        &self,
        stage: StageName,
        input: &RgbaImage,
        edited: RgbaImage,
        mask: Option<&BinaryMask>,
        raw: Vec<u8>,
    ) -> Result<Vec<u8>, StageError> {
        let mut active = self.hooks.iter().filter(|h| h.applies_to(stage)).peekable();
        if active.peek().is_none() {
            return Ok(raw);
        }
        let mut image = edited;
        for hook in active {
            debug!(hook = hook.name(), "post-processing");
            image = hook.apply(input, image, mask);
        }
        codec::encode_rgba_png(&image).map_err(StageError::mask(stage))
    }

    /// Apply the per-call timeout to a collaborator future.
    async fn bounded<T>(
        &self,
        stage: StageName,
        call: impl Future<Output = T> + Send,
    ) -> Result<T, StageError> {
        let timeout = self.config.edit_timeout();
        tokio::time::timeout(timeout, call).await.map_err(|_| {
            warn!(%stage, ?timeout, "collaborator call timed out");
            StageError::Timeout { stage, timeout }
        })
    }
}

/// Drop blank masks so the edit runs unmasked.
fn non_blank(stage: StageName, mask: BinaryMask) -> Option<BinaryMask> {
    if mask.is_blank() {
        warn!(%stage, "mask covers nothing; editing unmasked");
        None
    } else {
        Some(mask)
    }
}

fn last_output<'a>(stages: &'a [StageResult], fallback: &'a [u8]) -> &'a [u8] {
    stages.last().map_or(fallback, |r| r.output_image.as_slice())
}
