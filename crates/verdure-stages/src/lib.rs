//! verdure-stages: multi-stage masked-edit orchestration.
//!
//! Drives an external generative image-editing service through up to
//! three stages:
//!
//! 1. **Layout**: plants placed inside a soft canopy mask with tight
//!    growth allowances.
//! 2. **Refine**: species detail restricted to the hard mask (or a
//!    caller-supplied local mask).
//! 3. **Harmonize** (optional): a light global pass, unmasked or inside
//!    a wide soft mask.
//!
//! Each stage's output image is the next stage's input, and every mask
//! is derived fresh against the current input's dimensions. Mask
//! geometry comes from `verdure-mask`; the edit service and the vision
//! summarizer are collaborators behind [`EditInvoker`] and
//! [`VisionSummarizer`].

pub mod context;
pub mod error;
pub mod hooks;
pub mod invoker;
pub mod orchestrator;
pub mod prompt;

pub use context::RunContext;
pub use error::{EditError, StageError, StageName};
pub use hooks::{ClampToMask, PostProcess, ToneMatch};
pub use invoker::{
    AnalysisRequest, EditInvoker, EditRequest, StaticAnalysis, TargetSize, VisionSummarizer,
    external_mask_png,
};
pub use orchestrator::{
    HarmonizeMask, LocalMask, Orchestrator, OrchestratorConfig, PipelineRun, StageInput,
    StageResult,
};
pub use prompt::{AnalysisBlocks, UserPrompt};
