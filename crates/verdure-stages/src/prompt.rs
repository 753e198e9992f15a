//! Prompt composition for each edit stage.
//!
//! Every stage prompt is assembled from the same parts: a stage header,
//! fixed scene-protection rules, the style and species blocks produced
//! by the analysis step, and the caller's own instructions. Only the
//! header and a few stage-specific lines differ.

use serde::{Deserialize, Serialize};

const STYLE_LABEL: &str = "[style]";
const SPECIES_LABEL: &str = "[plant_species]";

const NO_STYLE: &str = "(no style extracted)";
const NO_SPECIES: &str = "(no species extracted)";

const HARDSCAPE_RULES: &str = "\
HARDSCAPE (keep unchanged):
- Keep buildings, skyline, parapets, railings, benches, paving and planter edges exactly as they are.
- Keep the camera angle, perspective lines and background geometry.
- Place plants only inside the painted planting areas.
- Add no objects other than plants.";

const PLANTING_ZONE_RULES: &str = "\
PLANTING ZONES:
- Roots and trunk bases stay inside the planting footprint.
- Canopy, fronds and upper trunks may rise past the bed and overlap sky, railings or background.";

const INTEGRATION_RULES: &str = "\
INTEGRATION:
- Match the scene's lighting, white balance, contrast and shadow softness.
- Add contact shadows and light occlusion where plants meet the ground.
- Keep leaf and frond edges crisp, with no cut-out halos.
- Keep paths, seating and walls clear of planting.";

const GLOBAL_RULES: &str = "\
GLOBAL RULES:
- Leave sky, buildings, tiles, benches, railings and walls untouched.
- Keep the original lighting, shadows, perspective and color temperature.
- Photorealistic, natural textures.";

/// Only stated when the edit actually carries a mask.
const MASK_RULE: &str = "- Add plants only inside the provided mask.";

const USER_CONTEXT_HEADING: &str = "USER CONTEXT (ordered; weights indicate importance):";

const STYLE_HEADING: &str = "STYLE (follow the style references; clean landscape-architect visualization):";
const SPECIES_HEADING: &str = "SPECIES (must be recognizable from the plant references):";

/// The two analysis text blocks handed to every stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisBlocks {
    /// Layout logic, density, palette and recurring shapes.
    pub style: String,
    /// Species name, morphology and typical placement.
    pub species: String,
}

impl AnalysisBlocks {
    /// Build from already separated blocks.
    #[must_use]
    pub fn new(style: impl Into<String>, species: impl Into<String>) -> Self {
        Self {
            style: style.into(),
            species: species.into(),
        }
    }

    /// Split a summarizer reply labeled `[STYLE]` and `[PLANT_SPECIES]`.
    ///
    /// Labels match case-insensitively and may appear in either order;
    /// each block keeps its label line. A reply missing either label is
    /// taken whole as the style block.
    #[must_use]
    pub fn from_labeled(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        match (lower.find(STYLE_LABEL), lower.find(SPECIES_LABEL)) {
            (Some(style), Some(species)) if style < species => Self::new(
                raw[style..species].trim(),
                raw[species..].trim(),
            ),
            (Some(style), Some(species)) => Self::new(
                raw[style..].trim(),
                raw[species..style].trim(),
            ),
            _ => Self::new(raw.trim(), ""),
        }
    }
}

/// One caller-supplied instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPrompt {
    /// Instruction text.
    pub text: String,
    /// Free-form grouping, `"global"` unless set.
    pub category: String,
    /// Relative importance, `1.0` unless set.
    pub weight: f32,
}

impl UserPrompt {
    /// Default category.
    pub const DEFAULT_CATEGORY: &str = "global";
    /// Default weight.
    pub const DEFAULT_WEIGHT: f32 = 1.0;

    /// A global instruction with default weight.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

impl Default for UserPrompt {
    fn default() -> Self {
        Self {
            text: String::new(),
            category: Self::DEFAULT_CATEGORY.to_owned(),
            weight: Self::DEFAULT_WEIGHT,
        }
    }
}

/// Render the fixed global rules followed by the caller's non-blank
/// instructions, numbered in order with their category and weight.
///
/// The mask rule is included only when `masked` is set, so unmasked
/// edits are never told about a mask they do not have.
#[must_use]
pub fn render_user_prompts(items: &[UserPrompt], masked: bool) -> String {
    let mut out = String::from(GLOBAL_RULES);
    if masked {
        out.push('\n');
        out.push_str(MASK_RULE);
    }
    let lines: Vec<String> = items
        .iter()
        .filter(|item| !item.text.trim().is_empty())
        .enumerate()
        .map(|(i, item)| {
            format!(
                "{}. ({}, w={:?}) {}",
                i + 1,
                item.category.trim(),
                item.weight,
                item.text.trim()
            )
        })
        .collect();
    if !lines.is_empty() {
        out.push_str("\n\n");
        out.push_str(USER_CONTEXT_HEADING);
        for line in lines {
            out.push('\n');
            out.push_str(&line);
        }
    }
    out
}

fn or_placeholder<'a>(block: &'a str, placeholder: &'a str) -> &'a str {
    if block.trim().is_empty() {
        placeholder
    } else {
        block
    }
}

fn species_lock() -> &'static str {
    "SPECIES LOCK:\n\
     - Use only the species and morphology described under [PLANT_SPECIES].\n\
     - Do not substitute look-alike species or invent new ones."
}

fn join(parts: &[&str], user_block: &str) -> String {
    let mut prompt = parts.join("\n");
    if !user_block.trim().is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(user_block);
    }
    prompt
}

/// Stage 1: layout and style application, with canopy freedom.
#[must_use]
pub fn compose_layout_prompt(analysis: &AnalysisBlocks, user_block: &str) -> String {
    join(
        &[
            "STAGE 1: LAYOUT AND STYLE (canopy may extend past the bed)",
            HARDSCAPE_RULES,
            PLANTING_ZONE_RULES,
            "",
            STYLE_HEADING,
            or_placeholder(&analysis.style, NO_STYLE),
            "",
            SPECIES_HEADING,
            or_placeholder(&analysis.species, NO_SPECIES),
            species_lock(),
            "",
            INTEGRATION_RULES,
        ],
        user_block,
    )
}

/// Stage 2: species-accurate refinement near bases and crowns.
#[must_use]
pub fn compose_refine_prompt(analysis: &AnalysisBlocks, user_block: &str) -> String {
    let species = format!(
        "{}\n- Match trunk, crown, frond and leaf anatomy to the references.\n\
         - Fix any distortion in shape, color or scale left by the previous stage.",
        or_placeholder(&analysis.species, NO_SPECIES)
    );
    let style = format!(
        "{}\n- Keep the clean visualization style: readable structure, slightly idealized realism.",
        or_placeholder(&analysis.style, NO_STYLE)
    );
    join(
        &[
            "STAGE 2: SPECIES REFINEMENT (masked near bases and crowns)",
            HARDSCAPE_RULES,
            "- Keep new plants visually separate from existing clipped hedges and topiary.",
            "",
            SPECIES_HEADING,
            &species,
            species_lock(),
            "",
            STYLE_HEADING,
            &style,
            "",
            INTEGRATION_RULES,
            "- Do not change the layout; refine only the selected plant regions.",
        ],
        user_block,
    )
}

/// Stage 3: light global harmonization with no layout changes.
#[must_use]
pub fn compose_harmonize_prompt(analysis: &AnalysisBlocks, user_block: &str) -> String {
    let style = format!(
        "{}\n- Subtle color grading toward a clean architectural visualization.",
        or_placeholder(&analysis.style, NO_STYLE)
    );
    join(
        &[
            "STAGE 3: GLOBAL HARMONIZATION (light blend, no layout changes)",
            HARDSCAPE_RULES,
            "- Do not move plants; keep earlier placement and anatomy intact.",
            "",
            STYLE_HEADING,
            &style,
            "",
            SPECIES_HEADING,
            or_placeholder(&analysis.species, NO_SPECIES),
            species_lock(),
            "",
            INTEGRATION_RULES,
            "- Remove small artifacts and halos; keep detail crisp.",
        ],
        user_block,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn labeled_reply_splits_in_order() {
        let blocks = AnalysisBlocks::from_labeled(
            "[STYLE]\n- formal grid\n[PLANT_SPECIES]\n- Foxtail palm",
        );
        assert_eq!(blocks.style, "[STYLE]\n- formal grid");
        assert_eq!(blocks.species, "[PLANT_SPECIES]\n- Foxtail palm");
    }

    #[test]
    fn labeled_reply_splits_in_reverse_order() {
        let blocks = AnalysisBlocks::from_labeled("[plant_species] palm\n[style] loose");
        assert_eq!(blocks.style, "[style] loose");
        assert_eq!(blocks.species, "[plant_species] palm");
    }

    #[test]
    fn unlabeled_reply_becomes_style() {
        let blocks = AnalysisBlocks::from_labeled("  lush tropical planting  ");
        assert_eq!(blocks.style, "lush tropical planting");
        assert!(blocks.species.is_empty());
    }

    #[test]
    fn user_prompts_skip_blank_items() {
        let rendered = render_user_prompts(
            &[
                UserPrompt::new("three palms"),
                UserPrompt::new("   "),
                UserPrompt {
                    text: "palms".into(),
                    category: "species".into(),
                    weight: 2.5,
                },
            ],
            true,
        );
        assert!(rendered.starts_with("GLOBAL RULES:"));
        assert!(rendered.contains(USER_CONTEXT_HEADING));
        assert!(
            rendered.ends_with("1. (global, w=1.0) three palms\n2. (species, w=2.5) palms"),
            "{rendered}"
        );
    }

    #[test]
    fn no_user_prompts_renders_only_rules() {
        let rendered = render_user_prompts(&[], true);
        assert_eq!(rendered, format!("{GLOBAL_RULES}\n{MASK_RULE}"));
    }

    #[test]
    fn unmasked_edits_omit_the_mask_rule() {
        let rendered = render_user_prompts(&[UserPrompt::new("soften the light")], false);
        assert!(!rendered.contains("mask"), "{rendered}");
        assert!(rendered.contains("1. (global, w=1.0) soften the light"));
    }

    #[test]
    fn user_prompt_json_defaults() {
        let item: UserPrompt = serde_json::from_str(r#"{"text":"add a palm"}"#).unwrap();
        assert_eq!(item.category, "global");
        assert!((item.weight - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn stage_prompts_carry_blocks_and_placeholders() {
        let analysis = AnalysisBlocks::new("[STYLE] formal", "");
        let layout = compose_layout_prompt(&analysis, "");
        assert!(layout.starts_with("STAGE 1"));
        assert!(layout.contains("[STYLE] formal"));
        assert!(layout.contains(NO_SPECIES));

        let refine = compose_refine_prompt(&analysis, "extra");
        assert!(refine.starts_with("STAGE 2"));
        assert!(refine.ends_with("\n\nextra"));

        let harmonize = compose_harmonize_prompt(&AnalysisBlocks::default(), "");
        assert!(harmonize.contains(NO_STYLE));
    }
}
