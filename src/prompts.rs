//! Instructions sent to the generation service alongside the PDF.
//!
//! Centralising every prompt here keeps the wording in one place and lets
//! unit tests inspect the exact text without a live model.
//!
//! The instructions are the base directives ([`DEFAULT_SYSTEM_PROMPT`] or a
//! caller override) followed by one of two image strategies, chosen from the
//! [`CloudConfig`]:
//!
//! * hosted figures: `\includegraphics` rooted at the public URL prefix with
//!   sequential names (`image_01.png`, `image_02.png`, …)
//! * no hosting: TikZ where feasible, otherwise a placeholder comment

use crate::config::CloudConfig;
use crate::pipeline::assets::sequential_image_name;

/// Base directives for converting a whole PDF into a LaTeX document.
///
/// Used when `ConversionConfig::system_prompt` is `None`.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert academic typesetter and LaTeX engineer.
Your task is to convert the attached PDF document into high-quality, compilable LaTeX code.

Follow these rules precisely:

1. FULL DOCUMENT
   - Generate a complete LaTeX document starting with \documentclass{article} and ending with \end{document}

2. PACKAGES
   - Include every package the body needs in the preamble, at least: amsmath, graphicx, tikz, circuitikz, float, hyperref

3. STRUCTURE
   - Preserve sections, subsections, lists and text formatting
   - Use \section, \subsection, \subsubsection matching the visual hierarchy
   - Use itemize and enumerate, preserving nesting

4. MATH
   - Convert all mathematical expressions into proper LaTeX math mode ($...$ or $$...$$)

5. TABLES
   - Convert tables into \begin{table} environments with tabular content"#;

/// Closing rule appended after the image strategy.
pub const OUTPUT_FORMAT_RULE: &str = r#"OUTPUT FORMAT
   - Output ONLY the raw LaTeX code
   - Do NOT use Markdown code blocks (like ```latex)
   - Do NOT add commentary or explanations"#;

/// Image strategy when figures are hosted at `prefix`.
pub fn hosted_images_instructions(prefix: &str) -> String {
    let first = sequential_image_name(1);
    let second = sequential_image_name(2);
    format!(
        r#"IMAGES
   The images from this PDF are uploaded to a cloud host at "{prefix}".
   When you encounter an image, graph, or diagram that cannot be represented by code (like TikZ),
   you MUST use the \includegraphics command.

   Naming convention: the images are named sequentially in order of appearance:
   "{first}", "{second}", etc.

   Example:
   \begin{{figure}}[H]
     \centering
     \includegraphics[width=0.8\linewidth]{{{prefix}/{first}}}
     \caption{{Description of the image}}
   \end{{figure}}"#
    )
}

/// Image strategy when no cloud host is configured.
pub const INLINE_IMAGES_INSTRUCTIONS: &str = r#"IMAGES
   For images, graphs, or circuits:
   1. If it is a circuit or simple diagram, TRY to generate valid TikZ (or circuitikz) code to replicate it.
   2. If it is a complex photo, use a placeholder comment like % [IMAGE_PLACEHOLDER: Description]"#;

/// Assemble the full instruction text for one request.
pub fn build_instructions(cloud: &CloudConfig, system_prompt: Option<&str>) -> String {
    let base = system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT).trim_end();
    let images = match cloud.image_url_prefix() {
        Some(prefix) => hosted_images_instructions(prefix),
        None => INLINE_IMAGES_INSTRUCTIONS.to_string(),
    };
    format!("{base}\n\n{images}\n\n{OUTPUT_FORMAT_RULE}")
}
