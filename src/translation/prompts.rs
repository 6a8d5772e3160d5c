/*!
 * Prompt construction and response parsing.
 *
 * Lines are sent as numbered blocks:
 *
 * ```text
 * #12
 * Original>
 * Where are you going?
 * ```
 *
 * and the model answers with matching `#12` / `Translation>` blocks, followed
 * by optional `<summary>`, `<scene>` and `<names>` tags.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use super::context::TranslationContext;
use crate::document::SubtitleLine;
use crate::providers::TranslationPrompt;

// @const: block header such as "#12"
static LINE_HEADER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#\s*(\d+)\s*$").unwrap());

// @const: block marker, "Original>" or "Translation>"
static MARKER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(Original|Translation)>\s*(.*)$").unwrap());

static SUMMARY_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<summary>(.*?)</summary>").unwrap());
static SCENE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<scene>(.*?)</scene>").unwrap());
static NAMES_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<names>(.*?)</names>").unwrap());

/// System prompt template for subtitle translation.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub const SUBTITLE_TRANSLATOR: &'static str = r#"You are an expert subtitle translator. Translate each numbered line into {target_language}.

Reply with one block per line, keeping the line numbers:

#<number>
Translation>
<translated text>

Keep the number of lines the same and do not merge or split lines.
After the translations, summarise the new lines in a <summary> tag and the scene so far in a <scene> tag.
List any character or proper names in a <names> tag, one per line."#;

    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    pub fn subtitle_translator() -> Self {
        Self::new(Self::SUBTITLE_TRANSLATOR)
    }

    pub fn render(&self, target_language: &str) -> String {
        self.template.replace("{target_language}", target_language)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::subtitle_translator()
    }
}

/// Builds the prompt for one batch.
#[derive(Debug, Clone, Default)]
pub struct TranslationPromptBuilder {
    template: PromptTemplate,
    context: TranslationContext,
    lines: Vec<(usize, String)>,
}

impl TranslationPromptBuilder {
    pub fn new(context: TranslationContext) -> Self {
        Self {
            template: PromptTemplate::default(),
            context,
            lines: Vec::new(),
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Set the lines to translate.
    pub fn with_lines(mut self, lines: &[SubtitleLine]) -> Self {
        self.lines = lines.iter().map(|line| (line.number, line.text.clone())).collect();
        self
    }

    /// Build the system prompt: template plus user instructions.
    pub fn build_system_prompt(&self) -> String {
        let target = self.context.target_language.as_deref().unwrap_or("the target language");
        let mut system = self.template.render(target);
        if let Some(instructions) = self.context.instructions.as_deref().filter(|i| !i.trim().is_empty()) {
            system.push_str("\n\n");
            system.push_str(instructions.trim());
        }
        system
    }

    /// Build the user prompt: context tags followed by the numbered lines.
    pub fn build_user_prompt(&self) -> String {
        let context = &self.context;
        let mut tags = Vec::new();

        if let Some(movie_name) = &context.movie_name {
            tags.push(format!("<movie>{}</movie>", movie_name));
        }
        if let Some(description) = &context.description {
            tags.push(format!("<description>{}</description>", description));
        }
        if !context.names.is_empty() {
            tags.push(format!("<names>{}</names>", context.names.join(", ")));
        }
        if !context.history.is_empty() {
            tags.push(format!("<history>\n{}\n</history>", context.history.join("\n")));
        }
        if let Some(scene_summary) = &context.scene_summary {
            tags.push(format!("<scene>{}</scene>", scene_summary));
        }
        if let Some(summary) = &context.summary {
            tags.push(format!("<summary>{}</summary>", summary));
        }

        let mut prompt = String::new();
        if !tags.is_empty() {
            prompt.push_str("<context>\n");
            prompt.push_str(&tags.join("\n"));
            prompt.push_str("\n</context>\n\n");
        }

        prompt.push_str(&format!(
            "Translate these subtitles (scene {}, batch {}):\n\n",
            context.scene, context.batch
        ));

        let blocks: Vec<String> = self
            .lines
            .iter()
            .map(|(number, text)| format!("#{}\nOriginal>\n{}", number, text))
            .collect();
        prompt.push_str(&blocks.join("\n\n"));
        prompt
    }

    pub fn build(&self) -> TranslationPrompt {
        TranslationPrompt::new(Some(self.build_system_prompt()), self.build_user_prompt())
    }
}

/// What could be recovered from a model response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    /// Translated text keyed by line number
    pub lines: BTreeMap<usize, String>,

    /// Summary of the translated batch
    pub summary: Option<String>,

    /// Summary of the scene so far
    pub scene: Option<String>,

    /// Names reported by the model
    pub names: Vec<String>,
}

/// Parse a model response into line translations and context tags.
pub fn parse_translation_response(text: &str) -> ParsedResponse {
    let summary = capture_tag(&SUMMARY_REGEX, text);
    let scene = capture_tag(&SCENE_REGEX, text);
    let names = capture_tag(&NAMES_REGEX, text)
        .map(|names| {
            names
                .split(['\n', ','])
                .map(|name| name.trim().trim_start_matches('-').trim().to_string())
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut body = text.to_string();
    for regex in [&*SUMMARY_REGEX, &*SCENE_REGEX, &*NAMES_REGEX] {
        body = regex.replace_all(&body, "").into_owned();
    }

    ParsedResponse {
        lines: parse_line_blocks(&body, "Translation"),
        summary,
        scene,
        names,
    }
}

/// Parse `#N` blocks, keeping the text that follows `marker>`.
///
/// Text under any other marker (an echoed `Original>`, for instance) is
/// ignored. A block with no marker at all keeps everything after its header.
pub fn parse_line_blocks(text: &str, marker: &str) -> BTreeMap<usize, String> {
    let mut blocks = BTreeMap::new();
    let mut current: Option<usize> = None;
    let mut buffer: Vec<&str> = Vec::new();
    let mut capturing = true;

    for line in text.lines() {
        let trimmed = line.trim();

        if let Some(captures) = LINE_HEADER_REGEX.captures(trimmed) {
            flush_block(&mut blocks, current, &mut buffer);
            current = captures[1].parse().ok();
            capturing = true;
            continue;
        }

        if current.is_none() {
            continue;
        }

        if let Some(captures) = MARKER_REGEX.captures(trimmed) {
            if &captures[1] == marker {
                buffer.clear();
                capturing = true;
                let rest = captures.get(2).map_or("", |m| m.as_str());
                if !rest.is_empty() {
                    buffer.push(rest);
                }
            } else {
                capturing = false;
            }
            continue;
        }

        if capturing {
            buffer.push(line);
        }
    }
    flush_block(&mut blocks, current, &mut buffer);

    blocks
}

fn flush_block(blocks: &mut BTreeMap<usize, String>, number: Option<usize>, buffer: &mut Vec<&str>) {
    if let Some(number) = number {
        let text = buffer.join("\n").trim().to_string();
        if !text.is_empty() {
            blocks.insert(number, text);
        }
    }
    buffer.clear();
}

fn capture_tag(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}
