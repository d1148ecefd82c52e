//! Prompt templates for the research summary.

/// Instruction describing the exact reply shape.
pub const OUTPUT_FORMAT: &str = "Output ONLY a valid JSON object with exactly these fields: \
topic, summary, sources, tools_used. Do NOT include schema, properties, or any text outside the JSON object.";

/// System turn template.
const SYSTEM_TEMPLATE: &str = r#"You are a professional research assistant. Create comprehensive, detailed research summaries.

REQUIREMENTS:
- Write detailed summaries of {target_words}+ words
- Follow the exact {section_count}-section structure provided
- Use all available research material
- {output_format}

STRUCTURE for summary field (write as continuous text with clear section headers):
{sections}

Example format (replace with actual content):
{
  "topic": "Your Topic Name Here",
  "summary": "{example_summary}",
  "sources": ["Wikipedia: Source1", "Web: Source2"],
  "tools_used": ["Wikipedia", "Web Search"]
}
"#;

/// A required section of the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpec {
    pub title: String,
    pub min_words: u32,
}

impl SectionSpec {
    pub fn new(title: impl Into<String>, min_words: u32) -> Self {
        Self {
            title: title.into(),
            min_words,
        }
    }
}

/// What the prompt asks the model for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    /// Minimum total words
    pub target_word_count: u32,
    /// Required sections, in order
    pub sections: Vec<SectionSpec>,
    /// Instruction describing the reply format
    pub output_format: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            target_word_count: 2000,
            sections: vec![
                SectionSpec::new("Introduction and Definition", 300),
                SectionSpec::new("Historical Background and Development", 350),
                SectionSpec::new("Current State and Recent Developments", 300),
                SectionSpec::new("Key Concepts and Mechanisms", 400),
                SectionSpec::new("Applications and Real-World Examples", 350),
                SectionSpec::new("Challenges and Limitations", 300),
                SectionSpec::new("Future Prospects and Implications", 300),
                SectionSpec::new("Conclusion", 200),
            ],
            output_format: OUTPUT_FORMAT.to_string(),
        }
    }
}

impl PromptConfig {
    /// A shorter summary: 500 words over four sections.
    pub fn brief() -> Self {
        Self {
            target_word_count: 500,
            sections: vec![
                SectionSpec::new("Introduction and Definition", 100),
                SectionSpec::new("Key Concepts and Mechanisms", 150),
                SectionSpec::new("Applications and Real-World Examples", 150),
                SectionSpec::new("Conclusion", 100),
            ],
            ..Default::default()
        }
    }
}

/// The two turns sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub human: String,
}

/// Build the system and human turns for a research query.
pub fn compose(query: &str, wiki_context: &str, search_context: &str, config: &PromptConfig) -> Prompt {
    let sections = config
        .sections
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. **{}** ({}+ words)", i + 1, s.title, s.min_words))
        .collect::<Vec<_>>()
        .join("\n");

    let example_summary = config
        .sections
        .iter()
        .take(2)
        .map(|s| format!("**{}**\\n\\nYour {}+ word section here...", s.title, s.min_words))
        .chain(std::iter::once(format!(
            "[continue for all {} sections]",
            config.sections.len()
        )))
        .collect::<Vec<_>>()
        .join("\\n\\n");

    let target = config.target_word_count.to_string();
    let count = config.sections.len().to_string();

    let system = SYSTEM_TEMPLATE
        .replace("{target_words}", &target)
        .replace("{section_count}", &count)
        .replace("{output_format}", &config.output_format)
        .replace("{sections}", &sections)
        .replace("{example_summary}", &example_summary);

    let human = format!(
        "Research Topic: {query}\n\n\
         Create a comprehensive {target}+ word research summary with the {count} sections listed above.\n\n\
         Wikipedia Content: {wiki_context}\n\
         Web Search Content: {search_context}\n\n\
         Return ONLY the JSON object with topic, summary, sources, and tools_used fields."
    );

    Prompt { system, human }
}
