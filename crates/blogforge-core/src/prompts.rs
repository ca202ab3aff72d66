//! Prompt templates for every generation step.
//!
//! Each step has a fixed system prompt and a user prompt rendered from the
//! request parameters plus the research context block (see
//! [`format_context`](crate::research::format_context)). JSON shapes are
//! not spelled out here; [`complete_structured`](crate::completion::complete_structured)
//! appends each type's schema hint.

use crate::models::{ExplainMode, Tone};

pub const OUTLINE_SYSTEM: &str = "You are an expert technical content strategist who designs \
well-structured blog post outlines for developers. Open with a hook that names the reader's \
problem, order sections from fundamentals to advanced material, plan code examples where they \
help, and use a heading structure that search engines can follow.";

pub const DRAFT_SYSTEM: &str = "You are an expert technical writer. Write clear, accurate and \
engaging blog posts in markdown: H2/H3 headings, fenced code blocks with language hints, short \
focused paragraphs, smooth transitions, and a closing summary with next steps.";

pub const EXPLAIN_SYSTEM: &str = "You are an expert technical educator. Build from fundamentals \
to advanced ideas, use concrete real-world examples, and reach for analogies when a concept is \
abstract.";

pub const SEO_SYSTEM: &str = "You are an SEO specialist for technical content. Integrate \
keywords naturally, keep titles to 50-60 characters and meta descriptions under 160, and \
recommend a clean H1/H2/H3 hierarchy.";

pub const REVIEW_SYSTEM: &str =
    "You are a senior technical editor reviewing blog content for quality and accuracy.";

/// Characters of a draft shown to the reviewer.
pub const REVIEW_EXCERPT_CHARS: usize = 3000;

/// Characters of content sent for SEO analysis.
pub const SEO_EXCERPT_CHARS: usize = 5000;

fn context_block(context: &str) -> String {
    if context.trim().is_empty() {
        String::new()
    } else {
        format!("\n\nResearch context (cite where relevant):\n{}\n", context)
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => format!("{}...", &text[..byte]),
        None => text.to_string(),
    }
}

pub struct OutlinePrompt<'a> {
    pub topic: &'a str,
    pub niche: Option<&'a str>,
    pub target_audience: &'a str,
    pub word_count: u32,
    pub include_code_examples: bool,
    pub context: &'a str,
}

pub fn outline_prompt(p: &OutlinePrompt<'_>) -> String {
    format!(
        "Create a detailed blog post outline.\n\n\
         Topic: {}\nNiche: {}\nTarget audience: {}\nTarget word count: {}\n\
         Include code examples: {}{}",
        p.topic,
        p.niche.unwrap_or("general tech"),
        p.target_audience,
        p.word_count,
        p.include_code_examples,
        context_block(p.context)
    )
}

pub struct DraftPrompt<'a> {
    pub topic: &'a str,
    /// Pretty-printed outline JSON, if there is one.
    pub outline: Option<&'a str>,
    pub tone: Tone,
    pub word_count: u32,
    pub include_code_examples: bool,
    /// Reviewer feedback from the previous attempt.
    pub feedback: Option<&'a str>,
    pub context: &'a str,
}

/// Style directive for a tone; the rest of the prompt is tone-independent.
pub fn tone_directive(tone: Tone) -> &'static str {
    match tone {
        Tone::Conversational => {
            "Write in a friendly, conversational voice: second person, short sentences, the occasional aside."
        }
        Tone::Formal => {
            "Write in a formal, precise register: third person, no slang, measured claims."
        }
        Tone::Tutorial => {
            "Write as a step-by-step tutorial: numbered steps, explicit prerequisites, and a check after each step."
        }
    }
}

pub fn draft_prompt(p: &DraftPrompt<'_>) -> String {
    let mut prompt = format!(
        "Write a complete blog post draft in markdown.\n\n\
         Topic: {}\nOutline:\n{}\n\nTone: {}\n{}\nTarget word count: {}\n\
         Include code examples: {}\n\n\
         Start the content with a single '# ' title line, develop every outline section, \
         and end with key takeaways.",
        p.topic,
        p.outline.unwrap_or("No outline provided"),
        p.tone,
        tone_directive(p.tone),
        p.word_count,
        p.include_code_examples,
    );
    if let Some(feedback) = p.feedback.filter(|f| !f.trim().is_empty()) {
        prompt.push_str(&format!(
            "\n\nThis is a revision. Address the editor's feedback:\n{}",
            feedback
        ));
    }
    prompt.push_str(&context_block(p.context));
    prompt
}

pub fn explain_prompt(
    concept: &str,
    mode: ExplainMode,
    include_examples: bool,
    include_analogies: bool,
    context: &str,
) -> String {
    let depth = match mode {
        ExplainMode::Eli5 => "Explain it like I'm five: simple words and everyday analogies.",
        ExplainMode::Technical => "Give a standard technical explanation with correct terminology.",
        ExplainMode::DeepDive => {
            "Go deep: internals, edge cases, trade-offs and performance characteristics."
        }
    };
    format!(
        "Explain the following technical concept.\n\n\
         Concept: {}\nMode: {}\n{}\nInclude code examples: {}\nInclude analogies: {}{}",
        concept,
        mode,
        depth,
        include_examples,
        include_analogies,
        context_block(context)
    )
}

pub fn seo_prompt(content: &str, keywords: &[String], target_audience: &str) -> String {
    let keywords = if keywords.is_empty() {
        "auto-detect".to_string()
    } else {
        keywords.join(", ")
    };
    format!(
        "Analyze the following content for SEO.\n\n\
         Content:\n{}\n\nTarget keywords: {}\nTarget audience: {}\n\n\
         Suggestion types are keyword, structure, readability or linking; priorities are high, medium or low.",
        excerpt(content, SEO_EXCERPT_CHARS),
        keywords,
        target_audience
    )
}

pub fn review_prompt(title: &str, topic: &str, target_audience: &str, content: &str) -> String {
    format!(
        "Review this blog post draft.\n\n\
         Title: {}\nTopic: {}\nTarget audience: {}\n\nContent:\n{}\n\n\
         Evaluate accuracy and structure, fit for the audience, gaps, and tone. \
         Score 1-10 and set needs_revision when the draft should be rewritten.",
        title,
        topic,
        target_audience,
        excerpt(content, REVIEW_EXCERPT_CHARS)
    )
}
