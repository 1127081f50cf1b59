//! Seams for the renderer collaborator.
//!
//! Layout and styling live outside this crate. What the lifecycle needs to know is
//! where the code blocks of an assistant reply are, so their copy action can target
//! them; [`parse_segments`] provides that split for any concrete [`Renderer`].

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub code: String,
    pub language: Option<String>,
}

impl CodeBlock {
    /// Text placed on the clipboard by the code block copy action.
    pub fn copy_text(&self) -> &str {
        self.code.trim_end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Prose(String),
    InlineCode(String),
    CodeBlock(CodeBlock),
}

/// Turns message text into something displayable.
pub trait Renderer {
    type Output;

    fn render(&self, text: &str, is_user_turn: bool) -> Self::Output;
}

/// Presents one fenced code block and exposes its copy action.
pub trait CodePresenter {
    type Output;

    fn present(&self, index: usize, block: &CodeBlock) -> Self::Output;
}

/// Splits assistant markdown into prose, inline code spans, and code blocks.
pub fn parse_segments(text: &str) -> Vec<Segment> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let mut segments = Vec::new();
    let mut prose = String::new();
    let mut code: Option<CodeBlock> = None;

    for event in Parser::new_ext(text, options) {
        if let Some(block) = code.as_mut() {
            match event {
                Event::Text(chunk) => block.code.push_str(&chunk),
                Event::End(TagEnd::CodeBlock) => {
                    if let Some(block) = code.take() {
                        segments.push(Segment::CodeBlock(block));
                    }
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                flush_prose(&mut prose, &mut segments, true);
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_string)
                        .filter(|language| !language.is_empty()),
                    CodeBlockKind::Indented => None,
                };
                code = Some(CodeBlock {
                    code: String::new(),
                    language,
                });
            }
            Event::Code(span) => {
                flush_prose(&mut prose, &mut segments, false);
                segments.push(Segment::InlineCode(span.to_string()));
            }
            Event::Text(chunk) | Event::Html(chunk) => prose.push_str(&chunk),
            Event::SoftBreak | Event::HardBreak => prose.push('\n'),
            Event::Start(Tag::Item) => prose.push_str("- "),
            Event::End(TagEnd::Item) => prose.push('\n'),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::List(_)) => {
                prose.push_str("\n\n")
            }
            Event::Rule => prose.push_str("---\n\n"),
            _ => {}
        }
    }

    // An unterminated fence still counts as a block.
    if let Some(block) = code.take() {
        segments.push(Segment::CodeBlock(block));
    }
    flush_prose(&mut prose, &mut segments, true);
    segments
}

/// Code blocks of `text`, in order. Indexes match [`crate::CopyTarget::CodeBlock`].
pub fn code_blocks(text: &str) -> Vec<CodeBlock> {
    parse_segments(text)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::CodeBlock(block) => Some(block),
            Segment::Prose(_) | Segment::InlineCode(_) => None,
        })
        .collect()
}

fn flush_prose(prose: &mut String, segments: &mut Vec<Segment>, block_boundary: bool) {
    let mut text = std::mem::take(prose);
    if block_boundary {
        let trimmed = text.trim_end().len();
        text.truncate(trimmed);
    }
    if !text.trim().is_empty() {
        segments.push(Segment::Prose(text));
    }
}
