use std::collections::BTreeSet;

use chatline_chat::{CodeBlock, CodePresenter, Renderer, Segment, parse_segments};

/// Frames one fenced block and labels it with the index its copy action uses.
#[derive(Debug, Clone, Default)]
pub struct TerminalCodePresenter {
    copied: BTreeSet<usize>,
}

impl TerminalCodePresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the listed block indices as just copied.
    pub fn with_copied(copied: impl IntoIterator<Item = usize>) -> Self {
        Self {
            copied: copied.into_iter().collect(),
        }
    }
}

impl CodePresenter for TerminalCodePresenter {
    type Output = String;

    fn present(&self, index: usize, block: &CodeBlock) -> String {
        let language = block.language.as_deref().unwrap_or("text");
        let status = if self.copied.contains(&index) {
            "copied"
        } else {
            "copy"
        };

        let mut framed = format!("  ┌─ block {index} · {language} · {status}\n");
        for line in block.code.trim_end().lines() {
            framed.push_str("  │ ");
            framed.push_str(line);
            framed.push('\n');
        }
        framed.push_str("  └─\n");
        framed
    }
}

#[derive(Debug, Clone, Default)]
pub struct TerminalRenderer {
    presenter: TerminalCodePresenter,
}

impl TerminalRenderer {
    pub fn new(presenter: TerminalCodePresenter) -> Self {
        Self { presenter }
    }
}

impl Renderer for TerminalRenderer {
    type Output = String;

    fn render(&self, text: &str, is_user_turn: bool) -> String {
        if is_user_turn {
            return text.to_string();
        }

        let mut rendered = String::new();
        let mut block_index = 0;
        for segment in parse_segments(text) {
            match segment {
                Segment::Prose(prose) => rendered.push_str(&prose),
                Segment::InlineCode(code) => {
                    rendered.push('`');
                    rendered.push_str(&code);
                    rendered.push('`');
                }
                Segment::CodeBlock(block) => {
                    if !rendered.is_empty() && !rendered.ends_with('\n') {
                        rendered.push('\n');
                    }
                    rendered.push_str(&self.presenter.present(block_index, &block));
                    block_index += 1;
                }
            }
        }

        rendered.trim_end().to_string()
    }
}
