//! Greedy packing of memories into a character budget.
//!
//! The budget is `max_tokens * 4` characters. Candidates are taken in the order
//! given; the first block that does not fit stops packing for good. Blocks are
//! never truncated, so the output is always a run of whole blocks.

use crate::memory::types::Memory;

/// Returned when no block was packed.
pub const EMPTY_CONTEXT: &str = "No memories stored yet.";

/// Fixed characters-per-token ratio used to turn a token budget into characters.
pub const CHARS_PER_TOKEN: usize = 4;

/// Render one memory as `## CATEGORY: Title [tags]\ncontent\n\n`.
pub fn format_block(memory: &Memory) -> String {
    let tags = if memory.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", memory.tags.join(", "))
    };
    format!(
        "## {}: {}{}\n{}\n\n",
        memory.category.as_str().to_uppercase(),
        memory.title,
        tags,
        memory.content
    )
}

/// Accumulates formatted blocks until the first one that would overflow.
#[derive(Debug)]
pub struct ContextPacker {
    max_chars: usize,
    used: usize,
    output: String,
    exhausted: bool,
}

impl ContextPacker {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_chars: max_tokens.saturating_mul(CHARS_PER_TOKEN),
            used: 0,
            output: String::new(),
            exhausted: false,
        }
    }

    /// Try to append `memory`. Returns `false` once the budget has tripped;
    /// every later call is refused too.
    pub fn offer(&mut self, memory: &Memory) -> bool {
        if self.exhausted {
            return false;
        }
        let block = format_block(memory);
        let len = block.chars().count();
        if self.used + len > self.max_chars {
            self.exhausted = true;
            return false;
        }
        self.output.push_str(&block);
        self.used += len;
        true
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Characters packed so far.
    pub fn used(&self) -> usize {
        self.used
    }

    /// The packed text, or [`EMPTY_CONTEXT`] if nothing fit.
    pub fn finish(self) -> String {
        if self.output.is_empty() {
            EMPTY_CONTEXT.to_string()
        } else {
            self.output
        }
    }
}
