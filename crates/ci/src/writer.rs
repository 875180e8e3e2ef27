//! Indentation-aware text writer for block-structured formats.
//!
//! [`BlockWriter::block`] writes a header line and returns a guard that
//! indents everything written through it. Dropping the guard restores the
//! previous depth, including when an error is returned early with `?`.
//!
//! ```ignore
//! let mut writer = BlockWriter::new(2, "#");
//! {
//!     let mut steps = writer.block("steps:");
//!     let mut step = steps.block("- task: CmdLine@2");
//!     step.line("name: CmdLine");
//! }
//! assert_eq!(writer.finish(), "steps:\n  - task: CmdLine@2\n    name: CmdLine\n");
//! ```

use crate::emitter::{EmitterError, EmitterResult};
use crate::ir::InputValue;
use std::ops::{Deref, DerefMut};

/// Line writer with a current depth, an indent width and a comment marker
#[derive(Debug)]
pub struct BlockWriter {
    buffer: String,
    depth: usize,
    indent_width: usize,
    comment_prefix: &'static str,
}

impl BlockWriter {
    /// Writer at depth zero
    #[must_use]
    pub const fn new(indent_width: usize, comment_prefix: &'static str) -> Self {
        Self {
            buffer: String::new(),
            depth: 0,
            indent_width,
            comment_prefix,
        }
    }

    /// Current nesting depth
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Write one line at the current depth. Empty text writes a bare newline.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            let width = self.depth * self.indent_width;
            self.buffer.extend(std::iter::repeat_n(' ', width));
            self.buffer.push_str(text);
        }
        self.buffer.push('\n');
    }

    /// Write an empty line
    pub fn blank(&mut self) {
        self.buffer.push('\n');
    }

    /// Write a comment line using the configured marker
    pub fn comment(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            let prefix = self.comment_prefix;
            self.line(prefix);
        } else {
            let line = format!("{} {text}", self.comment_prefix);
            self.line(line);
        }
    }

    /// Write `header`, then indent until the returned guard is dropped
    pub fn block(&mut self, header: impl AsRef<str>) -> Block<'_> {
        self.line(header);
        self.depth += 1;
        Block { writer: self }
    }

    /// Write `key: value` for scalars, or `key:` followed by the value's
    /// YAML form one level deeper.
    ///
    /// # Errors
    ///
    /// Returns [`EmitterError::Serialization`] if the value cannot be
    /// serialized.
    pub fn yaml_entry(&mut self, key: &str, value: &InputValue) -> EmitterResult<()> {
        if value.is_scalar() {
            // Multi-line strings come back as block literals; continuation
            // lines keep their own indent relative to the key.
            let scalar = yaml_scalar(value)?;
            let mut lines = scalar.lines();
            let first = lines.next().unwrap_or_default();
            self.line(format!("{key}: {first}"));
            for line in lines {
                self.line(line);
            }
            return Ok(());
        }

        let mut block = self.block(format!("{key}:"));
        block.yaml_lines(value)
    }

    /// Write the YAML form of `value` line by line at the current depth.
    ///
    /// # Errors
    ///
    /// Returns [`EmitterError::Serialization`] if the value cannot be
    /// serialized.
    pub fn yaml_lines(&mut self, value: &InputValue) -> EmitterResult<()> {
        let text = to_yaml(value)?;
        for line in text.lines() {
            self.line(line);
        }
        Ok(())
    }

    /// Consume the writer, returning the text
    #[must_use]
    pub fn finish(self) -> String {
        self.buffer
    }
}

/// Scope guard returned by [`BlockWriter::block`]
#[derive(Debug)]
pub struct Block<'a> {
    writer: &'a mut BlockWriter,
}

impl Deref for Block<'_> {
    type Target = BlockWriter;

    fn deref(&self) -> &Self::Target {
        self.writer
    }
}

impl DerefMut for Block<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.writer
    }
}

impl Drop for Block<'_> {
    fn drop(&mut self) {
        self.writer.depth = self.writer.depth.saturating_sub(1);
    }
}

fn to_yaml(value: &InputValue) -> EmitterResult<String> {
    serde_yaml::to_string(value).map_err(|e| EmitterError::Serialization(e.to_string()))
}

/// Render a scalar the way YAML needs it (quoted only when ambiguous).
///
/// # Errors
///
/// Returns [`EmitterError::Serialization`] if the value cannot be serialized.
pub fn yaml_scalar(value: &InputValue) -> EmitterResult<String> {
    Ok(to_yaml(value)?.trim_end().to_string())
}

/// Wrap text in single quotes, doubling embedded quotes
#[must_use]
pub fn single_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
