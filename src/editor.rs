use crate::error::EditError;
use crate::reference::Reference;

/// Byte range of the caret or selection in the editor buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn cursor(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub fn clamp(self, len: usize) -> Self {
        Self::new(self.start.min(len), self.end.min(len))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextChange {
    pub start: usize,
    pub end: usize,
    pub insert: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub text_changed: bool,
    pub revision: u64,
}

/// Raw content of the open note plus the caret, in byte offsets.
///
/// `revision` increases on every content change; the autosave and render
/// paths key off it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditorBuffer {
    pub text: String,
    pub selection: Selection,
    pub revision: u64,
}

impl EditorBuffer {
    pub fn new(text: String) -> Self {
        let len = text.len();
        Self {
            text,
            selection: Selection::cursor(len),
            revision: 0,
        }
    }

    /// Records what the textarea now holds after user typing.
    pub fn replace_from_input(&mut self, new_text: String, selection: Selection) -> ApplyOutcome {
        let text_changed = self.text != new_text;
        self.selection = selection.clamp(new_text.len());
        self.text = new_text;
        if text_changed {
            self.revision += 1;
        }
        ApplyOutcome {
            text_changed,
            revision: self.revision,
        }
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<(), EditError> {
        check_range(&self.text, selection.start, selection.end)?;
        self.selection = selection;
        Ok(())
    }

    /// Surrounds the selection with `prefix` and `suffix`. The selection
    /// keeps covering the same text afterwards.
    pub fn insert_text(&mut self, prefix: &str, suffix: &str) -> Result<ApplyOutcome, EditError> {
        let Selection { start, end } = self.selection;
        check_range(&self.text, start, end)?;

        let mut insert = String::with_capacity(prefix.len() + (end - start) + suffix.len());
        insert.push_str(prefix);
        insert.push_str(&self.text[start..end]);
        insert.push_str(suffix);
        let outcome = self.apply(TextChange { start, end, insert })?;
        self.selection = Selection::new(start + prefix.len(), end + prefix.len());
        Ok(outcome)
    }

    /// Inserts the token for `reference` at the caret, replacing any selection.
    pub fn insert_reference(&mut self, reference: &Reference) -> Result<ApplyOutcome, EditError> {
        let Selection { start, end } = self.selection;
        let token = reference.token();
        let caret = start + token.len();
        let outcome = self.apply(TextChange {
            start,
            end,
            insert: token,
        })?;
        self.selection = Selection::cursor(caret);
        Ok(outcome)
    }

    fn apply(&mut self, change: TextChange) -> Result<ApplyOutcome, EditError> {
        check_range(&self.text, change.start, change.end)?;
        let mut next = String::with_capacity(self.text.len() + change.insert.len());
        next.push_str(&self.text[..change.start]);
        next.push_str(&change.insert);
        next.push_str(&self.text[change.end..]);

        let text_changed = next != self.text;
        self.text = next;
        if text_changed {
            self.revision += 1;
        }
        Ok(ApplyOutcome {
            text_changed,
            revision: self.revision,
        })
    }
}

fn check_range(text: &str, start: usize, end: usize) -> Result<(), EditError> {
    if start > end || end > text.len() {
        return Err(EditError::InvalidRange {
            start,
            end,
            len: text.len(),
        });
    }
    for offset in [start, end] {
        if !text.is_char_boundary(offset) {
            return Err(EditError::NotCharBoundary { offset });
        }
    }
    Ok(())
}

/// Converts a DOM selection offset (UTF-16 code units) into a byte offset.
pub fn utf16_to_byte(text: &str, utf16_offset: usize) -> usize {
    let mut units = 0;
    for (byte, c) in text.char_indices() {
        if units >= utf16_offset {
            return byte;
        }
        units += c.len_utf16();
    }
    text.len()
}

/// Converts a byte offset into the UTF-16 offset the DOM expects.
pub fn byte_to_utf16(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset.min(text.len())]
        .chars()
        .map(char::len_utf16)
        .sum()
}
