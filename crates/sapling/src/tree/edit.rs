use super::length::{Length, Point};
use super::subtree::{Child, Subtree};

/// A description of a change to the source text, in old and new coordinates.
///
/// `start` is where the change begins; `old_end` is where the replaced text
/// ended before the change and `new_end` where the replacement ends after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEdit {
    /// Byte offset where the edit starts.
    pub start_byte: usize,
    /// Byte offset where the replaced text ended.
    pub old_end_byte: usize,
    /// Byte offset where the new text ends.
    pub new_end_byte: usize,
    /// Position where the edit starts.
    pub start_position: Point,
    /// Position where the replaced text ended.
    pub old_end_position: Point,
    /// Position where the new text ends.
    pub new_end_position: Point,
}

impl InputEdit {
    /// Describes replacing `old_text[start..old_end]` with `replacement`.
    ///
    /// Positions are computed from the text, so `start` and `old_end` must be
    /// on character boundaries of `old_text`.
    #[must_use]
    pub fn replace(old_text: &str, start: usize, old_end: usize, replacement: &str) -> Self {
        let start_length = Length::of(&old_text[..start]);
        let old_end_length = Length::of(&old_text[..old_end]);
        let new_end_length = start_length + Length::of(replacement);
        Self {
            start_byte: start,
            old_end_byte: old_end,
            new_end_byte: new_end_length.bytes,
            start_position: start_length.extent,
            old_end_position: old_end_length.extent,
            new_end_position: new_end_length.extent,
        }
    }
}

/// An edit in the coordinate space of one subtree (relative to its padding start).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Edit {
    pub start: Length,
    pub old_end: Length,
    pub new_end: Length,
}

impl From<&InputEdit> for Edit {
    fn from(edit: &InputEdit) -> Self {
        Self {
            start: Length {
                bytes: edit.start_byte,
                extent: edit.start_position,
            },
            old_end: Length {
                bytes: edit.old_end_byte,
                extent: edit.old_end_position,
            },
            new_end: Length {
                bytes: edit.new_end_byte,
                extent: edit.new_end_position,
            },
        }
    }
}

/// Returns `subtree` with `edit` applied.
///
/// Only the subtrees the edit touches are copied; they are marked as changed.
/// Every other subtree is shared with the input.
pub(crate) fn edit_subtree(subtree: &Subtree, edit: Edit) -> Subtree {
    let mut data = subtree.data().clone();
    let padding = data.padding;
    let total_size = padding + data.size;
    let is_pure_insertion = edit.old_end.bytes == edit.start.bytes;

    if edit.old_end.bytes <= padding.bytes {
        // Entirely in the whitespace before the node
        data.padding = edit.new_end + (padding - edit.old_end);
    } else if edit.start.bytes < padding.bytes {
        // Starts in the whitespace and runs into the node
        data.size = data.size.saturating_sub(edit.old_end - padding);
        data.padding = edit.new_end;
    } else if edit.start.bytes < total_size.bytes
        || (edit.start.bytes == total_size.bytes && is_pure_insertion)
    {
        data.size = (edit.new_end - padding) + total_size.saturating_sub(edit.old_end);
    }
    data.has_changes = true;

    let mut edit = edit;
    let mut child_right = Length::ZERO;
    let mut children = Vec::with_capacity(data.children.len());
    for (index, child) in data.children.iter().enumerate() {
        let child_left = child_right;
        child_right = child_left + child.subtree.total_size();

        let before_edit =
            child_right.bytes + child.subtree.lookahead_bytes() < edit.start.bytes;
        let after_edit = child_left.bytes > edit.old_end.bytes
            || (child_left.bytes == edit.old_end.bytes
                && child.subtree.size().bytes > 0
                && index > 0);
        if before_edit || after_edit {
            children.push(child.clone());
            continue;
        }

        let mut child_edit = Edit {
            start: edit.start - child_left,
            old_end: edit.old_end - child_left,
            new_end: edit.new_end - child_left,
        };

        // Inserted text belongs to the first child the edit touches; later
        // children only shrink.
        if child_right.bytes > edit.start.bytes
            || (child_right.bytes == edit.start.bytes && is_pure_insertion)
        {
            edit.new_end = edit.start;
        } else {
            child_edit.old_end = child_edit.start;
            child_edit.new_end = child_edit.start;
        }

        children.push(Child {
            field: child.field,
            alias: child.alias,
            subtree: edit_subtree(&child.subtree, child_edit),
        });
    }
    data.children = children;
    Subtree::from_data(data)
}
