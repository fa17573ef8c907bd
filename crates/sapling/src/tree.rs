//! Persistent syntax trees.
//!
//! A [`Tree`] is a handle on an immutable root [`Subtree`] plus the
//! [`Language`] it was parsed with. Subtrees are reference counted and store
//! only relative sizes, so editing a tree copies the path from the root to
//! the edited region and shares everything else with the previous version.
//! The parser relies on that sharing: unchanged subtrees of an edited tree
//! are pushed whole instead of being re-lexed and re-reduced.

mod edit;
mod length;
mod node;
mod subtree;

pub use edit::InputEdit;
pub use length::{Length, Point};
pub use node::Node;

pub(crate) use subtree::{Child, Subtree};

use crate::language::Language;
use std::collections::HashSet;
use std::ops::Range;

/// The result of a parse.
///
/// Cloning a tree is cheap; clones share all their nodes.
#[derive(Debug, Clone)]
pub struct Tree {
    root: Subtree,
    language: Language,
}

impl Tree {
    pub(crate) fn new(root: Subtree, language: Language) -> Self {
        Self { root, language }
    }

    pub(crate) fn root(&self) -> &Subtree {
        &self.root
    }

    /// The root node.
    #[must_use]
    pub fn root_node(&self) -> Node<'_> {
        Node::new(self, &self.root, Length::ZERO, None, None)
    }

    /// The language the tree was parsed with.
    #[must_use]
    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Adjusts the tree for an edit of its source text.
    ///
    /// Nodes the edit touches keep their kind but are marked as changed and
    /// resized; nodes after it are shifted. Pass the edited tree to
    /// [`Parser::parse`](crate::parser::Parser::parse) along with the new text
    /// to bring it back in sync.
    pub fn edit(&mut self, edit: &InputEdit) {
        tracing::trace!(
            start = edit.start_byte,
            old_end = edit.old_end_byte,
            new_end = edit.new_end_byte,
            "editing tree"
        );
        self.root = edit::edit_subtree(&self.root, edit.into());
    }

    /// Byte ranges, in this tree's coordinates, covered by tokens that this
    /// tree does not share with `old`.
    ///
    /// After an incremental parse these are the regions that were re-lexed.
    /// Overlapping and adjacent ranges are merged.
    #[must_use]
    pub fn changed_ranges(&self, old: &Tree) -> Vec<Range<usize>> {
        let mut shared = HashSet::new();
        collect_ids(&old.root, &mut shared);

        let mut ranges: Vec<Range<usize>> = Vec::new();
        collect_changes(&self.root, Length::ZERO, &shared, &mut ranges);

        let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
                _ => merged.push(range),
            }
        }
        merged
    }
}

fn collect_ids(subtree: &Subtree, ids: &mut HashSet<usize>) {
    ids.insert(subtree.id());
    for child in subtree.children() {
        collect_ids(&child.subtree, ids);
    }
}

fn collect_changes(
    subtree: &Subtree,
    position: Length,
    shared: &HashSet<usize>,
    ranges: &mut Vec<Range<usize>>,
) {
    if shared.contains(&subtree.id()) {
        return;
    }
    if subtree.children().is_empty() {
        let start = position.bytes + subtree.padding().bytes;
        ranges.push(start..start + subtree.size().bytes);
        return;
    }
    let mut position = position;
    for child in subtree.children() {
        collect_changes(&child.subtree, position, shared, ranges);
        position = position + child.subtree.total_size();
    }
}
