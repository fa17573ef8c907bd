use super::length::{Length, Point};
use super::subtree::Subtree;
use super::Tree;
use crate::language::{AliasId, FieldId, Symbol};
use std::fmt;
use std::ops::Range;
use std::str::Utf8Error;

/// A visible node of a [`Tree`].
///
/// Hidden rules (names starting with `_`) and the compiler's repetition
/// helpers never appear as nodes: their children are spliced into the nearest
/// visible ancestor. A field set on a hidden rule is inherited by the visible
/// nodes it contains.
#[derive(Clone, Copy)]
pub struct Node<'tree> {
    tree: &'tree Tree,
    subtree: &'tree Subtree,
    /// Where the node's padding starts.
    position: Length,
    field: Option<FieldId>,
    alias: Option<AliasId>,
}

impl<'tree> Node<'tree> {
    pub(crate) fn new(
        tree: &'tree Tree,
        subtree: &'tree Subtree,
        position: Length,
        field: Option<FieldId>,
        alias: Option<AliasId>,
    ) -> Self {
        Self {
            tree,
            subtree,
            position,
            field,
            alias,
        }
    }

    /// The node's kind: its alias if it was reached through one, otherwise
    /// the name of its grammar symbol.
    #[must_use]
    pub fn kind(&self) -> &'tree str {
        let language = self.tree.language();
        match self.alias.and_then(|id| language.alias(id)) {
            Some(alias) => &alias.name,
            None => language.node_kind_for_id(self.subtree.symbol()).unwrap_or(""),
        }
    }

    /// The grammar symbol of the node, ignoring aliases.
    #[must_use]
    pub fn kind_id(&self) -> Symbol {
        self.subtree.symbol()
    }

    /// Whether the node is named (as opposed to a literal token like `;`).
    #[must_use]
    pub fn is_named(&self) -> bool {
        let language = self.tree.language();
        match self.alias.and_then(|id| language.alias(id)) {
            Some(alias) => alias.named,
            None => language.node_kind_is_named(self.subtree.symbol()),
        }
    }

    /// Whether the node is an `ERROR` node.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.subtree.symbol() == Symbol::ERROR
    }

    /// Whether the node was inserted by error recovery and has no text.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.subtree.is_missing()
    }

    /// Whether the node is an extra, such as a comment.
    #[must_use]
    pub fn is_extra(&self) -> bool {
        self.subtree.is_extra()
    }

    /// Whether the node is, or contains, an error or missing node.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.subtree.has_error()
    }

    /// Whether the node was touched by an edit since it was parsed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.subtree.has_changes()
    }

    /// An identifier that is equal for nodes shared between trees.
    ///
    /// After an incremental parse, a node of the new tree has the same id as
    /// a node of the old tree exactly when it was reused.
    #[must_use]
    pub fn id(&self) -> usize {
        self.subtree.id()
    }

    /// Byte offset of the node's first character.
    #[must_use]
    pub fn start_byte(&self) -> usize {
        self.start().bytes
    }

    /// Byte offset just past the node's last character.
    #[must_use]
    pub fn end_byte(&self) -> usize {
        self.end().bytes
    }

    /// Row and column of the node's first character.
    #[must_use]
    pub fn start_position(&self) -> Point {
        self.start().extent
    }

    /// Row and column just past the node's last character.
    #[must_use]
    pub fn end_position(&self) -> Point {
        self.end().extent
    }

    /// `start_byte()..end_byte()`.
    #[must_use]
    pub fn byte_range(&self) -> Range<usize> {
        self.start_byte()..self.end_byte()
    }

    fn start(&self) -> Length {
        self.position + self.subtree.padding()
    }

    fn end(&self) -> Length {
        self.start() + self.subtree.size()
    }

    /// The name of the field this node occupies in its parent, if any.
    #[must_use]
    pub fn field_name(&self) -> Option<&'tree str> {
        self.field
            .and_then(|id| self.tree.language().field_name_for_id(id))
    }

    /// Number of visible children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.visible_children().len()
    }

    /// The visible child at `index`.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<Node<'tree>> {
        self.visible_children().get(index).copied()
    }

    /// All visible children, in order.
    pub fn children(&self) -> impl Iterator<Item = Node<'tree>> {
        self.visible_children().into_iter()
    }

    /// Number of named visible children.
    #[must_use]
    pub fn named_child_count(&self) -> usize {
        self.named_children().count()
    }

    /// The named visible child at `index`, counting named children only.
    #[must_use]
    pub fn named_child(&self, index: usize) -> Option<Node<'tree>> {
        self.named_children().nth(index)
    }

    /// Named visible children, in order.
    pub fn named_children(&self) -> impl Iterator<Item = Node<'tree>> {
        self.children().filter(Node::is_named)
    }

    /// The first child in the field `name`.
    #[must_use]
    pub fn child_by_field_name(&self, name: &str) -> Option<Node<'tree>> {
        self.children_by_field_name(name).next()
    }

    /// Every child in the field `name`.
    pub fn children_by_field_name(&self, name: &str) -> impl Iterator<Item = Node<'tree>> {
        let id = self.tree.language().field_id_for_name(name);
        self.children()
            .filter(move |child| id.is_some() && child.field == id)
    }

    /// The field name of the visible child at `index`.
    #[must_use]
    pub fn field_name_for_child(&self, index: usize) -> Option<&'tree str> {
        self.child(index).and_then(|child| child.field_name())
    }

    /// The smallest node within this one that spans `start..end`.
    ///
    /// Returns `None` if this node does not span the range itself.
    #[must_use]
    pub fn descendant_for_byte_range(&self, start: usize, end: usize) -> Option<Node<'tree>> {
        if start > end || start < self.start_byte() || end > self.end_byte() {
            return None;
        }
        let mut node = *self;
        'descend: loop {
            for child in node.children() {
                let spans = child.start_byte() <= start && end <= child.end_byte();
                // An empty range on a boundary belongs to the node that starts there
                let touches = child.end_byte() > start || child.start_byte() == end;
                if spans && touches {
                    node = child;
                    continue 'descend;
                }
            }
            return Some(node);
        }
    }

    /// The node's text within `source`, the text the tree was parsed from.
    ///
    /// A node that lies outside `source` has empty text.
    ///
    /// # Errors
    ///
    /// Returns an error if the node's bytes are not valid UTF-8.
    pub fn utf8_text<'a>(&self, source: &'a [u8]) -> Result<&'a str, Utf8Error> {
        std::str::from_utf8(source.get(self.byte_range()).unwrap_or_default())
    }

    /// Renders the node as an S-expression of its named descendants, with
    /// field names, missing nodes and unexpected characters marked.
    #[must_use]
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        self.write_sexp(self.subtree, self.alias, None, true, &mut out);
        out
    }

    fn write_sexp(
        &self,
        subtree: &Subtree,
        alias: Option<AliasId>,
        field: Option<FieldId>,
        is_root: bool,
        out: &mut String,
    ) {
        let language = self.tree.language();
        let symbol = subtree.symbol();
        let (kind, named) = match alias.and_then(|id| language.alias(id)) {
            Some(alias) => (alias.name.as_str(), alias.named),
            None => (
                language.node_kind_for_id(symbol).unwrap_or(""),
                language.node_kind_is_visible(symbol) && language.node_kind_is_named(symbol),
            ),
        };
        let visible = is_root || subtree.is_missing() || named;

        if visible {
            if !out.is_empty() {
                out.push(' ');
            }
            if let Some(name) = field.and_then(|id| language.field_name_for_id(id)) {
                out.push_str(name);
                out.push_str(": ");
            }
            if let Some(character) = subtree.unexpected_char() {
                out.push_str(&format!("(UNEXPECTED {character:?}"));
            } else if subtree.is_missing() {
                if named {
                    out.push_str(&format!("(MISSING {kind}"));
                } else {
                    out.push_str(&format!("(MISSING {kind:?}"));
                }
            } else {
                out.push('(');
                out.push_str(kind);
            }
        }

        for child in subtree.children() {
            let inherited = if visible { None } else { field };
            let child_field = if child.subtree.is_extra() {
                None
            } else {
                child.field.or(inherited)
            };
            self.write_sexp(&child.subtree, child.alias, child_field, false, out);
        }

        if visible {
            out.push(')');
        }
    }

    fn visible_children(&self) -> Vec<Node<'tree>> {
        let mut children = Vec::new();
        self.collect_visible(self.subtree, self.position, None, &mut children);
        children
    }

    fn collect_visible(
        &self,
        subtree: &'tree Subtree,
        mut position: Length,
        inherited: Option<FieldId>,
        out: &mut Vec<Node<'tree>>,
    ) {
        let language = self.tree.language();
        for child in subtree.children() {
            let field = child.field.or(inherited);
            if child.subtree.is_visible(language, child.alias) {
                out.push(Node::new(self.tree, &child.subtree, position, field, child.alias));
            } else {
                self.collect_visible(&child.subtree, position, field, out);
            }
            position = position + child.subtree.total_size();
        }
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{Node {} {} - {}}}",
            self.kind(),
            self.start_position(),
            self.end_position()
        )
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.subtree.ptr_eq(other.subtree) && self.position == other.position
    }
}

impl Eq for Node<'_> {}
