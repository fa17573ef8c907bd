use super::length::Length;
use crate::language::{AliasId, FieldId, Language, ProductionId, Symbol};
use std::sync::Arc;

/// A child edge: the subtree plus the field and alias its production gave it.
#[derive(Debug, Clone)]
pub(crate) struct Child {
    pub field: Option<FieldId>,
    pub alias: Option<AliasId>,
    pub subtree: Subtree,
}

impl Child {
    pub fn plain(subtree: Subtree) -> Self {
        Self {
            field: None,
            alias: None,
            subtree,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SubtreeData {
    pub symbol: Symbol,
    /// Whitespace before the node.
    pub padding: Length,
    pub size: Length,
    /// How many bytes past the node's end were examined while building it.
    pub lookahead_bytes: usize,
    pub children: Vec<Child>,
    /// Lexical mode the first leaf was lexed in.
    pub lex_mode: usize,
    pub first_leaf: Symbol,
    pub production: Option<ProductionId>,
    pub extra: bool,
    pub missing: bool,
    pub has_changes: bool,
    pub has_error: bool,
    /// The character an `ERROR` leaf could not lex.
    pub unexpected: Option<char>,
}

/// An immutable, reference-counted syntax node.
///
/// Subtrees are positioned relatively: each stores only its padding and
/// size, so an unchanged subtree can be shared by trees that place it at
/// different offsets.
#[derive(Debug, Clone)]
pub(crate) struct Subtree(Arc<SubtreeData>);

impl Subtree {
    pub fn leaf(
        symbol: Symbol,
        padding: Length,
        size: Length,
        lookahead_bytes: usize,
        lex_mode: usize,
    ) -> Self {
        Self(Arc::new(SubtreeData {
            symbol,
            padding,
            size,
            lookahead_bytes,
            children: Vec::new(),
            lex_mode,
            first_leaf: symbol,
            production: None,
            extra: false,
            missing: false,
            has_changes: false,
            has_error: symbol == Symbol::ERROR,
            unexpected: None,
        }))
    }

    /// A leaf standing for a character the lexer could not recognise.
    pub fn unexpected(
        character: char,
        padding: Length,
        size: Length,
        lex_mode: usize,
    ) -> Self {
        let mut data = Self::leaf(Symbol::ERROR, padding, size, 1, lex_mode).into_data();
        data.unexpected = Some(character);
        Self(Arc::new(data))
    }

    /// A zero-width token the parser inserted to recover from an error.
    pub fn missing(symbol: Symbol, lex_mode: usize) -> Self {
        let mut data = Self::leaf(symbol, Length::ZERO, Length::ZERO, 0, lex_mode).into_data();
        data.missing = true;
        data.has_error = true;
        Self(Arc::new(data))
    }

    /// Builds an inner node, summarising its children.
    pub fn node(symbol: Symbol, children: Vec<Child>, production: Option<ProductionId>) -> Self {
        let padding = children
            .first()
            .map_or(Length::ZERO, |c| c.subtree.padding());
        let mut total = Length::ZERO;
        let mut lookahead_end = 0;
        for child in &children {
            total = total + child.subtree.total_size();
            lookahead_end = lookahead_end.max(total.bytes + child.subtree.lookahead_bytes());
        }
        let (first_leaf, lex_mode) = children.first().map_or((symbol, 0), |c| {
            (c.subtree.first_leaf(), c.subtree.lex_mode())
        });
        let has_error = symbol == Symbol::ERROR || children.iter().any(|c| c.subtree.has_error());

        Self(Arc::new(SubtreeData {
            symbol,
            padding,
            size: total - padding,
            lookahead_bytes: lookahead_end - total.bytes,
            children,
            lex_mode,
            first_leaf,
            production,
            extra: false,
            missing: false,
            has_changes: false,
            has_error,
            unexpected: None,
        }))
    }

    /// An `ERROR` node wrapping skipped or abandoned input.
    pub fn error(children: Vec<Subtree>) -> Self {
        let children = children.into_iter().map(Child::plain).collect();
        Self::node(Symbol::ERROR, children, None).into_extra()
    }

    fn into_data(self) -> SubtreeData {
        Arc::try_unwrap(self.0).unwrap_or_else(|shared| (*shared).clone())
    }

    pub fn from_data(data: SubtreeData) -> Self {
        Self(Arc::new(data))
    }

    pub fn data(&self) -> &SubtreeData {
        &self.0
    }

    /// A copy marked as an extra.
    #[must_use]
    pub fn into_extra(self) -> Self {
        if self.0.extra {
            return self;
        }
        let mut data = self.into_data();
        data.extra = true;
        Self(Arc::new(data))
    }

    /// Covers at least `bytes` past the end, for nodes whose last reduction
    /// depended on the token that followed them.
    #[must_use]
    pub fn with_lookahead_bytes(self, bytes: usize) -> Self {
        if bytes <= self.0.lookahead_bytes {
            return self;
        }
        let mut data = self.into_data();
        data.lookahead_bytes = bytes;
        Self(Arc::new(data))
    }

    pub fn symbol(&self) -> Symbol {
        self.0.symbol
    }

    pub fn padding(&self) -> Length {
        self.0.padding
    }

    pub fn size(&self) -> Length {
        self.0.size
    }

    pub fn total_size(&self) -> Length {
        self.0.padding + self.0.size
    }

    pub fn lookahead_bytes(&self) -> usize {
        self.0.lookahead_bytes
    }

    pub fn children(&self) -> &[Child] {
        &self.0.children
    }

    pub fn lex_mode(&self) -> usize {
        self.0.lex_mode
    }

    pub fn first_leaf(&self) -> Symbol {
        self.0.first_leaf
    }

    pub fn production(&self) -> Option<ProductionId> {
        self.0.production
    }

    pub fn is_leaf(&self) -> bool {
        self.0.children.is_empty() && self.0.production.is_none()
    }

    pub fn is_extra(&self) -> bool {
        self.0.extra
    }

    pub fn is_missing(&self) -> bool {
        self.0.missing
    }

    pub fn has_changes(&self) -> bool {
        self.0.has_changes
    }

    pub fn has_error(&self) -> bool {
        self.0.has_error
    }

    pub fn unexpected_char(&self) -> Option<char> {
        self.0.unexpected
    }

    pub fn ptr_eq(&self, other: &Subtree) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// A stable identity for the shared allocation.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Whether the node appears in the visible tree when reached through
    /// an edge carrying `alias`.
    pub fn is_visible(&self, language: &Language, alias: Option<AliasId>) -> bool {
        alias.is_some() || language.node_kind_is_visible(self.0.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(text_padding: &str, text: &str) -> Subtree {
        Subtree::leaf(Symbol(2), Length::of(text_padding), Length::of(text), 1, 0)
    }

    #[test]
    fn test_node_summarises_children() {
        let node = Subtree::node(
            Symbol(5),
            vec![
                Child::plain(leaf("  ", "ab")),
                Child::plain(leaf("\n", "cd")),
            ],
            Some(0),
        );
        assert_eq!(node.padding(), Length::of("  "));
        assert_eq!(node.size(), Length::of("ab\ncd"));
        assert_eq!(node.total_size(), Length::of("  ab\ncd"));
        assert_eq!(node.lookahead_bytes(), 1);
        assert_eq!(node.first_leaf(), Symbol(2));
        assert!(!node.has_error());
    }

    #[test]
    fn test_errors_propagate() {
        let missing = Subtree::missing(Symbol(3), 0);
        let node = Subtree::node(
            Symbol(5),
            vec![Child::plain(leaf("", "a")), Child::plain(missing)],
            Some(0),
        );
        assert!(node.has_error());
        let wrapped = Subtree::error(vec![leaf("", "x")]);
        assert!(wrapped.is_extra() && wrapped.has_error());
    }

    #[test]
    fn test_copies_do_not_disturb_shared_nodes() {
        let original = leaf("", "a");
        let shared = original.clone();
        let extra = shared.into_extra();
        assert!(extra.is_extra());
        assert!(!original.is_extra());
        assert!(!extra.ptr_eq(&original));
    }
}
