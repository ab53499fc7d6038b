//! Content streams as a tree of nested operator scopes.
//!
//! `q`/`Q`, `BT`/`ET`, `BDC`|`BMC`/`EMC` and `BX`/`EX` open and close scopes;
//! every other operator is a leaf of the scope it appears in. The tree lives
//! in an arena owned by [`OperatorGraph`]; node 0 is the root and stands for
//! the whole stream.

use log::warn;

use crate::keyword::{self, Keyword, KeywordClass, KeywordId, KeywordInfo};
use crate::tokenizer::{Token, Tokenizer};
use crate::writer::Writer;
use crate::{ContentStreamError, Error, Object, Result};

/// A keyword together with the operands written before it.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordInstance {
    pub keyword: Keyword,
    pub operands: Vec<Object>,
}

impl KeywordInstance {
    pub fn new<K: Into<Keyword>>(keyword: K, operands: Vec<Object>) -> Self {
        KeywordInstance {
            keyword: keyword.into(),
            operands,
        }
    }

    pub fn info(&self) -> &'static KeywordInfo {
        self.keyword.info()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperatorNode {
    /// Leaf operator or opening operator of a scope; unset only on the root.
    pub open: Option<KeywordInstance>,
    /// Closing operator, set once the scope has been closed.
    pub close: Option<KeywordInstance>,
    children: Vec<NodeId>,
}

impl OperatorNode {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_scope(&self) -> bool {
        self.open
            .as_ref()
            .is_some_and(|open| open.info().class == KeywordClass::Opening)
    }

    /// Keyword that has to close this node, `None` for leaves and the root.
    fn expected_close(&self) -> Option<KeywordId> {
        self.open.as_ref().and_then(|open| open.info().close)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperatorGraph {
    nodes: Vec<OperatorNode>,
}

impl Default for OperatorGraph {
    fn default() -> Self {
        OperatorGraph::new()
    }
}

/// Step of a depth-first walk, see [`OperatorGraph::traverse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Enter(NodeId),
    Leave(NodeId),
}

impl OperatorGraph {
    /// Graph holding only the root.
    pub fn new() -> Self {
        OperatorGraph {
            nodes: vec![OperatorNode::default()],
        }
    }

    pub fn parse(content: &[u8]) -> Result<Self> {
        OperatorGraph::from_tokenizer(Tokenizer::new(content))
    }

    pub fn from_tokenizer(tokenizer: Tokenizer) -> Result<Self> {
        GraphBuilder::new(tokenizer).build()
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &OperatorNode {
        &self.nodes[id.0]
    }

    /// Keyword slots of a node may be edited; its children only change through the push helpers.
    pub fn node_mut(&mut self, id: NodeId) -> &mut OperatorNode {
        &mut self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Number of nodes, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &OperatorNode)> {
        self.nodes.iter().enumerate().map(|(index, node)| (NodeId(index), node))
    }

    /// Append a standalone operator as last child of `parent`.
    pub fn push_leaf(&mut self, parent: NodeId, instance: KeywordInstance) -> Result<NodeId> {
        if instance.info().class != KeywordClass::Standalone {
            return Err(wrong_class(&instance, "leaf"));
        }
        self.check_parent(parent)?;
        Ok(self.add_child(parent, instance))
    }

    /// Append a scope as last child of `parent`, closed with the operator its opening keyword names.
    pub fn push_scope(&mut self, parent: NodeId, instance: KeywordInstance) -> Result<NodeId> {
        let Some(close) = instance.info().close else {
            return Err(wrong_class(&instance, "scope"));
        };
        self.check_parent(parent)?;
        let id = self.add_child(parent, instance);
        self.nodes[id.0].close = Some(KeywordInstance::new(close, Vec::new()));
        Ok(id)
    }

    fn check_parent(&self, parent: NodeId) -> Result<()> {
        match self.nodes.get(parent.0) {
            Some(node) if parent == self.root() || node.is_scope() => Ok(()),
            _ => Err(Error::InternalLogic("parent node is not a scope")),
        }
    }

    fn add_child(&mut self, parent: NodeId, instance: KeywordInstance) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(OperatorNode {
            open: Some(instance),
            close: None,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Depth-first walk from the root, entering each node before its children and leaving it after them.
    pub fn traverse(&self) -> Traversal<'_> {
        Traversal {
            graph: self,
            stack: Vec::new(),
            started: false,
        }
    }

    /// Content stream text for the tree, one operator per line.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        for visit in self.traverse() {
            match visit {
                Visit::Enter(id) => {
                    if let Some(open) = &self.node(id).open {
                        Writer::write_operation(&mut buffer, open)?;
                    }
                }
                Visit::Leave(id) => {
                    let node = self.node(id);
                    match &node.close {
                        Some(close) => Writer::write_operation(&mut buffer, close)?,
                        None if node.is_scope() => return Err(Error::InternalLogic("scope was never closed")),
                        None => {}
                    }
                }
            }
        }
        Ok(buffer)
    }
}

fn wrong_class(instance: &KeywordInstance, expected: &'static str) -> Error {
    ContentStreamError::WrongKeywordClass {
        keyword: instance.keyword.to_string(),
        expected,
    }
    .into()
}

pub struct Traversal<'g> {
    graph: &'g OperatorGraph,
    /// Open nodes with the index of the next child to enter.
    stack: Vec<(NodeId, usize)>,
    started: bool,
}

impl Iterator for Traversal<'_> {
    type Item = Visit;

    fn next(&mut self) -> Option<Visit> {
        if !self.started {
            self.started = true;
            self.stack.push((self.graph.root(), 0));
            return Some(Visit::Enter(self.graph.root()));
        }
        let (id, next_child) = self.stack.last_mut()?;
        let id = *id;
        match self.graph.children(id).get(*next_child) {
            Some(&child) => {
                *next_child += 1;
                self.stack.push((child, 0));
                Some(Visit::Enter(child))
            }
            None => {
                self.stack.pop();
                Some(Visit::Leave(id))
            }
        }
    }
}

struct GraphBuilder<'a> {
    graph: OperatorGraph,
    tokenizer: Tokenizer<'a>,
    /// Open scopes, root first.
    stack: Vec<NodeId>,
    operands: Vec<Object>,
    token_index: usize,
}

impl<'a> GraphBuilder<'a> {
    fn new(tokenizer: Tokenizer<'a>) -> Self {
        let graph = OperatorGraph::new();
        let root = graph.root();
        GraphBuilder {
            graph,
            tokenizer,
            stack: vec![root],
            operands: Vec::new(),
            token_index: 0,
        }
    }

    fn build(mut self) -> Result<OperatorGraph> {
        while let Some(token) = self.tokenizer.next_token()? {
            self.token_index += 1;
            match token {
                Token::Object(object) => self.operands.push(object),
                Token::InlineImage(image) => {
                    self.reject_operands("BI")?;
                    let instance = KeywordInstance::new(KeywordId::BeginInlineImage, vec![Object::Stream(image)]);
                    let parent = self.top();
                    self.graph.add_child(parent, instance);
                }
                Token::Keyword(text) => {
                    let info = keyword::lookup(&text);
                    match info.class {
                        KeywordClass::Standalone => self.leaf(text, info)?,
                        KeywordClass::Opening => self.open(info),
                        KeywordClass::Closing => self.close(info)?,
                    }
                }
            }
        }

        if !self.operands.is_empty() {
            return Err(Error::InternalLogic("stream ended with unconsumed arguments"));
        }
        if self.stack.len() != 1 {
            return Err(Error::InternalLogic("stream failed to close all levels"));
        }
        Ok(self.graph)
    }

    fn top(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(self.graph.root())
    }

    fn leaf(&mut self, text: String, info: &'static KeywordInfo) -> Result<()> {
        let keyword = match info.id {
            KeywordId::Unknown => Keyword::Unknown(text),
            id => Keyword::Known(id),
        };
        if keyword.id() != info.id {
            return Err(Error::InternalLogic("keyword table lookup is inconsistent"));
        }
        let operands = std::mem::take(&mut self.operands);
        let parent = self.top();
        self.graph.add_child(parent, KeywordInstance::new(keyword, operands));
        Ok(())
    }

    fn open(&mut self, info: &'static KeywordInfo) {
        let operands = std::mem::take(&mut self.operands);
        let parent = self.top();
        let id = self.graph.add_child(parent, KeywordInstance::new(info.id, operands));
        self.stack.push(id);
    }

    fn close(&mut self, info: &'static KeywordInfo) -> Result<()> {
        self.reject_operands(info.text)?;
        if self.stack.len() < 2 {
            return Err(ContentStreamError::Unmatched {
                token_index: self.token_index,
                found: info.text.to_owned(),
            }
            .into());
        }

        let top = self.top();
        let expected = self.graph.node(top).expected_close();
        if expected == Some(info.id) {
            self.set_close(top, info.id);
            self.stack.pop();
            return Ok(());
        }

        let token_index = self.token_index;
        if self.swap_closes(info.id) {
            warn!(
                "fixed swapped closing operators {} at token number {}",
                info.text, token_index
            );
            return Ok(());
        }

        Err(ContentStreamError::Mismatch {
            token_index,
            found: info.text.to_owned(),
            expected: expected.map(KeywordId::as_str).unwrap_or_default().to_owned(),
            stack: self.stack_path(),
        }
        .into())
    }

    /// Accept `bad` if the next token closes the innermost scope and `bad` then closes the one around it.
    ///
    /// On failure the stack, the read position and the close slot of the innermost scope are restored.
    fn swap_closes(&mut self, bad: KeywordId) -> bool {
        let saved_stack = self.stack.clone();
        let checkpoint = self.tokenizer.checkpoint();
        let inner = self.top();

        if self.try_swap(bad) {
            return true;
        }
        self.stack = saved_stack;
        self.tokenizer.restore(checkpoint);
        self.graph.nodes[inner.0].close = None;
        false
    }

    fn try_swap(&mut self, bad: KeywordId) -> bool {
        let Ok(Some(Token::Keyword(text))) = self.tokenizer.next_token() else {
            return false;
        };
        let next = keyword::lookup(&text);
        if next.class != KeywordClass::Closing {
            return false;
        }

        let inner = self.top();
        if self.graph.node(inner).expected_close() != Some(next.id) {
            return false;
        }
        self.set_close(inner, next.id);
        self.stack.pop();

        let outer = self.top();
        if self.stack.len() < 2 || self.graph.node(outer).expected_close() != Some(bad) {
            return false;
        }
        self.set_close(outer, bad);
        self.stack.pop();
        self.token_index += 1;
        true
    }

    fn set_close(&mut self, id: NodeId, close: KeywordId) {
        self.graph.nodes[id.0].close = Some(KeywordInstance::new(close, Vec::new()));
    }

    fn reject_operands(&self, keyword: &str) -> Result<()> {
        if self.operands.is_empty() {
            return Ok(());
        }
        Err(ContentStreamError::UnexpectedOperands {
            token_index: self.token_index,
            keyword: keyword.to_owned(),
        }
        .into())
    }

    /// Opening keywords of the open scopes, outermost first.
    fn stack_path(&self) -> String {
        self.stack
            .iter()
            .filter_map(|id| self.graph.node(*id).open.as_ref())
            .map(|open| open.keyword.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(graph: &OperatorGraph, parent: NodeId) -> Vec<String> {
        graph
            .children(parent)
            .iter()
            .filter_map(|id| graph.node(*id).open.as_ref())
            .map(|open| open.keyword.to_string())
            .collect()
    }

    #[test]
    fn nested_scopes() {
        let graph = OperatorGraph::parse(b"q BT /F1 12 Tf (Hi) Tj ET Q").unwrap();
        let root = graph.root();
        assert_eq!(keywords(&graph, root), vec!["q"]);

        let q = graph.children(root)[0];
        assert_eq!(graph.node(q).close.as_ref().map(|c| c.keyword.id()), Some(KeywordId::RestoreState));
        let bt = graph.children(q)[0];
        assert_eq!(keywords(&graph, bt), vec!["Tf", "Tj"]);

        let tf = graph.node(graph.children(bt)[0]).open.as_ref().unwrap();
        assert_eq!(tf.operands, vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]);
    }

    #[test]
    fn opening_keywords_keep_operands() {
        let graph = OperatorGraph::parse(b"/Span <</MCID 2>> BDC (x) Tj EMC").unwrap();
        let bdc = graph.node(graph.children(graph.root())[0]);
        let open = bdc.open.as_ref().unwrap();
        assert_eq!(open.keyword.id(), KeywordId::BeginMarkedContentProperties);
        assert_eq!(open.operands.len(), 2);
        assert_eq!(bdc.close.as_ref().unwrap().keyword.id(), KeywordId::EndMarkedContent);
    }

    #[test]
    fn unknown_keywords_are_leaves() {
        let graph = OperatorGraph::parse(b"1 2 3 setrgbcolor q Q").unwrap();
        let first = graph.node(graph.children(graph.root())[0]).open.as_ref().unwrap();
        assert_eq!(first.keyword, Keyword::Unknown("setrgbcolor".into()));
        assert_eq!(first.operands.len(), 3);
    }

    #[test]
    fn empty_stream() {
        let graph = OperatorGraph::parse(b"  % nothing\n").unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.encode().unwrap(), b"");
    }

    #[test]
    fn traversal_order() {
        let graph = OperatorGraph::parse(b"q m Q l").unwrap();
        let visits: Vec<Visit> = graph.traverse().collect();
        let (q, m, l) = (NodeId(1), NodeId(2), NodeId(3));
        assert_eq!(
            visits,
            vec![
                Visit::Enter(graph.root()),
                Visit::Enter(q),
                Visit::Enter(m),
                Visit::Leave(m),
                Visit::Leave(q),
                Visit::Enter(l),
                Visit::Leave(l),
                Visit::Leave(graph.root()),
            ]
        );
    }

    #[test]
    fn builder_helpers_close_scopes() {
        let mut graph = OperatorGraph::new();
        let q = graph
            .push_scope(graph.root(), KeywordInstance::new(KeywordId::SaveState, vec![]))
            .unwrap();
        graph
            .push_leaf(q, KeywordInstance::new(KeywordId::FillGray, vec![Object::Real(0.5)]))
            .unwrap();
        assert_eq!(graph.encode().unwrap(), b"q\n0.5 g\nQ\n");

        let leaf = graph.children(q)[0];
        assert!(graph.push_leaf(leaf, KeywordInstance::new(KeywordId::Fill, vec![])).is_err());
        assert!(matches!(
            graph.push_leaf(q, KeywordInstance::new(KeywordId::BeginText, vec![])),
            Err(Error::ContentStream(ContentStreamError::WrongKeywordClass { .. }))
        ));
    }

    #[test]
    fn failed_recovery_leaves_no_trace() {
        let mut builder = GraphBuilder::new(Tokenizer::new(b"q BT ET"));
        for _ in 0..2 {
            let Some(Token::Keyword(text)) = builder.tokenizer.next_token().unwrap() else {
                panic!("expected keyword");
            };
            builder.token_index += 1;
            builder.open(keyword::lookup(&text));
        }
        let position = builder.tokenizer.position();
        let stack = builder.stack.clone();

        assert!(!builder.swap_closes(KeywordId::EndMarkedContent));
        assert_eq!(builder.stack, stack);
        assert_eq!(builder.tokenizer.position(), position);
        assert!(builder.graph.node(builder.top()).close.is_none());
    }

    #[test]
    fn edited_operands_are_encoded() {
        let mut graph = OperatorGraph::parse(b"BT (old) Tj ET").unwrap();
        let bt = graph.children(graph.root())[0];
        let tj = graph.children(bt)[0];
        if let Some(open) = graph.node_mut(tj).open.as_mut() {
            open.operands[0] = Object::string_literal("new");
        }
        assert_eq!(graph.encode().unwrap(), b"BT\n(new) Tj\nET\n");
    }
}
