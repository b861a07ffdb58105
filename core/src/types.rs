//! Shared data structures exchanged between the core, the host collaborators, and UI layers.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SCHEME: &str = "content://";

/// Characters escaped inside authorities and ids when a node is rendered as text.
const COMPONENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Identifier of one document inside a provider (file or folder).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A granted root under which a set of document ids are resolvable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeScope {
    pub authority: String,
    pub tree_id: DocumentId,
}

impl TreeScope {
    pub fn new(authority: impl Into<String>, tree_id: impl Into<String>) -> Self {
        Self { authority: authority.into(), tree_id: DocumentId::new(tree_id) }
    }

    /// Node addressing the root of this scope.
    pub fn root(&self) -> Node {
        Node::TreeRoot { authority: self.authority.clone(), tree_id: self.tree_id.clone() }
    }

    /// Node addressing `document_id` through this scope.
    pub fn document(&self, document_id: DocumentId) -> Node {
        Node::TreeDocument {
            authority: self.authority.clone(),
            tree_id: self.tree_id.clone(),
            document_id,
        }
    }
}

/// Opaque handle identifying one location in the document tree.
///
/// Two nodes compare equal when their resolved `(authority, tree, document)` triples match, so
/// a tree root and the tree-scoped reference to the same document are interchangeable. A bare
/// [`Node::Document`] is treated as the root of its own tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Node {
    TreeRoot { authority: String, tree_id: DocumentId },
    TreeDocument { authority: String, tree_id: DocumentId, document_id: DocumentId },
    Document { authority: String, document_id: DocumentId },
}

impl Node {
    pub fn tree_root(authority: impl Into<String>, tree_id: impl Into<String>) -> Self {
        Self::TreeRoot { authority: authority.into(), tree_id: DocumentId::new(tree_id) }
    }

    pub fn tree_document(
        authority: impl Into<String>,
        tree_id: impl Into<String>,
        document_id: impl Into<String>,
    ) -> Self {
        Self::TreeDocument {
            authority: authority.into(),
            tree_id: DocumentId::new(tree_id),
            document_id: DocumentId::new(document_id),
        }
    }

    pub fn document(authority: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self::Document { authority: authority.into(), document_id: DocumentId::new(document_id) }
    }

    pub fn authority(&self) -> &str {
        match self {
            Node::TreeRoot { authority, .. }
            | Node::TreeDocument { authority, .. }
            | Node::Document { authority, .. } => authority,
        }
    }

    /// Whether the node carries tree-scope information of its own.
    pub fn is_tree_scoped(&self) -> bool {
        !matches!(self, Node::Document { .. })
    }

    pub(crate) fn identity(&self) -> (&str, &DocumentId, &DocumentId) {
        match self {
            Node::TreeRoot { authority, tree_id } => (authority.as_str(), tree_id, tree_id),
            Node::TreeDocument { authority, tree_id, document_id } => {
                (authority.as_str(), tree_id, document_id)
            }
            Node::Document { authority, document_id } => {
                (authority.as_str(), document_id, document_id)
            }
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encode = |raw: &str| utf8_percent_encode(raw, COMPONENT_ENCODE_SET).to_string();
        let authority = encode(self.authority());
        match self {
            Node::TreeRoot { tree_id, .. } => {
                write!(f, "{SCHEME}{authority}/tree/{}", encode(tree_id.as_str()))
            }
            Node::TreeDocument { tree_id, document_id, .. } => write!(
                f,
                "{SCHEME}{authority}/tree/{}/document/{}",
                encode(tree_id.as_str()),
                encode(document_id.as_str())
            ),
            Node::Document { document_id, .. } => {
                write!(f, "{SCHEME}{authority}/document/{}", encode(document_id.as_str()))
            }
        }
    }
}

/// Failure to parse the textual form of a [`Node`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeParseError {
    #[error("node reference {0:?} does not use the content:// scheme")]
    MissingScheme(String),
    #[error("node reference {0:?} has no authority")]
    MissingAuthority(String),
    #[error("node reference {0:?} has an unrecognised path layout")]
    UnknownLayout(String),
    #[error("node reference {0:?} contains an id that is not valid UTF-8")]
    InvalidEncoding(String),
}

impl FromStr for Node {
    type Err = NodeParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let rest =
            input.strip_prefix(SCHEME).ok_or_else(|| NodeParseError::MissingScheme(input.into()))?;
        let (raw_authority, path) = rest.split_once('/').unwrap_or((rest, ""));
        if raw_authority.is_empty() {
            return Err(NodeParseError::MissingAuthority(input.into()));
        }
        let authority = percent_decode_str(raw_authority)
            .decode_utf8()
            .map_err(|_| NodeParseError::InvalidEncoding(input.into()))?;

        let decode = |raw: &str| -> Result<DocumentId, NodeParseError> {
            if raw.is_empty() {
                return Err(NodeParseError::UnknownLayout(input.into()));
            }
            percent_decode_str(raw)
                .decode_utf8()
                .map(|decoded| DocumentId::new(decoded.into_owned()))
                .map_err(|_| NodeParseError::InvalidEncoding(input.into()))
        };

        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            ["tree", tree] => {
                Ok(Node::TreeRoot { authority: authority.to_string(), tree_id: decode(*tree)? })
            }
            ["tree", tree, "document", document] => Ok(Node::TreeDocument {
                authority: authority.to_string(),
                tree_id: decode(*tree)?,
                document_id: decode(*document)?,
            }),
            ["document", document] => Ok(Node::Document {
                authority: authority.to_string(),
                document_id: decode(*document)?,
            }),
            _ => Err(NodeParseError::UnknownLayout(input.into())),
        }
    }
}

impl From<Node> for String {
    fn from(node: Node) -> Self {
        node.to_string()
    }
}

impl TryFrom<String> for Node {
    type Error = NodeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Key for one "list children under this tree using this document id" query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub scope: TreeScope,
    pub parent: DocumentId,
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/children", self.scope.document(self.parent.clone()))
    }
}

/// Classification of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Kind {
    Folder,
    Image,
    Video,
}

/// Classified, display-ready representation of one child under a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub display_name: String,
    pub node: Node,
    pub kind: Kind,
    pub mime_type: Option<String>,
}

impl Entry {
    pub fn is_folder(&self) -> bool {
        self.kind == Kind::Folder
    }
}

/// One level of the back-stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationFrame {
    pub node: Node,
    pub display_name: String,
}

impl NavigationFrame {
    pub fn new(node: Node, display_name: impl Into<String>) -> Self {
        Self { node, display_name: display_name.into() }
    }
}

/// The full ordered set of entries for one node at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub node: Option<Node>,
    pub entries: Vec<Entry>,
}

impl Listing {
    pub fn new(node: Node, entries: Vec<Entry>) -> Self {
        Self { node: Some(node), entries }
    }

    /// Listing for `node` with no entries.
    pub fn empty(node: Node) -> Self {
        Self::new(node, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Entries classified as images, in listing order.
    pub fn images(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|entry| entry.kind == Kind::Image)
    }
}

/// Token identifying an in-flight listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl RequestToken {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tree_root_equals_its_scoped_self_reference() {
        let root = Node::tree_root("media", "primary:DCIM");
        let scoped = Node::tree_document("media", "primary:DCIM", "primary:DCIM");
        assert_eq!(root, scoped);

        let mut set = HashSet::new();
        set.insert(root);
        assert!(set.contains(&scoped));
    }

    #[test]
    fn bare_document_is_root_of_own_tree() {
        let bare = Node::document("media", "primary:Pictures");
        assert_eq!(bare, Node::tree_root("media", "primary:Pictures"));
        assert!(!bare.is_tree_scoped());
    }

    #[test]
    fn textual_form_parses_back() {
        let nodes = [
            Node::tree_root("com.android.externalstorage.documents", "primary:DCIM"),
            Node::tree_document("media", "primary:DCIM", "primary:DCIM/Camera/a b.jpg"),
            Node::document("media", "42"),
        ];
        for node in nodes {
            let text = node.to_string();
            let parsed: Node = text.parse().expect("parse node");
            assert_eq!(parsed, node);
            assert_eq!(parsed.is_tree_scoped(), node.is_tree_scoped());
        }
    }

    #[test]
    fn ids_are_percent_encoded() {
        let node = Node::tree_document("media", "primary:DCIM", "primary:DCIM/Camera");
        assert_eq!(
            node.to_string(),
            "content://media/tree/primary%3ADCIM/document/primary%3ADCIM%2FCamera"
        );
    }

    #[test]
    fn authorities_with_separators_parse_back() {
        let node = Node::tree_document("a/b", "x", "x/y");
        let text = node.to_string();
        assert_eq!(text, "content://a%2Fb/tree/x/document/x%2Fy");
        let parsed: Node = text.parse().expect("parse node");
        assert_eq!(parsed.authority(), "a/b");
        assert_eq!(parsed, node);
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(matches!("file:///tmp".parse::<Node>(), Err(NodeParseError::MissingScheme(_))));
        assert!(matches!(
            "content:///tree/x".parse::<Node>(),
            Err(NodeParseError::MissingAuthority(_))
        ));
        assert!(matches!(
            "content://media/folder/x".parse::<Node>(),
            Err(NodeParseError::UnknownLayout(_))
        ));
        assert!(matches!(
            "content://media/tree/".parse::<Node>(),
            Err(NodeParseError::UnknownLayout(_))
        ));
    }

    #[test]
    fn node_serializes_as_string() {
        let node = Node::tree_root("media", "root");
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, "\"content://media/tree/root\"");
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
