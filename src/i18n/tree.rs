//! Resource tree model and the flatten/unflatten transforms.
//!
//! A locale's resources are an arbitrarily nested string-keyed mapping whose
//! terminal values are strings. The audit engines never look at the tree
//! directly: they work on the `FlatTable`, a sorted mapping from dotted
//! `KeyPath` to leaf value.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Children of a branch, in document order.
pub type Branch = IndexMap<String, ResourceNode>;

/// Flat view of a tree: dotted key path to leaf value, sorted by key path.
pub type FlatTable = BTreeMap<KeyPath, String>;

/// One node of a resource tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceNode {
    /// Terminal translatable string
    Leaf(String),

    /// Internal node grouping child keys
    Branch(Branch),
}

impl ResourceNode {
    /// Convert an arbitrary JSON value into a node.
    ///
    /// Strings map to leaves verbatim. Numbers and booleans keep their JSON
    /// text, `null` becomes an empty leaf and arrays become branches keyed
    /// by element index (`items.0`, `items.1`, ...).
    pub fn from_json(value: Value) -> ResourceNode {
        match value {
            Value::String(text) => ResourceNode::Leaf(text),
            Value::Null => ResourceNode::Leaf(String::new()),
            Value::Bool(flag) => ResourceNode::Leaf(flag.to_string()),
            Value::Number(number) => ResourceNode::Leaf(number.to_string()),
            Value::Array(items) => ResourceNode::Branch(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| (index.to_string(), ResourceNode::from_json(item)))
                    .collect(),
            ),
            Value::Object(map) => ResourceNode::Branch(
                map.into_iter()
                    .map(|(key, item)| (key, ResourceNode::from_json(item)))
                    .collect(),
            ),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            ResourceNode::Leaf(text) => Value::String(text.clone()),
            ResourceNode::Branch(children) => Value::Object(
                children
                    .iter()
                    .map(|(key, child)| (key.clone(), child.to_json()))
                    .collect(),
            ),
        }
    }
}

/// In-memory resources of one locale (or one resource group of a locale).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceTree {
    root: Branch,
}

impl ResourceTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tree from an already-built root branch
    pub fn from_root(root: Branch) -> Self {
        Self { root }
    }

    /// Build a tree from a JSON document.
    ///
    /// Returns `None` when the top-level value is not an object.
    pub fn from_json(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        match ResourceNode::from_json(value) {
            ResourceNode::Branch(root) => Some(Self { root }),
            ResourceNode::Leaf(_) => None,
        }
    }

    /// Render the tree as a JSON object with every leaf as a string
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.root
                .iter()
                .map(|(key, child)| (key.clone(), child.to_json()))
                .collect(),
        )
    }

    /// Top-level children of the tree
    pub fn root(&self) -> &Branch {
        &self.root
    }

    /// Resolve a key path to the node it addresses, if any
    pub fn get(&self, path: &KeyPath) -> Option<&ResourceNode> {
        let mut segments = path.segments();
        let mut node = self.root.get(segments.next()?)?;
        for segment in segments {
            match node {
                ResourceNode::Branch(children) => node = children.get(segment)?,
                ResourceNode::Leaf(_) => return None,
            }
        }
        Some(node)
    }

    /// Number of leaves in the tree
    pub fn leaf_count(&self) -> usize {
        fn count(branch: &Branch) -> usize {
            branch
                .values()
                .map(|node| match node {
                    ResourceNode::Leaf(_) => 1,
                    ResourceNode::Branch(children) => count(children),
                })
                .sum()
        }
        count(&self.root)
    }

    /// Flatten the tree into a `FlatTable` (depth-first).
    ///
    /// Branches contribute no entry of their own. Keys that cannot form a
    /// valid key path (empty segments) are skipped with a warning, and when
    /// two entries render to the same dotted path the later one wins.
    pub fn flatten(&self) -> FlatTable {
        let mut table = FlatTable::new();
        flatten_into(&self.root, "", &mut table);
        table
    }
}

fn flatten_into(branch: &Branch, prefix: &str, table: &mut FlatTable) {
    for (segment, node) in branch {
        let rendered = if prefix.is_empty() {
            segment.clone()
        } else {
            format!("{}.{}", prefix, segment)
        };

        match node {
            ResourceNode::Branch(children) => flatten_into(children, &rendered, table),
            ResourceNode::Leaf(value) => {
                let Some(path) = KeyPath::new(&rendered) else {
                    warn!("Skipping key with empty segment: '{}'", rendered);
                    continue;
                };
                if table.insert(path, value.clone()).is_some() {
                    warn!("Duplicate key path '{}', keeping the later value", rendered);
                }
            }
        }
    }
}

/// Dotted identifier of a single leaf, e.g. `auth.login`.
///
/// Ordering is lexicographic over the rendered text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct KeyPath(String);

impl KeyPath {
    /// Parse a dotted key path. Returns `None` if any segment is empty.
    pub fn new(text: &str) -> Option<KeyPath> {
        if text.is_empty() || text.split('.').any(str::is_empty) {
            return None;
        }
        Some(KeyPath(text.to_string()))
    }

    /// Build a key path from individual segments
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Option<KeyPath> {
        let joined = segments
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(".");
        KeyPath::new(&joined)
    }

    /// Iterate over the segments of the path
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// First segment, used to group keys into sections
    pub fn section(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Rendered dotted text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` if `other` lies strictly below this path (`a` is an ancestor of `a.b`)
    pub fn is_ancestor_of(&self, other: &KeyPath) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'.'
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key path that is a leaf in one place and a branch in another.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct StructuralConflict {
    /// Path holding a leaf value
    pub leaf: KeyPath,

    /// Path lying below `leaf`, which implies `leaf` is a branch
    pub descendant: KeyPath,
}

impl fmt::Display for StructuralConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' is a leaf but '{}' requires it to be a branch",
            self.leaf, self.descendant
        )
    }
}

/// Result of `unflatten`: the rebuilt tree plus every entry that could not be
/// placed without overwriting another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unflattened {
    pub tree: ResourceTree,
    pub conflicts: Vec<StructuralConflict>,
}

/// Rebuild a tree from a flat table.
///
/// Entries are placed in key order. An entry whose path runs through an
/// existing leaf, or that would replace an existing branch, is left out and
/// reported as a `StructuralConflict`.
pub fn unflatten(table: &FlatTable) -> Unflattened {
    let mut root = Branch::new();
    let mut conflicts = Vec::new();

    for (path, value) in table {
        if let Err(conflict) = insert_leaf(&mut root, path, value) {
            warn!("Structural conflict while unflattening: {}", conflict);
            conflicts.push(conflict);
        }
    }

    Unflattened {
        tree: ResourceTree::from_root(root),
        conflicts,
    }
}

fn insert_leaf(root: &mut Branch, path: &KeyPath, value: &str) -> Result<(), StructuralConflict> {
    let segments: Vec<&str> = path.segments().collect();
    let Some((last, parents)) = segments.split_last() else {
        return Ok(());
    };

    let mut cursor = root;
    let mut walked: Vec<&str> = Vec::with_capacity(parents.len());
    for segment in parents {
        walked.push(*segment);
        let node = cursor
            .entry(segment.to_string())
            .or_insert_with(|| ResourceNode::Branch(Branch::new()));
        match node {
            ResourceNode::Branch(children) => cursor = children,
            ResourceNode::Leaf(_) => {
                return Err(StructuralConflict {
                    leaf: KeyPath(walked.join(".")),
                    descendant: path.clone(),
                })
            }
        }
    }

    if let Some(ResourceNode::Branch(children)) = cursor.get(*last) {
        let descendant = first_leaf_below(children, path.as_str()).unwrap_or_else(|| path.clone());
        return Err(StructuralConflict {
            leaf: path.clone(),
            descendant,
        });
    }

    cursor.insert(last.to_string(), ResourceNode::Leaf(value.to_string()));
    Ok(())
}

fn first_leaf_below(branch: &Branch, prefix: &str) -> Option<KeyPath> {
    branch.iter().find_map(|(segment, node)| {
        let rendered = format!("{}.{}", prefix, segment);
        match node {
            ResourceNode::Leaf(_) => KeyPath::new(&rendered),
            ResourceNode::Branch(children) => first_leaf_below(children, &rendered),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn key(text: &str) -> KeyPath {
        KeyPath::new(text).unwrap()
    }

    fn sample_tree() -> ResourceTree {
        ResourceTree::from_json(json!({
            "auth": {
                "login": "Login",
                "signup": "Sign Up",
                "errors": { "invalid": "Invalid credentials" }
            },
            "common": { "save": "Save" },
            "title": "JobNexus"
        }))
        .unwrap()
    }

    // ==================== KeyPath Tests ====================

    #[test]
    fn test_key_path_rejects_empty_segments() {
        assert!(KeyPath::new("").is_none());
        assert!(KeyPath::new("auth.").is_none());
        assert!(KeyPath::new(".auth").is_none());
        assert!(KeyPath::new("auth..login").is_none());
    }

    #[test]
    fn test_key_path_segments_and_section() {
        let path = key("auth.errors.invalid");
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["auth", "errors", "invalid"]);
        assert_eq!(path.section(), "auth");
        assert_eq!(path.depth(), 3);
    }

    #[test]
    fn test_key_path_from_segments() {
        let path = KeyPath::from_segments(&["dashboard", "newStat"]).unwrap();
        assert_eq!(path.as_str(), "dashboard.newStat");
        assert!(KeyPath::from_segments(&["dashboard", ""]).is_none());
    }

    #[test]
    fn test_key_path_ordering_is_textual() {
        let mut paths = vec![key("b.a"), key("a.b"), key("a"), key("a-b")];
        paths.sort();
        let rendered: Vec<_> = paths.iter().map(|p| p.as_str()).collect();
        assert_eq!(rendered, vec!["a", "a-b", "a.b", "b.a"]);
    }

    #[test]
    fn test_key_path_is_ancestor_of() {
        assert!(key("auth").is_ancestor_of(&key("auth.login")));
        assert!(!key("auth").is_ancestor_of(&key("authors.name")));
        assert!(!key("auth").is_ancestor_of(&key("auth")));
    }

    // ==================== JSON Conversion Tests ====================

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(ResourceTree::from_json(json!(["a", "b"])).is_none());
        assert!(ResourceTree::from_json(json!("text")).is_none());
    }

    #[test]
    fn test_from_json_converts_scalars_and_arrays() {
        let tree = ResourceTree::from_json(json!({
            "count": 5,
            "enabled": true,
            "nothing": null,
            "steps": ["one", "two"]
        }))
        .unwrap();
        let table = tree.flatten();

        assert_eq!(table[&key("count")], "5");
        assert_eq!(table[&key("enabled")], "true");
        assert_eq!(table[&key("nothing")], "");
        assert_eq!(table[&key("steps.0")], "one");
        assert_eq!(table[&key("steps.1")], "two");
    }

    #[test]
    fn test_to_json_preserves_document_order() {
        let tree = sample_tree();
        let rendered = serde_json::to_string(&tree.to_json()).unwrap();
        assert!(rendered.starts_with(r#"{"auth":{"login":"Login","signup":"Sign Up""#));
    }

    #[test]
    fn test_get_resolves_leaves_and_branches() {
        let tree = sample_tree();
        assert_eq!(
            tree.get(&key("auth.login")),
            Some(&ResourceNode::Leaf("Login".to_string()))
        );
        assert!(matches!(tree.get(&key("auth.errors")), Some(ResourceNode::Branch(_))));
        assert!(tree.get(&key("auth.login.extra")).is_none());
        assert!(tree.get(&key("missing")).is_none());
    }

    // ==================== Flatten Tests ====================

    #[test]
    fn test_flatten_nested_tree() {
        let table = sample_tree().flatten();
        let keys: Vec<_> = table.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "auth.errors.invalid",
                "auth.login",
                "auth.signup",
                "common.save",
                "title"
            ]
        );
        assert_eq!(table[&key("auth.errors.invalid")], "Invalid credentials");
    }

    #[test]
    fn test_flatten_branches_contribute_no_entry() {
        let table = sample_tree().flatten();
        assert!(!table.contains_key(&key("auth")));
        assert!(!table.contains_key(&key("auth.errors")));
        assert_eq!(table.len(), sample_tree().leaf_count());
    }

    #[test]
    fn test_flatten_skips_empty_segment_keys() {
        let tree = ResourceTree::from_json(json!({ "": "ghost", "ok": "fine" })).unwrap();
        let table = tree.flatten();
        assert_eq!(table.len(), 1);
        assert!(table.contains_key(&key("ok")));
    }

    #[test]
    fn test_flatten_empty_tree() {
        assert!(ResourceTree::new().flatten().is_empty());
    }

    // ==================== Unflatten Tests ====================

    #[test]
    fn test_unflatten_rebuilds_tree() {
        let tree = sample_tree();
        let rebuilt = unflatten(&tree.flatten());
        assert!(rebuilt.conflicts.is_empty());
        assert_eq!(rebuilt.tree, tree);
    }

    #[test]
    fn test_unflatten_reports_leaf_branch_collision() {
        let mut table = FlatTable::new();
        table.insert(key("auth"), "Auth".to_string());
        table.insert(key("auth.login"), "Login".to_string());
        table.insert(key("common.save"), "Save".to_string());

        let rebuilt = unflatten(&table);

        assert_eq!(
            rebuilt.conflicts,
            vec![StructuralConflict {
                leaf: key("auth"),
                descendant: key("auth.login"),
            }]
        );
        // The first placed entry is kept, never silently overwritten
        assert_eq!(
            rebuilt.tree.get(&key("auth")),
            Some(&ResourceNode::Leaf("Auth".to_string()))
        );
        assert!(rebuilt.tree.get(&key("common.save")).is_some());
    }

    #[test]
    fn test_structural_conflict_display() {
        let conflict = StructuralConflict {
            leaf: key("auth"),
            descendant: key("auth.login"),
        };
        assert_eq!(
            conflict.to_string(),
            "'auth' is a leaf but 'auth.login' requires it to be a branch"
        );
    }

    // ==================== Property Tests ====================

    fn arb_node() -> impl Strategy<Value = ResourceNode> {
        let leaf = "[a-zA-Z0-9 {}%]{0,12}".prop_map(ResourceNode::Leaf);
        leaf.prop_recursive(4, 48, 4, |inner| {
            prop::collection::vec(("[a-z][a-zA-Z0-9_]{0,5}", inner), 1..4)
                .prop_map(|entries| ResourceNode::Branch(entries.into_iter().collect()))
        })
    }

    fn arb_tree() -> impl Strategy<Value = ResourceTree> {
        prop::collection::vec(("[a-z][a-zA-Z0-9_]{0,5}", arb_node()), 0..6)
            .prop_map(|entries| ResourceTree::from_root(entries.into_iter().collect()))
    }

    proptest! {
        #[test]
        fn prop_unflatten_inverts_flatten(tree in arb_tree()) {
            let rebuilt = unflatten(&tree.flatten());
            prop_assert!(rebuilt.conflicts.is_empty());
            prop_assert_eq!(rebuilt.tree, tree);
        }

        #[test]
        fn prop_flatten_is_deterministic(tree in arb_tree()) {
            prop_assert_eq!(tree.flatten(), tree.clone().flatten());
        }
    }
}
