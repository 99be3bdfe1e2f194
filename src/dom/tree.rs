use crate::dom::element::ElementNode;
use crate::dom::selector::SelectorList;
use crate::error::{AutomationError, Result};

/// Snapshot of a page's DOM in which every element carries a structural CSS path
#[derive(Debug, Clone, PartialEq)]
pub struct DomTree {
    /// Root element of the DOM tree (normally `body`)
    pub root: ElementNode,
}

impl DomTree {
    /// Create a tree and assign structural paths to every element
    pub fn new(root: ElementNode) -> Self {
        let mut tree = Self { root };
        tree.index_paths();
        tree
    }

    /// Parse a snapshot produced by the page extraction script
    pub fn from_json(json: &str) -> Result<Self> {
        let root: ElementNode = serde_json::from_str(json)
            .map_err(|e| AutomationError::DomParseFailed(format!("Failed to parse DOM JSON: {}", e)))?;
        Ok(Self::new(root))
    }

    /// Re-assign paths after the structure changed
    pub fn index_paths(&mut self) {
        let root_path = self.root.tag_name.clone();
        Self::assign_path(&mut self.root, root_path);
    }

    fn assign_path(node: &mut ElementNode, path: String) {
        for (i, child) in node.children.iter_mut().enumerate() {
            let child_path = format!("{} > {}:nth-child({})", path, child.tag_name, i + 1);
            Self::assign_path(child, child_path);
        }
        node.path = path;
    }

    /// All elements in document (pre-)order, root first
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants::new(&self.root)
    }

    /// Find an element by its structural path
    pub fn find_by_path(&self, path: &str) -> Option<&ElementNode> {
        Self::find_by_path_in(&self.root, path)
    }

    fn find_by_path_in<'a>(node: &'a ElementNode, path: &str) -> Option<&'a ElementNode> {
        if node.path == path {
            return Some(node);
        }
        node.children
            .iter()
            .filter(|c| is_within(path, &c.path))
            .find_map(|c| Self::find_by_path_in(c, path))
    }

    /// Mutable lookup by structural path
    pub fn find_by_path_mut(&mut self, path: &str) -> Option<&mut ElementNode> {
        Self::find_by_path_mut_in(&mut self.root, path)
    }

    fn find_by_path_mut_in<'a>(node: &'a mut ElementNode, path: &str) -> Option<&'a mut ElementNode> {
        if node.path == path {
            return Some(node);
        }
        node.children
            .iter_mut()
            .filter(|c| is_within(path, &c.path))
            .find_map(|c| Self::find_by_path_mut_in(c, path))
    }

    /// Elements matching `selector`, in document order
    pub fn select(&self, selector: &SelectorList) -> Vec<&ElementNode> {
        let mut found = Vec::new();
        let mut ancestors = Vec::new();
        Self::collect_matches(&self.root, selector, &mut ancestors, &mut found);
        found
    }

    fn collect_matches<'a>(
        node: &'a ElementNode,
        selector: &SelectorList,
        ancestors: &mut Vec<&'a ElementNode>,
        found: &mut Vec<&'a ElementNode>,
    ) {
        if selector.matches(node, ancestors) {
            found.push(node);
        }
        ancestors.push(node);
        for child in &node.children {
            Self::collect_matches(child, selector, ancestors, found);
        }
        ancestors.pop();
    }

    /// Count total elements in the tree
    pub fn count_elements(&self) -> usize {
        self.descendants().count()
    }

    /// Convert the DOM tree to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.root)
            .map_err(|e| AutomationError::DomParseFailed(format!("Failed to serialize DOM to JSON: {}", e)))
    }
}

/// Whether `path` is `ancestor` itself or lies underneath it
pub fn is_within(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with(" > "))
}

/// Pre-order iterator over a subtree
pub struct Descendants<'a> {
    stack: Vec<&'a ElementNode>,
}

impl<'a> Descendants<'a> {
    pub fn new(root: &'a ElementNode) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a ElementNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
