//! DOM snapshot model
//!
//! This module provides the in-memory view of a page that element resolution works on:
//! - ElementNode: Representation of DOM elements (visibility, text, accessible name, roles)
//! - DomTree: Snapshot tree whose elements carry structural CSS paths
//! - SelectorList: CSS selector subset for querying snapshot trees

pub mod element;
pub mod selector;
pub mod tree;

pub use element::{BoundingBox, ElementNode};
pub use selector::SelectorList;
pub use tree::{Descendants, DomTree, is_within};

/// Script that serializes `document.body` into the [`ElementNode`] JSON shape
pub const EXTRACT_DOM_JS: &str = include_str!("extract_dom.js");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_node_export() {
        let element = ElementNode::new("div");
        assert_eq!(element.tag_name, "div");
    }

    #[test]
    fn test_dom_tree_export() {
        let root = ElementNode::new("body");
        let tree = DomTree::new(root);
        assert_eq!(tree.root.tag_name, "body");
    }

    #[test]
    fn test_extract_script_targets_body() {
        assert!(EXTRACT_DOM_JS.contains("document.body"));
        assert!(EXTRACT_DOM_JS.contains("client_rects"));
    }
}
