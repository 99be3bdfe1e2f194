use crate::dom::{DomTree, ElementNode};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to an element on a page, keyed by its structural CSS path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Structural path (`body > ul:nth-child(2) > li:nth-child(1)`)
    pub path: String,

    /// Lowercase tag name
    pub tag_name: String,
}

impl ElementHandle {
    pub fn new(path: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            tag_name: tag_name.into(),
        }
    }

    pub fn from_node(node: &ElementNode) -> Self {
        Self::new(node.path.clone(), node.tag_name.clone())
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> {}", self.tag_name, self.path)
    }
}

/// Notification fired on a form field after its value changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldEvent {
    Input,
    Change,
}

impl FieldEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Change => "change",
        }
    }
}

/// The live document an automation run queries and mutates
///
/// Implementations own the transport (CDP, in-memory tree, ...). Every method is
/// a suspension point for the engine; none of them retries on its own.
#[async_trait]
pub trait Page: Send + Sync {
    /// Capture the current DOM
    async fn snapshot(&self) -> Result<DomTree>;

    /// All elements matching a CSS selector, in document order
    async fn select(&self, selector: &str) -> Result<Vec<ElementHandle>>;

    /// Smooth-scroll the element to the center of the viewport
    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()>;

    async fn click(&self, element: &ElementHandle) -> Result<()>;

    async fn focus(&self, element: &ElementHandle) -> Result<()>;

    /// Overwrite the field's value without firing any event
    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<()>;

    async fn dispatch(&self, element: &ElementHandle, event: FieldEvent) -> Result<()>;
}
