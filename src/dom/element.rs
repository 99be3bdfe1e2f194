use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Represents a DOM element node captured in a page snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementNode {
    /// HTML tag name, lowercase (e.g., "div", "button", "input")
    pub tag_name: String,

    /// Element attributes (e.g., id, class, href, aria-label)
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// The element's own text (direct text nodes only, whitespace-collapsed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,

    /// Child elements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementNode>,

    /// Current value of a form field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Bounding box information (x, y, width, height)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,

    /// Number of client rectangles reported by the layout engine
    #[serde(default)]
    pub client_rects: usize,

    /// Structural CSS path, assigned by [`DomTree`](super::DomTree)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// Bounding box coordinates for an element
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementNode {
    /// Create a new ElementNode
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into().to_ascii_lowercase(),
            attributes: HashMap::new(),
            text_content: None,
            children: Vec::new(),
            value: None,
            bounding_box: None,
            client_rects: 0,
            path: String::new(),
        }
    }

    /// Builder method: set attributes
    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Builder method: add one attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_attribute(key, value);
        self
    }

    /// Builder method: set text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    /// Builder method: set children
    pub fn with_children(mut self, children: Vec<ElementNode>) -> Self {
        self.children = children;
        self
    }

    /// Builder method: append a child
    pub fn with_child(mut self, child: ElementNode) -> Self {
        self.children.push(child);
        self
    }

    /// Builder method: set form value
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Builder method: set bounding box
    pub fn with_bounding_box(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bounding_box = Some(BoundingBox { x, y, width, height });
        self
    }

    /// Builder method: give the element a rendered size at the origin
    pub fn with_size(self, width: f64, height: f64) -> Self {
        self.with_bounding_box(0.0, 0.0, width, height)
    }

    /// Builder method: set client rectangle count
    pub fn with_client_rects(mut self, count: usize) -> Self {
        self.client_rects = count;
        self
    }

    /// Add a single attribute
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Add a child element
    pub fn add_child(&mut self, child: ElementNode) {
        self.children.push(child);
    }

    /// Get attribute value by key
    pub fn get_attribute(&self, key: &str) -> Option<&String> {
        self.attributes.get(key)
    }

    /// Check if element has a specific class
    pub fn has_class(&self, class_name: &str) -> bool {
        if let Some(classes) = self.attributes.get("class") {
            classes.split_whitespace().any(|c| c == class_name)
        } else {
            false
        }
    }

    /// Get element ID
    pub fn id(&self) -> Option<&String> {
        self.attributes.get("id")
    }

    /// Check if element is a specific tag
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    /// Non-zero rendered width or height, or at least one client rectangle
    pub fn is_visible(&self) -> bool {
        self.bounding_box.is_some_and(|b| b.has_extent()) || self.client_rects > 0
    }

    /// The element's own text, trimmed
    pub fn own_text(&self) -> &str {
        self.text_content.as_deref().map(str::trim).unwrap_or("")
    }

    /// Text of the element and all its descendants, whitespace-collapsed
    pub fn rendered_text(&self) -> String {
        let mut raw = String::new();
        self.collect_text(&mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = &self.text_content {
            out.push(' ');
            out.push_str(text);
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }

    /// Accessible name: `aria-label`, then rendered text, then `title`
    pub fn accessible_name(&self) -> Option<String> {
        let label = self
            .get_attribute("aria-label")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty());
        if let Some(label) = label {
            return Some(label.to_string());
        }

        let text = self.rendered_text();
        if !text.is_empty() {
            return Some(text);
        }

        self.get_attribute("title")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Explicit `role` attribute, lowercased
    pub fn explicit_role(&self) -> Option<String> {
        self.get_attribute("role")
            .map(|r| r.trim().to_ascii_lowercase())
            .filter(|r| !r.is_empty())
    }

    /// ARIA role implied by the tag when no `role` attribute is present
    pub fn implicit_role(&self) -> Option<&'static str> {
        let input_type = || {
            self.get_attribute("type")
                .map(|t| t.to_ascii_lowercase())
                .unwrap_or_else(|| "text".to_string())
        };

        match self.tag_name.as_str() {
            "button" => Some("button"),
            "input" => match input_type().as_str() {
                "submit" | "button" | "reset" | "image" => Some("button"),
                "checkbox" => Some("checkbox"),
                "radio" => Some("radio"),
                "text" | "email" | "search" | "tel" | "url" | "password" => Some("textbox"),
                _ => None,
            },
            "a" if self.attributes.contains_key("href") => Some("link"),
            "textarea" => Some("textbox"),
            "select" => Some("combobox"),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some("heading"),
            "li" => Some("listitem"),
            "ul" | "ol" => Some("list"),
            "img" => Some("img"),
            "nav" => Some("navigation"),
            _ => None,
        }
    }

    /// Convert to a simplified string representation
    pub fn to_simple_string(&self) -> String {
        let mut parts = vec![format!("<{}", self.tag_name)];

        if let Some(id) = self.id() {
            parts.push(format!(" id=\"{}\"", id));
        }

        if let Some(class) = self.attributes.get("class") {
            parts.push(format!(" class=\"{}\"", class));
        }

        if let Some(role) = self.explicit_role() {
            parts.push(format!(" role=\"{}\"", role));
        }

        parts.push(">".to_string());

        let text = self.own_text();
        if !text.is_empty() {
            parts.push(text.to_string());
        }

        parts.join("")
    }
}

impl BoundingBox {
    /// Create a new BoundingBox
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Non-zero width or height
    pub fn has_extent(&self) -> bool {
        self.width > 0.0 || self.height > 0.0
    }

    /// Calculate the area of the bounding box
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_node_creation() {
        let mut attrs = HashMap::new();
        attrs.insert("id".to_string(), "test-id".to_string());
        attrs.insert("class".to_string(), "btn primary".to_string());

        let element = ElementNode::new("BUTTON")
            .with_attributes(attrs)
            .with_text("Click me")
            .with_size(80.0, 20.0);

        assert_eq!(element.tag_name, "button");
        assert_eq!(element.id(), Some(&"test-id".to_string()));
        assert_eq!(element.own_text(), "Click me");
        assert!(element.has_class("primary"));
        assert!(element.is_visible());
    }

    #[test]
    fn test_visibility_rules() {
        assert!(!ElementNode::new("div").is_visible());
        assert!(!ElementNode::new("div").with_size(0.0, 0.0).is_visible());
        // width or height is enough
        assert!(ElementNode::new("div").with_size(0.0, 12.0).is_visible());
        assert!(ElementNode::new("div").with_size(12.0, 0.0).is_visible());
        // inline elements can have rects but an empty box
        assert!(ElementNode::new("span").with_client_rects(1).is_visible());
    }

    #[test]
    fn test_rendered_text_collapses_whitespace() {
        let element = ElementNode::new("li")
            .with_text("  Jane\n")
            .with_child(ElementNode::new("span").with_text("  Doe  "))
            .with_child(ElementNode::new("p").with_child(ElementNode::new("b").with_text("Engineer")));

        assert_eq!(element.rendered_text(), "Jane Doe Engineer");
        assert_eq!(element.own_text(), "Jane");
    }

    #[test]
    fn test_accessible_name_priority() {
        let labelled = ElementNode::new("button")
            .with_attribute("aria-label", "Next page")
            .with_attribute("title", "ignored")
            .with_text("→");
        assert_eq!(labelled.accessible_name().as_deref(), Some("Next page"));

        let texted = ElementNode::new("button").with_attribute("title", "ignored").with_text("Next");
        assert_eq!(texted.accessible_name().as_deref(), Some("Next"));

        let titled = ElementNode::new("button")
            .with_attribute("aria-label", "   ")
            .with_attribute("title", "Go forward");
        assert_eq!(titled.accessible_name().as_deref(), Some("Go forward"));

        assert_eq!(ElementNode::new("button").accessible_name(), None);
    }

    #[test]
    fn test_implicit_roles() {
        assert_eq!(ElementNode::new("button").implicit_role(), Some("button"));
        assert_eq!(
            ElementNode::new("input").with_attribute("type", "submit").implicit_role(),
            Some("button")
        );
        assert_eq!(ElementNode::new("input").implicit_role(), Some("textbox"));
        assert_eq!(
            ElementNode::new("input").with_attribute("type", "hidden").implicit_role(),
            None
        );
        assert_eq!(ElementNode::new("a").implicit_role(), None);
        assert_eq!(ElementNode::new("a").with_attribute("href", "/x").implicit_role(), Some("link"));
        assert_eq!(ElementNode::new("h3").implicit_role(), Some("heading"));
        assert_eq!(ElementNode::new("div").implicit_role(), None);
    }

    #[test]
    fn test_explicit_role_normalized() {
        let el = ElementNode::new("a").with_attribute("role", " Button ");
        assert_eq!(el.explicit_role().as_deref(), Some("button"));
    }

    #[test]
    fn test_serialization() {
        let element = ElementNode::new("input")
            .with_attribute("name", "q")
            .with_value("rust")
            .with_size(100.0, 20.0);

        let json = serde_json::to_string(&element).unwrap();
        let deserialized: ElementNode = serde_json::from_str(&json).unwrap();

        assert_eq!(element, deserialized);
    }

    #[test]
    fn test_deserialize_snapshot_shape() {
        let json = r#"{
            "tag_name": "a",
            "attributes": {"href": "/in/jane"},
            "text_content": "Jane",
            "bounding_box": {"x": 1.0, "y": 2.0, "width": 0.0, "height": 0.0},
            "client_rects": 2
        }"#;
        let node: ElementNode = serde_json::from_str(json).unwrap();
        assert!(node.is_visible());
        assert!(node.children.is_empty());
        assert!(node.path.is_empty());
    }

    #[test]
    fn test_to_simple_string() {
        let element = ElementNode::new("div")
            .with_attribute("id", "my-btn")
            .with_attribute("class", "btn primary")
            .with_attribute("role", "button")
            .with_text("Submit");

        let simple = element.to_simple_string();
        assert!(simple.contains("<div"));
        assert!(simple.contains("id=\"my-btn\""));
        assert!(simple.contains("class=\"btn primary\""));
        assert!(simple.contains("role=\"button\""));
        assert!(simple.contains("Submit"));
    }
}
