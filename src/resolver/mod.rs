//! Element resolution
//!
//! A [`ResolveSpec`] describes a target declaratively. The [`Resolver`] tries three
//! layers in fixed order and stops at the first hit:
//!
//! 1. **semantic**: `role` + `nameMatcher` against accessible names
//! 2. **text**: `textMatcher` (optionally limited to `tag`) against element text
//! 3. **selector**: a CSS `selector`, the last resort
//!
//! Layers whose fields are not set are skipped.

mod matcher;

pub use matcher::Matcher;

use crate::browser::{ElementHandle, Page};
use crate::dom::{Descendants, ElementNode, is_within};
use crate::error::{AutomationError, Result};
use crate::logging::Logger;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Declarative element-location query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveSpec {
    /// ARIA role for the semantic layer (`button`, `link`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Accessible-name test for the semantic layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_matcher: Option<Matcher>,

    /// Own-text test for the text layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_matcher: Option<Matcher>,

    /// Restricts the text layer to one tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Return every selector match instead of the first
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub all: bool,
}

impl ResolveSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: semantic layer
    pub fn semantic(mut self, role: impl Into<String>, name: impl Into<Matcher>) -> Self {
        self.role = Some(role.into());
        self.name_matcher = Some(name.into());
        self
    }

    /// Builder method: text layer
    pub fn text(mut self, matcher: impl Into<Matcher>) -> Self {
        self.text_matcher = Some(matcher.into());
        self
    }

    /// Builder method: restrict the text layer to a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Builder method: selector layer
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Builder method: return all selector matches
    pub fn all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    fn semantic_layer(&self) -> Option<(&str, &Matcher)> {
        Some((self.role.as_deref()?, self.name_matcher.as_ref()?))
    }

    fn needs_snapshot(&self) -> bool {
        self.semantic_layer().is_some() || self.text_matcher.is_some()
    }

    fn empty(&self) -> Resolution {
        if self.all { Resolution::Many(Vec::new()) } else { Resolution::None }
    }
}

/// Outcome of a resolution
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Resolution {
    #[default]
    None,
    One(ElementHandle),
    Many(Vec<ElementHandle>),
}

impl Resolution {
    /// Nothing was found (`None`, or an empty `Many`)
    pub fn is_missing(&self) -> bool {
        match self {
            Self::None => true,
            Self::One(_) => false,
            Self::Many(all) => all.is_empty(),
        }
    }

    pub fn first(&self) -> Option<&ElementHandle> {
        self.elements().first()
    }

    pub fn elements(&self) -> &[ElementHandle] {
        match self {
            Self::None => &[],
            Self::One(element) => std::slice::from_ref(element),
            Self::Many(all) => all,
        }
    }

    pub fn len(&self) -> usize {
        self.elements().len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_missing()
    }
}

/// First visible element, in document order, whose role is `role` and whose accessible name matches
///
/// An explicit `role` attribute replaces the role implied by the tag.
pub fn semantic_match<'a>(scope: &'a ElementNode, role: &str, name: &Matcher) -> Option<&'a ElementNode> {
    let role = role.trim().to_ascii_lowercase();
    Descendants::new(scope)
        .filter(|n| match n.explicit_role() {
            Some(explicit) => explicit == role,
            None => n.implicit_role() == Some(role.as_str()),
        })
        .find(|n| n.is_visible() && n.accessible_name().is_some_and(|label| name.is_match(&label)))
}

/// First visible element, in document order, whose text matches
///
/// With a concrete `tag` the element's rendered text (descendants included) is
/// matched. Without one only an element's own text counts, so ancestors such as
/// `body` never win over the element that holds the text.
pub fn text_match<'a>(scope: &'a ElementNode, text: &Matcher, tag: Option<&str>) -> Option<&'a ElementNode> {
    match tag.filter(|t| *t != "*") {
        Some(tag) => Descendants::new(scope)
            .filter(|n| n.is_tag(tag) && n.is_visible())
            .find(|n| {
                let rendered = n.rendered_text();
                !rendered.is_empty() && text.is_match(&rendered)
            }),
        None => Descendants::new(scope)
            .find(|n| n.is_visible() && !n.own_text().is_empty() && text.is_match(n.own_text())),
    }
}

/// Runs the semantic, text, and selector layers against a [`Page`]
#[derive(Clone)]
pub struct Resolver {
    logger: Logger,
}

impl Resolver {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// Resolve against the whole document
    pub async fn resolve(&self, spec: &ResolveSpec, page: &dyn Page) -> Result<Resolution> {
        self.resolve_within(spec, page, None).await
    }

    /// Resolve inside the subtree rooted at `root` (the whole document when `None`)
    pub async fn resolve_within(
        &self,
        spec: &ResolveSpec,
        page: &dyn Page,
        root: Option<&ElementHandle>,
    ) -> Result<Resolution> {
        if spec.needs_snapshot() {
            let tree = page.snapshot().await?;
            let scope = match root {
                Some(handle) => tree.find_by_path(&handle.path).ok_or_else(|| {
                    AutomationError::ElementNotFound(format!("{} is not attached to the page", handle))
                })?,
                None => &tree.root,
            };

            if let Some((role, name)) = spec.semantic_layer() {
                if let Some(node) = semantic_match(scope, role, name) {
                    self.logger
                        .debug(format!("semantic layer matched {} ({} {:?})", node.path, role, name));
                    return Ok(Resolution::One(ElementHandle::from_node(node)));
                }
            }

            if let Some(text) = &spec.text_matcher {
                if let Some(node) = text_match(scope, text, spec.tag.as_deref()) {
                    self.logger.debug(format!("text layer matched {} ({:?})", node.path, text));
                    return Ok(Resolution::One(ElementHandle::from_node(node)));
                }
            }
        }

        let Some(selector) = &spec.selector else {
            self.logger.debug("no layer matched");
            return Ok(spec.empty());
        };

        let mut matches = page.select(selector).await?;
        if let Some(root) = root {
            matches.retain(|h| is_within(&h.path, &root.path));
        }
        self.logger
            .debug(format!("selector layer '{}' found {} element(s)", selector, matches.len()));

        if spec.all {
            return Ok(Resolution::Many(matches));
        }
        Ok(matches.into_iter().next().map_or(Resolution::None, Resolution::One))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MemoryPage;
    use crate::logging::LogHistory;

    fn resolver() -> Resolver {
        Resolver::new(Logger::new("resolver", LogHistory::shared(50)))
    }

    fn toolbar() -> MemoryPage {
        MemoryPage::new(
            ElementNode::new("body")
                .with_child(
                    ElementNode::new("div")
                        .with_attribute("class", "pager")
                        .with_child(
                            ElementNode::new("a")
                                .with_attribute("class", "next")
                                .with_text("»")
                                .with_size(10.0, 10.0),
                        )
                        .with_child(ElementNode::new("button").with_text("Next").with_size(60.0, 20.0)),
                )
                .with_child(
                    ElementNode::new("span")
                        .with_attribute("role", "button")
                        .with_attribute("aria-label", "Next page")
                        .with_text("→")
                        .with_size(20.0, 20.0),
                ),
        )
    }

    #[tokio::test]
    async fn test_semantic_beats_selector() {
        let spec = ResolveSpec::new().semantic("button", "next").selector("a.next");
        let result = resolver().resolve(&spec, &toolbar()).await.unwrap();

        // the first button in document order wins over the later span[role=button]
        assert_eq!(
            result,
            Resolution::One(ElementHandle::new("body > div:nth-child(1) > button:nth-child(2)", "button"))
        );

        let spec = ResolveSpec::new().semantic("button", "next page");
        let result = resolver().resolve(&spec, &toolbar()).await.unwrap();
        assert_eq!(result, Resolution::One(ElementHandle::new("body > span:nth-child(2)", "span")));
    }

    #[tokio::test]
    async fn test_explicit_role_replaces_implicit_role() {
        let page = MemoryPage::new(
            ElementNode::new("body")
                .with_child(
                    ElementNode::new("button")
                        .with_attribute("role", "tab")
                        .with_text("Next")
                        .with_size(60.0, 20.0),
                )
                .with_child(
                    ElementNode::new("div")
                        .with_attribute("role", "button")
                        .with_text("Next")
                        .with_size(60.0, 20.0),
                ),
        );
        let spec = ResolveSpec::new().semantic("button", "next");
        let result = resolver().resolve(&spec, &page).await.unwrap();
        assert_eq!(result.first().unwrap().path, "body > div:nth-child(2)");
    }

    #[tokio::test]
    async fn test_semantic_requires_both_fields() {
        let mut spec = ResolveSpec::new().selector("a.next");
        spec.role = Some("button".to_string());
        let result = resolver().resolve(&spec, &toolbar()).await.unwrap();
        assert_eq!(result.first().map(|h| h.tag_name.as_str()), Some("a"));
    }

    #[tokio::test]
    async fn test_semantic_skips_invisible_candidates() {
        let page = MemoryPage::new(
            ElementNode::new("body")
                .with_child(ElementNode::new("button").with_text("Next"))
                .with_child(ElementNode::new("button").with_text("Next").with_client_rects(1)),
        );
        let spec = ResolveSpec::new().semantic("button", "Next");
        let result = resolver().resolve(&spec, &page).await.unwrap();
        assert_eq!(result.first().unwrap().path, "body > button:nth-child(2)");
    }

    #[tokio::test]
    async fn test_semantic_name_falls_back_to_title() {
        let page = MemoryPage::new(
            ElementNode::new("body").with_child(
                ElementNode::new("a")
                    .with_attribute("href", "/p/2")
                    .with_attribute("title", "Go to page 2")
                    .with_size(5.0, 5.0),
            ),
        );
        let spec = ResolveSpec::new().semantic("link", Matcher::pattern(r"page \d").unwrap());
        assert!(!resolver().resolve(&spec, &page).await.unwrap().is_missing());
    }

    #[tokio::test]
    async fn test_text_layer_uses_own_text_and_tag() {
        let spec = ResolveSpec::new().text("next").tag("button");
        let result = resolver().resolve(&spec, &toolbar()).await.unwrap();
        assert_eq!(
            result,
            Resolution::One(ElementHandle::new("body > div:nth-child(1) > button:nth-child(2)", "button"))
        );

        // body contains the text only through descendants and never wins
        let spec = ResolveSpec::new().text("Next");
        let result = resolver().resolve(&spec, &toolbar()).await.unwrap();
        assert_eq!(result.first().unwrap().tag_name, "button");
    }

    #[tokio::test]
    async fn test_tagged_text_layer_matches_nested_text() {
        let page = MemoryPage::new(
            ElementNode::new("body").with_child(
                ElementNode::new("button")
                    .with_size(60.0, 20.0)
                    .with_child(ElementNode::new("span").with_text("Next").with_size(30.0, 14.0)),
            ),
        );

        let spec = ResolveSpec::new().text("Next").tag("button");
        let result = resolver().resolve(&spec, &page).await.unwrap();
        assert_eq!(result, Resolution::One(ElementHandle::new("body > button:nth-child(1)", "button")));

        // untagged, the span holding the text is the match
        let spec = ResolveSpec::new().text("Next");
        let result = resolver().resolve(&spec, &page).await.unwrap();
        assert_eq!(result.first().unwrap().tag_name, "span");

        let spec = ResolveSpec::new().text("Next").tag("*");
        let result = resolver().resolve(&spec, &page).await.unwrap();
        assert_eq!(result.first().unwrap().tag_name, "span");
    }

    #[tokio::test]
    async fn test_text_matcher_with_quotes() {
        let page = MemoryPage::new(
            ElementNode::new("body")
                .with_child(ElementNode::new("button").with_text(r#"Say "hi" to O'Brien"#).with_size(10.0, 10.0)),
        );
        let spec = ResolveSpec::new().text(r#""hi" to O'Brien"#);
        let result = resolver().resolve(&spec, &page).await.unwrap();
        assert_eq!(result.first().unwrap().tag_name, "button");

        let spec = ResolveSpec::new().semantic("button", r#"say "HI""#);
        assert!(!resolver().resolve(&spec, &page).await.unwrap().is_missing());
    }

    #[tokio::test]
    async fn test_selector_all_ignores_visibility() {
        let page = MemoryPage::new(
            ElementNode::new("body")
                .with_child(ElementNode::new("div").with_attribute("class", "x"))
                .with_child(ElementNode::new("div").with_attribute("class", "x").with_size(10.0, 10.0))
                .with_child(ElementNode::new("p").with_attribute("class", "x y")),
        );
        let spec = ResolveSpec::new().selector(".x").all(true);
        let result = resolver().resolve(&spec, &page).await.unwrap();
        assert_eq!(result.len(), 3);

        // without `all` the first DOM match wins even though it is invisible
        let spec = ResolveSpec::new().selector(".x");
        let result = resolver().resolve(&spec, &page).await.unwrap();
        assert_eq!(result.first().unwrap().path, "body > div:nth-child(1)");
    }

    #[tokio::test]
    async fn test_nothing_matches() {
        let page = toolbar();
        let spec = ResolveSpec::new().text("Previous").selector(".missing");
        assert_eq!(resolver().resolve(&spec, &page).await.unwrap(), Resolution::None);

        let spec = ResolveSpec::new().selector(".missing").all(true);
        let result = resolver().resolve(&spec, &page).await.unwrap();
        assert_eq!(result, Resolution::Many(vec![]));
        assert!(result.is_missing());

        assert!(resolver().resolve(&ResolveSpec::new(), &page).await.unwrap().is_missing());
    }

    #[tokio::test]
    async fn test_resolve_within_subtree() {
        let page = toolbar();
        let pager = ElementHandle::new("body > div:nth-child(1)", "div");

        let spec = ResolveSpec::new().semantic("button", "next");
        let result = resolver().resolve_within(&spec, &page, Some(&pager)).await.unwrap();
        assert_eq!(result.first().unwrap().tag_name, "button");

        let spec = ResolveSpec::new().selector("[role=button]");
        let result = resolver().resolve_within(&spec, &page, Some(&pager)).await.unwrap();
        assert!(result.is_missing());
    }

    #[tokio::test]
    async fn test_invalid_selector_is_reported() {
        let spec = ResolveSpec::new().selector("div >");
        let result = resolver().resolve(&spec, &toolbar()).await;
        assert!(matches!(result, Err(AutomationError::InvalidSelector { .. })));
    }

    #[test]
    fn test_resolve_spec_serde_is_camel_case() {
        let spec: ResolveSpec = serde_json::from_str(
            r#"{"role":"button","nameMatcher":{"regex":"^Next"},"textMatcher":"Next","selector":"a.next","all":true}"#,
        )
        .unwrap();
        assert_eq!(spec.role.as_deref(), Some("button"));
        assert!(spec.name_matcher.as_ref().unwrap().is_regex());
        assert!(spec.all);

        let json = serde_json::to_value(ResolveSpec::new().selector(".x")).unwrap();
        assert_eq!(json, serde_json::json!({ "selector": ".x" }));
    }
}
