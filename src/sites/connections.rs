//! Connection-list mining
//!
//! Walks a paginated list of connection cards, collecting each person's name and
//! profile link until the list runs out, a page adds nothing new, or the
//! `limit` in the run context is reached.
//!
//! ```text
//! waitForList ──> collect ──> checkLimit ──(true)──> nextPage ──> settle ──> collect
//!      │             │            │                     │
//!      │             │            │                     └──(missing / failed)──> finish
//!      └─(missing)───┴──> finish <┴──(false)
//! ```

use crate::dom::{DomTree, ElementNode, SelectorList};
use crate::engine::{
    ActionContext, ActionSpec, Capabilities, ContextMap, CustomAction, StateDef, StateGraph,
};
use crate::error::Result;
use crate::resolver::{Matcher, ResolveSpec, Resolution};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;

pub const COLLECT_CONNECTIONS: &str = "collectConnections";
pub const BELOW_LIMIT: &str = "belowLimit";

/// Context keys shared by the extractor and the limit predicate
pub const CONNECTIONS_KEY: &str = "connections";
pub const LIMIT_KEY: &str = "limit";
pub const LAST_ADDED_KEY: &str = "lastAdded";
pub const PAGES_KEY: &str = "pagesVisited";

/// Markup of the connection list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionSelectors {
    pub card: String,
    /// Profile link inside a card
    pub link: String,
    /// Name inside a card
    pub name: String,
    /// Optional headline inside a card
    pub headline: String,
    /// Pagination button, used when the semantic and text lookups fail
    pub next_button: String,
    /// Accessible name of the pagination button
    pub next_label: String,
}

impl Default for ConnectionSelectors {
    fn default() -> Self {
        Self {
            card: "li.connection-card".to_string(),
            link: "a.connection-card__link".to_string(),
            name: ".connection-card__name".to_string(),
            headline: ".connection-card__occupation".to_string(),
            next_button: "button.pager-next".to_string(),
            next_label: "Next".to_string(),
        }
    }
}

/// One collected connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub name: String,
    pub profile_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
}

/// The connection-mining state graph
pub fn graph(selectors: &ConnectionSelectors) -> StateGraph {
    let cards = ResolveSpec::new().selector(&selectors.card);

    StateGraph::new("waitForList")
        .with_state(
            "waitForList",
            StateDef::new()
                .with_resolve(cards.clone())
                .with_action(ActionSpec::Wait {
                    ms: 800,
                    max_ms: Some(1500),
                })
                .with_on_missing("finish")
                .with_next("collect"),
        )
        .with_state(
            "collect",
            StateDef::new()
                .with_resolve(cards.all(true))
                .with_action(ActionSpec::custom(COLLECT_CONNECTIONS))
                .with_on_missing("finish")
                .with_next("checkLimit"),
        )
        .with_state(
            "checkLimit",
            StateDef::new()
                .with_check(BELOW_LIMIT)
                .with_on_true("nextPage")
                .with_on_false("finish"),
        )
        .with_state(
            "nextPage",
            StateDef::new()
                .with_resolve(
                    ResolveSpec::new()
                        .semantic("button", Matcher::text(&selectors.next_label))
                        .text(Matcher::text(&selectors.next_label))
                        .tag("button")
                        .selector(&selectors.next_button),
                )
                .with_action(ActionSpec::Click)
                .with_on_missing("finish")
                .with_fallback("finish")
                .with_next("settle"),
        )
        .with_state(
            "settle",
            StateDef::new()
                .with_action(ActionSpec::Wait {
                    ms: 1500,
                    max_ms: Some(3000),
                })
                .with_next("collect"),
        )
        .with_state("finish", StateDef::new())
}

/// Capabilities the graph refers to
pub fn capabilities(selectors: &ConnectionSelectors) -> Result<Capabilities> {
    Ok(Capabilities::new()
        .with_action(COLLECT_CONNECTIONS, ConnectionExtractor::new(selectors)?)
        .with_predicate(BELOW_LIMIT, below_limit))
}

/// Starting context, optionally capped at `limit` connections
pub fn initial_context(limit: Option<u64>) -> ContextMap {
    let mut context = ContextMap::new();
    context.insert(CONNECTIONS_KEY.into(), json!([]));
    if let Some(limit) = limit {
        context.insert(LIMIT_KEY.into(), json!(limit));
    }
    context
}

/// Connections gathered so far
pub fn collected(context: &ContextMap) -> Vec<Connection> {
    context
        .get(CONNECTIONS_KEY)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

/// Keep paging while under the limit and the last page added something
pub fn below_limit(context: &mut ContextMap) -> bool {
    let count = context.get(CONNECTIONS_KEY).and_then(Value::as_array).map_or(0, Vec::len) as u64;
    let progressed = context.get(LAST_ADDED_KEY).and_then(Value::as_u64).unwrap_or(0) > 0;

    match context.get(LIMIT_KEY).and_then(Value::as_u64) {
        Some(limit) => progressed && count < limit,
        None => progressed,
    }
}

/// Strip query, fragment, and trailing slash so one profile has one key
pub fn normalize_profile_url(href: &str) -> String {
    let end = href.find(['?', '#']).unwrap_or(href.len());
    href[..end].trim_end_matches('/').to_string()
}

/// Reads connection cards into `context.connections`, deduplicated by profile URL
pub struct ConnectionExtractor {
    link: SelectorList,
    name: SelectorList,
    headline: SelectorList,
}

impl ConnectionExtractor {
    pub fn new(selectors: &ConnectionSelectors) -> Result<Self> {
        Ok(Self {
            link: SelectorList::parse(&selectors.link)?,
            name: SelectorList::parse(&selectors.name)?,
            headline: SelectorList::parse(&selectors.headline)?,
        })
    }

    /// Parse one card; cards without a name or a link are skipped
    pub fn read_card(&self, card: &ElementNode) -> Option<Connection> {
        let card = DomTree::new(card.clone());
        let first_text = |selector: &SelectorList| {
            card.select(selector)
                .into_iter()
                .map(ElementNode::rendered_text)
                .find(|text| !text.is_empty())
        };

        let name = first_text(&self.name)?;
        let href = card
            .select(&self.link)
            .into_iter()
            .find_map(|a| a.get_attribute("href"))
            .map(|href| normalize_profile_url(href))
            .filter(|href| !href.is_empty())?;

        Some(Connection {
            name,
            profile_url: href,
            headline: first_text(&self.headline),
        })
    }
}

#[async_trait]
impl CustomAction for ConnectionExtractor {
    async fn execute(&self, resolution: &Resolution, ctx: &mut ActionContext<'_>) -> bool {
        if resolution.is_missing() {
            ctx.logger.warn("no connection cards to read");
            return false;
        }

        let tree = match ctx.page.snapshot().await {
            Ok(tree) => tree,
            Err(e) => {
                ctx.logger.warn(format!("snapshot failed: {}", e));
                return false;
            }
        };

        let mut connections = collected(ctx.data);
        let mut seen: HashSet<String> = connections.iter().map(|c| c.profile_url.clone()).collect();
        let mut added = 0u64;

        for handle in resolution.elements() {
            let Some(card) = tree.find_by_path(&handle.path) else {
                ctx.logger.debug(format!("card {} disappeared", handle));
                continue;
            };
            match self.read_card(card) {
                Some(connection) if seen.insert(connection.profile_url.clone()) => {
                    connections.push(connection);
                    added += 1;
                }
                Some(_) => {}
                None => ctx.logger.debug(format!("card {} has no name or link", handle)),
            }
        }

        let total = connections.len() as u64;
        let pages = ctx.data.get(PAGES_KEY).and_then(Value::as_u64).unwrap_or(0) + 1;
        let limit = ctx.data.get(LIMIT_KEY).and_then(Value::as_u64);

        match serde_json::to_value(&connections) {
            Ok(value) => {
                ctx.data.insert(CONNECTIONS_KEY.into(), value);
            }
            Err(e) => {
                ctx.logger.error(format!("cannot store connections: {}", e));
                return false;
            }
        }
        ctx.data.insert(LAST_ADDED_KEY.into(), json!(added));
        ctx.data.insert(PAGES_KEY.into(), json!(pages));

        let percent = match limit {
            Some(limit) if limit > 0 => (total.min(limit) as f32 / limit as f32) * 100.0,
            _ => 0.0,
        };
        ctx.notifier.notify(
            &format!("Page {}: {} connections ({} new)", pages, total, added),
            percent,
        );
        true
    }
}
