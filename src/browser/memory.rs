//! In-memory page for offline runs and tests
//!
//! Holds a [`DomTree`], records every interaction, and lets callers attach click
//! handlers that rewrite the tree the way a re-rendering site would.

use crate::browser::page::{ElementHandle, FieldEvent, Page};
use crate::dom::{DomTree, ElementNode, SelectorList};
use crate::error::{AutomationError, Result};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

type ClickHandler = Box<dyn FnMut(&mut DomTree) + Send>;

/// Interaction observed by a [`MemoryPage`]
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    ScrolledIntoView(String),
    Clicked(String),
    Focused(String),
    ValueSet { path: String, value: String },
    Dispatched { path: String, event: FieldEvent },
}

pub struct MemoryPage {
    tree: Mutex<DomTree>,
    events: Mutex<Vec<PageEvent>>,
    handlers: Mutex<Vec<(SelectorList, ClickHandler)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn stale(element: &ElementHandle) -> AutomationError {
    AutomationError::ElementNotFound(format!("{} is not attached to the page", element))
}

impl MemoryPage {
    pub fn new(root: ElementNode) -> Self {
        Self::from_tree(DomTree::new(root))
    }

    pub fn from_tree(tree: DomTree) -> Self {
        Self {
            tree: Mutex::new(tree),
            events: Mutex::new(Vec::new()),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Run `handler` against the tree whenever an element matching `selector` is clicked
    pub fn on_click<F>(&self, selector: &str, handler: F) -> Result<()>
    where
        F: FnMut(&mut DomTree) + Send + 'static,
    {
        let selector = SelectorList::parse(selector)?;
        lock(&self.handlers).push((selector, Box::new(handler)));
        Ok(())
    }

    /// Swap in a new document, as a navigation would
    pub fn replace_root(&self, root: ElementNode) {
        *lock(&self.tree) = DomTree::new(root);
    }

    pub fn tree(&self) -> DomTree {
        lock(&self.tree).clone()
    }

    pub fn events(&self) -> Vec<PageEvent> {
        lock(&self.events).clone()
    }

    pub fn clear_events(&self) {
        lock(&self.events).clear();
    }

    /// Paths of clicked elements, in order
    pub fn clicks(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                PageEvent::Clicked(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `event` notifications dispatched on `path`
    pub fn dispatched(&self, path: &str, event: FieldEvent) -> usize {
        lock(&self.events)
            .iter()
            .filter(|e| matches!(e, PageEvent::Dispatched { path: p, event: ev } if p == path && *ev == event))
            .count()
    }

    pub fn value_of(&self, path: &str) -> Option<String> {
        lock(&self.tree).find_by_path(path).and_then(|n| n.value.clone())
    }

    fn record(&self, event: PageEvent) {
        lock(&self.events).push(event);
    }

    fn ensure_attached(&self, element: &ElementHandle) -> Result<()> {
        match lock(&self.tree).find_by_path(&element.path) {
            Some(_) => Ok(()),
            None => Err(stale(element)),
        }
    }
}

#[async_trait]
impl Page for MemoryPage {
    async fn snapshot(&self) -> Result<DomTree> {
        Ok(self.tree())
    }

    async fn select(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let selector = SelectorList::parse(selector)?;
        let tree = lock(&self.tree);
        Ok(tree.select(&selector).into_iter().map(ElementHandle::from_node).collect())
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()> {
        self.ensure_attached(element)?;
        self.record(PageEvent::ScrolledIntoView(element.path.clone()));
        Ok(())
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        let mut tree = lock(&self.tree);
        if tree.find_by_path(&element.path).is_none() {
            return Err(stale(element));
        }
        self.record(PageEvent::Clicked(element.path.clone()));

        let mut handlers = lock(&self.handlers);
        let triggered: Vec<usize> = handlers
            .iter()
            .enumerate()
            .filter(|(_, (selector, _))| tree.select(selector).iter().any(|n| n.path == element.path))
            .map(|(i, _)| i)
            .collect();

        for i in triggered {
            (handlers[i].1)(&mut *tree);
            tree.index_paths();
        }
        Ok(())
    }

    async fn focus(&self, element: &ElementHandle) -> Result<()> {
        self.ensure_attached(element)?;
        self.record(PageEvent::Focused(element.path.clone()));
        Ok(())
    }

    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<()> {
        let mut tree = lock(&self.tree);
        let node = tree.find_by_path_mut(&element.path).ok_or_else(|| stale(element))?;
        node.value = Some(value.to_string());
        self.record(PageEvent::ValueSet {
            path: element.path.clone(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn dispatch(&self, element: &ElementHandle, event: FieldEvent) -> Result<()> {
        self.ensure_attached(element)?;
        self.record(PageEvent::Dispatched {
            path: element.path.clone(),
            event,
        });
        Ok(())
    }
}
