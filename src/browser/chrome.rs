use crate::browser::page::{ElementHandle, FieldEvent, Page};
use crate::dom::{DomTree, EXTRACT_DOM_JS};
use crate::error::{AutomationError, Result};
use async_trait::async_trait;
use headless_chrome::Tab;
use serde::Deserialize;
use std::sync::Arc;

const SELECT_JS: &str = include_str!("select.js");
const ELEMENT_OP_JS: &str = include_str!("element_op.js");

/// Encode `value` as a JavaScript string literal
///
/// Caller-provided strings (selectors, paths, typed text) only ever reach page
/// scripts through this function, so quotes and backslashes cannot break out.
pub fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[derive(Debug, Deserialize)]
struct SelectResult {
    #[serde(default)]
    handles: Vec<ElementHandle>,
    #[serde(default)]
    error: Option<String>,
}

/// [`Page`] backed by a live Chrome tab over CDP
///
/// headless_chrome is synchronous, so every call runs on the blocking pool.
#[derive(Clone)]
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Tab>) -> Result<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(tab))
            .await
            .map_err(|e| AutomationError::TabOperationFailed(format!("Browser task failed: {}", e)))?
    }

    async fn evaluate(&self, script: String) -> Result<serde_json::Value> {
        self.blocking(move |tab| {
            let result = tab
                .evaluate(&script, false)
                .map_err(|e| AutomationError::EvaluationFailed(e.to_string()))?;
            result
                .value
                .ok_or_else(|| AutomationError::EvaluationFailed("No value returned from script".to_string()))
        })
        .await
    }

    async fn element_op(&self, element: &ElementHandle, op: &str, arg: Option<&str>) -> Result<()> {
        let script = format!(
            "({})({}, {}, {})",
            ELEMENT_OP_JS,
            js_string(&element.path),
            js_string(op),
            arg.map(js_string).unwrap_or_else(|| "null".to_string())
        );

        match self.evaluate(script).await?.as_bool() {
            Some(true) => Ok(()),
            _ => Err(AutomationError::ElementNotFound(format!(
                "{} is not attached to the page ({})",
                element, op
            ))),
        }
    }
}

#[async_trait]
impl Page for ChromePage {
    async fn snapshot(&self) -> Result<DomTree> {
        let value = self.evaluate(EXTRACT_DOM_JS.to_string()).await?;

        // The script returns a JSON string, so it is unwrapped before parsing
        let json: String = serde_json::from_value(value)
            .map_err(|e| AutomationError::DomParseFailed(format!("Failed to get JSON string: {}", e)))?;
        DomTree::from_json(&json)
    }

    async fn select(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let script = format!("({})({})", SELECT_JS, js_string(selector));
        let value = self.evaluate(script).await?;
        let json: String = serde_json::from_value(value)
            .map_err(|e| AutomationError::EvaluationFailed(format!("Unexpected selector result: {}", e)))?;
        let result: SelectResult = serde_json::from_str(&json)?;

        match result.error {
            Some(reason) => Err(AutomationError::InvalidSelector {
                selector: selector.to_string(),
                reason,
            }),
            None => Ok(result.handles),
        }
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()> {
        self.element_op(element, "scroll", None).await
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        let path = element.path.clone();
        self.blocking(move |tab| {
            let target = tab
                .find_element(&path)
                .map_err(|e| AutomationError::ElementNotFound(format!("Element '{}' not found: {}", path, e)))?;
            target
                .click()
                .map_err(|e| AutomationError::TabOperationFailed(format!("Click on '{}' failed: {}", path, e)))?;
            Ok(())
        })
        .await
    }

    async fn focus(&self, element: &ElementHandle) -> Result<()> {
        self.element_op(element, "focus", None).await
    }

    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<()> {
        self.element_op(element, "set_value", Some(value)).await
    }

    async fn dispatch(&self, element: &ElementHandle, event: FieldEvent) -> Result<()> {
        self.element_op(element, event.as_str(), None).await
    }
}
