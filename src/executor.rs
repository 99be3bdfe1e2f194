//! Human-paced page actions
//!
//! Every primitive reports success as a `bool`. Page errors are logged and turned
//! into `false`; nothing propagates past the executor.

use crate::browser::{ElementHandle, FieldEvent, Page};
use crate::error::Result;
use crate::logging::Logger;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inclusive range a randomized delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const ZERO: Self = Self::fixed(0);

    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    /// Draw a duration uniformly from `[min_ms, max_ms]`
    ///
    /// A range with `max_ms < min_ms` always yields `min_ms`.
    pub fn sample(&self) -> Duration {
        let ms = if self.max_ms <= self.min_ms {
            self.min_ms
        } else {
            rand::thread_rng().gen_range(self.min_ms..=self.max_ms)
        };
        Duration::from_millis(ms)
    }

    pub fn is_zero(&self) -> bool {
        self.min_ms == 0 && self.max_ms == 0
    }
}

/// Delay bounds for every paced step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimingConfig {
    /// Wait after scrolling an element into view
    pub scroll_settle: DelayRange,
    pub pre_click: DelayRange,
    pub post_click: DelayRange,
    /// Pause between typed characters
    pub keystroke: DelayRange,
    /// Pause between engine iterations
    pub throttle: DelayRange,
}

impl TimingConfig {
    /// No delays at all
    pub fn instant() -> Self {
        Self {
            scroll_settle: DelayRange::ZERO,
            pre_click: DelayRange::ZERO,
            post_click: DelayRange::ZERO,
            keystroke: DelayRange::ZERO,
            throttle: DelayRange::ZERO,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            scroll_settle: DelayRange::new(300, 600),
            pre_click: DelayRange::new(150, 400),
            post_click: DelayRange::new(400, 900),
            keystroke: DelayRange::new(50, 150),
            throttle: DelayRange::new(800, 1600),
        }
    }
}

/// Applies primitive actions to resolved elements
#[derive(Debug, Clone)]
pub struct Executor {
    timing: TimingConfig,
    logger: Logger,
}

impl Executor {
    pub fn new(timing: TimingConfig, logger: Logger) -> Self {
        Self { timing, logger }
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Scroll into view, settle, click, with randomized delays around the click
    pub async fn click(&self, page: &dyn Page, element: Option<&ElementHandle>) -> bool {
        let Some(element) = element else {
            self.logger.warn("click: no element");
            return false;
        };

        let outcome: Result<()> = async {
            page.scroll_into_view(element).await?;
            pause(self.timing.scroll_settle).await;
            pause(self.timing.pre_click).await;
            page.click(element).await?;
            pause(self.timing.post_click).await;
            Ok(())
        }
        .await;

        self.report("click", element, outcome)
    }

    /// Focus, clear, then write `text` one character at a time
    ///
    /// Fires one `input` notification per character and a final `change`.
    pub async fn type_text(&self, page: &dyn Page, element: Option<&ElementHandle>, text: &str) -> bool {
        let Some(element) = element else {
            self.logger.warn("type: no element");
            return false;
        };

        let outcome: Result<()> = async {
            page.focus(element).await?;
            page.set_value(element, "").await?;

            let mut typed = String::with_capacity(text.len());
            for ch in text.chars() {
                typed.push(ch);
                page.set_value(element, &typed).await?;
                page.dispatch(element, FieldEvent::Input).await?;
                pause(self.timing.keystroke).await;
            }

            page.dispatch(element, FieldEvent::Change).await
        }
        .await;

        self.report("type", element, outcome)
    }

    /// Smooth-scroll to the viewport center and wait for the page to settle
    pub async fn scroll_to(&self, page: &dyn Page, element: Option<&ElementHandle>) -> bool {
        let Some(element) = element else {
            self.logger.warn("scroll: no element");
            return false;
        };

        let outcome: Result<()> = async {
            page.scroll_into_view(element).await?;
            pause(self.timing.scroll_settle).await;
            Ok(())
        }
        .await;

        self.report("scroll", element, outcome)
    }

    /// Suspend for a uniformly random duration in `[min_ms, max_ms]`
    pub async fn sleep(&self, min_ms: u64, max_ms: Option<u64>) {
        pause(DelayRange::new(min_ms, max_ms.unwrap_or(min_ms))).await;
    }

    fn report(&self, action: &str, element: &ElementHandle, outcome: Result<()>) -> bool {
        match outcome {
            Ok(()) => {
                self.logger.debug(format!("{} {}", action, element));
                true
            }
            Err(e) => {
                self.logger.warn(format!("{} {} failed: {}", action, element, e));
                false
            }
        }
    }
}

async fn pause(range: DelayRange) {
    if !range.is_zero() {
        tokio::time::sleep(range.sample()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{MemoryPage, PageEvent};
    use crate::dom::ElementNode;
    use crate::logging::LogHistory;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn executor(history: Arc<LogHistory>) -> Executor {
        Executor::new(TimingConfig::instant(), Logger::new("executor", history))
    }

    fn form() -> (MemoryPage, ElementHandle) {
        let page = MemoryPage::new(
            ElementNode::new("body")
                .with_child(ElementNode::new("input").with_attribute("name", "q").with_value("old")),
        );
        (page, ElementHandle::new("body > input:nth-child(1)", "input"))
    }

    #[test]
    fn test_delay_range_sample() {
        for _ in 0..100 {
            let d = DelayRange::new(10, 20).sample();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
        assert_eq!(DelayRange::fixed(7).sample(), Duration::from_millis(7));
        assert_eq!(DelayRange::new(9, 3).sample(), Duration::from_millis(9));
    }

    #[test]
    fn test_timing_serde_defaults() {
        let timing: TimingConfig = serde_json::from_str(r#"{"throttle":{"minMs":5,"maxMs":10}}"#).unwrap();
        assert_eq!(timing.throttle, DelayRange::new(5, 10));
        assert_eq!(timing.pre_click, TimingConfig::default().pre_click);
    }

    #[tokio::test]
    async fn test_type_abc() {
        let (page, input) = form();
        let ok = executor(LogHistory::shared(10)).type_text(&page, Some(&input), "abc").await;

        assert!(ok);
        assert_eq!(page.value_of(&input.path).as_deref(), Some("abc"));
        assert_eq!(page.dispatched(&input.path, FieldEvent::Input), 3);
        assert_eq!(page.dispatched(&input.path, FieldEvent::Change), 1);
        assert_eq!(page.events()[0], PageEvent::Focused(input.path.clone()));
        assert_eq!(
            page.events()[1],
            PageEvent::ValueSet {
                path: input.path.clone(),
                value: String::new()
            }
        );
    }

    #[tokio::test]
    async fn test_click_none_is_false() {
        let history = LogHistory::shared(10);
        let (page, _) = form();
        assert!(!executor(Arc::clone(&history)).click(&page, None).await);
        assert!(page.events().is_empty());
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_click_scrolls_first() {
        let (page, input) = form();
        assert!(executor(LogHistory::shared(10)).click(&page, Some(&input)).await);
        assert_eq!(
            page.events(),
            vec![
                PageEvent::ScrolledIntoView(input.path.clone()),
                PageEvent::Clicked(input.path.clone())
            ]
        );
    }

    #[tokio::test]
    async fn test_stale_element_is_false() {
        let history = LogHistory::shared(10);
        let (page, _) = form();
        let gone = ElementHandle::new("body > div:nth-child(9)", "div");
        let exec = executor(Arc::clone(&history));

        assert!(!exec.click(&page, Some(&gone)).await);
        assert!(!exec.type_text(&page, Some(&gone), "x").await);
        assert!(!exec.scroll_to(&page, Some(&gone)).await);
        assert!(history.records().iter().all(|r| r.level == log::Level::Warn));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_stays_in_range() {
        let exec = Executor::new(TimingConfig::default(), Logger::default());
        let started = tokio::time::Instant::now();
        exec.sleep(200, Some(400)).await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200) && elapsed <= Duration::from_millis(401));
    }

    proptest! {
        #[test]
        fn test_typed_value_matches_text(text in "[a-zA-Z0-9 '\"]{0,24}") {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let (page, input) = form();
            let ok = runtime.block_on(executor(LogHistory::shared(10)).type_text(&page, Some(&input), &text));

            prop_assert!(ok);
            prop_assert_eq!(page.value_of(&input.path), Some(text.clone()));
            prop_assert_eq!(page.dispatched(&input.path, FieldEvent::Input), text.chars().count());
        }
    }
}
