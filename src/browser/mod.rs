//! Page backends
//!
//! [`Page`] is the DOM substrate the resolver and executor work against.
//! [`ChromePage`] drives a real Chrome tab through [`BrowserSession`];
//! [`MemoryPage`] is a scriptable in-memory document for offline runs and tests.

pub mod chrome;
pub mod config;
pub mod memory;
pub mod page;
pub mod session;

pub use chrome::{ChromePage, js_string};
pub use config::{ConnectionOptions, LaunchOptions};
pub use memory::{MemoryPage, PageEvent};
pub use page::{ElementHandle, FieldEvent, Page};
pub use session::BrowserSession;
