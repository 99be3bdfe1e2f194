//! Site automations built on the engine
//!
//! Each module provides a [`StateGraph`](crate::engine::StateGraph) plus the
//! capabilities it refers to. The engine itself depends on none of them.

pub mod connections;
