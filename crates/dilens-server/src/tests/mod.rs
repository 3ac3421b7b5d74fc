//! In-crate tests for the dispatch loop.

mod dispatch;
mod support;
