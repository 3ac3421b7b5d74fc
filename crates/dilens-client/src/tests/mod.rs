//! Crate-level unit and behaviour tests for the client.

mod support;
