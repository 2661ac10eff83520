//! Integration tests for the lazy tree data layer

mod clear_races;
mod durable_fallback;
mod persistence;
mod scroll_loading;
mod session_flow;
mod support;
