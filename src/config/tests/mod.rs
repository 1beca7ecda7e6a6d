//! Unit tests for liveswap configuration types.
//!
//! - [`helpers`] - Shared fixtures and helper functions
//! - [`types_tests`] - Defaults and TOML deserialisation
//! - [`layer_precedence_tests`] - `MergeComposer` layer precedence

mod helpers;
