//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared,
//! clonable resources every connection handler needs.

use crate::config::Config;
use std::sync::Arc;
use voice_relay_core::LiveClient;

/// System instruction used when no `SYSTEM_INSTRUCTION_PATH` is configured.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = include_str!("../prompts/system_instruction.md");

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub live_client: Arc<dyn LiveClient>,
    pub system_instruction: Arc<String>,
    pub config: Arc<Config>,
}
