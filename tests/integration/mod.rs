//! Integration tests for the dynamic-context engine

mod config_integration;
mod frame_registry;
