//! Shared utility modules used across nestor components.

pub mod path;
