//! Persistent storage: configuration and application bundles

pub mod layout;
pub mod settings;
