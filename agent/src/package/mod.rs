//! Application packages
//!
//! Packages are opaque installable units with a name. Physically placing
//! one on disk is delegated to an external package tool.

pub mod errors;
pub mod installer;
pub mod manager;
pub mod opkg;

pub use errors::PackageError;
pub use installer::{validate_app_name, PackageInstaller};
pub use manager::AppManager;
pub use opkg::OpkgInstaller;
