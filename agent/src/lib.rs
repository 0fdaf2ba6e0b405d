//! Appvisor Library
//!
//! Container lifecycle control, application packages and atomic
//! multi-application updates for embedded devices.

pub mod app;
pub mod container;
pub mod errors;
pub mod filesys;
pub mod header;
pub mod logs;
pub mod package;
pub mod storage;
pub mod update;
pub mod utils;
