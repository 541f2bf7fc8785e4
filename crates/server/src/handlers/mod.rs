//! HTTP request handlers.

pub mod admin;
pub mod common;
pub mod files;
pub mod uploads;

pub use admin::*;
pub use common::*;
pub use files::*;
pub use uploads::*;
