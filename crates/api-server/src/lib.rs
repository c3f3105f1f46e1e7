#![warn(clippy::unwrap_used)]

pub mod message_rest;
pub mod rest;
pub mod server;
pub mod session_rest;
pub mod swagger;

pub use rest::AppState;
pub use server::{build_router, ApiServer};
pub use swagger::ApiDoc;
