// HTTP server setup (Axum health endpoint + background worker host)
pub mod app;
pub mod routes;

pub use app::*;
