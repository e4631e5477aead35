mod overlay;
mod pages;
mod routes;
mod server;
mod storage;
mod task;
mod telemetry;

pub mod app;
pub mod config;

pub use app::start_app;
