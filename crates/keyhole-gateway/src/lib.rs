//! HTTP gateway for Keyhole: shortening, record lookup and redirects.

pub mod app;
pub mod error;
pub mod handlers;
pub mod model;
pub mod state;
pub mod telemetry;

pub use app::App;
pub use state::AppState;
