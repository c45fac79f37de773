//! Snapguard API crate - axum HTTP server for the dashboard contract.
//!
//! Exposes the scan record listing, per-record deletion (immediate and
//! scheduled), the pending-deletion listing, a health probe, and static
//! serving of the managed screenshot directory so degraded local image
//! URLs stay dereferenceable.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
