//! Reef Server — order-management admin backend
//!
//! The core is the order fulfillment transaction engine: one atomic unit
//! of work per order across stock, commissions, and customer aggregates,
//! coordinated through PostgreSQL row locks.
//!
//! # Module structure
//!
//! ```text
//! src/
//! ├── config.rs      # env configuration
//! ├── state.rs       # shared AppState
//! ├── error.rs       # AppError + response envelope
//! ├── auth/          # request identity, role policy table
//! ├── db/            # pool, migrations, models
//! ├── fulfillment/   # stock ledger, commissions, customers, coordinator
//! ├── webhook/       # signature verification, payload normalizer
//! ├── audit/         # raw webhook payload sink
//! ├── notify/        # post-commit notification dispatch
//! └── api/           # HTTP routes and handlers
//! ```

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod fulfillment;
pub mod notify;
pub mod state;
pub mod util;
pub mod webhook;

pub use config::Config;
pub use error::{ApiResponse, AppError, AppResult};
pub use state::AppState;
