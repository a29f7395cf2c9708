//! Order fulfillment transaction engine
//!
//! # Components
//!
//! - [`stock`] - per-product quantity with locked deduct/restore and an
//!   append-only movement log
//! - [`commission`] - payout computation and the pending/approved/paid
//!   workflow
//! - [`customer`] - idempotent find-or-create by email, aggregate counters
//! - [`coordinator`] - the atomic unit of work tying everything together
//!
//! All cross-request coordination goes through PostgreSQL row locks; the
//! engine holds no in-process locks, so handlers can run across multiple
//! processes.

pub mod commission;
pub mod coordinator;
pub mod customer;
pub mod stock;

pub use coordinator::{CustomerRef, NewOrderItem, OrderRequest, PlacedOrder, StatedTotals};
