//! Database models

pub mod commission;
pub mod customer;
pub mod order;
pub mod product;
pub mod stock;

pub use commission::{
    CommissionConfig, CommissionRecord, CommissionRole, CommissionStatus, CommissionType,
};
pub use customer::{Customer, CustomerProfile};
pub use order::{Order, OrderItem, OrderStatus, PaymentStatus};
pub use product::Product;
pub use stock::{MovementType, StockMovement};
