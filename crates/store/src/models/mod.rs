//! Domain models for the store.

pub mod customer;
pub mod inventory;
pub mod order;
pub mod product;

pub use customer::Customer;
pub use inventory::{InventoryRecord, Movement};
pub use order::{
    NewOrder, NewOrderLine, Order, OrderLine, OrderOutcome, PaymentRecord, StateTransition,
};
pub use product::Product;
