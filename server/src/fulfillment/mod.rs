//! Stars Fulfillment
//!
//! Hand-off from a confirmed purchase to the external delivery automation.

pub mod invoker;
pub mod pool;
pub mod types;

pub use invoker::{CommandInvoker, FulfillmentInvoker, UnconfiguredInvoker};
pub use pool::FulfillmentPool;
pub use types::{AmountError, FulfillmentError, FulfillmentRequest, StarsAmount};
