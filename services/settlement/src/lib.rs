//! Settlement pipeline
//!
//! The operator and its FIFO transaction queues: matched batches go in,
//! trigger units come back, and the chain's asynchronous acknowledgements
//! settle each trade later via the event coordinator.

pub mod operator;
pub mod txqueue;

pub use operator::Operator;
pub use txqueue::{TxQueue, TxQueueHandle};
