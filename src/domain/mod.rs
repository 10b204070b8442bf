//! Domain layer: money, the fee split, payment records and the ports the
//! application layer depends on.

pub mod distribution;
pub mod money;
pub mod ports;
pub mod records;
pub mod webhook;
