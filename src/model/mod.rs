//! Domain model: trains and the contracts that group them.

pub mod contract;
pub mod train;

pub use contract::Contract;
pub use train::Train;
