// Public entry points: the discovery client and process setup.

pub mod client;
pub mod simple;
