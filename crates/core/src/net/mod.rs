//! Outbound HTTP plumbing shared by price providers and holdings fetchers.

pub mod parse;
pub mod retry;
pub mod signing;
pub mod transport;
