#![allow(warnings)]

pub mod abi;
pub mod config;
pub mod constants;
pub mod errors; // Structured error taxonomy
pub mod governance;
pub mod governor;
pub mod logger;
pub mod prelude;
pub mod provider;
pub mod retry;
pub mod session; // Connection-intent persistence
