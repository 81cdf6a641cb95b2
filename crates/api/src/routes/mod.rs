//! Route handlers

pub mod emergency;
pub mod session;
pub mod settings;
