//! Route handlers

pub mod generation;
pub mod health;
