//! Core data types

pub mod cpu;
pub mod power;
