//! Shared utility modules used across Tessera components.

pub mod budget;
pub mod prime;
pub mod varint;
