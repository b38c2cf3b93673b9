//! Feathered patch compositing.

pub mod blend;
pub mod feather;
pub mod mask;
