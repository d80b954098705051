pub mod agenda;
pub mod core;
pub mod packages;
pub mod roster;
pub mod sessions;
