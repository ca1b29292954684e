//! Recoil correction: while both trigger buttons are held, a background loop
//! nudges the pointer against the active weapon's configured offsets.

pub mod config;
pub mod correction;
pub mod input;
pub mod persistence;
pub mod profiles;
pub mod shell;

#[cfg(test)]
pub(crate) mod test_support;
