//! Key distribution.
//!
//! Locators turn keys into node ids. `ketama` is the weighted consistent-hash
//! continuum; `array_mod` is plain modulo hashing.

pub mod ketama;
pub mod locator;
pub mod modulo;

pub use ketama::{KetamaRing, RingBuilder};
pub use locator::{Distribution, FailureMode, Locator, NodeLocator};
pub use modulo::ModuloLocator;

/// Alias for the main ring type (used by lib.rs).
pub type Ring = KetamaRing;
