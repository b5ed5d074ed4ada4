//! Processor health tracking.
//!
//! The [`registry::HealthRegistry`] is the single source of truth for "is this processor failing, and how fast is
//! it". It is written by the periodic [`checker`] and by workers that see a delivery fail, and read by the
//! [`crate::DecisionEngine`].
pub mod checker;
pub mod registry;
