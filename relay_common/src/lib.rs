mod cents;

pub mod helpers;

pub use cents::{Cents, CentsConversionError};
