//! Types, traits and errors shared by every engine component

pub mod clock;
pub mod errors;
pub mod traits;
pub mod types;
