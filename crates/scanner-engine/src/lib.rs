pub mod cancel;
pub mod error;
pub mod pacing;
pub mod scan;
