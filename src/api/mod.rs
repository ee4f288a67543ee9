pub mod format;

pub use format::{Envelope, TIMESTAMP_FORMAT};
