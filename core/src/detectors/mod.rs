//! Tool-callable skills backed by the triage pipeline

pub mod extract;
pub mod lsb;

pub use extract::PayloadExtractor;
pub use lsb::LsbDetector;
