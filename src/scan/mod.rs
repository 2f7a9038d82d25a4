//! Scan records and their repository.

mod model;
mod repository;

pub use model::{NewScan, Scan, STATUS_PENDING};
pub use repository::{ScanRepository, SCANS_COLLECTION};
