//! Progress observations emitted at part boundaries.

use serde::Serialize;

/// Direction of a chunked transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Upload,
    Download,
}

/// One progress observation.
///
/// Totals are `None` when the metadata record that would supply them is
/// missing (downloads of a container without a record).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferProgress {
    pub direction: TransferDirection,
    pub parts_done: u32,
    pub parts_total: Option<u32>,
    pub bytes_done: u64,
    pub bytes_total: Option<u64>,
    /// Remaining time, human readable ("unknown" when it cannot be estimated).
    pub eta: String,
    /// Instantaneous rate of the last part, e.g. "4.00 MB/s".
    pub rate: String,
}
