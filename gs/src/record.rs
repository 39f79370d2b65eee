//! Record trait definition

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A persistable record with a stable identifier
///
/// Implementors get file-per-record persistence through [`crate::FileStore`].
/// `KIND` names the subdirectory records of this type live under
/// (e.g. "tasks"), and `record_id` supplies the file stem.
pub trait Record: Serialize + DeserializeOwned {
    /// Subdirectory name for this record type
    const KIND: &'static str;

    /// Stable unique identifier for this record
    fn record_id(&self) -> String;
}
