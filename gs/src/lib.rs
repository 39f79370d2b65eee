//! GantryStore - generic file-backed record persistence
//!
//! One durable JSON document per record, grouped by record kind under a
//! common root directory. Writes are atomic (temp file + rename) so a
//! crash mid-save never corrupts the previously saved document. There
//! is no locking: concurrent writers are last-write-wins by design.
//!
//! # Modules
//!
//! - [`record`] - The `Record` trait persisted types implement
//! - [`store`] - The `FileStore` save/load/list/delete implementation
//! - [`error`] - Typed store errors

mod error;
mod record;
mod store;

pub use error::StoreError;
pub use record::Record;
pub use store::FileStore;
