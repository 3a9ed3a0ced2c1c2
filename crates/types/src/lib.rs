//! Shared data model for the data room workspace.
//!
//! Records in this crate are plain data: they carry no behaviour beyond
//! construction helpers and serde encoding. State transitions live in
//! `dataroom-core`.

pub mod encoding;
pub mod ids;
pub mod inputs;
pub mod outputs;
pub mod records;

pub use encoding::*;
pub use ids::*;
pub use inputs::*;
pub use outputs::*;
pub use records::*;
