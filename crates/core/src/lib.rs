//! Shared vocabulary for the fibermesh cross-connect engine: ids, the data
//! model, the error type and the remote API contract.

pub mod api;
pub mod error;
pub mod ids;
pub mod model;
pub mod ops;
pub mod splice;

pub use api::*;
pub use error::{SpliceError, SpliceResult};
pub use ids::*;
pub use model::*;
pub use ops::*;
pub use splice::*;
