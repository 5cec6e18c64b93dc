//! Domain types and pure rules shared by the batch pipeline and the HTTP API.

pub mod address;
pub mod filter;
pub mod review;
pub mod types;

pub use address::{NormalizedAddress, COUNTRY_SUFFIX};
pub use filter::EmployeeFilter;
pub use review::{should_flag, REVIEW_KEYWORDS};
pub use types::{
    AddressLayout, BatchReport, Coordinate, EmployeeRecord, ReferencePoints, ResolvedLocation,
    ResultRow, ReviewEntry, Site,
};
