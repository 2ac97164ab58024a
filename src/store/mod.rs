//! Lead persistence — trait and REST backend.

mod rest;
mod traits;

pub use rest::RestLeadStore;
pub use traits::{LeadStore, LeadUpdate};
