//! Per-client identities and the loop that keeps their sessions warm.

pub mod renewal;
pub mod store;

pub use renewal::{RenewalLoop, RenewalReport, SessionRenewer};
pub use store::{Clock, Credentials, IdentityEntry, IdentityKey, SessionStore, SystemClock};
