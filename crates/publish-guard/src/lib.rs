//! Deny-by-default admission checks for npm publishes.
//!
//! Everything here is pure: no I/O, no locks, no storage. The checks run
//! before a publish touches any shared resource so that malformed, oversized
//! or unauthorized requests are turned away cheaply.

mod identity;
mod protection;
mod size;

pub use identity::{validate, validate_name, validate_version, IdentityError, SEMVER_MESSAGE};
pub use protection::{AccessLevel, Authorization, DeniedBy, ProtectionEngine, ProtectionError, ProtectionRule};
pub use size::{check_attachment_size, estimated_decoded_size, SizeError};
