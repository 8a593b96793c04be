//! Migrations of the `monolith` app, oldest first.

pub mod m0039_auto_20201012_0916;
pub mod m0040_auto_20201012_1432;

pub const APP: &str = "monolith";
pub const ENROLLMENT_TABLE: &str = "monolith_enrollment";
pub const ENROLLED_MACHINE_TABLE: &str = "monolith_enrolledmachine";
