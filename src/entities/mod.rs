pub mod prelude;

pub mod accounts;
pub mod applications;
pub mod schools;
pub mod verification_codes;
