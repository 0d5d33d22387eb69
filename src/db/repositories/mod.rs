pub mod account;
pub mod application;
pub mod school;
pub mod verification_code;
