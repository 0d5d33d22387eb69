pub use super::accounts::Entity as Accounts;
pub use super::applications::Entity as Applications;
pub use super::schools::Entity as Schools;
pub use super::verification_codes::Entity as VerificationCodes;
