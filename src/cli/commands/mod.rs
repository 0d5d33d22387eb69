mod account;
mod school;

pub use account::cmd_create_account;
pub use school::cmd_create_school;
