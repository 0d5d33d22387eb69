pub mod access;
pub use access::Forbidden;

pub mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

pub mod token;
pub use token::{SessionTokens, TokenError};

pub mod auth_service;
pub use auth_service::{AccountInfo, AuthError, AuthService, LoginResult};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;

pub mod application_service;
pub use application_service::{ApplicationError, ApplicationService};

pub mod application_service_impl;
pub use application_service_impl::SeaOrmApplicationService;

pub mod scheduler;
pub use scheduler::Scheduler;
