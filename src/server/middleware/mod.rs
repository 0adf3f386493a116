pub mod auth;
pub mod rate_limit;
pub mod recovery;

// Re-export main components for cleaner imports
pub use auth::{authorize, Claims, Role, TokenValidator};
pub use rate_limit::{AdmissionLimiter, AdmissionStore, LimitContext};
