pub mod error;
pub mod response;

pub use error::ServerError;
pub use response::ApiResponse;
