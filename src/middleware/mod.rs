pub mod auth;
pub mod request_logger;

pub use auth::AuthUser;
pub use request_logger::request_logger_middleware;
