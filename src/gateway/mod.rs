//! Payment gateway adapters.

pub mod client;
pub mod sandbox;

pub use client::MidtransClient;
pub use sandbox::SandboxGateway;
