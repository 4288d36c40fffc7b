pub mod client;
pub mod connection;
pub mod types;

pub use client::{GatewayClient, ManagementClient};
pub use connection::GatewayConnection;
