pub mod client_ip;
pub mod handlers;
pub mod router;
