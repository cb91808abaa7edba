pub mod errors;
pub mod generator;

pub use errors::RefreshTokenError;
pub use generator::RefreshTokenGenerator;
pub use generator::REFRESH_SECRET_BYTES;
