// Request-scoped middleware

pub mod request_context;

pub use request_context::*;
