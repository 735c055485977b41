pub mod admission;
pub mod decoder;
pub mod invoker;
pub mod response;
pub mod service;
pub mod workspace;

pub use service::SigningService;
