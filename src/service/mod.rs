pub mod chat_service;
pub mod locks;

pub use chat_service::ChatService;
