pub mod agent;
pub mod chat;
pub mod events;
pub mod registrar;
