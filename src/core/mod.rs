pub mod automation;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod llm;
pub mod processors;
pub mod store;
pub mod terminal;
