// src/handlers/mod.rs
pub mod history;
pub mod history_page;
pub mod status;
