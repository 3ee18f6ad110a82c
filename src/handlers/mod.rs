// src/handlers/mod.rs

pub mod admin;
pub mod assessment;
pub mod auth;
pub mod community;
pub mod dashboard;
pub mod interaction;
pub mod profile;
