//! Greeting people and changing how they are greeted.

pub mod greet_api;
pub mod greet_service;
