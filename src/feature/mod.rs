//! The features of the application, each with its API and services.

pub mod greet;
pub mod health;
