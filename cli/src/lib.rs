//! wifidiag command-line collaborators, exposed as a library for unit tests.

pub mod app;
pub mod capture;
pub mod commands;
pub mod platform;
pub mod persist;
