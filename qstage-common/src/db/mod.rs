//! Database initialization and schema

pub mod init;
