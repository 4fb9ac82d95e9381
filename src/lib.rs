//! MCP tool server: echo, key-value, item database, task and messaging tools
//! served over STDIO and HTTP.

pub mod clients;
pub mod core;
pub mod tools;
