//! Stdio transport (§4.3.1): spawns an MCP server as a child process and
//! frames newline-delimited JSON over its stdin/stdout.

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod transport;

pub use transport::StdioTransport;
