pub mod server;
mod types;
