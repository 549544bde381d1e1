pub mod protocol;
pub mod server;
pub mod transport;

pub use server::{ResourceServer, serve_stdio};
pub use transport::StdioTransport;
