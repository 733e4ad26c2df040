// Everything between the CLI and the HTTP client lives here
pub mod config;
pub mod error;
pub mod render;
pub mod search;
pub mod server;

pub use config::Config;
pub use error::Error;
pub use render::{OutputFormat, Renderer};
pub use search::SearchBackend;
pub use server::ToolServer;

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
