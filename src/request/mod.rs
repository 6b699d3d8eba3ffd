pub mod body;
pub mod executor;
pub mod service;
pub mod types;

pub use body::{assemble_body, collapse_lines};
pub use executor::{RequestExecutor, CONTENT_TYPE_JSON};
pub use service::RequestService;
pub use types::*;
