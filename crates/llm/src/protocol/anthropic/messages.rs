mod cache_control;
mod context_management;
mod convert;
mod input_message;
mod mcp_server;
mod request;
mod response;
mod response_content;
mod sse;
mod tool;

#[allow(unused)]
pub use cache_control::*;
pub use context_management::*;
pub use convert::*;
pub use input_message::*;
pub use mcp_server::*;
pub use request::*;
pub use response::*;
pub use response_content::*;
pub use sse::*;
pub use tool::*;
