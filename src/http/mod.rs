//! Request/response types and wire framing (§3, §4.2).

mod message;
mod wire;

pub use message::{Method, Request, Response, Version};
pub use wire::{read_request, read_response, write_request, write_response};
