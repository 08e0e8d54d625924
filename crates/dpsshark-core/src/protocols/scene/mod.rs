//! Scene-server identification.
//!
//! The game server endpoint is not known up front. It is discovered by
//! recognizing one of two payload shapes that only the scene server sends:
//! a batch of small length-prefixed sub-packets carrying the scene marker, or
//! the fixed-size login return packet. Byte positions live in `layout`,
//! bounded access and sub-packet walking in `reader`.

pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::{ServerSignature, identify_server};
