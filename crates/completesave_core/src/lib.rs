pub mod container;
pub mod core_api;
pub mod layout;
pub mod reader;

pub use container::{
    ContainerError, ContainerHeader, DecodedContainer, Encoder, FrameInfo, decode,
    decode_with_layout, encode,
};
