use std::io;
use std::path::PathBuf;

use slot_store::{LayoutError, SlotError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to read config {}: {source}", .path.display())]
    ConfigIo { path: PathBuf, source: io::Error },
    #[error("invalid config {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid layout: {0}")]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Slot(#[from] SlotError),
    #[error("image {}: {source}", .path.display())]
    Image { path: PathBuf, source: io::Error },
    #[error("image {} already exists, pass --force to overwrite", .0.display())]
    Exists(PathBuf),
    #[error("invalid hex data: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("{len} bytes do not fit in a {slot_size}-byte slot")]
    TooLong { len: usize, slot_size: usize },
    #[error("slot range {from}..{to} is empty or exceeds {end}")]
    Range { from: u32, to: u32, end: u32 },
}
