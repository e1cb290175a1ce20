//! 工具配置：总线参数与持久化布局，从 TOML 文件读取
//!
//! ```toml
//! [bus]
//! speed = "half"
//! chip_select = 4
//!
//! [layout]
//! capacity_bytes = 131072
//! chunk_size = 32
//! address_bytes = 2
//! base_block = 32
//! ```

use std::fs;
use std::path::Path;

use serde_derive::Deserialize;
use slot_store::{SlotLayout, SpiSpeed, ADDRESS_BYTES, BASE_BLOCK, CAPACITY_BYTES, CHUNK_SIZE};

use crate::error::ToolError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusSpeed {
    Full,
    #[default]
    Half,
    Quarter,
}

impl From<BusSpeed> for SpiSpeed {
    fn from(speed: BusSpeed) -> Self {
        match speed {
            BusSpeed::Full => SpiSpeed::Full,
            BusSpeed::Half => SpiSpeed::Half,
            BusSpeed::Quarter => SpiSpeed::Quarter,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusConfig {
    pub speed: BusSpeed,
    pub chip_select: u8,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            speed: BusSpeed::Half,
            chip_select: 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub capacity_bytes: u32,
    pub chunk_size: usize,
    pub address_bytes: usize,
    pub base_block: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: CAPACITY_BYTES,
            chunk_size: CHUNK_SIZE,
            address_bytes: ADDRESS_BYTES,
            base_block: BASE_BLOCK,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub bus: BusConfig,
    pub layout: LayoutConfig,
}

impl Config {
    /// 读取配置文件；未指定路径时使用默认配置
    pub fn load(path: Option<&Path>) -> Result<Self, ToolError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|source| ToolError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ToolError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn layout(&self) -> Result<SlotLayout, ToolError> {
        let l = &self.layout;
        Ok(SlotLayout::new(
            l.capacity_bytes,
            l.chunk_size,
            l.address_bytes,
            l.base_block,
        )?)
    }
}
