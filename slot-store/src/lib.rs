//! slot-store: SD 卡上的定长槽位存储
//!
//! 数据流：调用方 → [`SlotStore`] → [`SlotLayout`]（计算块号与偏移）
//! → [`BlockCache`]（确保目标块驻留，必要时先写回旧块）→ [`BlockDevice`]。

#![cfg_attr(not(test), no_std)]

mod block_cache;
mod block_dev;
mod error;
mod layout;
mod shared;
mod store;
mod trace;

pub use block_cache::{BlockCache, CacheError, Intent};
pub use block_dev::{BlockDevice, CardType, DeviceError, SpiSpeed, BLOCK_SZ};
pub use error::SlotError;
pub use layout::{
    LayoutError, SlotAddress, SlotLayout, ADDRESS_BYTES, BASE_BLOCK, CAPACITY_BYTES, CHUNK_SIZE,
    SLOT_BEGIN, SLOT_END, SLOT_SIZE,
};
pub use shared::SharedSlotStore;
pub use store::SlotStore;
pub use trace::{Event, LogTracer, NestDepth, NoopTracer, ScopeTimer, SlotOp, Tracer};
