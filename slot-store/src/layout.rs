use core::ops::RangeInclusive;

use crate::block_dev::BLOCK_SZ;
use crate::error::SlotError;

/// 槽位区域容量（字节）
pub const CAPACITY_BYTES: u32 = 0x20000;
/// 每个槽位在设备上占用的字节数
pub const CHUNK_SIZE: usize = 32;
/// 每个块内寻址协议占用的字节数，调用方不可见
pub const ADDRESS_BYTES: usize = 2;
/// 槽位区域之前为元数据保留的块数
pub const BASE_BLOCK: u32 = 32;
/// 每个槽位可用的字节数 (32 - 2 = 30)
pub const SLOT_SIZE: usize = CHUNK_SIZE - ADDRESS_BYTES;
/// 第一个槽位编号
pub const SLOT_BEGIN: u32 = 0;
/// 槽位编号上界（不含）(0x20000 / 32 = 4096)
pub const SLOT_END: u32 = CAPACITY_BYTES / CHUNK_SIZE as u32;

/// 布局参数不合法
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("chunk size {0} must be a non-zero divisor of the 512-byte block")]
    ChunkSize(usize),
    #[error("address overhead {address_bytes} leaves no payload in a {chunk_size}-byte chunk")]
    NoPayload { chunk_size: usize, address_bytes: usize },
    #[error("capacity {0} bytes holds no slot")]
    NoSlots(u32),
    #[error("slot area exceeds the 32-bit block address space")]
    TooLarge,
}

/// 槽位在设备上的物理位置
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotAddress {
    pub block: u32,
    pub offset: usize,
}

/// 持久化布局
///
/// 设备上从 `base_block` 开始连续排列 `slot_end()` 个 chunk，
/// 每个 chunk 前 `slot_size()` 字节为槽位数据。chunk 大小整除块大小，
/// 因此槽位不会跨越块边界。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotLayout {
    capacity_bytes: u32,
    chunk_size: usize,
    address_bytes: usize,
    base_block: u32,
}

impl SlotLayout {
    /// 默认布局：`block = 32 + slot * 32 / 512`
    pub const DEFAULT: Self = Self {
        capacity_bytes: CAPACITY_BYTES,
        chunk_size: CHUNK_SIZE,
        address_bytes: ADDRESS_BYTES,
        base_block: BASE_BLOCK,
    };

    pub fn new(
        capacity_bytes: u32,
        chunk_size: usize,
        address_bytes: usize,
        base_block: u32,
    ) -> Result<Self, LayoutError> {
        if chunk_size == 0 || chunk_size > BLOCK_SZ || BLOCK_SZ % chunk_size != 0 {
            return Err(LayoutError::ChunkSize(chunk_size));
        }
        if address_bytes >= chunk_size {
            return Err(LayoutError::NoPayload {
                chunk_size,
                address_bytes,
            });
        }
        let layout = Self {
            capacity_bytes,
            chunk_size,
            address_bytes,
            base_block,
        };
        if layout.slot_end() == 0 {
            return Err(LayoutError::NoSlots(capacity_bytes));
        }
        let used = layout.slot_end() as u64 * chunk_size as u64;
        let last = (used - 1) / BLOCK_SZ as u64;
        if u64::from(base_block) + last > u64::from(u32::MAX) {
            return Err(LayoutError::TooLarge);
        }
        Ok(layout)
    }

    pub fn capacity_bytes(&self) -> u32 {
        self.capacity_bytes
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn address_bytes(&self) -> usize {
        self.address_bytes
    }

    pub fn base_block(&self) -> u32 {
        self.base_block
    }

    /// 单个槽位可用字节数
    pub fn slot_size(&self) -> usize {
        self.chunk_size - self.address_bytes
    }

    /// 槽位编号上界（不含）
    pub fn slot_end(&self) -> u32 {
        self.capacity_bytes / self.chunk_size as u32
    }

    /// 每个块容纳的槽位数
    pub fn slots_per_block(&self) -> u32 {
        (BLOCK_SZ / self.chunk_size) as u32
    }

    /// 槽位区域占用的块范围（闭区间）
    pub fn block_span(&self) -> RangeInclusive<u32> {
        self.base_block..=self.address_of(self.slot_end() - 1).block
    }

    /// 计算槽位所在的块号与块内偏移
    ///
    /// 不做范围检查，调用前应先 [`validate`](Self::validate)。
    pub fn address_of(&self, slot: u32) -> SlotAddress {
        let byte = u64::from(slot) * self.chunk_size as u64;
        SlotAddress {
            block: self.base_block + (byte / BLOCK_SZ as u64) as u32,
            offset: (byte % BLOCK_SZ as u64) as usize,
        }
    }

    /// 检查槽位编号与请求大小
    pub fn validate(&self, slot: u32, size: usize) -> Result<(), SlotError> {
        if slot >= self.slot_end() || size > self.slot_size() {
            return Err(SlotError::InvalidArgument { slot, size });
        }
        Ok(())
    }
}

impl Default for SlotLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}
