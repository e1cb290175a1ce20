use crate::block_cache::CacheError;
use crate::block_dev::DeviceError;

/// 槽位存储的错误类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    /// 槽位编号越界或请求大小超过槽位容量，未进行任何 I/O
    #[error("bad argument: slot = {slot}, size = {size}")]
    InvalidArgument { slot: u32, size: usize },
    /// 设备初始化失败
    #[error("initialization failed: {0}")]
    Init(DeviceError),
    /// `begin` 尚未成功
    #[error("block device is not ready")]
    NotReady,
    #[error("failed to read block {block}: {source}")]
    DeviceRead { block: u32, source: DeviceError },
    #[error("failed to write block {block}: {source}")]
    DeviceWrite { block: u32, source: DeviceError },
}

impl SlotError {
    /// 旧接口的 `int8` 状态码
    ///
    /// 写入失败按总线错误区分：1 发送缓冲溢出，2 地址 NACK，
    /// 3 数据 NACK，4 其他；其余错误统一为 -1。
    pub fn status(&self) -> i8 {
        match self {
            SlotError::DeviceWrite { source, .. } => match source {
                DeviceError::BusOverflow => 1,
                DeviceError::AddressNack => 2,
                DeviceError::DataNack => 3,
                DeviceError::Timeout | DeviceError::Other => 4,
            },
            _ => -1,
        }
    }
}

impl From<CacheError> for SlotError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Flush { block, error } => SlotError::DeviceWrite {
                block,
                source: error,
            },
            CacheError::Load { block, error } => SlotError::DeviceRead {
                block,
                source: error,
            },
        }
    }
}
