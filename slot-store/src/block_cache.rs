use crate::block_dev::{BlockDevice, DeviceError, BLOCK_SZ};
use crate::trace::{Event, Tracer};

/// 加载块的意图
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    /// 只读取缓存内容
    Read,
    /// 即将修改缓存内容，加载后标记为脏
    Write,
}

/// 块缓存操作失败时涉及的块与设备错误
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheError {
    /// 写回 `block` 失败，缓存保持脏且驻留
    Flush { block: u32, error: DeviceError },
    /// 读取 `block` 失败，驻留块不变
    Load { block: u32, error: DeviceError },
}

/// 单块缓存
///
/// 内存中至多驻留一个块，所有对设备的读写都经过这里。
/// `dirty` 为真时，`cache` 是 `block_id` 内容的权威版本。
pub struct BlockCache<D> {
    /// 缓存的块数据
    cache: [u8; BLOCK_SZ],
    /// 驻留的块编号，`None` 表示尚未加载任何块
    block_id: Option<u32>,
    /// 块设备
    block_device: D,
    /// 脏标记，表示缓存含有尚未写回的修改
    dirty: bool,
}

impl<D: BlockDevice> BlockCache<D> {
    /// 创建空缓存，不访问设备
    pub fn new(block_device: D) -> Self {
        Self {
            cache: [0u8; BLOCK_SZ],
            block_id: None,
            block_device,
            dirty: false,
        }
    }

    pub fn resident(&self) -> Option<u32> {
        self.block_id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn device(&self) -> &D {
        &self.block_device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.block_device
    }

    /// 同步缓存到块设备
    ///
    /// 仅在 dirty 时写回；失败时保留 dirty，重复调用会重试同一次写入。
    pub fn flush(&mut self, tracer: &impl Tracer) -> Result<(), CacheError> {
        let block = match self.block_id {
            Some(block) if self.dirty => block,
            _ => return Ok(()),
        };
        if let Err(error) = self.block_device.write_block(block, &self.cache) {
            tracer.event(&Event::FlushFailed { block, error });
            return Err(CacheError::Flush { block, error });
        }
        self.dirty = false;
        tracer.event(&Event::Flushed(block));
        Ok(())
    }

    /// 确保 `block` 驻留在缓存中
    ///
    /// 切换块之前必须先成功写回旧块；读取失败时不把新块标记为驻留。
    /// `Intent::Write` 无论是否发生切换都会把缓存标记为脏。
    pub fn load(&mut self, block: u32, intent: Intent, tracer: &impl Tracer) -> Result<(), CacheError> {
        if self.block_id != Some(block) {
            self.flush(tracer)?;
            // 设备可能在失败前写入了部分数据，先读到临时缓冲区
            let mut incoming = [0u8; BLOCK_SZ];
            if let Err(error) = self.block_device.read_block(block, &mut incoming) {
                tracer.event(&Event::ReadFailed { block, error });
                return Err(CacheError::Load { block, error });
            }
            self.cache = incoming;
            self.block_id = Some(block);
            tracer.event(&Event::BlockLoaded(block));
        }
        if intent == Intent::Write {
            self.dirty = true;
        }
        Ok(())
    }

    /// 驻留块中 `[offset, offset + len)` 的只读视图
    ///
    /// # Panics
    /// `offset + len > 512` 时 panic。
    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.cache[offset..offset + len]
    }

    /// 驻留块中 `[offset, offset + len)` 的可变视图
    ///
    /// 调用者需先以 `Intent::Write` 加载该块。
    ///
    /// # Panics
    /// `offset + len > 512` 时 panic。
    pub fn slice_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        debug_assert!(self.dirty);
        &mut self.cache[offset..offset + len]
    }
}
