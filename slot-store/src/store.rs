use crate::block_cache::{BlockCache, Intent};
use crate::block_dev::{BlockDevice, CardType, SpiSpeed};
use crate::error::SlotError;
use crate::layout::{SlotAddress, SlotLayout};
use crate::trace::{Event, LogTracer, NestDepth, ScopeTimer, SlotOp, Tracer};

/// 槽位存储
///
/// 将槽位编号映射到物理块，经由单块缓存读写设备。
/// 每次 `write_slot` 都会立即写回，对调用方而言是同步持久化的。
pub struct SlotStore<D, T = LogTracer> {
    cache: BlockCache<D>,
    layout: SlotLayout,
    tracer: T,
    depth: NestDepth,
    ready: bool,
}

impl<D: BlockDevice> SlotStore<D> {
    /// 使用 `log` 输出诊断信息
    pub fn new(block_device: D, layout: SlotLayout) -> Self {
        Self::with_tracer(block_device, layout, LogTracer)
    }
}

impl<D: BlockDevice, T: Tracer> SlotStore<D, T> {
    pub fn with_tracer(block_device: D, layout: SlotLayout, tracer: T) -> Self {
        Self {
            cache: BlockCache::new(block_device),
            layout,
            tracer,
            depth: NestDepth::new(),
            ready: false,
        }
    }

    /// 初始化块设备
    ///
    /// 失败后存储保持未就绪，之后的读写都返回 [`SlotError::NotReady`]。
    /// 可以再次调用重试。
    pub fn begin(&mut self, speed: SpiSpeed, chip_select: u8) -> Result<CardType, SlotError> {
        if let Err(error) = self.cache.device_mut().init(speed, chip_select) {
            self.ready = false;
            self.tracer.event(&Event::InitFailed(error));
            return Err(SlotError::Init(error));
        }
        let card = self.cache.device().card_type();
        self.ready = true;
        self.tracer.event(&Event::CardReady(card));
        Ok(card)
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    pub fn cache(&self) -> &BlockCache<D> {
        &self.cache
    }

    pub fn tracer(&self) -> &T {
        &self.tracer
    }

    /// 读取槽位的前 `out.len()` 字节
    ///
    /// 成功时返回复制的字节数，即 `out.len()`。
    pub fn read_slot(&mut self, slot: u32, out: &mut [u8]) -> Result<usize, SlotError> {
        let _scope = ScopeTimer::enter(&self.tracer, &self.depth, "SlotStore::read_slot");
        let size = out.len();
        let addr = self.locate(SlotOp::Read, slot, size)?;
        self.cache.load(addr.block, Intent::Read, &self.tracer)?;
        out.copy_from_slice(self.cache.slice(addr.offset, size));
        Ok(size)
    }

    /// 写入槽位的前 `data.len()` 字节并立即写回设备
    ///
    /// 写回失败时返回 [`SlotError::DeviceWrite`]，数据仍保留在缓存中并标记为脏，
    /// 可通过 [`flush`](Self::flush) 重试。
    pub fn write_slot(&mut self, slot: u32, data: &[u8]) -> Result<(), SlotError> {
        let _scope = ScopeTimer::enter(&self.tracer, &self.depth, "SlotStore::write_slot");
        let size = data.len();
        let addr = self.locate(SlotOp::Write, slot, size)?;
        self.cache.load(addr.block, Intent::Write, &self.tracer)?;
        self.cache.slice_mut(addr.offset, size).copy_from_slice(data);
        self.cache.flush(&self.tracer)?;
        Ok(())
    }

    /// 写回缓存中尚未持久化的修改
    pub fn flush(&mut self) -> Result<(), SlotError> {
        self.cache.flush(&self.tracer)?;
        Ok(())
    }

    /// 旧接口：返回复制的字节数，失败返回 -1
    ///
    /// 返回值是 `i8`，`read_size` 超过 127 时按参数错误处理。
    pub fn legacy_read_slot(&mut self, slot: u32, data: &mut [u8], read_size: u8) -> i8 {
        let out = match data.get_mut(..read_size as usize) {
            Some(out) if read_size <= i8::MAX as u8 => out,
            _ => {
                self.tracer.event(&Event::BadArgument {
                    slot,
                    size: read_size as usize,
                });
                return -1;
            }
        };
        match self.read_slot(slot, out) {
            Ok(size) => i8::try_from(size).unwrap_or(-1),
            Err(_) => -1,
        }
    }

    /// 旧接口：成功返回 0，失败返回 [`SlotError::status`]
    pub fn legacy_write_slot(&mut self, slot: u32, data: &[u8], write_size: u8) -> i8 {
        let Some(data) = data.get(..write_size as usize) else {
            self.tracer.event(&Event::BadArgument {
                slot,
                size: write_size as usize,
            });
            return -1;
        };
        match self.write_slot(slot, data) {
            Ok(()) => 0,
            Err(err) => err.status(),
        }
    }

    fn locate(&self, op: SlotOp, slot: u32, size: usize) -> Result<SlotAddress, SlotError> {
        if let Err(err) = self.layout.validate(slot, size) {
            self.tracer.event(&Event::BadArgument { slot, size });
            return Err(err);
        }
        if !self.ready {
            return Err(SlotError::NotReady);
        }
        let addr = self.layout.address_of(slot);
        self.tracer.event(&Event::SlotAccess {
            op,
            slot,
            block: addr.block,
            offset: addr.offset,
        });
        Ok(addr)
    }
}
