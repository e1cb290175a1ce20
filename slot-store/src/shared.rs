use spin::{Mutex, MutexGuard};

use crate::block_dev::{BlockDevice, CardType, SpiSpeed};
use crate::error::SlotError;
use crate::store::SlotStore;
use crate::trace::{LogTracer, Tracer};

/// 可在多个执行上下文间共享的槽位存储
///
/// 每个公开调用（加载、复制、写回）都在同一把锁内完成。
pub struct SharedSlotStore<D, T = LogTracer> {
    inner: Mutex<SlotStore<D, T>>,
}

impl<D: BlockDevice, T: Tracer> SharedSlotStore<D, T> {
    pub const fn new(store: SlotStore<D, T>) -> Self {
        Self {
            inner: Mutex::new(store),
        }
    }

    pub fn begin(&self, speed: SpiSpeed, chip_select: u8) -> Result<CardType, SlotError> {
        self.inner.lock().begin(speed, chip_select)
    }

    pub fn read_slot(&self, slot: u32, out: &mut [u8]) -> Result<usize, SlotError> {
        self.inner.lock().read_slot(slot, out)
    }

    pub fn write_slot(&self, slot: u32, data: &[u8]) -> Result<(), SlotError> {
        self.inner.lock().write_slot(slot, data)
    }

    pub fn flush(&self) -> Result<(), SlotError> {
        self.inner.lock().flush()
    }

    /// 持有锁执行多步操作
    pub fn lock(&self) -> MutexGuard<'_, SlotStore<D, T>> {
        self.inner.lock()
    }

    pub fn into_inner(self) -> SlotStore<D, T> {
        self.inner.into_inner()
    }
}
