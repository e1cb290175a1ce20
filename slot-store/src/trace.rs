//! 诊断协作者：事件输出与嵌套作用域计时
//!
//! 存储核心的控制流与是否开启诊断无关，所有调试输出都经由 [`Tracer`]。
//! 生产环境可使用 [`NoopTracer`]，测试中可记录事件并直接断言。

use core::cell::Cell;

use crate::block_dev::{CardType, DeviceError};

/// 槽位访问方向
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotOp {
    Read,
    Write,
}

/// 诊断事件
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    CardReady(CardType),
    InitFailed(DeviceError),
    BadArgument { slot: u32, size: usize },
    SlotAccess { op: SlotOp, slot: u32, block: u32, offset: usize },
    BlockLoaded(u32),
    ReadFailed { block: u32, error: DeviceError },
    Flushed(u32),
    FlushFailed { block: u32, error: DeviceError },
    ScopeEnter { name: &'static str, depth: u16 },
    ScopeExit { name: &'static str, depth: u16, elapsed_us: Option<u64> },
}

/// 诊断输出接口
pub trait Tracer {
    fn event(&self, event: &Event);

    /// 微秒时间戳，没有时钟源时返回 `None`
    fn now_micros(&self) -> Option<u64> {
        None
    }
}

impl<T: Tracer + ?Sized> Tracer for &T {
    fn event(&self, event: &Event) {
        (**self).event(event)
    }

    fn now_micros(&self) -> Option<u64> {
        (**self).now_micros()
    }
}

/// 丢弃所有事件
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn event(&self, _event: &Event) {}
}

/// 将事件转发到 `log` 门面
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTracer;

const TABS: &str = "\t\t\t\t\t\t\t\t\t\t\t\t\t\t\t\t";

fn indent(depth: u16) -> &'static str {
    &TABS[..(depth as usize).min(TABS.len())]
}

impl Tracer for LogTracer {
    fn event(&self, event: &Event) {
        match *event {
            Event::CardReady(card) => {
                log::info!("Wiring is correct and a SD Card is present.");
                log::info!("Card type: {card}");
            }
            Event::InitFailed(error) => {
                log::error!("initialization failed: {error}");
                log::error!("* is a SD Card inserted?");
                log::error!("* is your wiring correct?");
                log::error!("* does the chip select pin match your shield or module?");
            }
            Event::BadArgument { slot, size } => {
                log::warn!(">>> bad argument! : slot = {slot}, or size = {size}");
            }
            Event::SlotAccess { op, slot, block, offset } => {
                let name = match op {
                    SlotOp::Read => "read_slot",
                    SlotOp::Write => "write_slot",
                };
                log::debug!("{name} slot = {slot}, block = {block}, offset = {offset}");
            }
            Event::BlockLoaded(block) => log::trace!("block {block} loaded"),
            Event::ReadFailed { block, error } => {
                log::error!("read_block {block} failed: {error}");
            }
            Event::Flushed(block) => log::trace!("block {block} flushed"),
            Event::FlushFailed { block, error } => {
                log::error!("flush of block {block} failed: {error}");
            }
            Event::ScopeEnter { name, depth } => {
                log::trace!("{}>>> pushed : {name}", indent(depth));
            }
            Event::ScopeExit { name, depth, elapsed_us } => {
                let tabs = indent(depth);
                log::trace!("{tabs}+++ nest      : {depth}");
                match elapsed_us {
                    Some(us) => log::trace!("{tabs}+++ exec time : {us} [usec]"),
                    None => log::trace!("{tabs}+++ exec time : n/a"),
                }
                log::trace!("{tabs}<<< popped : {name}");
            }
        }
    }
}

/// 作用域嵌套深度计数器
///
/// 由持有者显式共享给所有 [`ScopeTimer`]，不使用全局变量。
#[derive(Debug, Default)]
pub struct NestDepth(Cell<u16>);

impl NestDepth {
    pub const fn new() -> Self {
        Self(Cell::new(0))
    }

    pub fn get(&self) -> u16 {
        self.0.get()
    }
}

/// 作用域计时令牌
///
/// 创建时记录起始时间并增加嵌套深度；析构时（包括提前返回的路径）
/// 恢复深度并输出耗时。
pub struct ScopeTimer<'a, T: Tracer> {
    tracer: &'a T,
    depth: &'a NestDepth,
    name: &'static str,
    begin: Option<u64>,
}

impl<'a, T: Tracer> ScopeTimer<'a, T> {
    pub fn enter(tracer: &'a T, depth: &'a NestDepth, name: &'static str) -> Self {
        let current = depth.get();
        tracer.event(&Event::ScopeEnter { name, depth: current });
        depth.0.set(current.saturating_add(1));
        Self {
            tracer,
            depth,
            name,
            begin: tracer.now_micros(),
        }
    }
}

impl<T: Tracer> Drop for ScopeTimer<'_, T> {
    fn drop(&mut self) {
        let end = self.tracer.now_micros();
        let depth = self.depth.get().saturating_sub(1);
        self.depth.0.set(depth);
        let elapsed_us = match (self.begin, end) {
            (Some(begin), Some(end)) => Some(end.saturating_sub(begin)),
            _ => None,
        };
        self.tracer.event(&Event::ScopeExit {
            name: self.name,
            depth,
            elapsed_us,
        });
    }
}
