//! slot-store crate 功能性验证测试
//!
//! 这些测试验证 slot-store crate 对外提供的 API 的正确性。
//! 测试在用户态环境运行，使用 std。
//!
//! 注意：slot-store 是一个 no_std crate，但测试使用 std 来创建 mock 块设备，
//! mock 设备会统计读写次数并可注入故障。

use std::cell::{Cell, RefCell};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread;

use slot_store::{
    BlockCache, BlockDevice, CardType, DeviceError, Event, Intent, NoopTracer, SharedSlotStore,
    SlotError, SlotLayout, SlotStore, SpiSpeed, Tracer, BLOCK_SZ, SLOT_END, SLOT_SIZE,
};

struct MockState {
    blocks: Vec<[u8; BLOCK_SZ]>,
    reads: usize,
    writes: Vec<u32>,
    fail_init: Option<DeviceError>,
    fail_read: Option<DeviceError>,
    // 失败前先向缓冲区写入部分垃圾数据
    garble_on_fail: bool,
    fail_write: Option<DeviceError>,
    card: CardType,
}

// Mock 块设备实现，克隆出的句柄共享同一份状态
#[derive(Clone)]
struct MockBlockDevice {
    state: Arc<StdMutex<MockState>>,
}

impl MockBlockDevice {
    fn new(num_blocks: usize) -> Self {
        Self {
            state: Arc::new(StdMutex::new(MockState {
                blocks: vec![[0u8; BLOCK_SZ]; num_blocks],
                reads: 0,
                writes: Vec::new(),
                fail_init: None,
                fail_read: None,
                garble_on_fail: false,
                fail_write: None,
                card: CardType::Sdhc,
            })),
        }
    }

    fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    fn writes(&self) -> Vec<u32> {
        self.state.lock().unwrap().writes.clone()
    }

    fn io_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.reads + state.writes.len()
    }

    fn block(&self, block_id: u32) -> [u8; BLOCK_SZ] {
        self.state.lock().unwrap().blocks[block_id as usize]
    }

    fn fail_init(&self, error: Option<DeviceError>) {
        self.state.lock().unwrap().fail_init = error;
    }

    fn fail_read(&self, error: Option<DeviceError>) {
        self.state.lock().unwrap().fail_read = error;
    }

    fn fail_read_after_garbling(&self, error: DeviceError) {
        let mut state = self.state.lock().unwrap();
        state.fail_read = Some(error);
        state.garble_on_fail = true;
    }

    fn fail_write(&self, error: Option<DeviceError>) {
        self.state.lock().unwrap().fail_write = error;
    }
}

impl BlockDevice for MockBlockDevice {
    fn init(&mut self, _speed: SpiSpeed, _chip_select: u8) -> Result<(), DeviceError> {
        match self.state.lock().unwrap().fail_init {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn read_block(&mut self, block_id: u32, buf: &mut [u8; BLOCK_SZ]) -> Result<(), DeviceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.fail_read {
            if state.garble_on_fail {
                buf[..BLOCK_SZ / 2].fill(0xEE);
            }
            return Err(error);
        }
        let block = *state.blocks.get(block_id as usize).ok_or(DeviceError::AddressNack)?;
        buf.copy_from_slice(&block);
        state.reads += 1;
        Ok(())
    }

    fn write_block(&mut self, block_id: u32, buf: &[u8; BLOCK_SZ]) -> Result<(), DeviceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.fail_write {
            return Err(error);
        }
        let block = state.blocks.get_mut(block_id as usize).ok_or(DeviceError::AddressNack)?;
        block.copy_from_slice(buf);
        state.writes.push(block_id);
        Ok(())
    }

    fn card_type(&self) -> CardType {
        self.state.lock().unwrap().card
    }
}

// 记录所有事件，并提供单调递增的假时钟
#[derive(Default)]
struct RecordingTracer {
    events: RefCell<Vec<Event>>,
    clock: Cell<u64>,
}

impl RecordingTracer {
    fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }
}

impl Tracer for RecordingTracer {
    fn event(&self, event: &Event) {
        self.events.borrow_mut().push(*event);
    }

    fn now_micros(&self) -> Option<u64> {
        let now = self.clock.get() + 10;
        self.clock.set(now);
        Some(now)
    }
}

// 默认布局需要 32 + 256 = 288 个块
const TEST_BLOCKS: usize = 288;

fn ready_store() -> (MockBlockDevice, SlotStore<MockBlockDevice, NoopTracer>) {
    let device = MockBlockDevice::new(TEST_BLOCKS);
    let mut store = SlotStore::with_tracer(device.clone(), SlotLayout::DEFAULT, NoopTracer);
    store.begin(SpiSpeed::Half, 4).unwrap();
    (device, store)
}

#[test]
fn test_layout_constants() {
    assert_eq!(BLOCK_SZ, 512);
    assert_eq!(SLOT_SIZE, 30);
    assert_eq!(SLOT_END, 4096);
    assert_eq!(*SlotLayout::DEFAULT.block_span().end() as usize, TEST_BLOCKS - 1);
}

#[test]
fn test_begin_reports_card_type() {
    let device = MockBlockDevice::new(TEST_BLOCKS);
    let mut store =
        SlotStore::with_tracer(device, SlotLayout::DEFAULT, RecordingTracer::default());
    assert!(!store.is_ready());
    assert_eq!(store.begin(SpiSpeed::Half, 4), Ok(CardType::Sdhc));
    assert!(store.is_ready());
    assert_eq!(store.tracer().events(), vec![Event::CardReady(CardType::Sdhc)]);
}

#[test]
fn test_operations_before_begin_are_not_ready() {
    let device = MockBlockDevice::new(TEST_BLOCKS);
    let mut store = SlotStore::with_tracer(device.clone(), SlotLayout::DEFAULT, NoopTracer);
    let mut buf = [0u8; 4];
    assert_eq!(store.read_slot(0, &mut buf), Err(SlotError::NotReady));
    assert_eq!(store.write_slot(0, &buf), Err(SlotError::NotReady));
    assert_eq!(device.io_count(), 0);
}

#[test]
fn test_failed_begin_leaves_store_unusable_until_retry() {
    let device = MockBlockDevice::new(TEST_BLOCKS);
    device.fail_init(Some(DeviceError::Timeout));
    let mut store =
        SlotStore::with_tracer(device.clone(), SlotLayout::DEFAULT, RecordingTracer::default());

    assert_eq!(
        store.begin(SpiSpeed::Half, 4),
        Err(SlotError::Init(DeviceError::Timeout))
    );
    assert!(store.tracer().events().contains(&Event::InitFailed(DeviceError::Timeout)));
    assert_eq!(store.write_slot(3, &[1, 2, 3]), Err(SlotError::NotReady));
    assert_eq!(device.io_count(), 0);

    device.fail_init(None);
    assert!(store.begin(SpiSpeed::Half, 4).is_ok());
    assert_eq!(store.write_slot(3, &[1, 2, 3]), Ok(()));
}

#[test]
fn test_bad_arguments_never_touch_device() {
    let device = MockBlockDevice::new(TEST_BLOCKS);
    let mut store = SlotStore::with_tracer(device.clone(), SlotLayout::DEFAULT, NoopTracer);
    let big = [0u8; SLOT_SIZE + 1];
    let data = [0u8; 10];

    for ready in [false, true] {
        if ready {
            store.begin(SpiSpeed::Half, 4).unwrap();
        }
        for slot in [SLOT_END, SLOT_END + 1, u32::MAX] {
            let mut buf = [0u8; 10];
            assert_eq!(
                store.write_slot(slot, &data),
                Err(SlotError::InvalidArgument { slot, size: 10 })
            );
            assert_eq!(
                store.read_slot(slot, &mut buf),
                Err(SlotError::InvalidArgument { slot, size: 10 })
            );
        }
        let mut big_buf = [0u8; SLOT_SIZE + 1];
        assert!(matches!(
            store.write_slot(0, &big),
            Err(SlotError::InvalidArgument { .. })
        ));
        assert!(matches!(
            store.read_slot(0, &mut big_buf),
            Err(SlotError::InvalidArgument { .. })
        ));
    }
    assert_eq!(device.io_count(), 0);
    assert_eq!(store.cache().resident(), None);
}

#[test]
fn test_round_trip() {
    let (_device, mut store) = ready_store();
    for (i, slot) in [0u32, 1, 15, 16, 17, 1000, SLOT_END - 1].into_iter().enumerate() {
        let data: Vec<u8> = (0..SLOT_SIZE).map(|b| (b as u8).wrapping_mul(7) ^ i as u8).collect();
        store.write_slot(slot, &data).unwrap();
        let mut buf = vec![0u8; SLOT_SIZE];
        assert_eq!(store.read_slot(slot, &mut buf), Ok(SLOT_SIZE));
        assert_eq!(buf, data);
    }
}

#[test]
fn test_partial_read_echoes_requested_size() {
    let (_device, mut store) = ready_store();
    store.write_slot(9, b"hello world").unwrap();
    let mut buf = [0u8; 5];
    assert_eq!(store.read_slot(9, &mut buf), Ok(5));
    assert_eq!(&buf, b"hello");
}

#[test]
fn test_slots_in_neighbouring_blocks() {
    // slot 0 -> block 32, slot 17 -> block 33 (17 * 32 = 544)
    let (device, mut store) = ready_store();
    store.write_slot(0, &[0xAA; SLOT_SIZE]).unwrap();
    store.write_slot(17, &[0xBB; SLOT_SIZE]).unwrap();

    let mut buf = [0u8; SLOT_SIZE];
    store.read_slot(0, &mut buf).unwrap();
    assert_eq!(buf, [0xAA; SLOT_SIZE]);
    store.read_slot(17, &mut buf).unwrap();
    assert_eq!(buf, [0xBB; SLOT_SIZE]);

    assert_eq!(device.writes(), vec![32, 33]);
    assert_eq!(&device.block(32)[..SLOT_SIZE], &[0xAA; SLOT_SIZE]);
    assert_eq!(&device.block(33)[32..32 + SLOT_SIZE], &[0xBB; SLOT_SIZE]);
}

#[test]
fn test_slots_in_same_block_share_one_load() {
    let (device, mut store) = ready_store();
    store.write_slot(0, &[0xAA; SLOT_SIZE]).unwrap();
    store.write_slot(5, &[0xBB; SLOT_SIZE]).unwrap();
    let mut buf = [0u8; SLOT_SIZE];
    store.read_slot(0, &mut buf).unwrap();
    assert_eq!(buf, [0xAA; SLOT_SIZE]);

    assert_eq!(device.reads(), 1);
    assert_eq!(device.writes(), vec![32, 32]);
    // 块内相邻 chunk 的寻址字节保持不变
    assert_eq!(&device.block(32)[SLOT_SIZE..32], &[0, 0]);
}

#[test]
fn test_block_switch_keeps_prior_write() {
    let (_device, mut store) = ready_store();
    store.write_slot(2, b"persist me").unwrap();
    let mut other = [0u8; 8];
    store.read_slot(2000, &mut other).unwrap();
    let mut buf = [0u8; 10];
    store.read_slot(2, &mut buf).unwrap();
    assert_eq!(&buf, b"persist me");
}

#[test]
fn test_one_write_per_distinct_block() {
    let (device, mut store) = ready_store();
    let slots: Vec<u32> = (0..8).map(|i| i * 16).collect();
    for &slot in &slots {
        store.write_slot(slot, &[slot as u8; 4]).unwrap();
    }
    assert_eq!(device.writes(), (32..40).collect::<Vec<u32>>());
    assert_eq!(device.reads(), slots.len());
}

#[test]
fn test_flush_is_idempotent() {
    let device = MockBlockDevice::new(TEST_BLOCKS);
    let mut cache = BlockCache::new(device.clone());
    cache.load(40, Intent::Write, &NoopTracer).unwrap();
    assert!(cache.is_dirty());
    cache.flush(&NoopTracer).unwrap();
    cache.flush(&NoopTracer).unwrap();
    assert_eq!(device.writes(), vec![40]);
    assert!(!cache.is_dirty());
}

#[test]
fn test_load_same_block_does_no_io() {
    let device = MockBlockDevice::new(TEST_BLOCKS);
    let mut cache = BlockCache::new(device.clone());
    cache.load(7, Intent::Read, &NoopTracer).unwrap();
    cache.load(7, Intent::Read, &NoopTracer).unwrap();
    assert_eq!(device.reads(), 1);
    assert!(!cache.is_dirty());
    // 写意图在已驻留时同样标记为脏
    cache.load(7, Intent::Write, &NoopTracer).unwrap();
    assert!(cache.is_dirty());
    assert_eq!(device.io_count(), 1);
}

#[test]
fn test_failed_write_keeps_data_dirty_and_retryable() {
    let (device, mut store) = ready_store();
    device.fail_write(Some(DeviceError::DataNack));

    let data = [0x5A; SLOT_SIZE];
    assert_eq!(
        store.write_slot(1, &data),
        Err(SlotError::DeviceWrite {
            block: 32,
            source: DeviceError::DataNack
        })
    );
    assert!(store.cache().is_dirty());
    assert_eq!(store.cache().resident(), Some(32));
    assert!(device.writes().is_empty());

    device.fail_write(None);
    store.flush().unwrap();
    assert!(!store.cache().is_dirty());
    assert_eq!(device.writes(), vec![32]);
    assert_eq!(&device.block(32)[32..32 + SLOT_SIZE], &data);
}

#[test]
fn test_failed_flush_blocks_block_switch() {
    let (device, mut store) = ready_store();
    device.fail_write(Some(DeviceError::Other));
    assert!(store.write_slot(0, &[1; 4]).is_err());
    let reads_before = device.reads();

    let mut buf = [0u8; 4];
    assert_eq!(
        store.read_slot(100, &mut buf),
        Err(SlotError::DeviceWrite {
            block: 32,
            source: DeviceError::Other
        })
    );
    assert_eq!(device.reads(), reads_before);
    assert_eq!(store.cache().resident(), Some(32));
    assert!(store.cache().is_dirty());

    // 同一块内的读取仍可以看到未写回的数据
    assert_eq!(store.read_slot(0, &mut buf), Ok(4));
    assert_eq!(buf, [1; 4]);
}

#[test]
fn test_failed_read_keeps_previous_block_resident() {
    let (device, mut store) = ready_store();
    store.write_slot(0, b"abc").unwrap();
    device.fail_read(Some(DeviceError::Timeout));

    let mut buf = [0u8; 3];
    assert_eq!(
        store.read_slot(17, &mut buf),
        Err(SlotError::DeviceRead {
            block: 33,
            source: DeviceError::Timeout
        })
    );
    assert_eq!(store.cache().resident(), Some(32));
    assert_eq!(store.read_slot(0, &mut buf), Ok(3));
    assert_eq!(&buf, b"abc");
}

#[test]
fn test_partially_filled_failed_read_does_not_corrupt_resident_block() {
    let (device, mut store) = ready_store();
    store.write_slot(0, b"abc").unwrap();
    store.write_slot(1, b"neighbour").unwrap();
    device.fail_read_after_garbling(DeviceError::Timeout);

    let mut buf = [0u8; 3];
    assert!(matches!(
        store.read_slot(17, &mut buf),
        Err(SlotError::DeviceRead { block: 33, .. })
    ));
    assert_eq!(store.cache().resident(), Some(32));

    // 驻留块仍与设备内容一致
    assert_eq!(store.read_slot(0, &mut buf), Ok(3));
    assert_eq!(&buf, b"abc");
    store.write_slot(2, b"x").unwrap();
    let mut neighbour = [0u8; 9];
    store.read_slot(1, &mut neighbour).unwrap();
    assert_eq!(&neighbour, b"neighbour");
    assert_eq!(&device.block(32)[32..41], b"neighbour");
    assert_eq!(&device.block(32)[..3], b"abc");
}

#[test]
fn test_legacy_read_size_fits_status_code() {
    let device = MockBlockDevice::new(8);
    let layout = SlotLayout::new(4096, 512, 0, 0).unwrap();
    let mut store = SlotStore::with_tracer(device, layout, RecordingTracer::default());
    store.begin(SpiSpeed::Half, 4).unwrap();

    let mut buf = [0u8; 255];
    assert_eq!(store.legacy_read_slot(0, &mut buf, 127), 127);
    assert_eq!(store.legacy_read_slot(0, &mut buf, 200), -1);
    assert_eq!(store.legacy_read_slot(0, &mut buf, 128), -1);
    assert!(store
        .tracer()
        .events()
        .contains(&Event::BadArgument { slot: 0, size: 200 }));
    // 类型化接口不受 i8 限制
    assert_eq!(store.read_slot(0, &mut buf[..200]), Ok(200));
}

#[test]
fn test_legacy_status_codes() {
    let (device, mut store) = ready_store();
    let mut buf = [0u8; SLOT_SIZE];
    assert_eq!(store.legacy_write_slot(3, &[9; SLOT_SIZE], SLOT_SIZE as u8), 0);
    assert_eq!(store.legacy_read_slot(3, &mut buf, SLOT_SIZE as u8), SLOT_SIZE as i8);
    assert_eq!(buf, [9; SLOT_SIZE]);

    assert_eq!(store.legacy_read_slot(SLOT_END, &mut buf, 1), -1);
    assert_eq!(store.legacy_write_slot(0, &buf, SLOT_SIZE as u8 + 1), -1);
    assert_eq!(store.legacy_read_slot(0, &mut buf[..4], 8), -1);

    for (error, code) in [
        (DeviceError::BusOverflow, 1),
        (DeviceError::AddressNack, 2),
        (DeviceError::DataNack, 3),
        (DeviceError::Other, 4),
    ] {
        device.fail_write(Some(error));
        assert_eq!(store.legacy_write_slot(3, &[1], 1), code);
    }
    device.fail_write(None);
    store.flush().unwrap();
}

#[test]
fn test_scope_timer_restores_depth_on_every_path() {
    let device = MockBlockDevice::new(TEST_BLOCKS);
    let mut store =
        SlotStore::with_tracer(device, SlotLayout::DEFAULT, RecordingTracer::default());
    store.begin(SpiSpeed::Half, 4).unwrap();

    assert!(store.write_slot(SLOT_END, &[0]).is_err());
    store.write_slot(1, &[0]).unwrap();

    let events = store.tracer().events();
    let scopes: Vec<&Event> = events
        .iter()
        .filter(|e| matches!(e, Event::ScopeEnter { .. } | Event::ScopeExit { .. }))
        .collect();
    assert_eq!(scopes.len(), 4);
    for pair in scopes.chunks(2) {
        assert_eq!(
            *pair[0],
            Event::ScopeEnter {
                name: "SlotStore::write_slot",
                depth: 0
            }
        );
        match *pair[1] {
            Event::ScopeExit { name, depth, elapsed_us } => {
                assert_eq!(name, "SlotStore::write_slot");
                assert_eq!(depth, 0);
                assert!(elapsed_us.is_some());
            }
            ref other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(events.contains(&Event::BadArgument { slot: SLOT_END, size: 1 }));
    assert!(events.contains(&Event::Flushed(32)));
}

#[test]
fn test_shared_store_across_threads() {
    let device = MockBlockDevice::new(TEST_BLOCKS);
    let store = Arc::new(SharedSlotStore::new(SlotStore::with_tracer(
        device.clone(),
        SlotLayout::DEFAULT,
        NoopTracer,
    )));
    store.begin(SpiSpeed::Half, 4).unwrap();

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..32u32 {
                    let slot = t * 1000 + i;
                    store.write_slot(slot, &[t as u8, i as u8]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4u32 {
        for i in 0..32u32 {
            let mut buf = [0u8; 2];
            store.read_slot(t * 1000 + i, &mut buf).unwrap();
            assert_eq!(buf, [t as u8, i as u8]);
        }
    }
    assert!(!store.lock().cache().is_dirty());
}
