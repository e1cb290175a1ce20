use core::fmt;

/// 块大小常量，固定为 512 字节
pub const BLOCK_SZ: usize = 512;

/// SPI 总线速度档位
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpiSpeed {
    Full,
    Half,
    Quarter,
}

/// SD 卡类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardType {
    Sd1,
    Sd2,
    Sdhc,
    Unknown,
}

impl CardType {
    pub fn name(self) -> &'static str {
        match self {
            CardType::Sd1 => "SD1",
            CardType::Sd2 => "SD2",
            CardType::Sdhc => "SDHC",
            CardType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 块设备报告的具体失败原因
///
/// 前四种与总线协议的错误码一一对应，其余情况归入 `Other`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("sending buffer overflow")]
    BusOverflow,
    #[error("NACK after sending address")]
    AddressNack,
    #[error("NACK after sending data")]
    DataNack,
    #[error("device timed out")]
    Timeout,
    #[error("device error")]
    Other,
}

/// 块设备抽象接口
///
/// 提供以 512 字节块为单位的读写抽象，只由块缓存层调用。
/// 调用方需实现此 trait。
pub trait BlockDevice {
    /// 初始化设备
    ///
    /// # 参数
    /// - `speed`: SPI 总线速度
    /// - `chip_select`: 片选引脚编号
    fn init(&mut self, speed: SpiSpeed, chip_select: u8) -> Result<(), DeviceError>;

    /// 读取指定块的内容到缓冲区
    fn read_block(&mut self, block_id: u32, buf: &mut [u8; BLOCK_SZ]) -> Result<(), DeviceError>;

    /// 将缓冲区内容写入指定块
    fn write_block(&mut self, block_id: u32, buf: &[u8; BLOCK_SZ]) -> Result<(), DeviceError>;

    /// 初始化成功后探测到的卡类型
    fn card_type(&self) -> CardType;
}
