//! sdtool: 在主机上读写 SD 卡镜像中的槽位数据

pub mod config;
mod error;
pub mod image;

use std::io::Write;
use std::path::Path;

use slot_store::{CardType, SlotStore};

pub use config::Config;
pub use error::ToolError;
pub use image::{create_image, ImageCard};

/// 打开镜像并完成初始化
pub fn open_store(path: &Path, config: &Config) -> Result<(SlotStore<ImageCard>, CardType), ToolError> {
    let mut store = SlotStore::new(ImageCard::new(path), config.layout()?);
    let card = store.begin(config.bus.speed.into(), config.bus.chip_select)?;
    Ok((store, card))
}

/// 读取槽位，`len` 缺省时读取整个槽位
pub fn read_slot(
    store: &mut SlotStore<ImageCard>,
    slot: u32,
    len: Option<usize>,
) -> Result<Vec<u8>, ToolError> {
    let mut buf = vec![0u8; len.unwrap_or(store.layout().slot_size())];
    store.read_slot(slot, &mut buf)?;
    Ok(buf)
}

pub fn write_slot(store: &mut SlotStore<ImageCard>, slot: u32, data: &[u8]) -> Result<(), ToolError> {
    let slot_size = store.layout().slot_size();
    if data.len() > slot_size {
        return Err(ToolError::TooLong {
            len: data.len(),
            slot_size,
        });
    }
    store.write_slot(slot, data)?;
    Ok(())
}

/// 读取 `[from, to)` 范围内的所有槽位
pub fn dump(
    store: &mut SlotStore<ImageCard>,
    from: u32,
    to: Option<u32>,
) -> Result<Vec<(u32, Vec<u8>)>, ToolError> {
    let end = store.layout().slot_end();
    let to = to.unwrap_or(end);
    if from >= to || to > end {
        return Err(ToolError::Range { from, to, end });
    }
    (from..to)
        .map(|slot| Ok((slot, read_slot(store, slot, None)?)))
        .collect()
}

/// 解析十六进制数据，忽略空白与 `:` 分隔符
pub fn parse_hex(text: &str) -> Result<Vec<u8>, ToolError> {
    let digits: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);
    Ok(hex::decode(digits)?)
}

/// 格式化一行输出：`slot: aa bb cc ...`
pub fn format_slot(slot: u32, data: &[u8]) -> String {
    let bytes: Vec<String> = data.iter().map(|b| hex::encode([*b])).collect();
    format!("{slot:>5}: {}", bytes.join(" "))
}

/// 报告命令失败
///
/// 错误总是写到 `stderr`，不受日志级别影响。
pub fn report_error(err: &ToolError, stderr: &mut impl Write) {
    let _ = writeln!(stderr, "sdtool: {err}");
}
