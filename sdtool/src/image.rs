//! 以镜像文件模拟 SD 卡

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use slot_store::{BlockDevice, CardType, DeviceError, SlotLayout, SpiSpeed, BLOCK_SZ};

use crate::error::ToolError;

/// 标准容量卡的上限，超过后按 SDHC 报告
const SDSC_LIMIT: u64 = 2 << 30;

/// 镜像文件块设备
///
/// `init` 之前不持有文件句柄；镜像不会因写入越界而增长。
pub struct ImageCard {
    path: PathBuf,
    file: Option<File>,
    len: u64,
}

impl ImageCard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            len: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn blocks(&self) -> u64 {
        self.len / BLOCK_SZ as u64
    }

    fn file(&mut self, block_id: u32) -> Result<&mut File, DeviceError> {
        if u64::from(block_id) >= self.blocks() {
            log::warn!("block {block_id} is beyond the end of {}", self.path.display());
            return Err(DeviceError::AddressNack);
        }
        let file = self.file.as_mut().ok_or(DeviceError::Other)?;
        file.seek(SeekFrom::Start(u64::from(block_id) * BLOCK_SZ as u64))
            .map_err(|err| io_error(&self.path, err))?;
        Ok(file)
    }
}

fn io_error(path: &Path, err: io::Error) -> DeviceError {
    log::warn!("{}: {err}", path.display());
    match err.kind() {
        io::ErrorKind::UnexpectedEof => DeviceError::AddressNack,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => DeviceError::Timeout,
        _ => DeviceError::Other,
    }
}

impl BlockDevice for ImageCard {
    fn init(&mut self, speed: SpiSpeed, chip_select: u8) -> Result<(), DeviceError> {
        log::debug!(
            "opening {} (speed {speed:?}, chip select {chip_select})",
            self.path.display()
        );
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|err| io_error(&self.path, err))?;
        self.len = file
            .metadata()
            .map_err(|err| io_error(&self.path, err))?
            .len();
        self.file = Some(file);
        Ok(())
    }

    fn read_block(&mut self, block_id: u32, buf: &mut [u8; BLOCK_SZ]) -> Result<(), DeviceError> {
        let result = self.file(block_id)?.read_exact(buf);
        result.map_err(|err| io_error(&self.path, err))
    }

    fn write_block(&mut self, block_id: u32, buf: &[u8; BLOCK_SZ]) -> Result<(), DeviceError> {
        let result = self.file(block_id)?.write_all(buf);
        result.map_err(|err| io_error(&self.path, err))
    }

    fn card_type(&self) -> CardType {
        match self.file {
            None => CardType::Unknown,
            Some(_) if self.len > SDSC_LIMIT => CardType::Sdhc,
            Some(_) => CardType::Sd2,
        }
    }
}

/// 创建足以容纳整个布局的全零镜像，返回镜像字节数
pub fn create_image(path: &Path, layout: &SlotLayout, force: bool) -> Result<u64, ToolError> {
    if path.exists() && !force {
        return Err(ToolError::Exists(path.to_path_buf()));
    }
    let len = (u64::from(*layout.block_span().end()) + 1) * BLOCK_SZ as u64;
    let image_err = |source| ToolError::Image {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(image_err)?;
    file.set_len(len).map_err(image_err)?;
    log::info!("created {} ({len} bytes)", path.display());
    Ok(len)
}
