//! debug-console: 调试串口上的 `print!`、`println!` 与 `log::Log`
//!
//! 固件把串口实现为 [`Console`] 注册进来；主机工具把标准输出注册进来。
//! 存储层只依赖 `log` 门面，不直接接触串口。

#![no_std]

pub extern crate log;

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicBool, Ordering};
use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Once;

/// 调试输出端口
///
/// 实现者必须提供 `put_char`；默认的 `put_str` 逐字节调用 `put_char`。
pub trait Console: Sync {
    fn put_char(&self, c: u8);

    fn put_str(&self, s: &str) {
        for byte in s.bytes() {
            self.put_char(byte);
        }
    }
}

static CONSOLE: Once<&'static dyn Console> = Once::new();
static COLOR: AtomicBool = AtomicBool::new(true);

/// 注册调试端口并安装 logger
///
/// 只有第一次调用生效，重复调用会被忽略。
pub fn init_console(console: &'static dyn Console) {
    CONSOLE.call_once(|| console);
    let _ = log::set_logger(&Logger);
}

/// 设置全局最大日志级别
///
/// 接受 `off`/`error`/`warn`/`info`/`debug`/`trace`（不区分大小写）。
/// `None` 或无法解析时使用 `Info`。返回实际生效的级别。
pub fn set_log_level(env: Option<&str>) -> LevelFilter {
    let level = env
        .and_then(|s| s.trim().parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    log::set_max_level(level);
    level
}

/// 是否输出 ANSI 颜色
pub fn set_color(enabled: bool) {
    COLOR.store(enabled, Ordering::Relaxed);
}

/// 输出一条分隔线
pub fn separator() {
    println!("-------------");
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    if let Some(console) = CONSOLE.get() {
        let _ = ConsoleWriter(*console).write_fmt(args);
    }
}

struct ConsoleWriter(&'static dyn Console);

impl Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.put_str(s);
        Ok(())
    }
}

struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(console) = CONSOLE.get() else {
            return;
        };
        let mut writer = ConsoleWriter(*console);
        let level = record.level();
        let _ = if COLOR.load(Ordering::Relaxed) {
            let color = match level {
                Level::Error => 31,
                Level::Warn => 93,
                Level::Info => 34,
                Level::Debug => 32,
                Level::Trace => 90,
            };
            writeln!(writer, "\x1b[{color}m[{level:>5}] {}\x1b[0m", record.args())
        } else {
            writeln!(writer, "[{level:>5}] {}", record.args())
        };
    }

    fn flush(&self) {}
}

/// 格式化输出宏（无自动换行）
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::_print(format_args!($($arg)*));
    };
}

/// 格式化输出宏（自动追加换行）
#[macro_export]
macro_rules! println {
    () => {
        $crate::_print(format_args!("\n"));
    };
    ($($arg:tt)*) => {
        $crate::_print(format_args!("{}\n", format_args!($($arg)*)));
    };
}
