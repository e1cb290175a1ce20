use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use debug_console::{init_console, println, set_color, set_log_level, Console};
use sdtool::{report_error, Config, ToolError};

#[derive(Parser)]
#[command(name = "sdtool", version, about = "Provision and inspect slot data in SD card images")]
struct Cli {
    /// SD 卡镜像路径
    #[arg(long, short, default_value = "sd.img")]
    image: PathBuf,
    /// TOML 配置文件
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// 日志级别：off/error/warn/info/debug/trace
    #[arg(long, default_value = "warn")]
    log_level: String,
    /// 关闭彩色日志
    #[arg(long)]
    no_color: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 创建全零镜像
    Create {
        #[arg(long)]
        force: bool,
    },
    #[command(flatten)]
    Slot(SlotCommand),
}

/// 需要先打开镜像的子命令
#[derive(Subcommand)]
enum SlotCommand {
    /// 显示布局与卡类型
    Info,
    /// 读取一个槽位
    Read {
        slot: u32,
        #[arg(long)]
        len: Option<usize>,
    },
    /// 写入十六进制数据
    Write { slot: u32, hex: String },
    /// 以同一字节填充槽位
    Fill {
        slot: u32,
        #[arg(value_parser = parse_byte)]
        byte: u8,
        #[arg(long)]
        len: Option<usize>,
    },
    /// 导出一段槽位
    Dump {
        #[arg(long, default_value_t = 0)]
        from: u32,
        #[arg(long)]
        to: Option<u32>,
    },
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|err| format!("invalid byte `{s}`: {err}"))
}

struct Stdout;

impl Console for Stdout {
    fn put_char(&self, c: u8) {
        let _ = io::stdout().write_all(&[c]);
    }

    fn put_str(&self, s: &str) {
        let _ = io::stdout().write_all(s.as_bytes());
    }
}

static STDOUT: Stdout = Stdout;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_console(&STDOUT);
    set_log_level(Some(&cli.log_level));
    set_color(!cli.no_color);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err, &mut io::stderr());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ToolError> {
    let config = Config::load(cli.config.as_deref())?;
    let layout = config.layout()?;
    let command = match cli.command {
        Command::Create { force } => {
            sdtool::create_image(&cli.image, &layout, force)?;
            return Ok(());
        }
        Command::Slot(command) => command,
    };

    let (mut store, card) = sdtool::open_store(&cli.image, &config)?;
    match command {
        SlotCommand::Info => {
            let span = layout.block_span();
            println!("image      : {}", cli.image.display());
            println!("card type  : {card}");
            println!("slot size  : {} bytes", layout.slot_size());
            println!("chunk size : {} bytes", layout.chunk_size());
            println!("slots      : {}", layout.slot_end());
            println!("blocks     : {}..={}", span.start(), span.end());
        }
        SlotCommand::Read { slot, len } => {
            let data = sdtool::read_slot(&mut store, slot, len)?;
            println!("{}", sdtool::format_slot(slot, &data));
        }
        SlotCommand::Write { slot, hex } => {
            let data = sdtool::parse_hex(&hex)?;
            sdtool::write_slot(&mut store, slot, &data)?;
            log::info!("wrote {} bytes to slot {slot}", data.len());
        }
        SlotCommand::Fill { slot, byte, len } => {
            let data = vec![byte; len.unwrap_or(layout.slot_size())];
            sdtool::write_slot(&mut store, slot, &data)?;
            log::info!("filled slot {slot} with {byte:#04x}");
        }
        SlotCommand::Dump { from, to } => {
            for (slot, data) in sdtool::dump(&mut store, from, to)? {
                println!("{}", sdtool::format_slot(slot, &data));
            }
        }
    }
    Ok(())
}
