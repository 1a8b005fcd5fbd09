//! 总线扫描示例
//!
//! 向广播 ID 发 PING（Protocol 2.0），列出应答窗口内上线的
//! 全部设备 ID。
//!
//! 用法：
//! ```text
//! cargo run --example scan_bus -- --port /dev/ttyUSB0 --baud 57600
//! ```

use clap::Parser;
use dxl_sdk::prelude::*;
use std::sync::Arc;

#[derive(Parser)]
#[command(about = "Scan a servo bus for live devices")]
struct Args {
    /// 串口设备路径
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// 波特率
    #[arg(long, default_value_t = 57_600)]
    baud: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dxl_sdk::init_logging();
    let args = Args::parse();

    let bus = Arc::new(Bus::open(&args.port, args.baud)?);
    println!("🔍 Scanning {} at {} baud...", args.port, args.baud);

    let found = bus.broadcast_ping(ProtocolVersion::V2)?;
    if found.is_empty() {
        println!("no devices answered");
        return Ok(());
    }

    println!("✅ {} device(s) online:", found.len());
    for id in found {
        // 逐个建句柄读型号编号；型号名未知时用 XL330 布局试读
        let servo = Servo::new(Arc::clone(&bus), id, 2, "XL330")?;
        match servo.model_number() {
            Ok(model) => println!("  id {id:3}  model number {model}"),
            Err(e) => println!("  id {id:3}  (model read failed: {e})"),
        }
    }
    Ok(())
}
