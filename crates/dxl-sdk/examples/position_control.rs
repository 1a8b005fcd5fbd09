//! 单设备位置控制示例
//!
//! PING 设备、开力矩、下发目标角度、回读当前位置。
//!
//! 用法：
//! ```text
//! cargo run --example position_control -- --port /dev/ttyUSB0 --id 1 --angle 180
//! ```

use clap::Parser;
use dxl_sdk::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(about = "Drive a single servo to a target angle")]
struct Args {
    /// 串口设备路径
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// 波特率
    #[arg(long, default_value_t = 57_600)]
    baud: u32,

    /// 设备 ID
    #[arg(long, default_value_t = 1)]
    id: u8,

    /// 协议版本（1 或 2）
    #[arg(long, default_value_t = 2)]
    protocol: u8,

    /// 型号名
    #[arg(long, default_value = "XL330")]
    model: String,

    /// 目标角度（度）
    #[arg(long, default_value_t = 180.0)]
    angle: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dxl_sdk::init_logging();
    let args = Args::parse();

    let bus = Arc::new(Bus::open(&args.port, args.baud)?);
    let mut servo = Servo::new(Arc::clone(&bus), args.id, args.protocol, &args.model)?;

    servo.ping()?;
    println!(
        "✅ id {} online, firmware v{}",
        servo.id(),
        servo.firmware_version()?
    );

    servo.set_torque_enabled(true)?;
    println!("🎯 moving to {:.1}°", args.angle);
    servo.set_position(args.angle, AngleUnit::Degrees)?;

    // 等转到位后回读
    thread::sleep(Duration::from_millis(500));
    let position = servo.get_position(AngleUnit::Degrees)?;
    println!("📍 present position: {position:.2}°");

    servo.set_torque_enabled(false)?;
    Ok(())
}
