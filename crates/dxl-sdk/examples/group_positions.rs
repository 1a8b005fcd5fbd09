//! 同步组操作示例
//!
//! 把若干同型号设备组成一组：单帧开力矩、单帧下发目标位置、
//! 一问多答回读当前位置。
//!
//! 用法：
//! ```text
//! cargo run --example group_positions -- --port /dev/ttyUSB0 --ids 1,12,15 --angle 180
//! ```

use clap::Parser;
use dxl_sdk::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(about = "Move a group of servos to the same angle in one frame")]
struct Args {
    /// 串口设备路径
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// 波特率
    #[arg(long, default_value_t = 57_600)]
    baud: u32,

    /// 成员 ID 列表（逗号分隔）
    #[arg(long, value_delimiter = ',', default_values_t = [1u8, 2, 3])]
    ids: Vec<u8>,

    /// 型号名
    #[arg(long, default_value = "XL330")]
    model: String,

    /// 目标角度（度），全组同值
    #[arg(long, default_value_t = 180.0)]
    angle: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dxl_sdk::init_logging();
    let args = Args::parse();

    let bus = Arc::new(Bus::open(&args.port, args.baud)?);
    let mut group = ServoGroup::new();
    for &id in &args.ids {
        group.add_servo(Servo::new(Arc::clone(&bus), id, 2, &args.model)?)?;
    }
    println!("👥 group of {}: {:?}", group.len(), group.ids());

    group.sync_torque_enabled(true)?;
    let targets = vec![args.angle; group.len()];
    group.sync_set_positions(&targets, AngleUnit::Degrees)?;
    println!("🎯 all members commanded to {:.1}°", args.angle);

    thread::sleep(Duration::from_millis(500));
    for (id, angle) in group.sync_get_positions(AngleUnit::Degrees)? {
        println!("  id {id:3}: {angle:.2}°");
    }

    group.sync_torque_enabled(false)?;
    Ok(())
}
