//! Dynamixel 风格串行伺服总线的主机侧 SDK
//!
//! 统一入口 crate，重新导出各层的公开接口：
//!
//! - [`protocol`]: 指令 / 状态包编解码（Protocol 1.0 与 2.0）、
//!   控制表注册中心
//! - [`serial`]: 半双工串口链路抽象与 mock 实现
//! - [`driver`]: 总线处理器、设备句柄、同步组操作
//!
//! # 快速开始
//!
//! ```no_run
//! use std::sync::Arc;
//! use dxl_sdk::prelude::*;
//!
//! fn main() -> Result<(), DriverError> {
//!     let bus = Arc::new(Bus::open("/dev/ttyUSB0", 57_600)?);
//!
//!     // 广播发现（仅 Protocol 2.0）
//!     for id in bus.broadcast_ping(ProtocolVersion::V2)? {
//!         println!("found device at id {id}");
//!     }
//!
//!     let mut servo = Servo::new(Arc::clone(&bus), 1, 2, "XL330")?;
//!     servo.set_torque_enabled(true)?;
//!     servo.set_position(180.0, AngleUnit::Degrees)?;
//!     println!("position: {:.2}°", servo.get_position(AngleUnit::Degrees)?);
//!     Ok(())
//! }
//! ```

pub use dxl_driver as driver;
pub use dxl_protocol as protocol;
pub use dxl_serial as serial;

pub mod prelude;

pub use dxl_driver::{AngleUnit, Bus, DriverError, Servo, ServoGroup};
pub use dxl_protocol::{ControlTable, ProtocolError, ProtocolVersion, Register};

/// 初始化日志输出（示例程序与上层应用使用）
///
/// 从 `RUST_LOG` 环境变量读过滤规则，未设置时默认 `info` 级别。
/// 重复调用只有第一次生效。
pub fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
