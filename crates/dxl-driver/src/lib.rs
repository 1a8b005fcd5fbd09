//! 设备驱动层
//!
//! 在协议编解码（`dxl-protocol`）与串口链路（`dxl-serial`）之上
//! 提供面向使用者的抽象：
//!
//! - [`Bus`]: 共享串口总线，串行化所有事务，负责请求 / 应答配对
//!   与广播发现
//! - [`Servo`]: 单设备句柄，寄存器读写与角度单位换算
//! - [`ServoGroup`]: 同步组操作，单帧批量读写多个设备
//!
//! # 示例
//!
//! ```no_run
//! use std::sync::Arc;
//! use dxl_driver::{AngleUnit, Bus, Servo};
//!
//! fn main() -> Result<(), dxl_driver::DriverError> {
//!     let bus = Arc::new(Bus::open("/dev/ttyUSB0", 57_600)?);
//!     let mut servo = Servo::new(Arc::clone(&bus), 1, 2, "XL330")?;
//!     servo.ping()?;
//!     servo.set_torque_enabled(true)?;
//!     servo.set_position(180.0, AngleUnit::Degrees)?;
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod error;
pub mod group;
pub mod servo;
pub mod units;

pub use bus::Bus;
pub use error::DriverError;
pub use group::ServoGroup;
pub use servo::Servo;
pub use units::AngleUnit;
