//! 常用类型一次导入
//!
//! ```
//! use dxl_sdk::prelude::*;
//! ```

pub use dxl_driver::{AngleUnit, Bus, DriverError, Servo, ServoGroup};
pub use dxl_protocol::{
    BROADCAST_ID, ControlTable, MAX_DEVICE_ID, ProtocolError, ProtocolVersion, Register,
};
pub use dxl_serial::{SerialBus, SerialError};
