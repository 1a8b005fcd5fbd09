//! 驱动层错误类型定义
//!
//! 错误分三个来源：下层透传（串口 / 协议）、单设备前置条件
//! 违反、组操作失败。所有错误都原样上抛给调用方，驱动内部不做
//! 任何重试或默认值替换。

use dxl_protocol::{ProtocolError, ProtocolVersion};
use dxl_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口传输错误（打开 / 波特率 / 超时 / IO）
    #[error("serial transport error: {0}")]
    Serial(#[from] SerialError),

    /// 协议编解码错误（校验和、帧格式、寄存器表查询）
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 设备报告硬件故障（与通信结果独立的第二条错误通道）
    ///
    /// 总线事务本身成功，但设备在状态包里报告了自身故障
    /// （过载、欠压等）。`description` 由协议层按版本解码。
    #[error(
        "device {id} reported hardware error {description} while accessing register 0x{address:04X}"
    )]
    HardwareFault {
        id: u8,
        code: u8,
        address: u16,
        description: String,
    },

    /// 设备 ID 超出可分配范围（253/254 保留）
    #[error("device id {0} out of range (valid: 0-252)")]
    InvalidId(u8),

    /// 应答包来自预期之外的设备（总线上 ID 冲突或接线错误）
    #[error("status packet answered by device {actual}, expected {expected}")]
    UnexpectedResponder { expected: u8, actual: u8 },

    /// 前置条件违反：扭矩使能期间不允许改写 homing offset
    #[error("torque must be disabled on device {id} before setting homing offset")]
    InvalidState { id: u8 },

    /// 角度超出允许区间
    #[error("angle {angle} {unit} out of range: must be within ±{limit} {unit}")]
    OutOfRange {
        angle: f64,
        limit: f64,
        unit: &'static str,
    },

    /// 该协议版本不提供此设备操作（如 1.0 没有 homing offset 寄存器）
    #[error("{operation} is not available on protocol {version}")]
    UnsupportedOnProtocol {
        operation: &'static str,
        version: ProtocolVersion,
    },

    /// 该协议版本不支持此总线操作（如 1.0 没有广播发现）
    #[error("{operation} requires protocol 2.0")]
    UnsupportedOperation { operation: &'static str },

    /// 组操作要求至少一个成员
    #[error("servo group is empty")]
    EmptyGroup,

    /// 组成员在协议版本 / 寄存器布局 / 总线上不一致
    #[error("servo group members disagree on {0}")]
    InconsistentGroup(&'static str),

    /// 向组里加入了重复的设备 ID
    #[error("device {id} already present in group")]
    DuplicateMember { id: u8 },

    /// 组里没有该设备 ID
    #[error("no device with id {id} in group")]
    MemberNotFound { id: u8 },

    /// 同步读应答中缺少某个成员的数据（不返回任何部分结果）
    #[error("sync read reply is missing device {id}")]
    GroupReadIncomplete { id: u8 },

    /// 同步写整体失败（广播事务无逐设备应答，整组一荣俱荣）
    #[error("sync write failed: {source}")]
    GroupWriteFailed {
        #[source]
        source: Box<DriverError>,
    },

    /// 提供的目标值个数与成员数不符
    #[error("group has {members} members but {values} values were supplied")]
    GroupSizeMismatch { members: usize, values: usize },
}

impl DriverError {
    /// 把任意驱动错误包装为组写失败
    pub(crate) fn group_write(source: DriverError) -> Self {
        DriverError::GroupWriteFailed {
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_diagnostic_context() {
        let err = DriverError::HardwareFault {
            id: 12,
            code: 0x20,
            address: 116,
            description: "0x20 (overload error)".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("device 12"));
        assert!(text.contains("0x0074"));
        assert!(text.contains("overload"));
    }

    #[test]
    fn test_serial_error_converts() {
        let err: DriverError = SerialError::Closed.into();
        assert!(matches!(err, DriverError::Serial(SerialError::Closed)));
    }

    #[test]
    fn test_group_write_wraps_cause() {
        let err = DriverError::group_write(DriverError::EmptyGroup);
        assert!(err.to_string().contains("sync write failed"));
    }
}
