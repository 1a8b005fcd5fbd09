//! # Dynamixel Protocol
//!
//! 舵机总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `instruction`: 指令字节常量定义
//! - `codec`: 指令包构建 / 状态包解析的统一抽象
//! - `v1`: Protocol 1.0 编解码（8-bit 补码校验和）
//! - `v2`: Protocol 2.0 编解码（CRC-16）
//! - `control_table`: 按（协议版本, 型号）查询的寄存器表
//!
//! ## 字节序
//!
//! 协议使用小端字节序（LSB 在前），多字节寄存器值通过
//! `encode_register_value` / `decode_register_value` 转换。

pub mod codec;
pub mod control_table;
pub mod instruction;
pub mod v1;
pub mod v2;

// 重新导出常用类型
pub use codec::{PacketCodec, StatusPacket, SyncWriteEntry, codec_for};
pub use control_table::{ControlTable, Register, RegisterSpec};
pub use instruction::Instruction;
pub use v1::ProtocolV1;
pub use v2::ProtocolV2;

use thiserror::Error;

/// 广播 ID（所有设备同时接收，互不应答或按序应答）
pub const BROADCAST_ID: u8 = 0xFE;

/// 总线上可分配的最大设备 ID（253/254 保留）
pub const MAX_DEVICE_ID: u8 = 252;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("checksum mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("unsupported protocol version: {0} (expected 1 or 2)")]
    UnsupportedProtocol(u8),

    #[error("unknown model '{model}' for protocol {version}.0")]
    UnknownModel { version: u8, model: String },

    #[error("address 0x{address:04X} is not addressable in protocol {version}.0")]
    InvalidAddress { version: u8, address: u16 },

    #[error("byte count {count} is not valid in protocol {version}.0")]
    InvalidCount { version: u8, count: u16 },

    #[error("instruction {0:?} is not supported by protocol 1.0")]
    UnsupportedInstruction(Instruction),
}

/// 协议版本
///
/// 每个设备握手时绑定一个版本；同一总线上混用版本时，
/// 版本必须由调用方显式传入（不存在进程级"当前版本"状态）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    V1,
    V2,
}

impl ProtocolVersion {
    /// 从数字版本号解析
    ///
    /// # 错误
    /// - `ProtocolError::UnsupportedProtocol`: 版本号不在 {1, 2} 内
    pub fn from_number(version: u8) -> Result<Self, ProtocolError> {
        match version {
            1 => Ok(ProtocolVersion::V1),
            2 => Ok(ProtocolVersion::V2),
            other => Err(ProtocolError::UnsupportedProtocol(other)),
        }
    }

    /// 数字版本号
    pub fn number(self) -> u8 {
        match self {
            ProtocolVersion::V1 => 1,
            ProtocolVersion::V2 => 2,
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.0", self.number())
    }
}

/// 小端字节序：寄存器原始值转字节（宽度 1/2/4）
pub fn encode_register_value(value: i64, width: u16) -> smallvec::SmallVec<[u8; 4]> {
    let bytes = (value as u32).to_le_bytes();
    bytes[..width as usize].iter().copied().collect()
}

/// 小端字节序：字节转寄存器原始值（无符号解释）
pub fn decode_register_value(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    let len = bytes.len().min(4);
    buf[..len].copy_from_slice(&bytes[..len]);
    u32::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_version_from_number() {
        assert_eq!(ProtocolVersion::from_number(1).unwrap(), ProtocolVersion::V1);
        assert_eq!(ProtocolVersion::from_number(2).unwrap(), ProtocolVersion::V2);
    }

    #[test]
    fn test_protocol_version_rejects_unknown() {
        let err = ProtocolVersion::from_number(3).unwrap_err();
        assert_eq!(err, ProtocolError::UnsupportedProtocol(3));
    }

    #[test]
    fn test_register_value_roundtrip_width_2() {
        let bytes = encode_register_value(0x1234, 2);
        assert_eq!(bytes.as_slice(), &[0x34, 0x12]);
        assert_eq!(decode_register_value(&bytes), 0x1234);
    }

    #[test]
    fn test_register_value_roundtrip_width_4() {
        let bytes = encode_register_value(0x1234_5678, 4);
        assert_eq!(bytes.as_slice(), &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(decode_register_value(&bytes), 0x1234_5678);
    }

    #[test]
    fn test_register_value_negative_width_4() {
        // 负数走补码（homing offset 可以为负）
        let bytes = encode_register_value(-1, 4);
        assert_eq!(bytes.as_slice(), &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(decode_register_value(&bytes) as i32, -1);
    }
}
