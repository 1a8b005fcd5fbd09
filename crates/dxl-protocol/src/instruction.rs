//! 指令字节定义
//!
//! 两个协议版本共用同一套指令编号；Protocol 1.0 不支持 `SyncRead`，
//! 由编码层（`v1`）在构包时拒绝。

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 指令包的指令字节
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Instruction {
    /// 存在性查询（状态包仅回传 ID / 型号）
    Ping = 0x01,
    /// 读寄存器
    Read = 0x02,
    /// 写寄存器
    Write = 0x03,
    /// 同步读（仅 Protocol 2.0；广播发出，逐设备应答）
    SyncRead = 0x82,
    /// 同步写（广播发出，无应答）
    SyncWrite = 0x83,
}

/// Protocol 2.0 状态包的指令字节固定为 0x55
pub const STATUS_INSTRUCTION: u8 = 0x55;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_byte_values() {
        assert_eq!(u8::from(Instruction::Ping), 0x01);
        assert_eq!(u8::from(Instruction::Read), 0x02);
        assert_eq!(u8::from(Instruction::Write), 0x03);
        assert_eq!(u8::from(Instruction::SyncRead), 0x82);
        assert_eq!(u8::from(Instruction::SyncWrite), 0x83);
    }

    #[test]
    fn test_instruction_from_byte() {
        assert_eq!(Instruction::try_from(0x02).unwrap(), Instruction::Read);
        assert!(Instruction::try_from(0x7F).is_err());
    }
}
