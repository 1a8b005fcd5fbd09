//! Protocol 2.0 编解码
//!
//! 帧格式（双字节长度字段，CRC-16）：
//!
//! ```text
//! 指令包: FF FF FD 00 | id | len_lo len_hi | instr | params..        | crc_lo crc_hi
//! 状态包: FF FF FD 00 | id | len_lo len_hi | 0x55  | error params.. | crc_lo crc_hi
//! ```
//!
//! `len` 统计指令字节到 CRC 结束的字节数；CRC-16（多项式 0x8005，
//! 初值 0，不反转）覆盖 CRC 之前的全部字节。地址与字节数为 16 位，
//! 支持同步读指令。
//!
//! 参数区出现帧头模式 `FF FF FD` 时做字节填充（其后插入 `0xFD`），
//! 接收方向去除；长度字段与 CRC 都按填充后的字节计算。

use crate::codec::{PacketCodec, StatusPacket, SyncWriteEntry, debug_assert_unicast};
use crate::instruction::STATUS_INSTRUCTION;
use crate::{BROADCAST_ID, Instruction, ProtocolError, ProtocolVersion};

/// 帧头
const HEADER: [u8; 4] = [0xFF, 0xFF, 0xFD, 0x00];

/// 状态包的最小长度（无参数）：header(4) id(1) len(2) instr(1) err(1) crc(2)
const MIN_STATUS_LEN: usize = 11;

/// Protocol 2.0 编解码器（无状态单例）
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolV2;

/// CRC-16：多项式 0x8005，初值 0，不反转（设备固件使用的查表算法的位级等价实现）
pub(crate) fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x8005;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// 字节填充：载荷里每出现一次帧头模式 `FF FF FD` 就在其后插入
/// 一个 `0xFD`，防止接收方把载荷误认成新帧的开始。长度字段统计的
/// 是填充后的字节数。
fn stuff(params: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(params.len());
    for &byte in params {
        out.push(byte);
        if out.len() >= 3 && out[out.len() - 3..] == [0xFF, 0xFF, 0xFD] {
            out.push(0xFD);
        }
    }
    out
}

/// 逆过程：`FF FF FD` 之后的填充字节 `0xFD` 被丢弃
fn unstuff(region: &[u8]) -> smallvec::SmallVec<[u8; 8]> {
    let mut out: smallvec::SmallVec<[u8; 8]> = smallvec::SmallVec::with_capacity(region.len());
    let mut i = 0;
    while i < region.len() {
        out.push(region[i]);
        let n = out.len();
        if n >= 3 && out[n - 3..] == [0xFF, 0xFF, 0xFD] && i + 1 < region.len() {
            i += 1;
        }
        i += 1;
    }
    out
}

impl ProtocolV2 {
    fn encode_packet(&self, id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        debug_assert_unicast(id);

        // 指令字节不会是 0xFF，帧头模式只可能完整落在参数区里
        let stuffed = stuff(params);
        let len = (stuffed.len() + 3) as u16;
        let mut packet = Vec::with_capacity(stuffed.len() + 10);
        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.extend_from_slice(&len.to_le_bytes());
        packet.push(instruction.into());
        packet.extend_from_slice(&stuffed);
        let crc = crc16(&packet);
        packet.extend_from_slice(&crc.to_le_bytes());
        packet
    }
}

impl PacketCodec for ProtocolV2 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V2
    }

    fn encode_ping(&self, id: u8) -> Vec<u8> {
        self.encode_packet(id, Instruction::Ping, &[])
    }

    fn encode_read(&self, id: u8, address: u16, count: u16) -> Result<Vec<u8>, ProtocolError> {
        if count == 0 {
            return Err(ProtocolError::InvalidCount { version: 2, count });
        }
        let mut params = [0u8; 4];
        params[..2].copy_from_slice(&address.to_le_bytes());
        params[2..].copy_from_slice(&count.to_le_bytes());
        Ok(self.encode_packet(id, Instruction::Read, &params))
    }

    fn encode_write(&self, id: u8, address: u16, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        if data.is_empty() {
            return Err(ProtocolError::InvalidCount { version: 2, count: 0 });
        }
        let mut params = Vec::with_capacity(data.len() + 2);
        params.extend_from_slice(&address.to_le_bytes());
        params.extend_from_slice(data);
        Ok(self.encode_packet(id, Instruction::Write, &params))
    }

    fn encode_sync_read(
        &self,
        address: u16,
        count: u16,
        ids: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        if count == 0 {
            return Err(ProtocolError::InvalidCount { version: 2, count });
        }
        let mut params = Vec::with_capacity(ids.len() + 4);
        params.extend_from_slice(&address.to_le_bytes());
        params.extend_from_slice(&count.to_le_bytes());
        params.extend_from_slice(ids);
        Ok(self.encode_packet(BROADCAST_ID, Instruction::SyncRead, &params))
    }

    fn encode_sync_write(
        &self,
        address: u16,
        count: u16,
        entries: &[SyncWriteEntry],
    ) -> Result<Vec<u8>, ProtocolError> {
        if count == 0 {
            return Err(ProtocolError::InvalidCount { version: 2, count });
        }
        let mut params = Vec::with_capacity(4 + entries.len() * (count as usize + 1));
        params.extend_from_slice(&address.to_le_bytes());
        params.extend_from_slice(&count.to_le_bytes());
        for entry in entries {
            if entry.data.len() != count as usize {
                return Err(ProtocolError::InvalidCount {
                    version: 2,
                    count: entry.data.len() as u16,
                });
            }
            params.push(entry.id);
            params.extend_from_slice(&entry.data);
        }
        Ok(self.encode_packet(BROADCAST_ID, Instruction::SyncWrite, &params))
    }

    fn status_frame_len(&self, buf: &[u8]) -> Option<usize> {
        if buf.len() < 7 {
            return None;
        }
        let len = u16::from_le_bytes([buf[5], buf[6]]) as usize;
        Some(7 + len)
    }

    fn decode_status(&self, buf: &[u8]) -> Result<StatusPacket, ProtocolError> {
        if buf.len() < MIN_STATUS_LEN {
            return Err(ProtocolError::MalformedPacket(format!(
                "status packet too short: {} bytes",
                buf.len()
            )));
        }
        if buf[..4] != HEADER {
            return Err(ProtocolError::MalformedPacket(format!(
                "bad header: {:02X} {:02X} {:02X} {:02X}",
                buf[0], buf[1], buf[2], buf[3]
            )));
        }
        let declared = 7 + u16::from_le_bytes([buf[5], buf[6]]) as usize;
        if declared != buf.len() {
            return Err(ProtocolError::MalformedPacket(format!(
                "length field declares {} bytes, got {}",
                declared,
                buf.len()
            )));
        }

        let expected = crc16(&buf[..buf.len() - 2]);
        let actual = u16::from_le_bytes([buf[buf.len() - 2], buf[buf.len() - 1]]);
        if expected != actual {
            return Err(ProtocolError::ChecksumMismatch { expected, actual });
        }

        if buf[7] != STATUS_INSTRUCTION {
            return Err(ProtocolError::MalformedPacket(format!(
                "unexpected instruction byte 0x{:02X} in status packet",
                buf[7]
            )));
        }

        Ok(StatusPacket {
            id: buf[4],
            error: buf[8],
            params: unstuff(&buf[9..buf.len() - 2]),
        })
    }

    fn describe_hardware_error(&self, error: u8) -> String {
        if error == 0 {
            return "no hardware error".to_string();
        }
        let name = match error & 0x7F {
            0x01 => "result fail",
            0x02 => "instruction error",
            0x03 => "CRC error",
            0x04 => "data range error",
            0x05 => "data length error",
            0x06 => "data limit error",
            0x07 => "access error",
            _ => "unknown error",
        };
        if error & 0x80 != 0 {
            format!("0x{:02X} ({name}, alert set)", error)
        } else {
            format!("0x{:02X} ({name})", error)
        }
    }
}
