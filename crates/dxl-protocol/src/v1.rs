//! Protocol 1.0 编解码
//!
//! 帧格式（单字节长度字段，8-bit 补码校验和）：
//!
//! ```text
//! 指令包: FF FF | id | len | instr | params.. | chk
//! 状态包: FF FF | id | len | error | params.. | chk
//! ```
//!
//! `len = params + 2`，`chk = ~(id + len + instr/error + Σparams)`。
//! 地址与字节数都只有一个字节宽；不存在同步读指令。

use crate::codec::{PacketCodec, StatusPacket, SyncWriteEntry, debug_assert_unicast};
use crate::{BROADCAST_ID, Instruction, ProtocolError, ProtocolVersion};

/// 状态包的最小长度（无参数）：FF FF id len err chk
const MIN_STATUS_LEN: usize = 6;

/// Protocol 1.0 编解码器（无状态单例）
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolV1;

/// 8-bit 补码校验和，计算范围为 id..=最后一个参数字节
fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

impl ProtocolV1 {
    fn encode_packet(&self, id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        debug_assert_unicast(id);
        debug_assert!(params.len() <= 0xFD, "params exceed protocol 1.0 frame");

        let len = (params.len() + 2) as u8;
        let mut packet = Vec::with_capacity(params.len() + 6);
        packet.extend_from_slice(&[0xFF, 0xFF, id, len, instruction.into()]);
        packet.extend_from_slice(params);
        packet.push(checksum(&packet[2..]));
        packet
    }

    fn check_address(&self, address: u16) -> Result<u8, ProtocolError> {
        u8::try_from(address).map_err(|_| ProtocolError::InvalidAddress {
            version: 1,
            address,
        })
    }

    fn check_count(&self, count: u16) -> Result<u8, ProtocolError> {
        if count == 0 {
            return Err(ProtocolError::InvalidCount { version: 1, count });
        }
        u8::try_from(count).map_err(|_| ProtocolError::InvalidCount { version: 1, count })
    }
}

impl PacketCodec for ProtocolV1 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V1
    }

    fn encode_ping(&self, id: u8) -> Vec<u8> {
        self.encode_packet(id, Instruction::Ping, &[])
    }

    fn encode_read(&self, id: u8, address: u16, count: u16) -> Result<Vec<u8>, ProtocolError> {
        let address = self.check_address(address)?;
        let count = self.check_count(count)?;
        Ok(self.encode_packet(id, Instruction::Read, &[address, count]))
    }

    fn encode_write(&self, id: u8, address: u16, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let address = self.check_address(address)?;
        self.check_count(data.len() as u16)?;

        let mut params = Vec::with_capacity(data.len() + 1);
        params.push(address);
        params.extend_from_slice(data);
        Ok(self.encode_packet(id, Instruction::Write, &params))
    }

    fn encode_sync_read(
        &self,
        _address: u16,
        _count: u16,
        _ids: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        Err(ProtocolError::UnsupportedInstruction(Instruction::SyncRead))
    }

    fn encode_sync_write(
        &self,
        address: u16,
        count: u16,
        entries: &[SyncWriteEntry],
    ) -> Result<Vec<u8>, ProtocolError> {
        let address = self.check_address(address)?;
        let count_byte = self.check_count(count)?;

        let mut params = Vec::with_capacity(2 + entries.len() * (count as usize + 1));
        params.push(address);
        params.push(count_byte);
        for entry in entries {
            if entry.data.len() != count as usize {
                return Err(ProtocolError::InvalidCount {
                    version: 1,
                    count: entry.data.len() as u16,
                });
            }
            params.push(entry.id);
            params.extend_from_slice(&entry.data);
        }
        if params.len() > 0xFD {
            return Err(ProtocolError::MalformedPacket(format!(
                "sync write batch of {} entries exceeds protocol 1.0 frame",
                entries.len()
            )));
        }
        Ok(self.encode_packet(BROADCAST_ID, Instruction::SyncWrite, &params))
    }

    fn status_frame_len(&self, buf: &[u8]) -> Option<usize> {
        if buf.len() < 4 {
            return None;
        }
        Some(4 + buf[3] as usize)
    }

    fn decode_status(&self, buf: &[u8]) -> Result<StatusPacket, ProtocolError> {
        if buf.len() < MIN_STATUS_LEN {
            return Err(ProtocolError::MalformedPacket(format!(
                "status packet too short: {} bytes",
                buf.len()
            )));
        }
        if buf[0] != 0xFF || buf[1] != 0xFF {
            return Err(ProtocolError::MalformedPacket(format!(
                "bad header: {:02X} {:02X}",
                buf[0], buf[1]
            )));
        }
        let declared = 4 + buf[3] as usize;
        if declared != buf.len() {
            return Err(ProtocolError::MalformedPacket(format!(
                "length field declares {} bytes, got {}",
                declared,
                buf.len()
            )));
        }

        let expected = checksum(&buf[2..buf.len() - 1]);
        let actual = buf[buf.len() - 1];
        if expected != actual {
            return Err(ProtocolError::ChecksumMismatch {
                expected: expected as u16,
                actual: actual as u16,
            });
        }

        Ok(StatusPacket {
            id: buf[2],
            error: buf[4],
            params: buf[5..buf.len() - 1].iter().copied().collect(),
        })
    }

    fn describe_hardware_error(&self, error: u8) -> String {
        if error == 0 {
            return "no hardware error".to_string();
        }
        const BITS: [(u8, &str); 7] = [
            (0x01, "input voltage error"),
            (0x02, "angle limit error"),
            (0x04, "overheating error"),
            (0x08, "range error"),
            (0x10, "checksum error"),
            (0x20, "overload error"),
            (0x40, "instruction error"),
        ];
        let names: Vec<&str> = BITS
            .iter()
            .filter(|(mask, _)| error & mask != 0)
            .map(|(_, name)| *name)
            .collect();
        format!("0x{:02X} ({})", error, names.join(", "))
    }
}
