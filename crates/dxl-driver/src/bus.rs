//! 共享总线（端口处理器）
//!
//! 一个 [`Bus`] 拥有一条串口链路，被同一条物理总线上的所有设备
//! 句柄通过 `Arc<Bus>` 共享。串口是半双工的有状态资源，任意时刻
//! 只允许一个请求在飞行：所有 IO 都在内部互斥锁之下进行，交错
//! 写入会破坏帧边界。
//!
//! 协议版本不是总线的属性——同一条总线上可以混接 1.0 / 2.0 设备，
//! 版本由每次调用显式传入，不存在进程级"当前协议版本"状态。

use crate::DriverError;
use dxl_protocol::{BROADCAST_ID, PacketCodec, ProtocolVersion, StatusPacket, codec_for};
use dxl_serial::{SerialBus, SerialError, SerialPortBus};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 默认应答窗口
const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(200);

/// 共享串口总线
pub struct Bus {
    /// 串口 IO（互斥锁串行化所有事务）
    io: Mutex<Box<dyn SerialBus>>,
    /// 单次事务的应答窗口
    response_timeout: Duration,
    /// 端口描述（诊断信息用）
    description: String,
}

impl Bus {
    /// 打开真实串口
    ///
    /// # 错误
    /// - `SerialError::PortOpen`: 设备不存在 / 被占用 / 权限不足
    /// - `SerialError::BaudRate`: 波特率无法设置
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, DriverError> {
        let port = SerialPortBus::open(port_name, baud_rate)?;
        Ok(Self::from_transport(Box::new(port)))
    }

    /// 在任意 [`SerialBus`] 实现之上构建总线（测试时注入 mock）
    pub fn from_transport(transport: Box<dyn SerialBus>) -> Self {
        let description = transport.describe();
        debug!("bus ready on {}", description);
        Self {
            io: Mutex::new(transport),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            description,
        }
    }

    /// 调整应答窗口（构建时链式调用）
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// 当前应答窗口
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// 端口描述
    pub fn description(&self) -> &str {
        &self.description
    }

    /// 显式关闭端口；幂等，之后的任何事务都失败于 `SerialError::Closed`
    pub fn close(&self) -> Result<(), DriverError> {
        let mut io = self.io.lock();
        io.close()?;
        debug!("bus closed on {}", self.description);
        Ok(())
    }

    /// 端口是否仍然打开
    pub fn is_open(&self) -> bool {
        self.io.lock().is_open()
    }

    /// 单设备事务：发送一个指令包，等待该设备的一个状态包
    ///
    /// 事务开始前丢弃输入缓冲里的过期字节。应答设备 ID 与期望不符
    /// 时返回 `UnexpectedResponder`（总线上 ID 冲突或接线错误的
    /// 典型症状）。
    ///
    /// # 错误
    /// - `SerialError::Timeout`（经 `DriverError::Serial`）: 应答窗口耗尽
    /// - `ProtocolError::*`: 应答帧损坏
    pub fn transaction(
        &self,
        version: ProtocolVersion,
        request: &[u8],
        expect_reply_from: u8,
    ) -> Result<StatusPacket, DriverError> {
        let codec = codec_for(version);
        let mut io = self.io.lock();
        io.discard_input()?;
        io.write_all(request)?;

        let deadline = Instant::now() + self.response_timeout;
        let mut reader = FrameReader::new(io.as_mut());
        let status = reader.next_status(codec, deadline, self.response_timeout)?;

        if status.id != expect_reply_from {
            return Err(DriverError::UnexpectedResponder {
                expected: expect_reply_from,
                actual: status.id,
            });
        }
        trace!(
            "transaction ok: id={}, error=0x{:02X}, {} param bytes",
            status.id,
            status.error,
            status.params.len()
        );
        Ok(status)
    }

    /// 广播事务：发送一个指令包，不等待应答（同步写）
    pub fn broadcast(&self, request: &[u8]) -> Result<(), DriverError> {
        let mut io = self.io.lock();
        io.discard_input()?;
        io.write_all(request)?;
        Ok(())
    }

    /// 批量应答事务：发送一个指令包，收集多个设备的状态包
    ///
    /// 用于同步读：每个目标设备各回一个状态包。收齐 `expected` 里
    /// 全部 ID 或应答窗口耗尽即返回；缺谁由调用方（组操作）诊断，
    /// 本方法不视为错误。
    pub fn collect_replies(
        &self,
        version: ProtocolVersion,
        request: &[u8],
        expected: &[u8],
    ) -> Result<Vec<StatusPacket>, DriverError> {
        let codec = codec_for(version);
        let mut io = self.io.lock();
        io.discard_input()?;
        io.write_all(request)?;

        let deadline = Instant::now() + self.response_timeout;
        let mut reader = FrameReader::new(io.as_mut());
        let mut replies: Vec<StatusPacket> = Vec::with_capacity(expected.len());
        let mut pending: BTreeSet<u8> = expected.iter().copied().collect();

        while !pending.is_empty() {
            match reader.next_status(codec, deadline, self.response_timeout) {
                Ok(status) => {
                    pending.remove(&status.id);
                    replies.push(status);
                }
                Err(DriverError::Serial(SerialError::Timeout(_))) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(replies)
    }

    /// 广播发现：向保留的广播 ID 发 PING，收集窗口内应答的设备 ID
    ///
    /// 仅 Protocol 2.0 支持（1.0 的广播 PING 会引起应答冲突，
    /// 设备固件不支持有序应答）。
    ///
    /// # 错误
    /// - `DriverError::UnsupportedOperation`: 协议版本为 1.0
    pub fn broadcast_ping(&self, version: ProtocolVersion) -> Result<BTreeSet<u8>, DriverError> {
        if version == ProtocolVersion::V1 {
            return Err(DriverError::UnsupportedOperation {
                operation: "broadcast ping",
            });
        }
        let codec = codec_for(version);
        let request = codec.encode_ping(BROADCAST_ID);

        let mut io = self.io.lock();
        io.discard_input()?;
        io.write_all(&request)?;

        let deadline = Instant::now() + self.response_timeout;
        let mut reader = FrameReader::new(io.as_mut());
        let mut found = BTreeSet::new();

        loop {
            match reader.next_status(codec, deadline, self.response_timeout) {
                Ok(status) => {
                    trace!("ping reply from id {}", status.id);
                    found.insert(status.id);
                }
                // 窗口耗尽：扫描自然结束
                Err(DriverError::Serial(SerialError::Timeout(_))) => break,
                // 扫描场景下多设备同时上线，个别帧损坏不终止扫描
                Err(DriverError::Protocol(e)) => {
                    warn!("discarding corrupt ping reply: {}", e);
                    reader.resync();
                }
                Err(e) => return Err(e),
            }
        }
        debug!("broadcast ping found {} device(s)", found.len());
        Ok(found)
    }
}

/// 从字节流中增量切出状态包
///
/// 持有一次事务期间的接收缓冲；一个缓冲里可能连续到达多个状态包
/// （同步读、广播发现），解码一个就消费一个。
struct FrameReader<'a> {
    io: &'a mut dyn SerialBus,
    buf: Vec<u8>,
}

impl<'a> FrameReader<'a> {
    fn new(io: &'a mut dyn SerialBus) -> Self {
        Self {
            io,
            buf: Vec::with_capacity(64),
        }
    }

    /// 读出并解码下一个完整状态包
    ///
    /// 阻塞直到解出一个包或越过 `deadline`（返回 `Timeout`）。
    fn next_status(
        &mut self,
        codec: &dyn PacketCodec,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<StatusPacket, DriverError> {
        let mut chunk = [0u8; 64];
        loop {
            if let Some(total) = codec.status_frame_len(&self.buf) {
                if self.buf.len() >= total {
                    let status = codec.decode_status(&self.buf[..total])?;
                    self.buf.drain(..total);
                    return Ok(status);
                }
            }
            if Instant::now() >= deadline {
                return Err(SerialError::Timeout(timeout).into());
            }
            let n = self.io.read(&mut chunk)?;
            if n > 0 {
                self.buf.extend_from_slice(&chunk[..n]);
            }
        }
    }

    /// 丢弃当前缓冲（解码失败后重新找帧边界）
    fn resync(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxl_serial::mock::MockSerialBus;

    /// 构造一个 2.0 状态包（测试辅助）
    fn status_v2(id: u8, error: u8, params: &[u8]) -> Vec<u8> {
        let mut frame = vec![0xFF, 0xFF, 0xFD, 0x00, id];
        let len = (params.len() + 4) as u16;
        frame.extend_from_slice(&len.to_le_bytes());
        frame.push(0x55);
        frame.push(error);
        frame.extend_from_slice(params);
        let crc = crc16_ref(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        frame
    }

    /// CRC-16 参考实现（与协议层一致，测试侧独立实现防止同源错误）
    fn crc16_ref(data: &[u8]) -> u16 {
        let mut crc: u16 = 0;
        for &byte in data {
            crc ^= (byte as u16) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 {
                    (crc << 1) ^ 0x8005
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    fn short_timeout_bus(mock: MockSerialBus) -> Bus {
        Bus::from_transport(Box::new(mock)).with_response_timeout(Duration::from_millis(20))
    }

    #[test]
    fn test_transaction_roundtrip() {
        let reply = status_v2(5, 0, &[0x10, 0x27]);
        let mock = MockSerialBus::with_responder(move |_| reply.clone());
        let bus = short_timeout_bus(mock);

        let request = codec_for(ProtocolVersion::V2).encode_ping(5);
        let status = bus.transaction(ProtocolVersion::V2, &request, 5).unwrap();
        assert_eq!(status.id, 5);
        assert_eq!(status.params.as_slice(), &[0x10, 0x27]);
    }

    #[test]
    fn test_transaction_timeout_when_no_reply() {
        let mock = MockSerialBus::new();
        let bus = short_timeout_bus(mock);

        let request = codec_for(ProtocolVersion::V2).encode_ping(5);
        let err = bus.transaction(ProtocolVersion::V2, &request, 5).unwrap_err();
        assert!(matches!(
            err,
            DriverError::Serial(SerialError::Timeout(_))
        ));
    }

    #[test]
    fn test_transaction_detects_wrong_responder() {
        let reply = status_v2(9, 0, &[]);
        let mock = MockSerialBus::with_responder(move |_| reply.clone());
        let bus = short_timeout_bus(mock);

        let request = codec_for(ProtocolVersion::V2).encode_ping(5);
        let err = bus.transaction(ProtocolVersion::V2, &request, 5).unwrap_err();
        assert!(matches!(
            err,
            DriverError::UnexpectedResponder { expected: 5, actual: 9 }
        ));
    }

    #[test]
    fn test_collect_replies_returns_partial_set() {
        // 三个目标设备只有两个应答；缺失由调用方诊断
        let mut replies = status_v2(1, 0, &[1, 0, 0, 0]);
        replies.extend(status_v2(15, 0, &[2, 0, 0, 0]));
        let mock = MockSerialBus::with_responder(move |_| replies.clone());
        let bus = short_timeout_bus(mock);

        let request = codec_for(ProtocolVersion::V2)
            .encode_sync_read(132, 4, &[1, 12, 15])
            .unwrap();
        let statuses = bus
            .collect_replies(ProtocolVersion::V2, &request, &[1, 12, 15])
            .unwrap();
        let ids: Vec<u8> = statuses.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 15]);
    }

    #[test]
    fn test_broadcast_ping_collects_ids() {
        let mut replies = status_v2(1, 0, &[]);
        replies.extend(status_v2(12, 0, &[]));
        replies.extend(status_v2(15, 0, &[]));
        let mock = MockSerialBus::with_responder(move |_| replies.clone());
        let bus = short_timeout_bus(mock);

        let found = bus.broadcast_ping(ProtocolVersion::V2).unwrap();
        assert_eq!(found.into_iter().collect::<Vec<u8>>(), vec![1, 12, 15]);
    }

    #[test]
    fn test_broadcast_ping_rejected_on_v1() {
        let bus = short_timeout_bus(MockSerialBus::new());
        let err = bus.broadcast_ping(ProtocolVersion::V1).unwrap_err();
        assert!(matches!(err, DriverError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_close_is_idempotent_and_final() {
        let bus = short_timeout_bus(MockSerialBus::new());
        bus.close().unwrap();
        bus.close().unwrap();
        assert!(!bus.is_open());

        let request = codec_for(ProtocolVersion::V2).encode_ping(1);
        let err = bus.transaction(ProtocolVersion::V2, &request, 1).unwrap_err();
        assert!(matches!(err, DriverError::Serial(SerialError::Closed)));
    }
}
