//! 指令包 / 状态包编解码的统一抽象
//!
//! 两个协议版本的帧格式差异（帧头、长度字段、校验算法）全部封装在
//! `PacketCodec` 的实现里；上层（总线、舵机句柄、同步组操作）只面向
//! 本模块的类型工作。
//!
//! # 两条独立的错误通道
//!
//! 一次总线事务有两个互不重叠的结果：
//!
//! 1. **通信结果**：帧是否完整送达并通过校验 —— 体现在
//!    `decode_status` 的 `Result` 上；
//! 2. **设备侧硬件错误**：设备自身报告的故障字节（过载、欠压等）——
//!    体现在 `StatusPacket::error` 上。
//!
//! 总线事务成功不代表设备无故障，调用方必须分别检查两者。

use crate::{ProtocolError, ProtocolVersion};
use smallvec::SmallVec;

/// 解析后的状态包
///
/// `error` 是设备报告的硬件错误字节，`0` 表示无故障；
/// 具体位含义随协议版本不同，见 [`PacketCodec::describe_hardware_error`]。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPacket {
    /// 应答设备的 ID
    pub id: u8,
    /// 设备报告的硬件错误字节（与通信结果正交）
    pub error: u8,
    /// 状态包携带的参数字节（读操作的寄存器数据）
    pub params: SmallVec<[u8; 8]>,
}

impl StatusPacket {
    /// 设备是否报告了硬件故障
    pub fn has_hardware_error(&self) -> bool {
        self.error != 0
    }
}

/// 同步写批次中的一项：(设备 ID, 寄存器值字节)
#[derive(Debug, Clone)]
pub struct SyncWriteEntry {
    pub id: u8,
    pub data: SmallVec<[u8; 4]>,
}

impl SyncWriteEntry {
    pub fn new(id: u8, data: &[u8]) -> Self {
        Self {
            id,
            data: SmallVec::from_slice(data),
        }
    }
}

/// 协议编解码器
///
/// 实现必须是无状态的：同一输入永远产生同一输出，且可以被多个
/// 设备句柄并发共享（`codec_for` 返回 `'static` 单例）。
pub trait PacketCodec: Send + Sync {
    /// 编解码器对应的协议版本
    fn version(&self) -> ProtocolVersion;

    /// 构建 PING 指令包
    fn encode_ping(&self, id: u8) -> Vec<u8>;

    /// 构建读寄存器指令包
    ///
    /// # 错误
    /// - `ProtocolError::InvalidAddress` / `InvalidCount`: 地址或字节数
    ///   超出该协议版本的可编码范围（Protocol 1.0 只有单字节地址）
    fn encode_read(&self, id: u8, address: u16, count: u16) -> Result<Vec<u8>, ProtocolError>;

    /// 构建写寄存器指令包
    fn encode_write(&self, id: u8, address: u16, data: &[u8]) -> Result<Vec<u8>, ProtocolError>;

    /// 构建同步读指令包（广播发出，每个目标设备各回一个状态包）
    ///
    /// # 错误
    /// - `ProtocolError::UnsupportedInstruction`: Protocol 1.0 无此指令
    fn encode_sync_read(
        &self,
        address: u16,
        count: u16,
        ids: &[u8],
    ) -> Result<Vec<u8>, ProtocolError>;

    /// 构建同步写指令包（广播发出，设备不应答）
    ///
    /// 所有条目的 `data` 长度必须等于 `count`。
    fn encode_sync_write(
        &self,
        address: u16,
        count: u16,
        entries: &[SyncWriteEntry],
    ) -> Result<Vec<u8>, ProtocolError>;

    /// 增量解析辅助：根据已收到的前缀字节推断完整状态包的总长度
    ///
    /// - `None`: 字节还不够，无法判断（继续收）
    /// - `Some(n)`: 状态包总长为 `n` 字节（收满 `n` 字节后调用
    ///   [`decode_status`](Self::decode_status)）
    ///
    /// 帧头错误不在这里报告，由 `decode_status` 统一诊断。
    fn status_frame_len(&self, buf: &[u8]) -> Option<usize>;

    /// 解析并校验一个完整的状态包
    ///
    /// # 错误
    /// - `ProtocolError::MalformedPacket`: 帧头 / 长度字段 / 指令字节非法
    /// - `ProtocolError::ChecksumMismatch`: 校验和或 CRC 不匹配
    fn decode_status(&self, buf: &[u8]) -> Result<StatusPacket, ProtocolError>;

    /// 硬件错误字节的人类可读描述（用于诊断信息）
    fn describe_hardware_error(&self, error: u8) -> String;
}

/// 按协议版本取编解码器单例
pub fn codec_for(version: ProtocolVersion) -> &'static dyn PacketCodec {
    match version {
        ProtocolVersion::V1 => &crate::v1::ProtocolV1,
        ProtocolVersion::V2 => &crate::v2::ProtocolV2,
    }
}

/// 校验指令包的目标 ID（单播指令不允许使用保留 ID）
pub(crate) fn debug_assert_unicast(id: u8) {
    debug_assert!(
        id <= crate::MAX_DEVICE_ID || id == crate::BROADCAST_ID,
        "device id {id} out of range"
    );
}
