//! # Dynamixel Serial Transport Layer
//!
//! 串口硬件抽象层，提供统一的半双工字节流接口。
//!
//! 真实硬件走 [`SerialPortBus`]（`serialport` crate）；测试走
//! `mock` feature 下的 [`mock::MockSerialBus`]，两者都实现
//! [`SerialBus`]。分包逻辑（找帧头、校验）不在本层，本层只负责
//! 字节收发、超时与端口生命周期。

use std::time::Duration;
use thiserror::Error;

pub mod port;
pub use port::SerialPortBus;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

/// 串口传输层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    /// 打开串口失败（设备不存在、被占用、权限不足）
    #[error("failed to open serial port '{port}': {source}")]
    PortOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// 已打开的端口上设置波特率失败
    #[error("failed to set baud rate {baud} on '{port}': {source}")]
    BaudRate {
        port: String,
        baud: u32,
        #[source]
        source: serialport::Error,
    },

    /// 读等待超时（在约定的应答窗口内没有收到数据）
    #[error("timed out after {0:?} waiting for serial data")]
    Timeout(Duration),

    /// 底层 IO 错误
    #[error("serial IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 端口已关闭（close 之后继续使用）
    #[error("serial port is closed")]
    Closed,
}

/// 半双工串口字节流
///
/// 所有方法都是阻塞的；实现不做任何重试。同一时刻只允许一个请求
/// 在总线上飞行，串行化由上层（驱动的总线锁）保证。
pub trait SerialBus: Send {
    /// 把整个缓冲区写上总线并刷出
    fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError>;

    /// 读入最多 `buf.len()` 个字节
    ///
    /// 返回 `Ok(0)` 表示本轮超时片内没有数据到达（不是 EOF）；
    /// 上层按自己的截止时间决定是否继续轮询。
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError>;

    /// 丢弃输入缓冲区里残留的过期字节（事务开始前调用）
    fn discard_input(&mut self) -> Result<(), SerialError>;

    /// 在已打开的端口上设置波特率
    fn set_baud_rate(&mut self, baud: u32) -> Result<(), SerialError>;

    /// 关闭端口并释放 OS 句柄；幂等
    fn close(&mut self) -> Result<(), SerialError>;

    /// 端口是否处于打开状态
    fn is_open(&self) -> bool;

    /// 端口的人类可读描述（日志用）
    fn describe(&self) -> String;
}
