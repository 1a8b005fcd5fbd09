//! `serialport` crate 之上的真实串口实现
//!
//! ## 超时模型
//!
//! 底层端口配置一个较短的"时间片"超时（默认 10ms）：`read` 在一个
//! 时间片内没有数据时返回 `Ok(0)`，由上层按整体截止时间循环轮询。
//! 这样上层的应答窗口与底层的系统调用超时解耦，关闭请求也能及时
//! 生效。
//!
//! ## 生命周期
//!
//! 端口在 `open` 时独占 OS 句柄，`close` 显式释放且幂等；`Drop`
//! 兜底关闭，保证异常路径上的确定性释放。

use crate::{SerialBus, SerialError};
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, trace};

/// 单次 `read` 系统调用的时间片
const READ_SLICE: Duration = Duration::from_millis(10);

/// 真实串口总线
pub struct SerialPortBus {
    port_name: String,
    baud_rate: u32,
    /// `None` 表示端口已关闭
    port: Option<Box<dyn SerialPort>>,
}

impl SerialPortBus {
    /// 打开串口并设置波特率
    ///
    /// 打开与设波特率是两个独立的失败点（对应设备不存在 vs 驱动
    /// 不支持该速率），分别映射到 `PortOpen` 与 `BaudRate`。
    ///
    /// # 参数
    /// - `port_name`: 平台设备路径（如 "/dev/ttyUSB0"、"COM3"）
    /// - `baud_rate`: 波特率（设备出厂默认 57600，混合总线常用 1_000_000）
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use dxl_serial::SerialPortBus;
    ///
    /// let bus = SerialPortBus::open("/dev/ttyUSB0", 57_600).unwrap();
    /// ```
    pub fn open(port_name: impl Into<String>, baud_rate: u32) -> Result<Self, SerialError> {
        let port_name = port_name.into();

        let mut port = serialport::new(&port_name, baud_rate)
            .timeout(READ_SLICE)
            .open()
            .map_err(|source| SerialError::PortOpen {
                port: port_name.clone(),
                source,
            })?;

        // 显式确认波特率生效（部分 USB 转串口适配器在 open 时静默
        // 回落到最近的可用速率）
        port.set_baud_rate(baud_rate).map_err(|source| SerialError::BaudRate {
            port: port_name.clone(),
            baud: baud_rate,
            source,
        })?;

        debug!("opened serial port '{}' at {} baud", port_name, baud_rate);

        Ok(Self {
            port_name,
            baud_rate,
            port: Some(port),
        })
    }

    /// 端口路径
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// 当前波特率
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, SerialError> {
        self.port.as_mut().ok_or(SerialError::Closed)
    }
}

impl SerialBus for SerialPortBus {
    fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError> {
        let port = self.port_mut()?;
        port.write_all(data)?;
        port.flush()?;
        trace!("tx {} bytes on '{}'", data.len(), self.port_name);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        let port = self.port_mut()?;
        match port.read(buf) {
            Ok(n) => {
                trace!("rx {} bytes on '{}'", n, self.port_name);
                Ok(n)
            }
            // 时间片内无数据：交还控制权，由上层决定是否继续等
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(SerialError::Io(e)),
        }
    }

    fn discard_input(&mut self) -> Result<(), SerialError> {
        let port = self.port_mut()?;
        port.clear(ClearBuffer::Input)
            .map_err(|e| SerialError::Io(std::io::Error::other(e)))?;
        Ok(())
    }

    fn set_baud_rate(&mut self, baud: u32) -> Result<(), SerialError> {
        let port_name = self.port_name.clone();
        let port = self.port_mut()?;
        port.set_baud_rate(baud).map_err(|source| SerialError::BaudRate {
            port: port_name,
            baud,
            source,
        })?;
        self.baud_rate = baud;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SerialError> {
        if let Some(port) = self.port.take() {
            drop(port);
            debug!("closed serial port '{}'", self.port_name);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.port_name, self.baud_rate)
    }
}

impl Drop for SerialPortBus {
    fn drop(&mut self) {
        if self.port.is_some() {
            trace!("[Auto-Drop] serial port '{}' closed", self.port_name);
            let _ = self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_nonexistent_port_fails_with_port_open() {
        let result = SerialPortBus::open("/dev/nonexistent_ttyUSB99", 57_600);
        match result {
            Err(SerialError::PortOpen { port, .. }) => {
                assert_eq!(port, "/dev/nonexistent_ttyUSB99");
            }
            other => panic!("expected PortOpen error, got {:?}", other.map(|_| ())),
        }
    }
}
