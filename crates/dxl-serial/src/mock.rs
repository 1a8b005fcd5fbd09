//! 无硬件的 Mock 串口（测试用）
//!
//! 两种喂数据方式：
//!
//! 1. **应答器模式**（推荐）：注册一个闭包，每次写入请求时由闭包
//!    计算应答字节并放入接收缓冲，可以模拟一条完整的总线会话
//!    （包括多设备逐个应答、丢包、注错）；
//! 2. **队列模式**：用 [`MockSerialBus::enqueue`] 预先塞入应答字节。
//!    注意事务开始时上层会调用 `discard_input` 清掉残留输入，
//!    预塞字节只适合直接驱动 `read` 的测试。
//!
//! 已写入总线的完整请求可通过 [`MockSerialBus::sent_log`] 句柄在
//! 测试断言中回看。

use crate::{SerialBus, SerialError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// 写入请求 → 应答字节 的模拟器
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

/// Mock 串口总线
pub struct MockSerialBus {
    rx: VecDeque<u8>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    responder: Option<Responder>,
    open: bool,
    baud_rate: u32,
}

impl Default for MockSerialBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSerialBus {
    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            responder: None,
            open: true,
            baud_rate: 57_600,
        }
    }

    /// 应答器模式：每次 `write_all` 之后调用 `responder`，
    /// 其返回值进入接收缓冲
    pub fn with_responder(responder: impl FnMut(&[u8]) -> Vec<u8> + Send + 'static) -> Self {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    /// 预塞应答字节（队列模式）
    pub fn enqueue(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// 取得已发送请求日志的共享句柄（move 进 `Bus` 之前调用）
    pub fn sent_log(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.sent)
    }
}

impl SerialBus for MockSerialBus {
    fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError> {
        if !self.open {
            return Err(SerialError::Closed);
        }
        self.sent.lock().expect("sent log poisoned").push(data.to_vec());
        if let Some(responder) = self.responder.as_mut() {
            let reply = responder(data);
            self.rx.extend(reply);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        if !self.open {
            return Err(SerialError::Closed);
        }
        let mut n = 0;
        while n < buf.len() {
            match self.rx.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn discard_input(&mut self) -> Result<(), SerialError> {
        if !self.open {
            return Err(SerialError::Closed);
        }
        self.rx.clear();
        Ok(())
    }

    fn set_baud_rate(&mut self, baud: u32) -> Result<(), SerialError> {
        if !self.open {
            return Err(SerialError::Closed);
        }
        self.baud_rate = baud;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SerialError> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn describe(&self) -> String {
        format!("mock @ {} baud", self.baud_rate)
    }
}
