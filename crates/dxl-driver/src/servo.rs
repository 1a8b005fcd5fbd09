//! 单设备句柄
//!
//! [`Servo`] 绑定一条共享总线上的一个设备 ID 与其控制表布局。
//! 句柄是轻量的寄存器访问入口：不轮询、不缓存设备状态（唯二的
//! 本地状态是最近一次下发的目标位置脉冲值与力矩开关影子标志，
//! 用于行前校验）。同一设备可以同时存在多个句柄，互不感知。

use crate::bus::Bus;
use crate::error::DriverError;
use crate::units::{AngleUnit, angle_to_pulse, pulse_to_angle};
use dxl_protocol::{
    ControlTable, MAX_DEVICE_ID, PacketCodec, Register, RegisterSpec, StatusPacket, codec_for,
    decode_register_value, encode_register_value,
};
use std::sync::Arc;
use tracing::{debug, trace};

/// 单个伺服设备的句柄
pub struct Servo {
    bus: Arc<Bus>,
    id: u8,
    table: ControlTable,
    /// 半圈对应的脉冲数；默认取型号中位值，可覆盖
    midpoint: f64,
    /// 最近一次下发的目标位置（脉冲），未下发过则为 None
    goal_pulse: Option<i64>,
    /// 力矩开关的影子标志，仅由本句柄的成功写入更新
    torque_enabled: bool,
}

impl Servo {
    /// 创建句柄
    ///
    /// # 参数
    /// - `protocol_version`: 1 或 2
    /// - `model`: 型号名（如 "XL330"、"AX12"）
    ///
    /// # 错误
    /// - `DriverError::InvalidId`: ID 超出单播范围（0..=252）
    /// - `ProtocolError::UnsupportedProtocol` / `UnknownModel`: 控制表查不到
    pub fn new(
        bus: Arc<Bus>,
        id: u8,
        protocol_version: u8,
        model: &str,
    ) -> Result<Self, DriverError> {
        if id > MAX_DEVICE_ID {
            return Err(DriverError::InvalidId(id));
        }
        let table = ControlTable::lookup(protocol_version, model)?;
        let midpoint = table.default_midpoint();
        debug!(
            "servo handle created: id={}, model={}, protocol {}",
            id,
            table.model(),
            table.version()
        );
        Ok(Self {
            bus,
            id,
            table,
            midpoint,
            goal_pulse: None,
            torque_enabled: false,
        })
    }

    /// 覆盖半圈脉冲数（非标齿轮比或改装编码器的设备）
    pub fn with_midpoint(mut self, midpoint: f64) -> Self {
        self.midpoint = midpoint;
        self
    }

    /// 设备 ID
    pub fn id(&self) -> u8 {
        self.id
    }

    /// 型号名
    pub fn model(&self) -> &'static str {
        self.table.model()
    }

    /// 半圈脉冲数
    pub fn midpoint(&self) -> f64 {
        self.midpoint
    }

    /// 力矩开关的影子标志（最近一次成功写入的值，非设备实时状态）
    pub fn torque_enabled(&self) -> bool {
        self.torque_enabled
    }

    /// 最近一次下发的目标位置（脉冲）
    pub fn last_goal_pulse(&self) -> Option<i64> {
        self.goal_pulse
    }

    pub(crate) fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    pub(crate) fn table(&self) -> &ControlTable {
        &self.table
    }

    pub(crate) fn set_torque_flag(&mut self, enabled: bool) {
        self.torque_enabled = enabled;
    }

    fn codec(&self) -> &'static dyn PacketCodec {
        codec_for(self.table.version())
    }

    /// 查寄存器地址；该布局没有此寄存器时给出带操作名的错误
    fn spec(&self, register: Register, operation: &'static str) -> Result<RegisterSpec, DriverError> {
        self.table
            .register(register)
            .ok_or(DriverError::UnsupportedOnProtocol {
                operation,
                version: self.table.version(),
            })
    }

    /// 状态包的硬件错误字节非零时转为 `HardwareFault`
    fn check_hardware(&self, status: &StatusPacket, address: u16) -> Result<(), DriverError> {
        if status.has_hardware_error() {
            return Err(DriverError::HardwareFault {
                id: self.id,
                code: status.error,
                address,
                description: self.codec().describe_hardware_error(status.error),
            });
        }
        Ok(())
    }

    /// PING 设备，确认在线与通路正常
    pub fn ping(&self) -> Result<(), DriverError> {
        let request = self.codec().encode_ping(self.id);
        let status = self
            .bus
            .transaction(self.table.version(), &request, self.id)?;
        self.check_hardware(&status, 0)?;
        trace!("ping ok: id={}", self.id);
        Ok(())
    }

    /// 读任意寄存器区间，返回小端拼接的原始值
    pub fn read_register(&self, address: u16, count: u16) -> Result<u32, DriverError> {
        let request = self.codec().encode_read(self.id, address, count)?;
        let status = self
            .bus
            .transaction(self.table.version(), &request, self.id)?;
        self.check_hardware(&status, address)?;
        Ok(decode_register_value(&status.params))
    }

    /// 写任意寄存器区间
    pub fn write_register(&self, address: u16, data: &[u8]) -> Result<(), DriverError> {
        let request = self.codec().encode_write(self.id, address, data)?;
        let status = self
            .bus
            .transaction(self.table.version(), &request, self.id)?;
        self.check_hardware(&status, address)
    }

    /// 读型号编号寄存器
    pub fn model_number(&self) -> Result<u16, DriverError> {
        let spec = self.spec(Register::ModelNumber, "read model number")?;
        Ok(self.read_register(spec.address, spec.width)? as u16)
    }

    /// 读固件版本
    pub fn firmware_version(&self) -> Result<u8, DriverError> {
        let spec = self.spec(Register::FirmwareVersion, "read firmware version")?;
        Ok(self.read_register(spec.address, spec.width)? as u8)
    }

    /// 开 / 关力矩
    ///
    /// 设备确认后才更新影子标志；事务失败时标志保持原值。
    pub fn set_torque_enabled(&mut self, enabled: bool) -> Result<(), DriverError> {
        let spec = self.spec(Register::TorqueEnable, "set torque")?;
        self.write_register(spec.address, &[u8::from(enabled)])?;
        self.torque_enabled = enabled;
        debug!("torque {} on id {}", if enabled { "on" } else { "off" }, self.id);
        Ok(())
    }

    /// 设置零点偏移
    ///
    /// 偏移量限制在 ±1/4 圈内；力矩开启时设备会拒绝写入该寄存器，
    /// 行前用影子标志拦截。仅 Protocol 2.0 布局有此寄存器。
    ///
    /// # 错误
    /// - `UnsupportedOnProtocol`: 1.0 布局无零点偏移寄存器
    /// - `InvalidState`: 力矩开启中
    /// - `OutOfRange`: 超出 ±1/4 圈
    pub fn set_homing_offset(&mut self, angle: f64, unit: AngleUnit) -> Result<(), DriverError> {
        let spec = self.spec(Register::HomingOffset, "set homing offset")?;
        if self.torque_enabled {
            return Err(DriverError::InvalidState { id: self.id });
        }
        let limit = unit.quarter_turn();
        if !angle.is_finite() || angle.abs() > limit {
            return Err(DriverError::OutOfRange {
                angle,
                limit,
                unit: unit.symbol(),
            });
        }
        let pulse = angle_to_pulse(angle, unit, self.midpoint);
        let data = encode_register_value(pulse, spec.width);
        self.write_register(spec.address, &data)?;
        debug!("homing offset set to {} pulses on id {}", pulse, self.id);
        Ok(())
    }

    /// 读当前位置
    ///
    /// 1.0 布局位置寄存器为 2 字节无符号，2.0 为 4 字节有符号
    /// （多圈模式下可为负）。
    pub fn get_position(&self, unit: AngleUnit) -> Result<f64, DriverError> {
        let spec = self.spec(Register::PresentPosition, "read position")?;
        let raw = self.read_register(spec.address, spec.width)?;
        let pulse = match spec.width {
            2 => i64::from(raw as u16),
            _ => i64::from(raw as i32),
        };
        Ok(pulse_to_angle(pulse, unit, self.midpoint))
    }

    /// 下发目标位置
    ///
    /// 角度经该句柄的半圈脉冲数换算并四舍五入；成功后记录目标
    /// 脉冲值。
    pub fn set_position(&mut self, angle: f64, unit: AngleUnit) -> Result<(), DriverError> {
        let spec = self.spec(Register::GoalPosition, "set position")?;
        let pulse = angle_to_pulse(angle, unit, self.midpoint);
        let data = encode_register_value(pulse, spec.width);
        self.write_register(spec.address, &data)?;
        self.goal_pulse = Some(pulse);
        trace!("goal position {} pulses on id {}", pulse, self.id);
        Ok(())
    }

    /// 目标位置的脉冲换算（组操作复用，不发 IO）
    pub(crate) fn position_pulse(&self, angle: f64, unit: AngleUnit) -> i64 {
        angle_to_pulse(angle, unit, self.midpoint)
    }

    /// 当前位置的角度换算（组操作复用，不发 IO）
    pub(crate) fn pulse_angle(&self, pulse: i64, unit: AngleUnit) -> f64 {
        pulse_to_angle(pulse, unit, self.midpoint)
    }

    pub(crate) fn record_goal(&mut self, pulse: i64) {
        self.goal_pulse = Some(pulse);
    }
}
