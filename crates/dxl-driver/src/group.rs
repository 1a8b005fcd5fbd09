//! 同步组操作
//!
//! [`ServoGroup`] 把同一条总线、同一控制表布局的若干设备组织成
//! 一个批量操作单元：同步写一帧广播覆盖全组，同步读一问多答。
//! 相比逐个事务，组操作把 N 次总线往返压缩成一次，是多关节
//! 同步运动的基础。
//!
//! 成员按 ID 升序存放；所有批量结果也按 ID 升序返回。

use crate::bus::Bus;
use crate::error::DriverError;
use crate::servo::Servo;
use crate::units::AngleUnit;
use dxl_protocol::{PacketCodec, RegisterSpec, StatusPacket, SyncWriteEntry, codec_for, decode_register_value, encode_register_value, Register};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// 同一条总线上的一组同布局设备
#[derive(Default)]
pub struct ServoGroup {
    servos: BTreeMap<u8, Servo>,
}

impl ServoGroup {
    /// 空组
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入成员，组接管句柄所有权
    ///
    /// # 错误
    /// - `DriverError::DuplicateMember`: 同 ID 成员已存在
    pub fn add_servo(&mut self, servo: Servo) -> Result<(), DriverError> {
        let id = servo.id();
        if self.servos.contains_key(&id) {
            return Err(DriverError::DuplicateMember { id });
        }
        self.servos.insert(id, servo);
        Ok(())
    }

    /// 移出成员，归还句柄
    ///
    /// # 错误
    /// - `DriverError::MemberNotFound`: 组里没有该 ID
    pub fn remove_servo(&mut self, id: u8) -> Result<Servo, DriverError> {
        self.servos
            .remove(&id)
            .ok_or(DriverError::MemberNotFound { id })
    }

    /// 清空
    pub fn clear(&mut self) {
        self.servos.clear();
    }

    /// 成员数量
    pub fn len(&self) -> usize {
        self.servos.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.servos.is_empty()
    }

    /// 成员 ID（升序）
    pub fn ids(&self) -> Vec<u8> {
        self.servos.keys().copied().collect()
    }

    /// 按 ID 取成员句柄
    pub fn get(&self, id: u8) -> Option<&Servo> {
        self.servos.get(&id)
    }

    /// 校验组的一致性，返回基准成员
    ///
    /// 批量帧只携带一个寄存器地址，要求所有成员共享布局；一帧只
    /// 走一条链路，要求所有成员共享总线。
    fn validated(&self) -> Result<&Servo, DriverError> {
        let mut members = self.servos.values();
        let first = members.next().ok_or(DriverError::EmptyGroup)?;
        for servo in members {
            if !servo.table().same_layout(first.table()) {
                return Err(DriverError::InconsistentGroup(
                    "members use different control table layouts",
                ));
            }
            if !Arc::ptr_eq(servo.bus(), first.bus()) {
                return Err(DriverError::InconsistentGroup(
                    "members are attached to different buses",
                ));
            }
        }
        Ok(first)
    }

    /// 组一致性校验 + 基准布局上的寄存器查找
    fn reference_spec(
        &self,
        register: Register,
        operation: &'static str,
    ) -> Result<(Arc<Bus>, RegisterSpec, &'static dyn PacketCodec), DriverError> {
        let reference = self.validated()?;
        let spec = reference
            .table()
            .register(register)
            .ok_or(DriverError::UnsupportedOnProtocol {
                operation,
                version: reference.table().version(),
            })?;
        Ok((
            Arc::clone(reference.bus()),
            spec,
            codec_for(reference.table().version()),
        ))
    }

    /// 全组开 / 关力矩（单帧同步写）
    ///
    /// 广播帧无应答，发送成功即更新全组影子标志。
    pub fn sync_torque_enabled(&mut self, enabled: bool) -> Result<(), DriverError> {
        let (bus, spec, codec) = self.reference_spec(Register::TorqueEnable, "group torque")?;
        let value = u8::from(enabled);
        let entries: Vec<SyncWriteEntry> = self
            .servos
            .keys()
            .map(|&id| SyncWriteEntry::new(id, &[value]))
            .collect();
        let request = codec
            .encode_sync_write(spec.address, spec.width, &entries)
            .map_err(DriverError::from)
            .map_err(DriverError::group_write)?;
        bus.broadcast(&request).map_err(DriverError::group_write)?;
        for servo in self.servos.values_mut() {
            servo.set_torque_flag(enabled);
        }
        debug!("group torque {} on {} device(s)", if enabled { "on" } else { "off" }, self.servos.len());
        Ok(())
    }

    /// 全组下发目标位置（单帧同步写）
    ///
    /// `angles` 与成员按 ID 升序一一对应；角度按各成员自己的半圈
    /// 脉冲数换算，同组允许混接不同分辨率的型号。
    ///
    /// # 错误
    /// - `DriverError::GroupSizeMismatch`: 角度数量与成员数不符
    pub fn sync_set_positions(
        &mut self,
        angles: &[f64],
        unit: AngleUnit,
    ) -> Result<(), DriverError> {
        let (bus, spec, codec) =
            self.reference_spec(Register::GoalPosition, "group position write")?;
        if angles.len() != self.servos.len() {
            return Err(DriverError::GroupSizeMismatch {
                members: self.servos.len(),
                values: angles.len(),
            });
        }
        let mut entries = Vec::with_capacity(angles.len());
        let mut pulses = Vec::with_capacity(angles.len());
        for (servo, &angle) in self.servos.values().zip(angles) {
            let pulse = servo.position_pulse(angle, unit);
            let data = encode_register_value(pulse, spec.width);
            entries.push(SyncWriteEntry::new(servo.id(), &data));
            pulses.push(pulse);
        }
        let request = codec
            .encode_sync_write(spec.address, spec.width, &entries)
            .map_err(DriverError::from)
            .map_err(DriverError::group_write)?;
        bus.broadcast(&request).map_err(DriverError::group_write)?;
        for (servo, pulse) in self.servos.values_mut().zip(pulses) {
            servo.record_goal(pulse);
        }
        trace!("group position write to {} device(s)", self.servos.len());
        Ok(())
    }

    /// 全组读当前位置（一问多答的同步读）
    ///
    /// 返回 `(id, 角度)` 对，按 ID 升序。任一成员未在应答窗口内
    /// 回包即整体失败，指出第一个缺席的 ID。
    ///
    /// # 错误
    /// - `DriverError::UnsupportedOnProtocol`: 1.0 无同步读指令
    /// - `DriverError::GroupReadIncomplete`: 有成员未应答
    /// - `DriverError::HardwareFault`: 某成员报硬件错误
    pub fn sync_get_positions(&self, unit: AngleUnit) -> Result<Vec<(u8, f64)>, DriverError> {
        let (bus, spec, codec) =
            self.reference_spec(Register::PresentPosition, "group position read")?;
        let ids = self.ids();
        let request = codec.encode_sync_read(spec.address, spec.width, &ids)?;
        let replies = bus.collect_replies(codec.version(), &request, &ids)?;

        let by_id: BTreeMap<u8, &StatusPacket> =
            replies.iter().map(|s| (s.id, s)).collect();
        let mut positions = Vec::with_capacity(ids.len());
        for (&id, servo) in &self.servos {
            let status = by_id
                .get(&id)
                .ok_or(DriverError::GroupReadIncomplete { id })?;
            if status.has_hardware_error() {
                return Err(DriverError::HardwareFault {
                    id,
                    code: status.error,
                    address: spec.address,
                    description: codec.describe_hardware_error(status.error),
                });
            }
            let raw = decode_register_value(&status.params);
            let pulse = match spec.width {
                2 => i64::from(raw as u16),
                _ => i64::from(raw as i32),
            };
            positions.push((id, servo.pulse_angle(pulse, unit)));
        }
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxl_serial::mock::MockSerialBus;
    use std::time::Duration;

    fn quiet_bus() -> Arc<Bus> {
        Arc::new(
            Bus::from_transport(Box::new(MockSerialBus::new()))
                .with_response_timeout(Duration::from_millis(20)),
        )
    }

    fn servo(bus: &Arc<Bus>, id: u8, version: u8, model: &str) -> Servo {
        Servo::new(Arc::clone(bus), id, version, model).unwrap()
    }

    #[test]
    fn test_membership_in_ascending_id_order() {
        let bus = quiet_bus();
        let mut group = ServoGroup::new();
        group.add_servo(servo(&bus, 15, 2, "XL330")).unwrap();
        group.add_servo(servo(&bus, 1, 2, "XL330")).unwrap();
        group.add_servo(servo(&bus, 12, 2, "XC330")).unwrap();
        assert_eq!(group.ids(), vec![1, 12, 15]);
        assert_eq!(group.len(), 3);
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let bus = quiet_bus();
        let mut group = ServoGroup::new();
        group.add_servo(servo(&bus, 1, 2, "XL330")).unwrap();
        let err = group.add_servo(servo(&bus, 1, 2, "XL430")).unwrap_err();
        assert!(matches!(err, DriverError::DuplicateMember { id: 1 }));
    }

    #[test]
    fn test_remove_returns_handle() {
        let bus = quiet_bus();
        let mut group = ServoGroup::new();
        group.add_servo(servo(&bus, 7, 2, "XL330")).unwrap();
        let back = group.remove_servo(7).unwrap();
        assert_eq!(back.id(), 7);
        assert!(group.is_empty());
        assert!(matches!(
            group.remove_servo(7),
            Err(DriverError::MemberNotFound { id: 7 })
        ));
    }

    #[test]
    fn test_empty_group_rejected() {
        let mut group = ServoGroup::new();
        let err = group.sync_torque_enabled(true).unwrap_err();
        assert!(matches!(err, DriverError::EmptyGroup));
    }

    #[test]
    fn test_mixed_layouts_rejected() {
        let bus = quiet_bus();
        let mut group = ServoGroup::new();
        group.add_servo(servo(&bus, 1, 2, "XL330")).unwrap();
        group.add_servo(servo(&bus, 2, 1, "AX12")).unwrap();
        let err = group.sync_get_positions(AngleUnit::Degrees).unwrap_err();
        assert!(matches!(err, DriverError::InconsistentGroup(_)));
    }

    #[test]
    fn test_mixed_buses_rejected() {
        let bus_a = quiet_bus();
        let bus_b = quiet_bus();
        let mut group = ServoGroup::new();
        group.add_servo(servo(&bus_a, 1, 2, "XL330")).unwrap();
        group.add_servo(servo(&bus_b, 2, 2, "XL330")).unwrap();
        let err = group.sync_get_positions(AngleUnit::Degrees).unwrap_err();
        assert!(matches!(err, DriverError::InconsistentGroup(_)));
    }

    #[test]
    fn test_position_count_mismatch_rejected() {
        let bus = quiet_bus();
        let mut group = ServoGroup::new();
        group.add_servo(servo(&bus, 1, 2, "XL330")).unwrap();
        group.add_servo(servo(&bus, 2, 2, "XL330")).unwrap();
        let err = group
            .sync_set_positions(&[90.0], AngleUnit::Degrees)
            .unwrap_err();
        assert!(matches!(
            err,
            DriverError::GroupSizeMismatch { members: 2, values: 1 }
        ));
    }

    #[test]
    fn test_sync_read_unsupported_on_v1_group() {
        let bus = quiet_bus();
        let mut group = ServoGroup::new();
        group.add_servo(servo(&bus, 1, 1, "AX12")).unwrap();
        group.add_servo(servo(&bus, 2, 1, "AX12")).unwrap();
        // 布局查得到位置寄存器，但 1.0 编码器拒绝同步读指令
        let err = group.sync_get_positions(AngleUnit::Degrees).unwrap_err();
        assert!(matches!(
            err,
            DriverError::Protocol(dxl_protocol::ProtocolError::UnsupportedInstruction(_))
        ));
    }

    #[test]
    fn test_broadcast_failure_wrapped_as_group_write_failed() {
        let bus = quiet_bus();
        let mut group = ServoGroup::new();
        group.add_servo(servo(&bus, 1, 2, "XL330")).unwrap();
        group.add_servo(servo(&bus, 2, 2, "XL330")).unwrap();
        bus.close().unwrap();

        let err = group.sync_torque_enabled(true).unwrap_err();
        match err {
            DriverError::GroupWriteFailed { source } => {
                assert!(matches!(*source, DriverError::Serial(_)));
            }
            other => panic!("expected GroupWriteFailed, got {other:?}"),
        }
        // 失败路径上影子标志保持原值
        assert!(!group.get(1).unwrap().torque_enabled());

        let err = group
            .sync_set_positions(&[90.0, 180.0], AngleUnit::Degrees)
            .unwrap_err();
        assert!(matches!(err, DriverError::GroupWriteFailed { .. }));
    }

    #[test]
    fn test_sync_torque_updates_member_flags() {
        let bus = quiet_bus();
        let mut group = ServoGroup::new();
        group.add_servo(servo(&bus, 1, 2, "XL330")).unwrap();
        group.add_servo(servo(&bus, 2, 2, "XL330")).unwrap();
        group.sync_torque_enabled(true).unwrap();
        assert!(group.get(1).unwrap().torque_enabled());
        assert!(group.get(2).unwrap().torque_enabled());
    }
}
