//! 角度 ↔ 脉冲转换
//!
//! 设备寄存器里的位置是定点脉冲数；工程单位（度 / 弧度）到脉冲的
//! 换算以"中点"为基准：中点脉冲数对应半圈（180° / π rad）。
//!
//! 单位由调用方显式指定（[`AngleUnit`]），转换两侧必须使用同一个
//! 单位标志——度和弧度混用不会被自动识别。

/// 角度单位标志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleUnit {
    Degrees,
    Radians,
}

impl AngleUnit {
    /// 半圈在该单位下的数值（180° 或 π rad）
    pub fn half_turn(self) -> f64 {
        match self {
            AngleUnit::Degrees => 180.0,
            AngleUnit::Radians => std::f64::consts::PI,
        }
    }

    /// 四分之一圈（homing offset 的允许上限）
    pub fn quarter_turn(self) -> f64 {
        self.half_turn() / 2.0
    }

    /// 单位符号（诊断信息用）
    pub fn symbol(self) -> &'static str {
        match self {
            AngleUnit::Degrees => "deg",
            AngleUnit::Radians => "rad",
        }
    }
}

/// 角度转脉冲：`pulse = round(midpoint · angle / half_turn)`
pub fn angle_to_pulse(angle: f64, unit: AngleUnit, midpoint: f64) -> i64 {
    (midpoint * angle / unit.half_turn()).round() as i64
}

/// 脉冲转角度：`angle = half_turn · pulse / midpoint`
pub fn pulse_to_angle(pulse: i64, unit: AngleUnit, midpoint: f64) -> f64 {
    unit.half_turn() * pulse as f64 / midpoint
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_turn_maps_to_midpoint() {
        assert_eq!(angle_to_pulse(180.0, AngleUnit::Degrees, 2048.0), 2048);
        assert_eq!(
            angle_to_pulse(std::f64::consts::PI, AngleUnit::Radians, 2048.0),
            2048
        );
        assert_eq!(angle_to_pulse(180.0, AngleUnit::Degrees, 512.0), 512);
    }

    #[test]
    fn test_pulse_to_angle_inverse() {
        let angle = pulse_to_angle(1024, AngleUnit::Degrees, 2048.0);
        assert!((angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_offsets() {
        assert_eq!(angle_to_pulse(-90.0, AngleUnit::Degrees, 2048.0), -1024);
        assert!((pulse_to_angle(-1024, AngleUnit::Degrees, 2048.0) + 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_units_are_not_interchangeable() {
        // 同一个物理角度，单位标志不同则脉冲必须不同（不存在自动识别）
        let deg = angle_to_pulse(90.0, AngleUnit::Degrees, 2048.0);
        let rad_as_deg = angle_to_pulse(std::f64::consts::FRAC_PI_2, AngleUnit::Degrees, 2048.0);
        assert_ne!(deg, rad_as_deg);
        // 配对使用时两个单位给出同一脉冲
        let rad = angle_to_pulse(std::f64::consts::FRAC_PI_2, AngleUnit::Radians, 2048.0);
        assert_eq!(deg, rad);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// 整数脉冲经 角度→脉冲→角度 往返后不变
            #[test]
            fn pulse_roundtrip_exact(pulse in -4096i64..=4096) {
                for unit in [AngleUnit::Degrees, AngleUnit::Radians] {
                    let angle = pulse_to_angle(pulse, unit, 2048.0);
                    prop_assert_eq!(angle_to_pulse(angle, unit, 2048.0), pulse);
                }
            }

            /// 任意角度往返误差不超过一个脉冲的角分辨率
            #[test]
            fn angle_roundtrip_within_resolution(angle in -90.0f64..=90.0,
                                                 midpoint in prop::sample::select(vec![512.0, 2048.0])) {
                for unit in [AngleUnit::Degrees, AngleUnit::Radians] {
                    let scaled = angle * unit.half_turn() / 180.0;
                    let pulse = angle_to_pulse(scaled, unit, midpoint);
                    let back = pulse_to_angle(pulse, unit, midpoint);
                    let resolution = unit.half_turn() / midpoint;
                    prop_assert!((back - scaled).abs() <= resolution,
                        "angle {} {} roundtrips to {} (resolution {})",
                        scaled, unit.symbol(), back, resolution);
                }
            }
        }
    }
}
