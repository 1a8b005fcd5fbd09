//! 寄存器表（control table）注册中心
//!
//! 按（协议版本, 型号）查询一张寄存器表；表是数据驱动的静态映射，
//! 不携带任何运行期状态。本 crate 只覆盖驱动需要的寄存器子集
//! （型号号、固件版本、homing offset、扭矩开关、目标/当前位置），
//! 不是完整的厂商寄存器表。
//!
//! 两个布局族：
//!
//! | 寄存器            | Protocol 2.0 X 系列 | Protocol 1.0 AX/MX 族 |
//! |-------------------|---------------------|------------------------|
//! | model_number      | 0 (2B)              | 0 (2B)                 |
//! | firmware_version  | 6 (1B)              | 2 (1B)                 |
//! | homing_offset     | 20 (4B)             | —                      |
//! | torque_enable     | 64 (1B)             | 24 (1B)                |
//! | goal_position     | 116 (4B)            | 30 (2B)                |
//! | present_position  | 132 (4B)            | 36 (2B)                |

use crate::{ProtocolError, ProtocolVersion};

/// 驱动支持的命名寄存器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    ModelNumber,
    FirmwareVersion,
    HomingOffset,
    TorqueEnable,
    GoalPosition,
    PresentPosition,
}

/// 一个寄存器的地址与字节宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSpec {
    pub address: u16,
    pub width: u16,
}

/// 寄存器布局族（同族型号共享一张表）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Protocol 2.0 X 系列（XL330 / XC330 / XL430）
    XSeries,
    /// Protocol 1.0 AX/MX 族（AX12 / MX12）
    AxFamily,
}

impl Layout {
    fn register(self, register: Register) -> Option<RegisterSpec> {
        let (address, width) = match (self, register) {
            (Layout::XSeries, Register::ModelNumber) => (0, 2),
            (Layout::XSeries, Register::FirmwareVersion) => (6, 1),
            (Layout::XSeries, Register::HomingOffset) => (20, 4),
            (Layout::XSeries, Register::TorqueEnable) => (64, 1),
            (Layout::XSeries, Register::GoalPosition) => (116, 4),
            (Layout::XSeries, Register::PresentPosition) => (132, 4),

            (Layout::AxFamily, Register::ModelNumber) => (0, 2),
            (Layout::AxFamily, Register::FirmwareVersion) => (2, 1),
            (Layout::AxFamily, Register::HomingOffset) => return None,
            (Layout::AxFamily, Register::TorqueEnable) => (24, 1),
            (Layout::AxFamily, Register::GoalPosition) => (30, 2),
            (Layout::AxFamily, Register::PresentPosition) => (36, 2),
        };
        Some(RegisterSpec { address, width })
    }
}

/// 注册表条目：(协议版本, 型号名, 布局, 默认中点脉冲数)
///
/// AX12 是 10-bit 位置设备（0..1023），中点 512；其余型号均为
/// 12-bit（0..4095），中点 2048。
const MODELS: [(ProtocolVersion, &str, Layout, f64); 5] = [
    (ProtocolVersion::V1, "AX12", Layout::AxFamily, 512.0),
    (ProtocolVersion::V1, "MX12", Layout::AxFamily, 2048.0),
    (ProtocolVersion::V2, "XL330", Layout::XSeries, 2048.0),
    (ProtocolVersion::V2, "XC330", Layout::XSeries, 2048.0),
    (ProtocolVersion::V2, "XL430", Layout::XSeries, 2048.0),
];

/// 一个型号的已解析寄存器表
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlTable {
    version: ProtocolVersion,
    model: &'static str,
    layout: Layout,
    default_midpoint: f64,
}

impl ControlTable {
    /// 按（协议版本号, 型号名）查表
    ///
    /// 纯函数：同一输入永远返回同一张表。
    ///
    /// # 错误
    /// - `ProtocolError::UnsupportedProtocol`: 版本号不在 {1, 2} 内
    /// - `ProtocolError::UnknownModel`: 该版本下没有此型号
    pub fn lookup(protocol_version: u8, model: &str) -> Result<Self, ProtocolError> {
        let version = ProtocolVersion::from_number(protocol_version)?;
        MODELS
            .iter()
            .find(|(v, name, _, _)| *v == version && *name == model)
            .map(|&(version, model, layout, default_midpoint)| Self {
                version,
                model,
                layout,
                default_midpoint,
            })
            .ok_or_else(|| ProtocolError::UnknownModel {
                version: protocol_version,
                model: model.to_string(),
            })
    }

    /// 协议版本
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// 型号名
    pub fn model(&self) -> &'static str {
        self.model
    }

    /// 该型号的默认校准中点（0° 对应的脉冲数）
    pub fn default_midpoint(&self) -> f64 {
        self.default_midpoint
    }

    /// 查询寄存器的地址与宽度
    ///
    /// 返回 `None` 表示该布局没有此寄存器（目前只有 Protocol 1.0
    /// 布局缺少 homing_offset）。
    pub fn register(&self, register: Register) -> Option<RegisterSpec> {
        self.layout.register(register)
    }

    /// 两张表是否属于同一布局族（组操作的一致性校验用）
    pub fn same_layout(&self, other: &ControlTable) -> bool {
        self.version == other.version && self.layout == other.layout
    }
}
