//! 功放控制信号.
//!
//! 两路离散信号: 功放使能 (SD 引脚) 与增益档位 (GAIN 引脚).
//! 信号状态与解码状态无关, 由 [`crate::sink::SinkHandle`] 在使能与拆除时成对切换.

use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};
use squawk_core::SquawkResult;

/// 控制信号标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// 功放使能
    PowerEnable,
    /// 增益档位
    GainLevel,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PowerEnable => "power_enable",
            Self::GainLevel => "gain_level",
        };
        write!(f, "{name}")
    }
}

/// 功放增益档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainLevel {
    /// 低增益 (3dB), 也是未激活时的默认档位
    #[default]
    Low,
    /// 高增益 (9dB)
    High,
}

impl GainLevel {
    /// 对应的引脚电平
    pub const fn level(&self) -> bool {
        matches!(self, Self::High)
    }

    /// 增益描述
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Low => "3dB",
            Self::High => "9dB",
        }
    }
}

/// 离散信号输出能力 (GPIO 等)
pub trait ControlPins {
    /// 设置信号电平
    fn set(&mut self, signal: Signal, level: bool) -> SquawkResult<()>;
}

impl<P: ControlPins + ?Sized> ControlPins for Box<P> {
    fn set(&mut self, signal: Signal, level: bool) -> SquawkResult<()> {
        (**self).set(signal, level)
    }
}

/// 控制信号对及其当前状态
#[derive(Debug)]
pub struct ControlSignals<P> {
    pins: P,
    power_enable: bool,
    gain: GainLevel,
}

impl<P: ControlPins> ControlSignals<P> {
    /// 包装信号输出, 初始状态为未使能、低增益
    pub fn new(pins: P) -> Self {
        Self {
            pins,
            power_enable: false,
            gain: GainLevel::Low,
        }
    }

    /// 功放是否使能
    pub fn power_enabled(&self) -> bool {
        self.power_enable
    }

    /// 当前增益档位
    pub fn gain(&self) -> GainLevel {
        self.gain
    }

    /// 使能或关闭功放
    pub fn set_power(&mut self, enable: bool) -> SquawkResult<()> {
        self.pins.set(Signal::PowerEnable, enable)?;
        self.power_enable = enable;
        info!("功放{}", if enable { "已使能" } else { "已关闭" });
        Ok(())
    }

    /// 设置增益档位
    pub fn set_gain(&mut self, gain: GainLevel) -> SquawkResult<()> {
        self.pins.set(Signal::GainLevel, gain.level())?;
        self.gain = gain;
        info!("增益设置为 {}", gain.label());
        Ok(())
    }

    /// 访问底层信号输出
    pub fn pins(&self) -> &P {
        &self.pins
    }
}
