//! 虚拟控制引脚.
//!
//! 桌面环境没有 GPIO, 电平变化只记录到日志.

use log::debug;
use squawk_core::SquawkResult;
use squawk_render::{ControlPins, Signal};

/// 记录电平变化的虚拟引脚
#[derive(Debug)]
pub struct VirtualPins {
    /// 功放使能引脚号
    power_pin: u32,
    /// 增益引脚号
    gain_pin: u32,
    /// 当前电平 (power, gain)
    levels: (bool, bool),
}

impl VirtualPins {
    pub fn new(power_pin: u32, gain_pin: u32) -> Self {
        Self {
            power_pin,
            gain_pin,
            levels: (false, false),
        }
    }
}

impl ControlPins for VirtualPins {
    fn set(&mut self, signal: Signal, level: bool) -> SquawkResult<()> {
        let (pin, current) = match signal {
            Signal::PowerEnable => (self.power_pin, &mut self.levels.0),
            Signal::GainLevel => (self.gain_pin, &mut self.levels.1),
        };
        if *current != level {
            debug!("GPIO{pin} ({signal}): {} -> {}", u8::from(*current), u8::from(level));
        }
        *current = level;
        Ok(())
    }
}
