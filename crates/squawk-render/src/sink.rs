//! 输出通道生命周期管理.
//!
//! 状态机: Unconfigured → Configuring → Configured → Enabled → Disabling → Disabled.
//! Disabled 可以重新配置, 开始新的会话.
//!
//! 同一物理通道同一时刻只允许存在一个 [`SinkHandle`], 由 [`SinkHandle::acquire`]
//! 在进程内登记占用, 句柄释放时解除.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use squawk_core::{SampleFormat, SquawkError, SquawkResult};

use crate::signal::{ControlPins, ControlSignals, GainLevel};

/// 可登记的物理通道数量
pub const MAX_PORTS: u8 = 32;

/// 已占用的物理通道 (按位)
static CLAIMED_PORTS: AtomicU32 = AtomicU32::new(0);

/// 声道模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// 单声道
    #[default]
    Mono,
    /// 立体声
    Stereo,
}

impl ChannelMode {
    /// 声道数
    pub const fn channels(&self) -> u32 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// 单声道数据使用的槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotMask {
    /// 左声道槽位
    #[default]
    Left,
    /// 右声道槽位
    Right,
    /// 双槽位
    Both,
}

/// 阻塞写入超时
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteTimeout {
    /// 一直等待直到通道接收数据
    #[default]
    Infinite,
    /// 最长等待的毫秒数
    Millis(u64),
}

impl WriteTimeout {
    /// 超时时长, 无限等待返回 `None`
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Infinite => None,
            Self::Millis(ms) => Some(Duration::from_millis(*ms)),
        }
    }
}

impl fmt::Display for WriteTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => write!(f, "无限等待"),
            Self::Millis(ms) => write!(f, "{ms}ms"),
        }
    }
}

/// 通道格式与分配参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// 物理通道编号
    pub port: u8,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 通道采样格式 (位宽)
    pub format: SampleFormat,
    /// 声道模式
    pub channel_mode: ChannelMode,
    /// 单声道槽位
    pub slot_mask: SlotMask,
    /// DMA 描述符数量
    pub dma_desc_num: u32,
    /// 每个 DMA 描述符的采样帧数
    pub dma_frame_num: u32,
}

impl ChannelConfig {
    /// 一个采样帧在通道上的字节数
    pub const fn bytes_per_frame(&self) -> usize {
        self.format.bytes_per_sample() * self.channel_mode.channels() as usize
    }
}

impl fmt::Display for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "port {}: {}Hz/{}/{}ch, dma {}x{}",
            self.port,
            self.sample_rate,
            self.format,
            self.channel_mode.channels(),
            self.dma_desc_num,
            self.dma_frame_num
        )
    }
}

/// 硬件输出通道能力
pub trait AudioChannel {
    /// 分配物理通道
    fn allocate(&mut self, config: &ChannelConfig) -> SquawkResult<()>;

    /// 应用格式参数 (时钟、槽位、引脚)
    fn apply_format(&mut self, config: &ChannelConfig) -> SquawkResult<()>;

    /// 开始传输
    fn enable(&mut self) -> SquawkResult<()>;

    /// 阻塞写入, 返回通道实际接收的字节数
    ///
    /// 超时内未接收任何数据时返回 `Ok(0)`.
    fn write(&mut self, data: &[u8], timeout: WriteTimeout) -> SquawkResult<usize>;

    /// 停止传输
    fn disable(&mut self) -> SquawkResult<()>;

    /// 释放物理通道
    fn release(&mut self);
}

impl<C: AudioChannel + ?Sized> AudioChannel for Box<C> {
    fn allocate(&mut self, config: &ChannelConfig) -> SquawkResult<()> {
        (**self).allocate(config)
    }

    fn apply_format(&mut self, config: &ChannelConfig) -> SquawkResult<()> {
        (**self).apply_format(config)
    }

    fn enable(&mut self) -> SquawkResult<()> {
        (**self).enable()
    }

    fn write(&mut self, data: &[u8], timeout: WriteTimeout) -> SquawkResult<usize> {
        (**self).write(data, timeout)
    }

    fn disable(&mut self) -> SquawkResult<()> {
        (**self).disable()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// 输出通道生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkState {
    /// 未配置
    Unconfigured,
    /// 配置中
    Configuring,
    /// 已配置, 尚未开始传输
    Configured,
    /// 传输中, 功放已使能
    Enabled,
    /// 拆除中
    Disabling,
    /// 已拆除, 可重新配置
    Disabled,
}

/// 独占的输出通道句柄
pub struct SinkHandle<C: AudioChannel, P: ControlPins> {
    /// 物理通道编号
    port: u8,
    /// 硬件通道
    channel: C,
    /// 功放控制信号
    signals: ControlSignals<P>,
    /// 生命周期状态
    state: SinkState,
    /// 当前生效的通道配置
    config: Option<ChannelConfig>,
    /// 使能时设置的增益档位
    default_gain: GainLevel,
    /// 写入超时
    write_timeout: WriteTimeout,
    /// 当前会话累计写入字节数
    bytes_written: u64,
}

impl<C: AudioChannel, P: ControlPins> SinkHandle<C, P> {
    /// 登记并获取物理通道句柄
    ///
    /// 同一通道已有句柄存在时返回 `InvalidState`.
    pub fn acquire(port: u8, channel: C, pins: P) -> SquawkResult<Self> {
        if port >= MAX_PORTS {
            return Err(SquawkError::InvalidArgument(format!(
                "通道编号 {port} 超出范围 [0, {MAX_PORTS})"
            )));
        }
        let bit = 1u32 << port;
        if CLAIMED_PORTS.fetch_or(bit, Ordering::AcqRel) & bit != 0 {
            return Err(SquawkError::InvalidState(format!("通道 {port} 已被占用")));
        }
        debug!("获取输出通道 {port}");
        Ok(Self {
            port,
            channel,
            signals: ControlSignals::new(pins),
            state: SinkState::Unconfigured,
            config: None,
            default_gain: GainLevel::Low,
            write_timeout: WriteTimeout::Infinite,
            bytes_written: 0,
        })
    }

    /// 物理通道编号
    pub fn port(&self) -> u8 {
        self.port
    }

    /// 当前状态
    pub fn state(&self) -> SinkState {
        self.state
    }

    /// 当前生效的通道配置
    pub fn config(&self) -> Option<&ChannelConfig> {
        self.config.as_ref()
    }

    /// 控制信号状态
    pub fn signals(&self) -> &ControlSignals<P> {
        &self.signals
    }

    /// 底层硬件通道
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// 当前会话累计写入字节数
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// 设置使能时的增益档位
    pub fn set_default_gain(&mut self, gain: GainLevel) {
        self.default_gain = gain;
    }

    /// 设置写入超时
    pub fn set_write_timeout(&mut self, timeout: WriteTimeout) {
        self.write_timeout = timeout;
    }

    /// 分配通道并应用格式参数
    ///
    /// 任一步骤失败都会回滚到 Unconfigured, 不保留部分配置.
    pub fn configure(&mut self, config: &ChannelConfig) -> SquawkResult<()> {
        if !matches!(self.state, SinkState::Unconfigured | SinkState::Disabled) {
            return Err(SquawkError::InvalidState(format!(
                "通道处于 {:?} 状态, 不能重新配置",
                self.state
            )));
        }
        if config.port != self.port {
            return Err(SquawkError::InvalidArgument(format!(
                "配置的通道编号 {} 与句柄 {} 不符",
                config.port, self.port
            )));
        }

        self.state = SinkState::Configuring;
        if let Err(e) = self.channel.allocate(config) {
            error!("创建输出通道失败: {e}");
            self.state = SinkState::Unconfigured;
            return Err(e);
        }
        if let Err(e) = self.channel.apply_format(config) {
            error!("初始化输出通道失败: {e}");
            self.channel.release();
            self.state = SinkState::Unconfigured;
            return Err(e);
        }

        self.config = Some(*config);
        self.bytes_written = 0;
        self.state = SinkState::Configured;
        info!("输出通道配置完成: {config}");
        Ok(())
    }

    /// 开始传输并使能功放
    ///
    /// 已处于 Enabled 时为空操作.
    pub fn enable(&mut self) -> SquawkResult<()> {
        match self.state {
            SinkState::Enabled => return Ok(()),
            SinkState::Configured => {}
            other => {
                return Err(SquawkError::InvalidState(format!(
                    "通道处于 {other:?} 状态, 不能使能"
                )));
            }
        }

        if let Err(e) = self.channel.enable() {
            error!("使能输出通道失败: {e}");
            return Err(e);
        }
        self.state = SinkState::Enabled;

        let asserted = self
            .signals
            .set_power(true)
            .and_then(|()| self.signals.set_gain(self.default_gain));
        if let Err(e) = asserted {
            error!("控制信号设置失败: {e}");
            if let Err(rollback) = self.disable() {
                warn!("回滚输出通道失败: {rollback}");
            }
            return Err(e);
        }
        Ok(())
    }

    /// 切换功放增益 (仅在传输中有效)
    pub fn set_gain(&mut self, gain: GainLevel) -> SquawkResult<()> {
        if self.state != SinkState::Enabled {
            return Err(SquawkError::InvalidState(format!(
                "通道处于 {:?} 状态, 不能切换增益",
                self.state
            )));
        }
        self.signals.set_gain(gain)
    }

    /// 阻塞写入全部数据
    ///
    /// 通道分多次接收时循环写入剩余部分; 超时内未接收任何数据视为写入失败.
    pub fn write(&mut self, data: &[u8]) -> SquawkResult<usize> {
        if self.state != SinkState::Enabled {
            return Err(SquawkError::InvalidState(format!(
                "通道处于 {:?} 状态, 不能写入",
                self.state
            )));
        }
        let mut offset = 0;
        while offset < data.len() {
            let n = self.channel.write(&data[offset..], self.write_timeout)?;
            if n == 0 {
                return Err(SquawkError::ChannelWriteFailure(format!(
                    "写入超时 ({}), 剩余 {} 字节",
                    self.write_timeout,
                    data.len() - offset
                )));
            }
            offset += n.min(data.len() - offset);
        }
        self.bytes_written += data.len() as u64;
        Ok(data.len())
    }

    /// 拆除通道: 关闭功放、停止传输、恢复低增益并释放通道
    ///
    /// 对未配置或已拆除的通道为空操作. 各步骤都会执行, 返回遇到的第一个错误.
    pub fn disable(&mut self) -> SquawkResult<()> {
        let was_enabled = match self.state {
            SinkState::Unconfigured | SinkState::Disabled => return Ok(()),
            SinkState::Enabled => true,
            _ => false,
        };
        self.state = SinkState::Disabling;

        let mut first_err = None;
        if let Err(e) = self.signals.set_power(false) {
            first_err.get_or_insert(e);
        }
        if was_enabled {
            if let Err(e) = self.channel.disable() {
                first_err.get_or_insert(e);
            }
        }
        if let Err(e) = self.signals.set_gain(GainLevel::Low) {
            first_err.get_or_insert(e);
        }
        self.channel.release();

        self.config = None;
        self.state = SinkState::Disabled;
        info!("输出通道已释放, 本次写入 {} 字节", self.bytes_written);
        match first_err {
            Some(e) => {
                error!("拆除输出通道时出错: {e}");
                Err(e)
            }
            None => Ok(()),
        }
    }
}

impl<C: AudioChannel, P: ControlPins> Drop for SinkHandle<C, P> {
    fn drop(&mut self) {
        if let Err(e) = self.disable() {
            warn!("释放输出通道 {} 失败: {e}", self.port);
        }
        CLAIMED_PORTS.fetch_and(!(1u32 << self.port), Ordering::AcqRel);
    }
}

impl<C: AudioChannel, P: ControlPins> fmt::Debug for SinkHandle<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkHandle")
            .field("port", &self.port)
            .field("state", &self.state)
            .field("config", &self.config)
            .field("power_enable", &self.signals.power_enabled())
            .field("gain", &self.signals.gain())
            .finish()
    }
}
