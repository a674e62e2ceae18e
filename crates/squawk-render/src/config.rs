//! 播放配置.
//!
//! 所有字段都有默认值, 可从 TOML 文本加载并逐项覆盖:
//!
//! ```toml
//! volume = 0.8
//! gain = "high"
//!
//! [engine]
//! deadline_ms = 10000
//!
//! [sink]
//! sample_rate = 16000
//! channel_mode = "mono"
//! write_timeout = { millis = 500 }
//!
//! [decoder]
//! type = "pcm"
//! sample_rate = 16000
//! channels = 1
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use squawk_codec::DecoderConfig;
use squawk_core::{SampleFormat, SquawkError, SquawkResult};

use crate::signal::GainLevel;
use crate::sink::{ChannelConfig, ChannelMode, SlotMask, WriteTimeout};

/// 音量上限 (线性倍数)
pub const MAX_VOLUME: f32 = 4.0;

/// 解码引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 每次从数据源读取的字节数
    pub read_size: usize,
    /// 输出缓冲区初始容量
    pub initial_out_size: usize,
    /// 输出缓冲区容量上限
    pub max_out_size: usize,
    /// 会话解码时长上限 (毫秒)
    pub deadline_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_size: 512,
            initial_out_size: 4096,
            max_out_size: 1 << 20,
            deadline_ms: 30_000,
        }
    }
}

impl EngineConfig {
    /// 会话解码时长上限
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// 检查参数范围
    pub fn validate(&self) -> SquawkResult<()> {
        if self.read_size == 0 || self.initial_out_size == 0 {
            return Err(SquawkError::InvalidArgument(
                "读取块大小与输出缓冲区初始容量必须大于 0".into(),
            ));
        }
        if self.max_out_size < self.initial_out_size {
            return Err(SquawkError::InvalidArgument(format!(
                "输出缓冲区上限 {} 小于初始容量 {}",
                self.max_out_size, self.initial_out_size
            )));
        }
        if self.deadline_ms == 0 {
            return Err(SquawkError::InvalidArgument("解码时长上限必须大于 0".into()));
        }
        Ok(())
    }
}

/// 输出通道配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// 物理通道编号
    pub port: u8,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 通道数据位宽 (16 或 32)
    pub bit_width: u32,
    /// 声道模式
    pub channel_mode: ChannelMode,
    /// 单声道时使用的槽位
    pub slot_mask: SlotMask,
    /// DMA 描述符数量
    pub dma_desc_num: u32,
    /// 每个 DMA 描述符的采样帧数
    pub dma_frame_num: u32,
    /// 阻塞写入超时
    pub write_timeout: WriteTimeout,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            port: 0,
            sample_rate: 44100,
            bit_width: 16,
            channel_mode: ChannelMode::Mono,
            slot_mask: SlotMask::Left,
            dma_desc_num: 4,
            dma_frame_num: 512,
            write_timeout: WriteTimeout::Infinite,
        }
    }
}

impl SinkConfig {
    /// 转换为通道配置
    pub fn channel_config(&self) -> SquawkResult<ChannelConfig> {
        let format = SampleFormat::from_bits(self.bit_width).ok_or_else(|| {
            SquawkError::InvalidArgument(format!("不支持的通道位宽: {}", self.bit_width))
        })?;
        if self.sample_rate == 0 {
            return Err(SquawkError::InvalidArgument("通道采样率必须大于 0".into()));
        }
        if self.dma_desc_num == 0 || self.dma_frame_num == 0 {
            return Err(SquawkError::InvalidArgument("DMA 参数必须大于 0".into()));
        }
        Ok(ChannelConfig {
            port: self.port,
            sample_rate: self.sample_rate,
            format,
            channel_mode: self.channel_mode,
            slot_mask: self.slot_mask,
            dma_desc_num: self.dma_desc_num,
            dma_frame_num: self.dma_frame_num,
        })
    }
}

/// 播放配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// 软件音量 (线性, 1.0 = 不变, 大于 1.0 为增益并限幅)
    pub volume: f32,
    /// 功放默认增益档位
    pub gain: GainLevel,
    /// 解码引擎配置
    pub engine: EngineConfig,
    /// 输出通道配置
    pub sink: SinkConfig,
    /// 解码器配置
    pub decoder: DecoderConfig,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            gain: GainLevel::Low,
            engine: EngineConfig::default(),
            sink: SinkConfig::default(),
            decoder: DecoderConfig::Mp3,
        }
    }
}

impl PlaybackConfig {
    /// 从 TOML 文本加载并校验
    pub fn from_toml_str(text: &str) -> SquawkResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| SquawkError::Config(format!("解析配置失败: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 序列化为 TOML 文本
    pub fn to_toml_string(&self) -> SquawkResult<String> {
        toml::to_string(self).map_err(|e| SquawkError::Config(format!("序列化配置失败: {e}")))
    }

    /// 检查所有参数范围
    pub fn validate(&self) -> SquawkResult<()> {
        self.engine.validate()?;
        self.sink.channel_config()?;
        self.decoder.validate()?;
        if !self.volume.is_finite() || !(0.0..=MAX_VOLUME).contains(&self.volume) {
            return Err(SquawkError::InvalidArgument(format!(
                "音量 {} 超出范围 [0, {MAX_VOLUME}]",
                self.volume
            )));
        }
        Ok(())
    }
}
