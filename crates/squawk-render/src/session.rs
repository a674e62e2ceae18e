//! 单次播放会话.
//!
//! 配置输出通道 → 打开解码器 → 运行解码引擎 → 拆除输出通道.
//! 无论会话以何种方式结束, 输出通道都会被拆除, 功放信号回到关闭状态.

use std::fmt;

use log::{error, info, warn};
use squawk_codec::{DecoderRegistry, SimpleDecoder};
use squawk_core::{SquawkError, SquawkResult, StreamInfo};

use crate::config::PlaybackConfig;
use crate::engine::{DecodeEngine, DecodeStats, PcmConsumer};
use crate::post::{PostProcessor, scale_volume_s16};
use crate::signal::ControlPins;
use crate::sink::{AudioChannel, SinkHandle, SinkState};
use crate::source::SourceReader;

/// 软件音量路径: 原地缩放解码输出, 不写入硬件
#[derive(Debug, Clone, Copy)]
pub struct SoftwareVolume {
    volume: f32,
}

impl SoftwareVolume {
    /// 创建
    pub fn new(volume: f32) -> Self {
        Self { volume }
    }
}

impl PcmConsumer for SoftwareVolume {
    fn consume(&mut self, pcm: &mut [u8], _info: &StreamInfo) -> SquawkResult<usize> {
        scale_volume_s16(pcm, self.volume);
        Ok(pcm.len())
    }
}

/// 硬件输出路径: 首次写入前使能通道, 转换后阻塞写入
pub struct HardwareRenderer<'s, C: AudioChannel, P: ControlPins> {
    sink: &'s mut SinkHandle<C, P>,
    post: PostProcessor,
}

impl<'s, C: AudioChannel, P: ControlPins> HardwareRenderer<'s, C, P> {
    /// 包装已配置的输出通道
    pub fn new(sink: &'s mut SinkHandle<C, P>, post: PostProcessor) -> Self {
        Self { sink, post }
    }
}

impl<C: AudioChannel, P: ControlPins> PcmConsumer for HardwareRenderer<'_, C, P> {
    fn consume(&mut self, pcm: &mut [u8], info: &StreamInfo) -> SquawkResult<usize> {
        if self.sink.state() != SinkState::Enabled {
            self.sink.enable()?;
        }
        self.post.render(pcm, info, &mut *self.sink)
    }
}

/// 会话结束方式
#[derive(Debug)]
pub enum SessionOutcome {
    /// 输入全部消耗
    Completed,
    /// 超时看门狗提前结束
    DeadlineReached,
    /// 流传输中出错
    Failed(SquawkError),
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "播放完成"),
            Self::DeadlineReached => write!(f, "超时结束"),
            Self::Failed(e) => write!(f, "播放失败: {e}"),
        }
    }
}

/// 会话报告
#[derive(Debug)]
pub struct SessionReport {
    /// 解码统计
    pub stats: DecodeStats,
    /// 流信息 (未解码任何数据时为 `None`)
    pub info: Option<StreamInfo>,
    /// 结束方式
    pub outcome: SessionOutcome,
}

impl SessionReport {
    /// 会话是否未出错 (超时结束也视为成功)
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, SessionOutcome::Failed(_))
    }

    /// 解码占用的 CPU 百分比
    pub fn cpu_usage_percent(&self) -> Option<f64> {
        self.info
            .as_ref()
            .and_then(|info| self.stats.cpu_usage_percent(info))
    }

    /// 解码得到的音频时长 (秒)
    pub fn audio_secs(&self) -> f64 {
        self.info
            .map_or(0.0, |info| info.duration_secs(self.stats.total_decoded))
    }

    /// 转换为 `Result`, 失败时取出错误
    pub fn into_result(self) -> SquawkResult<DecodeStats> {
        match self.outcome {
            SessionOutcome::Failed(e) => Err(e),
            _ => Ok(self.stats),
        }
    }

    fn log_summary(&self) {
        match self.cpu_usage_percent() {
            Some(cpu) => info!(
                "{}: 解码 {} 字节 ({:.2}s 音频), 解码耗时 {:?}, cpu: {cpu:.2}%",
                self.outcome,
                self.stats.total_decoded,
                self.audio_secs(),
                self.stats.decode_time
            ),
            None => info!("{}: 未解码任何数据", self.outcome),
        }
    }
}

/// 播放会话
pub struct PlaybackSession {
    config: PlaybackConfig,
    registry: DecoderRegistry,
}

impl PlaybackSession {
    /// 使用内置解码器创建
    pub fn new(config: PlaybackConfig) -> SquawkResult<Self> {
        Self::with_registry(config, DecoderRegistry::with_defaults())
    }

    /// 使用指定的解码器注册表创建
    pub fn with_registry(config: PlaybackConfig, registry: DecoderRegistry) -> SquawkResult<Self> {
        config.validate()?;
        Ok(Self { config, registry })
    }

    /// 播放配置
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// 解码器注册表
    pub fn registry_mut(&mut self) -> &mut DecoderRegistry {
        &mut self.registry
    }

    /// 播放资源到输出通道
    ///
    /// 通道配置与解码器打开失败时直接返回错误, 不使能功放;
    /// 流传输中的错误通过 [`SessionReport::outcome`] 报告.
    pub fn run<C: AudioChannel, P: ControlPins>(
        &self,
        asset: &[u8],
        sink: &mut SinkHandle<C, P>,
    ) -> SquawkResult<SessionReport> {
        self.configure_sink(sink)?;
        let mut decoder = match self.registry.open(&self.config.decoder) {
            Ok(decoder) => decoder,
            Err(e) => {
                error!("打开解码器失败: {e}");
                teardown(sink);
                return Err(e);
            }
        };
        self.stream(asset, decoder.as_mut(), sink)
    }

    /// 使用调用方提供的解码器播放
    pub fn run_with_decoder<C, P, D>(
        &self,
        asset: &[u8],
        decoder: &mut D,
        sink: &mut SinkHandle<C, P>,
    ) -> SquawkResult<SessionReport>
    where
        C: AudioChannel,
        P: ControlPins,
        D: SimpleDecoder + ?Sized,
    {
        self.configure_sink(sink)?;
        self.stream(asset, decoder, sink)
    }

    /// 软件音量路径: 解码并原地缩放, 不使用输出通道
    pub fn run_software(&self, asset: &[u8]) -> SquawkResult<SessionReport> {
        let mut decoder = self.registry.open(&self.config.decoder)?;
        let mut consumer = SoftwareVolume::new(self.config.volume);
        self.decode(asset, decoder.as_mut(), &mut consumer)
    }

    /// 解码资源, 每帧输出交给 `consumer`
    pub fn decode<D, K>(
        &self,
        asset: &[u8],
        decoder: &mut D,
        consumer: &mut K,
    ) -> SquawkResult<SessionReport>
    where
        D: SimpleDecoder + ?Sized,
        K: PcmConsumer + ?Sized,
    {
        info!("会话开始: 资源 {} 字节, 解码器 {}", asset.len(), decoder.name());
        let mut engine = DecodeEngine::new(self.config.engine.clone())?;
        let result = engine.run(&mut SourceReader::new(asset), decoder, consumer);
        decoder.close();

        let report = make_report(&engine, result);
        report.log_summary();
        Ok(report)
    }

    fn configure_sink<C: AudioChannel, P: ControlPins>(
        &self,
        sink: &mut SinkHandle<C, P>,
    ) -> SquawkResult<()> {
        let channel = self.config.sink.channel_config()?;
        sink.set_default_gain(self.config.gain);
        sink.set_write_timeout(self.config.sink.write_timeout);
        sink.configure(&channel)
    }

    fn stream<C, P, D>(
        &self,
        asset: &[u8],
        decoder: &mut D,
        sink: &mut SinkHandle<C, P>,
    ) -> SquawkResult<SessionReport>
    where
        C: AudioChannel,
        P: ControlPins,
        D: SimpleDecoder + ?Sized,
    {
        let channel = match sink.config() {
            Some(channel) => *channel,
            None => {
                return Err(SquawkError::InvalidState("输出通道尚未配置".into()));
            }
        };
        let post = PostProcessor::new(self.config.volume, &channel);
        let report = {
            let mut renderer = HardwareRenderer::new(sink, post);
            self.decode(asset, decoder, &mut renderer)
        };
        teardown(sink);
        report
    }
}

/// 拆除输出通道, 错误只记录日志
fn teardown<C: AudioChannel, P: ControlPins>(sink: &mut SinkHandle<C, P>) {
    if let Err(e) = sink.disable() {
        warn!("拆除输出通道失败: {e}");
    }
}

fn make_report(engine: &DecodeEngine, result: SquawkResult<()>) -> SessionReport {
    let stats = engine.stats().clone();
    let outcome = match result {
        Ok(()) if stats.deadline_hit => SessionOutcome::DeadlineReached,
        Ok(()) => SessionOutcome::Completed,
        Err(e) => {
            // 流传输错误已在发生处记录
            if !e.is_streaming_error() {
                error!("会话中止: {e}");
            }
            SessionOutcome::Failed(e)
        }
    };
    SessionReport {
        stats,
        info: engine.info(),
        outcome,
    }
}
