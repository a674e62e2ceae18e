//! 音频输出模块.
//!
//! 使用 cpal 模拟 DMA 输出通道: 有界队列的深度对应 DMA 描述符数量,
//! 每个队列块至多包含 `dma_frame_num` 个采样帧. 队列满时写入阻塞.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error, info, warn};
use squawk_core::{SampleFormat, SquawkError, SquawkResult};
use squawk_render::{AudioChannel, ChannelConfig, WriteTimeout};

/// 队列轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// 使能期间的流与队列
struct ActiveStream {
    stream: cpal::Stream,
    sender: SyncSender<Vec<f32>>,
    /// 已入队但尚未播放的采样数
    queued: Arc<AtomicUsize>,
}

/// 基于 cpal 的输出通道
#[derive(Default)]
pub struct CpalChannel {
    device: Option<cpal::Device>,
    config: Option<ChannelConfig>,
    active: Option<ActiveStream>,
}

impl CpalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn config(&self) -> SquawkResult<&ChannelConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| SquawkError::InvalidState("音频通道尚未分配".into()))
    }

    /// 每个队列块的最大字节数
    fn chunk_bytes(config: &ChannelConfig) -> usize {
        config.dma_frame_num as usize * config.bytes_per_frame()
    }

    /// 等待队列中的数据播放完毕, 最多等待 `limit`
    fn drain(queued: &AtomicUsize, limit: Duration) {
        let start = Instant::now();
        while queued.load(Ordering::Acquire) > 0 {
            if start.elapsed() > limit {
                warn!(
                    "等待音频队列排空超时, 丢弃 {} 个采样",
                    queued.load(Ordering::Acquire)
                );
                return;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// 将通道格式的字节转换为 f32 采样
fn to_f32(data: &[u8], format: SampleFormat) -> Vec<f32> {
    match format {
        SampleFormat::S16 => data
            .chunks_exact(2)
            .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0)
            .collect(),
        SampleFormat::S32 => data
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0)
            .collect(),
    }
}

impl AudioChannel for CpalChannel {
    fn allocate(&mut self, config: &ChannelConfig) -> SquawkResult<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SquawkError::AllocationFailure("找不到音频输出设备".into()))?;
        info!("音频设备: {:?}", device.name().unwrap_or_default());
        self.device = Some(device);
        self.config = Some(*config);
        Ok(())
    }

    fn apply_format(&mut self, config: &ChannelConfig) -> SquawkResult<()> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| SquawkError::InvalidState("音频通道尚未分配".into()))?;
        let channels = config.channel_mode.channels() as u16;
        let target_rate = cpal::SampleRate(config.sample_rate);
        let supported = device
            .supported_output_configs()
            .map_err(|e| SquawkError::ConfigurationFailure(format!("查询设备配置失败: {e}")))?
            .any(|cfg| {
                cfg.channels() == channels
                    && cfg.min_sample_rate() <= target_rate
                    && cfg.max_sample_rate() >= target_rate
            });
        if !supported {
            return Err(SquawkError::ConfigurationFailure(format!(
                "设备不支持 {}Hz/{}ch",
                config.sample_rate, channels
            )));
        }
        debug!("音频格式: {config}");
        Ok(())
    }

    fn enable(&mut self) -> SquawkResult<()> {
        let config = *self.config()?;
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| SquawkError::InvalidState("音频通道尚未分配".into()))?;
        let stream_config = cpal::StreamConfig {
            channels: config.channel_mode.channels() as u16,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (sender, receiver) = mpsc::sync_channel::<Vec<f32>>(config.dma_desc_num as usize);
        let queued = Arc::new(AtomicUsize::new(0));
        let queued_cb = Arc::clone(&queued);
        let mut pending: Vec<f32> = Vec::new();
        let mut cursor = 0;

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        if cursor >= pending.len() {
                            match receiver.try_recv() {
                                Ok(chunk) => {
                                    pending = chunk;
                                    cursor = 0;
                                }
                                Err(_) => {
                                    *sample = 0.0;
                                    continue;
                                }
                            }
                        }
                        *sample = pending[cursor];
                        cursor += 1;
                        queued_cb.fetch_sub(1, Ordering::AcqRel);
                    }
                },
                move |err| {
                    error!("音频输出错误: {err}");
                },
                None,
            )
            .map_err(|e| SquawkError::ConfigurationFailure(format!("创建音频流失败: {e}")))?;
        stream
            .play()
            .map_err(|e| SquawkError::ConfigurationFailure(format!("启动音频播放失败: {e}")))?;

        self.active = Some(ActiveStream {
            stream,
            sender,
            queued,
        });
        debug!("音频输出已启动");
        Ok(())
    }

    fn write(&mut self, data: &[u8], timeout: WriteTimeout) -> SquawkResult<usize> {
        let config = *self.config()?;
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| SquawkError::InvalidState("音频通道未使能".into()))?;

        let frame = config.bytes_per_frame();
        let len = if data.len() < frame {
            data.len()
        } else {
            let chunk = Self::chunk_bytes(&config).min(data.len());
            chunk - chunk % frame
        };
        let mut samples = to_f32(&data[..len], config.format);
        let count = samples.len();
        active.queued.fetch_add(count, Ordering::AcqRel);

        let closed = || SquawkError::ChannelWriteFailure("音频流已关闭".into());
        match timeout.as_duration() {
            None => {
                if active.sender.send(samples).is_err() {
                    active.queued.fetch_sub(count, Ordering::AcqRel);
                    return Err(closed());
                }
            }
            Some(limit) => {
                let start = Instant::now();
                loop {
                    match active.sender.try_send(samples) {
                        Ok(()) => break,
                        Err(TrySendError::Full(back)) => {
                            if start.elapsed() >= limit {
                                active.queued.fetch_sub(count, Ordering::AcqRel);
                                return Ok(0);
                            }
                            samples = back;
                            thread::sleep(POLL_INTERVAL);
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            active.queued.fetch_sub(count, Ordering::AcqRel);
                            return Err(closed());
                        }
                    }
                }
            }
        }
        Ok(len)
    }

    fn disable(&mut self) -> SquawkResult<()> {
        if let Some(active) = self.active.take() {
            let config = self.config()?;
            // 队列最多容纳 dma_desc_num 块, 留出一块的余量
            let blocks = u64::from(config.dma_desc_num) + 1;
            let frames = blocks * u64::from(config.dma_frame_num);
            let limit = Duration::from_millis(frames * 1000 / u64::from(config.sample_rate) + 100);
            Self::drain(&active.queued, limit);
            active
                .stream
                .pause()
                .map_err(|e| SquawkError::ChannelWriteFailure(format!("停止音频播放失败: {e}")))?;
            debug!("音频输出已停止");
        }
        Ok(())
    }

    fn release(&mut self) {
        self.active = None;
        self.config = None;
        self.device = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_采样转换为浮点() {
        let s16: Vec<u8> = [i16::MIN, 0, 16384].iter().flat_map(|s| s.to_le_bytes()).collect();
        assert_eq!(to_f32(&s16, SampleFormat::S16), vec![-1.0, 0.0, 0.5]);

        let s32: Vec<u8> = [i32::MIN, 1 << 30].iter().flat_map(|s| s.to_le_bytes()).collect();
        assert_eq!(to_f32(&s32, SampleFormat::S32), vec![-1.0, 0.5]);
    }
}
