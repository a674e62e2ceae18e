//! PCM 后处理: 音量缩放、声道转换、位宽扩展.
//!
//! 输入为解码器输出的交错 S16LE 数据.

use log::error;
use squawk_core::{SampleFormat, SquawkError, SquawkResult, StreamInfo};

use crate::signal::ControlPins;
use crate::sink::{AudioChannel, ChannelConfig, SinkHandle};

/// 原地缩放 S16LE 采样
///
/// 结果向零截断并限幅到 [-32768, 32767]. 末尾不足一个采样的字节保持不变.
pub fn scale_volume_s16(pcm: &mut [u8], volume: f32) {
    if volume == 1.0 {
        return;
    }
    for sample in pcm.chunks_exact_mut(2) {
        let value = i16::from_le_bytes([sample[0], sample[1]]);
        let scaled = (f32::from(value) * volume) as i32;
        let clamped = scaled.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        sample.copy_from_slice(&clamped.to_le_bytes());
    }
}

/// 将 S16LE 采样左对齐扩展为 S32LE, 写入 `dst`
///
/// `dst` 被清空后重新填充, 源数据不变. 返回写入的字节数.
pub fn widen_s16_to_s32(src: &[u8], dst: &mut Vec<u8>) -> usize {
    dst.clear();
    dst.reserve(src.len() / 2 * 4);
    for sample in src.chunks_exact(2) {
        let value = i32::from(i16::from_le_bytes([sample[0], sample[1]])) << 16;
        dst.extend_from_slice(&value.to_le_bytes());
    }
    dst.len()
}

/// 读取一个采样点为 i32
fn read_sample(data: &[u8], format: SampleFormat) -> i32 {
    match format {
        SampleFormat::S16 => i32::from(i16::from_le_bytes([data[0], data[1]])),
        SampleFormat::S32 => i32::from_le_bytes([data[0], data[1], data[2], data[3]]),
    }
}

/// 写入一个采样点
fn write_sample(dst: &mut Vec<u8>, value: i32, format: SampleFormat) {
    match format {
        SampleFormat::S16 => dst.extend_from_slice(&(value as i16).to_le_bytes()),
        SampleFormat::S32 => dst.extend_from_slice(&value.to_le_bytes()),
    }
}

/// 声道数转换, 结果写入 `dst`
///
/// - 单声道 → 多声道: 复制到所有声道
/// - 多声道 → 单声道: 所有声道取平均
/// - 其他情况: 保留前 `dst_channels` 个声道, 多出的声道补零
pub fn convert_channels(
    src: &[u8],
    format: SampleFormat,
    src_channels: usize,
    dst_channels: usize,
    dst: &mut Vec<u8>,
) -> SquawkResult<()> {
    if src_channels == 0 || dst_channels == 0 {
        return Err(SquawkError::InvalidArgument("声道数必须大于 0".into()));
    }
    dst.clear();
    if src_channels == dst_channels {
        dst.extend_from_slice(src);
        return Ok(());
    }

    let bps = format.bytes_per_sample();
    let src_frame_size = src_channels * bps;
    let nb_samples = src.len() / src_frame_size;
    dst.reserve(nb_samples * dst_channels * bps);

    for frame in src.chunks_exact(src_frame_size) {
        if src_channels == 1 {
            let value = read_sample(frame, format);
            for _ in 0..dst_channels {
                write_sample(dst, value, format);
            }
        } else if dst_channels == 1 {
            let sum: i64 = frame
                .chunks_exact(bps)
                .map(|s| i64::from(read_sample(s, format)))
                .sum();
            write_sample(dst, (sum / src_channels as i64) as i32, format);
        } else {
            for ch in 0..dst_channels {
                let value = if ch < src_channels {
                    read_sample(&frame[ch * bps..], format)
                } else {
                    0
                };
                write_sample(dst, value, format);
            }
        }
    }
    Ok(())
}

/// 硬件输出路径的后处理器
///
/// 转换结果写入自有缓冲区, 不修改解码器输出.
#[derive(Debug)]
pub struct PostProcessor {
    /// 线性音量
    volume: f32,
    /// 输出通道格式
    target_format: SampleFormat,
    /// 输出通道声道数
    target_channels: u32,
    /// 声道转换与音量缩放缓冲
    scaled: Vec<u8>,
    /// 位宽扩展缓冲
    wire: Vec<u8>,
}

impl PostProcessor {
    /// 按输出通道配置创建
    pub fn new(volume: f32, target: &ChannelConfig) -> Self {
        Self {
            volume,
            target_format: target.format,
            target_channels: target.channel_mode.channels(),
            scaled: Vec::new(),
            wire: Vec::new(),
        }
    }

    /// 当前音量
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// 设置音量
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    /// 转换为输出通道格式, 返回待写入的数据
    pub fn convert(&mut self, pcm: &[u8], info: &StreamInfo) -> SquawkResult<&[u8]> {
        if info.bits_per_sample != 16 {
            return Err(SquawkError::Unsupported(format!(
                "不支持的解码位宽: {}",
                info.bits_per_sample
            )));
        }
        convert_channels(
            pcm,
            SampleFormat::S16,
            info.channels as usize,
            self.target_channels as usize,
            &mut self.scaled,
        )?;
        scale_volume_s16(&mut self.scaled, self.volume);

        match self.target_format {
            SampleFormat::S16 => Ok(&self.scaled),
            SampleFormat::S32 => {
                widen_s16_to_s32(&self.scaled, &mut self.wire);
                Ok(&self.wire)
            }
        }
    }

    /// 转换并阻塞写入输出通道
    ///
    /// 返回解码数据的字节数 (不是写入通道的字节数).
    pub fn render<C: AudioChannel, P: ControlPins>(
        &mut self,
        pcm: &[u8],
        info: &StreamInfo,
        sink: &mut SinkHandle<C, P>,
    ) -> SquawkResult<usize> {
        let wire = self.convert(pcm, info)?;
        if let Err(e) = sink.write(wire) {
            error!("写入输出通道失败: {e}");
            return Err(match e {
                SquawkError::ChannelWriteFailure(_) => e,
                other => SquawkError::ChannelWriteFailure(other.to_string()),
            });
        }
        Ok(pcm.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{ChannelMode, SlotMask};

    fn s16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn s16_samples(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    fn target(format: SampleFormat, channel_mode: ChannelMode) -> ChannelConfig {
        ChannelConfig {
            port: 0,
            sample_rate: 16000,
            format,
            channel_mode,
            slot_mask: SlotMask::Left,
            dma_desc_num: 4,
            dma_frame_num: 512,
        }
    }

    #[test]
    fn test_音量缩放向零截断() {
        let mut pcm = s16_bytes(&[1000, -1000, 3, -3, 0]);
        scale_volume_s16(&mut pcm, 0.5);
        assert_eq!(s16_samples(&pcm), vec![500, -500, 1, -1, 0]);
    }

    #[test]
    fn test_增益大于一时限幅() {
        let input: Vec<i16> = (i16::MIN..=i16::MAX).step_by(97).chain([i16::MAX]).collect();
        for volume in [1.5f32, 2.0, 4.0] {
            let mut pcm = s16_bytes(&input);
            scale_volume_s16(&mut pcm, volume);
            for (out, src) in s16_samples(&pcm).iter().zip(&input) {
                let expected = (f32::from(*src) * volume).clamp(-32768.0, 32767.0) as i16;
                assert_eq!(*out, expected);
            }
        }
        let mut pcm = s16_bytes(&[i16::MAX, i16::MIN]);
        scale_volume_s16(&mut pcm, 4.0);
        assert_eq!(s16_samples(&pcm), vec![i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_音量为零输出全零() {
        let mut pcm = s16_bytes(&[i16::MIN, -1, 1, 12345, i16::MAX]);
        scale_volume_s16(&mut pcm, 0.0);
        assert!(s16_samples(&pcm).iter().all(|&s| s == 0));
    }

    #[test]
    fn test_位宽扩展左对齐且不修改源数据() {
        let src = s16_bytes(&[1, -1, i16::MAX]);
        let copy = src.clone();
        let mut dst = Vec::new();
        assert_eq!(widen_s16_to_s32(&src, &mut dst), 12);
        assert_eq!(src, copy);
        let widened: Vec<i32> = dst
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(widened, vec![1 << 16, -1 << 16, i32::from(i16::MAX) << 16]);
    }

    #[test]
    fn test_声道转换() {
        let mono = s16_bytes(&[10, -20]);
        let mut dst = Vec::new();
        convert_channels(&mono, SampleFormat::S16, 1, 2, &mut dst).unwrap();
        assert_eq!(s16_samples(&dst), vec![10, 10, -20, -20]);

        let stereo = s16_bytes(&[100, 200, -3, -5]);
        convert_channels(&stereo, SampleFormat::S16, 2, 1, &mut dst).unwrap();
        assert_eq!(s16_samples(&dst), vec![150, -4]);

        assert!(convert_channels(&mono, SampleFormat::S16, 0, 1, &mut dst).is_err());
    }

    #[test]
    fn test_后处理器不修改解码输出() {
        let info = StreamInfo::new(16000, 16, 1);
        let pcm = s16_bytes(&[1000, -1000]);
        let mut post = PostProcessor::new(0.5, &target(SampleFormat::S32, ChannelMode::Stereo));
        let wire = post.convert(&pcm, &info).unwrap().to_vec();
        assert_eq!(s16_samples(&pcm), vec![1000, -1000]);
        assert_eq!(wire.len(), 16);
        let widened: Vec<i32> = wire
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(widened, vec![500 << 16, 500 << 16, -500 << 16, -500 << 16]);
    }

    #[test]
    fn test_后处理器拒绝非16位输入() {
        let info = StreamInfo::new(16000, 24, 1);
        let mut post = PostProcessor::new(1.0, &target(SampleFormat::S16, ChannelMode::Mono));
        assert!(matches!(
            post.convert(&[0; 6], &info),
            Err(SquawkError::Unsupported(_))
        ));
    }
}
