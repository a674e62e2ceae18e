//! 解码流信息.

use std::fmt;

/// 解码流信息
///
/// 在首个成功解码的帧之后由解码器报告, 整个会话内不再变化.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamInfo {
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 每个采样点的位数
    pub bits_per_sample: u32,
    /// 声道数
    pub channels: u32,
}

impl StreamInfo {
    /// 创建流信息
    pub const fn new(sample_rate: u32, bits_per_sample: u32, channels: u32) -> Self {
        Self {
            sample_rate,
            bits_per_sample,
            channels,
        }
    }

    /// 一个采样帧 (所有声道各一个采样点) 的字节数
    pub const fn bytes_per_frame(&self) -> usize {
        (self.channels as usize).saturating_mul(self.bits_per_sample as usize) / 8
    }

    /// 指定字节数对应的播放时长 (秒)
    pub fn duration_secs(&self, bytes: u64) -> f64 {
        let per_sec =
            (self.bytes_per_frame() as u64).saturating_mul(u64::from(self.sample_rate));
        if per_sec == 0 {
            return 0.0;
        }
        bytes as f64 / per_sec as f64
    }
}

impl fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz/{}bit/{}ch",
            self.sample_rate, self.bits_per_sample, self.channels
        )
    }
}
