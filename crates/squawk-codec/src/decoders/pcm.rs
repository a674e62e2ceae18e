//! PCM S16LE 解码器.
//!
//! 将交错 S16LE 裸数据按固定帧长切分输出. 跨块边界的半个采样帧暂存在内部,
//! 与下一块的数据拼接后输出.

use log::trace;
use squawk_core::{SquawkError, SquawkResult, StreamInfo};

use crate::codec_type::CodecType;
use crate::decoder::{DecodeStatus, SimpleDecoder};
use crate::decoder_config::DecoderConfig;
use crate::frame::{OutFrame, RawFrame};

/// PCM S16LE 解码器
pub struct PcmDecoder {
    /// 采样率
    sample_rate: u32,
    /// 声道数
    channels: u32,
    /// 一个采样帧的字节数
    block_align: usize,
    /// 每次输出的最大字节数
    frame_bytes: usize,
    /// 跨块暂存的不完整采样帧
    carry: Vec<u8>,
    /// 首帧输出后可用的流信息
    info: Option<StreamInfo>,
}

impl PcmDecoder {
    /// 创建解码器
    pub fn new(sample_rate: u32, channels: u32, frame_samples: u32) -> SquawkResult<Self> {
        if sample_rate == 0 || channels == 0 || frame_samples == 0 {
            return Err(SquawkError::DecoderOpenFailure(format!(
                "PCM 参数无效: {sample_rate}Hz/{channels}ch/{frame_samples}"
            )));
        }
        let block_align = channels as usize * 2;
        Ok(Self {
            sample_rate,
            channels,
            block_align,
            frame_bytes: frame_samples as usize * block_align,
            carry: Vec::with_capacity(block_align),
            info: None,
        })
    }

    /// 注册表工厂函数
    pub fn create(config: &DecoderConfig) -> SquawkResult<Box<dyn SimpleDecoder>> {
        match *config {
            DecoderConfig::Pcm {
                sample_rate,
                channels,
                frame_samples,
            } => Ok(Box::new(Self::new(sample_rate, channels, frame_samples)?)),
            _ => Err(SquawkError::DecoderOpenFailure(format!(
                "PCM 解码器不接受 {} 配置",
                config.codec_type()
            ))),
        }
    }
}

impl SimpleDecoder for PcmDecoder {
    fn codec_type(&self) -> CodecType {
        CodecType::PcmS16le
    }

    fn name(&self) -> &str {
        "pcm_s16le"
    }

    fn process(
        &mut self,
        raw: &mut RawFrame<'_>,
        out: &mut OutFrame<'_>,
    ) -> SquawkResult<DecodeStatus> {
        let data = raw.data();
        out.decoded_size = 0;
        raw.consumed = 0;

        let carried = self.carry.len();
        let take = (self.frame_bytes - carried).min(data.len());
        let total = carried + take;
        let aligned = total - total % self.block_align;

        if aligned == 0 {
            // 不足一个采样帧, 全部暂存
            self.carry.extend_from_slice(&data[..take]);
            raw.consumed = take;
            if raw.eos && take == data.len() {
                trace!("流末尾丢弃 {} 字节不完整采样帧", self.carry.len());
                self.carry.clear();
            }
            return Ok(DecodeStatus::Ok);
        }

        if out.capacity() < aligned {
            out.needed_size = aligned;
            return Ok(DecodeStatus::BufferTooSmall);
        }

        let from_raw = aligned - carried;
        out.buffer[..carried].copy_from_slice(&self.carry);
        out.buffer[carried..aligned].copy_from_slice(&data[..from_raw]);
        self.carry.clear();
        self.carry.extend_from_slice(&data[from_raw..take]);
        if raw.eos && take == data.len() && !self.carry.is_empty() {
            trace!("流末尾丢弃 {} 字节不完整采样帧", self.carry.len());
            self.carry.clear();
        }

        out.decoded_size = aligned;
        raw.consumed = take;
        if self.info.is_none() {
            self.info = Some(StreamInfo::new(self.sample_rate, 16, self.channels));
        }
        Ok(DecodeStatus::Ok)
    }

    fn info(&self) -> Option<StreamInfo> {
        self.info
    }

    fn close(&mut self) {
        self.carry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_按帧长切分输出() {
        let mut dec = PcmDecoder::new(8000, 1, 4).unwrap();
        let input = samples_to_bytes(&[1, 2, 3, 4, 5, 6]);
        let mut raw = RawFrame::new(&input, true);
        let mut buf = vec![0u8; 64];

        let mut out = OutFrame::new(&mut buf);
        assert_eq!(dec.process(&mut raw, &mut out).unwrap(), DecodeStatus::Ok);
        assert_eq!(out.decoded(), &samples_to_bytes(&[1, 2, 3, 4])[..]);
        assert_eq!(raw.consumed, 8);
        raw.advance().unwrap();

        let mut out = OutFrame::new(&mut buf);
        dec.process(&mut raw, &mut out).unwrap();
        assert_eq!(out.decoded(), &samples_to_bytes(&[5, 6])[..]);
        raw.advance().unwrap();
        assert!(raw.is_empty());
        assert_eq!(dec.info(), Some(StreamInfo::new(8000, 16, 1)));
    }

    #[test]
    fn test_缓冲不足时不消耗输入() {
        let mut dec = PcmDecoder::new(8000, 2, 16).unwrap();
        let input = vec![0u8; 64];
        let mut raw = RawFrame::new(&input, false);
        let mut buf = vec![0u8; 10];
        let mut out = OutFrame::new(&mut buf);

        let status = dec.process(&mut raw, &mut out).unwrap();
        assert_eq!(status, DecodeStatus::BufferTooSmall);
        assert_eq!(out.needed_size, 64);
        assert_eq!(raw.consumed, 0);
        assert_eq!(out.decoded_size, 0);
    }

    #[test]
    fn test_跨块拼接不完整采样帧() {
        let mut dec = PcmDecoder::new(8000, 2, 16).unwrap();
        let all = samples_to_bytes(&[10, -10, 20, -20]);
        let mut buf = vec![0u8; 64];

        // 第一块在采样帧中间截断
        let mut raw = RawFrame::new(&all[..6], false);
        let mut out = OutFrame::new(&mut buf);
        dec.process(&mut raw, &mut out).unwrap();
        assert_eq!(out.decoded(), &all[..4]);
        assert_eq!(raw.consumed, 6);

        let mut raw = RawFrame::new(&all[6..], true);
        let mut out = OutFrame::new(&mut buf);
        dec.process(&mut raw, &mut out).unwrap();
        assert_eq!(out.decoded(), &all[4..]);
        assert_eq!(raw.consumed, 2);
    }

    #[test]
    fn test_拒绝非pcm配置() {
        assert!(PcmDecoder::create(&DecoderConfig::Mp3).is_err());
        assert!(PcmDecoder::new(0, 1, 1).is_err());
    }
}
