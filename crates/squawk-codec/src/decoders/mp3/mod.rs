//! MP3 解码器实现
//!
//! 帧同步与跨块拼帧在本模块完成, 整帧数据交给 symphonia 解码为交错 S16.

mod header;

pub use self::header::{Mp3Header, MpegVersion, find_sync_word, id3v2_tag_size};

use log::{debug, trace};
use squawk_core::{SquawkError, SquawkResult, StreamInfo};
use symphonia_bundle_mp3::MpaDecoder as SymMpaDecoder;
use symphonia_core::audio::SampleBuffer;
use symphonia_core::codecs::{
    CODEC_TYPE_MP3, CodecParameters as SymCodecParameters, Decoder as SymDecoderTrait,
    DecoderOptions as SymDecoderOptions,
};
use symphonia_core::formats::Packet as SymPacket;

use crate::codec_type::CodecType;
use crate::decoder::{DecodeStatus, SimpleDecoder};
use crate::decoder_config::DecoderConfig;
use crate::frame::{OutFrame, RawFrame};

/// MP3 解码器
pub struct Mp3Decoder {
    /// symphonia MP3 解码器
    sym_decoder: SymMpaDecoder,
    /// 跨块暂存的不完整帧 (非空时以同步字开头)
    carry: Vec<u8>,
    /// ID3v2 标签剩余待跳过的字节数
    skip_remaining: usize,
    /// 是否尚未处理任何输入
    at_start: bool,
    /// 累计时间戳 (采样数)
    next_ts: u64,
    /// 首帧解码后可用的流信息
    info: Option<StreamInfo>,
}

impl Mp3Decoder {
    /// 创建解码器
    pub fn new() -> SquawkResult<Self> {
        let sym_params = SymCodecParameters {
            codec: CODEC_TYPE_MP3,
            ..Default::default()
        };
        let sym_decoder = SymMpaDecoder::try_new(&sym_params, &SymDecoderOptions::default())
            .map_err(|e| {
                SquawkError::DecoderOpenFailure(format!("symphonia mp3 初始化失败: {e}"))
            })?;
        Ok(Self {
            sym_decoder,
            carry: Vec::with_capacity(2048),
            skip_remaining: 0,
            at_start: true,
            next_ts: 0,
            info: None,
        })
    }

    /// 注册表工厂函数
    pub fn create(config: &DecoderConfig) -> SquawkResult<Box<dyn SimpleDecoder>> {
        match config {
            DecoderConfig::Mp3 => Ok(Box::new(Self::new()?)),
            other => Err(SquawkError::DecoderOpenFailure(format!(
                "MP3 解码器不接受 {} 配置",
                other.codec_type()
            ))),
        }
    }

    /// 解码一整帧, 写入输出缓冲并更新流信息
    fn decode_into(
        &mut self,
        frame: &[u8],
        header: &Mp3Header,
        out: &mut OutFrame<'_>,
    ) -> SquawkResult<()> {
        let (written, info) = decode_frame(
            &mut self.sym_decoder,
            self.next_ts,
            header.samples_per_frame() as u64,
            frame,
            out.buffer,
        )?;
        self.next_ts += header.samples_per_frame() as u64;
        out.decoded_size = written;
        if self.info.is_none() {
            debug!("MP3 流信息: {info}");
            self.info = Some(info);
        }
        Ok(())
    }

    /// 输入以同步字开头时的处理 (无暂存帧)
    fn process_aligned(
        &mut self,
        data: &[u8],
        eos: bool,
        out: &mut OutFrame<'_>,
    ) -> SquawkResult<(usize, DecodeStatus)> {
        if data.len() < Mp3Header::SIZE {
            self.stash(data, eos);
            return Ok((data.len(), DecodeStatus::Ok));
        }
        let Some(header) = Mp3Header::parse([data[0], data[1], data[2], data[3]]) else {
            // 伪同步字, 跳过一个字节重新搜索
            return Ok((1, DecodeStatus::Ok));
        };
        if data.len() < header.frame_size {
            self.stash(data, eos);
            return Ok((data.len(), DecodeStatus::Ok));
        }
        if out.capacity() < header.pcm_bytes() {
            out.needed_size = header.pcm_bytes();
            return Ok((0, DecodeStatus::BufferTooSmall));
        }
        self.decode_into(&data[..header.frame_size], &header, out)?;
        Ok((header.frame_size, DecodeStatus::Ok))
    }

    /// 补齐暂存帧的处理
    fn process_carried(
        &mut self,
        data: &[u8],
        eos: bool,
        out: &mut OutFrame<'_>,
    ) -> SquawkResult<(usize, DecodeStatus)> {
        let mut taken = 0;
        if self.carry.len() < Mp3Header::SIZE {
            taken = (Mp3Header::SIZE - self.carry.len()).min(data.len());
            self.carry.extend_from_slice(&data[..taken]);
            if self.carry.len() < Mp3Header::SIZE {
                if eos && taken == data.len() {
                    self.carry.clear();
                }
                return Ok((taken, DecodeStatus::Ok));
            }
        }

        let head = [self.carry[0], self.carry[1], self.carry[2], self.carry[3]];
        let Some(header) = Mp3Header::parse(head) else {
            // 本块字节退回输入, 由下一次调用从块首重新搜索
            self.carry.truncate(self.carry.len() - taken);
            self.resync_carry();
            return Ok((0, DecodeStatus::Ok));
        };

        let rest = &data[taken..];
        let need = header.frame_size.saturating_sub(self.carry.len());
        if rest.len() < need {
            self.carry.extend_from_slice(rest);
            if eos {
                trace!("流末尾丢弃 {} 字节不完整帧", self.carry.len());
                self.carry.clear();
            }
            return Ok((data.len(), DecodeStatus::Ok));
        }
        if out.capacity() < header.pcm_bytes() {
            // 帧头字节已并入暂存区, 回退以保持输入未消耗
            self.carry.truncate(self.carry.len() - taken);
            out.needed_size = header.pcm_bytes();
            return Ok((0, DecodeStatus::BufferTooSmall));
        }

        let mut frame = std::mem::take(&mut self.carry);
        frame.extend_from_slice(&rest[..need]);
        let result = self.decode_into(&frame, &header, out);
        frame.clear();
        self.carry = frame;
        result?;
        Ok((taken + need, DecodeStatus::Ok))
    }

    /// 暂存区帧头无效时丢弃首字节, 保留其后可能的同步字
    fn resync_carry(&mut self) {
        if self.carry.is_empty() {
            return;
        }
        let keep_from = match find_sync_word(&self.carry[1..]) {
            Some(offset) => offset + 1,
            None if self.carry.len() > 1 && self.carry.last() == Some(&0xFF) => {
                self.carry.len() - 1
            }
            None => self.carry.len(),
        };
        trace!("暂存帧头无效, 丢弃 {keep_from} 字节");
        self.carry.drain(..keep_from);
    }

    /// 暂存不完整帧; 流末尾直接丢弃
    fn stash(&mut self, data: &[u8], eos: bool) {
        if eos {
            trace!("流末尾丢弃 {} 字节不完整帧", data.len());
            return;
        }
        self.carry.extend_from_slice(data);
    }
}

impl SimpleDecoder for Mp3Decoder {
    fn codec_type(&self) -> CodecType {
        CodecType::Mp3
    }

    fn name(&self) -> &str {
        "mp3"
    }

    fn process(
        &mut self,
        raw: &mut RawFrame<'_>,
        out: &mut OutFrame<'_>,
    ) -> SquawkResult<DecodeStatus> {
        let data = raw.data();
        let eos = raw.eos;
        out.decoded_size = 0;
        raw.consumed = 0;

        // 1. 跳过 ID3v2 标签
        if self.at_start {
            self.at_start = false;
            if let Some(size) = id3v2_tag_size(data) {
                debug!("跳过 ID3v2 标签: {size} 字节");
                self.skip_remaining = size;
            }
        }
        if self.skip_remaining > 0 {
            let n = self.skip_remaining.min(data.len());
            self.skip_remaining -= n;
            raw.consumed = n;
            return Ok(DecodeStatus::Ok);
        }

        // 2. 补齐跨块的不完整帧
        if !self.carry.is_empty() {
            let (consumed, status) = self.process_carried(data, eos, out)?;
            raw.consumed = consumed;
            return Ok(status);
        }

        // 3. 查找同步字
        let (consumed, status) = match find_sync_word(data) {
            Some(0) => self.process_aligned(data, eos, out)?,
            Some(offset) => (offset, DecodeStatus::Ok),
            None => {
                // 末尾的 0xFF 可能是下一块同步字的前半
                if !eos && data.last() == Some(&0xFF) {
                    self.carry.push(0xFF);
                }
                (data.len(), DecodeStatus::Ok)
            }
        };
        raw.consumed = consumed;
        Ok(status)
    }

    fn info(&self) -> Option<StreamInfo> {
        self.info
    }

    fn close(&mut self) {
        self.carry.clear();
        self.skip_remaining = 0;
        self.sym_decoder.reset();
    }
}

/// 使用 symphonia 解码一帧, 返回写入字节数与流信息
fn decode_frame(
    decoder: &mut SymMpaDecoder,
    ts: u64,
    duration: u64,
    frame: &[u8],
    out: &mut [u8],
) -> SquawkResult<(usize, StreamInfo)> {
    let packet = SymPacket::new_from_slice(0, ts, duration, frame);
    let decoded = decoder
        .decode(&packet)
        .map_err(|e| SquawkError::DecodeFatal(format!("mp3 帧解码失败: {e}")))?;

    let spec = *decoded.spec();
    let mut sample_buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
    sample_buf.copy_interleaved_ref(decoded);
    let samples = sample_buf.samples();

    let bytes = samples.len() * 2;
    if bytes > out.len() {
        return Err(SquawkError::DecodeFatal(format!(
            "mp3 帧输出 {bytes} 字节超过帧头声明的 {} 字节",
            out.len()
        )));
    }
    for (dst, s) in out.chunks_exact_mut(2).zip(samples) {
        dst.copy_from_slice(&s.to_le_bytes());
    }

    let info = StreamInfo::new(spec.rate, 16, spec.channels.count() as u32);
    Ok((bytes, info))
}
