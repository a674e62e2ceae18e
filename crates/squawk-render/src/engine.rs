//! 解码引擎.
//!
//! 状态机: Reading (读取下一块输入) → Decoding (反复调用解码器直到当前块耗尽)
//! → Terminal (输入结束、超时或不可恢复错误).
//!
//! 当前块仍有未消耗字节时, 引擎不会读取下一块; 输出缓冲扩容后以同一输入视图重试.

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use squawk_codec::{DecodeStatus, OutFrame, RawFrame, SimpleDecoder};
use squawk_core::{PcmBuffer, SquawkError, SquawkResult, StreamInfo};

use crate::config::EngineConfig;
use crate::source::ByteSource;

/// 解码引擎状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// 从数据源读取下一块
    Reading,
    /// 消耗当前输入块
    Decoding,
    /// 已结束
    Terminal,
}

/// 解码输出的消费者 (后处理与写入)
pub trait PcmConsumer {
    /// 处理一帧解码输出, 返回计入统计的字节数
    fn consume(&mut self, pcm: &mut [u8], info: &StreamInfo) -> SquawkResult<usize>;
}

impl<F> PcmConsumer for F
where
    F: FnMut(&mut [u8], &StreamInfo) -> SquawkResult<usize>,
{
    fn consume(&mut self, pcm: &mut [u8], info: &StreamInfo) -> SquawkResult<usize> {
        self(pcm, info)
    }
}

/// 会话级解码统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeStats {
    /// 累计解码字节数
    pub total_decoded: u64,
    /// 累计纯解码耗时 (不含读取与后处理)
    pub decode_time: Duration,
    /// 会话总耗时
    pub elapsed: Duration,
    /// 读取的输入块数
    pub chunks_read: u64,
    /// 读取的输入字节数
    pub bytes_read: u64,
    /// 解码器调用次数
    pub decode_calls: u64,
    /// 产生输出的帧数
    pub frames_decoded: u64,
    /// 输出缓冲扩容次数
    pub buffer_growths: u32,
    /// 输出缓冲最终容量
    pub out_capacity: usize,
    /// 是否因超时结束
    pub deadline_hit: bool,
}

impl DecodeStats {
    /// 每秒音频的解码耗时 (秒)
    ///
    /// `decode_time × bytes_per_frame × sample_rate / total_decoded`, 未解码任何数据时为 `None`.
    pub fn decode_cost_ratio(&self, info: &StreamInfo) -> Option<f64> {
        if self.total_decoded == 0 {
            return None;
        }
        let per_sec = info.bytes_per_frame() as f64 * f64::from(info.sample_rate);
        Some(self.decode_time.as_secs_f64() * per_sec / self.total_decoded as f64)
    }

    /// 解码占用的 CPU 百分比
    pub fn cpu_usage_percent(&self, info: &StreamInfo) -> Option<f64> {
        self.decode_cost_ratio(info).map(|ratio| ratio * 100.0)
    }
}

/// 解码引擎
#[derive(Debug)]
pub struct DecodeEngine {
    config: EngineConfig,
    state: EngineState,
    /// 输入块缓冲
    chunk: Vec<u8>,
    /// 解码器输出缓冲
    out: PcmBuffer,
    stats: DecodeStats,
    /// 首帧输出后记录的流信息
    info: Option<StreamInfo>,
}

impl DecodeEngine {
    /// 按配置分配输入与输出缓冲
    pub fn new(config: EngineConfig) -> SquawkResult<Self> {
        config.validate()?;
        let mut chunk = Vec::new();
        chunk.try_reserve_exact(config.read_size).map_err(|e| {
            SquawkError::AllocationFailure(format!("输入缓冲区分配失败: {e}"))
        })?;
        chunk.resize(config.read_size, 0);
        let out = PcmBuffer::with_capacity(config.initial_out_size)?;
        Ok(Self {
            config,
            state: EngineState::Reading,
            chunk,
            out,
            stats: DecodeStats::default(),
            info: None,
        })
    }

    /// 当前状态
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// 解码统计
    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    /// 流信息 (首帧输出后可用)
    pub fn info(&self) -> Option<StreamInfo> {
        self.info
    }

    /// 输出缓冲当前容量
    pub fn out_capacity(&self) -> usize {
        self.out.capacity()
    }

    /// 运行解码循环直到输入结束、超时或出错
    ///
    /// 超时不视为错误, 通过 [`DecodeStats::deadline_hit`] 报告.
    pub fn run<S, D, K>(
        &mut self,
        source: &mut S,
        decoder: &mut D,
        consumer: &mut K,
    ) -> SquawkResult<()>
    where
        S: ByteSource + ?Sized,
        D: SimpleDecoder + ?Sized,
        K: PcmConsumer + ?Sized,
    {
        self.stats = DecodeStats::default();
        self.info = None;
        let start = Instant::now();
        let result = self.run_loop(start, source, decoder, consumer);
        self.state = EngineState::Terminal;
        self.stats.elapsed = start.elapsed();
        self.stats.out_capacity = self.out.capacity();
        result
    }

    fn run_loop<S, D, K>(
        &mut self,
        start: Instant,
        source: &mut S,
        decoder: &mut D,
        consumer: &mut K,
    ) -> SquawkResult<()>
    where
        S: ByteSource + ?Sized,
        D: SimpleDecoder + ?Sized,
        K: PcmConsumer + ?Sized,
    {
        let deadline = self.config.deadline();
        let read_size = self.config.read_size;
        let max_out_size = self.config.max_out_size;
        let mut eos = false;

        while !eos {
            self.state = EngineState::Reading;
            let n = source.read(&mut self.chunk[..read_size]).min(read_size);
            self.stats.chunks_read += 1;
            self.stats.bytes_read += n as u64;
            // 读取不足说明已到达资源末尾
            eos = n < read_size;

            self.state = EngineState::Decoding;
            let mut raw = RawFrame::new(&self.chunk[..n], eos);
            while !raw.is_empty() {
                if start.elapsed() > deadline {
                    warn!(
                        "解码超过 {}ms 上限, 提前结束 (剩余 {} 字节未消耗)",
                        deadline.as_millis(),
                        raw.len()
                    );
                    self.stats.deadline_hit = true;
                    raw.eos = true;
                    eos = true;
                    break;
                }

                let decode_start = Instant::now();
                let mut out = OutFrame::new(self.out.as_mut_slice());
                let status = decoder.process(&mut raw, &mut out);
                self.stats.decode_time += decode_start.elapsed();
                self.stats.decode_calls += 1;

                let status = match status {
                    Ok(status) => status,
                    Err(e) => {
                        error!("解码失败: {e}");
                        return Err(e);
                    }
                };

                if status == DecodeStatus::BufferTooSmall {
                    let needed = out.needed_size;
                    let current = out.capacity();
                    // 重试同一输入视图
                    raw.consumed = 0;
                    let target = if needed > current {
                        needed
                    } else {
                        current.saturating_mul(2).min(max_out_size)
                    };
                    if target <= current || target > max_out_size {
                        let err = SquawkError::AllocationFailure(format!(
                            "输出缓冲需要 {needed} 字节, 当前 {current} 字节, 上限 {max_out_size} 字节"
                        ));
                        error!("{err}");
                        return Err(err);
                    }
                    self.out.ensure_capacity(target)?;
                    self.stats.buffer_growths += 1;
                    debug!("输出缓冲扩容 {current} -> {target} 字节");
                    continue;
                }

                let decoded = out.decoded_size;
                if decoded > out.capacity() {
                    let err = SquawkError::DecodeFatal(format!(
                        "解码器报告输出 {decoded} 字节, 超过缓冲容量 {}",
                        out.capacity()
                    ));
                    error!("{err}");
                    return Err(err);
                }
                if decoded > 0 {
                    let info = match self.info {
                        Some(info) => info,
                        None => {
                            let Some(info) = decoder.info() else {
                                let err =
                                    SquawkError::DecodeFatal("解码器产生输出但未报告流信息".into());
                                error!("{err}");
                                return Err(err);
                            };
                            info!("流信息: {info}");
                            self.info = Some(info);
                            info
                        }
                    };
                    self.stats.frames_decoded += 1;
                    let processed =
                        consumer.consume(&mut self.out.as_mut_slice()[..decoded], &info)?;
                    self.stats.total_decoded += processed as u64;
                }
                // 一块输入可能包含多个编码帧
                if let Err(e) = raw.advance() {
                    error!("{e}");
                    return Err(e);
                }
            }
        }
        debug!(
            "输入结束: 读取 {} 块共 {} 字节",
            self.stats.chunks_read, self.stats.bytes_read
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceReader;
    use squawk_codec::CodecType;

    const INFO: StreamInfo = StreamInfo::new(16000, 16, 1);

    /// 每个编码帧固定长度, 解码输出为帧字节的复制
    struct FixedFrameDecoder {
        frame_len: usize,
        out_per_frame: usize,
        /// 每次调用时剩余输入长度
        seen_lengths: Vec<usize>,
    }

    impl SimpleDecoder for FixedFrameDecoder {
        fn codec_type(&self) -> CodecType {
            CodecType::PcmS16le
        }

        fn name(&self) -> &str {
            "fixed"
        }

        fn process(
            &mut self,
            raw: &mut RawFrame<'_>,
            out: &mut OutFrame<'_>,
        ) -> SquawkResult<DecodeStatus> {
            self.seen_lengths.push(raw.len());
            if out.capacity() < self.out_per_frame {
                out.needed_size = self.out_per_frame;
                return Ok(DecodeStatus::BufferTooSmall);
            }
            let take = self.frame_len.min(raw.len());
            let byte = raw.data()[0];
            out.buffer[..self.out_per_frame].fill(byte);
            out.decoded_size = self.out_per_frame;
            raw.consumed = take;
            Ok(DecodeStatus::Ok)
        }

        fn info(&self) -> Option<StreamInfo> {
            Some(INFO)
        }
    }

    /// 每次扩容只报告比当前多一点的需求
    struct GreedyDecoder {
        target: usize,
        calls: usize,
    }

    impl SimpleDecoder for GreedyDecoder {
        fn codec_type(&self) -> CodecType {
            CodecType::PcmS16le
        }

        fn name(&self) -> &str {
            "greedy"
        }

        fn process(
            &mut self,
            raw: &mut RawFrame<'_>,
            out: &mut OutFrame<'_>,
        ) -> SquawkResult<DecodeStatus> {
            self.calls += 1;
            if out.capacity() < self.target {
                out.needed_size = out.capacity() + 1;
                return Ok(DecodeStatus::BufferTooSmall);
            }
            for (i, b) in out.buffer[..self.target].iter_mut().enumerate() {
                *b = i as u8;
            }
            out.decoded_size = self.target;
            raw.consumed = raw.len();
            Ok(DecodeStatus::Ok)
        }

        fn info(&self) -> Option<StreamInfo> {
            Some(INFO)
        }
    }

    /// 产生输出但从不消耗输入
    struct StuckDecoder;

    impl SimpleDecoder for StuckDecoder {
        fn codec_type(&self) -> CodecType {
            CodecType::Mp3
        }

        fn name(&self) -> &str {
            "stuck"
        }

        fn process(
            &mut self,
            _raw: &mut RawFrame<'_>,
            out: &mut OutFrame<'_>,
        ) -> SquawkResult<DecodeStatus> {
            out.decoded_size = 2;
            Ok(DecodeStatus::Ok)
        }

        fn info(&self) -> Option<StreamInfo> {
            Some(INFO)
        }
    }

    struct FailingDecoder;

    impl SimpleDecoder for FailingDecoder {
        fn codec_type(&self) -> CodecType {
            CodecType::Mp3
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn process(
            &mut self,
            _raw: &mut RawFrame<'_>,
            _out: &mut OutFrame<'_>,
        ) -> SquawkResult<DecodeStatus> {
            Err(SquawkError::DecodeFatal("坏帧".into()))
        }

        fn info(&self) -> Option<StreamInfo> {
            None
        }
    }

    fn collect_frames(
        frames: &mut Vec<Vec<u8>>,
    ) -> impl FnMut(&mut [u8], &StreamInfo) -> SquawkResult<usize> + '_ {
        move |pcm, _info| {
            frames.push(pcm.to_vec());
            Ok(pcm.len())
        }
    }

    #[test]
    fn test_同一块内的多个帧依次解码() {
        let asset: Vec<u8> = [[1u8; 10], [2u8; 10], [3u8; 10]].concat();
        let mut decoder = FixedFrameDecoder {
            frame_len: 10,
            out_per_frame: 4,
            seen_lengths: Vec::new(),
        };
        let mut frames = Vec::new();
        let mut engine = DecodeEngine::new(EngineConfig::default()).unwrap();
        engine
            .run(
                &mut SourceReader::new(&asset),
                &mut decoder,
                &mut collect_frames(&mut frames),
            )
            .unwrap();

        assert_eq!(engine.stats().chunks_read, 1);
        assert_eq!(decoder.seen_lengths, vec![30, 20, 10]);
        assert_eq!(frames, vec![vec![1; 4], vec![2; 4], vec![3; 4]]);
        assert_eq!(engine.stats().total_decoded, 12);
        assert_eq!(engine.info(), Some(INFO));
        assert_eq!(engine.state(), EngineState::Terminal);
    }

    #[test]
    fn test_多次扩容后输出完整() {
        let config = EngineConfig {
            initial_out_size: 8,
            ..Default::default()
        };
        let mut decoder = GreedyDecoder {
            target: 13,
            calls: 0,
        };
        let mut frames = Vec::new();
        let mut engine = DecodeEngine::new(config).unwrap();
        engine
            .run(
                &mut SourceReader::new(&[0u8; 100]),
                &mut decoder,
                &mut collect_frames(&mut frames),
            )
            .unwrap();

        assert_eq!(engine.stats().buffer_growths, 5);
        assert_eq!(decoder.calls, 6);
        assert_eq!(engine.out_capacity(), 13);
        assert_eq!(frames, vec![(0..13).collect::<Vec<u8>>()]);
    }

    #[test]
    fn test_需求不大于容量时翻倍扩容() {
        struct LyingDecoder {
            calls: usize,
        }

        impl SimpleDecoder for LyingDecoder {
            fn codec_type(&self) -> CodecType {
                CodecType::PcmS16le
            }

            fn name(&self) -> &str {
                "lying"
            }

            fn process(
                &mut self,
                raw: &mut RawFrame<'_>,
                out: &mut OutFrame<'_>,
            ) -> SquawkResult<DecodeStatus> {
                self.calls += 1;
                if self.calls == 1 {
                    out.needed_size = 1;
                    return Ok(DecodeStatus::BufferTooSmall);
                }
                raw.consumed = raw.len();
                Ok(DecodeStatus::Ok)
            }

            fn info(&self) -> Option<StreamInfo> {
                None
            }
        }

        let config = EngineConfig {
            initial_out_size: 16,
            ..Default::default()
        };
        let mut engine = DecodeEngine::new(config).unwrap();
        let mut decoder = LyingDecoder { calls: 0 };
        let mut sink = |_: &mut [u8], _: &StreamInfo| -> SquawkResult<usize> { Ok(0) };
        engine
            .run(&mut SourceReader::new(&[0u8; 4]), &mut decoder, &mut sink)
            .unwrap();
        assert_eq!(engine.out_capacity(), 32);
    }

    #[test]
    fn test_扩容超过上限报告分配失败() {
        let config = EngineConfig {
            initial_out_size: 8,
            max_out_size: 10,
            ..Default::default()
        };
        let mut decoder = GreedyDecoder {
            target: 64,
            calls: 0,
        };
        let mut engine = DecodeEngine::new(config).unwrap();
        let mut sink = |pcm: &mut [u8], _: &StreamInfo| -> SquawkResult<usize> { Ok(pcm.len()) };
        let err = engine
            .run(&mut SourceReader::new(&[0u8; 4]), &mut decoder, &mut sink)
            .unwrap_err();
        assert!(matches!(err, SquawkError::AllocationFailure(_)));
        assert_eq!(engine.state(), EngineState::Terminal);
    }

    #[test]
    fn test_超时看门狗结束会话() {
        let config = EngineConfig {
            deadline_ms: 50,
            ..Default::default()
        };
        let mut engine = DecodeEngine::new(config).unwrap();
        let mut sink = |pcm: &mut [u8], _: &StreamInfo| -> SquawkResult<usize> { Ok(pcm.len()) };
        let started = Instant::now();
        engine
            .run(&mut SourceReader::new(&[0u8; 2048]), &mut StuckDecoder, &mut sink)
            .unwrap();

        assert!(engine.stats().deadline_hit);
        // 上限之后最多再处理一步
        assert!(started.elapsed() < Duration::from_millis(50 + 200));
        assert!(engine.stats().elapsed >= Duration::from_millis(50));
        assert_eq!(engine.stats().chunks_read, 1);
        assert!(engine.stats().total_decoded > 0);
    }

    #[test]
    fn test_空资源正常结束() {
        let mut engine = DecodeEngine::new(EngineConfig::default()).unwrap();
        let mut calls = 0;
        let mut sink = |_: &mut [u8], _: &StreamInfo| -> SquawkResult<usize> {
            calls += 1;
            Ok(0)
        };
        engine
            .run(&mut SourceReader::new(&[]), &mut FailingDecoder, &mut sink)
            .unwrap();
        assert_eq!(engine.stats().total_decoded, 0);
        assert_eq!(engine.stats().decode_calls, 0);
        assert_eq!(engine.info(), None);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_解码失败终止会话() {
        let mut engine = DecodeEngine::new(EngineConfig::default()).unwrap();
        let mut sink = |pcm: &mut [u8], _: &StreamInfo| -> SquawkResult<usize> { Ok(pcm.len()) };
        let err = engine
            .run(&mut SourceReader::new(&[0u8; 8]), &mut FailingDecoder, &mut sink)
            .unwrap_err();
        assert!(matches!(err, SquawkError::DecodeFatal(_)));
        assert_eq!(engine.stats().decode_calls, 1);
    }

    #[test]
    fn test_解码耗时比例() {
        let stats = DecodeStats {
            total_decoded: 32000,
            decode_time: Duration::from_millis(100),
            ..Default::default()
        };
        let ratio = stats.decode_cost_ratio(&INFO).unwrap();
        assert!((ratio - 0.1).abs() < 1e-9);
        assert!((stats.cpu_usage_percent(&INFO).unwrap() - 10.0).abs() < 1e-6);
        assert_eq!(DecodeStats::default().decode_cost_ratio(&INFO), None);
    }
}
