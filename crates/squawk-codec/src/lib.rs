//! # squawk-codec
//!
//! squawk 解码器能力库, 定义推模式 (push) 的帧级解码接口.
//!
//! 调用方持有输入视图 [`RawFrame`] 与输出缓冲 [`OutFrame`], 每次调用
//! [`SimpleDecoder::process`] 最多产出一帧 PCM, 并报告消耗的输入字节数.
//! 输出缓冲不足时返回 [`DecodeStatus::BufferTooSmall`], 由调用方扩容后原样重试.
//!
//! ## 使用示例
//!
//! ```rust
//! use squawk_codec::{DecoderConfig, DecoderRegistry};
//!
//! let registry = DecoderRegistry::with_defaults();
//! let config = DecoderConfig::Pcm { sample_rate: 16000, channels: 1, frame_samples: 256 };
//! let decoder = registry.open(&config).unwrap();
//! assert_eq!(decoder.name(), "pcm_s16le");
//! ```

pub mod codec_type;
pub mod decoder;
pub mod decoder_config;
pub mod decoders;
pub mod frame;
pub mod registry;

// 重导出常用类型
pub use codec_type::CodecType;
pub use decoder::{DecodeStatus, SimpleDecoder};
pub use decoder_config::DecoderConfig;
pub use frame::{OutFrame, RawFrame};
pub use registry::DecoderRegistry;
