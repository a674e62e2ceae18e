//! # Squawk
//!
//! 将内存中的压缩音频资源增量解码, 经 PCM 后处理后以阻塞写入的方式送入硬件输出通道.
//!
//! # 快速开始
//!
//! ```rust
//! use squawk::codec::DecoderConfig;
//! use squawk::render::{PlaybackConfig, PlaybackSession};
//!
//! let config = PlaybackConfig {
//!     volume: 0.5,
//!     decoder: DecoderConfig::Pcm { sample_rate: 16000, channels: 1, frame_samples: 256 },
//!     ..Default::default()
//! };
//! let asset = vec![0u8; 3200];
//! let report = PlaybackSession::new(config)?.run_software(&asset)?;
//! assert_eq!(report.stats.total_decoded, 3200);
//! # Ok::<(), squawk::core::SquawkError>(())
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `squawk-core` | 错误类型、采样格式、流信息、可增长缓冲区 |
//! | `squawk-codec` | 推模式解码器接口、解码器注册表与内置解码器 |
//! | `squawk-render` | 解码引擎、PCM 后处理、输出通道生命周期与播放会话 |

/// 核心类型与工具
pub use squawk_core as core;

/// 解码器框架
pub use squawk_codec as codec;

/// 解码渲染循环
pub use squawk_render as render;

/// 获取 Squawk 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置解码器的注册表
pub fn default_decoder_registry() -> squawk_codec::DecoderRegistry {
    squawk_codec::DecoderRegistry::with_defaults()
}
