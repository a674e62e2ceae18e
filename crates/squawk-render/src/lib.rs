//! # squawk-render
//!
//! 解码渲染循环: 从内存中的压缩资源读取数据, 增量解码, 对 PCM 做后处理,
//! 最后以阻塞写入的方式送入硬件输出通道.
//!
//! ## 组件
//!
//! | 模块 | 功能 |
//! |------|------|
//! | [`source`] | 内存资源上的顺序字节读取 |
//! | [`engine`] | 带回压与超时看门狗的解码状态机 |
//! | [`post`] | 音量缩放、位宽与声道转换 |
//! | [`sink`] | 输出通道的配置/使能/写入/拆除 |
//! | [`signal`] | 功放使能与增益两路控制信号 |
//! | [`session`] | 单次播放会话的编排 |
//! | [`config`] | 播放配置 |

pub mod config;
pub mod engine;
pub mod post;
pub mod session;
pub mod signal;
pub mod sink;
pub mod source;

// 重导出常用类型
pub use config::{EngineConfig, PlaybackConfig, SinkConfig};
pub use engine::{DecodeEngine, DecodeStats, EngineState, PcmConsumer};
pub use post::{PostProcessor, convert_channels, scale_volume_s16, widen_s16_to_s32};
pub use session::{
    HardwareRenderer, PlaybackSession, SessionOutcome, SessionReport, SoftwareVolume,
};
pub use signal::{ControlPins, ControlSignals, GainLevel, Signal};
pub use sink::{
    AudioChannel, ChannelConfig, ChannelMode, SinkHandle, SinkState, SlotMask, WriteTimeout,
};
pub use source::{ByteSource, SourceReader};
