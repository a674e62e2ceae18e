//! # squawk-core
//!
//! squawk 解码渲染管线的核心库, 提供错误类型、采样格式、流信息与 PCM 缓冲区.
//!
//! 其余 squawk crate 均依赖本 crate 定义的基础类型.

pub mod buffer;
pub mod error;
pub mod sample_format;
pub mod stream_info;

// 重导出常用类型
pub use buffer::PcmBuffer;
pub use error::{SquawkError, SquawkResult};
pub use sample_format::SampleFormat;
pub use stream_info::StreamInfo;
