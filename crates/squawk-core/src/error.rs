//! 统一错误类型定义.
//!
//! 所有 squawk crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// squawk 统一错误类型
#[derive(Debug, Error)]
pub enum SquawkError {
    /// 缓冲区或通道分配失败
    #[error("内存分配失败: {0}")]
    AllocationFailure(String),

    /// 解码器打开失败 (未注册或参数被拒绝)
    #[error("解码器打开失败: {0}")]
    DecoderOpenFailure(String),

    /// 不可恢复的码流错误
    #[error("解码失败: {0}")]
    DecodeFatal(String),

    /// 输出通道拒绝写入数据
    #[error("通道写入失败: {0}")]
    ChannelWriteFailure(String),

    /// 输出通道拒绝配置参数
    #[error("通道配置失败: {0}")]
    ConfigurationFailure(String),

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 生命周期状态不允许该操作
    #[error("状态错误: {0}")]
    InvalidState(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 配置文件解析错误
    #[error("配置错误: {0}")]
    Config(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl SquawkError {
    /// 该错误是否发生于流传输阶段 (需要拆除已使能的通道)
    pub fn is_streaming_error(&self) -> bool {
        matches!(self, Self::DecodeFatal(_) | Self::ChannelWriteFailure(_))
    }
}

/// squawk 统一 Result 类型
pub type SquawkResult<T> = Result<T, SquawkError>;
