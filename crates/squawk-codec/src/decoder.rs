//! 解码器 trait 定义.
//!
//! 所有内置解码器与外部解码器适配层都实现 `SimpleDecoder`.

use squawk_core::{SquawkResult, StreamInfo};

use crate::codec_type::CodecType;
use crate::frame::{OutFrame, RawFrame};

/// 单次解码调用的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// 调用完成; `decoded_size` 可能为 0 (仅消耗了输入)
    Ok,
    /// 输出缓冲不足, `needed_size` 已写入; 输入未被消耗
    BufferTooSmall,
}

/// 推模式解码器 trait
///
/// 解码流程:
/// 1. 调用方将一块压缩数据包装为 [`RawFrame`]
/// 2. 反复调用 `process()`, 每次按 `consumed` 推进视图, 直到视图为空
/// 3. 返回 `BufferTooSmall` 时扩容输出缓冲, 以同一视图重试
/// 4. 返回 `Err` 表示不可恢复的码流错误
pub trait SimpleDecoder {
    /// 获取解码器类型
    fn codec_type(&self) -> CodecType;

    /// 获取解码器名称
    fn name(&self) -> &str;

    /// 解码一次
    ///
    /// # 约定
    /// - 返回 `Ok(DecodeStatus::Ok)` 时 `raw.consumed <= raw.len()`
    /// - 返回 `BufferTooSmall` 时 `raw.consumed == 0`, 解码器内部状态不变
    fn process(&mut self, raw: &mut RawFrame<'_>, out: &mut OutFrame<'_>)
    -> SquawkResult<DecodeStatus>;

    /// 获取流信息 (首帧解码成功后可用)
    fn info(&self) -> Option<StreamInfo>;

    /// 关闭解码器, 释放内部缓存
    ///
    /// 默认实现为空操作.
    fn close(&mut self) {}
}
