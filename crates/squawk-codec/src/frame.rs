//! 解码器输入/输出视图.
//!
//! [`RawFrame`] 借用调用方的输入块, 只能通过 [`RawFrame::advance`] 向前推进.
//! 在视图仍有未消耗字节时, 输入块处于借用状态, 不可能被重新填充.

use squawk_core::{SquawkError, SquawkResult};

/// 未消耗的压缩输入视图
#[derive(Debug)]
pub struct RawFrame<'a> {
    /// 剩余未消耗的输入
    data: &'a [u8],
    /// 本次解码调用消耗的字节数 (由解码器写入)
    pub consumed: usize,
    /// 是否为最后一块输入
    pub eos: bool,
}

impl<'a> RawFrame<'a> {
    /// 基于输入块创建视图
    pub fn new(data: &'a [u8], eos: bool) -> Self {
        Self {
            data,
            consumed: 0,
            eos,
        }
    }

    /// 剩余未消耗的输入
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// 剩余字节数
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否已完全消耗
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 按 `consumed` 推进视图并清零, 返回推进的字节数
    ///
    /// 解码器报告的 `consumed` 超过剩余长度属于码流错误.
    pub fn advance(&mut self) -> SquawkResult<usize> {
        let consumed = self.consumed;
        if consumed > self.data.len() {
            return Err(SquawkError::DecodeFatal(format!(
                "解码器报告消耗 {consumed} 字节, 超过剩余 {} 字节",
                self.data.len()
            )));
        }
        self.data = &self.data[consumed..];
        self.consumed = 0;
        Ok(consumed)
    }
}

/// 调用方持有、解码器写入的输出帧
#[derive(Debug)]
pub struct OutFrame<'a> {
    /// 输出缓冲区 (长度即容量)
    pub buffer: &'a mut [u8],
    /// 本次写入的字节数
    pub decoded_size: usize,
    /// 容量不足时解码器需要的字节数
    pub needed_size: usize,
}

impl<'a> OutFrame<'a> {
    /// 基于输出缓冲区创建
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            decoded_size: 0,
            needed_size: 0,
        }
    }

    /// 缓冲区容量
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// 已解码的数据
    pub fn decoded(&self) -> &[u8] {
        &self.buffer[..self.decoded_size.min(self.buffer.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_视图按消耗量推进() {
        let chunk = [1u8, 2, 3, 4, 5];
        let mut raw = RawFrame::new(&chunk, false);
        raw.consumed = 2;
        assert_eq!(raw.advance().unwrap(), 2);
        assert_eq!(raw.data(), &[3, 4, 5]);
        assert_eq!(raw.consumed, 0);

        raw.consumed = 3;
        raw.advance().unwrap();
        assert!(raw.is_empty());
    }

    #[test]
    fn test_消耗超过剩余长度报错() {
        let chunk = [0u8; 4];
        let mut raw = RawFrame::new(&chunk, true);
        raw.consumed = 5;
        assert!(matches!(raw.advance(), Err(SquawkError::DecodeFatal(_))));
        assert_eq!(raw.len(), 4);
    }
}
