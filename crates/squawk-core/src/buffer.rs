//! 可增长的 PCM 输出缓冲区.
//!
//! 解码器向调用方持有的缓冲区写入采样数据. 容量不足时, 调用方通过
//! [`PcmBuffer::ensure_capacity`] 扩容后重试. 扩容保留已有字节, 但之前借出的
//! 切片随之失效 (由借用检查保证), 调用方必须重新获取视图.

use log::debug;

use crate::error::{SquawkError, SquawkResult};

/// 可增长的字节缓冲区
///
/// 内部 `Vec` 的长度始终等于可用容量, 整段都可以作为解码器输出区.
#[derive(Debug, Clone, Default)]
pub struct PcmBuffer {
    data: Vec<u8>,
}

impl PcmBuffer {
    /// 创建指定容量的缓冲区 (零填充)
    pub fn with_capacity(capacity: usize) -> SquawkResult<Self> {
        let mut buf = Self::default();
        buf.ensure_capacity(capacity)?;
        Ok(buf)
    }

    /// 当前容量 (字节)
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// 确保容量至少为 `n` 字节
    ///
    /// 返回是否发生了扩容. 分配失败时返回 `AllocationFailure`, 原有数据保持不变.
    pub fn ensure_capacity(&mut self, n: usize) -> SquawkResult<bool> {
        let current = self.data.len();
        if n <= current {
            return Ok(false);
        }
        self.data.try_reserve_exact(n - current).map_err(|e| {
            SquawkError::AllocationFailure(format!("输出缓冲区扩容到 {n} 字节失败: {e}"))
        })?;
        self.data.resize(n, 0);
        debug!("输出缓冲区扩容: {current} -> {n} 字节");
        Ok(true)
    }

    /// 整个缓冲区的只读视图
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// 整个缓冲区的可写视图
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_扩容保留原有数据() {
        let mut buf = PcmBuffer::with_capacity(4).unwrap();
        buf.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        assert!(buf.ensure_capacity(8).unwrap());
        assert_eq!(buf.capacity(), 8);
        assert_eq!(&buf.as_slice()[..4], &[1, 2, 3, 4]);
        assert_eq!(&buf.as_slice()[4..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_容量足够时不扩容() {
        let mut buf = PcmBuffer::with_capacity(16).unwrap();
        assert!(!buf.ensure_capacity(16).unwrap());
        assert!(!buf.ensure_capacity(3).unwrap());
        assert_eq!(buf.capacity(), 16);
    }

    #[test]
    fn test_超大扩容返回分配错误() {
        let mut buf = PcmBuffer::default();
        let err = buf.ensure_capacity(usize::MAX).unwrap_err();
        assert!(matches!(err, SquawkError::AllocationFailure(_)));
        assert_eq!(buf.capacity(), 0);
    }
}
