//! 内存资源数据源.

/// 顺序字节源
pub trait ByteSource {
    /// 从当前位置拷贝至多 `dst.len()` 字节, 返回实际拷贝的字节数
    ///
    /// 到达末尾时返回 0, 不视为错误.
    fn read(&mut self, dst: &mut [u8]) -> usize;
}

/// 固定内存资源上的只进读取游标
#[derive(Debug, Clone)]
pub struct SourceReader<'a> {
    /// 资源数据
    data: &'a [u8],
    /// 当前读取位置
    offset: usize,
}

impl<'a> SourceReader<'a> {
    /// 创建读取游标
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// 资源总字节数
    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    /// 当前读取位置
    pub fn position(&self) -> usize {
        self.offset
    }

    /// 剩余字节数
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// 是否已读完
    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.data.len()
    }
}

impl ByteSource for SourceReader<'_> {
    fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.remaining());
        dst[..n].copy_from_slice(&self.data[self.offset..self.offset + n]);
        self.offset += n;
        n
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read(&mut self, dst: &mut [u8]) -> usize {
        (**self).read(dst)
    }
}
