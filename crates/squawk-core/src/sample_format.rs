//! 音频采样格式定义.
//!
//! 仅包含解码器输出与输出通道所需的交错整数格式.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 音频采样格式
///
/// 所有格式均为交错 (Interleaved) 排列, 如 LRLRLR..., 小端字节序.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    /// 有符号 16 位整数
    #[default]
    S16,
    /// 有符号 32 位整数 (16 位数据左对齐时使用)
    S32,
}

impl SampleFormat {
    /// 每个采样点占用的字节数
    pub const fn bytes_per_sample(&self) -> usize {
        match self {
            Self::S16 => 2,
            Self::S32 => 4,
        }
    }

    /// 每个采样点的位数
    pub const fn bits(&self) -> u32 {
        match self {
            Self::S16 => 16,
            Self::S32 => 32,
        }
    }

    /// 由位宽获取对应格式
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            16 => Some(Self::S16),
            32 => Some(Self::S32),
            _ => None,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::S16 => "s16",
            Self::S32 => "s32",
        };
        write!(f, "{name}")
    }
}
