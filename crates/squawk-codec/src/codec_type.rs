//! 解码器类型标识.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 解码器类型
///
/// 嵌入资源的编码类型在构建时确定, 运行时不做格式探测.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecType {
    /// MP4/M4A 封装的 AAC
    M4a,
    /// ADTS 或裸 AAC
    Aac,
    /// MPEG-TS 封装的 AAC
    Ts,
    /// MP3 (MPEG Audio Layer III)
    Mp3,
    /// 交错 S16LE 裸 PCM
    PcmS16le,
}

impl CodecType {
    /// 类型名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::M4a => "m4a",
            Self::Aac => "aac",
            Self::Ts => "ts",
            Self::Mp3 => "mp3",
            Self::PcmS16le => "pcm_s16le",
        }
    }
}

impl fmt::Display for CodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
