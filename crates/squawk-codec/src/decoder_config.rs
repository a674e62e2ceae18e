//! 解码器配置.
//!
//! 每种解码器类型对应一个变体, 变体只携带自身需要的字段.

use serde::{Deserialize, Serialize};
use squawk_core::{SquawkError, SquawkResult};

use crate::codec_type::CodecType;

/// 解码器配置 (按解码器类型区分)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecoderConfig {
    /// M4A 配置
    M4a {
        /// 启用 AAC+ (SBR/PS)
        #[serde(default = "default_true")]
        aac_plus_enable: bool,
    },
    /// AAC 配置
    Aac {
        /// 启用 AAC+ (SBR/PS)
        #[serde(default = "default_true")]
        aac_plus_enable: bool,
        /// 输入为不带 ADTS 头的裸 AAC
        #[serde(default)]
        no_adts_header: bool,
        /// 裸 AAC 的采样率 (Hz)
        #[serde(default)]
        sample_rate: u32,
        /// 裸 AAC 的声道数
        #[serde(default)]
        channels: u32,
    },
    /// MPEG-TS 配置
    Ts {
        /// 启用 AAC+ (SBR/PS)
        #[serde(default = "default_true")]
        aac_plus_enable: bool,
    },
    /// MP3 无额外配置
    Mp3,
    /// 裸 PCM 需要显式给出格式
    Pcm {
        /// 采样率 (Hz)
        sample_rate: u32,
        /// 声道数
        channels: u32,
        /// 每帧采样数 (每声道)
        #[serde(default = "default_frame_samples")]
        frame_samples: u32,
    },
}

fn default_true() -> bool {
    true
}

fn default_frame_samples() -> u32 {
    1024
}

impl DecoderConfig {
    /// 对应的解码器类型
    pub fn codec_type(&self) -> CodecType {
        match self {
            Self::M4a { .. } => CodecType::M4a,
            Self::Aac { .. } => CodecType::Aac,
            Self::Ts { .. } => CodecType::Ts,
            Self::Mp3 => CodecType::Mp3,
            Self::Pcm { .. } => CodecType::PcmS16le,
        }
    }

    /// 指定类型的默认配置
    ///
    /// 裸 PCM 没有可推断的默认格式, 返回 `None`.
    pub fn default_for(codec_type: CodecType) -> Option<Self> {
        Some(match codec_type {
            CodecType::M4a => Self::M4a {
                aac_plus_enable: true,
            },
            CodecType::Aac => Self::Aac {
                aac_plus_enable: true,
                no_adts_header: false,
                sample_rate: 0,
                channels: 0,
            },
            CodecType::Ts => Self::Ts {
                aac_plus_enable: true,
            },
            CodecType::Mp3 => Self::Mp3,
            CodecType::PcmS16le => return None,
        })
    }

    /// 检查配置字段
    pub fn validate(&self) -> SquawkResult<()> {
        match self {
            Self::Aac {
                no_adts_header: true,
                sample_rate,
                channels,
                ..
            } if *sample_rate == 0 || *channels == 0 => Err(SquawkError::InvalidArgument(
                "裸 AAC 必须指定采样率和声道数".into(),
            )),
            Self::Pcm {
                sample_rate,
                channels,
                frame_samples,
            } => {
                if *sample_rate == 0 || *channels == 0 || *frame_samples == 0 {
                    return Err(SquawkError::InvalidArgument(format!(
                        "PCM 参数无效: {sample_rate}Hz/{channels}ch/{frame_samples} 采样每帧"
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
