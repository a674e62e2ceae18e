//! 内置解码器实现模块.

#[cfg(feature = "symphonia-backend")]
pub mod mp3;
pub mod pcm;

use crate::codec_type::CodecType;
use crate::registry::DecoderRegistry;

/// 注册所有内置解码器
pub fn register_all_decoders(registry: &mut DecoderRegistry) {
    registry.register(CodecType::PcmS16le, "pcm_s16le", pcm::PcmDecoder::create);
    #[cfg(feature = "symphonia-backend")]
    registry.register(CodecType::Mp3, "mp3", mp3::Mp3Decoder::create);
}
