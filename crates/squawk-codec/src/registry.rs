//! 解码器注册表.
//!
//! 按 [`CodecType`] 查找工厂函数并以对应配置打开解码器.

use std::collections::HashMap;

use log::debug;
use squawk_core::{SquawkError, SquawkResult};

use crate::codec_type::CodecType;
use crate::decoder::SimpleDecoder;
use crate::decoder_config::DecoderConfig;

/// 解码器工厂函数类型
pub type DecoderFactory = fn(&DecoderConfig) -> SquawkResult<Box<dyn SimpleDecoder>>;

/// 解码器注册表
pub struct DecoderRegistry {
    /// 解码器工厂映射
    decoders: HashMap<CodecType, Vec<DecoderEntry>>,
}

/// 解码器注册条目
struct DecoderEntry {
    /// 解码器名称
    name: String,
    /// 工厂函数
    factory: DecoderFactory,
}

impl DecoderRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// 创建并注册所有内置解码器
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::decoders::register_all_decoders(&mut registry);
        registry
    }

    /// 注册一个解码器
    pub fn register(
        &mut self,
        codec_type: CodecType,
        name: impl Into<String>,
        factory: DecoderFactory,
    ) {
        self.decoders
            .entry(codec_type)
            .or_default()
            .push(DecoderEntry {
                name: name.into(),
                factory,
            });
    }

    /// 注销全部解码器
    pub fn unregister_all(&mut self) {
        self.decoders.clear();
    }

    /// 是否注册了指定类型的解码器
    pub fn contains(&self, codec_type: CodecType) -> bool {
        self.decoders
            .get(&codec_type)
            .is_some_and(|entries| !entries.is_empty())
    }

    /// 按配置打开解码器
    ///
    /// 未注册的类型与无效配置都返回 `DecoderOpenFailure`.
    pub fn open(&self, config: &DecoderConfig) -> SquawkResult<Box<dyn SimpleDecoder>> {
        let codec_type = config.codec_type();
        config
            .validate()
            .map_err(|e| SquawkError::DecoderOpenFailure(format!("{codec_type}: {e}")))?;
        // 使用第一个注册的解码器 (优先级最高)
        let entry = self
            .decoders
            .get(&codec_type)
            .and_then(|entries| entries.first())
            .ok_or_else(|| {
                SquawkError::DecoderOpenFailure(format!("未找到 {codec_type} 的解码器"))
            })?;
        debug!("打开解码器: {} ({codec_type})", entry.name);
        (entry.factory)(config)
    }

    /// 获取所有已注册的解码器名称
    pub fn list(&self) -> Vec<(CodecType, &str)> {
        let mut result = Vec::new();
        for (codec_type, entries) in &self.decoders {
            for entry in entries {
                result.push((*codec_type, entry.name.as_str()));
            }
        }
        result
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
