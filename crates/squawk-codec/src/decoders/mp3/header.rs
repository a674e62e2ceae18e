//! MP3 帧头解析

/// MPEG 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

/// MP3 帧头 (仅 Layer III)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mp3Header {
    pub version: MpegVersion,
    pub has_crc: bool,
    /// 码率 (bps)
    pub bitrate: u32,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    pub padding: bool,
    /// 声道数 (单声道模式为 1, 其余为 2)
    pub channels: u32,
    /// 帧大小 (字节, 含帧头)
    pub frame_size: usize,
}

impl Mp3Header {
    /// 帧头字节数
    pub const SIZE: usize = 4;

    /// 解析 4 字节的帧头, 非法或非 Layer III 帧头返回 `None`
    pub fn parse(bytes: [u8; 4]) -> Option<Self> {
        // AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
        let header = u32::from_be_bytes(bytes);
        if (header & 0xFFE0_0000) != 0xFFE0_0000 {
            return None;
        }

        let version = match (header >> 19) & 0x3 {
            3 => MpegVersion::Mpeg1,
            2 => MpegVersion::Mpeg2,
            0 => MpegVersion::Mpeg25,
            _ => return None,
        };

        // 仅支持 Layer III
        if (header >> 17) & 0x3 != 1 {
            return None;
        }

        let has_crc = ((header >> 16) & 0x1) == 0;

        let bitrate_idx = ((header >> 12) & 0xF) as usize;
        // 0 为自由格式, 15 为保留值
        if bitrate_idx == 0 || bitrate_idx == 15 {
            return None;
        }

        let samplerate_idx = ((header >> 10) & 0x3) as usize;
        if samplerate_idx == 3 {
            return None;
        }

        let padding = ((header >> 9) & 0x1) == 1;
        let channels = if (header >> 6) & 0x3 == 3 { 1 } else { 2 };

        let bitrate = Self::lookup_bitrate(version, bitrate_idx) * 1000;
        let sample_rate = Self::lookup_samplerate(version, samplerate_idx);

        // MPEG1: 144 * bitrate / samplerate + padding
        // MPEG2/2.5: 72 * bitrate / samplerate + padding
        let coeff = if version == MpegVersion::Mpeg1 { 144 } else { 72 };
        let frame_size = (coeff * bitrate / sample_rate + u32::from(padding)) as usize;

        Some(Self {
            version,
            has_crc,
            bitrate,
            sample_rate,
            padding,
            channels,
            frame_size,
        })
    }

    /// 每帧采样数 (每声道)
    pub const fn samples_per_frame(&self) -> usize {
        match self.version {
            MpegVersion::Mpeg1 => 1152,
            MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => 576,
        }
    }

    /// 解码为交错 S16 后的字节数
    pub const fn pcm_bytes(&self) -> usize {
        self.samples_per_frame() * self.channels as usize * 2
    }

    fn lookup_bitrate(version: MpegVersion, index: usize) -> u32 {
        // kbps
        const V1_L3: [u32; 16] = [
            0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
        ];
        const V2_L3: [u32; 16] = [
            0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0,
        ];

        match version {
            MpegVersion::Mpeg1 => V1_L3[index],
            MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => V2_L3[index],
        }
    }

    fn lookup_samplerate(version: MpegVersion, index: usize) -> u32 {
        match version {
            MpegVersion::Mpeg1 => [44100, 48000, 32000][index],
            MpegVersion::Mpeg2 => [22050, 24000, 16000][index],
            MpegVersion::Mpeg25 => [11025, 12000, 8000][index],
        }
    }
}

/// 查找同步字, 返回偏移量
pub fn find_sync_word(data: &[u8]) -> Option<usize> {
    if data.len() < 2 {
        return None;
    }
    (0..data.len() - 1).find(|&i| data[i] == 0xFF && (data[i + 1] & 0xE0) == 0xE0)
}

/// 解析 ID3v2 标签总长度 (含 10 字节标签头和可选的标签尾)
pub fn id3v2_tag_size(data: &[u8]) -> Option<usize> {
    if data.len() < 10 || &data[..3] != b"ID3" {
        return None;
    }
    // 长度为 4 字节 synchsafe 整数, 每字节仅低 7 位有效
    let size = data[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | usize::from(b & 0x7F));
    let footer = if data[5] & 0x10 != 0 { 10 } else { 0 };
    Some(10 + size + footer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_解析mpeg1单声道帧头() {
        let header = Mp3Header::parse([0xFF, 0xFB, 0x90, 0xC4]).unwrap();
        assert_eq!(header.version, MpegVersion::Mpeg1);
        assert_eq!(header.bitrate, 128_000);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.channels, 1);
        assert!(!header.has_crc);
        assert_eq!(header.frame_size, 417);
        assert_eq!(header.pcm_bytes(), 1152 * 2);
    }

    #[test]
    fn test_解析mpeg2立体声帧头() {
        // MPEG2, Layer III, 64kbps, 22050Hz, 带填充, 联合立体声
        let header = Mp3Header::parse([0xFF, 0xF3, 0x82, 0x44]).unwrap();
        assert_eq!(header.version, MpegVersion::Mpeg2);
        assert_eq!(header.sample_rate, 22050);
        assert_eq!(header.channels, 2);
        assert_eq!(header.frame_size, 72 * 64_000 / 22050 + 1);
        assert_eq!(header.samples_per_frame(), 576);
    }

    #[test]
    fn test_拒绝非法帧头() {
        // Layer I
        assert!(Mp3Header::parse([0xFF, 0xFF, 0x90, 0xC4]).is_none());
        // 自由格式码率
        assert!(Mp3Header::parse([0xFF, 0xFB, 0x00, 0xC4]).is_none());
        // 保留采样率
        assert!(Mp3Header::parse([0xFF, 0xFB, 0x9C, 0xC4]).is_none());
        assert!(Mp3Header::parse([0x00, 0x00, 0x00, 0x00]).is_none());
    }

    #[test]
    fn test_查找同步字与id3长度() {
        assert_eq!(find_sync_word(&[0x00, 0x12, 0xFF, 0xFB]), Some(2));
        assert_eq!(find_sync_word(&[0xFF]), None);
        assert_eq!(find_sync_word(&[0xFF, 0x00, 0x01]), None);

        let tag = [b'I', b'D', b'3', 4, 0, 0, 0, 0, 0x01, 0x7F];
        assert_eq!(id3v2_tag_size(&tag), Some(10 + 0xFF));
        assert_eq!(id3v2_tag_size(&[0u8; 10]), None);
    }
}
