//! Squawk 解码渲染循环性能基准测试.
//!
//! 覆盖解码引擎主循环、音量缩放与位宽扩展.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use squawk::codec::DecoderConfig;
use squawk::render::{PlaybackConfig, PlaybackSession, scale_volume_s16, widen_s16_to_s32};

/// 生成 S16 单声道扫频数据
fn make_s16_asset(nb_samples: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(nb_samples * 2);
    for i in 0..nb_samples {
        let v = ((i % 256) as i16).wrapping_mul(100);
        data.extend_from_slice(&v.to_le_bytes());
    }
    data
}

fn pcm_session(volume: f32) -> PlaybackSession {
    let config = PlaybackConfig {
        volume,
        decoder: DecoderConfig::Pcm {
            sample_rate: 16000,
            channels: 1,
            frame_samples: 1024,
        },
        ..Default::default()
    };
    match PlaybackSession::new(config) {
        Ok(session) => session,
        Err(e) => panic!("创建会话失败: {e}"),
    }
}

fn bench_decode_loop(c: &mut Criterion) {
    // 1 秒 16kHz 单声道
    let asset = make_s16_asset(16000);
    let session = pcm_session(0.8);
    c.bench_function("decode_loop_pcm_1s", |b| {
        b.iter(|| {
            let report = session.run_software(black_box(&asset)).unwrap();
            black_box(report.stats.total_decoded);
        });
    });

    if let Ok(report) = session.run_software(&asset) {
        if let Some(cpu) = report.cpu_usage_percent() {
            println!("decode_loop_pcm_1s: 解码耗时占比 {cpu:.4}%");
        }
    }
}

fn bench_scale_volume(c: &mut Criterion) {
    let pcm = make_s16_asset(4096);
    c.bench_function("scale_volume_s16_4096", |b| {
        b.iter(|| {
            let mut buf = pcm.clone();
            scale_volume_s16(black_box(&mut buf), black_box(1.5));
            black_box(buf);
        });
    });
}

fn bench_widen(c: &mut Criterion) {
    let pcm = make_s16_asset(4096);
    let mut wire = Vec::new();
    c.bench_function("widen_s16_to_s32_4096", |b| {
        b.iter(|| {
            black_box(widen_s16_to_s32(black_box(&pcm), &mut wire));
        });
    });
}

criterion_group!(benches, bench_decode_loop, bench_scale_volume, bench_widen);
criterion_main!(benches);
