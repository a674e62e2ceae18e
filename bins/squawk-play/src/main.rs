//! squawk-play - 播放内嵌提示音
//!
//! 将编译期内嵌的音频资源解码后送入默认音频设备. 也可以通过 `--asset`
//! 播放外部文件, 解码参数由配置文件给出.

mod audio;
mod logging;
mod pins;

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use squawk_codec::DecoderConfig;
use squawk_render::{GainLevel, PlaybackConfig, PlaybackSession, SessionOutcome, SinkHandle};

use audio::CpalChannel;
use pins::VirtualPins;

/// 内嵌资源: 16kHz 单声道 S16LE 扫频提示音
static EMBEDDED_ASSET: &[u8] = include_bytes!("../assets/squawk.pcm");

/// 内嵌资源的采样率
const EMBEDDED_SAMPLE_RATE: u32 = 16000;

/// 虚拟功放使能引脚
const POWER_PIN: u32 = 13;
/// 虚拟增益引脚
const GAIN_PIN: u32 = 12;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GainArg {
    /// 3dB
    Low,
    /// 9dB
    High,
}

impl From<GainArg> for GainLevel {
    fn from(arg: GainArg) -> Self {
        match arg {
            GainArg::Low => GainLevel::Low,
            GainArg::High => GainLevel::High,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "squawk-play", version, about = "播放内嵌提示音")]
struct Cli {
    /// 配置文件路径 (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 外部资源文件 (默认播放内嵌资源)
    #[arg(short, long)]
    asset: Option<PathBuf>,

    /// 软件音量 (0.0 ~ 4.0)
    #[arg(long)]
    volume: Option<f32>,

    /// 功放增益档位
    #[arg(long, value_enum)]
    gain: Option<GainArg>,

    /// 解码时长上限 (秒)
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// 只解码并做软件音量处理, 不打开音频设备
    #[arg(long)]
    software: bool,

    /// 打印生效的配置并退出
    #[arg(long)]
    dump_config: bool,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// 内嵌资源对应的默认配置
fn embedded_config() -> PlaybackConfig {
    let mut config = PlaybackConfig {
        decoder: DecoderConfig::Pcm {
            sample_rate: EMBEDDED_SAMPLE_RATE,
            channels: 1,
            frame_samples: 1024,
        },
        ..Default::default()
    };
    config.sink.sample_rate = EMBEDDED_SAMPLE_RATE;
    config
}

/// 加载配置文件并应用命令行覆盖
fn load_config(cli: &Cli) -> Result<PlaybackConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
            PlaybackConfig::from_toml_str(&text)?
        }
        None => {
            if cli.asset.is_some() {
                bail!("播放外部资源时必须通过 --config 指定解码参数");
            }
            embedded_config()
        }
    };
    if let Some(volume) = cli.volume {
        config.volume = volume;
    }
    if let Some(gain) = cli.gain {
        config.gain = gain.into();
    }
    if let Some(secs) = cli.deadline_secs {
        config.engine.deadline_ms = secs.saturating_mul(1000);
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    if cli.dump_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let external;
    let asset: &[u8] = match &cli.asset {
        Some(path) => {
            external = std::fs::read(path)
                .with_context(|| format!("读取资源文件失败: {}", path.display()))?;
            &external
        }
        None => EMBEDDED_ASSET,
    };

    let port = config.sink.port;
    let session = PlaybackSession::new(config)?;
    let report = if cli.software {
        session.run_software(asset)?
    } else {
        let mut sink = SinkHandle::acquire(
            port,
            CpalChannel::new(),
            VirtualPins::new(POWER_PIN, GAIN_PIN),
        )?;
        session.run(asset, &mut sink)?
    };

    match &report.outcome {
        SessionOutcome::Completed => info!("内嵌资源播放成功"),
        SessionOutcome::DeadlineReached => warn!("播放超过时长上限, 已提前结束"),
        SessionOutcome::Failed(_) => {}
    }
    report.into_result().context("播放失败")?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init("squawk-play", cli.verbose) {
        eprintln!("警告: {e:#}");
    }

    info!("播放开始");
    let result = run(&cli);
    info!("播放结束");
    if let Err(e) = result {
        error!("{e:#}");
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}
