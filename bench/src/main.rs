use std::time::{Duration, Instant};

use anyhow::Context as _;
use hdrblend::{
    BlendMode, EngineConfig, HdrEngine, ImageJpegBackend, InMemoryFrameSource, JpegBackend,
    PixelFormat, WeightMatrix,
};
use serde_json::json;
use sha2::Digest as _;

#[derive(Clone, Debug)]
struct BenchArgs {
    width: u32,
    height: u32,
    frames: u64,
    window: usize,
    mode: Mode,
    format: PixelFormat,
    quality: u8,
    warmup: u32,
    repeats: u32,
    threads: Option<usize>,
    requests: usize,
    raw: bool,
    json: bool,
}

#[derive(Clone, Copy, Debug)]
enum Mode {
    Average,
    Weighted,
}

#[derive(Clone, Debug, Default)]
struct RunMetrics {
    get_total: Duration,
    get_max: Duration,
    bytes_out: u64,
    wall_total: Duration,
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let args = parse_args()?;

    if args.width == 0 || args.height == 0 {
        anyhow::bail!("--width/--height must be > 0");
    }
    if !args.width.is_multiple_of(2) || !args.height.is_multiple_of(2) {
        anyhow::bail!("--width/--height must be even (I420 chroma planes)");
    }
    if args.frames == 0 {
        anyhow::bail!("--frames must be > 0");
    }
    if args.requests == 0 {
        anyhow::bail!("--requests must be >= 1");
    }

    let t0 = Instant::now();
    let source = synth_frames(&args)?;
    eprintln!(
        "synthesized {} frames ({}x{}) in {:.3}s",
        args.frames,
        args.width,
        args.height,
        t0.elapsed().as_secs_f64()
    );

    let mode = match args.mode {
        Mode::Average => BlendMode::Average,
        Mode::Weighted => BlendMode::Weighted(WeightMatrix::equal(args.window, 1)?),
    };
    let cfg = EngineConfig {
        window_count: args.window,
        mode,
        quality: args.quality,
        decode_format: args.format,
        max_width: args.width,
        max_height: args.height,
        threads: args.threads,
        ..EngineConfig::default()
    };
    let engine = HdrEngine::new(ImageJpegBackend::new(), source, cfg)?;

    if args.warmup > 0 {
        eprintln!("warmup: {} run(s)", args.warmup);
        for i in 0..args.warmup {
            let _ = run_once(&args, &engine, i, /*is_warmup=*/ true)?;
        }
    }

    eprintln!(
        "bench: {repeats} run(s) ({profile} build), {frames} frames/run, window={window}, mode={mode:?}, format={format:?}, threads={threads}, requests={requests}, encode={encode}",
        repeats = args.repeats,
        profile = if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
        frames = args.frames,
        window = args.window,
        mode = args.mode,
        format = args.format,
        threads = args
            .threads
            .map(|n| n.to_string())
            .unwrap_or_else(|| "auto".to_string()),
        requests = args.requests,
        encode = if args.raw { "no" } else { "yes" },
    );

    let mut runs = Vec::<RunMetrics>::with_capacity(args.repeats as usize);
    for i in 0..args.repeats {
        runs.push(run_once(&args, &engine, i, /*is_warmup=*/ false)?);
    }

    let last = if args.raw {
        engine.get_raw(args.frames - 1)?.to_vec()
    } else {
        engine.get(args.frames - 1)?.to_vec()
    };
    eprintln!("last frame sha256: {}", sha256_hex(&last));

    report_percentiles(&runs);

    if args.json {
        let codec = engine.codec_pool().stats();
        let buffers = engine.buffer_pool().stats();
        let stats = engine.stats();
        let summary = json!({
            "frames_per_run": args.frames,
            "runs": runs.len(),
            "frames_produced": stats.frames_produced,
            "bytes_encoded": stats.bytes_encoded,
            "decoders_created": codec.decoders.created,
            "encoders_created": codec.encoders.created,
            "buffer_allocs": buffers.alloc_buffers,
            "buffer_reuses": buffers.reused,
            "last_frame_sha256": sha256_hex(&last),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn synth_frames(args: &BenchArgs) -> anyhow::Result<InMemoryFrameSource> {
    let backend = ImageJpegBackend::new();
    let (w, h) = (args.width as usize, args.height as usize);
    let mut gray = vec![0u8; w * h];
    let mut jpeg = vec![0u8; backend.max_encoded_len(args.width, args.height, 1)];
    let source = InMemoryFrameSource::new();

    for f in 0..args.frames {
        // Diagonal ramp whose exposure drifts frame to frame.
        let gain = 64 + (f % 8) as usize * 24;
        for (i, px) in gray.iter_mut().enumerate() {
            let (x, y) = (i % w, i / w);
            *px = (((x + y) * gain) / (w + h)).min(255) as u8;
        }
        let n = backend
            .encode_gray(args.width, args.height, 90, &gray, &mut jpeg)
            .with_context(|| format!("encode synthetic frame {f}"))?;
        source.insert(f, jpeg[..n].to_vec());
    }
    Ok(source)
}

fn run_once(
    args: &BenchArgs,
    engine: &HdrEngine<ImageJpegBackend, InMemoryFrameSource>,
    run_idx: u32,
    is_warmup: bool,
) -> anyhow::Result<RunMetrics> {
    let wall = Instant::now();
    let ids = (0..args.frames).collect::<Vec<_>>();
    let per_thread = ids.len().div_ceil(args.requests);

    let partials = std::thread::scope(|s| {
        let handles = ids
            .chunks(per_thread)
            .map(|chunk| {
                s.spawn(move || -> anyhow::Result<RunMetrics> {
                    let mut m = RunMetrics::default();
                    for &id in chunk {
                        let t = Instant::now();
                        let img = if args.raw {
                            engine.get_raw(id)?
                        } else {
                            engine.get(id)?
                        };
                        let dt = t.elapsed();
                        m.get_total += dt;
                        m.get_max = m.get_max.max(dt);
                        m.bytes_out += img.header().len as u64;
                    }
                    Ok(m)
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .map_err(|_| anyhow::anyhow!("bench request thread panicked"))?
            })
            .collect::<anyhow::Result<Vec<_>>>()
    })?;

    let mut m = RunMetrics::default();
    for p in partials {
        m.get_total += p.get_total;
        m.get_max = m.get_max.max(p.get_max);
        m.bytes_out += p.bytes_out;
    }
    m.wall_total = wall.elapsed();

    if !is_warmup {
        eprintln!(
            "run {run_idx:03}: wall={wall:.3}s get_sum={get:.3}s get_max={max:.3}ms out={kib}KiB fps={fps:.1}",
            wall = m.wall_total.as_secs_f64(),
            get = m.get_total.as_secs_f64(),
            max = m.get_max.as_secs_f64() * 1000.0,
            kib = m.bytes_out / 1024,
            fps = args.frames as f64 / m.wall_total.as_secs_f64().max(f64::EPSILON),
        );
    }

    Ok(m)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn parse_args() -> anyhow::Result<BenchArgs> {
    let mut args = std::env::args().skip(1);

    let mut out = BenchArgs {
        width: 640,
        height: 360,
        frames: 120,
        window: 3,
        mode: Mode::Average,
        format: PixelFormat::I420,
        quality: 90,
        warmup: 1,
        repeats: 20,
        threads: None,
        requests: 1,
        raw: false,
        json: false,
    };

    while let Some(a) = args.next() {
        match a.as_str() {
            "--width" => out.width = parse_u32(args.next(), "--width")?,
            "--height" => out.height = parse_u32(args.next(), "--height")?,
            "--frames" => out.frames = u64::from(parse_u32(args.next(), "--frames")?),
            "--window" => out.window = parse_usize(args.next(), "--window")?,
            "--quality" => {
                out.quality = u8::try_from(parse_u32(args.next(), "--quality")?)
                    .context("--quality must fit in 1..=100")?
            }
            "--warmup" => out.warmup = parse_u32(args.next(), "--warmup")?,
            "--repeats" => out.repeats = parse_u32(args.next(), "--repeats")?,
            "--threads" => out.threads = Some(parse_usize(args.next(), "--threads")?),
            "--requests" => out.requests = parse_usize(args.next(), "--requests")?,
            "--mode" => {
                let v = args.next().ok_or_else(|| {
                    anyhow::anyhow!("missing value for --mode (average|weighted)")
                })?;
                out.mode = match v.as_str() {
                    "average" => Mode::Average,
                    "weighted" => Mode::Weighted,
                    _ => anyhow::bail!("unknown --mode '{v}' (expected average|weighted)"),
                };
            }
            "--format" => {
                let v = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("missing value for --format (gray|i420)"))?;
                out.format = match v.as_str() {
                    "gray" => PixelFormat::Gray8,
                    "i420" => PixelFormat::I420,
                    _ => anyhow::bail!("unknown --format '{v}' (expected gray|i420)"),
                };
            }
            "--raw" => out.raw = true,
            "--json" => out.json = true,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => anyhow::bail!("unknown arg '{a}' (try --help)"),
        }
    }

    Ok(out)
}

fn print_help() {
    eprintln!(
        r#"hdrblend-bench

Blends every frame of a synthetic JPEG sequence repeatedly and reports p50/p90/p99 per stage.

Usage:
  cargo run -q --release
  cargo run -q --release -- --frames 240 --window 5 --mode weighted
  cargo run -q --release -- --requests 4 --threads 8

Args:
  --width N        (default 640; must be even)
  --height N       (default 360; must be even)
  --frames N       (default 120)
  --window N       (default 3; 2..=10)
  --mode M         average|weighted (default average)
  --format F       gray|i420 decode layout (default i420)
  --quality N      output JPEG quality (default 90)
  --warmup N       (default 1)
  --repeats N      (default 20)
  --threads N      engine worker threads (default auto)
  --requests N     concurrent callers of get (default 1)
  --raw            skip the final encode (get_raw)
  --json           print a JSON summary to stdout
"#
    );
}

fn parse_u32(v: Option<String>, flag: &str) -> anyhow::Result<u32> {
    let v = v.ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))?;
    v.parse::<u32>()
        .with_context(|| format!("parse {flag} value '{v}'"))
}

fn parse_usize(v: Option<String>, flag: &str) -> anyhow::Result<usize> {
    let v = v.ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))?;
    v.parse::<usize>()
        .with_context(|| format!("parse {flag} value '{v}'"))
}

fn report_percentiles(runs: &[RunMetrics]) {
    type Getter = fn(&RunMetrics) -> Duration;
    type Field = (&'static str, Getter);

    fn collect(runs: &[RunMetrics], f: fn(&RunMetrics) -> Duration) -> Vec<Duration> {
        let mut v = runs.iter().map(f).collect::<Vec<_>>();
        v.sort_by_key(|d| d.as_nanos());
        v
    }

    fn p(v: &[Duration], p: f64) -> Duration {
        if v.is_empty() {
            return Duration::ZERO;
        }
        let n = v.len();
        let rank = (p * (n as f64)).ceil().clamp(1.0, n as f64) as usize;
        v[rank - 1]
    }

    fn fmt_ms(d: Duration) -> String {
        format!("{:.3}ms", d.as_secs_f64() * 1000.0)
    }

    let fields: &[Field] = &[
        ("get_total", |m| m.get_total),
        ("get_max", |m| m.get_max),
        ("wall_total", |m| m.wall_total),
    ];

    eprintln!("\npercentiles across runs (p50/p90/p99):");
    for (name, getter) in fields {
        let v = collect(runs, *getter);
        let p50 = p(&v, 0.50);
        let p90 = p(&v, 0.90);
        let p99 = p(&v, 0.99);
        eprintln!(
            "  {name:12} p50={p50:>10}  p90={p90:>10}  p99={p99:>10}",
            name = *name,
            p50 = fmt_ms(p50),
            p90 = fmt_ms(p90),
            p99 = fmt_ms(p99)
        );
    }
}
