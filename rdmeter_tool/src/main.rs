use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use rdmeter::video::{psnr, ssim, Decoder, SequenceMetrics, VideoDetails, YuvDecoder};
use rdmeter::MetricsError;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

const METRICS: [&str; 3] = ["psnr", "ssim", "msssim"];

fn main() -> Result<(), String> {
    let cli = build_app().get_matches();
    match cli.subcommand() {
        ("compute", Some(args)) => {
            init_logger(args.is_present("VERBOSE"));
            let config = ComputeConfig::from_matches(args)?;
            config.validate()?;
            run_compute(&config)
        }
        _ => Err("No subcommand given, see --help".to_owned()),
    }
}

fn build_app() -> App<'static, 'static> {
    App::new("rdmeter")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("VERBOSE")
                .help("Enable verbose output")
                .short("v")
                .long("verbose")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("compute")
                .about("Compute RD metrics between reference and distorted videos")
                .arg(
                    Arg::with_name("REF")
                        .help("Path to reference YUV file")
                        .short("r")
                        .long("ref")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("DIST")
                        .help("Path to distorted YUV file")
                        .short("d")
                        .long("dist")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("OUTPUT")
                        .help("Output JSON file path")
                        .short("o")
                        .long("output")
                        .takes_value(true)
                        .default_value("results/results.json"),
                )
                .arg(
                    Arg::with_name("WIDTH")
                        .help("Video width in pixels")
                        .long("width")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("HEIGHT")
                        .help("Video height in pixels")
                        .long("height")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("FRAMES")
                        .help("Maximum number of frames to process (negative for all)")
                        .short("f")
                        .long("frames")
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .default_value("-1"),
                )
                .arg(
                    Arg::with_name("METRIC")
                        .help("Run only one metric, instead of the entire suite")
                        .short("m")
                        .long("metric")
                        .takes_value(true)
                        .possible_values(&METRICS),
                )
                .arg(
                    Arg::with_name("QUIET")
                        .help("Do not output to stdout")
                        .short("q")
                        .long("quiet"),
                ),
        )
}

fn init_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

#[derive(Debug, Clone)]
struct ComputeConfig {
    reference: PathBuf,
    distorted: PathBuf,
    output: PathBuf,
    width: usize,
    height: usize,
    frame_limit: Option<usize>,
    metric: Option<String>,
    quiet: bool,
}

impl ComputeConfig {
    fn from_matches(args: &ArgMatches) -> Result<Self, String> {
        let frames = parse_arg::<i64>(args, "FRAMES")?;
        Ok(ComputeConfig {
            reference: PathBuf::from(args.value_of("REF").unwrap_or_default()),
            distorted: PathBuf::from(args.value_of("DIST").unwrap_or_default()),
            output: PathBuf::from(args.value_of("OUTPUT").unwrap_or_default()),
            width: parse_arg(args, "WIDTH")?,
            height: parse_arg(args, "HEIGHT")?,
            frame_limit: if frames < 0 {
                None
            } else {
                Some(frames as usize)
            },
            metric: args.value_of("METRIC").map(str::to_owned),
            quiet: args.is_present("QUIET"),
        })
    }

    fn validate(&self) -> Result<(), String> {
        if !self.reference.exists() {
            return Err(format!(
                "Reference file does not exist: {}",
                self.reference.display()
            ));
        }
        if !self.distorted.exists() {
            return Err(format!(
                "Distorted file does not exist: {}",
                self.distorted.display()
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err("Width and height must be positive".to_owned());
        }
        let details = VideoDetails {
            width: self.width,
            height: self.height,
        };
        if details.checked_frame_size().is_none() {
            return Err(format!(
                "Frame dimensions are too large: {}x{}",
                self.width, self.height
            ));
        }
        Ok(())
    }

    fn runs(&self, metric: &str) -> bool {
        self.metric.as_deref().map_or(true, |selected| selected == metric)
    }
}

fn parse_arg<T: FromStr>(args: &ArgMatches, name: &str) -> Result<T, String> {
    let value = args.value_of(name).unwrap_or_default();
    value
        .parse()
        .map_err(|_| format!("Invalid value for --{}: {}", name.to_lowercase(), value))
}

fn run_compute(config: &ComputeConfig) -> Result<(), String> {
    info!(
        "Comparing {} against {}",
        config.distorted.display(),
        config.reference.display()
    );
    let start_time = Instant::now();
    let progress = progress_bar(config);
    let progress_fn = |frameno: usize| {
        progress.set_position(frameno as u64);
    };

    let mut report = Report {
        frame_count: 0,
        width: config.width,
        height: config.height,
        metrics: MetricsResults::default(),
        details: DetailedResults::default(),
    };

    if config.runs("psnr") {
        progress.set_prefix("Computing PSNR");
        progress.reset();
        let result = Psnr::run(config, progress_fn)?;
        report.frame_count = result.frames;
        report.metrics.psnr_y = Some(result.average);
        report.details.psnr = Some(result);
    }

    if config.runs("ssim") {
        progress.set_prefix("Computing SSIM");
        progress.reset();
        let result = Ssim::run(config, progress_fn)?;
        report.frame_count = result.frames;
        report.metrics.ssim_y = Some(result.average);
        report.details.ssim = Some(result);
    }

    if config.runs("msssim") {
        progress.set_prefix("Computing MSSSIM");
        progress.reset();
        let result = MsSsim::run(config, progress_fn)?;
        report.frame_count = result.frames;
        report.metrics.msssim_y = Some(result.average);
        report.details.msssim = Some(result);
    }

    progress.finish_and_clear();
    let elapsed = start_time.elapsed();

    if !config.quiet {
        report.print(elapsed.as_millis());
    }
    write_report(&config.output, &report)?;
    info!("Results written to {}", config.output.display());

    Ok(())
}

fn progress_bar(config: &ComputeConfig) -> ProgressBar {
    if config.quiet || !console::user_attended() {
        return ProgressBar::hidden();
    }
    match total_frames(config) {
        Ok(total) => ProgressBar::new(total as u64)
            .with_style(ProgressStyle::default_bar().template("{prefix} - Frame {pos}/{len}")),
        Err(err) => {
            debug!("Could not count input frames: {}", err);
            ProgressBar::new_spinner()
                .with_style(ProgressStyle::default_spinner().template("{prefix} - Frame {pos}"))
        }
    }
}

fn total_frames(config: &ComputeConfig) -> Result<usize, String> {
    let dec1 = YuvDecoder::open(&config.reference, config.width, config.height)?;
    let dec2 = YuvDecoder::open(&config.distorted, config.width, config.height)?;
    let total = dec1.count_frames()?.min(dec2.count_frames()?);
    Ok(config.frame_limit.map_or(total, |limit| limit.min(total)))
}

fn write_report(path: &Path, report: &Report) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| err.to_string())?;
        }
    }
    let file = File::create(path)
        .map_err(|err| format!("Failed to open output file {}: {}", path.display(), err))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report).map_err(|err| err.to_string())?;
    writeln!(writer).map_err(|err| err.to_string())?;
    writer.flush().map_err(|err| err.to_string())
}

#[derive(Debug, Serialize)]
struct Report {
    frame_count: usize,
    width: usize,
    height: usize,
    metrics: MetricsResults,
    details: DetailedResults,
}

impl Report {
    fn print(&self, elapsed_ms: u128) {
        println!("Processed {} frames", style(self.frame_count).cyan());
        print_result("PSNR (Y)", self.metrics.psnr_y, " dB");
        print_result("SSIM (Y)", self.metrics.ssim_y, "");
        print_result("MSSSIM (Y)", self.metrics.msssim_y, "");
        println!("Processing time: {} ms", elapsed_ms);
    }
}

#[derive(Debug, Default, Serialize)]
struct MetricsResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    psnr_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssim_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    msssim_y: Option<f64>,
}

#[derive(Debug, Default, Serialize)]
struct DetailedResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    psnr: Option<SequenceMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssim: Option<SequenceMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    msssim: Option<SequenceMetrics>,
}

fn print_result(header: &str, result: Option<f64>, unit: &str) {
    if let Some(result) = result {
        println!(
            "     {:<10} →  {:<8.4}{}",
            style(header).cyan(),
            result,
            unit
        );
    }
}

trait CliMetric {
    fn run<F: Fn(usize)>(
        config: &ComputeConfig,
        progress_callback: F,
    ) -> Result<SequenceMetrics, String> {
        let mut dec1 = YuvDecoder::open(&config.reference, config.width, config.height)?;
        let mut dec2 = YuvDecoder::open(&config.distorted, config.width, config.height)?;
        Self::calculate_video_metric(&mut dec1, &mut dec2, config.frame_limit, progress_callback)
            .map_err(|err| err.to_string())
    }

    fn calculate_video_metric<D: Decoder, F: Fn(usize)>(
        dec1: &mut D,
        dec2: &mut D,
        frame_limit: Option<usize>,
        progress_callback: F,
    ) -> Result<SequenceMetrics, MetricsError>;
}

struct Psnr;

impl CliMetric for Psnr {
    fn calculate_video_metric<D: Decoder, F: Fn(usize)>(
        dec1: &mut D,
        dec2: &mut D,
        frame_limit: Option<usize>,
        progress_callback: F,
    ) -> Result<SequenceMetrics, MetricsError> {
        psnr::calculate_video_psnr(dec1, dec2, frame_limit, progress_callback)
    }
}

struct Ssim;

impl CliMetric for Ssim {
    fn calculate_video_metric<D: Decoder, F: Fn(usize)>(
        dec1: &mut D,
        dec2: &mut D,
        frame_limit: Option<usize>,
        progress_callback: F,
    ) -> Result<SequenceMetrics, MetricsError> {
        ssim::calculate_video_ssim(dec1, dec2, frame_limit, progress_callback)
    }
}

struct MsSsim;

impl CliMetric for MsSsim {
    fn calculate_video_metric<D: Decoder, F: Fn(usize)>(
        dec1: &mut D,
        dec2: &mut D,
        frame_limit: Option<usize>,
        progress_callback: F,
    ) -> Result<SequenceMetrics, MetricsError> {
        ssim::calculate_video_msssim(dec1, dec2, frame_limit, progress_callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute_matches(extra: &[&str]) -> ComputeConfig {
        let mut argv = vec![
            "rdmeter", "compute", "-r", "ref.yuv", "-d", "dist.yuv", "--width", "64", "--height",
            "32",
        ];
        argv.extend_from_slice(extra);
        let matches = build_app().get_matches_from(argv);
        let (_, args) = matches.subcommand();
        ComputeConfig::from_matches(args.unwrap()).unwrap()
    }

    fn write_yuv(path: &Path, width: usize, height: usize, luma: &[u8]) {
        let chroma = (width / 2) * (height / 2);
        let mut bytes = Vec::new();
        for &value in luma {
            bytes.extend(vec![value; width * height]);
            bytes.extend(vec![128; 2 * chroma]);
        }
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn parses_defaults() {
        let config = compute_matches(&[]);
        assert_eq!(config.reference, PathBuf::from("ref.yuv"));
        assert_eq!(config.distorted, PathBuf::from("dist.yuv"));
        assert_eq!(config.output, PathBuf::from("results/results.json"));
        assert_eq!((config.width, config.height), (64, 32));
        assert_eq!(config.frame_limit, None);
        assert!(METRICS.iter().all(|metric| config.runs(metric)));
        assert!(!config.quiet);
    }

    #[test]
    fn parses_frame_limit_and_metric() {
        let config = compute_matches(&["-f", "10", "--metric", "ssim", "-q"]);
        assert_eq!(config.frame_limit, Some(10));
        assert!(config.runs("ssim"));
        assert!(!config.runs("psnr"));
        assert!(config.quiet);

        let config = compute_matches(&["--frames", "-1"]);
        assert_eq!(config.frame_limit, None);
        let config = compute_matches(&["--frames", "-7"]);
        assert_eq!(config.frame_limit, None);
        let config = compute_matches(&["--frames", "0"]);
        assert_eq!(config.frame_limit, Some(0));
    }

    #[test]
    fn rejects_bad_dimensions() {
        let matches = build_app().get_matches_from(vec![
            "rdmeter", "compute", "-r", "a", "-d", "b", "--width", "wide", "--height", "32",
        ]);
        let (_, args) = matches.subcommand();
        assert!(ComputeConfig::from_matches(args.unwrap()).is_err());
    }

    #[test]
    fn missing_inputs_fail_validation() {
        let config = compute_matches(&[]);
        let err = config.validate().unwrap_err();
        assert!(err.starts_with("Reference file does not exist"));
    }

    #[test]
    fn oversized_dimensions_fail_validation() {
        let dir = std::env::temp_dir().join(format!("rdmeter-tool-size-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let input = dir.join("input.yuv");
        write_yuv(&input, 2, 2, &[0]);

        let config = ComputeConfig {
            reference: input.clone(),
            distorted: input,
            output: dir.join("results.json"),
            width: usize::MAX / 2,
            height: 3,
            frame_limit: None,
            metric: None,
            quiet: true,
        };
        let err = config.validate().unwrap_err();
        assert!(err.starts_with("Frame dimensions are too large"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zero_frame_limit_writes_empty_report() {
        let dir = std::env::temp_dir().join(format!("rdmeter-tool-zero-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let input = dir.join("input.yuv");
        write_yuv(&input, 32, 32, &[10, 20]);

        let config = ComputeConfig {
            reference: input.clone(),
            distorted: input,
            output: dir.join("results.json"),
            width: 32,
            height: 32,
            frame_limit: Some(0),
            metric: Some("psnr".to_owned()),
            quiet: true,
        };
        run_compute(&config).unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&config.output).unwrap()).unwrap();
        assert_eq!(report["frame_count"], 0);
        assert_eq!(report["metrics"]["psnr_y"], 0.0);
        assert!(report["metrics"].get("ssim_y").is_none());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn writes_json_report() {
        let dir = std::env::temp_dir().join(format!("rdmeter-tool-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let reference = dir.join("ref.yuv");
        let distorted = dir.join("dist.yuv");
        write_yuv(&reference, 32, 32, &[100, 100, 100]);
        write_yuv(&distorted, 32, 32, &[150, 150]);

        let config = ComputeConfig {
            reference,
            distorted,
            output: dir.join("nested").join("results.json"),
            width: 32,
            height: 32,
            frame_limit: None,
            metric: None,
            quiet: true,
        };
        config.validate().unwrap();
        run_compute(&config).unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&config.output).unwrap()).unwrap();
        assert_eq!(report["frame_count"], 2);
        assert_eq!(report["width"], 32);
        let psnr = report["metrics"]["psnr_y"].as_f64().unwrap();
        assert!((psnr - 14.1514).abs() < 0.01);
        assert!(report["metrics"]["ssim_y"].as_f64().unwrap() < 1.0);
        assert!(report["metrics"]["msssim_y"].is_number());
        assert_eq!(report["details"]["psnr"]["valid_frames"], 2);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn omits_metrics_that_were_not_run() {
        let report = Report {
            frame_count: 1,
            width: 2,
            height: 2,
            metrics: MetricsResults {
                psnr_y: Some(40.0),
                ..Default::default()
            },
            details: DetailedResults::default(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["metrics"]["psnr_y"], 40.0);
        assert!(value["metrics"].get("ssim_y").is_none());
        assert!(value["details"].get("psnr").is_none());
    }
}
