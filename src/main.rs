//! screentext - command line front end
//!
//! Searches a screen image for a phrase and prints the point to click.
//! With `--watch` the image file is polled like a live screen until the
//! phrase shows up.

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use screentext::config::{self, AppConfig, DumpConfig, LocatorConfig};
use screentext::{Automator, FileSession, Located, TextLocator};

/// screentext - Locate text on a screen and compute the point to click
#[derive(Parser, Debug)]
#[command(name = "screentext")]
#[command(about = "Locate text on a screen image via OCR and print the point to click")]
struct Args {
    /// Screen image to search
    image: PathBuf,

    /// Words to look for
    #[arg(required = true)]
    words: Vec<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log: String,

    /// Configuration file (defaults to config.toml in the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Re-read the image until the words appear, then click on them
    #[arg(short, long)]
    watch: bool,

    /// Give up watching after this many seconds (0 = never)
    #[arg(long)]
    timeout: Option<f64>,

    /// Only analyse screens that did not change since the previous poll
    #[arg(long)]
    wait_stable: bool,

    #[command(flatten)]
    locator: LocatorOverrides,

    #[command(flatten)]
    dump: DumpOverrides,
}

/// Locator thresholds overriding the configuration file
#[derive(ClapArgs, Debug, Default)]
struct LocatorOverrides {
    /// Language seen on the screen as 3-character ISO 639-2 code
    #[arg(long)]
    lang: Option<String>,

    /// Resize factor applied to every region before OCR
    #[arg(long)]
    img_resize: Option<f64>,

    /// Maximum height a detected box can have
    #[arg(long)]
    box_max_height: Option<u32>,

    /// Minimum height a detected box must have
    #[arg(long)]
    box_min_height: Option<u32>,

    /// Minimum width a detected box must have
    #[arg(long)]
    box_min_width: Option<u32>,

    /// Maximum distance of line end points forming a box corner
    #[arg(long)]
    box_corner_points_max_distance: Option<f64>,

    /// Minimum length a detected line must have
    #[arg(long)]
    line_min_length: Option<u32>,

    /// Variance ratio separating lines from blobs
    #[arg(long)]
    line_segment_min_covariance: Option<f64>,

    /// Minimum gradient value for pixels to be included into a line
    #[arg(long)]
    line_segment_low_threshold: Option<f32>,

    /// Minimum gradient value for pixels to start a line
    #[arg(long)]
    line_segment_high_threshold: Option<f32>,

    /// Minimum score a word sequence match needs to have
    #[arg(long)]
    min_str_match_score: Option<f64>,

    /// Tesseract executable
    #[arg(long)]
    tesseract: Option<PathBuf>,
}

impl LocatorOverrides {
    fn apply(self, config: &mut LocatorConfig) {
        if let Some(v) = self.lang {
            config.lang = v;
        }
        if let Some(v) = self.img_resize {
            config.img_resize = v;
        }
        if let Some(v) = self.box_max_height {
            config.box_max_height = v;
        }
        if let Some(v) = self.box_min_height {
            config.box_min_height = v;
        }
        if let Some(v) = self.box_min_width {
            config.box_min_width = v;
        }
        if let Some(v) = self.box_corner_points_max_distance {
            config.box_corner_points_max_distance = v;
        }
        if let Some(v) = self.line_min_length {
            config.line_min_length = v;
        }
        if let Some(v) = self.line_segment_min_covariance {
            config.line_segment_min_covariance = v;
        }
        if let Some(v) = self.line_segment_low_threshold {
            config.line_segment_low_threshold = v;
        }
        if let Some(v) = self.line_segment_high_threshold {
            config.line_segment_high_threshold = v;
        }
        if let Some(v) = self.min_str_match_score {
            config.min_str_match_score = v;
        }
        if let Some(path) = self.tesseract {
            config.tesseract_path = path;
        }
    }
}

/// Diagnostic image dumps
#[derive(ClapArgs, Debug, Default)]
struct DumpOverrides {
    /// Save an image of detected lines and boxes
    #[arg(long, value_name = "IMG_PATH")]
    dump_boxes: Option<PathBuf>,

    /// Save the analysed screen
    #[arg(long, value_name = "IMG_PATH")]
    dump_screen: Option<PathBuf>,

    /// Save the gradients along the x-axis
    #[arg(long, value_name = "IMG_PATH")]
    dump_x_gradients: Option<PathBuf>,

    /// Save the gradients along the y-axis
    #[arg(long, value_name = "IMG_PATH")]
    dump_y_gradients: Option<PathBuf>,

    /// Save every analysed screen into this directory
    #[arg(long, value_name = "DIR")]
    dump_dir: Option<PathBuf>,
}

impl DumpOverrides {
    fn apply(self, config: &mut DumpConfig) {
        config.boxes = self.dump_boxes.or(config.boxes.take());
        config.screen = self.dump_screen.or(config.screen.take());
        config.x_gradients = self.dump_x_gradients.or(config.x_gradients.take());
        config.y_gradients = self.dump_y_gradients.or(config.y_gradients.take());
        config.dir = self.dump_dir.or(config.dir.take());
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log) {
        eprintln!("Failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log level")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_app_config(args.config.as_deref())?;
    args.locator.apply(&mut config.locator);
    args.dump.apply(&mut config.dump);
    if let Some(timeout) = args.timeout {
        config.polling.timeout_secs = timeout;
    }
    if args.wait_stable {
        config.polling.wait_for_stability = true;
    }
    config.validate()?;

    let words = args.words.join(" ");
    let locator = TextLocator::tesseract(config.locator, config.dump);

    let located = if args.watch {
        info!("Watching {:?}", args.image);
        let session = Arc::new(FileSession::new(&args.image));
        let automator = Automator::new(session, locator, config.polling);

        let cancel = automator.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, stopping search");
                cancel.cancel();
            }
        });

        Some(automator.click_on_text(&words).await?)
    } else {
        info!("Loading image {:?}", args.image);
        let image = image::open(&args.image)
            .with_context(|| format!("Failed to load {:?}", args.image))?;
        locator.find_text(&image, &words).await?
    };

    print_result(located.as_ref(), args.json)
}

/// Load the configuration given on the command line, or the user's default
/// configuration if there is one
fn load_app_config(path: Option<&std::path::Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        let config = config::load_config(path)
            .with_context(|| format!("Failed to load {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_dir) = config::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring configuration {:?}: {:#}", config_path, e),
            }
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn print_result(located: Option<&Located>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&located)?);
        return Ok(());
    }

    match located {
        Some(l) => println!("{} {}", l.point.x, l.point.y),
        None => println!("no match"),
    }
    Ok(())
}
