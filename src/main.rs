use anyhow::{anyhow, Context, Result};
use tilt_config::AppConfig;
use tilt_sensor::{ClientSettings, Orientation, TiltClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Log the display orientation every this many ticks.
const REPORT_EVERY_TICKS: u64 = 10;

fn client_settings(config: &AppConfig) -> ClientSettings {
    ClientSettings {
        pipeline: config.pipeline.settings(),
        sensor_timeout: config.sensors.timeout(),
        prune_interval: config.sensors.prune_interval(),
    }
}

/// Parse one input line: `<device address> <advertisement hex>`.
fn parse_line(line: &str) -> Result<(&str, Vec<u8>)> {
    let mut parts = line.split_whitespace();
    let address = parts.next().ok_or_else(|| anyhow!("Missing device address"))?;
    let hex = parts.next().ok_or_else(|| anyhow!("Missing advertisement bytes"))?;
    Ok((address, decode_hex(hex)?))
}

fn decode_hex(hex: &str) -> Result<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return Err(anyhow!("Odd number of hex digits"));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            let digits = hex
                .get(i..i + 2)
                .ok_or_else(|| anyhow!("Non-ASCII advertisement bytes"))?;
            u8::from_str_radix(digits, 16).with_context(|| format!("Bad hex byte {digits:?}"))
        })
        .collect()
}

/// Format a reading the way a display would, leaving out angles that are not numbers.
fn describe(o: &Orientation) -> String {
    let mut text = format!("x={:.2} y={:.2} z={:.2}", o.x, o.y, o.z);
    for (name, value) in [("theta", o.theta), ("psi", o.psi), ("phi", o.phi)] {
        if !value.is_nan() {
            text.push_str(&format!(" {name}={value:.2}"));
        }
    }
    if !o.tilt.is_nan() {
        text.push_str(&format!(" tilt={:.0}°", o.tilt));
    }
    text
}

/// Feed advertisements from stdin until it closes.
async fn read_advertisements(client: &TiltClient) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Ok((address, payload)) => client.submit_advertisement(address, payload),
            Err(e) => warn!(?e, line, "Skipping malformed input line"),
        }
    }
    info!("Advertisement input closed");
    Ok(())
}

/// Log the orientation periodically as ticks arrive.
async fn report_orientation(client: &TiltClient) {
    let mut rx = client.subscribe();
    let mut ticks: u64 = 0;
    while rx.changed().await.is_ok() {
        ticks += 1;
        if ticks % REPORT_EVERY_TICKS == 0 {
            let orientation = *rx.borrow_and_update();
            info!(reading = %describe(&orientation), "Orientation");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tilt_app=info,tilt_sensor=info".into()),
        )
        .init();

    info!("Tilt sensor viewer starting");

    let config = tilt_config::load_config().unwrap_or_else(|e| {
        warn!(?e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    info!(?config.pipeline, "Config loaded");

    let settings = client_settings(&config);
    let client = TiltClient::spawn(settings)?;
    client.start_ticking(settings.pipeline.tick_period);

    let input = async {
        if let Err(e) = read_advertisements(&client).await {
            warn!(?e, "Advertisement input failed");
        }
        // Keep easing toward the last reading until interrupted.
        std::future::pending::<()>().await
    };

    tokio::select! {
        _ = input => {}
        _ = report_orientation(&client) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Interrupted");
        }
    }

    client.stop_ticking();
    client.shutdown().await?;
    Ok(())
}
