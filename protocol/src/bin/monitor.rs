use clap::Parser;
use panasonic_ac::{
    Interface,
    config::Config,
    driver::{ClimateCall, Publisher, Sensor, Session},
    revision::RevisionKind,
    state::{DeviceState, FanSpeed, Mode, Preset, SwingMode},
};
use std::{error::Error, str::FromStr, time::Duration};
use tokio::time::{self, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serial port path
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Protocol revision (`classic` or `sequenced`)
    #[arg(short, long, value_parser = parse_enum::<RevisionKind>, default_value = "classic")]
    revision: RevisionKind,

    /// Operating mode to set once connected
    #[arg(short, long, value_parser = parse_enum::<Mode>)]
    mode: Option<Mode>,

    /// Target temperature to set once connected (`°C`)
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Fan speed to set once connected
    #[arg(short, long, value_parser = parse_enum::<FanSpeed>)]
    fan: Option<FanSpeed>,

    /// Swing mode to set once connected
    #[arg(short, long, value_parser = parse_enum::<SwingMode>)]
    swing: Option<SwingMode>,

    /// Preset to set once connected
    #[arg(long, value_parser = parse_enum::<Preset>)]
    preset: Option<Preset>,
}

fn parse_enum<T: FromStr>(s: &str) -> Result<T, String> {
    s.parse().map_err(|_| format!("invalid value: {s}"))
}

struct Printer;

impl Publisher for Printer {
    fn publish_state(&mut self, state: &DeviceState) {
        println!(
            "{} ({}), target {:?} °C, current {:?} °C, fan {}, swing {}/{}, preset {}",
            state.mode,
            state.action(),
            state.target_temperature,
            state.current_temperature,
            state.fan_speed,
            state.vertical_swing,
            state.horizontal_swing,
            state.preset
        );
    }

    fn publish_sensor(&mut self, sensor: Sensor, value: f32) {
        println!("{sensor}: {value}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args = Args::parse();
    let call = ClimateCall {
        mode: args.mode,
        target_temperature: args.temperature,
        fan_speed: args.fan,
        swing_mode: args.swing,
        preset: args.preset,
    };

    let port = panasonic_ac::serial::open(&args.port)?;
    let config = Config::default().with_revision(args.revision);
    let mut intf = Interface::new(port, config, Printer);
    let mut interval = time::interval(Duration::from_millis(10));
    let mut pending = Some(call).filter(|call| *call != ClimateCall::default());
    let start = Instant::now();

    loop {
        interval.tick().await;

        let now = start.elapsed();

        intf.tick(now).await?;

        if intf.driver().session() == Session::Ready {
            if let Some(call) = pending.take() {
                println!("Applying {call:?}");

                intf.driver_mut().control(&call, now);
            }
        }
    }
}
