//! Tune once and print a single line of signal statistics.
//!
//! Usage:
//!   frontend_status sat <if_khz> <symbol_rate>
//!   frontend_status t2 <freq_khz> <bandwidth_hz> [ascot2s|ft3114]
//!   frontend_status cable <freq_khz> <symbol_rate> [ascot2s|ft3114]
//!
//! Without arguments a DVB-S transponder at 1200 MHz IF, 27.5 Msps is used.
use std::env;
use std::process;
use std::thread;
use std::time::Duration;

use tvfe_rs::error::Result;
use tvfe_rs::{DeliverySystem, Frontend, TerrestrialTuner, TuneParams};

const BUS_INDEX: u8 = 0;
const SETTLE: Duration = Duration::from_millis(500);

fn arg_u32(args: &[String], idx: usize, default: u32) -> u32 {
    match args.get(idx) {
        Some(s) => s.parse().unwrap_or_else(|_| {
            eprintln!("not a number: {}", s);
            process::exit(1);
        }),
        None => default,
    }
}

fn terrestrial_tuner(args: &[String], idx: usize) -> TerrestrialTuner {
    match args.get(idx).map(|s| s.as_str()) {
        Some("ft3114") => TerrestrialTuner::Ft3114,
        _ => TerrestrialTuner::Ascot2s,
    }
}

fn run(args: &[String]) -> Result<()> {
    let mode = args.get(1).map(|s| s.as_str()).unwrap_or("sat");
    let (mut frontend, params) = match mode {
        "t" | "t2" => {
            let system = if mode == "t" {
                DeliverySystem::DvbT
            } else {
                DeliverySystem::DvbT2
            };
            let params = TuneParams::terrestrial(
                system,
                arg_u32(args, 2, 474_000),
                arg_u32(args, 3, 8_000_000),
            );
            let frontend = Frontend::open_terrestrial(BUS_INDEX, terrestrial_tuner(args, 4))?;
            (frontend, params)
        }
        "cable" => {
            let params = TuneParams::cable(arg_u32(args, 2, 346_000), arg_u32(args, 3, 6_900_000));
            let frontend = Frontend::open_terrestrial(BUS_INDEX, terrestrial_tuner(args, 4))?;
            (frontend, params)
        }
        _ => {
            let params = TuneParams::satellite(
                DeliverySystem::DvbS,
                arg_u32(args, 2, 1_200_000),
                arg_u32(args, 3, 27_500_000),
            );
            (Frontend::open_satellite(BUS_INDEX)?, params)
        }
    };

    frontend.tune(&params)?;
    thread::sleep(SETTLE);
    let stats = frontend.read_stats()?;
    println!("{}", stats);
    frontend.sleep()
}

fn main() {
    stderrlog::new().verbosity(log::Level::Info).init().unwrap();

    let args: Vec<String> = env::args().collect();
    if let Err(e) = run(&args) {
        eprintln!("frontend_status: {}", e);
        process::exit(1);
    }
}
