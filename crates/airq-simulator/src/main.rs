//! Desktop simulator for the airq firmware.
//!
//! Runs the same bus scan, sensor bring-up and polling loop as the board,
//! but against an in-process I2C bus with register-level device models.
//! The final OLED contents are printed as text.
//!
//! ```text
//! airq-simulator [scenario.json]
//! ```
//!
//! Set `RUST_LOG=debug` (or `trace` for every bus transaction) for more detail.

mod bus;
mod devices;
mod scenario;

use std::env;
use std::time::Duration;

use airq_core::app_state::{DevicePresence, Monitor};
use airq_core::async_i2c_bus::{AsyncI2cDevice, SharedI2cBus};
use airq_core::bus_scan::{BusScanner, I2cProbe, ScanReport};
use airq_core::display::{MonoFrameBuffer, Ssd1306, render_sample, render_status};
use airq_core::sensors::{Aht2x, Ens160};
use anyhow::{Result, anyhow, bail};
use embassy_futures::block_on;
use log::{error, info, warn};

use bus::{SimDelay, SimulatedBus};
use scenario::Scenario;

type BusDevice<'a> = AsyncI2cDevice<'a, SimulatedBus>;

fn scan(
    bus: SimulatedBus,
    scenario: &Scenario,
) -> Result<(ScanReport, DevicePresence, SimulatedBus)> {
    let delay = SimDelay {
        realtime: scenario.realtime,
    };
    let mut scanner = BusScanner::new(I2cProbe::new(bus), delay);
    let (report, presence) = DevicePresence::discover(&mut scanner, &scenario.monitor)
        .map_err(|e| anyhow!("{e}"))?;
    let (probe, _) = scanner.release();
    Ok((report, presence, probe.into_inner()))
}

async fn show_status(
    oled: &mut Option<Ssd1306<BusDevice<'_>>>,
    fb: &mut MonoFrameBuffer,
    title: &str,
    detail: &str,
) {
    let Some(panel) = oled.as_mut() else {
        return;
    };
    let Ok(()) = render_status(fb, title, detail);
    if let Err(e) = panel.flush(fb).await {
        warn!("OLED flush failed: {:?}", e);
    }
}

async fn run(
    bus: &SharedI2cBus<SimulatedBus>,
    scenario: &Scenario,
    presence: DevicePresence,
) -> Result<()> {
    let config = &scenario.monitor;
    let delay = SimDelay {
        realtime: scenario.realtime,
    };

    let mut fb = MonoFrameBuffer::new();
    let mut oled = None;
    if presence.oled {
        let mut panel = Ssd1306::new(AsyncI2cDevice::new(bus), config.oled_address);
        match panel.init().await {
            Ok(()) => oled = Some(panel),
            Err(e) => warn!("OLED init failed: {:?}", e),
        }
    }
    show_status(&mut oled, &mut fb, "airq", "Starting sensors").await;

    println!("------------------------------------------------------------");
    println!("ENS160 - Digital air quality sensor");
    println!("------------------------------------------------------------");
    if scenario.realtime {
        std::thread::sleep(Duration::from_millis(config.startup_delay_ms.into()));
    }

    let ens160 = Ens160::new(AsyncI2cDevice::new(bus), delay, config.ens160_address);
    let aht2x = presence
        .climate
        .then(|| Aht2x::new(AsyncI2cDevice::new(bus), delay));
    let mut monitor = Monitor::new(ens160, aht2x);

    if let Err(e) = monitor.start().await {
        error!("{}", e);
        println!("ENS160 init failed. Check address, power, and wiring.");
        show_status(&mut oled, &mut fb, "ENS160", "init failed").await;
        bail!("air quality sensor did not start");
    }
    println!("ENS160 is ready.");

    let poll_interval = Duration::from_millis(config.poll_interval_ms.into());
    for cycle in 0..scenario.cycles {
        if cycle > 0 && scenario.realtime {
            std::thread::sleep(poll_interval);
        }
        match monitor.poll().await {
            Ok(sample) => {
                println!("{}", sample);
                if let Some(panel) = oled.as_mut() {
                    let Ok(()) = render_sample(&mut fb, &sample);
                    if let Err(e) = panel.flush(&mut fb).await {
                        warn!("OLED flush failed: {:?}", e);
                    }
                }
            }
            Err(e) => warn!("Poll failed: {}", e),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let scenario = match env::args().nth(1) {
        Some(path) => Scenario::load(path)?,
        None => Scenario::default(),
    };
    info!("Simulating {} poll cycles", scenario.cycles);

    let (report, presence, bus) = scan(scenario.build_bus(), &scenario)?;
    print!("{}", report.with_pins(scenario.monitor.pins));

    let bus = SharedI2cBus::new(bus);
    let outcome = block_on(run(&bus, &scenario, presence));

    let bus = bus.into_inner();
    info!("{} bus transactions", bus.transactions());
    match bus.oled() {
        Some(panel) if panel.is_on() => print!("{}", panel.to_ascii()),
        Some(_) => info!("OLED never switched on"),
        None => {}
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use airq_core::bus_scan::ProbeStatus;
    use airq_core::sensors::{AirQualitySensor, ClimateReading, Sensor, Validity};

    fn fast() -> Scenario {
        Scenario {
            realtime: false,
            ..Scenario::default()
        }
    }

    #[test]
    fn test_scan_finds_board_devices_and_faults() {
        let scenario = Scenario {
            extra_devices: vec![0x08],
            faulty_addresses: vec![0x40],
            ..fast()
        };
        let (report, presence, bus) = scan(scenario.build_bus(), &scenario).unwrap();
        assert!(presence.air_quality && presence.climate && presence.oled);

        let found: Vec<u8> = report.found().iter().map(|r| r.address).collect();
        assert_eq!(found, vec![0x08, 0x38, 0x3C, 0x53]);
        assert_eq!(report.error_entries().len(), 1);
        assert_eq!(report.error_entries()[0].address, 0x40);
        assert_eq!(report.error_entries()[0].status, ProbeStatus::BusError);
        assert!(report.is_complete());
        assert_eq!(bus.transactions(), 126);

        let text = report.to_string();
        assert!(text.contains("I2C device found at address 0x53"));
        assert!(text.contains("Unknown error at address 0x40"));
    }

    #[test]
    fn test_bad_scan_range_is_an_error_not_a_panic() {
        let mut scenario = fast();
        scenario.monitor.scan.address_low = 0x50;
        scenario.monitor.scan.address_high = 0x10;
        let err = scan(scenario.build_bus(), &scenario).unwrap_err();
        assert!(err.to_string().contains("invalid scan range"));
    }

    #[test]
    fn test_monitor_runs_against_simulated_sensors() {
        let scenario = fast();
        let bus = SharedI2cBus::new(scenario.build_bus());
        let delay = SimDelay { realtime: false };

        let mut monitor = Monitor::new(
            Ens160::new(AsyncI2cDevice::new(&bus), delay, 0x53),
            Some(Aht2x::new(AsyncI2cDevice::new(&bus), delay)),
        );
        block_on(monitor.start()).unwrap();
        assert!(monitor.is_compensated());

        let first = block_on(monitor.poll()).unwrap();
        assert_eq!(first.air.validity, Validity::WarmUp);
        assert!((1..=5).contains(&first.air.aqi));

        let climate = first.climate.unwrap();
        assert!((20_000..=26_000).contains(&climate.temperature_milli_celsius));
        assert!((36_000..=54_000).contains(&climate.humidity_milli_percent));

        for _ in 0..4 {
            block_on(monitor.poll()).unwrap();
        }
        let later = block_on(monitor.poll()).unwrap();
        assert_eq!(later.air.validity, Validity::Normal);

        drop(monitor);
        let (temp_word, rh_word) = bus.into_inner().ens160().unwrap().compensation();
        assert!(temp_word > 0);
        assert!(rh_word > 0);
    }

    #[test]
    fn test_wrong_part_id_halts_monitor() {
        let scenario = Scenario {
            ens160_part_id: 0x0161,
            ..fast()
        };
        let bus = SharedI2cBus::new(scenario.build_bus());
        let delay = SimDelay { realtime: false };
        let mut monitor: Monitor<_, Aht2x<BusDevice<'_>, SimDelay>> =
            Monitor::new(Ens160::new(AsyncI2cDevice::new(&bus), delay, 0x53), None);

        assert!(block_on(monitor.start()).is_err());
        assert!(block_on(monitor.poll()).is_err());
    }

    #[test]
    fn test_sensor_without_aht2x_still_reads() {
        let scenario = Scenario {
            aht2x: false,
            ..fast()
        };
        let bus = SharedI2cBus::new(scenario.build_bus());
        let mut ens160 = Ens160::new(AsyncI2cDevice::new(&bus), SimDelay { realtime: false }, 0x53);
        block_on(ens160.begin()).unwrap();
        block_on(ens160.compensate(&ClimateReading {
            temperature_milli_celsius: 25_000,
            humidity_milli_percent: 50_000,
        }))
        .unwrap();
        let reading = block_on(ens160.read()).unwrap();
        assert!(reading.eco2_ppm >= 400);
    }

    #[test]
    fn test_oled_receives_rendered_frame() {
        let scenario = fast();
        let presence = DevicePresence {
            air_quality: true,
            climate: true,
            oled: true,
        };
        let bus = SharedI2cBus::new(scenario.build_bus());
        block_on(run(&bus, &scenario, presence)).unwrap();

        let bus = bus.into_inner();
        let panel = bus.oled().unwrap();
        assert!(panel.is_on());
        assert!(panel.ram().iter().any(|&b| b != 0));
        assert_eq!(panel.to_ascii().lines().count(), 34);
    }
}
