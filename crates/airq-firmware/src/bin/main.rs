#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use airq_core::app_state::{DevicePresence, Monitor};
use airq_core::bus_scan::{BusPins, BusScanner, I2cProbe};
use airq_core::config::MonitorConfig;
use airq_core::display::{MonoFrameBuffer, Ssd1306, render_sample, render_status};
use airq_core::sensors::{Aht2x, Ens160};
use airq_firmware::hardware::{self, BusDevice, SCL_GPIO, SDA_GPIO};
use embassy_executor::Spawner;
use embassy_time::{Delay, Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info, warn};
use rtt_target::rprintln;

/// How often the halted firmware wakes up while waiting for a reset.
const HALT_TICK: Duration = Duration::from_millis(100);

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Stay parked until the reset button is pressed.
async fn halt() -> ! {
    loop {
        Timer::after(HALT_TICK).await;
    }
}

/// Draw and push a status screen if a panel is fitted.
async fn show_status(
    oled: &mut Option<Ssd1306<BusDevice>>,
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

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!(log::LevelFilter::Info);

    let esp_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(esp_config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let config = MonitorConfig {
        pins: BusPins {
            sda: SDA_GPIO,
            scl: SCL_GPIO,
        },
        ..MonitorConfig::default()
    };

    // Give the host's serial monitor a moment to attach.
    Timer::after(Duration::from_millis(100)).await;
    info!("Starting setup...");

    // 1. Scan the bus while nothing else is using it.
    let i2c = match hardware::create_i2c_bus(
        peripherals.I2C0,
        peripherals.GPIO8,
        peripherals.GPIO9,
        config.bus_frequency_khz,
    ) {
        Ok(i2c) => i2c,
        Err(e) => {
            error!("I2C0 configuration rejected: {:?}", e);
            halt().await
        }
    };

    let mut scanner = BusScanner::new(I2cProbe::new(i2c), esp_hal::delay::Delay::new());
    let presence = match DevicePresence::discover(&mut scanner, &config) {
        Ok((report, presence)) => {
            rprintln!("{}", report.with_pins(config.pins));
            presence
        }
        Err(e) => {
            error!("{}", e);
            halt().await
        }
    };
    let (probe, _) = scanner.release();

    // 2. Share the bus between the sensors and the panel.
    let bus = hardware::share_i2c_bus(probe.into_inner());

    let mut fb = MonoFrameBuffer::new();
    let mut oled = None;
    if presence.oled {
        let mut panel = Ssd1306::new(hardware::device(bus), config.oled_address);
        match panel.init().await {
            Ok(()) => oled = Some(panel),
            Err(e) => warn!("OLED init failed: {:?}", e),
        }
    }
    show_status(&mut oled, &mut fb, "airq", "Starting sensors").await;

    rprintln!("------------------------------------------------------------");
    rprintln!("ENS160 - Digital air quality sensor");
    rprintln!("------------------------------------------------------------");
    Timer::after(Duration::from_millis(config.startup_delay_ms.into())).await;

    // 3. Bring up the sensors.
    let ens160 = Ens160::new(hardware::device(bus), Delay, config.ens160_address);
    let aht2x = presence
        .climate
        .then(|| Aht2x::new(hardware::device(bus), Delay));
    let mut monitor = Monitor::new(ens160, aht2x);

    if let Err(e) = monitor.start().await {
        error!("{}", e);
        rprintln!("ENS160 init failed. Check address, power, and wiring.");
        show_status(&mut oled, &mut fb, "ENS160", "init failed").await;
        halt().await
    }
    rprintln!("ENS160 is ready.");

    // 4. Poll forever.
    let poll_interval = Duration::from_millis(config.poll_interval_ms.into());
    loop {
        match monitor.poll().await {
            Ok(sample) => {
                rprintln!("{}", sample);
                if let Some(panel) = oled.as_mut() {
                    let Ok(()) = render_sample(&mut fb, &sample);
                    if let Err(e) = panel.flush(&mut fb).await {
                        warn!("OLED flush failed: {:?}", e);
                    }
                }
            }
            Err(e) => warn!("Poll failed: {}", e),
        }
        Timer::after(poll_interval).await;
    }
}
