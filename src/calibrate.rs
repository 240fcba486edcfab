use airborne_gimbal::config::CALIBRATION_SAMPLES;
use airborne_gimbal::i2c::I2cBus;
use airborne_gimbal::imu::{Mpu6050, Orientation};
use airborne_gimbal::SystemConfig;
use env_logger::Env;
use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = SystemConfig::load(&config_path)?;
    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_filter())).init();

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║     MPU6050 Calibration Tool                         ║");
    println!("╚══════════════════════════════════════════════════════╝\n");

    println!("Instructions:");
    println!("1. Mount the sensor in its flight position");
    println!("2. Keep the board LEVEL (horizontal)");
    println!("3. Do not touch or move it while samples are taken");
    println!("4. Press Ctrl+C to stop the live readout\n");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let spotlight = &config.spotlight_gimbal;
    let bus = I2cBus::open(spotlight.i2c_bus)?;
    let mut imu = Mpu6050::with_address(bus, spotlight.i2c_address);
    imu.initialize()?;
    println!(
        "MPU6050 found on I2C bus {} at 0x{:02X}",
        spotlight.i2c_bus, spotlight.i2c_address
    );

    println!("Starting in 5 seconds...\n");
    thread::sleep(Duration::from_secs(5));

    println!("Collecting {} samples... (HOLD STILL!)", CALIBRATION_SAMPLES);
    let offset = imu.calibrate(CALIBRATION_SAMPLES)?;

    println!("\n✓ Calibration complete");
    println!("  Accel offset: {} g", offset.acceleration);
    println!("  Gyro offset:  {} °/s\n", offset.angular_rate);

    println!("Live readout (tilt the board to check):");
    println!(
        "\n{:^8} | {:^9} | {:^9} | {:^26} | {:^8}",
        "Sample", "Pitch", "Roll", "Gyro (°/s)", "Temp"
    );
    println!("{:-<8}-+-{:-<9}-+-{:-<9}-+-{:-<26}-+-{:-<8}", "", "", "", "", "");

    let mut sample_count = 0u64;
    while running.load(Ordering::SeqCst) {
        match imu.read() {
            Ok(reading) => {
                sample_count += 1;
                // Print update every 5 samples
                if sample_count % 5 == 0 {
                    let tilt = Orientation::from_acceleration(reading.acceleration);
                    println!(
                        "{:^8} | {:>8.2}° | {:>8.2}° | {:^26} | {:>6.1}°C",
                        sample_count,
                        tilt.pitch,
                        tilt.roll,
                        reading.angular_rate.to_string(),
                        reading.temperature
                    );
                }
            }
            Err(e) => eprintln!("IMU read error: {}", e),
        }

        thread::sleep(Duration::from_millis(100));
    }

    imu.close()?;
    println!("\nDone after {} samples.", sample_count);
    Ok(())
}
