//! Generate a deterministic sample sensor log for trying out the dashboard:
//! a week of minute-spaced readings for three channels plus a status label.
//!
//! Usage: `cargo run --bin generate_sample [output.csv]`

use chrono::{Duration, NaiveDate};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_sensor_log.csv".to_string());

    let mut rng = SimpleRng::new(42);
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow::anyhow!("invalid start date"))?;

    let mut writer = csv::Writer::from_path(&output)?;
    writer.write_record(["timestamp", "temperature", "pressure", "vibration", "status"])?;

    // One week of minute-spaced samples with a daily temperature cycle.
    let minutes: i64 = 7 * 24 * 60;
    for i in 0..minutes {
        let ts = start + Duration::minutes(i);
        let phase = (i % (24 * 60)) as f64 / (24.0 * 60.0) * std::f64::consts::TAU;

        let temperature = 21.0 + 4.0 * phase.sin() + rng.gauss(0.0, 0.3);
        let pressure = 1013.0 + rng.gauss(0.0, 2.5);
        let vibration = (0.5 + 0.2 * (phase * 3.0).cos() + rng.gauss(0.0, 0.05)).max(0.0);
        let status = if vibration > 0.8 { "warn" } else { "ok" };

        writer.write_record([
            ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            format!("{temperature:.2}"),
            format!("{pressure:.1}"),
            format!("{vibration:.3}"),
            status.to_string(),
        ])?;
    }
    writer.flush()?;

    log::info!("wrote {minutes} rows to {output}");
    println!("wrote {minutes} rows to {output}");
    Ok(())
}
