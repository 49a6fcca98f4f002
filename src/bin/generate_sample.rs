//! Writes a deterministic sample measurement tree so the full aggregation
//! pipeline can be exercised by hand:
//!
//! ```text
//! <root>/<run>/<interface polarization>/(angle) radius.txt
//! ```
//!
//! Files are tab-separated Windows-1251 text with two header rows, matching
//! the instrument export format the loaders expect.

use std::path::Path;

use anyhow::{Context, Result};
use encoding_rs::WINDOWS_1251;
use log::info;

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

const RUNS: [&str; 2] = ["1. baseline", "2. retest"];
const COMBOS: [&str; 2] = ["DVI H", "DVI V"];
const ANGLES: [u32; 12] = [0, 30, 60, 90, 120, 150, 180, 210, 240, 270, 300, 330];
const FREQS_MHZ: [f64; 8] = [100.0, 200.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0];

fn write_cp1251(path: &Path, text: &str) -> Result<()> {
    let (bytes, _, _) = WINDOWS_1251.encode(text);
    std::fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))
}

/// Emission lobe: strongest toward 90°, fading with angular distance.
fn lobe_gain(angle: u32) -> f64 {
    let delta = ((f64::from(angle) - 90.0).abs()).min(360.0 - (f64::from(angle) - 90.0).abs());
    8.0 * (1.0 - delta / 180.0)
}

fn main() -> Result<()> {
    env_logger::init();

    let root = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_measurements".to_string());
    let root = Path::new(&root);
    let mut rng = SimpleRng::new(42);
    let mut files = 0usize;

    for run in RUNS {
        for combo in COMBOS {
            let dir = root.join(run).join(combo);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating {}", dir.display()))?;

            for angle in ANGLES {
                let mut body = String::from("Сканер АРК-РД1М\n№\tF, МГц\tУровень, дБ\tШум, дБ\n");
                let mut peak: f64 = 0.0;
                let mut row = 0usize;
                for freq in FREQS_MHZ {
                    // Drop the occasional reading so imputation has work to do.
                    if rng.next_f64() < 0.1 {
                        continue;
                    }
                    let jitter = rng.gauss(0.0, 0.05);
                    let signal = (rng.gauss(18.0, 2.0) + lobe_gain(angle)).max(0.0);
                    let noise = rng.gauss(5.0, 1.0).max(0.0);
                    peak = peak.max(signal);
                    row += 1;
                    body.push_str(&format!(
                        "{row}\t{:.1}\t{signal:.1}\t{noise:.1}\n",
                        freq + jitter
                    ));
                }

                let radius = (peak / 3.0).ceil().max(1.0) as u32;
                let path = dir.join(format!("({angle}) {radius}.txt"));
                write_cp1251(&path, &body)?;
                files += 1;
            }
        }
    }

    info!(
        "wrote {files} measurement files under {}",
        root.display()
    );
    println!(
        "Sample tree ready: {} ({} runs × {} interface/polarization dirs × {} angles)",
        root.display(),
        RUNS.len(),
        COMBOS.len(),
        ANGLES.len()
    );
    Ok(())
}
