//! Phase-locked carrier generation.
//!
//! Every carrier in the multiplex is an integer multiple of a quarter of the
//! 19 kHz pilot, and 19 kHz divides the 228 kHz synthesis clock exactly
//! twelve times. All six carriers therefore share one master period of 48
//! samples, and the bank is just a tick counter indexing six precomputed
//! tables. Phase lock between pilot, RDS and RDS2 subcarriers is exact by
//! construction and cannot drift, no matter how long the encoder runs.

/// Internal synthesis rate of the multiplex, in Hz.
pub const MPX_SAMPLE_RATE: u32 = 228_000;

/// Common period of all carriers at 228 kHz (LCM of 12, 6, 4, 24/7·7, 16, 3).
const PERIOD: usize = 48;

/// Carrier bank: sin/cos at n × 19 kHz for n ∈ {1, 2, 3, 3.5, 3.75, 4},
/// phase-locked to the pilot.
///
/// The pilot and the 38 kHz subcarrier are sine phases; the data
/// subcarriers use cosine, the convention the biphase symbols are defined
/// against.
pub struct CarrierBank {
    tick: usize,
    pilot: [f32; PERIOD],
    sub38: [f32; PERIOD],
    rds: [f32; PERIOD],
    rds2: [[f32; PERIOD]; 3],
}

impl CarrierBank {
    pub fn new() -> Self {
        // Phase of carrier n at tick t is 2π · n · t / 12 (pilot cycles)
        let table = |n: f64, cosine: bool| -> [f32; PERIOD] {
            std::array::from_fn(|t| {
                let phase = 2.0 * std::f64::consts::PI * n * t as f64 / 12.0;
                let v = if cosine { phase.cos() } else { phase.sin() };
                v as f32
            })
        };
        Self {
            tick: 0,
            pilot: table(1.0, false),
            sub38: table(2.0, false),
            rds: table(3.0, true),
            rds2: [table(3.5, true), table(3.75, true), table(4.0, true)],
        }
    }

    /// 19 kHz pilot, sin(φ).
    pub fn pilot(&self) -> f32 {
        self.pilot[self.tick]
    }

    /// 38 kHz stereo subcarrier, sin(2φ). Reserved for a stereo difference
    /// signal; this encoder transmits pilot only.
    pub fn subcarrier38(&self) -> f32 {
        self.sub38[self.tick]
    }

    /// 57 kHz RDS subcarrier, cos(3φ).
    pub fn rds(&self) -> f32 {
        self.rds[self.tick]
    }

    /// RDS2 subcarrier `k` (0..3): 66.5 / 71.25 / 76 kHz.
    pub fn rds2(&self, k: usize) -> f32 {
        self.rds2[k][self.tick]
    }

    /// Advance all carriers by one 228 kHz sample.
    pub fn advance(&mut self) {
        self.tick = (self.tick + 1) % PERIOD;
    }
}

impl Default for CarrierBank {
    fn default() -> Self {
        Self::new()
    }
}
