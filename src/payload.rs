//! Frame sizes and payload contents of a stream, computed once at bootstrap.

use crate::error::ConfigError;
use crate::policy::{new_rng, GenSpec};

use rand_core::RngCore;
use rand_distr::{Distribution, Uniform, WeightedIndex};
use serde::Deserialize;
use std::sync::Arc;

/// Largest frame the engine builds, in bytes
pub const MAX_FRAME_SIZE: usize = 16384;
/// Number of draws precomputed for weighted frame sizes
pub const WEIGHTED_TABLE_LEN: usize = 1 << 16;
/// Number of distinct random payloads, used in turn
pub const RANDOM_PAYLOADS: usize = 16;

/// Content of the bytes following the headers
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum PayloadSpec {
    /// Hexadecimal byte string, copied once or repeated until the end of the frame
    Fixed {
        value: String,
        #[serde(default)]
        repeat: bool,
    },
    Random {
        #[serde(default)]
        seed: u64,
    },
    #[default]
    IncrementByte,
    DecrementByte,
    IncrementWord,
    DecrementWord,
}

fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if text.is_empty() || text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Payload buffers of a stream, each `MAX_FRAME_SIZE` bytes long
#[derive(Debug, Clone)]
pub struct Payloads {
    arrays: Arc<Vec<Vec<u8>>>,
}

impl Payloads {
    pub fn build(spec: &PayloadSpec) -> Result<Self, ConfigError> {
        let arrays = match spec {
            PayloadSpec::Fixed { value, repeat } => {
                let pattern = parse_hex(value).ok_or_else(|| ConfigError::MalformedPattern {
                    kind: "payload",
                    text: value.clone(),
                })?;
                let mut array = vec![0; MAX_FRAME_SIZE];
                if *repeat {
                    for (b, p) in array.iter_mut().zip(pattern.iter().cycle()) {
                        *b = *p;
                    }
                } else {
                    let n = pattern.len().min(MAX_FRAME_SIZE);
                    array[..n].copy_from_slice(&pattern[..n]);
                }
                vec![array]
            }
            PayloadSpec::Random { seed } => {
                let mut rng = new_rng(*seed);
                (0..RANDOM_PAYLOADS)
                    .map(|_| {
                        let mut array = vec![0; MAX_FRAME_SIZE];
                        rng.fill_bytes(&mut array);
                        array
                    })
                    .collect()
            }
            PayloadSpec::IncrementByte => vec![(0..MAX_FRAME_SIZE).map(|i| i as u8).collect()],
            PayloadSpec::DecrementByte => {
                vec![(0..MAX_FRAME_SIZE).map(|i| 0xff - i as u8).collect()]
            }
            PayloadSpec::IncrementWord => vec![(0..MAX_FRAME_SIZE)
                .map(|i| ((i / 2) as u16).to_be_bytes()[i % 2])
                .collect()],
            PayloadSpec::DecrementWord => vec![(0..MAX_FRAME_SIZE)
                .map(|i| (0xffff - (i / 2) as u16).to_be_bytes()[i % 2])
                .collect()],
        };
        Ok(Payloads {
            arrays: Arc::new(arrays),
        })
    }

    /// Payload bytes of the `frame`-th frame
    pub fn for_frame(&self, frame: u64) -> &[u8] {
        &self.arrays[(frame % self.arrays.len() as u64) as usize]
    }
}

/// Sizes of the successive frames of a stream, used in turn.
///
/// Every size must hold the headers (`min` bytes) and stay below `MAX_FRAME_SIZE`.
pub fn size_table(spec: &GenSpec<u64>, min: usize) -> Result<Vec<usize>, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidSpec {
        target: "frame length".to_string(),
        reason: reason.to_string(),
    };
    let out_of_range = |size: usize| ConfigError::FrameSize {
        size,
        min,
        max: MAX_FRAME_SIZE,
    };
    if min > MAX_FRAME_SIZE {
        return Err(out_of_range(min));
    }
    // an increment cannot stay in range for longer than this
    let longest = MAX_FRAME_SIZE as u64 + 1;
    let sizes: Vec<usize> = match spec {
        GenSpec::Fixed { value } => vec![*value as usize],
        GenSpec::ValueList { values, .. } => values.iter().map(|v| *v as usize).collect(),
        GenSpec::Increment {
            start, step, count, ..
        } => (0..(*count).min(longest))
            .map(|i| start.saturating_add(i.saturating_mul(*step)) as usize)
            .collect(),
        GenSpec::Decrement {
            start, step, count, ..
        } => (0..(*count).min(longest))
            .map(|i| start.saturating_sub(i.saturating_mul(*step)) as usize)
            .collect(),
        GenSpec::Random { seed } => {
            let mut rng = new_rng(*seed);
            let dist = Uniform::new_inclusive(min, MAX_FRAME_SIZE);
            (min..=MAX_FRAME_SIZE).map(|_| dist.sample(&mut rng)).collect()
        }
        GenSpec::RandomInRange {
            min: low,
            max: high,
            seed,
        } => {
            if low > high {
                return Err(invalid("min is greater than max"));
            }
            if *high > MAX_FRAME_SIZE as u64 {
                return Err(out_of_range(*high as usize));
            }
            let mut rng = new_rng(*seed);
            let dist = Uniform::new_inclusive(*low as usize, *high as usize);
            (*low..=*high).map(|_| dist.sample(&mut rng)).collect()
        }
        GenSpec::WeightedDistribution { choices, seed } => {
            let mut rng = new_rng(*seed);
            let weights = WeightedIndex::new(choices.iter().map(|c| c.weight))
                .map_err(|e| invalid(&e.to_string()))?;
            (0..WEIGHTED_TABLE_LEN)
                .map(|_| choices[weights.sample(&mut rng)].value as usize)
                .collect()
        }
    };
    if sizes.is_empty() {
        return Err(invalid("no frame size"));
    }
    if let Some(size) = sizes.iter().find(|s| **s < min || **s > MAX_FRAME_SIZE) {
        return Err(out_of_range(*size));
    }
    Ok(sizes)
}
