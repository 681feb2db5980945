//! Generation policies and their runtime state.
//!
//! A [`GenSpec`] describes how the value of a field evolves from one frame to the next. At
//! bootstrap every spec is resolved to its numeric form (`GenSpec<u128>`) and turned into a
//! [`FieldState`], which is advanced once per frame.

use crate::catalog::{FieldDescriptor, ValueKind};
use crate::error::{CapacityError, ConfigError, Error, Result};
use crate::pattern;
use crate::splice::mask_u128;

use rand_core::*;
use rand_distr::{Distribution, Uniform, WeightedIndex};
use rand_pcg::Pcg32;
use serde::Deserialize;

fn default_step() -> u64 {
    1
}

/// One `(value, weight)` pair of a weighted distribution
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WeightedChoice<T> {
    pub value: T,
    pub weight: u32,
}

/// How a value evolves from one frame to the next.
///
/// `T` is `u64` for integer fields and `String` for pattern fields (MAC, IPv4, IPv6, preamble).
/// A `seed` of 0 draws the seed from the operating system.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum GenSpec<T> {
    /// Written once, then never touched again
    Fixed { value: T },
    /// Values in order, wrapping around if `repeat`
    ValueList {
        values: Vec<T>,
        #[serde(default)]
        repeat: bool,
    },
    /// `count` values from `start`, adding `step` each frame
    Increment {
        start: T,
        #[serde(default = "default_step")]
        step: u64,
        count: u64,
        #[serde(default)]
        repeat: bool,
    },
    /// `count` values from `start`, subtracting `step` each frame
    Decrement {
        start: T,
        #[serde(default = "default_step")]
        step: u64,
        count: u64,
        #[serde(default)]
        repeat: bool,
    },
    /// Uniform over the whole field width
    Random {
        #[serde(default)]
        seed: u64,
    },
    /// Uniform over `[min, max]`
    RandomInRange {
        min: T,
        max: T,
        #[serde(default)]
        seed: u64,
    },
    /// Weighted draws, for frame lengths only
    WeightedDistribution {
        choices: Vec<WeightedChoice<T>>,
        #[serde(default)]
        seed: u64,
    },
}

impl<T> GenSpec<T> {
    pub fn policy_name(&self) -> &'static str {
        match self {
            GenSpec::Fixed { .. } => "fixed",
            GenSpec::ValueList { .. } => "value_list",
            GenSpec::Increment { .. } => "increment",
            GenSpec::Decrement { .. } => "decrement",
            GenSpec::Random { .. } => "random",
            GenSpec::RandomInRange { .. } => "random_in_range",
            GenSpec::WeightedDistribution { .. } => "weighted_distribution",
        }
    }

    /// Convert every value of the spec, keeping the other parameters.
    pub fn try_map<U, E>(
        &self,
        mut f: impl FnMut(&T) -> std::result::Result<U, E>,
    ) -> std::result::Result<GenSpec<U>, E> {
        Ok(match self {
            GenSpec::Fixed { value } => GenSpec::Fixed { value: f(value)? },
            GenSpec::ValueList { values, repeat } => GenSpec::ValueList {
                values: values.iter().map(&mut f).collect::<std::result::Result<_, E>>()?,
                repeat: *repeat,
            },
            GenSpec::Increment {
                start,
                step,
                count,
                repeat,
            } => GenSpec::Increment {
                start: f(start)?,
                step: *step,
                count: *count,
                repeat: *repeat,
            },
            GenSpec::Decrement {
                start,
                step,
                count,
                repeat,
            } => GenSpec::Decrement {
                start: f(start)?,
                step: *step,
                count: *count,
                repeat: *repeat,
            },
            GenSpec::Random { seed } => GenSpec::Random { seed: *seed },
            GenSpec::RandomInRange { min, max, seed } => GenSpec::RandomInRange {
                min: f(min)?,
                max: f(max)?,
                seed: *seed,
            },
            GenSpec::WeightedDistribution { choices, seed } => GenSpec::WeightedDistribution {
                choices: choices
                    .iter()
                    .map(|c| -> std::result::Result<WeightedChoice<U>, E> {
                        Ok(WeightedChoice {
                            value: f(&c.value)?,
                            weight: c.weight,
                        })
                    })
                    .collect::<std::result::Result<_, E>>()?,
                seed: *seed,
            },
        })
    }

    /// The value of a `Fixed` spec
    pub fn fixed_value(&self) -> Option<&T> {
        match self {
            GenSpec::Fixed { value } => Some(value),
            _ => None,
        }
    }

    /// Whether a finite sequence starts over once its last value was produced. Random policies
    /// never run out.
    pub fn repeats(&self) -> bool {
        match self {
            GenSpec::Fixed { .. } => false,
            GenSpec::ValueList { repeat, .. }
            | GenSpec::Increment { repeat, .. }
            | GenSpec::Decrement { repeat, .. } => *repeat,
            GenSpec::Random { .. }
            | GenSpec::RandomInRange { .. }
            | GenSpec::WeightedDistribution { .. } => true,
        }
    }
}

impl GenSpec<u64> {
    pub fn widen(&self) -> GenSpec<u128> {
        self.try_map(|v| Ok::<_, std::convert::Infallible>(*v as u128))
            .unwrap_or_else(|e| match e {})
    }
}

/// Check that a numeric spec can produce values in a `bit_len` wide field.
pub fn validate(spec: &GenSpec<u128>, target: &str, bit_len: usize) -> Result<()> {
    let invalid = |reason: &str| -> Error {
        ConfigError::InvalidSpec {
            target: target.to_string(),
            reason: reason.to_string(),
        }
        .into()
    };
    let limit = mask_u128(bit_len);
    let check = |value: u128| -> Result<()> {
        if value > limit {
            Err(CapacityError::ValueTooWide {
                target: target.to_string(),
                value,
                bits: bit_len,
            }
            .into())
        } else {
            Ok(())
        }
    };
    match spec {
        GenSpec::Fixed { value } => check(*value),
        GenSpec::ValueList { values, .. } => {
            if values.is_empty() {
                return Err(invalid("empty value list"));
            }
            values.iter().try_for_each(|v| check(*v))
        }
        GenSpec::Increment {
            start, step, count, ..
        }
        | GenSpec::Decrement {
            start, step, count, ..
        } => {
            if *count == 0 {
                return Err(invalid("count must be at least 1"));
            }
            check(*step as u128)?;
            check(*start)
        }
        GenSpec::Random { .. } => Ok(()),
        GenSpec::RandomInRange { min, max, .. } => {
            if min > max {
                return Err(invalid("min is greater than max"));
            }
            check(*min)?;
            check(*max)
        }
        GenSpec::WeightedDistribution { choices, .. } => {
            if choices.iter().all(|c| c.weight == 0) {
                return Err(invalid("no choice with a positive weight"));
            }
            choices.iter().try_for_each(|c| check(c.value))
        }
    }
}

/// Generation spec of a header field, in the representation matching the field kind
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpec {
    Value(GenSpec<u64>),
    Pattern(GenSpec<String>),
}

impl From<u64> for FieldSpec {
    fn from(value: u64) -> Self {
        FieldSpec::Value(GenSpec::Fixed { value })
    }
}

impl From<&str> for FieldSpec {
    fn from(value: &str) -> Self {
        FieldSpec::Pattern(GenSpec::Fixed {
            value: value.to_string(),
        })
    }
}

impl From<GenSpec<u64>> for FieldSpec {
    fn from(spec: GenSpec<u64>) -> Self {
        FieldSpec::Value(spec)
    }
}

impl From<GenSpec<String>> for FieldSpec {
    fn from(spec: GenSpec<String>) -> Self {
        FieldSpec::Pattern(spec)
    }
}

impl FieldSpec {
    /// Numeric form of the spec for a given field, fully validated.
    pub fn resolve(&self, field: &FieldDescriptor) -> Result<GenSpec<u128>> {
        let spec = match (self, field.kind) {
            (FieldSpec::Value(spec), ValueKind::Integer) => spec.widen(),
            (FieldSpec::Pattern(spec), ValueKind::Pattern(kind)) => {
                spec.try_map(|text| pattern::parse(kind, text))?
            }
            (FieldSpec::Value(_), ValueKind::Pattern(kind)) => {
                return Err(ConfigError::TypeMismatch {
                    field: field.id,
                    expected: kind.name(),
                }
                .into())
            }
            (FieldSpec::Pattern(_), ValueKind::Integer) => {
                return Err(ConfigError::TypeMismatch {
                    field: field.id,
                    expected: "numeric",
                }
                .into())
            }
        };
        if matches!(spec, GenSpec::WeightedDistribution { .. }) {
            return Err(ConfigError::InvalidSpec {
                target: field.name.to_string(),
                reason: "weighted distributions only apply to frame lengths".to_string(),
            }
            .into());
        }
        validate(&spec, field.name, field.bit_len)?;
        Ok(spec)
    }
}

/// Result of advancing a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Draw {
    /// The field keeps changing
    Continue(u128),
    /// Last value of the field: it can be dropped from the mutable set
    Exhausted(u128),
}

impl Draw {
    pub fn value(&self) -> u128 {
        match self {
            Draw::Continue(v) | Draw::Exhausted(v) => *v,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Draw::Exhausted(_))
    }
}

pub(crate) fn new_rng(seed: u64) -> Pcg32 {
    match seed {
        0 => Pcg32::from_entropy(),
        s => Pcg32::seed_from_u64(s),
    }
}

#[derive(Debug, Clone)]
enum Sampler {
    Uniform(Uniform<u128>),
    Weighted(WeightedIndex<u32>),
}

/// Runtime state of a mutable field
#[derive(Debug, Clone)]
pub struct FieldState {
    spec: GenSpec<u128>,
    bit_len: usize,
    current: u128,
    index: usize,
    iteration: u64,
    random: Option<(Pcg32, Sampler)>,
}

impl FieldState {
    /// Build the state of a validated spec.
    pub fn new(spec: GenSpec<u128>, bit_len: usize) -> std::result::Result<Self, ConfigError> {
        let random = match &spec {
            GenSpec::Random { seed } => Some((
                new_rng(*seed),
                Sampler::Uniform(Uniform::new_inclusive(0, mask_u128(bit_len))),
            )),
            GenSpec::RandomInRange { min, max, seed } => Some((
                new_rng(*seed),
                Sampler::Uniform(Uniform::new_inclusive(*min, *max)),
            )),
            GenSpec::WeightedDistribution { choices, seed } => {
                let weights = WeightedIndex::new(choices.iter().map(|c| c.weight)).map_err(|e| {
                    ConfigError::InvalidSpec {
                        target: "weighted distribution".to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Some((new_rng(*seed), Sampler::Weighted(weights)))
            }
            _ => None,
        };
        let current = match &spec {
            GenSpec::Increment { start, .. } | GenSpec::Decrement { start, .. } => *start,
            _ => 0,
        };
        Ok(FieldState {
            spec,
            bit_len,
            current,
            index: 0,
            iteration: 0,
            random,
        })
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn spec(&self) -> &GenSpec<u128> {
        &self.spec
    }

    /// Value for the next frame.
    pub fn next(&mut self) -> Draw {
        let mask = mask_u128(self.bit_len);
        match &self.spec {
            GenSpec::Fixed { value } => Draw::Exhausted(*value),
            GenSpec::ValueList { values, repeat } => {
                let value = values[self.index];
                self.index += 1;
                if self.index < values.len() {
                    Draw::Continue(value)
                } else if *repeat {
                    self.index = 0;
                    Draw::Continue(value)
                } else {
                    Draw::Exhausted(value)
                }
            }
            GenSpec::Increment {
                start,
                step,
                count,
                repeat,
            }
            | GenSpec::Decrement {
                start,
                step,
                count,
                repeat,
            } => {
                let value = self.current;
                if self.iteration + 1 < *count {
                    self.current = match self.spec {
                        GenSpec::Increment { .. } => value.wrapping_add(*step as u128) & mask,
                        _ => value.wrapping_sub(*step as u128) & mask,
                    };
                    self.iteration += 1;
                    Draw::Continue(value)
                } else if *repeat {
                    self.current = *start;
                    self.iteration = 0;
                    Draw::Continue(value)
                } else {
                    Draw::Exhausted(value)
                }
            }
            GenSpec::Random { .. } | GenSpec::RandomInRange { .. } => {
                let value = match &mut self.random {
                    Some((rng, Sampler::Uniform(dist))) => dist.sample(rng),
                    _ => 0,
                };
                Draw::Continue(value)
            }
            GenSpec::WeightedDistribution { choices, .. } => {
                let value = match &mut self.random {
                    Some((rng, Sampler::Weighted(dist))) => choices[dist.sample(rng)].value,
                    _ => 0,
                };
                Draw::Continue(value)
            }
        }
    }
}
