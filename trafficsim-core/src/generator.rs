use crate::{
    defaults::POISSON_NORMAL_THRESHOLD,
    tag::{Tag, TagWeight},
};
use rand_core::Rng;
use std::f64::consts::TAU;

/// Uniform sample in `[0, 1)`.
#[inline]
pub(crate) fn uniform<R: Rng>(rng: &mut R) -> f64 {
    let bits = rng.next_u64();
    (bits as f64) * (1.0 / (u64::MAX as f64 + 1.0))
}

/// Uniform index in `0..len`. `len` must not be `0`.
#[inline]
pub(crate) fn uniform_index<R: Rng>(rng: &mut R, len: usize) -> usize {
    debug_assert!(len > 0, "cannot pick from an empty set");
    let index = (uniform(rng) * len as f64) as usize;
    index.min(len - 1)
}

/// Draw the number of arrivals of a Poisson process of mean `lambda`.
///
/// Up to [`POISSON_NORMAL_THRESHOLD`] the sample is exact (Knuth's
/// product of uniforms). Above, it is approximated by a normal
/// distribution of mean and variance `lambda`, rounded and clamped at
/// `0`, which keeps the cost constant for large rates.
///
/// A non-positive (or NaN) `lambda` always yields `0`.
///
/// ```
/// use rand_chacha::ChaChaRng;
/// use rand_core::SeedableRng as _;
/// use trafficsim_core::generator::poisson_sample;
///
/// let mut rng = ChaChaRng::seed_from_u64(7);
/// assert_eq!(poisson_sample(0.0, &mut rng), 0);
/// assert_eq!(poisson_sample(-3.0, &mut rng), 0);
/// ```
pub fn poisson_sample<R: Rng>(lambda: f64, rng: &mut R) -> u64 {
    if lambda.is_nan() || lambda <= 0.0 {
        return 0;
    }

    if lambda <= POISSON_NORMAL_THRESHOLD {
        let limit = (-lambda).exp();
        let mut count = 0;
        let mut product = 1.0;
        loop {
            product *= uniform(rng);
            if product <= limit {
                return count;
            }
            count += 1;
        }
    }

    // Box-Muller, `1 - u` keeps the logarithm away from `0`
    let u1 = 1.0 - uniform(rng);
    let u2 = uniform(rng);
    let z = (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos();

    (lambda.sqrt() * z + lambda).max(0.0).round() as u64
}

/// Weighted random draw of the tag of a freshly generated request.
///
/// Entries with a non-positive weight are never drawn. Without a usable
/// distribution (absent, empty or with no positive weight) the
/// [default tag] is returned.
///
/// [default tag]: Tag::default_tag
pub fn pick_tag<R: Rng>(distribution: Option<&[TagWeight]>, rng: &mut R) -> Tag {
    let Some(distribution) = distribution else {
        return Tag::default_tag();
    };

    let total: f64 = distribution
        .iter()
        .map(|entry| entry.weight)
        .filter(|weight| *weight > 0.0)
        .sum();
    if total <= 0.0 {
        return Tag::default_tag();
    }

    let mut remaining = uniform(rng) * total;
    let mut last = None;
    for entry in distribution.iter().filter(|entry| entry.weight > 0.0) {
        remaining -= entry.weight;
        if remaining < 0.0 {
            return entry.tag.clone();
        }
        last = Some(&entry.tag);
    }

    // floating point leftovers land on the last drawable tag
    last.cloned().unwrap_or_default()
}
