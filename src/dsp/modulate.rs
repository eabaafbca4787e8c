//! Modulation arithmetic shared by the graph kernels.

/*
Frequency Modulation and Ratio Scaling
======================================

In FM synthesis one oscillator (the modulator) continuously pushes the
frequency of another (the carrier) up and down. Everything interesting is
expressed as ratios of a single base frequency.

Vocabulary
----------

  carrier           The oscillator you hear.

  modulator         The oscillator that wobbles the carrier's frequency.

  harmonicity       modulator frequency / carrier frequency.
                    Integer ratios give harmonic spectra (bells in tune),
                    irrational ratios give clangorous, metallic spectra.

  modulation index  Peak frequency deviation / modulator frequency, roughly
                    "how many sidebands". Here it scales the carrier
                    frequency, the way the graph wires it:
                      deviation = carrier_freq × index × modulator_output

  ratio table       A list of per-partial multipliers of the base frequency.


The Wiring
----------

    frequency ──┬──────────────────────────────────► carrier.frequency (Σ)
                ├─► × harmonicity ─► modulator.frequency          ▲
                └─► × index ─► gain.in                            │
                      modulator.out ─► gain.gain                  │
                                       gain.out ──────────────────┘

The carrier's frequency port is a summing port: it hears the base
frequency plus the deviation term.


Morphing Between Ratio Tables
-----------------------------

One control value c in [0, 1] moves a whole bank of partials between a
harmonic and an inharmonic series:

    ratio_i(c) = harmonic_i + (inharmonic_i - harmonic_i) × c
    freq_i     = ratio_i(c) × base_frequency

The first line is a linear range remap (scale), the second a multiply.
At c = 0 the ratios are exactly the harmonic table, at c = 1 exactly the
inharmonic one.


Block-Rate Parameters
---------------------

Oscillator frequency is read every sample. Filter coefficients are costly
to recompute, so filters read their cutoff and Q once per block as the
block average of the incoming control signal.
*/

/// Linearly remap `value` from `in_low..in_high` onto `out_low..out_high`.
///
/// Values outside the input range extrapolate. The range ends map exactly
/// onto `out_low` and `out_high`.
#[inline]
pub fn scale_range(value: f32, in_low: f32, in_high: f32, out_low: f32, out_high: f32) -> f32 {
    let x = (value - in_low) / (in_high - in_low);
    out_low * (1.0 - x) + out_high * x
}

/// Calculate the average of a control signal over a block.
///
/// Used for block-rate parameters: one value stands in for the entire
/// block's worth of samples.
#[inline]
pub fn block_average(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f32>() / samples.len() as f32
}

/// Convert decibels to linear gain.
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}
