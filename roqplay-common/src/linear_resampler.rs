/// Linear interpolation between two sample rates, pulling source samples
/// from an iterator as the output position advances past them. A drained
/// source decays to silence.
pub struct LinearResampler {
    from_rate: u32,
    to_rate: u32,

    current: f32,
    next: f32,
    fract_pos: u32,
}

impl LinearResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> LinearResampler {
        fn gcd(a: u32, b: u32) -> u32 {
            if b == 0 {
                a
            } else {
                gcd(b, a % b)
            }
        }

        let divisor = gcd(from_rate, to_rate);
        LinearResampler {
            from_rate: from_rate / divisor,
            to_rate: to_rate / divisor,
            current: 0.0,
            next: 0.0,
            fract_pos: 0,
        }
    }

    /// Produce one output sample, consuming source samples as needed.
    pub fn next_sample(&mut self, input: &mut dyn Iterator<Item = f32>) -> f32 {
        let num = self.fract_pos as f32;
        let denom = self.to_rate as f32;
        let out = (self.current * (denom - num) + self.next * num) / denom;

        self.fract_pos += self.from_rate;
        while self.fract_pos > self.to_rate {
            self.fract_pos -= self.to_rate;
            self.current = self.next;
            self.next = input.next().unwrap_or(0.0);
        }

        out
    }
}

#[test]
fn equal_rates_pass_samples_through() {
    let mut resampler = LinearResampler::new(22_050, 22_050);
    let source = [1.0f32; 16];
    let mut input = source.iter().copied();

    // After the two-sample priming lag, output tracks the input exactly.
    let output: Vec<f32> = (0..8).map(|_| resampler.next_sample(&mut input)).collect();
    assert_eq!(output[3..], [1.0, 1.0, 1.0, 1.0, 1.0]);
}

#[test]
fn upsampling_produces_proportionally_more_samples() {
    let mut resampler = LinearResampler::new(1, 2);
    let mut input = (0..4).map(|n| n as f32);

    // Doubling the rate: each source step spans two output samples, so the
    // output ramp rises at half the source slope.
    let output: Vec<f32> = (0..6).map(|_| resampler.next_sample(&mut input)).collect();
    for pair in output.windows(2) {
        assert!(pair[1] >= pair[0]);
    }
}
