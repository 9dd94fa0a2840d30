//! Sample value transformations: modality rescale and
//! the window level (VOI LUT) functions.
use snafu::Snafu;

/// A modality rescale function,
/// defined by a rescale slope and a rescale intercept.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rescale {
    /// the rescale slope
    pub slope: f64,
    /// the rescale intercept
    pub intercept: f64,
}

impl Rescale {
    /// Create a new rescale function.
    #[inline]
    pub fn new(slope: f64, intercept: f64) -> Self {
        Rescale { slope, intercept }
    }

    /// The identity rescale.
    #[inline]
    pub fn identity() -> Self {
        Rescale::new(1., 0.)
    }

    /// Apply the rescale function to a stored value.
    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        self.slope * value + self.intercept
    }
}

/// A known VOI LUT function descriptor.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub enum VoiLutFunction {
    /// LINEAR (PS3.3 C.11.2.1.2)
    #[default]
    Linear,
    /// LINEAR_EXACT (PS3.3 C.11.2.1.3.2)
    LinearExact,
    /// SIGMOID (PS3.3 C.11.2.1.3.1)
    Sigmoid,
}

/// Unrecognized VOI LUT function name.
#[derive(Debug, Copy, Clone, PartialEq, Snafu)]
#[snafu(display("unrecognized VOI LUT function"))]
pub struct FromVoiLutFunctionError {
    _private: (),
}

impl std::convert::TryFrom<&str> for VoiLutFunction {
    type Error = FromVoiLutFunctionError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim_matches(['\0', ' ']) {
            "LINEAR" => Ok(Self::Linear),
            "LINEAR_EXACT" => Ok(Self::LinearExact),
            "SIGMOID" => Ok(Self::Sigmoid),
            _ => Err(FromVoiLutFunctionError { _private: () }),
        }
    }
}

/// The parameters of a single window level:
/// the window center and the window width.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WindowLevel {
    /// the window center
    pub center: f64,
    /// the window width, at least 1 (or 0 for LINEAR_EXACT)
    pub width: f64,
}

/// A window level transformation,
/// mapping rescaled sample values into the normalized range `[0, 1]`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WindowLevelTransform {
    function: VoiLutFunction,
    window: WindowLevel,
}

impl WindowLevelTransform {
    /// Create a new window level transformation.
    ///
    /// The window width is clamped to the minimum admitted
    /// by the given function.
    pub fn new(function: VoiLutFunction, window: WindowLevel) -> Self {
        WindowLevelTransform {
            function,
            window: WindowLevel {
                center: window.center,
                width: match function {
                    VoiLutFunction::LinearExact => window.width.max(0.),
                    VoiLutFunction::Linear | VoiLutFunction::Sigmoid => window.width.max(1.),
                },
            },
        }
    }

    /// Create a new window level transformation with the LINEAR function.
    pub fn linear(window: WindowLevel) -> Self {
        Self::new(VoiLutFunction::Linear, window)
    }

    /// Apply the window to a rescaled value,
    /// producing a normalized output in `[0, 1]`.
    pub fn apply(&self, value: f64) -> f64 {
        let WindowLevel { center, width } = self.window;
        match self.function {
            VoiLutFunction::Linear => {
                // C.11.2.1.2.1
                let min = center - 0.5 - (width - 1.) / 2.;
                let max = center - 0.5 + (width - 1.) / 2.;
                if value <= min {
                    0.
                } else if value > max {
                    1.
                } else {
                    (value - (center - 0.5)) / (width - 1.) + 0.5
                }
            }
            VoiLutFunction::LinearExact => {
                let v = (value - (center - width / 2.)) / width;
                v.clamp(0., 1.)
            }
            VoiLutFunction::Sigmoid => 1. / (1. + f64::exp(-4. * (value - center) / width)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_window_spec_points() {
        let t = WindowLevelTransform::linear(WindowLevel {
            center: 100.,
            width: 200.,
        });
        assert_eq!(t.apply(-100.), 0.0);
        let mid = t.apply(100.);
        assert!((mid - 0.5).abs() < 0.01, "got {}", mid);
        assert_eq!(t.apply(300.), 1.0);
    }

    #[test]
    fn linear_is_monotone_non_decreasing() {
        let t = WindowLevelTransform::linear(WindowLevel {
            center: 50.,
            width: 300.,
        });
        let mut last = f64::MIN;
        for p in (-300..400).map(f64::from) {
            let y = t.apply(p);
            assert!(y >= last - f64::EPSILON);
            assert!((0. ..=1.).contains(&y));
            last = y;
        }
    }

    #[test]
    fn linear_exact_strictly_increases_inside_window() {
        let t = WindowLevelTransform::new(
            VoiLutFunction::LinearExact,
            WindowLevel {
                center: 0.,
                width: 100.,
            },
        );
        let mut last = t.apply(-49.9);
        for i in -49..50 {
            let y = t.apply(f64::from(i));
            assert!(y > last);
            last = y;
        }
        assert_eq!(t.apply(-51.), 0.);
        assert_eq!(t.apply(51.), 1.);
    }

    #[test]
    fn sigmoid_window_midpoint() {
        let t = WindowLevelTransform::new(
            VoiLutFunction::Sigmoid,
            WindowLevel {
                center: 128.,
                width: 64.,
            },
        );
        assert!((t.apply(128.) - 0.5).abs() < 1e-9);
        assert!(t.apply(0.) < 0.01);
        assert!(t.apply(255.) > 0.99);
    }
}
