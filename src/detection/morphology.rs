use image::Luma;
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{MASK_BACKGROUND, MASK_FOREGROUND, Mask};

/// How pixels outside the image are synthesized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BorderMode {
    /// A fixed border value
    #[default]
    Constant,
    /// `aaa|abcd|ddd`
    Replicate,
    /// `cba|abcd|dcb`
    Reflect,
    /// `dcb|abcd|cba`
    #[serde(rename = "reflect-101")]
    Reflect101,
    /// `bcd|abcd|abc`
    Wrap,
}

impl BorderMode {
    /// Map coordinate `p` into `0..len`, or `None` when the constant border applies.
    pub(crate) fn index(self, p: i64, len: i64) -> Option<i64> {
        if (0..len).contains(&p) {
            return Some(p);
        }
        match self {
            BorderMode::Constant => None,
            BorderMode::Replicate => Some(p.clamp(0, len - 1)),
            BorderMode::Reflect => {
                let period = 2 * len;
                let m = p.rem_euclid(period);
                Some(if m < len { m } else { period - 1 - m })
            }
            BorderMode::Reflect101 if len == 1 => Some(0),
            BorderMode::Reflect101 => {
                let period = 2 * len - 2;
                let m = p.rem_euclid(period);
                Some(if m < len { m } else { period - m })
            }
            BorderMode::Wrap => Some(p.rem_euclid(len)),
        }
    }
}

/// Erode or dilate settings as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologyConfig {
    /// Rows of 0/1 cells; absent means a 3x3 square.
    pub kernel: Option<Vec<Vec<u8>>>,
    /// `[-1, -1]` anchors at the kernel center.
    pub anchor: [i32; 2],
    pub iterations: f64,
    pub border: BorderMode,
    /// Constant border value; absent means neutral for the operation.
    pub border_value: Option<f64>,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            kernel: None,
            anchor: [-1, -1],
            iterations: 1.0,
            border: BorderMode::Constant,
            border_value: None,
        }
    }
}

/// Iteration count as the tuned configurations expect it: `floor(x + 0.5)`.
///
/// This is round-half-up, so `1.5` gives 2 and `-0.5` gives 0. Kept for
/// compatibility with existing fractional settings.
pub fn rounded_iterations(iterations: f64) -> i64 {
    (iterations + 0.5).floor() as i64
}

/// Saturate a configured border value to a byte, then snap it to the mask's two levels.
fn binary_border_value(value: f64) -> u8 {
    if value.round_ties_even().clamp(0.0, 255.0) as u8 == 0 {
        MASK_BACKGROUND
    } else {
        MASK_FOREGROUND
    }
}

/// Non-zero cells of a structuring element as offsets from its anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    offsets: Vec<(i64, i64)>,
}

impl StructuringElement {
    pub fn new(rows: &[Vec<u8>], anchor: [i32; 2]) -> Result<Self, ConfigError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if height == 0 || width == 0 {
            return Err(ConfigError::Kernel("kernel is empty".to_string()));
        }
        if rows.iter().any(|row| row.len() != width) {
            return Err(ConfigError::Kernel("kernel rows differ in length".to_string()));
        }

        let resolve = |a: i32, len: usize| -> Result<i64, ConfigError> {
            match a {
                -1 => Ok(len as i64 / 2),
                a if a >= 0 && (a as usize) < len => Ok(a as i64),
                a => Err(ConfigError::Kernel(format!(
                    "anchor {a} outside kernel of size {len}"
                ))),
            }
        };
        let ax = resolve(anchor[0], width)?;
        let ay = resolve(anchor[1], height)?;

        let offsets: Vec<(i64, i64)> = rows
            .iter()
            .enumerate()
            .flat_map(|(y, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, cell)| **cell != 0)
                    .map(move |(x, _)| (x as i64 - ax, y as i64 - ay))
            })
            .collect();
        if offsets.is_empty() {
            return Err(ConfigError::Kernel("kernel has no set cells".to_string()));
        }
        Ok(Self { offsets })
    }

    pub fn square(anchor: [i32; 2]) -> Result<Self, ConfigError> {
        Self::new(&[vec![1; 3], vec![1; 3], vec![1; 3]], anchor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Erode,
    Dilate,
}

impl Op {
    fn neutral(self) -> u8 {
        match self {
            Op::Erode => u8::MAX,
            Op::Dilate => u8::MIN,
        }
    }

    fn combine(self, a: u8, b: u8) -> u8 {
        match self {
            Op::Erode => a.min(b),
            Op::Dilate => a.max(b),
        }
    }
}

/// Resolved erode/dilate parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Morphology {
    /// `None` is the default centered 3x3 square.
    element: Option<StructuringElement>,
    iterations: u32,
    border: BorderMode,
    border_value: Option<u8>,
}

impl Morphology {
    pub fn new(config: &MorphologyConfig, op: &'static str) -> Result<Self, ConfigError> {
        let rounded = rounded_iterations(config.iterations);
        if rounded < 0 {
            return Err(ConfigError::NegativeIterations { op, rounded });
        }

        let element = match (&config.kernel, config.anchor) {
            (None, [-1, -1]) | (None, [1, 1]) => None,
            (None, anchor) => Some(StructuringElement::square(anchor)?),
            (Some(rows), anchor) => Some(StructuringElement::new(rows, anchor)?),
        };

        Ok(Self {
            element,
            iterations: rounded.min(u32::MAX as i64) as u32,
            border: config.border,
            border_value: config.border_value.map(binary_border_value),
        })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn erode(&self, mask: &Mask) -> Mask {
        self.apply(mask, Op::Erode)
    }

    pub fn dilate(&self, mask: &Mask) -> Mask {
        self.apply(mask, Op::Dilate)
    }

    fn apply(&self, mask: &Mask, op: Op) -> Mask {
        if self.iterations == 0 {
            return mask.clone();
        }

        // n passes of a 3x3 square with a neutral border equal one pass at
        // chessboard distance n.
        let neutral_border = self.border == BorderMode::Constant && self.border_value.is_none();
        if self.element.is_none() && neutral_border && self.iterations <= u8::MAX as u32 {
            let k = self.iterations as u8;
            return match op {
                Op::Erode => morphology::erode(mask, Norm::LInf, k),
                Op::Dilate => morphology::dilate(mask, Norm::LInf, k),
            };
        }

        let square;
        let element = match &self.element {
            Some(element) => element,
            None => {
                square = StructuringElement {
                    offsets: (-1..=1)
                        .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
                        .collect(),
                };
                &square
            }
        };
        let border_value = self.border_value.unwrap_or(op.neutral());

        let mut current = mask.clone();
        for _ in 0..self.iterations {
            current = apply_once(&current, element, self.border, border_value, op);
        }
        current
    }
}

fn apply_once(
    src: &Mask,
    element: &StructuringElement,
    border: BorderMode,
    border_value: u8,
    op: Op,
) -> Mask {
    let (width, height) = src.dimensions();
    Mask::from_fn(width, height, |x, y| {
        let value = element.offsets.iter().fold(op.neutral(), |acc, &(dx, dy)| {
            let sx = border.index(x as i64 + dx, width as i64);
            let sy = border.index(y as i64 + dy, height as i64);
            let sample = match (sx, sy) {
                (Some(sx), Some(sy)) => src.get_pixel(sx as u32, sy as u32)[0],
                _ => border_value,
            };
            op.combine(acc, sample)
        });
        Luma([value])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::circles::{BlobParams, find_blobs};
    use rstest::rstest;

    fn mask_with_rect(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> Mask {
        Mask::from_fn(width, height, |x, y| {
            let inside = (x0..=x1).contains(&x) && (y0..=y1).contains(&y);
            Luma([if inside { MASK_FOREGROUND } else { MASK_BACKGROUND }])
        })
    }

    fn foreground_count(mask: &Mask) -> usize {
        mask.pixels().filter(|p| p[0] == MASK_FOREGROUND).count()
    }

    #[rstest]
    #[case(1.0, 1)]
    #[case(1.5, 2)]
    #[case(2.49, 2)]
    #[case(0.49, 0)]
    #[case(-0.5, 0)]
    #[case(-0.51, -1)]
    fn test_rounded_iterations(#[case] raw: f64, #[case] expected: i64) {
        assert_eq!(rounded_iterations(raw), expected);
    }

    #[rstest]
    #[case(BorderMode::Replicate, -2, 0)]
    #[case(BorderMode::Replicate, 6, 3)]
    #[case(BorderMode::Reflect, -1, 0)]
    #[case(BorderMode::Reflect, 4, 3)]
    #[case(BorderMode::Reflect101, -1, 1)]
    #[case(BorderMode::Reflect101, 4, 2)]
    #[case(BorderMode::Wrap, -1, 3)]
    #[case(BorderMode::Wrap, 5, 1)]
    fn test_border_index(#[case] mode: BorderMode, #[case] p: i64, #[case] expected: i64) {
        assert_eq!(mode.index(p, 4), Some(expected));
    }

    #[rstest]
    #[case("constant", BorderMode::Constant)]
    #[case("replicate", BorderMode::Replicate)]
    #[case("reflect", BorderMode::Reflect)]
    #[case("reflect-101", BorderMode::Reflect101)]
    #[case("wrap", BorderMode::Wrap)]
    fn test_border_mode_names(#[case] name: &str, #[case] expected: BorderMode) {
        let config: MorphologyConfig = toml::from_str(&format!("border = \"{name}\"")).unwrap();
        assert_eq!(config.border, expected);
    }

    #[test]
    fn test_constant_border_has_no_index() {
        assert_eq!(BorderMode::Constant.index(-1, 4), None);
        assert_eq!(BorderMode::Constant.index(2, 4), Some(2));
    }

    #[test]
    fn test_negative_iterations_rejected() {
        let config = MorphologyConfig {
            iterations: -2.0,
            ..Default::default()
        };
        assert!(matches!(
            Morphology::new(&config, "erode"),
            Err(ConfigError::NegativeIterations { rounded: -2, .. })
        ));
    }

    #[test]
    fn test_kernel_validation() {
        assert!(StructuringElement::new(&[], [-1, -1]).is_err());
        assert!(StructuringElement::new(&[vec![1, 1], vec![1]], [-1, -1]).is_err());
        assert!(StructuringElement::new(&[vec![0, 0]], [-1, -1]).is_err());
        assert!(StructuringElement::new(&[vec![1, 1]], [2, 0]).is_err());
        assert!(StructuringElement::new(&[vec![1, 1]], [1, 0]).is_ok());
    }

    #[test]
    fn test_erode_then_dilate_removes_speck() {
        let mut mask = mask_with_rect(20, 20, 5, 5, 12, 12);
        mask.put_pixel(17, 2, Luma([MASK_FOREGROUND]));
        let morph = Morphology::new(&MorphologyConfig::default(), "erode").unwrap();

        let opened = morph.dilate(&morph.erode(&mask));
        assert_eq!(opened.get_pixel(17, 2)[0], MASK_BACKGROUND);
        assert_eq!(foreground_count(&opened), 64);
    }

    #[test]
    fn test_default_path_matches_explicit_kernel() {
        let mask = mask_with_rect(24, 24, 6, 8, 15, 17);
        let default = Morphology::new(
            &MorphologyConfig {
                iterations: 2.0,
                ..Default::default()
            },
            "erode",
        )
        .unwrap();
        let explicit = Morphology::new(
            &MorphologyConfig {
                kernel: Some(vec![vec![1; 3]; 3]),
                iterations: 2.0,
                ..Default::default()
            },
            "erode",
        )
        .unwrap();

        assert_eq!(default.erode(&mask), explicit.erode(&mask));
        assert_eq!(default.dilate(&mask), explicit.dilate(&mask));
    }

    #[test]
    fn test_zero_border_value_erodes_edges() {
        let mask = mask_with_rect(6, 6, 0, 0, 5, 5);
        let morph = Morphology::new(
            &MorphologyConfig {
                border_value: Some(-1.0),
                ..Default::default()
            },
            "erode",
        )
        .unwrap();
        let eroded = morph.erode(&mask);
        assert_eq!(eroded.get_pixel(0, 0)[0], MASK_BACKGROUND);
        assert_eq!(eroded.get_pixel(2, 2)[0], MASK_FOREGROUND);
        assert_eq!(foreground_count(&eroded), 16);
    }

    #[rstest]
    #[case(100.0)]
    #[case(1.0)]
    #[case(254.6)]
    #[case(1000.0)]
    fn test_custom_border_value_keeps_mask_binary(#[case] border_value: f64) {
        let solid = mask_with_rect(10, 10, 0, 0, 9, 9);
        let morph = Morphology::new(
            &MorphologyConfig {
                border_value: Some(border_value),
                ..Default::default()
            },
            "erode",
        )
        .unwrap();

        let eroded = morph.erode(&solid);
        let dilated = morph.dilate(&Mask::new(10, 10));
        for mask in [&eroded, &dilated] {
            assert!(
                mask.pixels()
                    .all(|p| p[0] == MASK_FOREGROUND || p[0] == MASK_BACKGROUND)
            );
        }
        // A non-zero border counts as foreground, so the solid region survives whole.
        assert_eq!(foreground_count(&eroded), 100);
        assert_eq!(find_blobs(&eroded, &BlobParams::default()).len(), 1);
        assert_eq!(dilated.get_pixel(0, 0)[0], MASK_FOREGROUND);
        assert_eq!(dilated.get_pixel(5, 5)[0], MASK_BACKGROUND);
    }

    #[test]
    fn test_fractional_iterations_round_half_up() {
        let mask = mask_with_rect(30, 30, 5, 5, 24, 24);
        let morph = Morphology::new(
            &MorphologyConfig {
                iterations: 1.5,
                ..Default::default()
            },
            "erode",
        )
        .unwrap();
        assert_eq!(morph.iterations(), 2);
        // 20x20 square shrinks by two pixels per side.
        assert_eq!(foreground_count(&morph.erode(&mask)), 16 * 16);
    }

    #[test]
    fn test_anchor_shifts_dilation() {
        let mut mask = Mask::new(5, 5);
        mask.put_pixel(2, 2, Luma([MASK_FOREGROUND]));
        let morph = Morphology::new(
            &MorphologyConfig {
                kernel: Some(vec![vec![1, 1]]),
                anchor: [0, 0],
                ..Default::default()
            },
            "dilate",
        )
        .unwrap();
        let dilated = morph.dilate(&mask);
        // dst(x) = max(src(x), src(x + 1)): the pixel spreads to the left.
        assert_eq!(dilated.get_pixel(1, 2)[0], MASK_FOREGROUND);
        assert_eq!(dilated.get_pixel(3, 2)[0], MASK_BACKGROUND);
    }
}
