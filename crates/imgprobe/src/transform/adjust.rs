use image::{Rgba, RgbaImage};

use super::{Narrowing, TransformKind};

/// A per-channel photometric adjustment.
///
/// `Contrast` uses the same formula as `Brightness`. Both are kept as
/// separate artifacts so existing outputs stay reproducible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Adjustment {
    Brightness(f64),
    Contrast(f64),
    Gamma(f64),
    ColorBalance { red: f64, green: f64, blue: f64 },
}

#[derive(Clone, Copy)]
enum ChannelOp {
    Multiply(f64),
    Divide(f64),
}

impl ChannelOp {
    #[inline]
    fn apply(self, channel: u8, narrowing: Narrowing) -> u8 {
        let value = f64::from(channel);
        let scaled = match self {
            ChannelOp::Multiply(factor) => value * factor,
            ChannelOp::Divide(factor) => value / factor,
        };
        narrowing.narrow(scaled)
    }
}

impl Adjustment {
    pub fn kind(&self) -> TransformKind {
        match self {
            Adjustment::Brightness(_) => TransformKind::Brightness,
            Adjustment::Contrast(_) => TransformKind::Contrast,
            Adjustment::Gamma(_) => TransformKind::Gamma,
            Adjustment::ColorBalance { .. } => TransformKind::Color,
        }
    }

    fn channel_ops(&self) -> [ChannelOp; 3] {
        match *self {
            Adjustment::Brightness(f) | Adjustment::Contrast(f) => [ChannelOp::Multiply(f); 3],
            Adjustment::Gamma(f) => [ChannelOp::Divide(f); 3],
            Adjustment::ColorBalance { red, green, blue } => [
                ChannelOp::Multiply(red),
                ChannelOp::Multiply(green),
                ChannelOp::Multiply(blue),
            ],
        }
    }
}

/// Applies `adjustment` to every pixel of `source`, returning a new image of
/// the same dimensions. Alpha is copied through unscaled.
pub fn apply(source: &RgbaImage, adjustment: Adjustment, narrowing: Narrowing) -> RgbaImage {
    let [op_r, op_g, op_b] = adjustment.channel_ops();
    let mut adjusted = RgbaImage::new(source.width(), source.height());

    for (dst, src) in adjusted.pixels_mut().zip(source.pixels()) {
        let Rgba([r, g, b, a]) = *src;
        *dst = Rgba([
            op_r.apply(r, narrowing),
            op_g.apply(g, narrowing),
            op_b.apply(b, narrowing),
            a,
        ]);
    }

    adjusted
}
