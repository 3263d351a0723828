//! Packed 32-bit colours and the 2×2 mipmap blender.
//!
//! Colours are packed as `0xAABBGGRR`, so `u32::to_le_bytes` yields the
//! `[r, g, b, a]` byte order that `TextureFormat::Rgba8UnormSrgb` expects.

/// Pack four 8-bit channels into one colour.
#[inline]
pub const fn pack(red: u8, green: u8, blue: u8, alpha: u8) -> u32 {
    (alpha as u32) << 24 | (blue as u32) << 16 | (green as u32) << 8 | red as u32
}

#[inline]
/// Red channel of a packed colour.
pub const fn red(color: u32) -> u8 {
    color as u8
}

#[inline]
/// Green channel of a packed colour.
pub const fn green(color: u32) -> u8 {
    (color >> 8) as u8
}

#[inline]
/// Blue channel of a packed colour.
pub const fn blue(color: u32) -> u8 {
    (color >> 16) as u8
}

#[inline]
/// Alpha channel of a packed colour.
pub const fn alpha(color: u32) -> u8 {
    (color >> 24) as u8
}

/// Split a colour into `[r, g, b, a]`.
#[inline]
pub const fn channels(color: u32) -> [u8; 4] {
    color.to_le_bytes()
}

/// Average a 2×2 block into the pixel one mipmap level up.
///
/// Each channel is summed and divided by four (rounding down), the same box
/// filter the linear mipmap path uses for ORM maps.
pub fn blend(top_left: u32, top_right: u32, bottom_left: u32, bottom_right: u32) -> u32 {
    let mut sum = [0u32; 4];
    for pixel in [top_left, top_right, bottom_left, bottom_right] {
        for (total, channel) in sum.iter_mut().zip(channels(pixel)) {
            *total += channel as u32;
        }
    }
    pack(
        (sum[0] / 4) as u8,
        (sum[1] / 4) as u8,
        (sum[2] / 4) as u8,
        (sum[3] / 4) as u8,
    )
}

/// Per-channel linear mix from `from` to `to` at `step / steps`.
///
/// `steps == 0` returns `from`.
pub fn mix(from: u32, to: u32, step: u32, steps: u32) -> u32 {
    if steps == 0 {
        return from;
    }
    let step = step.min(steps) as i64;
    let steps = steps as i64;
    let a = channels(from);
    let b = channels(to);
    let lerp = |i: usize| (a[i] as i64 + (b[i] as i64 - a[i] as i64) * step / steps) as u8;
    pack(lerp(0), lerp(1), lerp(2), lerp(3))
}
