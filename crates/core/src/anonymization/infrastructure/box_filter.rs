/// Rectangle within a frame buffer, in whole pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoiRect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

/// Region side length divided by this gives the blur kernel length.
pub const BLUR_FACTOR: usize = 2;

const MIN_KERNEL: usize = 3;

/// Kernel length for a region side: half the side, at least 3.
pub fn kernel_for(side: usize) -> usize {
    (side / BLUR_FACTOR).max(MIN_KERNEL)
}

/// Copy a rectangular ROI out of interleaved frame data into `roi`.
pub fn extract_roi(data: &[u8], frame_width: usize, channels: usize, rect: RoiRect, roi: &mut Vec<u8>) {
    let row_len = rect.w * channels;
    roi.resize(rect.h * row_len, 0);
    for row in 0..rect.h {
        let src = ((rect.y + row) * frame_width + rect.x) * channels;
        roi[row * row_len..(row + 1) * row_len].copy_from_slice(&data[src..src + row_len]);
    }
}

/// Copy ROI pixels back into the frame where `mask(col, row)` holds.
pub fn write_roi_back_masked(
    data: &mut [u8],
    roi: &[u8],
    frame_width: usize,
    channels: usize,
    rect: RoiRect,
    mask: impl Fn(usize, usize) -> bool,
) {
    for row in 0..rect.h {
        for col in 0..rect.w {
            if !mask(col, row) {
                continue;
            }
            let dst = ((rect.y + row) * frame_width + rect.x + col) * channels;
            let src = (row * rect.w + col) * channels;
            data[dst..dst + channels].copy_from_slice(&roi[src..src + channels]);
        }
    }
}

/// Separable mean filter with a `kx` by `ky` window, edges replicated.
///
/// The window for output `i` spans `i - k/2 ..= i - k/2 + k - 1`, so even
/// kernels lean one pixel towards the origin.
pub fn box_blur(
    data: &mut [u8],
    width: usize,
    height: usize,
    channels: usize,
    (kx, ky): (usize, usize),
    temp: &mut Vec<u32>,
) {
    if width == 0 || height == 0 {
        return;
    }
    temp.clear();
    temp.resize(width * height * channels, 0);

    // Horizontal pass: data -> temp (window sums)
    let kx = kx.max(1);
    for y in 0..height {
        for c in 0..channels {
            let at = |x: isize| data[(y * width + clamp_index(x, width)) * channels + c] as u32;
            let lo = -((kx / 2) as isize);
            let mut sum: u32 = (lo..lo + kx as isize).map(at).sum();
            for x in 0..width {
                temp[(y * width + x) * channels + c] = sum;
                let xi = x as isize;
                sum = sum + at(xi + lo + kx as isize) - at(xi + lo);
            }
        }
    }

    // Vertical pass: temp -> data (means)
    let ky = ky.max(1);
    let norm = (kx * ky) as u32;
    for x in 0..width {
        for c in 0..channels {
            let at = |y: isize| temp[(clamp_index(y, height) * width + x) * channels + c];
            let lo = -((ky / 2) as isize);
            let mut sum: u32 = (lo..lo + ky as isize).map(at).sum();
            for y in 0..height {
                data[(y * width + x) * channels + c] = ((sum + norm / 2) / norm).min(255) as u8;
                let yi = y as isize;
                sum = sum + at(yi + lo + ky as isize) - at(yi + lo);
            }
        }
    }
}

fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}
