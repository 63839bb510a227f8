// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Color sampling from video frames.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::sampler::Region;

/// An averaged color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Rgb {
        Rgb { r, g, b }
    }
}

/// Errors produced while sampling a region.
#[derive(Debug, thiserror::Error)]
pub enum ColorError {
    #[error("region {0:?} has no area")]
    EmptyRegion(Region),

    #[error("region {region:?} lies outside the {width}x{height} frame")]
    OutsideFrame {
        region: Region,
        width: u32,
        height: u32,
    },

    #[error("frame data is {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
}

/// Implementers produce the average color of a region at call time.
pub trait ColorSource: Send + Sync {
    fn sample(&self, region: &Region) -> Result<Rgb, ColorError>;
}

/// A single rgb24 video frame.
#[derive(Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    /// Creates an all black frame.
    pub fn black(width: u32, height: u32) -> Frame {
        Frame {
            width,
            height,
            pixels: vec![0; Frame::byte_len(width, height)],
        }
    }

    /// Wraps packed rgb24 pixel data.
    pub fn from_rgb24(width: u32, height: u32, pixels: Vec<u8>) -> Result<Frame, ColorError> {
        let expected = Frame::byte_len(width, height);
        if pixels.len() != expected {
            return Err(ColorError::FrameSize {
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Frame {
            width,
            height,
            pixels,
        })
    }

    /// The number of bytes in a packed rgb24 frame of the given size.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The packed pixel data, for overwriting in place with the next frame.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Averages every pixel of the region that falls inside the frame.
    pub fn average(&self, region: &Region) -> Result<Rgb, ColorError> {
        if !region.is_valid() {
            return Err(ColorError::EmptyRegion(*region));
        }

        let x_start = region.x.max(0) as i64;
        let y_start = region.y.max(0) as i64;
        let x_end = (i64::from(region.x) + i64::from(region.width)).min(i64::from(self.width));
        let y_end = (i64::from(region.y) + i64::from(region.height)).min(i64::from(self.height));
        if x_start >= x_end || y_start >= y_end {
            return Err(ColorError::OutsideFrame {
                region: *region,
                width: self.width,
                height: self.height,
            });
        }

        let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);
        for y in y_start..y_end {
            let row = (y * i64::from(self.width)) as usize * 3;
            let start = row + x_start as usize * 3;
            let end = row + x_end as usize * 3;
            for pixel in self.pixels[start..end].chunks_exact(3) {
                r += u64::from(pixel[0]);
                g += u64::from(pixel[1]);
                b += u64::from(pixel[2]);
            }
        }

        let count = ((x_end - x_start) * (y_end - y_start)) as u64;
        Ok(Rgb {
            r: (r / count) as u8,
            g: (g / count) as u8,
            b: (b / count) as u8,
        })
    }

    /// Paints the region with a solid color.
    #[cfg(test)]
    pub fn fill(&mut self, region: &Region, color: Rgb) {
        for y in region.y.max(0)..(region.y + region.height).min(self.height as i32) {
            for x in region.x.max(0)..(region.x + region.width).min(self.width as i32) {
                let offset = (y as usize * self.width as usize + x as usize) * 3;
                self.pixels[offset] = color.r;
                self.pixels[offset + 1] = color.g;
                self.pixels[offset + 2] = color.b;
            }
        }
    }
}

impl ColorSource for Frame {
    fn sample(&self, region: &Region) -> Result<Rgb, ColorError> {
        self.average(region)
    }
}

/// A frame shared between the thread producing frames and the engine sampling them.
#[derive(Clone)]
pub struct SharedFrame {
    frame: Arc<RwLock<Frame>>,
}

impl SharedFrame {
    pub fn new(frame: Frame) -> SharedFrame {
        SharedFrame {
            frame: Arc::new(RwLock::new(frame)),
        }
    }

    /// Gives the closure exclusive access to the frame.
    pub fn update<F: FnOnce(&mut Frame)>(&self, f: F) {
        f(&mut self.frame.write());
    }

    pub fn dimensions(&self) -> (u32, u32) {
        let frame = self.frame.read();
        (frame.width(), frame.height())
    }
}

impl ColorSource for SharedFrame {
    fn sample(&self, region: &Region) -> Result<Rgb, ColorError> {
        self.frame.read().average(region)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_average_solid_region() {
        let mut frame = Frame::black(8, 8);
        frame.fill(&Region::new(2, 2, 4, 4), Rgb::new(200, 100, 50));

        let color = frame.average(&Region::new(2, 2, 4, 4)).unwrap();
        assert_eq!(Rgb::new(200, 100, 50), color);
    }

    #[test]
    fn test_average_mixed_region() {
        let mut frame = Frame::black(4, 1);
        frame.fill(&Region::new(0, 0, 1, 1), Rgb::new(255, 255, 255));

        // One white pixel out of four, floored.
        let color = frame.average(&Region::new(0, 0, 4, 1)).unwrap();
        assert_eq!(Rgb::new(63, 63, 63), color);
    }

    #[test]
    fn test_average_clips_to_frame() {
        let mut frame = Frame::black(4, 4);
        frame.fill(&Region::new(0, 0, 4, 4), Rgb::new(10, 20, 30));

        let color = frame.average(&Region::new(-10, -10, 12, 12)).unwrap();
        assert_eq!(Rgb::new(10, 20, 30), color);
    }

    #[test]
    fn test_degenerate_regions_fail() {
        let frame = Frame::black(4, 4);
        assert!(matches!(
            frame.average(&Region::new(0, 0, 0, 4)),
            Err(ColorError::EmptyRegion(_))
        ));
        assert!(matches!(
            frame.average(&Region::new(10, 10, 4, 4)),
            Err(ColorError::OutsideFrame { .. })
        ));
    }

    #[test]
    fn test_frame_size_mismatch() {
        assert!(Frame::from_rgb24(2, 2, vec![0; 12]).is_ok());
        assert!(matches!(
            Frame::from_rgb24(2, 2, vec![0; 11]),
            Err(ColorError::FrameSize {
                expected: 12,
                actual: 11
            })
        ));
    }

    #[test]
    fn test_shared_frame_sees_updates() {
        let shared = SharedFrame::new(Frame::black(2, 2));
        let region = Region::new(0, 0, 2, 2);
        assert_eq!(Rgb::default(), shared.sample(&region).unwrap());

        shared.update(|frame| frame.fill(&region, Rgb::new(1, 2, 3)));
        assert_eq!(Rgb::new(1, 2, 3), shared.sample(&region).unwrap());
        assert_eq!((2, 2), shared.dimensions());
    }
}
