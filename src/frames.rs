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

//! Feeds raw rgb24 video frames from a byte stream into a shared frame.

use std::{
    io::{self, Read},
    thread::{self, JoinHandle},
};

use tracing::{error, info, span, trace, Level};

use crate::color::{Frame, SharedFrame};

/// Reads frames of the shared frame's size from the reader on its own thread,
/// replacing the shared frame as each one completes. The thread returns the
/// number of frames read once the stream ends; a trailing partial frame is
/// dropped.
pub fn spawn_reader<R>(mut reader: R, frame: SharedFrame) -> io::Result<JoinHandle<io::Result<u64>>>
where
    R: Read + Send + 'static,
{
    let (width, height) = frame.dimensions();
    let len = Frame::byte_len(width, height);
    if len == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame size {}x{} is empty", width, height),
        ));
    }

    thread::Builder::new()
        .name("frame-reader".to_string())
        .spawn(move || {
            let span = span!(Level::INFO, "frame reader");
            let _enter = span.enter();

            let mut buffer = vec![0; len];
            let mut frames = 0u64;
            loop {
                match reader.read_exact(&mut buffer) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        info!(frames, "Frame input ended.");
                        return Ok(frames);
                    }
                    Err(e) => {
                        error!(err = e.to_string(), "Error reading frame.");
                        return Err(e);
                    }
                }

                frame.update(|current| current.pixels_mut().copy_from_slice(&buffer));
                frames += 1;
                trace!(frames, "Read frame.");
            }
        })
}
