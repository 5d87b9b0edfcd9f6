//! [`VideoOpener`] for V4L2 devices streaming MJPEG.

use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use tracing::debug;

use super::{VideoOpener, VideoSource};
use crate::error::{PhotoboothError, Result};
use crate::frame::Frame;

const CAPTURE_SIZE: (u32, u32) = (1280, 720);
const BUFFER_COUNT: u32 = 4;

/// Opens `/dev/video<index>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct V4lOpener;

struct V4lSource {
    // Field order matters: the stream must be dropped before its device
    stream: MmapStream<'static>,
    _device: Device,
}

impl VideoOpener for V4lOpener {
    fn open(&self, index: u32) -> Result<Box<dyn VideoSource>> {
        let device = Device::new(index as usize).map_err(|e| io_error(index, &e))?;

        let mut format = device.format().map_err(|e| io_error(index, &e))?;
        format.width = CAPTURE_SIZE.0;
        format.height = CAPTURE_SIZE.1;
        format.fourcc = FourCC::new(b"MJPG");
        let format = device.set_format(&format).map_err(|e| io_error(index, &e))?;
        if format.fourcc != FourCC::new(b"MJPG") {
            return Err(PhotoboothError::DeviceCommunication(format!(
                "/dev/video{index} does not stream MJPEG (got {})",
                format.fourcc
            )));
        }
        debug!(index, width = format.width, height = format.height, "V4L2 format set");

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| io_error(index, &e))?;
        Ok(Box::new(V4lSource {
            stream,
            _device: device,
        }))
    }
}

impl VideoSource for V4lSource {
    fn read_frame(&mut self) -> Result<Frame> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| PhotoboothError::DeviceCommunication(format!("V4L2 read failed: {e}")))?;
        let used = (meta.bytesused as usize).min(buf.len());
        Frame::decode(&buf[..used])
    }
}

fn io_error(index: u32, err: &std::io::Error) -> PhotoboothError {
    PhotoboothError::DeviceCommunication(format!("/dev/video{index}: {err}"))
}
