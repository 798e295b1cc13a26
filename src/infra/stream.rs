//! Byte-stream adapters connecting the chunk pipeline to async readers and writers.

use std::io;

use async_stream::stream;
use async_trait::async_trait;
use bytes::BytesMut;
use futures::stream::BoxStream;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::application::pipeline::{Downstream, Frame, PipelineError};

pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Frames read from `reader` in chunks of at most `chunk_size` bytes,
/// terminated by [`Frame::EndOfStream`].
pub fn reader_frames<R>(mut reader: R, chunk_size: usize) -> BoxStream<'static, io::Result<Frame>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let chunk_size = chunk_size.max(1);
    Box::pin(stream! {
        loop {
            let mut buffer = BytesMut::with_capacity(chunk_size);
            while buffer.len() < chunk_size {
                match reader.read_buf(&mut buffer).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
            if buffer.is_empty() {
                break;
            }
            trace!(bytes = buffer.len(), "read chunk");
            let full = buffer.len() == chunk_size;
            yield Ok(Frame::Data(buffer.freeze()));
            if !full {
                break;
            }
        }
        yield Ok(Frame::EndOfStream);
    })
}

/// Downstream writing data frames to an async writer, flushing on control frames.
pub struct WriterDownstream<W> {
    writer: W,
    written: u64,
}

impl<W> WriterDownstream<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> Downstream for WriterDownstream<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn pass(&mut self, batch: Vec<Frame>) -> Result<(), PipelineError> {
        for frame in batch {
            match frame {
                Frame::Data(bytes) => {
                    self.writer
                        .write_all(&bytes)
                        .await
                        .map_err(PipelineError::Downstream)?;
                    self.written += bytes.len() as u64;
                }
                Frame::Flush | Frame::EndOfStream => {
                    self.writer.flush().await.map_err(PipelineError::Downstream)?;
                }
            }
        }
        Ok(())
    }
}
