//! Response body plumbing.
//!
//! Every [`crate::response::Response`] carries a boxed [`http_body::Body`] so
//! the same type can hold either a fully-buffered payload or a streamed one
//! (`stream`/`send_file`/`download`) without the caller choosing between two
//! response types.

use std::io;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use bytes::Bytes;
use http_body::{Body, Frame};
use http_body_util::{BodyExt, Full};
use tokio::io::{AsyncRead, ReadBuf};

/// The boxed body type every [`crate::response::Response`] is built from.
pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, io::Error>;

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new()).map_err(|never: std::convert::Infallible| match never {}).boxed()
}

pub fn bytes_body(bytes: Bytes) -> BoxBody {
    Full::new(bytes).map_err(|never: std::convert::Infallible| match never {}).boxed()
}

/// Adapts any `AsyncRead` into a [`Body`], one `poll_read` at a time. Each
/// frame is only produced once the reader actually yields bytes. This is
/// what honoring back-pressure means: the connection only pulls as fast as
/// the reader (and the client) can go.
pub struct ReaderBody<R> {
    reader: R,
    buf: Box<[u8]>,
}

impl<R: AsyncRead + Unpin> ReaderBody<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: vec![0u8; 64 * 1024].into_boxed_slice() }
    }
}

impl<R: AsyncRead + Unpin> Body for ReaderBody<R> {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        let this = self.get_mut();
        let mut read_buf = ReadBuf::new(&mut this.buf);
        match Pin::new(&mut this.reader).poll_read(cx, &mut read_buf) {
            Poll::Ready(Ok(())) => {
                let n = read_buf.filled().len();
                if n == 0 {
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Ok(Frame::data(Bytes::copy_from_slice(read_buf.filled())))))
                }
            }
            Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub fn reader_body<R: AsyncRead + Unpin + Send + 'static>(reader: R) -> BoxBody {
    ReaderBody::new(reader).boxed()
}
