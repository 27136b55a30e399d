//! Streaming multipart uploads.
//!
//! # Design
//! `RequestData::upload_file` wires a producer thread to the request body
//! through an in-memory pipe. The producer writes the multipart framing and
//! copies the source reader into it while the transport reads the other
//! end, so the file is never buffered whole. If the producer fails, the
//! error is handed to the reading side instead of a clean end of stream.

use std::io::{self, Read, Write};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use http::header::CONTENT_TYPE;
use http::HeaderValue;
use tracing::trace;
use uuid::Uuid;

use crate::error::Error;
use crate::request::RequestData;

/// Chunks buffered between producer and reader.
const PIPE_DEPTH: usize = 8;

type Chunk = io::Result<Vec<u8>>;

/// Reading half of an in-memory pipe.
#[derive(Debug)]
pub struct PipeReader {
    chunks: Receiver<Chunk>,
    current: Vec<u8>,
    pos: usize,
    failed: Option<(io::ErrorKind, String)>,
}

/// Writing half of an in-memory pipe. Dropping it ends the stream.
#[derive(Debug)]
pub struct PipeWriter {
    chunks: Sender<Chunk>,
}

/// Create a connected reader/writer pair.
pub fn pipe() -> (PipeReader, PipeWriter) {
    let (tx, rx) = bounded(PIPE_DEPTH);
    let reader = PipeReader {
        chunks: rx,
        current: Vec::new(),
        pos: 0,
        failed: None,
    };
    (reader, PipeWriter { chunks: tx })
}

impl PipeWriter {
    /// End the stream with `err`; the reader returns it instead of EOF.
    pub fn close_with_error(self, err: io::Error) {
        let _ = self.chunks.send(Err(err));
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.chunks
            .send(Ok(buf.to_vec()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if let Some((kind, message)) = &self.failed {
                return Err(io::Error::new(*kind, message.clone()));
            }
            if self.pos < self.current.len() {
                let n = buf.len().min(self.current.len() - self.pos);
                buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            match self.chunks.recv() {
                Ok(Ok(chunk)) => {
                    self.current = chunk;
                    self.pos = 0;
                }
                Ok(Err(err)) => {
                    self.failed = Some((err.kind(), err.to_string()));
                    return Err(err);
                }
                // Writer dropped.
                Err(_) => return Ok(0),
            }
        }
    }
}

impl RequestData<'_> {
    /// Send `reader` as a single `multipart/form-data` file part.
    ///
    /// Replaces the body reader and sets the multipart `Content-Type` header.
    /// Nothing is spawned if the header cannot be built.
    pub fn upload_file<R>(mut self, field_name: &str, file_name: &str, reader: R) -> Result<Self, Error>
    where
        R: Read + Send + 'static,
    {
        let boundary = Uuid::new_v4().simple().to_string();
        let content_type = HeaderValue::try_from(format!("multipart/form-data; boundary={boundary}"))
            .map_err(|e| Error::Config(format!("multipart content type: {e}")))?;
        let (pipe_reader, writer) = pipe();

        let part_header = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            escape_quotes(field_name),
            escape_quotes(file_name),
        );
        let trailer = format!("\r\n--{boundary}--\r\n");

        thread::spawn(move || produce(writer, part_header, reader, trailer));

        self.req_reader = Some(Box::new(pipe_reader));
        self.headers.insert(CONTENT_TYPE, content_type);
        Ok(self)
    }
}

fn produce<R: Read>(mut writer: PipeWriter, part_header: String, mut reader: R, trailer: String) {
    match write_part(&mut writer, &part_header, &mut reader, &trailer) {
        Ok(copied) => trace!(copied, "multipart upload written"),
        Err(err) => writer.close_with_error(err),
    }
}

fn write_part<R: Read>(writer: &mut PipeWriter, header: &str, reader: &mut R, trailer: &str) -> io::Result<u64> {
    writer.write_all(header.as_bytes())?;
    let copied = io::copy(reader, writer)?;
    writer.write_all(trailer.as_bytes())?;
    Ok(copied)
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
