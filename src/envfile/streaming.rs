//! Streaming env-file parser
//!
//! Push-style variant of the parser for inputs too large to
//! materialize: variables are handed to a callback as they are parsed,
//! one line at a time, with a bounded read buffer. Cancellation is
//! checked between lines.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;

use crate::error::{file_read_error, EnvyError, EnvyResult, ErrorKind};
use super::parser::{parse_line, ParsedLine};
use super::Variable;

/// Default maximum accepted line length (64 KiB)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Streaming parser knobs
#[derive(Debug, Clone)]
pub struct StreamingOptions {
	/// Lines longer than this fail the parse with `file-invalid`
	pub max_line_length: usize,
	/// Read buffer capacity
	pub buffer_size: usize,
}

impl Default for StreamingOptions {
	fn default() -> Self {
		StreamingOptions { max_line_length: DEFAULT_MAX_LINE_LENGTH, buffer_size: 8 * 1024 }
	}
}

/// Push-style env-file parser
#[derive(Debug, Clone, Default)]
pub struct StreamingParser {
	options: StreamingOptions,
}

impl StreamingParser {
	pub fn new() -> Self {
		StreamingParser::default()
	}

	pub fn with_options(options: StreamingOptions) -> Self {
		StreamingParser { options }
	}

	/// Parse from a reader, invoking `on_variable` for each assignment
	///
	/// Returns the number of variables seen. Callback errors abort the
	/// parse and are returned unwrapped. Cancellation between lines
	/// surfaces as a retriable timeout-kind error.
	pub async fn parse<R, F>(
		&self,
		reader: R,
		cancel: &CancellationToken,
		mut on_variable: F,
	) -> EnvyResult<usize>
	where
		R: AsyncRead + Unpin,
		F: FnMut(Variable) -> EnvyResult<()>,
	{
		let mut reader = BufReader::with_capacity(self.options.buffer_size, reader);
		let mut buf: Vec<u8> = Vec::new();
		let mut line_no = 0usize;
		let mut seen = 0usize;

		loop {
			if cancel.is_cancelled() {
				return Err(
					EnvyError::new(ErrorKind::Timeout, "Streaming parse cancelled").retriable(true)
				);
			}

			buf.clear();
			let read = reader
				.read_until(b'\n', &mut buf)
				.await
				.map_err(|e| file_read_error("<stream>", e))?;
			if read == 0 {
				break;
			}
			line_no += 1;

			if buf.len() > self.options.max_line_length {
				return Err(EnvyError::new(
					ErrorKind::FileInvalid,
					format!(
						"Line {} exceeds maximum length of {} bytes",
						line_no, self.options.max_line_length
					),
				)
				.with_detail("line", line_no.to_string()));
			}

			let text = String::from_utf8_lossy(&buf);
			let trimmed = text.trim_end_matches(['\n', '\r']);
			if let ParsedLine::Assignment { key, value, comment } = parse_line(trimmed) {
				seen += 1;
				on_variable(Variable { key, value, comment, line: line_no })?;
			}
		}

		Ok(seen)
	}
}


// vim: ts=4
