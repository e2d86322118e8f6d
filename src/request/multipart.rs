//! Replayable multipart form used for file uploads.

// self
use crate::_prelude::*;

/// One field of a [`MultipartForm`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormPart {
	/// Plain text field.
	Text {
		/// Field name.
		name: String,
		/// Field value.
		value: String,
	},
	/// File field.
	File {
		/// Field name.
		name: String,
		/// File name reported to the server.
		file_name: String,
		/// MIME type, if known.
		content_type: Option<String>,
		/// File contents.
		bytes: Vec<u8>,
	},
}

/// Multipart form kept as plain data so a request can be replayed after a token refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultipartForm {
	parts: Vec<FormPart>,
}
impl MultipartForm {
	/// Creates an empty form.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a text field.
	pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.parts.push(FormPart::Text { name: name.into(), value: value.into() });

		self
	}

	/// Appends a file field.
	pub fn file(
		mut self,
		name: impl Into<String>,
		file_name: impl Into<String>,
		content_type: Option<&str>,
		bytes: impl Into<Vec<u8>>,
	) -> Self {
		self.parts.push(FormPart::File {
			name: name.into(),
			file_name: file_name.into(),
			content_type: content_type.map(str::to_owned),
			bytes: bytes.into(),
		});

		self
	}

	/// Borrows the parts in insertion order.
	pub fn parts(&self) -> &[FormPart] {
		&self.parts
	}

	/// Consumes the form, returning its parts in insertion order.
	pub fn into_parts(self) -> Vec<FormPart> {
		self.parts
	}

	/// Returns `true` when the form has no fields.
	pub fn is_empty(&self) -> bool {
		self.parts.is_empty()
	}
}
