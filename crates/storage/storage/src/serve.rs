//! HTTP response construction shared by every backend's `serve_file`.

use http::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, IF_NONE_MATCH,
    LAST_MODIFIED, RANGE,
};
use http::{HeaderMap, Response, StatusCode};

use crate::error::{StorageError, StorageResult};
use crate::io::{ObjectReader, empty_reader};
use crate::metadata::Metadata;

/// Inclusive byte range within an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered. Always at least one.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Range` request header value for a ranged backend read.
    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// What part of the object a request asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSelection {
    Full,
    Partial(ByteRange),
    Unsatisfiable,
}

/// How a backend should answer a serve request once metadata is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServePlan {
    /// The client's cached copy is current.
    NotModified,
    Body(RangeSelection),
}

/// Decide the response shape from request headers and stored metadata.
pub fn plan(metadata: &Metadata, headers: &HeaderMap) -> ServePlan {
    let etag = metadata.etag();
    let cached = headers
        .get_all(IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|tag| {
            let tag = tag.trim();
            tag == "*" || tag == etag
        });
    if cached {
        return ServePlan::NotModified;
    }
    ServePlan::Body(select_range(headers, metadata.size))
}

/// Interpret the `Range` header against an object of `size` bytes.
pub fn select_range(headers: &HeaderMap, size: u64) -> RangeSelection {
    match headers.get(RANGE).and_then(|v| v.to_str().ok()) {
        Some(value) => parse_range(value, size),
        None => RangeSelection::Full,
    }
}

/// Parse a single `bytes=` range. Malformed and multi-range values fall
/// back to the full body.
pub fn parse_range(value: &str, size: u64) -> RangeSelection {
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return RangeSelection::Full;
    };
    if spec.contains(',') {
        return RangeSelection::Full;
    }
    let Some((first, last)) = spec.split_once('-') else {
        return RangeSelection::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        let Ok(suffix) = last.parse::<u64>() else {
            return RangeSelection::Full;
        };
        if suffix == 0 || size == 0 {
            return RangeSelection::Unsatisfiable;
        }
        let suffix = suffix.min(size);
        return RangeSelection::Partial(ByteRange {
            start: size - suffix,
            end: size - 1,
        });
    }

    let Ok(start) = first.parse::<u64>() else {
        return RangeSelection::Full;
    };
    let end = if last.is_empty() {
        size.saturating_sub(1)
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => end.min(size.saturating_sub(1)),
            _ => return RangeSelection::Full,
        }
    };
    if start >= size {
        return RangeSelection::Unsatisfiable;
    }
    RangeSelection::Partial(ByteRange { start, end })
}

fn http_date(metadata: &Metadata) -> String {
    metadata
        .modified
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn base(metadata: &Metadata, status: StatusCode) -> http::response::Builder {
    Response::builder()
        .status(status)
        .header(ETAG, metadata.etag())
        .header(LAST_MODIFIED, http_date(metadata))
        .header(ACCEPT_RANGES, "bytes")
}

fn finish(
    builder: http::response::Builder,
    body: ObjectReader,
) -> StorageResult<Response<ObjectReader>> {
    builder
        .body(body)
        .map_err(|e| StorageError::Backend(format!("failed to build response: {e}")))
}

/// `304 Not Modified` with validators and no body.
pub fn not_modified(metadata: &Metadata) -> StorageResult<Response<ObjectReader>> {
    finish(base(metadata, StatusCode::NOT_MODIFIED), empty_reader())
}

/// `416 Range Not Satisfiable` carrying `Content-Range: bytes */size`.
pub fn unsatisfiable(metadata: &Metadata) -> StorageResult<Response<ObjectReader>> {
    let builder = base(metadata, StatusCode::RANGE_NOT_SATISFIABLE)
        .header(CONTENT_RANGE, format!("bytes */{}", metadata.size))
        .header(CONTENT_LENGTH, 0);
    finish(builder, empty_reader())
}

/// `200` for the whole object or `206` for `range`. `body` must already be
/// positioned at the range start and yield exactly the range length.
pub fn content(
    metadata: &Metadata,
    range: Option<ByteRange>,
    body: ObjectReader,
) -> StorageResult<Response<ObjectReader>> {
    let builder = match range {
        None => base(metadata, StatusCode::OK).header(CONTENT_LENGTH, metadata.size),
        Some(range) => base(metadata, StatusCode::PARTIAL_CONTENT)
            .header(CONTENT_LENGTH, range.length())
            .header(
                CONTENT_RANGE,
                format!("bytes {}-{}/{}", range.start, range.end, metadata.size),
            ),
    };
    finish(builder.header(CONTENT_TYPE, &metadata.mimetype), body)
}
