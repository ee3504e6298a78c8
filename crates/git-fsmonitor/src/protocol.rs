//! Parses raw provider responses (hook stdout or IPC payload) into a new
//! token plus either a path list or a trivial ("assume everything changed")
//! marker.
//!
//! Response body format (after any embedded token):
//! - a NUL-delimited list of relative paths (directories end in `/`), or
//! - a response that ends in the three bytes `\0/\0`, which marks the whole
//!   response trivial regardless of what precedes it.

use bstr::BString;

use crate::FsmonitorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResponse {
    /// Paths changed since `token`. Directory entries keep their trailing `/`.
    Paths { token: BString, paths: Vec<BString> },
    /// The provider couldn't produce a precise answer; every tracked path
    /// should be treated as possibly dirty.
    Trivial { token: BString },
}

/// The trivial marker: the response ends with this regardless of what comes
/// before it. Checked on the full wire bytes, before token extraction, so a
/// path list that happens to end in a bare directory broadcast ("...dir/")
/// followed by the marker's own NUL still collapses to trivial.
const TRIVIAL_SUFFIX: &[u8] = b"\0/\0";

/// Parse a response that carries its own token as a NUL-terminated prefix
/// (hook protocol v2, and the builtin IPC provider).
pub fn parse_with_embedded_token(raw: &[u8]) -> Result<ProviderResponse, FsmonitorError> {
    let nul = raw
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| FsmonitorError::MalformedResponse("missing NUL after token".into()))?;
    let token = BString::from(&raw[..nul]);
    if token.is_empty() {
        return Err(FsmonitorError::EmptyToken);
    }
    if raw.ends_with(TRIVIAL_SUFFIX) {
        return Ok(ProviderResponse::Trivial { token });
    }
    Ok(parse_paths(token, &raw[nul + 1..]))
}

/// Parse a response with no embedded token (hook protocol v1): the caller
/// already knows what token the request was relative to. Lacking a token
/// prefix there is no leading NUL to anchor the trivial suffix on, so a bare
/// `/` (the historical "rescan everything" signal for this protocol) is
/// trivial whether or not it carries its own trailing NUL.
pub fn parse_without_token(raw: &[u8], request_token: BString) -> ProviderResponse {
    if raw == b"/" || raw.ends_with(TRIVIAL_SUFFIX) {
        return ProviderResponse::Trivial { token: request_token };
    }
    parse_paths(request_token, raw)
}

/// Split a response body into paths. An empty body is a degenerate form of
/// "no precise answer" and collapses to the same trivial handling (refresh
/// engine branch B treats trivial and empty responses identically).
fn parse_paths(token: BString, body: &[u8]) -> ProviderResponse {
    if body.is_empty() {
        return ProviderResponse::Trivial { token };
    }

    let mut paths = Vec::new();
    let mut start = 0;
    for (i, &b) in body.iter().enumerate() {
        if b == 0 {
            if i > start {
                paths.push(BString::from(&body[start..i]));
            }
            start = i + 1;
        }
    }
    if start < body.len() {
        paths.push(BString::from(&body[start..]));
    }
    ProviderResponse::Paths { token, paths }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_token_with_paths() {
        let mut raw = b"tok1\0".to_vec();
        raw.extend_from_slice(b"src/main.rs\0dir/\0");
        let resp = parse_with_embedded_token(&raw).unwrap();
        match resp {
            ProviderResponse::Paths { token, paths } => {
                assert_eq!(token, BString::from("tok1"));
                assert_eq!(paths, vec![BString::from("src/main.rs"), BString::from("dir/")]);
            }
            _ => panic!("expected Paths"),
        }
    }

    #[test]
    fn embedded_token_trivial_suffix() {
        // "T1" NUL "/" NUL: the trailing NUL after the lone "/" segment is
        // what distinguishes a trivial marker from an ordinary directory
        // broadcast of the root.
        let raw = b"T1\0/\0".to_vec();
        let resp = parse_with_embedded_token(&raw).unwrap();
        assert_eq!(resp, ProviderResponse::Trivial { token: BString::from("T1") });
    }

    #[test]
    fn embedded_token_trivial_suffix_after_paths() {
        // The marker collapses the whole response even when real paths
        // precede it.
        let raw = b"tok\0a.txt\0dir/\0/\0".to_vec();
        let resp = parse_with_embedded_token(&raw).unwrap();
        assert_eq!(resp, ProviderResponse::Trivial { token: BString::from("tok") });
    }

    #[test]
    fn embedded_token_bare_root_without_marker_nul_is_a_path() {
        // A single unterminated "/" segment is a directory broadcast for
        // the whole tree, not the dedicated trivial marker (which requires
        // the extra trailing NUL).
        let raw = b"tok2\0/".to_vec();
        let resp = parse_with_embedded_token(&raw).unwrap();
        assert_eq!(
            resp,
            ProviderResponse::Paths { token: BString::from("tok2"), paths: vec![BString::from("/")] }
        );
    }

    #[test]
    fn embedded_token_empty_body_is_trivial() {
        let raw = b"tok3\0".to_vec();
        let resp = parse_with_embedded_token(&raw).unwrap();
        assert_eq!(resp, ProviderResponse::Trivial { token: BString::from("tok3") });
    }

    #[test]
    fn missing_nul_is_malformed() {
        let raw = b"no-nul-here".to_vec();
        assert!(parse_with_embedded_token(&raw).is_err());
    }

    #[test]
    fn empty_embedded_token_is_empty_token_error() {
        let raw = b"\0something".to_vec();
        assert!(matches!(parse_with_embedded_token(&raw), Err(FsmonitorError::EmptyToken)));
    }

    #[test]
    fn without_token_paths() {
        let raw = b"a.txt\0b.txt\0".to_vec();
        let resp = parse_without_token(&raw, BString::from("given"));
        match resp {
            ProviderResponse::Paths { token, paths } => {
                assert_eq!(token, BString::from("given"));
                assert_eq!(paths, vec![BString::from("a.txt"), BString::from("b.txt")]);
            }
            _ => panic!("expected Paths"),
        }
    }

    #[test]
    fn without_token_bare_root_is_trivial() {
        let raw = b"/".to_vec();
        let resp = parse_without_token(&raw, BString::from("given"));
        assert_eq!(resp, ProviderResponse::Trivial { token: BString::from("given") });
    }

    #[test]
    fn without_token_trivial_suffix() {
        let raw = b"a.txt\0/\0".to_vec();
        let resp = parse_without_token(&raw, BString::from("given"));
        assert_eq!(resp, ProviderResponse::Trivial { token: BString::from("given") });
    }
}
