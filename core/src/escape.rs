//! Percent-escaping for request paths.
//!
//! The escaped path is used verbatim in the request line. Characters that
//! are legal inside a path (`/`, `&`, `=`, `:` and friends) stay as they are;
//! space, `?`, `#`, `%` and non-ASCII bytes are escaped. A literal `+` is
//! always sent as `%2b`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b',')
    .remove(b'/')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'@');

/// Escape `path` so it can be placed directly after the authority of a URL.
pub fn escape_path(path: &str) -> String {
    utf8_percent_encode(path, PATH).to_string().replace('+', "%2b")
}
