use encoding_rs::{Encoding, UTF_8};

/// Decodes status lines into text.
///
/// Order: BOM on the first line, then the `Content-Type` charset, then UTF-8.
/// Malformed sequences are replaced rather than rejected. Only ASCII-compatible
/// encodings are honoured since lines are split on a raw `\n` byte.
#[derive(Debug, Clone)]
pub(crate) struct LineDecoder {
    encoding: &'static Encoding,
    first_line: bool,
}

impl LineDecoder {
    pub(crate) fn for_content_type(content_type: Option<&str>) -> Self {
        let encoding = content_type
            .and_then(extract_charset)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .filter(|enc| enc.is_ascii_compatible())
            .unwrap_or(UTF_8);
        Self {
            encoding,
            first_line: true,
        }
    }

    pub(crate) fn decode(&mut self, line: &[u8]) -> String {
        let mut bytes = line;
        if std::mem::take(&mut self.first_line) {
            if let Some((enc, bom_len)) = Encoding::for_bom(bytes) {
                if enc.is_ascii_compatible() {
                    self.encoding = enc;
                }
                bytes = &bytes[bom_len..];
            }
        }
        let (text, _had_errors) = self.encoding.decode_without_bom_handling(bytes);
        text.into_owned()
    }
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim_matches([' ', '"', '\''].as_ref()).to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_parameter_is_case_insensitive() {
        assert_eq!(
            extract_charset("text/plain; Charset=\"ISO-8859-1\""),
            Some("ISO-8859-1".to_string())
        );
        assert_eq!(extract_charset("text/plain"), None);
    }

    #[test]
    fn latin1_header_is_honoured() {
        let mut decoder = LineDecoder::for_content_type(Some("text/plain; charset=iso-8859-1"));
        assert_eq!(decoder.decode(b"ge\xf6ffnet"), "geöffnet");
    }

    #[test]
    fn utf8_bom_is_stripped_on_first_line_only() {
        let mut decoder = LineDecoder::for_content_type(None);
        assert_eq!(decoder.decode(b"\xEF\xBB\xBFopen"), "open");
        assert_eq!(decoder.decode(b"\xEF\xBB\xBFopen"), "\u{feff}open");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut decoder = LineDecoder::for_content_type(Some("text/plain"));
        assert_eq!(decoder.decode(b"op\xffen"), "op\u{fffd}en");
    }
}
