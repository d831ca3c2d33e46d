//! Request body to message text.

/// Join the body's lines without their terminators.
///
/// Lines end at `\n`, `\r\n` or a lone `\r`, so `"line1\nline2\n"` becomes
/// `"line1line2"`.
pub fn join_lines(body: &str) -> String {
    let mut joined = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            other => joined.push(other),
        }
    }
    joined
}

/// Message text for a raw request body.
pub fn reassemble(body: &[u8], strip_newlines: bool) -> String {
    let text = String::from_utf8_lossy(body);
    if strip_newlines {
        join_lines(&text)
    } else {
        text.into_owned()
    }
}
