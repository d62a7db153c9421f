//! console rendering of a single request/response pair
//!
//! [`AsyncClient`] prints through here when [`Config::debug_first_request`] or
//! [`Config::force_debug_next`] asks it to.
//!
//! [`AsyncClient`]: crate::client::AsyncClient
//! [`Config::debug_first_request`]: crate::config::Config::debug_first_request
//! [`Config::force_debug_next`]: crate::config::Config::force_debug_next

/// longest response dump shown before truncating
pub const MAX_RESPONSE_DUMP: usize = 2000;

const ANSI_CLEAR: &str = "\x1b[0m";
const ANSI_CYAN: &str = "\x1b[36m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_BLUE: &str = "\x1b[34m";
const ANSI_BOLD: &str = "\x1b[1m";

/// cap a response dump at [`MAX_RESPONSE_DUMP`] bytes
///
/// when the header/body boundary falls inside the limit the headers are kept
/// whole and only the body is cut. The cut is moved back to a character
/// boundary, and the result ends with a notice stating how many characters were dropped.
///
/// # Examples
///
/// ```
/// # use fuffa::debug::truncate_response;
/// let dump = format!("HTTP/1.1 200 OK\r\n\r\n{}", "a".repeat(2500));
/// let truncated = truncate_response(&dump);
///
/// assert!(truncated.starts_with("HTTP/1.1 200 OK\r\n\r\naaa"));
/// assert!(truncated.contains("[TRUNCATED - 519 more chars]"));
///
/// assert_eq!(truncate_response("HTTP/1.1 204 No Content\r\n\r\n"), "HTTP/1.1 204 No Content\r\n\r\n");
/// ```
#[must_use]
pub fn truncate_response(dump: &str) -> String {
    if dump.len() <= MAX_RESPONSE_DUMP {
        return dump.to_string();
    }

    let header_end = dump.find("\r\n\r\n").or_else(|| dump.find("\n\n"));

    let limit = match header_end {
        // headers and the blank line that ends them survive, the body is cut
        Some(end) if end < MAX_RESPONSE_DUMP => MAX_RESPONSE_DUMP.max(end + 4).min(dump.len()),
        _ => MAX_RESPONSE_DUMP,
    };

    let cut = floor_char_boundary(dump, limit);

    format!(
        "{}\n\n{ANSI_YELLOW}... [TRUNCATED - {} more chars] ...{ANSI_CLEAR}",
        &dump[..cut],
        dump[cut..].chars().count()
    )
}

/// largest index no greater than `index` that falls on a character boundary
fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());

    while !text.is_char_boundary(index) {
        index -= 1;
    }

    index
}

/// frame a request dump and a (truncated) response dump in the debug banner
#[must_use]
pub fn render(request_dump: &str, response_dump: &str) -> String {
    let heavy = "═".repeat(60);
    let light = "─".repeat(30);

    let mut rendered = String::new();

    rendered.push_str(&format!("\n{ANSI_CYAN}{heavy}{ANSI_CLEAR}\n"));
    rendered.push_str(&format!(
        "{ANSI_BOLD}{ANSI_CYAN}🐛 DEBUG: FIRST HTTP REQUEST AND RESPONSE{ANSI_CLEAR}\n"
    ));
    rendered.push_str(&format!("{ANSI_CYAN}{heavy}{ANSI_CLEAR}\n\n"));

    rendered.push_str(&format!("{ANSI_BOLD}{ANSI_GREEN}📤 REQUEST:{ANSI_CLEAR}\n"));
    rendered.push_str(&format!("{ANSI_GREEN}{light}{ANSI_CLEAR}\n"));
    rendered.push_str(&format!("{request_dump}\n"));

    rendered.push_str(&format!("{ANSI_BOLD}{ANSI_BLUE}📥 RESPONSE:{ANSI_CLEAR}\n"));
    rendered.push_str(&format!("{ANSI_BLUE}{light}{ANSI_CLEAR}\n"));
    rendered.push_str(&format!("{}\n", truncate_response(response_dump)));

    rendered.push_str(&format!("{ANSI_CYAN}{heavy}{ANSI_CLEAR}\n"));
    rendered.push_str(&format!(
        "{ANSI_BOLD}{ANSI_CYAN}✅ END OF DEBUG OUTPUT{ANSI_CLEAR}\n"
    ));
    rendered.push_str(&format!("{ANSI_CYAN}{heavy}{ANSI_CLEAR}\n\n"));

    rendered
}

/// write [`render`]'s output to stdout
#[allow(clippy::print_stdout)]
pub fn print(request_dump: &str, response_dump: &str) {
    print!("{}", render(request_dump, response_dump));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_dumps_are_untouched() {
        let dump = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
        assert_eq!(truncate_response(dump), dump);

        let exact = "x".repeat(MAX_RESPONSE_DUMP);
        assert_eq!(truncate_response(&exact), exact);
    }

    #[test]
    fn long_bodies_keep_headers_and_report_the_remainder() {
        let headers = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n";
        let dump = format!("{headers}{}", "b".repeat(3000));

        let truncated = truncate_response(&dump);

        assert!(truncated.starts_with(headers));
        assert!(truncated.starts_with(&dump[..MAX_RESPONSE_DUMP]));
        assert!(truncated.contains(&format!(
            "[TRUNCATED - {} more chars]",
            dump.len() - MAX_RESPONSE_DUMP
        )));
    }

    #[test]
    fn dumps_without_a_boundary_are_hard_cut() {
        let dump = "z".repeat(2100);
        let truncated = truncate_response(&dump);

        assert!(truncated.starts_with(&"z".repeat(MAX_RESPONSE_DUMP)));
        assert!(!truncated.starts_with(&"z".repeat(MAX_RESPONSE_DUMP + 1)));
        assert!(truncated.contains("[TRUNCATED - 100 more chars]"));
    }

    #[test]
    fn cuts_land_on_character_boundaries() {
        // 1999 ascii bytes followed by multi-byte characters straddling the limit
        let dump = format!("{}{}", "a".repeat(1999), "é".repeat(100));
        let truncated = truncate_response(&dump);

        assert!(truncated.starts_with(&"a".repeat(1999)));
        assert!(!truncated.starts_with(&format!("{}é", "a".repeat(1999))));
        assert!(truncated.contains("[TRUNCATED - 100 more chars]"));
    }

    #[test]
    fn rendering_frames_both_dumps() {
        let rendered = render("GET / HTTP/1.1\r\nHost: x\r\n\r\n", "HTTP/1.1 200 OK\r\n\r\nhi");

        assert!(rendered.contains("DEBUG: FIRST HTTP REQUEST AND RESPONSE"));
        assert!(rendered.contains("REQUEST:"));
        assert!(rendered.contains("GET / HTTP/1.1\r\nHost: x"));
        assert!(rendered.contains("RESPONSE:"));
        assert!(rendered.contains("HTTP/1.1 200 OK\r\n\r\nhi"));
        assert!(rendered.contains("END OF DEBUG OUTPUT"));
        assert_eq!(rendered.matches(&"═".repeat(60)).count(), 4);
    }
}
