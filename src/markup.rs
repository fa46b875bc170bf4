//! Interprets the small HTML subset chat replies use, for display in a
//! terminal. Inline emphasis becomes ANSI styling, block tags become line
//! breaks, entities are decoded and any other tag is dropped.

const BOLD: &str = "\x1b[1m";
const ITALIC: &str = "\x1b[3m";
const UNDERLINE: &str = "\x1b[4m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Bold,
    Italic,
    Underline,
}

impl Style {
    fn code(self) -> &'static str {
        match self {
            Style::Bold => BOLD,
            Style::Italic => ITALIC,
            Style::Underline => UNDERLINE,
        }
    }

    fn for_tag(name: &str) -> Option<Self> {
        match name {
            "b" | "strong" => Some(Style::Bold),
            "i" | "em" => Some(Style::Italic),
            "u" | "ins" => Some(Style::Underline),
            _ => None,
        }
    }
}

pub fn to_ansi(fragment: &str) -> String {
    Interpreter::new(true).run(fragment)
}

pub fn to_plain(fragment: &str) -> String {
    Interpreter::new(false).run(fragment)
}

struct Interpreter {
    ansi: bool,
    out: String,
    // Open depth per style, indexed bold, italic, underline.
    depth: [usize; 3],
}

impl Interpreter {
    fn new(ansi: bool) -> Self {
        Self {
            ansi,
            out: String::new(),
            depth: [0; 3],
        }
    }

    fn run(mut self, fragment: &str) -> String {
        let mut rest = fragment;
        while let Some(c) = rest.chars().next() {
            match c {
                '<' if rest.starts_with("<!--") => {
                    rest = match rest[4..].find("-->") {
                        Some(end) => &rest[4 + end + 3..],
                        None => "",
                    };
                }
                '<' => match rest.find('>').filter(|_| opens_tag(rest)) {
                    Some(end) => {
                        self.tag(&rest[1..end]);
                        rest = &rest[end + 1..];
                    }
                    None => {
                        self.out.push('<');
                        rest = &rest[1..];
                    }
                },
                '&' => {
                    let (decoded, consumed) = decode_entity(rest);
                    self.out.push_str(&decoded);
                    rest = &rest[consumed..];
                }
                _ => {
                    self.out.push(c);
                    rest = &rest[c.len_utf8()..];
                }
            }
        }

        if self.ansi && self.depth.iter().any(|d| *d > 0) {
            self.out.push_str(RESET);
        }
        while self.out.ends_with('\n') {
            self.out.pop();
        }
        self.out
    }

    fn tag(&mut self, raw: &str) {
        let raw = raw.trim();
        let (closing, body) = match raw.strip_prefix('/') {
            Some(body) => (true, body),
            None => (false, raw),
        };
        let name: String = body
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        if let Some(style) = Style::for_tag(&name) {
            if closing {
                self.close(style);
            } else {
                self.open(style);
            }
            return;
        }

        match name.as_str() {
            "br" => self.out.push('\n'),
            "p" | "div" | "li" | "ul" | "ol" => self.line_break(),
            _ => {}
        }
    }

    fn open(&mut self, style: Style) {
        let depth = &mut self.depth[style as usize];
        *depth += 1;
        if *depth == 1 && self.ansi {
            self.out.push_str(style.code());
        }
    }

    fn close(&mut self, style: Style) {
        let depth = &mut self.depth[style as usize];
        if *depth == 0 {
            return;
        }
        *depth -= 1;
        if *depth == 0 && self.ansi {
            self.out.push_str(RESET);
            for active in [Style::Bold, Style::Italic, Style::Underline] {
                if self.depth[active as usize] > 0 {
                    self.out.push_str(active.code());
                }
            }
        }
    }

    fn line_break(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }
}

/// A `<` only starts a tag when followed by a letter, or by `/` or `!`
/// and then a letter. Anything else is literal text.
fn opens_tag(input: &str) -> bool {
    let mut chars = input.chars().skip(1);
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => true,
        Some('/' | '!') => chars.next().is_some_and(|c| c.is_ascii_alphabetic()),
        _ => false,
    }
}

/// Decodes the entity at the start of `input` (which begins with `&`).
/// Returns the replacement text and the number of bytes consumed.
fn decode_entity(input: &str) -> (String, usize) {
    let literal = ("&".to_string(), 1);
    let Some(end) = input[1..].find(';').map(|i| i + 1) else {
        return literal;
    };
    if end > 10 {
        return literal;
    }
    let name = &input[1..end];
    let decoded = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => name.strip_prefix('#').and_then(|num| {
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }),
    };
    match decoded {
        Some(c) => (c.to_string(), end + 1),
        None => literal,
    }
}
