/// Minimal HTML subset shared by the sanitizer, the transcript painter and
/// the table-context extractor.
///
/// The backend's artifacts and the markdown renderer's output only ever use
/// a small, flat vocabulary (paragraphs, headings, lists, tables, code,
/// `div.mermaid` blocks), so a hand-rolled tokenizer over that subset is
/// enough. Tokens round-trip through `serialize` so sanitized markup can be
/// stored verbatim, and `parse_blocks` turns a fragment into the block tree
/// the terminal painter consumes.
use std::borrow::Cow;

// ── Tokens ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl Tag {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn class_contains(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_whitespace().any(|p| p == class))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Decoded character data.
    Text(String),
    Open(Tag),
    Close(String),
    SelfClose(Tag),
}

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "col", "wbr"];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Elements whose content is raw text, never markup.
fn is_raw_text(name: &str) -> bool {
    name == "script" || name == "style"
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    macro_rules! flush_text {
        () => {
            if !text.is_empty() {
                tokens.push(Token::Text(decode_entities(&text)));
                text.clear();
            }
        };
    }

    while i < input.len() {
        let rest = &input[i..];
        if !rest.starts_with('<') {
            match rest.find('<') {
                Some(next) => {
                    text.push_str(&rest[..next]);
                    i += next;
                }
                None => {
                    text.push_str(rest);
                    break;
                }
            }
            continue;
        }

        // Comments are dropped whole
        if rest.starts_with("<!--") {
            flush_text!();
            i += rest.find("-->").map(|e| e + 3).unwrap_or(rest.len());
            continue;
        }
        // Doctype declarations and processing instructions, likewise
        if rest.starts_with("<!") || rest.starts_with("<?") {
            flush_text!();
            i += rest.find('>').map(|e| e + 1).unwrap_or(rest.len());
            continue;
        }
        // Close tag
        if rest.starts_with("</") {
            match rest.find('>') {
                Some(end) => {
                    flush_text!();
                    let name = rest[2..end].trim().to_ascii_lowercase();
                    tokens.push(Token::Close(name));
                    i += end + 1;
                }
                None => {
                    text.push('<');
                    i += 1;
                }
            }
            continue;
        }
        // Open tag only if a name starts right after '<'; otherwise the '<'
        // is literal text ("3 < 4")
        if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            if let Some((tag, self_closing, consumed)) = parse_tag(rest) {
                flush_text!();
                let name = tag.name.clone();
                if self_closing {
                    tokens.push(Token::SelfClose(tag));
                } else {
                    tokens.push(Token::Open(tag));
                }
                i += consumed;
                // Raw-text elements swallow everything up to their close tag
                if !self_closing && is_raw_text(&name) {
                    let close = format!("</{name}");
                    let after = &input[i..];
                    let lower = after.to_ascii_lowercase();
                    match lower.find(&close) {
                        Some(pos) => {
                            if pos > 0 {
                                tokens.push(Token::Text(after[..pos].to_string()));
                            }
                            let close_end = after[pos..]
                                .find('>')
                                .map(|e| pos + e + 1)
                                .unwrap_or(after.len());
                            tokens.push(Token::Close(name));
                            i += close_end;
                        }
                        None => {
                            tokens.push(Token::Text(after.to_string()));
                            i = input.len();
                        }
                    }
                }
                continue;
            }
        }
        text.push('<');
        i += 1;
    }
    flush_text!();
    tokens
}

/// Parse one tag starting at `<`. Returns the tag, whether it was written
/// self-closing, and the byte length consumed. `None` means the input is not
/// a well-formed tag and the caller should treat the `<` as text.
fn parse_tag(s: &str) -> Option<(Tag, bool, usize)> {
    let bytes = s.as_bytes();
    let mut i = 1;
    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    let name = s[name_start..i].to_ascii_lowercase();
    let mut attrs = Vec::new();

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        match bytes[i] {
            b'>' => return Some((Tag { name, attrs }, false, i + 1)),
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                return Some((Tag { name, attrs }, true, i + 2));
            }
            _ => {
                let attr_start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && !matches!(bytes[i], b'=' | b'>' | b'/')
                {
                    i += 1;
                }
                if i == attr_start {
                    // Stray '/' not followed by '>', skip it
                    i += 1;
                    continue;
                }
                let attr_name = s[attr_start..i].to_ascii_lowercase();
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                let mut value = String::new();
                if bytes.get(i) == Some(&b'=') {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    match bytes.get(i) {
                        Some(&q) if q == b'"' || q == b'\'' => {
                            i += 1;
                            let value_start = i;
                            while i < bytes.len() && bytes[i] != q {
                                i += 1;
                            }
                            if i >= bytes.len() {
                                return None;
                            }
                            value = decode_entities(&s[value_start..i]);
                            i += 1;
                        }
                        _ => {
                            let value_start = i;
                            while i < bytes.len()
                                && !bytes[i].is_ascii_whitespace()
                                && !matches!(bytes[i], b'>' | b'/')
                            {
                                i += 1;
                            }
                            value = decode_entities(&s[value_start..i]);
                        }
                    }
                }
                attrs.push((attr_name, value));
            }
        }
    }
}

fn decode_entities(s: &str) -> String {
    match html_escape::decode_html_entities(s) {
        Cow::Borrowed(b) => b.to_string(),
        Cow::Owned(o) => o,
    }
}

/// Re-emit tokens as markup. Text is entity-encoded, attribute values are
/// double-quoted; `serialize(tokenize(x))` is byte-stable for the clean
/// fragments the backend and the markdown renderer produce.
pub fn serialize(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Text(t) => out.push_str(&html_escape::encode_text(t)),
            Token::Open(tag) => push_tag(&mut out, tag, false),
            Token::SelfClose(tag) => push_tag(&mut out, tag, true),
            Token::Close(name) => {
                if !is_void(name) {
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
            }
        }
    }
    out
}

fn push_tag(out: &mut String, tag: &Tag, self_close: bool) {
    out.push('<');
    out.push_str(&tag.name);
    for (k, v) in &tag.attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&html_escape::encode_double_quoted_attribute(v));
        out.push('"');
    }
    if self_close {
        out.push_str(" />");
    }
    out.push('>');
}

// ── Block tree ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub code: bool,
    pub link: Option<String>,
}

/// One styled run of text. Runs carry `\n` for explicit breaks.
#[derive(Debug, Clone, PartialEq)]
pub struct Inline {
    pub text: String,
    pub style: InlineStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    Bullet,
    Number(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, inlines: Vec<Inline> },
    Paragraph { inlines: Vec<Inline> },
    Quote { inlines: Vec<Inline> },
    ListItem { depth: usize, marker: Marker, inlines: Vec<Inline> },
    CodeBlock { lang: Option<String>, text: String },
    Diagram { source: String },
    Table { head: Vec<String>, rows: Vec<Vec<String>> },
    Rule,
}

struct ListFrame {
    ordered: bool,
    next: u64,
}

#[derive(Default)]
struct TableFrame {
    head: Vec<String>,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: Option<String>,
    row_is_header: bool,
    depth: usize,
}

#[derive(Default)]
struct PreFrame {
    lang: Option<String>,
    text: String,
}

/// Parse a fragment into paint-ready blocks. Unknown elements are
/// transparent containers; structure the painter cannot express (nested
/// tables, markup inside cells) is flattened to text.
pub fn parse_blocks(html: &str) -> Vec<Block> {
    Builder::default().run(tokenize(html))
}

#[derive(Default)]
struct Builder {
    blocks: Vec<Block>,
    inlines: Vec<Inline>,
    style: InlineStyle,
    style_stack: Vec<InlineStyle>,
    heading: Option<u8>,
    quote_depth: usize,
    lists: Vec<ListFrame>,
    item_marker: Option<Marker>,
    pre: Option<PreFrame>,
    diagram: Option<(usize, String)>,
    table: Option<TableFrame>,
}

impl Builder {
    fn run(mut self, tokens: Vec<Token>) -> Vec<Block> {
        for token in tokens {
            match token {
                Token::Text(t) => self.on_text(&t),
                Token::Open(tag) => self.on_open(&tag),
                Token::SelfClose(tag) => self.on_open(&tag),
                Token::Close(name) => self.on_close(&name),
            }
        }
        self.flush_inline_block();
        if let Some(pre) = self.pre.take() {
            self.push_pre(pre);
        }
        if let Some((_, source)) = self.diagram.take() {
            self.blocks.push(Block::Diagram { source });
        }
        if let Some(table) = self.table.take() {
            self.push_table(table);
        }
        self.blocks
    }

    fn on_text(&mut self, t: &str) {
        if let Some((_, buf)) = self.diagram.as_mut() {
            buf.push_str(t);
            return;
        }
        if let Some(pre) = self.pre.as_mut() {
            pre.text.push_str(t);
            return;
        }
        if let Some(table) = self.table.as_mut() {
            if let Some(cell) = table.cell.as_mut() {
                cell.push_str(&collapse_ws(t));
            }
            return;
        }
        let collapsed = collapse_ws(t);
        if collapsed.trim().is_empty() && self.inlines.is_empty() {
            return;
        }
        self.push_run(&collapsed);
    }

    fn push_run(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.inlines.last_mut() {
            if last.style == self.style {
                last.text.push_str(text);
                return;
            }
        }
        self.inlines.push(Inline {
            text: text.to_string(),
            style: self.style.clone(),
        });
    }

    fn push_style(&mut self) {
        self.style_stack.push(self.style.clone());
    }

    fn pop_style(&mut self) {
        if let Some(prev) = self.style_stack.pop() {
            self.style = prev;
        }
    }

    fn on_open(&mut self, tag: &Tag) {
        if let Some((depth, _)) = self.diagram.as_mut() {
            if tag.name == "div" {
                *depth += 1;
            }
            return;
        }
        if self.table.is_some() && tag.name != "table" {
            self.on_open_in_table(tag);
            return;
        }
        match tag.name.as_str() {
            "p" => self.flush_inline_block(),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush_inline_block();
                self.heading = tag.name[1..].parse::<u8>().ok();
            }
            "strong" | "b" => {
                self.push_style();
                self.style.bold = true;
            }
            "em" | "i" => {
                self.push_style();
                self.style.italic = true;
            }
            "u" => {
                self.push_style();
                self.style.underline = true;
            }
            "del" | "s" | "strike" => {
                self.push_style();
                self.style.strike = true;
            }
            "a" => {
                self.push_style();
                self.style.link = tag.attr("href").map(str::to_string);
                self.style.underline = true;
            }
            "code" => {
                if let Some(pre) = self.pre.as_mut() {
                    pre.lang = tag
                        .attr("class")
                        .and_then(|c| {
                            c.split_whitespace()
                                .find_map(|p| p.strip_prefix("language-"))
                        })
                        .map(str::to_string);
                } else {
                    self.push_style();
                    self.style.code = true;
                }
            }
            "pre" => {
                self.flush_inline_block();
                self.pre = Some(PreFrame::default());
            }
            "br" => self.push_run("\n"),
            "hr" => {
                self.flush_inline_block();
                self.blocks.push(Block::Rule);
            }
            "ul" => {
                self.flush_inline_block();
                self.lists.push(ListFrame {
                    ordered: false,
                    next: 1,
                });
            }
            "ol" => {
                self.flush_inline_block();
                let start = tag
                    .attr("start")
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(1);
                self.lists.push(ListFrame {
                    ordered: true,
                    next: start,
                });
            }
            "li" => {
                self.flush_inline_block();
                let marker = match self.lists.last_mut() {
                    Some(frame) if frame.ordered => {
                        let n = frame.next;
                        frame.next += 1;
                        Marker::Number(n)
                    }
                    _ => Marker::Bullet,
                };
                self.item_marker = Some(marker);
            }
            "blockquote" => {
                self.flush_inline_block();
                self.quote_depth += 1;
            }
            "div" if tag.class_contains("mermaid") => {
                self.flush_inline_block();
                self.diagram = Some((0, String::new()));
            }
            "table" => {
                match self.table.as_mut() {
                    // A table inside a cell is flattened away
                    Some(frame) => frame.depth += 1,
                    None => {
                        self.flush_inline_block();
                        self.table = Some(TableFrame::default());
                    }
                }
            }
            "input" => {
                if tag.attr("type") == Some("checkbox") {
                    let mark = if tag.attr("checked").is_some() {
                        "[x] "
                    } else {
                        "[ ] "
                    };
                    self.push_run(mark);
                }
            }
            // div/span and anything unrecognized are transparent
            _ => {}
        }
    }

    fn on_open_in_table(&mut self, tag: &Tag) {
        let Some(frame) = self.table.as_mut() else {
            return;
        };
        if frame.depth > 0 {
            return;
        }
        match tag.name.as_str() {
            "tr" => {
                frame.row.clear();
                frame.row_is_header = false;
            }
            "th" => {
                frame.cell = Some(String::new());
                frame.row_is_header = true;
            }
            "td" => frame.cell = Some(String::new()),
            "br" => {
                if let Some(cell) = frame.cell.as_mut() {
                    cell.push(' ');
                }
            }
            _ => {}
        }
    }

    fn on_close(&mut self, name: &str) {
        if let Some((depth, _)) = self.diagram.as_mut() {
            if name == "div" {
                if *depth == 0 {
                    let (_, source) = self.diagram.take().unwrap_or((0, String::new()));
                    self.blocks.push(Block::Diagram { source });
                } else {
                    *depth -= 1;
                }
            }
            return;
        }
        if self.table.is_some() {
            self.on_close_in_table(name);
            return;
        }
        match name {
            "p" | "li" | "blockquote" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush_inline_block();
                match name {
                    "blockquote" => self.quote_depth = self.quote_depth.saturating_sub(1),
                    "li" => self.item_marker = None,
                    _ => self.heading = None,
                }
            }
            "ul" | "ol" => {
                self.flush_inline_block();
                self.lists.pop();
            }
            "pre" => {
                if let Some(pre) = self.pre.take() {
                    self.push_pre(pre);
                }
            }
            "strong" | "b" | "em" | "i" | "u" | "del" | "s" | "strike" | "a" => {
                self.pop_style()
            }
            "code" => {
                if self.pre.is_none() {
                    self.pop_style();
                }
            }
            _ => {}
        }
    }

    fn on_close_in_table(&mut self, name: &str) {
        let Some(frame) = self.table.as_mut() else {
            return;
        };
        if name == "table" {
            if frame.depth > 0 {
                frame.depth -= 1;
                return;
            }
            let frame = self.table.take().unwrap_or_default();
            self.push_table(frame);
            return;
        }
        if frame.depth > 0 {
            return;
        }
        match name {
            "th" | "td" => {
                if let Some(cell) = frame.cell.take() {
                    frame.row.push(cell.trim().to_string());
                }
            }
            "tr" => {
                let row = std::mem::take(&mut frame.row);
                if row.is_empty() {
                    return;
                }
                if frame.row_is_header && frame.head.is_empty() {
                    frame.head = row;
                } else {
                    frame.rows.push(row);
                }
            }
            _ => {}
        }
    }

    fn push_pre(&mut self, pre: PreFrame) {
        let text = pre.text.trim_matches('\n').to_string();
        if pre.lang.as_deref() == Some("mermaid") {
            self.blocks.push(Block::Diagram { source: text });
        } else {
            self.blocks.push(Block::CodeBlock {
                lang: pre.lang,
                text,
            });
        }
    }

    fn push_table(&mut self, frame: TableFrame) {
        if frame.head.is_empty() && frame.rows.is_empty() {
            return;
        }
        self.blocks.push(Block::Table {
            head: frame.head,
            rows: frame.rows,
        });
    }

    fn flush_inline_block(&mut self) {
        let mut runs = std::mem::take(&mut self.inlines);
        if let Some(first) = runs.first_mut() {
            let trimmed = first.text.trim_start().to_string();
            first.text = trimmed;
        }
        if let Some(last) = runs.last_mut() {
            let trimmed = last.text.trim_end().to_string();
            last.text = trimmed;
        }
        runs.retain(|r| !r.text.is_empty());
        if runs.is_empty() {
            return;
        }
        let block = if let Some(level) = self.heading {
            Block::Heading {
                level,
                inlines: runs,
            }
        } else if let Some(marker) = self.item_marker.clone() {
            Block::ListItem {
                depth: self.lists.len().max(1),
                marker,
                inlines: runs,
            }
        } else if self.quote_depth > 0 {
            Block::Quote { inlines: runs }
        } else {
            Block::Paragraph { inlines: runs }
        };
        self.blocks.push(block);
    }
}

/// HTML whitespace: newlines and tabs act as spaces, runs collapse.
fn collapse_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out
}

// ── Table extraction ──────────────────────────────────────────────────────────

/// Outer HTML of the first `table.llm-table` in a fragment, the way the
/// original UI located the backend's table artifact for the compose
/// context handoff. Markdown-rendered tables carry no class and never match.
pub fn find_llm_table(html: &str) -> Option<String> {
    let tokens = tokenize(html);
    for (i, token) in tokens.iter().enumerate() {
        let Token::Open(tag) = token else { continue };
        if tag.name != "table" || !tag.class_contains("llm-table") {
            continue;
        }
        let mut depth = 0usize;
        for (j, t) in tokens[i..].iter().enumerate() {
            match t {
                Token::Open(t2) if t2.name == "table" => depth += 1,
                Token::Close(n) if n == "table" => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(serialize(&tokens[i..=i + j]));
                    }
                }
                _ => {}
            }
        }
        // Unterminated table: take what is there
        return Some(serialize(&tokens[i..]));
    }
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_markup_round_trips() {
        let html = "<p>hi</p>";
        assert_eq!(serialize(&tokenize(html)), html);
    }

    #[test]
    fn attributes_round_trip() {
        let html = "<table class=\"llm-table\"><tr><td>1</td></tr></table>";
        assert_eq!(serialize(&tokenize(html)), html);
    }

    #[test]
    fn entities_decode_and_reencode() {
        let tokens = tokenize("<p>a &amp; b &lt; c</p>");
        assert_eq!(tokens[1], Token::Text("a & b < c".to_string()));
        assert_eq!(serialize(&tokens), "<p>a &amp; b &lt; c</p>");
    }

    #[test]
    fn stray_angle_bracket_is_text() {
        let tokens = tokenize("<p>3 < 4</p>");
        assert_eq!(tokens[1], Token::Text("3 < 4".to_string()));
    }

    #[test]
    fn comments_are_dropped() {
        assert_eq!(serialize(&tokenize("<p>a<!-- hidden -->b</p>")), "<p>ab</p>");
    }

    #[test]
    fn script_content_is_raw_text() {
        let tokens = tokenize("<script>if (a < b) alert('x')</script>");
        assert_eq!(
            tokens,
            vec![
                Token::Open(Tag {
                    name: "script".into(),
                    attrs: vec![],
                }),
                Token::Text("if (a < b) alert('x')".into()),
                Token::Close("script".into()),
            ]
        );
    }

    #[test]
    fn blocks_from_headings_paragraphs_lists() {
        let blocks = parse_blocks(
            "<h2>Results</h2><p>two <strong>bold</strong> words</p><ul><li>first</li><li>second</li></ul>",
        );
        assert_eq!(blocks.len(), 4);
        match &blocks[0] {
            Block::Heading { level, inlines } => {
                assert_eq!(*level, 2);
                assert_eq!(inlines[0].text, "Results");
            }
            other => panic!("expected heading, got {other:?}"),
        }
        match &blocks[1] {
            Block::Paragraph { inlines } => {
                assert_eq!(inlines.len(), 3);
                assert!(inlines[1].style.bold);
                assert_eq!(inlines[1].text, "bold");
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
        match (&blocks[2], &blocks[3]) {
            (
                Block::ListItem {
                    marker: Marker::Bullet,
                    inlines: a,
                    ..
                },
                Block::ListItem {
                    marker: Marker::Bullet,
                    inlines: b,
                    ..
                },
            ) => {
                assert_eq!(a[0].text, "first");
                assert_eq!(b[0].text, "second");
            }
            other => panic!("expected two list items, got {other:?}"),
        }
    }

    #[test]
    fn ordered_list_counts_from_start_attr() {
        let blocks = parse_blocks("<ol start=\"3\"><li>c</li><li>d</li></ol>");
        let numbers: Vec<_> = blocks
            .iter()
            .filter_map(|b| match b {
                Block::ListItem {
                    marker: Marker::Number(n),
                    ..
                } => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec![3, 4]);
    }

    #[test]
    fn table_with_thead_parses_header_and_rows() {
        let blocks = parse_blocks(
            "<table class=\"llm-table\"><thead><tr><th>Name</th><th>Qty</th></tr></thead>\
             <tbody><tr><td>apples</td><td>4</td></tr><tr><td>pears</td><td>2</td></tr></tbody></table>",
        );
        match &blocks[0] {
            Block::Table { head, rows } => {
                assert_eq!(head, &vec!["Name".to_string(), "Qty".to_string()]);
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[1], vec!["pears".to_string(), "2".to_string()]);
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn code_block_keeps_language_and_text() {
        let blocks =
            parse_blocks("<pre><code class=\"language-sql\">select 1;\nselect 2;</code></pre>");
        match &blocks[0] {
            Block::CodeBlock { lang, text } => {
                assert_eq!(lang.as_deref(), Some("sql"));
                assert_eq!(text, "select 1;\nselect 2;");
            }
            other => panic!("expected code block, got {other:?}"),
        }
    }

    #[test]
    fn mermaid_div_and_fence_become_diagrams() {
        let blocks = parse_blocks("<div class=\"mermaid\">graph TD; A-->B;</div>");
        assert!(matches!(&blocks[0], Block::Diagram { source } if source.contains("A-->B")));

        let blocks = parse_blocks("<pre><code class=\"language-mermaid\">graph LR; X-->Y;</code></pre>");
        assert!(matches!(&blocks[0], Block::Diagram { source } if source.contains("X-->Y")));
    }

    #[test]
    fn br_becomes_explicit_break() {
        let blocks = parse_blocks("<p>one<br>two</p>");
        match &blocks[0] {
            Block::Paragraph { inlines } => {
                let joined: String = inlines.iter().map(|i| i.text.as_str()).collect();
                assert_eq!(joined, "one\ntwo");
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn finds_first_llm_table_only() {
        let html = "<p>intro</p>\
            <table class=\"llm-table\"><tr><td>first</td></tr></table>\
            <table class=\"llm-table\"><tr><td>second</td></tr></table>";
        let outer = find_llm_table(html).unwrap();
        assert!(outer.starts_with("<table class=\"llm-table\">"));
        assert!(outer.contains("first"));
        assert!(!outer.contains("second"));
    }

    #[test]
    fn plain_tables_do_not_match() {
        assert!(find_llm_table("<table><tr><td>x</td></tr></table>").is_none());
        assert!(find_llm_table("<p>no tables</p>").is_none());
    }
}
