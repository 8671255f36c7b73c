//! Tolerant YAML parser.
//!
//! Handles the block and flow subset used by pipeline files: mappings,
//! sequences, plain/quoted/block scalars, anchors, aliases, tags and
//! document markers. Malformed input never aborts the parse. Each problem
//! is recorded as a [`SyntaxError`] and parsing resumes at the next line
//! that fits the enclosing block.

use super::node::{
    Anchor, Ast, Entry, MERGE_KEY, Node, NodeId, NodeKind, ScalarStyle, SeqItem, Span,
    SyntaxError, SyntaxErrorKind,
};

pub fn parse(text: &str) -> Ast {
    let mut parser = Parser::new(text);
    parser.parse_stream();
    let mut ast = Ast {
        source: text.to_string(),
        nodes: parser.nodes,
        documents: parser.documents,
        anchors: parser.anchors,
        errors: parser.errors,
    };
    check_merges(&mut ast);
    ast
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    nodes: Vec<Node>,
    documents: Vec<NodeId>,
    anchors: Vec<(String, NodeId)>,
    errors: Vec<SyntaxError>,
}

fn is_ws(b: u8) -> bool {
    b == b' ' || b == b'\t' || b == b'\r'
}

fn is_flow_indicator(b: u8) -> bool {
    matches!(b, b',' | b'[' | b']' | b'{' | b'}')
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            nodes: Vec::new(),
            documents: Vec::new(),
            anchors: Vec::new(),
            errors: Vec::new(),
        }
    }

    // ----- low level helpers -----

    fn peek_at(&self, p: usize) -> Option<u8> {
        self.bytes.get(p).copied()
    }

    fn peek(&self) -> Option<u8> {
        self.peek_at(self.pos)
    }

    fn line_start(&self, p: usize) -> usize {
        self.src[..p.min(self.src.len())]
            .rfind('\n')
            .map_or(0, |i| i + 1)
    }

    fn line_end(&self, p: usize) -> usize {
        self.src[p.min(self.src.len())..]
            .find('\n')
            .map_or(self.src.len(), |i| p + i)
    }

    fn col(&self, p: usize) -> usize {
        p - self.line_start(p)
    }

    fn char_span(&self, p: usize) -> Span {
        let len = self.src[p.min(self.src.len())..]
            .chars()
            .next()
            .map_or(0, |c| c.len_utf8());
        Span::new(p, p + len)
    }

    fn skip_inline_ws(&mut self) {
        while let Some(b) = self.peek() {
            if is_ws(b) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// True at end of line, end of input or at a comment.
    fn at_line_end(&self) -> bool {
        match self.peek() {
            None | Some(b'\n') => true,
            Some(b'#') => self.pos == 0 || self.peek_at(self.pos - 1).is_none_or(|b| is_ws(b) || b == b'\n'),
            _ => false,
        }
    }

    /// Position of the next content byte at or after `pos`, skipping blank
    /// space, newlines and comments.
    fn next_content(&self) -> Option<usize> {
        let mut p = self.pos;
        loop {
            while p < self.bytes.len() && is_ws(self.bytes[p]) {
                p += 1;
            }
            match self.bytes.get(p) {
                None => return None,
                Some(b'\n') => p += 1,
                Some(b'#') => p = self.line_end(p),
                Some(_) => return Some(p),
            }
        }
    }

    fn is_doc_marker(&self, p: usize) -> bool {
        if self.col(p) != 0 {
            return false;
        }
        let rest = &self.bytes[p..];
        (rest.starts_with(b"---") || rest.starts_with(b"..."))
            && rest.get(3).is_none_or(|b| is_ws(*b) || *b == b'\n')
    }

    /// `-` followed by whitespace or end of line.
    fn is_dash(&self, p: usize) -> bool {
        self.peek_at(p) == Some(b'-')
            && self
                .peek_at(p + 1)
                .is_none_or(|b| is_ws(b) || b == b'\n')
    }

    fn error(&mut self, kind: SyntaxErrorKind, message: impl Into<String>, span: Span) {
        self.errors.push(SyntaxError {
            kind,
            message: message.into(),
            span,
        });
    }

    fn push(&mut self, kind: NodeKind, span: Span, flow: bool) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let children: Vec<NodeId> = match &kind {
            NodeKind::Mapping(entries) => entries.iter().flat_map(|e| [e.key, e.value]).collect(),
            NodeKind::Sequence(items) => items.iter().map(|i| i.value).collect(),
            _ => Vec::new(),
        };
        self.nodes.push(Node {
            kind,
            span,
            parent: None,
            anchor: None,
            tag: None,
            flow,
        });
        for child in children {
            self.nodes[child.index()].parent = Some(id);
        }
        id
    }

    fn push_scalar(&mut self, value: String, style: ScalarStyle, span: Span, flow: bool) -> NodeId {
        self.push(NodeKind::Scalar { value, style }, span, flow)
    }

    /// Skips the line at `p` and every following line indented deeper.
    fn skip_block(&mut self, p: usize) {
        let indent = self.col(p);
        self.pos = self.line_end(p);
        while let Some(q) = self.next_content() {
            if self.is_doc_marker(q) || self.col(q) <= indent {
                break;
            }
            self.pos = self.line_end(q);
        }
    }

    /// Scans the line at `p` for a `key:` indicator.
    fn has_key_indicator(&self, p: usize) -> bool {
        let end = self.line_end(p);
        let mut i = p;
        if let Some(q @ (b'"' | b'\'')) = self.peek_at(p) {
            i += 1;
            while i < end {
                if self.bytes[i] == b'\\' && q == b'"' {
                    i += 2;
                    continue;
                }
                if self.bytes[i] == q {
                    if q == b'\'' && self.peek_at(i + 1) == Some(b'\'') {
                        i += 2;
                        continue;
                    }
                    break;
                }
                i += 1;
            }
            if i >= end {
                return false;
            }
            i += 1;
            while i < end && is_ws(self.bytes[i]) {
                i += 1;
            }
            return self.peek_at(i) == Some(b':')
                && self
                    .peek_at(i + 1)
                    .is_none_or(|b| is_ws(b) || b == b'\n');
        }
        self.plain_key_colon(p, end).is_some()
    }

    fn plain_key_colon(&self, p: usize, end: usize) -> Option<usize> {
        let mut i = p;
        while i < end {
            let b = self.bytes[i];
            if b == b'#' && i > p && is_ws(self.bytes[i - 1]) {
                return None;
            }
            if b == b':' && (i + 1 >= end || is_ws(self.bytes[i + 1])) {
                return Some(i);
            }
            i += 1;
        }
        None
    }

    // ----- stream -----

    fn parse_stream(&mut self) {
        loop {
            let Some(p) = self.next_content() else { break };
            if self.col(p) == 0 && self.bytes[p] == b'%' {
                self.pos = self.line_end(p);
                continue;
            }
            if self.is_doc_marker(p) {
                self.pos = p + 3;
                if self.bytes[p] == b'.' {
                    continue;
                }
                let Some(q) = self.next_content() else {
                    break;
                };
                if self.is_doc_marker(q) {
                    continue;
                }
            } else {
                self.pos = p;
            }
            let root = self.parse_node(-1, false, true);
            self.documents.push(root);
            while let Some(q) = self.next_content() {
                if self.is_doc_marker(q) {
                    break;
                }
                let span = self.char_span(q);
                self.error(SyntaxErrorKind::ExpectedBlockEnd, "expected <block end>", span);
                self.skip_block(q);
            }
        }
    }

    // ----- block nodes -----

    /// Parses the node following an indicator (`key:`, `-` or document
    /// start). Content on later lines must be indented deeper than
    /// `parent_indent`, except a sequence directly under a mapping key.
    fn parse_node(&mut self, parent_indent: isize, seq_at_parent: bool, inline_block: bool) -> NodeId {
        let mut empty_at = self.pos;
        let mut anchor: Option<Anchor> = None;
        let mut tag: Option<String> = None;
        let mut inline_block = inline_block;
        loop {
            self.skip_inline_ws();
            if self.at_line_end() {
                match self.next_content() {
                    Some(p)
                        if !self.is_doc_marker(p)
                            && (self.col(p) as isize > parent_indent
                                || (seq_at_parent
                                    && self.col(p) as isize == parent_indent
                                    && self.is_dash(p))) =>
                    {
                        self.pos = p;
                        inline_block = true;
                        if !matches!(self.bytes[p], b'&' | b'!') {
                            break;
                        }
                    }
                    _ => {
                        let id = self.push_scalar(
                            String::new(),
                            ScalarStyle::Plain,
                            Span::empty(empty_at),
                            false,
                        );
                        return self.finish_node(id, anchor, tag);
                    }
                }
            }
            match self.peek() {
                Some(b'&') => {
                    let start = self.pos;
                    self.pos += 1;
                    let name = self.scan_name();
                    anchor = Some(Anchor {
                        name,
                        span: Span::new(start, self.pos),
                    });
                    empty_at = self.pos;
                }
                Some(b'!') => {
                    let start = self.pos;
                    while self.peek().is_some_and(|b| !is_ws(b) && b != b'\n') {
                        self.pos += 1;
                    }
                    tag = Some(self.src[start..self.pos].to_string());
                    empty_at = self.pos;
                }
                _ => break,
            }
        }

        let p = self.pos;
        let id = match self.bytes[p] {
            b'-' if self.is_dash(p) && inline_block => self.parse_block_sequence(self.col(p)),
            // Legacy `{{var}}` placeholders read as plain text.
            b'{' if self.peek_at(p + 1) == Some(b'{') => self.parse_plain(parent_indent),
            b'[' | b'{' => {
                let id = self.parse_flow_node();
                self.expect_line_end(p);
                id
            }
            b'*' => {
                let id = self.parse_alias();
                self.expect_line_end(p);
                id
            }
            b'|' | b'>' => self.parse_block_scalar(parent_indent),
            _ if self.has_key_indicator(p) => {
                if inline_block {
                    self.parse_block_mapping(self.col(p))
                } else {
                    let end = self.line_end(p);
                    self.error(
                        SyntaxErrorKind::MappingNotAllowed,
                        "mapping values are not allowed here",
                        Span::new(p, end),
                    );
                    self.parse_plain(parent_indent)
                }
            }
            b'"' | b'\'' => {
                let id = self.parse_quoted();
                self.expect_line_end(p);
                id
            }
            _ => self.parse_plain(parent_indent),
        };
        self.finish_node(id, anchor, tag)
    }

    fn finish_node(&mut self, id: NodeId, anchor: Option<Anchor>, tag: Option<String>) -> NodeId {
        if let Some(anchor) = anchor {
            self.anchors.push((anchor.name.clone(), id));
            self.nodes[id.index()].anchor = Some(anchor);
        }
        if tag.is_some() {
            self.nodes[id.index()].tag = tag;
        }
        id
    }

    /// Flags trailing content after a node that started at `from`.
    fn expect_line_end(&mut self, from: usize) {
        if self.line_start(self.pos) != self.line_start(from)
            && self.col(self.pos) == self.line_indent(self.pos)
        {
            return;
        }
        self.skip_inline_ws();
        if !self.at_line_end() {
            let span = self.char_span(self.pos);
            self.error(SyntaxErrorKind::ExpectedBlockEnd, "expected <block end>", span);
            let end = self.line_end(self.pos);
            self.pos = end;
        }
    }

    fn scan_name(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| !is_ws(b) && b != b'\n' && !is_flow_indicator(b))
        {
            self.pos += 1;
        }
        self.src[start..self.pos].to_string()
    }

    fn parse_block_mapping(&mut self, indent: usize) -> NodeId {
        let start = self.pos;
        let mut end = start;
        let mut entries = Vec::new();
        while let Some(p) = self.next_content() {
            if self.is_doc_marker(p) {
                break;
            }
            let c = self.col(p);
            if c < indent {
                break;
            }
            if c > indent || self.is_dash(p) {
                let span = self.char_span(p);
                self.error(SyntaxErrorKind::ExpectedBlockEnd, "expected <block end>", span);
                self.skip_block(p);
                continue;
            }
            self.pos = p;
            let (key, has_colon) = self.parse_key();
            let value = if has_colon {
                self.parse_node(indent as isize, true, false)
            } else {
                let key_span = self.nodes[key.index()].span;
                self.error(
                    SyntaxErrorKind::MissingColon,
                    "could not find expected ':'",
                    key_span,
                );
                let at = key_span.end;
                self.pos = self.line_end(p);
                self.push_scalar(String::new(), ScalarStyle::Plain, Span::empty(at), false)
            };
            end = end
                .max(self.nodes[key.index()].span.end)
                .max(self.nodes[value.index()].span.end);
            entries.push(Entry { key, value });
            if self.pos <= p {
                self.pos = self.line_end(p);
            }
        }
        self.push(NodeKind::Mapping(entries), Span::new(start, end), false)
    }

    /// Parses a block mapping key and consumes its `:` when present.
    fn parse_key(&mut self) -> (NodeId, bool) {
        let p = self.pos;
        if matches!(self.bytes[p], b'"' | b'\'') {
            let key = self.parse_quoted();
            self.skip_inline_ws();
            if self.peek() == Some(b':') {
                self.pos += 1;
                return (key, true);
            }
            return (key, false);
        }
        let end = self.line_end(p);
        match self.plain_key_colon(p, end) {
            Some(colon) => {
                let text = self.src[p..colon].trim_end();
                let key = self.push_scalar(
                    text.to_string(),
                    ScalarStyle::Plain,
                    Span::new(p, p + text.len()),
                    false,
                );
                self.pos = colon + 1;
                (key, true)
            }
            None => {
                let mut stop = end;
                if let Some(hash) = self.src[p..end].find(" #") {
                    stop = p + hash;
                }
                let text = self.src[p..stop].trim_end();
                let key = self.push_scalar(
                    text.to_string(),
                    ScalarStyle::Plain,
                    Span::new(p, p + text.len()),
                    false,
                );
                self.pos = stop;
                (key, false)
            }
        }
    }

    fn parse_block_sequence(&mut self, indent: usize) -> NodeId {
        let start = self.pos;
        let mut end = start;
        let mut items = Vec::new();
        while let Some(p) = self.next_content() {
            if self.is_doc_marker(p) {
                break;
            }
            let c = self.col(p);
            if c != indent || !self.is_dash(p) {
                if c > indent {
                    let span = self.char_span(p);
                    self.error(SyntaxErrorKind::ExpectedBlockEnd, "expected <block end>", span);
                    self.skip_block(p);
                    continue;
                }
                break;
            }
            self.pos = p + 1;
            let value = self.parse_node(indent as isize, false, true);
            end = end.max(p + 1).max(self.nodes[value.index()].span.end);
            items.push(SeqItem {
                dash: Some(Span::new(p, p + 1)),
                value,
            });
        }
        self.push(NodeKind::Sequence(items), Span::new(start, end), false)
    }

    fn parse_plain(&mut self, parent_indent: isize) -> NodeId {
        let start = self.pos;
        let line_end = self.line_end(start);
        let stop = self.src[start..line_end]
            .find(" #")
            .map_or(line_end, |i| start + i);
        let first = self.src[start..stop].trim_end();
        let mut value = first.to_string();
        let mut end = start + first.len();
        self.pos = end;
        while let Some(q) = self.next_content() {
            if self.is_doc_marker(q)
                || self.col(q) as isize <= parent_indent
                || self.is_dash(q)
                || self.has_key_indicator(q)
            {
                break;
            }
            // A comment line ends a plain scalar.
            let between = &self.src[end..q];
            if between.contains('#') {
                break;
            }
            let le = self.line_end(q);
            let stop = self.src[q..le].find(" #").map_or(le, |i| q + i);
            let text = self.src[q..stop].trim_end();
            let blank_lines = between.matches('\n').count().saturating_sub(1);
            if blank_lines > 0 {
                value.push_str(&"\n".repeat(blank_lines));
            } else {
                value.push(' ');
            }
            value.push_str(text);
            end = q + text.len();
            self.pos = end;
        }
        self.push_scalar(value, ScalarStyle::Plain, Span::new(start, end), false)
    }

    fn parse_quoted(&mut self) -> NodeId {
        let start = self.pos;
        let quote = self.bytes[start];
        let style = if quote == b'"' {
            ScalarStyle::DoubleQuoted
        } else {
            ScalarStyle::SingleQuoted
        };
        let mut value = String::new();
        let mut i = start + 1;
        let mut closed = false;
        while i < self.bytes.len() {
            let b = self.bytes[i];
            if b == quote {
                if quote == b'\'' && self.peek_at(i + 1) == Some(b'\'') {
                    value.push('\'');
                    i += 2;
                    continue;
                }
                closed = true;
                i += 1;
                break;
            }
            if b == b'\\' && quote == b'"' {
                let escaped = self.peek_at(i + 1);
                match escaped {
                    Some(b'n') => value.push('\n'),
                    Some(b't') => value.push('\t'),
                    Some(b'r') => value.push('\r'),
                    Some(b'0') => value.push('\0'),
                    Some(b'"') => value.push('"'),
                    Some(b'\\') => value.push('\\'),
                    Some(b'/') => value.push('/'),
                    Some(b'\n') => {}
                    Some(other) if other.is_ascii() => {
                        value.push('\\');
                        value.push(other as char);
                    }
                    _ => value.push('\\'),
                }
                i += if escaped.is_some_and(|b| b.is_ascii()) { 2 } else { 1 };
                continue;
            }
            if b == b'\n' {
                while value.ends_with(' ') || value.ends_with('\t') {
                    value.pop();
                }
                let mut j = i + 1;
                let mut newlines = 0;
                loop {
                    while j < self.bytes.len() && is_ws(self.bytes[j]) {
                        j += 1;
                    }
                    if self.peek_at(j) == Some(b'\n') {
                        newlines += 1;
                        j += 1;
                    } else {
                        break;
                    }
                }
                if newlines == 0 {
                    value.push(' ');
                } else {
                    value.push_str(&"\n".repeat(newlines));
                }
                i = j;
                continue;
            }
            let ch = self.src[i..].chars().next().unwrap_or(' ');
            value.push(ch);
            i += ch.len_utf8().max(1);
        }
        if !closed {
            // Recover at the end of the opening line.
            let end = self.line_end(start);
            self.error(
                SyntaxErrorKind::Unterminated,
                "found unexpected end of stream while scanning a quoted scalar",
                self.char_span(start),
            );
            let text = self.src[start + 1..end].trim_end().to_string();
            self.pos = end;
            return self.push_scalar(text, style, Span::new(start, end), false);
        }
        self.pos = i;
        self.push_scalar(value, style, Span::new(start, i), false)
    }

    fn parse_alias(&mut self) -> NodeId {
        let start = self.pos;
        self.pos += 1;
        let name = self.scan_name();
        let target = self
            .anchors
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, id)| *id);
        if target.is_none() {
            self.error(
                SyntaxErrorKind::UndefinedAlias,
                format!("undefined alias {name}"),
                Span::new(start, start + 1),
            );
        }
        self.push(NodeKind::Alias { name, target }, Span::new(start, self.pos), false)
    }

    fn parse_block_scalar(&mut self, parent_indent: isize) -> NodeId {
        let start = self.pos;
        let folded = self.bytes[start] == b'>';
        self.pos += 1;
        let mut chomp = ' ';
        let mut explicit_indent: Option<usize> = None;
        while let Some(b) = self.peek() {
            match b {
                b'-' | b'+' => chomp = b as char,
                b'1'..=b'9' => explicit_indent = Some((b - b'0') as usize),
                _ => break,
            }
            self.pos += 1;
        }
        let header_end = self.pos;
        self.pos = self.line_end(self.pos);

        let base = parent_indent.max(0) as usize;
        let mut content_indent = explicit_indent.map(|i| base + i);
        let mut lines: Vec<&str> = Vec::new();
        let mut end = header_end;
        let mut cursor = self.pos;
        while cursor < self.bytes.len() {
            let line_start = cursor + 1;
            if line_start > self.bytes.len() {
                break;
            }
            let le = self.line_end(line_start);
            let line = self.src[line_start..le].trim_end_matches('\r');
            let indent = line.len() - line.trim_start_matches(' ').len();
            if line.trim().is_empty() {
                lines.push("");
                cursor = le;
                continue;
            }
            let required = match content_indent {
                Some(ci) => ci,
                None => {
                    if indent as isize <= parent_indent {
                        break;
                    }
                    content_indent = Some(indent);
                    indent
                }
            };
            if indent < required {
                break;
            }
            lines.push(&line[required..]);
            end = line_start + line.len();
            cursor = le;
        }
        // Trailing blank lines belong to the scalar only for keep chomping.
        let mut trailing = 0;
        while lines.last() == Some(&"") {
            lines.pop();
            trailing += 1;
        }
        let mut value = if folded {
            let mut out = String::new();
            for (i, line) in lines.iter().enumerate() {
                if i > 0 {
                    if line.is_empty() || lines[i - 1].is_empty() {
                        out.push('\n');
                    } else {
                        out.push(' ');
                    }
                }
                out.push_str(line);
            }
            out
        } else {
            lines.join("\n")
        };
        match chomp {
            '-' => {}
            '+' => value.push_str(&"\n".repeat(trailing + 1)),
            _ => {
                if !lines.is_empty() {
                    value.push('\n');
                }
            }
        }
        self.pos = end.max(header_end);
        let style = if folded {
            ScalarStyle::Folded
        } else {
            ScalarStyle::Literal
        };
        self.push_scalar(value, style, Span::new(start, end), false)
    }

    // ----- flow nodes -----

    fn skip_flow_ws(&mut self) {
        loop {
            match self.peek() {
                Some(b) if is_ws(b) || b == b'\n' => self.pos += 1,
                Some(b'#') => self.pos = self.line_end(self.pos),
                _ => break,
            }
        }
    }

    fn line_indent(&self, p: usize) -> usize {
        let start = self.line_start(p);
        self.bytes[start..]
            .iter()
            .take_while(|b| **b == b' ')
            .count()
    }

    /// An unclosed flow collection ends at the first later line that is not
    /// indented past the line it opened on.
    fn flow_interrupted(&self, open: usize) -> bool {
        if self.peek().is_none() {
            return false;
        }
        self.line_start(self.pos) != self.line_start(open)
            && self.col(self.pos) == self.line_indent(self.pos)
            && self.col(self.pos) <= self.line_indent(open)
    }

    fn parse_flow_node(&mut self) -> NodeId {
        self.skip_flow_ws();
        match self.peek() {
            Some(b'[') => self.parse_flow_sequence(),
            Some(b'{') => self.parse_flow_mapping(),
            Some(b'*') => self.parse_alias(),
            Some(b'"' | b'\'') => self.parse_quoted(),
            _ => self.parse_flow_plain(),
        }
    }

    fn parse_flow_plain(&mut self) -> NodeId {
        let start = self.pos;
        let mut i = start;
        while i < self.bytes.len() {
            let b = self.bytes[i];
            if is_flow_indicator(b) || b == b'\n' {
                break;
            }
            if b == b':'
                && self
                    .peek_at(i + 1)
                    .is_none_or(|n| is_ws(n) || n == b'\n' || is_flow_indicator(n))
            {
                break;
            }
            if b == b'#' && i > start && is_ws(self.bytes[i - 1]) {
                break;
            }
            i += 1;
        }
        let text = self.src[start..i].trim_end();
        self.pos = start + text.len();
        let span = Span::new(start, self.pos);
        self.push_scalar(text.to_string(), ScalarStyle::Plain, span, true)
    }

    fn parse_flow_sequence(&mut self) -> NodeId {
        let start = self.pos;
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_flow_ws();
            if self.flow_interrupted(start) {
                self.error(
                    SyntaxErrorKind::Unterminated,
                    "expected ',' or ']'",
                    Span::new(start, start + 1),
                );
                break;
            }
            match self.peek() {
                None => {
                    self.error(
                        SyntaxErrorKind::Unterminated,
                        "expected ',' or ']'",
                        Span::new(start, start + 1),
                    );
                    break;
                }
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(b',') => {
                    self.pos += 1;
                    continue;
                }
                Some(b'}') => {
                    let span = self.char_span(self.pos);
                    self.error(SyntaxErrorKind::Unterminated, "expected ',' or ']'", span);
                    break;
                }
                _ => {}
            }
            let before = self.pos;
            let value = self.parse_flow_node();
            items.push(SeqItem { dash: None, value });
            self.skip_flow_ws();
            if self.peek() == Some(b':') {
                // Single pair entries are kept as their key.
                self.pos += 1;
                let _ = self.parse_flow_node();
            }
            if self.pos == before {
                self.pos += self.char_span(before).len().max(1);
            }
        }
        self.push(NodeKind::Sequence(items), Span::new(start, self.pos), true)
    }

    fn parse_flow_mapping(&mut self) -> NodeId {
        let start = self.pos;
        self.pos += 1;
        let mut entries = Vec::new();
        loop {
            self.skip_flow_ws();
            if self.flow_interrupted(start) {
                self.error(
                    SyntaxErrorKind::Unterminated,
                    "expected ',' or '}'",
                    Span::new(start, start + 1),
                );
                break;
            }
            match self.peek() {
                None => {
                    self.error(
                        SyntaxErrorKind::Unterminated,
                        "expected ',' or '}'",
                        Span::new(start, start + 1),
                    );
                    break;
                }
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                Some(b',') => {
                    self.pos += 1;
                    continue;
                }
                Some(b']') => {
                    let span = self.char_span(self.pos);
                    self.error(SyntaxErrorKind::Unterminated, "expected ',' or '}'", span);
                    break;
                }
                _ => {}
            }
            let before = self.pos;
            let key = self.parse_flow_node();
            self.skip_flow_ws();
            let value = if self.peek() == Some(b':') {
                self.pos += 1;
                let after_colon = self.pos;
                self.skip_flow_ws();
                if matches!(self.peek(), Some(b',' | b'}') | None) {
                    self.push_scalar(String::new(), ScalarStyle::Plain, Span::empty(after_colon), true)
                } else {
                    self.parse_flow_node()
                }
            } else {
                let at = self.nodes[key.index()].span.end;
                self.push_scalar(String::new(), ScalarStyle::Plain, Span::empty(at), true)
            };
            entries.push(Entry { key, value });
            if self.pos == before {
                self.pos += self.char_span(before).len().max(1);
            }
        }
        self.push(NodeKind::Mapping(entries), Span::new(start, self.pos), true)
    }
}

/// Reports merge keys whose values cannot be merged.
fn check_merges(ast: &mut Ast) {
    let mut found = Vec::new();
    for node in &ast.nodes {
        let NodeKind::Mapping(entries) = &node.kind else {
            continue;
        };
        for entry in entries {
            if ast.key_text(entry.key) != MERGE_KEY {
                continue;
            }
            let value = ast.resolve(entry.value);
            match &ast.node(value).kind {
                NodeKind::Mapping(_) => {}
                NodeKind::Alias { .. } => {}
                NodeKind::Sequence(items) => {
                    for item in items {
                        let resolved = ast.resolve(item.value);
                        if matches!(ast.node(resolved).kind, NodeKind::Scalar { .. }) {
                            found.push(SyntaxError {
                                kind: SyntaxErrorKind::MalformedMerge,
                                message: "Expected a mapping for merging".to_string(),
                                span: ast.node(item.value).span,
                            });
                        }
                    }
                }
                NodeKind::Scalar { .. } => {
                    let span = ast.node(entry.value).span;
                    let span = if span.is_empty() {
                        ast.node(entry.key).span
                    } else {
                        span
                    };
                    found.push(SyntaxError {
                        kind: SyntaxErrorKind::MalformedMerge,
                        message: "Expected a mapping or list of mappings".to_string(),
                        span,
                    });
                }
            }
        }
    }
    ast.errors.extend(found);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(ast: &Ast) -> Vec<SyntaxErrorKind> {
        ast.errors().iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_parses_nested_blocks() {
        let ast = parse("resources:\n- name: foo\n  type: git\n  source:\n    uri: x\njobs: []\n");
        assert!(ast.errors().is_empty());
        let root = ast.root().unwrap();
        let resources = ast.get(root, "resources").unwrap();
        let items = ast.items(resources);
        assert_eq!(items.len(), 1);
        let resource = items[0].value;
        assert_eq!(ast.get_str(resource, "name"), Some("foo"));
        let source = ast.get(resource, "source").unwrap();
        assert_eq!(ast.get_str(source, "uri"), Some("x"));
        assert!(ast.is_sequence(ast.get(root, "jobs").unwrap()));
    }

    #[test]
    fn test_sequence_at_key_indent() {
        let ast = parse("plan:\n- get: a\n- put: b\nserial: true\n");
        assert!(ast.errors().is_empty());
        let root = ast.root().unwrap();
        assert_eq!(ast.items(ast.get(root, "plan").unwrap()).len(), 2);
        assert_eq!(ast.get_str(root, "serial"), Some("true"));
    }

    #[test]
    fn test_sequence_after_mapping_is_block_end_error() {
        let text = "somemap: val\n- sequence";
        let ast = parse(text);
        assert_eq!(kinds(&ast), vec![SyntaxErrorKind::ExpectedBlockEnd]);
        let span = ast.errors()[0].span;
        assert_eq!(ast.text(span), "-");
    }

    #[test]
    fn test_mapping_after_sequence_is_block_end_error() {
        let text = "- sequence\nzomemap: val";
        let ast = parse(text);
        assert_eq!(kinds(&ast), vec![SyntaxErrorKind::ExpectedBlockEnd]);
        assert_eq!(ast.text(ast.errors()[0].span), "z");
    }

    #[test]
    fn test_parsing_recovers_after_bad_line() {
        let ast = parse("a: 1\n- junk\nb: 2\n");
        let root = ast.root().unwrap();
        assert_eq!(ast.get_str(root, "b"), Some("2"));
    }

    #[test]
    fn test_empty_value_is_zero_width_after_colon() {
        let text = "display:\n  background_image: # <- bad\n";
        let ast = parse(text);
        let root = ast.root().unwrap();
        let display = ast.get(root, "display").unwrap();
        let image = ast.get(display, "background_image").unwrap();
        assert!(ast.is_null(image));
        let span = ast.node(image).span;
        assert!(span.is_empty());
        assert_eq!(span.start, text.find(": #").unwrap() + 1);
    }

    #[test]
    fn test_missing_colon_is_tolerated() {
        let ast = parse("- name: foo\n  sou\n  type: git\n");
        assert_eq!(kinds(&ast), vec![SyntaxErrorKind::MissingColon]);
        let root = ast.root().unwrap();
        let item = ast.items(root)[0].value;
        assert_eq!(ast.get_str(item, "type"), Some("git"));
    }

    #[test]
    fn test_flow_collections() {
        let ast = parse("passed: [a, b]\nparams: {acquire: true, x: }\n");
        assert!(ast.errors().is_empty());
        let root = ast.root().unwrap();
        let passed = ast.get(root, "passed").unwrap();
        let names: Vec<_> = ast
            .items(passed)
            .iter()
            .filter_map(|i| ast.scalar(i.value))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        let params = ast.get(root, "params").unwrap();
        assert_eq!(ast.get_str(params, "acquire"), Some("true"));
        assert!(ast.is_null(ast.get(params, "x").unwrap()));
    }

    #[test]
    fn test_quoted_and_block_scalars() {
        let ast = parse("a: \"x\\ty\"\nb: 'it''s'\nc: |\n  line1\n  line2\nd: >-\n  one\n  two\ne: 1\n");
        assert!(ast.errors().is_empty());
        let root = ast.root().unwrap();
        assert_eq!(ast.get_str(root, "a"), Some("x\ty"));
        assert_eq!(ast.get_str(root, "b"), Some("it's"));
        assert_eq!(ast.get_str(root, "c"), Some("line1\nline2\n"));
        assert_eq!(ast.get_str(root, "d"), Some("one two"));
        assert_eq!(ast.get_str(root, "e"), Some("1"));
    }

    #[test]
    fn test_undefined_alias_reported_at_star() {
        let text = "a:\n  <<: *TYPO\n";
        let ast = parse(text);
        assert_eq!(kinds(&ast), vec![SyntaxErrorKind::UndefinedAlias]);
        assert_eq!(ast.errors()[0].message, "undefined alias TYPO");
        assert_eq!(ast.text(ast.errors()[0].span), "*");
    }

    #[test]
    fn test_malformed_merges() {
        let ast = parse("a:\n  <<: scalar\n");
        assert_eq!(ast.errors()[0].message, "Expected a mapping or list of mappings");
        assert_eq!(ast.text(ast.errors()[0].span), "scalar");

        let ast = parse("a:\n  <<:\n  - scalar\n");
        assert_eq!(ast.errors()[0].message, "Expected a mapping for merging");
        assert_eq!(ast.text(ast.errors()[0].span), "scalar");
    }

    #[test]
    fn test_anchor_on_block_mapping() {
        let ast = parse("src: &repo\n  uri: x\nother:\n  <<: *repo\n");
        assert!(ast.errors().is_empty());
        let root = ast.root().unwrap();
        let src = ast.get(root, "src").unwrap();
        assert_eq!(ast.node(src).anchor.as_ref().unwrap().name, "repo");
        assert_eq!(ast.anchor("repo"), Some(src));
    }

    #[test]
    fn test_multiple_documents() {
        let ast = parse("---\na: 1\n---\nb: 2\n...\n");
        assert_eq!(ast.documents().len(), 2);
    }

    #[test]
    fn test_unterminated_quote_recovers_on_next_line() {
        let ast = parse("a: \"oops\nb: 2\n");
        assert_eq!(kinds(&ast), vec![SyntaxErrorKind::Unterminated]);
        let root = ast.root().unwrap();
        assert_eq!(ast.get_str(root, "b"), Some("2"));
    }

    #[test]
    fn test_plain_multiline_scalar_folds() {
        let ast = parse("a: one\n  two\nb: x\n");
        let root = ast.root().unwrap();
        assert_eq!(ast.get_str(root, "a"), Some("one two"));
    }
}
