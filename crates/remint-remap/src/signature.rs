//! Generic signature remapping.
//!
//! Signatures (class, field and method) embed class names inside a grammar
//! that descriptors don't have: formal type parameters, type arguments,
//! wildcards and `.`-separated inner-class chains. This walker re-emits a
//! signature with every class reference mapped; on malformed input it logs
//! and returns the original, since a broken Signature attribute is worth
//! less than an aborted remap job.

pub fn remap_class_signature(sig: &str, map: &dyn Fn(&str) -> String) -> String {
    remap_with(sig, map, |p| {
        p.formal_type_params()?;
        // Superclass followed by superinterfaces.
        while !p.at_end() {
            p.class_type_signature()?;
        }
        Some(())
    })
}

pub fn remap_field_signature(sig: &str, map: &dyn Fn(&str) -> String) -> String {
    remap_with(sig, map, |p| p.reference_type())
}

pub fn remap_method_signature(sig: &str, map: &dyn Fn(&str) -> String) -> String {
    remap_with(sig, map, |p| {
        p.formal_type_params()?;
        p.expect('(')?;
        while p.peek() != Some(')') {
            p.type_signature()?;
        }
        p.expect(')')?;
        if p.peek() == Some('V') {
            p.copy_char()?;
        } else {
            p.type_signature()?;
        }
        while p.peek() == Some('^') {
            p.copy_char()?;
            if p.peek() == Some('T') {
                p.type_variable()?;
            } else {
                p.class_type_signature()?;
            }
        }
        Some(())
    })
}

fn remap_with(
    sig: &str,
    map: &dyn Fn(&str) -> String,
    run: impl FnOnce(&mut SigParser<'_>) -> Option<()>,
) -> String {
    let mut parser = SigParser {
        input: sig,
        pos: 0,
        out: String::with_capacity(sig.len()),
        map,
    };
    match run(&mut parser) {
        Some(()) if parser.at_end() => parser.out,
        _ => {
            tracing::debug!(
                target = "remint.remap",
                signature = sig,
                "signature did not parse; left unmapped"
            );
            sig.to_string()
        }
    }
}

struct SigParser<'a> {
    input: &'a str,
    pos: usize,
    out: String,
    map: &'a dyn Fn(&str) -> String,
}

impl SigParser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn copy_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.out.push(c);
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, wanted: char) -> Option<()> {
        if self.peek() == Some(wanted) {
            self.copy_char();
            Some(())
        } else {
            None
        }
    }

    /// Copies an identifier (anything up to a signature delimiter).
    fn identifier(&mut self) -> Option<&str> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, ';' | ':' | '<' | '>' | '.' | '/') {
                break;
            }
            self.pos += c.len_utf8();
        }
        if self.pos == start {
            return None;
        }
        let ident = &self.input[start..self.pos];
        self.out.push_str(ident);
        Some(ident)
    }

    fn formal_type_params(&mut self) -> Option<()> {
        if self.peek() != Some('<') {
            return Some(());
        }
        self.copy_char();
        while self.peek() != Some('>') {
            self.identifier()?;
            self.expect(':')?;
            // Class bound may be empty; interface bounds follow.
            if !matches!(self.peek(), Some(':') | Some('>')) {
                self.reference_type()?;
            }
            while self.peek() == Some(':') {
                self.copy_char();
                self.reference_type()?;
            }
        }
        self.copy_char();
        Some(())
    }

    fn type_signature(&mut self) -> Option<()> {
        match self.peek()? {
            'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' => {
                self.copy_char();
                Some(())
            }
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Option<()> {
        match self.peek()? {
            'L' => self.class_type_signature(),
            'T' => self.type_variable(),
            '[' => {
                self.copy_char();
                self.type_signature()
            }
            _ => None,
        }
    }

    fn type_variable(&mut self) -> Option<()> {
        self.expect('T')?;
        self.identifier()?;
        self.expect(';')
    }

    fn class_type_signature(&mut self) -> Option<()> {
        if self.peek() != Some('L') {
            return None;
        }
        self.pos += 1; // consumed; emitted by the segment writer below

        // Collect `/`-separated packages plus the first class segment.
        let name_start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '<' | ';' | '.') {
                break;
            }
            self.pos += c.len_utf8();
        }
        if self.pos == name_start {
            return None;
        }
        let mut full_name = self.input[name_start..self.pos].to_string();

        self.out.push('L');
        let mapped = (self.map)(&full_name);
        self.out.push_str(&mapped);
        let mut mapped_prefix = mapped;

        self.type_arguments()?;

        // Inner-class chain: map each extended `$`-joined name and emit the
        // suffix relative to the previously mapped prefix. If an obfuscator
        // flattened the nesting so no such suffix exists, keep the raw inner
        // segment.
        while self.peek() == Some('.') {
            self.pos += 1;
            let seg_start = self.pos;
            while let Some(c) = self.peek() {
                if matches!(c, '<' | ';' | '.') {
                    break;
                }
                self.pos += c.len_utf8();
            }
            if self.pos == seg_start {
                return None;
            }
            let segment = &self.input[seg_start..self.pos];
            full_name = format!("{full_name}${segment}");
            let mapped_full = (self.map)(&full_name);

            self.out.push('.');
            match mapped_full.strip_prefix(&format!("{mapped_prefix}$")) {
                Some(suffix) => self.out.push_str(suffix),
                None => self.out.push_str(segment),
            }
            mapped_prefix = mapped_full;

            self.type_arguments()?;
        }

        self.expect(';')
    }

    fn type_arguments(&mut self) -> Option<()> {
        if self.peek() != Some('<') {
            return Some(());
        }
        self.copy_char();
        while self.peek() != Some('>') {
            match self.peek()? {
                '*' => {
                    self.copy_char();
                }
                '+' | '-' => {
                    self.copy_char();
                    self.reference_type()?;
                }
                _ => self.reference_type()?,
            }
        }
        self.copy_char();
        Some(())
    }
}
