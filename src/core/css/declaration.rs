use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

impl Declaration {
    pub fn new(name: &str, value: &str, important: bool) -> Self {
        Self {
            name: name.trim().to_ascii_lowercase(),
            value: value.trim().to_string(),
            important,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let colon = raw.find(':')?;
        let name = raw[..colon].trim();
        if name.is_empty() {
            return None;
        }
        let mut value = raw[colon + 1..].trim();
        let mut important = false;
        if let Some(bang) = value.rfind('!') {
            if value[bang + 1..].trim().eq_ignore_ascii_case("important") {
                important = true;
                value = value[..bang].trim_end();
            }
        }
        if value.is_empty() {
            return None;
        }
        Some(Self::new(name, value, important))
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)?;
        if self.important {
            f.write_str(" !important")?;
        }
        f.write_str(";")
    }
}

/// The declaration block of an element's `style` attribute.
///
/// Unlike a CSSOM declaration block this keeps duplicate property names in
/// source order, so a declaration can be layered in front of a page-authored
/// one of the same property and later removed without disturbing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    declarations: Vec<Declaration>,
}

impl InlineStyle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `style` attribute. Semicolons inside quotes or parentheses
    /// (data URLs, `url(...)`) do not split declarations; malformed entries
    /// are dropped the way a browser drops them.
    pub fn parse(text: &str) -> Self {
        let mut declarations = Vec::new();
        let mut start = 0;
        let mut depth = 0u32;
        let mut quote: Option<char> = None;

        for (i, ch) in text.char_indices() {
            match (quote, ch) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"') | (None, '\'') => quote = Some(ch),
                (None, '(') => depth += 1,
                (None, ')') => depth = depth.saturating_sub(1),
                (None, ';') if depth == 0 => {
                    declarations.extend(Declaration::parse(&text[start..i]));
                    start = i + 1;
                }
                _ => {}
            }
        }
        declarations.extend(Declaration::parse(&text[start..]));

        Self { declarations }
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn prepend(&mut self, declaration: Declaration) {
        self.declarations.insert(0, declaration);
    }

    /// Removes every declaration matching `predicate`, returning how many went.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Declaration) -> bool,
    {
        let before = self.declarations.len();
        self.declarations.retain(|d| !predicate(d));
        before - self.declarations.len()
    }

    /// Value that wins the inline cascade for `name`: the last `!important`
    /// declaration if there is one, otherwise the last declaration.
    pub fn effective_value(&self, name: &str) -> Option<&str> {
        let mut winner: Option<&Declaration> = None;
        for decl in self.declarations.iter().filter(|d| d.name == name) {
            match winner {
                Some(current) if current.important && !decl.important => {}
                _ => winner = Some(decl),
            }
        }
        winner.map(|d| d.value.as_str())
    }

    pub fn css_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for InlineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, decl) in self.declarations.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{decl}")?;
        }
        Ok(())
    }
}
