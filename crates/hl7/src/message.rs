//! ER7 ("pipe and hat") segment encoding and parsing.
//!
//! This is deliberately small: it knows how to place a value at a positional address
//! (`SEG-field-component-subcomponent`, optionally a repetition), how to encode the result with
//! escaping, and how to read values back out of a received message. It has no knowledge of
//! message structures beyond the `MSH` header rules.

use crate::{Hl7Error, Hl7Result};

/// Segment terminator used when encoding.
pub const SEGMENT_TERMINATOR: char = '\r';

/// The delimiter set declared in `MSH-1` and `MSH-2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delimiters {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
    /// Truncation character, declared as a fifth encoding character from HL7 v2.7.
    pub truncation: Option<char>,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
            truncation: None,
        }
    }
}

impl Delimiters {
    /// The `MSH-2` encoding characters, e.g. `^~\&`.
    pub fn encoding_characters(&self) -> String {
        [self.component, self.repetition, self.escape, self.subcomponent]
            .into_iter()
            .chain(self.truncation)
            .collect()
    }

    fn escape(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for c in value.chars() {
            let code = if c == self.field {
                Some('F')
            } else if c == self.component {
                Some('S')
            } else if c == self.repetition {
                Some('R')
            } else if c == self.subcomponent {
                Some('T')
            } else if c == self.escape {
                Some('E')
            } else if Some(c) == self.truncation {
                Some('P')
            } else {
                None
            };
            match code {
                Some(code) => {
                    out.push(self.escape);
                    out.push(code);
                    out.push(self.escape);
                }
                None => out.push(c),
            }
        }
        out
    }

    fn unescape(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        let mut chars = value.chars();
        while let Some(c) = chars.next() {
            if c != self.escape {
                out.push(c);
                continue;
            }
            let mut sequence = String::new();
            let mut closed = false;
            for next in chars.by_ref() {
                if next == self.escape {
                    closed = true;
                    break;
                }
                sequence.push(next);
            }
            match (closed, sequence.as_str()) {
                (true, "F") => out.push(self.field),
                (true, "S") => out.push(self.component),
                (true, "R") => out.push(self.repetition),
                (true, "T") => out.push(self.subcomponent),
                (true, "E") => out.push(self.escape),
                (true, "P") if self.truncation.is_some() => out.extend(self.truncation),
                // Unknown or unterminated sequences are kept verbatim.
                (true, other) => {
                    out.push(self.escape);
                    out.push_str(other);
                    out.push(self.escape);
                }
                (false, other) => {
                    out.push(self.escape);
                    out.push_str(other);
                }
            }
        }
        out
    }
}

/// A positional address inside a segment.
///
/// `field`, `component` and `subcomponent` are 1-based as in HL7 notation (`PID-3-4-2`);
/// `repetition` is 0-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub field: usize,
    pub repetition: usize,
    pub component: usize,
    pub subcomponent: usize,
}

impl Position {
    pub const fn field(field: usize) -> Self {
        Self {
            field,
            repetition: 0,
            component: 1,
            subcomponent: 1,
        }
    }

    pub const fn component(field: usize, component: usize) -> Self {
        Self {
            field,
            repetition: 0,
            component,
            subcomponent: 1,
        }
    }

    pub const fn subcomponent(field: usize, component: usize, subcomponent: usize) -> Self {
        Self {
            field,
            repetition: 0,
            component,
            subcomponent,
        }
    }

    pub const fn with_repetition(mut self, repetition: usize) -> Self {
        self.repetition = repetition;
        self
    }

    fn validate(&self) -> Hl7Result<()> {
        if self.field == 0 || self.component == 0 || self.subcomponent == 0 {
            return Err(Hl7Error::Encoding(format!(
                "positions are 1-based, got {}-{}-{}",
                self.field, self.component, self.subcomponent
            )));
        }
        Ok(())
    }
}

type Component = Vec<String>;
type Repetition = Vec<Component>;
type Field = Vec<Repetition>;

/// A segment under construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentBuilder {
    name: String,
    fields: Vec<Field>,
}

impl SegmentBuilder {
    fn new(name: &str) -> Hl7Result<Self> {
        let valid = name.len() == 3
            && name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !valid {
            return Err(Hl7Error::Encoding(format!("invalid segment name '{name}'")));
        }
        Ok(Self {
            name: name.to_string(),
            fields: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_header(&self) -> bool {
        self.name == "MSH"
    }

    /// Place `value` at `position`, growing the segment as needed.
    pub fn set(&mut self, position: Position, value: &str) -> Hl7Result<&mut Self> {
        position.validate()?;
        if self.is_header() && position.field <= 2 {
            return Err(Hl7Error::Encoding(
                "MSH-1 and MSH-2 are fixed by the message delimiters".into(),
            ));
        }
        check_value(value)?;

        let field = grow(&mut self.fields, position.field);
        let repetition = grow(field, position.repetition + 1);
        let component = grow(repetition, position.component);
        let subcomponent = grow(component, position.subcomponent);
        *subcomponent = value.to_string();
        Ok(self)
    }

    /// Like [`SegmentBuilder::set`] but leaves the position untouched when `value` is `None`.
    pub fn set_opt(&mut self, position: Position, value: Option<&str>) -> Hl7Result<&mut Self> {
        match value {
            Some(value) => self.set(position, value),
            None => Ok(self),
        }
    }

    fn encode(&self, delimiters: &Delimiters) -> String {
        let mut out = self.name.clone();
        let skip = if self.is_header() {
            out.push(delimiters.field);
            out.push_str(&delimiters.encoding_characters());
            2
        } else {
            0
        };

        let mut fields: Vec<String> = self
            .fields
            .iter()
            .skip(skip)
            .map(|field| encode_field(field, delimiters))
            .collect();
        trim_trailing_empty(&mut fields);

        for field in fields {
            out.push(delimiters.field);
            out.push_str(&field);
        }
        out
    }
}

fn grow<T: Default>(items: &mut Vec<T>, one_based: usize) -> &mut T {
    if items.len() < one_based {
        items.resize_with(one_based, T::default);
    }
    &mut items[one_based - 1]
}

fn check_value(value: &str) -> Hl7Result<()> {
    if let Some(c) = value.chars().find(|c| matches!(c, '\r' | '\n')) {
        return Err(Hl7Error::Encoding(format!(
            "value contains a segment terminator ({:?})",
            c
        )));
    }
    if let Some(c) = value.chars().find(|c| u32::from(*c) > 0xFF) {
        return Err(Hl7Error::Encoding(format!(
            "character {c:?} cannot be represented in ISO-8859-1"
        )));
    }
    Ok(())
}

fn trim_trailing_empty(parts: &mut Vec<String>) {
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
}

fn join(parts: Vec<String>, separator: char) -> String {
    let mut parts = parts;
    trim_trailing_empty(&mut parts);
    parts.join(&separator.to_string())
}

fn encode_field(field: &Field, delimiters: &Delimiters) -> String {
    let repetitions = field
        .iter()
        .map(|repetition| {
            let components = repetition
                .iter()
                .map(|component| {
                    let subcomponents = component
                        .iter()
                        .map(|value| delimiters.escape(value))
                        .collect();
                    join(subcomponents, delimiters.subcomponent)
                })
                .collect();
            join(components, delimiters.component)
        })
        .collect();
    join(repetitions, delimiters.repetition)
}

/// Builds an ER7 message segment by segment.
#[derive(Clone, Debug)]
pub struct MessageBuilder {
    delimiters: Delimiters,
    segments: Vec<SegmentBuilder>,
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBuilder {
    /// Starts a message with the standard `|^~\&` delimiters and an empty `MSH` segment.
    pub fn new() -> Self {
        Self {
            delimiters: Delimiters::default(),
            segments: vec![SegmentBuilder {
                name: "MSH".into(),
                fields: Vec::new(),
            }],
        }
    }

    /// The `MSH` segment.
    pub fn header(&mut self) -> &mut SegmentBuilder {
        &mut self.segments[0]
    }

    /// Appends a new segment and returns it for population.
    pub fn segment(&mut self, name: &str) -> Hl7Result<&mut SegmentBuilder> {
        if name == "MSH" {
            return Err(Hl7Error::Encoding("a message has exactly one MSH".into()));
        }
        self.segments.push(SegmentBuilder::new(name)?);
        let last = self.segments.len() - 1;
        Ok(&mut self.segments[last])
    }

    /// Encodes the message, terminating every segment with `\r`.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push_str(&segment.encode(&self.delimiters));
            out.push(SEGMENT_TERMINATOR);
        }
        out
    }
}

/// A received message split into segments and fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    delimiters: Delimiters,
    segments: Vec<ParsedSegment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ParsedSegment {
    name: String,
    /// `fields[0]` is field 1.
    fields: Vec<String>,
}

impl Message {
    /// Parses an ER7 message.
    ///
    /// Segments may be terminated by `\r`, `\n` or `\r\n`. The first segment must be `MSH` and
    /// must declare its delimiters.
    pub fn parse(raw: &str) -> Hl7Result<Self> {
        let mut lines = raw
            .split(['\r', '\n'])
            .map(str::trim_end)
            .filter(|line| !line.is_empty());

        let header = lines
            .next()
            .ok_or_else(|| Hl7Error::Parse("message is empty".into()))?;
        if !header.starts_with("MSH") {
            return Err(Hl7Error::Parse(format!(
                "message must start with MSH, found '{}'",
                header.chars().take(3).collect::<String>()
            )));
        }

        // MSH-1 is one character; MSH-2 runs up to the next field separator and holds four
        // encoding characters, or five when a truncation character is declared.
        let mut after_name = header.chars().skip(3);
        let field = after_name.next().ok_or_else(|| {
            Hl7Error::Parse("MSH segment is too short to declare delimiters".into())
        })?;
        let encoding: Vec<char> = after_name.take_while(|c| *c != field).collect();
        if !(4..=5).contains(&encoding.len()) {
            return Err(Hl7Error::Parse(format!(
                "MSH-2 must declare 4 or 5 encoding characters, found {}",
                encoding.len()
            )));
        }
        let delimiters = Delimiters {
            field,
            component: encoding[0],
            repetition: encoding[1],
            escape: encoding[2],
            subcomponent: encoding[3],
            truncation: encoding.get(4).copied(),
        };

        let declared: Vec<char> = std::iter::once(field).chain(encoding).collect();
        let distinct = declared
            .iter()
            .enumerate()
            .all(|(i, c)| !declared[..i].contains(c) && !c.is_alphanumeric());
        if !distinct {
            return Err(Hl7Error::Parse(format!(
                "MSH declares invalid delimiters '{}'",
                declared.iter().collect::<String>()
            )));
        }

        let mut segments = vec![parse_header(header, &delimiters)?];
        for line in lines {
            segments.push(parse_segment(line, &delimiters)?);
        }

        Ok(Self {
            delimiters,
            segments,
        })
    }

    /// Names of all segments, in order.
    pub fn segment_names(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.name.as_str()).collect()
    }

    /// Reads the value at `position` in the first segment named `segment`.
    ///
    /// Returns `None` when the segment or position is absent or empty. Values are unescaped.
    pub fn get(&self, segment: &str, position: Position) -> Option<String> {
        let segment = self.segments.iter().find(|s| s.name == segment)?;
        let raw = segment.fields.get(position.field.checked_sub(1)?)?;

        if segment.name == "MSH" && position.field <= 2 {
            return Some(raw.clone());
        }

        let d = &self.delimiters;
        let value = raw
            .split(d.repetition)
            .nth(position.repetition)?
            .split(d.component)
            .nth(position.component.checked_sub(1)?)?
            .split(d.subcomponent)
            .nth(position.subcomponent.checked_sub(1)?)?;

        if value.is_empty() {
            None
        } else {
            Some(d.unescape(value))
        }
    }

    /// Reads a whole field of the first segment named `segment`, still encoded.
    pub fn raw_field(&self, segment: &str, field: usize) -> Option<&str> {
        let segment = self.segments.iter().find(|s| s.name == segment)?;
        segment
            .fields
            .get(field.checked_sub(1)?)
            .map(String::as_str)
            .filter(|f| !f.is_empty())
    }

    /// Number of repetitions in a field of the first segment named `segment`.
    pub fn repetition_count(&self, segment: &str, field: usize) -> usize {
        self.raw_field(segment, field)
            .map(|raw| raw.split(self.delimiters.repetition).count())
            .unwrap_or(0)
    }
}

fn parse_header(line: &str, delimiters: &Delimiters) -> Hl7Result<ParsedSegment> {
    // "MSH" + field separator + encoding characters, then ordinary fields from MSH-3.
    let encoding = delimiters.encoding_characters();
    let rest: String = line.chars().skip(4 + encoding.chars().count()).collect();
    let mut fields = vec![delimiters.field.to_string(), encoding];
    if let Some(stripped) = rest.strip_prefix(delimiters.field) {
        fields.extend(stripped.split(delimiters.field).map(str::to_string));
    } else if !rest.is_empty() {
        return Err(Hl7Error::Parse(
            "MSH encoding characters must be followed by the field separator".into(),
        ));
    }
    Ok(ParsedSegment {
        name: "MSH".into(),
        fields,
    })
}

fn parse_segment(line: &str, delimiters: &Delimiters) -> Hl7Result<ParsedSegment> {
    let mut parts = line.split(delimiters.field);
    let name = parts.next().unwrap_or_default();
    let valid = name.len() == 3
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if !valid {
        return Err(Hl7Error::Parse(format!("invalid segment name '{name}'")));
    }
    Ok(ParsedSegment {
        name: name.to_string(),
        fields: parts.map(str::to_string).collect(),
    })
}
