use std::fmt;

use crate::error::RegexSyntaxError;

/// The JavaScript flags a pattern was written with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RegexFlags {
    pub global: bool,
    pub ignore_case: bool,
    pub multiline: bool,
    pub dot_all: bool,
    pub unicode: bool,
    pub sticky: bool,
}

impl RegexFlags {
    /// Parse a flags string such as `"gi"`.
    ///
    /// Unknown and repeated flags are rejected.
    pub fn parse(flags: &str) -> Result<Self, RegexSyntaxError> {
        let mut parsed = RegexFlags::default();
        for (pos, ch) in flags.chars().enumerate() {
            let slot = match ch {
                'g' => &mut parsed.global,
                'i' => &mut parsed.ignore_case,
                'm' => &mut parsed.multiline,
                's' => &mut parsed.dot_all,
                'u' => &mut parsed.unicode,
                'y' => &mut parsed.sticky,
                _ => {
                    return Err(RegexSyntaxError::new(
                        "",
                        format!("unsupported regex flag: {ch}"),
                        pos,
                    ))
                }
            };
            if *slot {
                return Err(RegexSyntaxError::new(
                    "",
                    format!("repeated regex flag: {ch}"),
                    pos,
                ));
            }
            *slot = true;
        }
        Ok(parsed)
    }
}

impl fmt::Display for RegexFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (set, ch) in [
            (self.global, 'g'),
            (self.ignore_case, 'i'),
            (self.multiline, 'm'),
            (self.dot_all, 's'),
            (self.unicode, 'u'),
            (self.sticky, 'y'),
        ] {
            if set {
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}

/// Engine options carried by a source, as opposed to pattern flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RegexOptions {
    /// Skip the deterministic engine and always compile with the
    /// backtracking matcher.
    pub force_fallback: bool,
}

impl RegexOptions {
    /// Parse a comma separated `Key=value` list, e.g. `"ForceFallback=true"`.
    pub fn parse(options: &str) -> Result<Self, RegexSyntaxError> {
        let mut parsed = RegexOptions::default();
        if options.is_empty() {
            return Ok(parsed);
        }
        let mut pos = 0;
        for item in options.split(',') {
            let (key, value) = item.split_once('=').ok_or_else(|| {
                RegexSyntaxError::new("", format!("expected Key=value in options: {item}"), pos)
            })?;
            let value = match value {
                "true" => true,
                "false" => false,
                _ => {
                    return Err(RegexSyntaxError::new(
                        "",
                        format!("option {key} expects true or false, got {value}"),
                        pos + key.len() + 1,
                    ))
                }
            };
            match key {
                "ForceFallback" => parsed.force_fallback = value,
                _ => {
                    return Err(RegexSyntaxError::new(
                        "",
                        format!("unexpected option: {key}"),
                        pos,
                    ))
                }
            }
            pos += item.chars().count() + 1;
        }
        Ok(parsed)
    }
}

/// Immutable description of a compile request. Compared and hashed by value,
/// which makes it the key of the compiled-pattern cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegexSource {
    pattern: String,
    flags: RegexFlags,
    options: RegexOptions,
}

impl RegexSource {
    pub fn new(pattern: impl Into<String>, flags: RegexFlags) -> Self {
        Self::with_options(pattern, flags, RegexOptions::default())
    }

    pub fn with_options(pattern: impl Into<String>, flags: RegexFlags, options: RegexOptions) -> Self {
        Self {
            pattern: pattern.into(),
            flags,
            options,
        }
    }

    /// Build a source from a pattern and a flags string.
    pub fn from_parts(pattern: &str, flags: &str) -> Result<Self, RegexSyntaxError> {
        let flags = RegexFlags::parse(flags).map_err(|e| RegexSyntaxError { pattern: pattern.to_string(), ..e })?;
        Ok(Self::new(pattern, flags))
    }

    /// Parse the literal form `[options]/pattern/flags`.
    ///
    /// Example:
    /// - `/(a|(b))c/i` → pattern `(a|(b))c`, flags `i`
    /// - `ForceFallback=true/a+/` → pattern `a+`, fallback forced
    pub fn parse_literal(literal: &str) -> Result<Self, RegexSyntaxError> {
        let error = |message: &str, position: usize| RegexSyntaxError::new(literal, message, position);
        if literal.chars().count() < 2 {
            return Err(error("length must be at least 2 (//)", 0));
        }
        let first_slash = literal
            .find('/')
            .ok_or_else(|| error("pattern must start with a slash", 0))?;
        let last_slash = literal.rfind('/').unwrap_or(first_slash);
        if last_slash == first_slash {
            return Err(error("pattern must end with a slash", literal.len()));
        }
        let pattern = &literal[first_slash + 1..last_slash];
        let flags = RegexFlags::parse(&literal[last_slash + 1..]).map_err(|e| RegexSyntaxError {
            pattern: pattern.to_string(),
            ..e
        })?;
        let options = RegexOptions::parse(&literal[..first_slash]).map_err(|e| RegexSyntaxError {
            pattern: pattern.to_string(),
            ..e
        })?;
        Ok(Self::with_options(pattern, flags, options))
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn flags(&self) -> RegexFlags {
        self.flags
    }

    pub fn options(&self) -> RegexOptions {
        self.options
    }
}

impl fmt::Display for RegexSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.flags)
    }
}
