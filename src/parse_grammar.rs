use regex::Regex;
/// Simple recursive-descent parsing of weighted grammar files
use std::str::FromStr;

use crate::Err;
use crate::grammar::Grammar;
use crate::rules::{Rule, Symbol};

impl FromStr for Grammar {
  type Err = Err;

  /// Parses a grammar from a string. Assumes the first rule's parent
  /// is the start symbol.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (rules, s) = parse_rules(s)?;
    assert!(s.is_empty());

    Self::new(rules)
  }
}

type Infallible<'a, T> = (T, &'a str);
type ParseResult<'a, T> = Result<(T, &'a str), Err>;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

/// Try to consume a regex, returning None if it doesn't match
fn optional_re<'a>(re: &'static Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  if let Some(m) = re.find(s) {
    if m.start() > 0 {
      return (None, s);
    }
    let (_, rest) = s.split_at(m.end());
    (Some(m.as_str()), rest)
  } else {
    (None, s)
  }
}

/// Try to consume a regex, failing if it doesn't match
fn needed_re<'a>(re: &'static Regex, s: &'a str) -> ParseResult<'a, &'a str> {
  if let (Some(c), rest) = optional_re(re, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {}", re, excerpt(s)).into())
  }
}

/// Try to consume a char, returning None if it doesn't match
fn optional_char(c: char, s: &str) -> Infallible<'_, Option<char>> {
  match s.strip_prefix(c) {
    Some(rest) => (Some(c), rest),
    None => (None, s),
  }
}

/// The next line of input, for error messages
fn excerpt(s: &str) -> &str {
  s.lines().next().unwrap_or("<eof>")
}

/// Skips whitespace and // comments, possibly none
fn skip_whitespace(s: &str) -> &str {
  regex_static!(WHITESPACE_OR_COMMENT, r"(?:\s|//[^\n]*)+");
  optional_re(&WHITESPACE_OR_COMMENT, s).1
}

/// Tries to parse a symbol name: anything but whitespace, quotes, `;` and `:`
fn parse_name(s: &str) -> ParseResult<'_, &str> {
  regex_static!(NAME, r#"[^\s;:"]+"#);
  needed_re(&NAME, s).map_err(|err| format!("name: {}", err).into())
}

/// Parses a double-quoted word. Quotes are stripped.
fn parse_terminal(s: &str) -> ParseResult<'_, &str> {
  regex_static!(QUOTED, r#""[^"\n]*""#);
  let (quoted, s) = needed_re(&QUOTED, s).map_err(|e| -> Err { format!("word: {}", e).into() })?;
  let word = &quoted[1..quoted.len() - 1];
  if word.is_empty() {
    return Err(format!("empty word at {}", excerpt(s)).into());
  }
  Ok((word, s))
}

/// Parses a floating point log-probability
fn parse_weight(s: &str) -> ParseResult<'_, f32> {
  regex_static!(WEIGHT, r"[-+]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][-+]?[0-9]+)?");
  let (num, s) = needed_re(&WEIGHT, s).map_err(|e| -> Err { format!("weight: {}", e).into() })?;
  let weight = num
    .parse::<f32>()
    .map_err(|e| -> Err { format!("weight {}: {}", num, e).into() })?;
  Ok((weight, s))
}

fn parse_symbol(s: &str) -> ParseResult<'_, Symbol> {
  if s.starts_with('"') {
    let (word, s) = parse_terminal(s)?;
    Ok((Symbol::Terminal(word.to_string()), s))
  } else {
    let (name, s) = parse_name(s)?;
    Ok((Symbol::Nonterminal(name.to_string()), s))
  }
}

/// Parent, arrow, children, optional `: weight`, terminated by `;`
fn parse_rule(s: &str) -> ParseResult<'_, Rule> {
  #![allow(clippy::trivial_regex)]
  regex_static!(ARROW, "->");

  let (parent, s) = parse_name(s).map_err(|e| -> Err { format!("rule parent: {}", e).into() })?;
  let s = skip_whitespace(s);
  let (_, s) = needed_re(&ARROW, s).map_err(|e| -> Err { format!("rule arrow: {}", e).into() })?;

  let mut children = Vec::new();
  let mut score = 0.0;
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if let (Some(_), s) = optional_char(';', rem) {
      rem = s;
      break;
    }
    if let (Some(_), s) = optional_char(':', rem) {
      let (weight, s) = parse_weight(skip_whitespace(s))?;
      let s = skip_whitespace(s);
      let (semi, s) = optional_char(';', s);
      if semi.is_none() {
        return Err(format!("expected ; after weight at {}", excerpt(s)).into());
      }
      score = weight;
      rem = s;
      break;
    }
    if rem.is_empty() {
      return Err(format!("unterminated rule for {}", parent).into());
    }
    let (child, s) =
      parse_symbol(rem).map_err(|e| -> Err { format!("rule child: {}", e).into() })?;
    children.push(child);
    rem = s;
  }

  Ok((Rule::new(parent, children, score), rem))
}

pub fn parse_rules(s: &str) -> ParseResult<'_, Vec<Rule>> {
  let mut rules = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if rem.is_empty() {
      return Ok((rules, rem));
    }
    let (rule, s) = parse_rule(rem)?;
    rules.push(rule);
    rem = s;
  }
}
