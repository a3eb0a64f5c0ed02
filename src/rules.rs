use std::fmt;

/// A right-hand-side element of a rule as written in a grammar file
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
  /// A quoted word, only valid as the sole child of a lexical rule
  Terminal(String),
  Nonterminal(String),
}

impl Symbol {
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Terminal(_))
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Terminal(s) => write!(f, "\"{}\"", s),
      Self::Nonterminal(s) => write!(f, "{}", s),
    }
  }
}

/// A weighted rule before interning. `score` is a natural-log probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
  pub parent: String,
  pub children: Vec<Symbol>,
  pub score: f32,
}

impl Rule {
  pub fn new(parent: impl Into<String>, children: Vec<Symbol>, score: f32) -> Self {
    Self {
      parent: parent.into(),
      children,
      score,
    }
  }

  pub fn len(&self) -> usize {
    self.children.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn is_lexical(&self) -> bool {
    self.children.len() == 1 && self.children[0].is_terminal()
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ->", self.parent)?;
    for c in self.children.iter() {
      write!(f, " {}", c)?;
    }
    write!(f, " : {};", self.score)
  }
}

#[test]
fn test_rule_display() {
  let r = Rule::new(
    "S",
    vec![
      Symbol::Nonterminal("NP".to_string()),
      Symbol::Nonterminal("VP".to_string()),
    ],
    -0.5,
  );
  assert_eq!(r.to_string(), "S -> NP VP : -0.5;");
  assert!(!r.is_lexical());

  let w = Rule::new("DT", vec![Symbol::Terminal("The".to_string())], 0.0);
  assert_eq!(w.to_string(), "DT -> \"The\" : 0;");
  assert!(w.is_lexical());
}
