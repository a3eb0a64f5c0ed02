use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::Err;
use crate::rules::{Rule, Symbol};

/// Interned nonterminal id, dense from 0
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonTerminal(pub u32);

impl NonTerminal {
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

/// Interned word id. Words the grammar has never seen map to `Token::UNKNOWN`,
/// which has no lexical productions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
  pub const UNKNOWN: Token = Token(u32::MAX);

  pub fn is_unknown(self) -> bool {
    self == Self::UNKNOWN
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Children {
  Lexical(Token),
  Unary(NonTerminal),
  Binary(NonTerminal, NonTerminal),
}

/// An interned, weighted rule. Owned by the `Grammar`; chart edges only ever
/// hold references to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Production {
  pub parent: NonTerminal,
  pub children: Children,
  /// natural-log probability, always <= 0
  pub score: f32,
}

impl Production {
  pub fn is_lexical(&self) -> bool {
    matches!(self.children, Children::Lexical(_))
  }

  pub fn is_unary(&self) -> bool {
    matches!(self.children, Children::Unary(_))
  }

  pub fn is_binary(&self) -> bool {
    matches!(self.children, Children::Binary(_, _))
  }

  /// First nonterminal child, None for lexical productions
  pub fn left(&self) -> Option<NonTerminal> {
    match self.children {
      Children::Lexical(_) => None,
      Children::Unary(c) => Some(c),
      Children::Binary(l, _) => Some(l),
    }
  }

  pub fn right(&self) -> Option<NonTerminal> {
    match self.children {
      Children::Binary(_, r) => Some(r),
      _ => None,
    }
  }
}

/// Bidirectional string <-> dense id table
#[derive(Debug, Default, Clone)]
pub struct Vocabulary {
  ids: HashMap<String, u32>,
  names: Vec<String>,
}

impl Vocabulary {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn intern(&mut self, name: &str) -> u32 {
    if let Some(&id) = self.ids.get(name) {
      return id;
    }
    let id = self.names.len() as u32;
    self.names.push(name.to_string());
    self.ids.insert(name.to_string(), id);
    id
  }

  pub fn get(&self, name: &str) -> Option<u32> {
    self.ids.get(name).copied()
  }

  /// Assumes a valid id, panics otherwise
  pub fn name(&self, id: u32) -> &str {
    &self.names[id as usize]
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// A binarized weighted grammar, indexed for chart parsing.
///
/// Binary productions are kept sorted by `(left, right, parent)`, so every
/// child pair owns a contiguous run of `binary_productions()`. The lookup
/// adapters in `lookup` index into that run instead of copying productions.
#[derive(Debug)]
pub struct Grammar {
  nonterminals: Vocabulary,
  lexicon: Vocabulary,
  start: NonTerminal,
  lexical: Vec<Vec<Production>>,
  unary: Vec<Vec<Production>>,
  binary: Vec<Production>,
}

impl Grammar {
  /// Interns and indexes a rule list. The first rule's parent is the start symbol.
  pub fn new(rules: Vec<Rule>) -> Result<Self, Err> {
    if rules.is_empty() {
      return Err("empty ruleset".into());
    }

    let mut nonterminals = Vocabulary::new();
    let mut lexicon = Vocabulary::new();
    let start = NonTerminal(nonterminals.intern(&rules[0].parent));

    let mut lexical = Vec::new();
    let mut unary = Vec::new();
    let mut binary = Vec::new();

    for rule in rules.iter() {
      if rule.score.is_nan() || rule.score > 0.0 {
        return Err(format!("rule score must be a log-probability <= 0: {}", rule).into());
      }

      let parent = NonTerminal(nonterminals.intern(&rule.parent));
      let children = match rule.children.as_slice() {
        [Symbol::Terminal(w)] => Children::Lexical(Token(lexicon.intern(w))),
        [Symbol::Nonterminal(c)] => Children::Unary(NonTerminal(nonterminals.intern(c))),
        [Symbol::Nonterminal(l), Symbol::Nonterminal(r)] => Children::Binary(
          NonTerminal(nonterminals.intern(l)),
          NonTerminal(nonterminals.intern(r)),
        ),
        [] => return Err(format!("empty rule: {}", rule).into()),
        _ if rule.children.iter().any(Symbol::is_terminal) => {
          return Err(format!("words must be the only child of a rule: {}", rule).into());
        }
        _ => return Err(format!("rule is not binarized: {}", rule).into()),
      };

      let production = Production {
        parent,
        children,
        score: rule.score,
      };
      match children {
        Children::Lexical(_) => lexical.push(production),
        Children::Unary(_) => unary.push(production),
        Children::Binary(_, _) => binary.push(production),
      }
    }

    let mut lexical_by_token = vec![Vec::new(); lexicon.len()];
    for p in lexical {
      if let Children::Lexical(t) = p.children {
        lexical_by_token[t.0 as usize].push(p);
      }
    }

    let mut unary_by_child = vec![Vec::new(); nonterminals.len()];
    for p in unary {
      if let Children::Unary(c) = p.children {
        unary_by_child[c.index()].push(p);
      }
    }

    // stable, so duplicate child pairs keep file order among equal parents
    binary.sort_by_key(|p| (p.left(), p.right(), p.parent));

    Ok(Self {
      nonterminals,
      lexicon,
      start,
      lexical: lexical_by_token,
      unary: unary_by_child,
      binary,
    })
  }

  pub fn read_from_file<P: AsRef<Path>>(filename: P) -> Result<Self, Err> {
    let filename = filename.as_ref();
    fs::read_to_string(filename)
      .map_err(|e| -> Err { format!("reading {}: {}", filename.display(), e).into() })?
      .parse()
  }

  pub fn num_nonterminals(&self) -> usize {
    self.nonterminals.len()
  }

  pub fn start_symbol(&self) -> NonTerminal {
    self.start
  }

  pub fn nonterminal(&self, name: &str) -> Option<NonTerminal> {
    self.nonterminals.get(name).map(NonTerminal)
  }

  pub fn nonterminal_name(&self, nt: NonTerminal) -> &str {
    self.nonterminals.name(nt.0)
  }

  pub fn token(&self, word: &str) -> Token {
    self.lexicon.get(word).map(Token).unwrap_or(Token::UNKNOWN)
  }

  /// Maps words to tokens. An empty sentence is an input error.
  pub fn tokenize(&self, words: &[&str]) -> Result<Vec<Token>, Err> {
    if words.is_empty() {
      return Err("cannot parse an empty sentence".into());
    }
    if let Some(w) = words.iter().find(|w| w.is_empty() || w.contains(char::is_whitespace)) {
      return Err(format!("malformed token {:?}", w).into());
    }
    Ok(words.iter().map(|w| self.token(w)).collect())
  }

  pub fn lexical_productions(&self, token: Token) -> &[Production] {
    self
      .lexical
      .get(token.0 as usize)
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  pub fn unary_productions_with_child(&self, child: NonTerminal) -> &[Production] {
    &self.unary[child.index()]
  }

  pub fn binary_productions(&self) -> &[Production] {
    &self.binary
  }

  /// Binary productions `_ -> left right`, found by binary search over the
  /// sorted production list
  pub fn binary_productions_by_children(
    &self,
    left: NonTerminal,
    right: NonTerminal,
  ) -> &[Production] {
    let key = (Some(left), Some(right));
    let lo = self.binary.partition_point(|p| (p.left(), p.right()) < key);
    let hi = lo + self.binary[lo..].partition_point(|p| (p.left(), p.right()) == key);
    &self.binary[lo..hi]
  }

  /// Every production, back in textual form
  pub fn rules(&self) -> impl Iterator<Item = Rule> + '_ {
    let lexical = self.lexical.iter().flatten();
    let unary = self.unary.iter().flatten();
    lexical
      .chain(unary)
      .chain(self.binary.iter())
      .map(|p| self.to_rule(p))
  }

  fn to_rule(&self, p: &Production) -> Rule {
    let nt = |n: NonTerminal| Symbol::Nonterminal(self.nonterminal_name(n).to_string());
    let children = match p.children {
      Children::Lexical(t) => vec![Symbol::Terminal(self.lexicon.name(t.0).to_string())],
      Children::Unary(c) => vec![nt(c)],
      Children::Binary(l, r) => vec![nt(l), nt(r)],
    };
    Rule::new(self.nonterminal_name(p.parent), children, p.score)
  }
}

impl fmt::Display for Grammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "//** start: {}", self.nonterminal_name(self.start))?;
    writeln!(
      f,
      "//** {} nonterminals, {} words",
      self.nonterminals.len(),
      self.lexicon.len()
    )?;

    // the start symbol's rules first, so the output reads back with the same start
    let (start_rules, rest): (Vec<_>, Vec<_>) = self
      .rules()
      .partition(|r| r.parent == self.nonterminal_name(self.start));
    for rule in start_rules.iter().chain(rest.iter()) {
      writeln!(f, "{}", rule)?;
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SMALL: &str = r#"
    S -> NP VP : -0.1;
    VP -> V NP : -0.5;
    VP -> V : -1.2;
    NP -> "she";
    NP -> "fish" : -0.7;
    V -> "fish" : -0.7;
    NP -> N : -0.3;
    S -> NP V : -2.0;
  "#;

  #[test]
  fn test_indexing() {
    let g: Grammar = SMALL.parse().unwrap();
    let nt = |s: &str| g.nonterminal(s).unwrap();

    assert_eq!(g.start_symbol(), nt("S"));
    assert_eq!(g.num_nonterminals(), 5);
    assert_eq!(g.lexical_productions(g.token("fish")).len(), 2);
    assert!(g.lexical_productions(Token::UNKNOWN).is_empty());
    assert!(g.token("whale").is_unknown());
    assert_eq!(g.unary_productions_with_child(nt("V")).len(), 1);
    assert!(g.unary_productions_with_child(nt("S")).is_empty());

    let by_children = g.binary_productions_by_children(nt("NP"), nt("VP"));
    assert_eq!(by_children.len(), 1);
    assert_eq!(by_children[0].parent, nt("S"));
    assert!(g.binary_productions_by_children(nt("VP"), nt("NP")).is_empty());

    let sorted = g
      .binary_productions()
      .windows(2)
      .all(|w| (w[0].left(), w[0].right()) <= (w[1].left(), w[1].right()));
    assert!(sorted);
  }

  #[test]
  fn test_rejects_bad_rules() {
    assert!("".parse::<Grammar>().is_err());
    assert!("S -> A B C;".parse::<Grammar>().is_err());
    assert!(r#"S -> A "b";"#.parse::<Grammar>().is_err());
    assert!("S -> A : 0.5;".parse::<Grammar>().is_err());
    assert!("S -> ;".parse::<Grammar>().is_err());
  }

  #[test]
  fn test_tokenize() {
    let g: Grammar = SMALL.parse().unwrap();
    assert!(g.tokenize(&[]).is_err());
    assert!(g.tokenize(&["she", ""]).is_err());
    let toks = g.tokenize(&["she", "fish", "quickly"]).unwrap();
    assert_eq!(toks[0], g.token("she"));
    assert!(toks[2].is_unknown());
  }

  #[test]
  fn test_display_reads_back() {
    let g: Grammar = SMALL.parse().unwrap();
    let reread: Grammar = g.to_string().parse().unwrap();
    assert_eq!(reread.start_symbol(), reread.nonterminal("S").unwrap());
    assert_eq!(reread.binary_productions().len(), g.binary_productions().len());
    assert_eq!(reread.num_nonterminals(), g.num_nonterminals());
  }
}
