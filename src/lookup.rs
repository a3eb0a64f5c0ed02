//! Binary-production lookup strategies.
//!
//! Every adapter answers the same question, "which binary productions can
//! combine these two cells", and every adapter answers it in the same order:
//! ascending `(left, right)` child pair, then grammar order within a pair.
//! Since cells only accept strict improvements, that shared order is what
//! makes the exhaustive strategies fill identical charts.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::Err;
use crate::chart::{ChartCell, ChartEdge};
use crate::grammar::{Grammar, NonTerminal, Production};

/// Receives `(production, left child edge, right child edge)`
pub type BinaryEmit<'e, 'g> = dyn FnMut(&'g Production, &ChartEdge<'g>, &ChartEdge<'g>) + 'e;

pub trait BinaryLookup<'g> {
  fn grammar(&self) -> &'g Grammar;

  /// Productions `_ -> left right`
  fn with_children(&self, left: NonTerminal, right: NonTerminal) -> &'g [Production];

  /// Calls `emit` for every binary production whose children both have a
  /// best edge in `left` and `right` respectively.
  ///
  /// The default walks the populated symbols of both cells, so its cost
  /// follows cell occupancy rather than grammar size.
  fn cross(&self, left: &ChartCell<'g>, right: &ChartCell<'g>, emit: &mut BinaryEmit<'_, 'g>) {
    if left.is_empty() || right.is_empty() {
      return;
    }
    for l in left.edges() {
      for r in right.edges() {
        for p in self.with_children(l.parent(), r.parent()) {
          emit(p, l, r);
        }
      }
    }
  }
}

/// Contiguous runs of `binary` sharing a child pair. Relies on the grammar's
/// `(left, right)` sort.
fn child_pair_runs(binary: &[Production]) -> Vec<(NonTerminal, NonTerminal, Range<usize>)> {
  let mut runs = Vec::new();
  let mut offset = 0;
  for run in binary.chunk_by(|a, b| (a.left(), a.right()) == (b.left(), b.right())) {
    let (l, r) = match (run[0].left(), run[0].right()) {
      (Some(l), Some(r)) => (l, r),
      _ => panic!("non-binary production in binary list"),
    };
    runs.push((l, r, offset..offset + run.len()));
    offset += run.len();
  }
  runs
}

/// Loops over every binary production in the grammar and probes the two
/// cells for its children. O(|grammar|) per midpoint.
pub struct GrammarLoop<'g> {
  grammar: &'g Grammar,
}

impl<'g> GrammarLoop<'g> {
  pub fn new(grammar: &'g Grammar) -> Self {
    Self { grammar }
  }
}

impl<'g> BinaryLookup<'g> for GrammarLoop<'g> {
  fn grammar(&self) -> &'g Grammar {
    self.grammar
  }

  fn with_children(&self, left: NonTerminal, right: NonTerminal) -> &'g [Production] {
    self.grammar.binary_productions_by_children(left, right)
  }

  fn cross(&self, left: &ChartCell<'g>, right: &ChartCell<'g>, emit: &mut BinaryEmit<'_, 'g>) {
    if left.is_empty() || right.is_empty() {
      return;
    }
    for p in self.grammar.binary_productions() {
      let (Some(l), Some(r)) = (p.left(), p.right()) else {
        continue;
      };
      if let (Some(le), Some(re)) = (left.best_edge(l), right.best_edge(r)) {
        emit(p, le, re);
      }
    }
  }
}

/// Child-pair lookups through a hash table of production runs
pub struct HashLookup<'g> {
  grammar: &'g Grammar,
  index: HashMap<(NonTerminal, NonTerminal), Range<usize>>,
}

impl<'g> HashLookup<'g> {
  pub fn new(grammar: &'g Grammar) -> Self {
    let index = child_pair_runs(grammar.binary_productions())
      .into_iter()
      .map(|(l, r, range)| ((l, r), range))
      .collect();
    Self { grammar, index }
  }
}

impl<'g> BinaryLookup<'g> for HashLookup<'g> {
  fn grammar(&self) -> &'g Grammar {
    self.grammar
  }

  fn with_children(&self, left: NonTerminal, right: NonTerminal) -> &'g [Production] {
    match self.index.get(&(left, right)) {
      Some(range) => &self.grammar.binary_productions()[range.clone()],
      None => &[],
    }
  }
}

/// Child-pair lookups through a dense `[left][right]` table of production
/// runs: constant time per pair, quadratic memory in the nonterminal count
pub struct MatrixLookup<'g> {
  grammar: &'g Grammar,
  matrix: Vec<Vec<(u32, u32)>>,
}

impl<'g> MatrixLookup<'g> {
  pub fn new(grammar: &'g Grammar) -> Self {
    let n = grammar.num_nonterminals();
    let mut matrix = vec![vec![(0u32, 0u32); n]; n];
    for (l, r, range) in child_pair_runs(grammar.binary_productions()) {
      matrix[l.index()][r.index()] = (range.start as u32, range.end as u32);
    }
    Self { grammar, matrix }
  }
}

impl<'g> BinaryLookup<'g> for MatrixLookup<'g> {
  fn grammar(&self) -> &'g Grammar {
    self.grammar
  }

  fn with_children(&self, left: NonTerminal, right: NonTerminal) -> &'g [Production] {
    let (lo, hi) = self.matrix[left.index()][right.index()];
    &self.grammar.binary_productions()[lo as usize..hi as usize]
  }
}

/// Which lookup adapter a parser intersects cells with
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum FillStrategy {
  GrammarLoop,
  #[default]
  Hash,
  Matrix,
}

impl FillStrategy {
  pub const ALL: [FillStrategy; 3] = [Self::GrammarLoop, Self::Hash, Self::Matrix];

  pub fn build<'g>(self, grammar: &'g Grammar) -> Box<dyn BinaryLookup<'g> + 'g> {
    match self {
      Self::GrammarLoop => Box::new(GrammarLoop::new(grammar)),
      Self::Hash => Box::new(HashLookup::new(grammar)),
      Self::Matrix => Box::new(MatrixLookup::new(grammar)),
    }
  }
}

impl FromStr for FillStrategy {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "grammar-loop" | "loop" => Ok(Self::GrammarLoop),
      "hash" => Ok(Self::Hash),
      "matrix" => Ok(Self::Matrix),
      _ => Err(format!("unknown fill strategy {:?} (expected grammar-loop, hash or matrix)", s).into()),
    }
  }
}

impl fmt::Display for FillStrategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::GrammarLoop => write!(f, "grammar-loop"),
      Self::Hash => write!(f, "hash"),
      Self::Matrix => write!(f, "matrix"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::chart::{ScoreKey, Span};

  const G: &str = r#"
    S -> A B : -0.1;
    S -> B A : -0.2;
    T -> A B : -0.3;
    A -> A A : -0.4;
    A -> "a";
    B -> "b";
  "#;

  fn cell_with<'g>(g: &'g Grammar, span: Span, words: &[&str]) -> ChartCell<'g> {
    let mut cell = ChartCell::new(span, g.num_nonterminals(), ScoreKey::Inside);
    for w in words {
      for p in g.lexical_productions(g.token(w)) {
        cell.add_edge(ChartEdge::lexical(p));
      }
    }
    cell
  }

  fn crossed<'g>(lookup: &dyn BinaryLookup<'g>, l: &ChartCell<'g>, r: &ChartCell<'g>) -> Vec<&'g Production> {
    let mut out = Vec::new();
    lookup.cross(l, r, &mut |p, _, _| out.push(p));
    out
  }

  #[test]
  fn test_with_children_agree() {
    let g: Grammar = G.parse().unwrap();
    let nts = (0..g.num_nonterminals() as u32).map(NonTerminal).collect::<Vec<_>>();
    let lookups = FillStrategy::ALL.map(|s| s.build(&g));

    for &l in nts.iter() {
      for &r in nts.iter() {
        let expected = g.binary_productions_by_children(l, r);
        for lookup in lookups.iter() {
          assert_eq!(lookup.with_children(l, r), expected);
        }
      }
    }
  }

  #[test]
  fn test_cross_order_agrees() {
    let g: Grammar = G.parse().unwrap();
    let left = cell_with(&g, Span::new(0, 1), &["a", "b"]);
    let right = cell_with(&g, Span::new(1, 2), &["a", "b"]);

    let lookups = FillStrategy::ALL.map(|s| s.build(&g));
    let reference = crossed(lookups[0].as_ref(), &left, &right);
    // A -> A A, S -> A B, T -> A B, S -> B A
    assert_eq!(reference.len(), 4);
    for lookup in lookups.iter() {
      assert_eq!(crossed(lookup.as_ref(), &left, &right), reference);
    }

    let empty = ChartCell::new(Span::new(1, 2), g.num_nonterminals(), ScoreKey::Inside);
    for lookup in lookups.iter() {
      assert!(crossed(lookup.as_ref(), &left, &empty).is_empty());
    }
  }

  #[test]
  fn test_fill_strategy_from_str() {
    for s in FillStrategy::ALL {
      assert_eq!(s.to_string().parse::<FillStrategy>().unwrap(), s);
    }
    assert!("bogus".parse::<FillStrategy>().is_err());
  }
}
