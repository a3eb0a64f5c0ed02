use std::fmt;

use crate::grammar::{Children, Grammar, NonTerminal, Production};
use crate::parser::ParseStats;
use crate::syntree::{Constituent, SynTree, Word};

/// A `start..end` interval over token positions, doubling as a cell reference
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
  pub start: usize,
  pub end: usize,
}

impl Span {
  pub fn new(start: usize, end: usize) -> Self {
    Self { start, end }
  }

  pub fn width(&self) -> usize {
    self.end - self.start
  }
}

impl fmt::Display for Span {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}", self.start, self.end)
  }
}

/// Which score decides whether an edge replaces the one stored for its nonterminal
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ScoreKey {
  #[default]
  Inside,
  Fom,
}

/// One step of a derivation: a production applied over a span, with the
/// child cells it was built from. Children are referenced by span and looked
/// up again on extraction, so edges are cheap to copy.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ChartEdge<'g> {
  pub production: &'g Production,
  /// Viterbi log-probability of the best derivation under this edge
  pub inside: f32,
  /// Ranking score for pruned search. Equal to `inside` unless a figure of merit set it.
  pub fom: f32,
  pub left: Option<Span>,
  pub right: Option<Span>,
}

impl<'g> ChartEdge<'g> {
  pub fn lexical(production: &'g Production) -> Self {
    assert!(production.is_lexical(), "lexical edge from non-lexical production");
    Self::from_parts(production, production.score, None, None)
  }

  /// A unary edge over `span`, whose child lives in the same cell
  pub fn unary(production: &'g Production, child: &ChartEdge<'g>, span: Span) -> Self {
    assert!(production.is_unary(), "unary edge from non-unary production");
    Self::from_parts(production, production.score + child.inside, Some(span), None)
  }

  pub fn binary(
    production: &'g Production,
    left: &ChartEdge<'g>,
    right: &ChartEdge<'g>,
    left_span: Span,
    right_span: Span,
  ) -> Self {
    assert!(production.is_binary(), "binary edge from non-binary production");
    assert_eq!(left_span.end, right_span.start, "binary children must be adjacent");
    Self::from_parts(
      production,
      production.score + left.inside + right.inside,
      Some(left_span),
      Some(right_span),
    )
  }

  fn from_parts(
    production: &'g Production,
    inside: f32,
    left: Option<Span>,
    right: Option<Span>,
  ) -> Self {
    Self {
      production,
      inside,
      fom: inside,
      left,
      right,
    }
  }

  pub fn with_fom(self, fom: f32) -> Self {
    Self { fom, ..self }
  }

  pub fn parent(&self) -> NonTerminal {
    self.production.parent
  }

  pub fn score(&self, key: ScoreKey) -> f32 {
    match key {
      ScoreKey::Inside => self.inside,
      ScoreKey::Fom => self.fom,
    }
  }
}

/// The Viterbi cell for one span: at most one edge per nonterminal, always
/// the best admitted so far under the cell's `ScoreKey`.
#[derive(Debug, Clone, Default)]
pub struct ChartCell<'g> {
  span: Span,
  key: ScoreKey,
  edges: Vec<Option<ChartEdge<'g>>>,
  populated: usize,
  considered: usize,
  added: usize,
}

impl<'g> ChartCell<'g> {
  pub fn new(span: Span, num_nonterminals: usize, key: ScoreKey) -> Self {
    Self {
      span,
      key,
      edges: vec![None; num_nonterminals],
      ..Default::default()
    }
  }

  pub fn span(&self) -> Span {
    self.span
  }

  pub fn key(&self) -> ScoreKey {
    self.key
  }

  pub fn best_edge(&self, nt: NonTerminal) -> Option<&ChartEdge<'g>> {
    self.edges.get(nt.index()).and_then(Option::as_ref)
  }

  /// Stored edges, in ascending nonterminal order
  pub fn edges(&self) -> impl Iterator<Item = &ChartEdge<'g>> {
    self.edges.iter().flatten()
  }

  /// Number of nonterminals with a stored edge
  pub fn len(&self) -> usize {
    self.populated
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// How many candidates have been offered to this cell
  pub fn considered(&self) -> usize {
    self.considered
  }

  /// How many offers replaced (or filled) a slot
  pub fn added(&self) -> usize {
    self.added
  }

  fn improves(&self, nt: NonTerminal, score: f32) -> bool {
    match &self.edges[nt.index()] {
      None => score > f32::NEG_INFINITY,
      Some(current) => score > current.score(self.key),
    }
  }

  fn store(&mut self, edge: ChartEdge<'g>) {
    let slot = &mut self.edges[edge.parent().index()];
    if slot.is_none() {
      self.populated += 1;
    }
    *slot = Some(edge);
    self.added += 1;
  }

  /// Stores `edge` if it strictly beats the edge currently held for its
  /// nonterminal. Returns whether the cell changed.
  pub fn add_edge(&mut self, edge: ChartEdge<'g>) -> bool {
    self.considered += 1;
    if self.improves(edge.parent(), edge.score(self.key)) {
      self.store(edge);
      true
    } else {
      false
    }
  }

  /// Same admission rule as `add_edge`, for callers that have not built an
  /// edge yet. The edge's FOM is its inside score; the edge is only
  /// constructed when it will be stored.
  pub fn add(
    &mut self,
    production: &'g Production,
    inside: f32,
    left: Option<Span>,
    right: Option<Span>,
  ) -> bool {
    self.considered += 1;
    if self.improves(production.parent, inside) {
      self.store(ChartEdge::from_parts(production, inside, left, right));
      true
    } else {
      false
    }
  }
}

/// Position of `start..end` in a row-major upper-triangular layout, where
/// row `start` holds the `size - start` cells beginning at `start`
pub(crate) fn cell_index(size: usize, start: usize, end: usize) -> usize {
  assert!(
    start < end && end <= size,
    "span {}..{} outside chart of size {}",
    start,
    end,
    size
  );
  let row_offset = start * size - start * start.saturating_sub(1) / 2;
  row_offset + (end - start - 1)
}

/// The triangular table of cells for one sentence of `size` tokens
#[derive(Debug)]
pub struct Chart<'g> {
  size: usize,
  key: ScoreKey,
  cells: Vec<ChartCell<'g>>,
  stats: ParseStats,
}

impl<'g> Chart<'g> {
  pub fn new(size: usize, num_nonterminals: usize, key: ScoreKey) -> Self {
    assert!(size > 0, "chart needs at least one token");

    let mut cells = Vec::with_capacity(size * (size + 1) / 2);
    for start in 0..size {
      for end in start + 1..=size {
        cells.push(ChartCell::new(Span::new(start, end), num_nonterminals, key));
      }
    }

    Self {
      size,
      key,
      cells,
      stats: ParseStats::default(),
    }
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn key(&self) -> ScoreKey {
    self.key
  }

  /// Panics if the span is outside the chart
  pub fn cell(&self, start: usize, end: usize) -> &ChartCell<'g> {
    &self.cells[cell_index(self.size, start, end)]
  }

  pub fn cell_mut(&mut self, start: usize, end: usize) -> &mut ChartCell<'g> {
    &mut self.cells[cell_index(self.size, start, end)]
  }

  pub fn cell_at(&self, span: Span) -> &ChartCell<'g> {
    self.cell(span.start, span.end)
  }

  pub fn cell_at_mut(&mut self, span: Span) -> &mut ChartCell<'g> {
    self.cell_mut(span.start, span.end)
  }

  /// Non-panicking version of `cell`
  pub fn get_cell(&self, start: usize, end: usize) -> Option<&ChartCell<'g>> {
    if start < end && end <= self.size {
      Some(self.cell(start, end))
    } else {
      None
    }
  }

  pub fn root_cell(&self) -> &ChartCell<'g> {
    self.cell(0, self.size)
  }

  pub fn cells(&self) -> impl Iterator<Item = &ChartCell<'g>> {
    self.cells.iter()
  }

  /// Moves a cell out of the chart so it can be filled while its children are
  /// read through `&self`. Until `check_in`, the chart holds an empty placeholder.
  pub(crate) fn check_out(&mut self, span: Span) -> ChartCell<'g> {
    std::mem::take(self.cell_at_mut(span))
  }

  pub(crate) fn check_in(&mut self, cell: ChartCell<'g>) {
    let span = cell.span();
    *self.cell_at_mut(span) = cell;
  }

  pub fn stats(&self) -> ParseStats {
    self.stats
  }

  pub(crate) fn record(&mut self, stats: ParseStats) {
    self.stats += stats;
  }

  /// The root edge for the grammar's start symbol, if the sentence parsed
  pub fn root_edge(&self, g: &Grammar) -> Option<&ChartEdge<'g>> {
    self.root_cell().best_edge(g.start_symbol())
  }

  /// Walks child references down from the root's start-symbol edge.
  /// `words` supplies the leaves and must be the sentence this chart was built for.
  pub fn extract_best_parse(&self, g: &Grammar, words: &[&str]) -> Option<SynTree<String, String>> {
    assert_eq!(words.len(), self.size, "sentence does not match chart");
    self.root_edge(g)?;
    Some(self.extract(g, words, Span::new(0, self.size), g.start_symbol()))
  }

  fn extract(&self, g: &Grammar, words: &[&str], span: Span, nt: NonTerminal) -> SynTree<String, String> {
    let edge = self
      .cell_at(span)
      .best_edge(nt)
      .unwrap_or_else(|| panic!("edge for {} missing from {}", g.nonterminal_name(nt), span));

    let children = match edge.production.children {
      Children::Lexical(_) => vec![SynTree::Leaf(Word {
        value: words[span.start].to_string(),
        span: (span.start, span.end),
      })],
      Children::Unary(child) => vec![self.extract(g, words, edge.left.expect("unary edge without child"), child)],
      Children::Binary(l, r) => vec![
        self.extract(g, words, edge.left.expect("binary edge without left child"), l),
        self.extract(g, words, edge.right.expect("binary edge without right child"), r),
      ],
    };

    SynTree::Branch(
      Constituent {
        value: g.nonterminal_name(nt).to_string(),
        span: (span.start, span.end),
      },
      children,
    )
  }

  /// Display the chart, naming symbols through `g`
  pub fn display<'a>(&'a self, g: &'a Grammar) -> ChartDisplay<'a, 'g> {
    ChartDisplay { chart: self, grammar: g }
  }
}

pub struct ChartDisplay<'a, 'g> {
  chart: &'a Chart<'g>,
  grammar: &'a Grammar,
}

impl fmt::Display for ChartDisplay<'_, '_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let g = self.grammar;
    for width in 1..=self.chart.size {
      for start in 0..=self.chart.size - width {
        let cell = self.chart.cell(start, start + width);
        if cell.is_empty() {
          continue;
        }
        writeln!(f, "Cell {}:", cell.span())?;
        for edge in cell.edges() {
          write!(f, "  {} ->", g.nonterminal_name(edge.parent()))?;
          match edge.production.children {
            Children::Lexical(_) => write!(f, " <word {}>", start)?,
            Children::Unary(c) => write!(f, " {}", g.nonterminal_name(c))?,
            Children::Binary(l, r) => write!(
              f,
              " {}[{}] {}[{}]",
              g.nonterminal_name(l),
              edge.left.unwrap_or_default(),
              g.nonterminal_name(r),
              edge.right.unwrap_or_default()
            )?,
          }
          writeln!(f, "  inside={:.4} fom={:.4}", edge.inside, edge.fom)?;
        }
      }
    }
    Ok(())
  }
}
