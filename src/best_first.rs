use tracing::trace;

use crate::agenda::{AdmissionMemo, Agenda};
use crate::chart::{Chart, ChartEdge, ScoreKey, Span};
use crate::fom::FigureOfMerit;
use crate::grammar::Grammar;
use crate::lookup::BinaryLookup;
use crate::parser::{ChartParser, ParseStats};

/// Best-first parsing with one agenda over the whole chart.
///
/// Every edge admitted to a cell is combined with its already-built
/// neighbours to the left and right, and the results go back onto the
/// agenda. The admission memo drops a candidate unless it beats every
/// candidate previously pushed for the same span and nonterminal, so the
/// agenda never holds a dominated duplicate.
///
/// Search stops when the agenda empties or after `max_pops` pops.
pub struct AgendaParser<'g> {
  lookup: Box<dyn BinaryLookup<'g> + 'g>,
  fom: Box<dyn FigureOfMerit + 'g>,
  max_pops: usize,
}

struct Search<'g> {
  agenda: Agenda<'g>,
  memo: AdmissionMemo,
  stats: ParseStats,
}

impl Search<'_> {
  fn new(size: usize, num_nonterminals: usize) -> Self {
    Self {
      agenda: Agenda::new(),
      memo: AdmissionMemo::new(size, num_nonterminals),
      stats: ParseStats::default(),
    }
  }
}

impl<'g> AgendaParser<'g> {
  pub fn new(lookup: Box<dyn BinaryLookup<'g> + 'g>, fom: Box<dyn FigureOfMerit + 'g>, max_pops: usize) -> Self {
    Self { lookup, fom, max_pops }
  }

  fn offer(&self, search: &mut Search<'g>, span: Span, edge: ChartEdge<'g>) {
    search.stats.considered += 1;
    let edge = edge.with_fom(self.fom.score(span, &edge));
    if search.memo.try_admit(span, edge.parent(), edge.fom) {
      search.agenda.push(span, edge);
    }
  }

  /// Pushes everything `edge` can build with what is already in the chart
  fn expand(&self, chart: &Chart<'g>, search: &mut Search<'g>, span: Span, edge: &ChartEdge<'g>) {
    let g = self.grammar();
    let size = chart.size();

    for p in g.unary_productions_with_child(edge.parent()) {
      if p.parent != g.start_symbol() {
        self.offer(search, span, ChartEdge::unary(p, edge, span));
      }
    }

    // edge as left child
    for end in span.end + 1..=size {
      let right_span = Span::new(span.end, end);
      let target = Span::new(span.start, end);
      for right in chart.cell_at(right_span).edges() {
        for p in self.lookup.with_children(edge.parent(), right.parent()) {
          self.offer(search, target, ChartEdge::binary(p, edge, right, span, right_span));
        }
      }
    }

    // edge as right child
    for start in 0..span.start {
      let left_span = Span::new(start, span.start);
      let target = Span::new(start, span.end);
      for left in chart.cell_at(left_span).edges() {
        for p in self.lookup.with_children(left.parent(), edge.parent()) {
          self.offer(search, target, ChartEdge::binary(p, left, edge, left_span, span));
        }
      }
    }
  }
}

impl<'g> ChartParser<'g> for AgendaParser<'g> {
  fn grammar(&self) -> &'g Grammar {
    self.lookup.grammar()
  }

  fn score_key(&self) -> ScoreKey {
    ScoreKey::Fom
  }

  fn figure_of_merit(&self, span: Span, edge: &ChartEdge<'g>) -> f32 {
    self.fom.score(span, edge)
  }

  fn fill_chart(&self, chart: &mut Chart<'g>) {
    let size = chart.size();
    let mut search = Search::new(size, self.grammar().num_nonterminals());

    // lexical cells are complete already; record them before any expansion
    // so nothing is pushed for their keys
    let mut lexical = Vec::new();
    for start in 0..size {
      let span = Span::new(start, start + 1);
      for edge in chart.cell_at(span).edges() {
        search.memo.try_admit(span, edge.parent(), edge.fom);
        lexical.push((span, *edge));
      }
    }
    for (span, edge) in lexical {
      self.expand(chart, &mut search, span, &edge);
    }

    let mut pops = 0;
    while let Some((span, edge)) = search.agenda.pop() {
      pops += 1;
      if pops > self.max_pops {
        trace!(pops, "pop budget exhausted");
        break;
      }
      if chart.cell_at_mut(span).add_edge(edge) {
        search.stats.added += 1;
        self.expand(chart, &mut search, span, &edge);
      }
    }

    search.stats.pushed += search.agenda.pushed();
    trace!(pops, pushed = search.agenda.pushed(), "agenda drained");
    chart.record(search.stats);
  }
}
