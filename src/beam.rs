//! Per-cell beam search.
//!
//! Each multi-word cell is filled in one agenda episode:
//!
//! 1. every binary candidate over every midpoint is scored by the figure of
//!    merit, keeping only the best candidate per nonterminal;
//! 2. those within `delta` of the cell's best FOM seed a max-agenda;
//! 3. edges are popped into the cell until `beam_width` have been admitted,
//!    and each admitted edge pushes its unary parents back onto the agenda,
//!    so unary and binary edges compete for the same slots.
//!
//! With an unbounded beam and `InsideFom` this finds the exhaustive optimum
//! on grammars whose unaries are already closed.

use tracing::{trace, warn};

use crate::agenda::Agenda;
use crate::chart::{Chart, ChartCell, ChartEdge, ScoreKey, Span};
use crate::fom::FigureOfMerit;
use crate::grammar::Grammar;
use crate::lookup::BinaryLookup;
use crate::parser::{ChartParser, ParseStats};
use crate::traversal::{CellSelector, is_span_monotone};
use crate::utils::LOG_ZERO;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BeamParams {
  /// Most edges admitted into one cell
  pub beam_width: usize,
  /// Candidates more than this far below the cell's best FOM are dropped
  pub delta: f32,
}

impl BeamParams {
  pub fn new(beam_width: usize, delta: f32) -> Self {
    Self { beam_width, delta }
  }

  /// No pruning at all
  pub fn unbounded() -> Self {
    Self::new(usize::MAX, f32::INFINITY)
  }
}

impl Default for BeamParams {
  fn default() -> Self {
    Self::new(30, 15.0)
  }
}

/// How popped edges are admitted into the cell
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Threshold {
  /// Cells keep the best FOM per nonterminal
  #[default]
  Plain,
  /// Seeding stops at the `beam_width`-th best candidate, whose FOM becomes a
  /// bar unary candidates must also clear; cells keep the best inside score
  /// per nonterminal
  Weak,
}

pub struct BeamParser<'g> {
  lookup: Box<dyn BinaryLookup<'g> + 'g>,
  fom: Box<dyn FigureOfMerit + 'g>,
  selector: Box<dyn CellSelector + 'g>,
  params: BeamParams,
  threshold: Threshold,
}

/// Running state of one cell's agenda episode
struct Episode<'g> {
  agenda: Agenda<'g>,
  /// best FOM - delta
  relative: f32,
  /// FOM of the beam_width-th seed, LOG_ZERO until that many are seeded
  weak: f32,
}

impl<'g> BeamParser<'g> {
  pub fn new(
    lookup: Box<dyn BinaryLookup<'g> + 'g>,
    fom: Box<dyn FigureOfMerit + 'g>,
    selector: Box<dyn CellSelector + 'g>,
    params: BeamParams,
    threshold: Threshold,
  ) -> Self {
    Self {
      lookup,
      fom,
      selector,
      params,
      threshold,
    }
  }

  /// Keeps the best-FOM candidate per nonterminal and tracks the best overall
  fn add_edge_to_collection(best: &mut [Option<ChartEdge<'g>>], best_fom: &mut f32, edge: ChartEdge<'g>) {
    let slot = &mut best[edge.parent().index()];
    if slot.is_none_or(|current| edge.fom > current.fom) {
      *slot = Some(edge);
    }
    if edge.fom > *best_fom {
      *best_fom = edge.fom;
    }
  }

  /// Scores every binary combination for `span` and reduces them to one
  /// candidate per nonterminal. Returns the candidates and the best FOM.
  fn collect(&self, chart: &Chart<'g>, span: Span, stats: &mut ParseStats) -> (Vec<Option<ChartEdge<'g>>>, f32) {
    let mut best = vec![None; self.grammar().num_nonterminals()];
    let mut best_fom = LOG_ZERO;

    for mid in span.start + 1..span.end {
      let (left_span, right_span) = (Span::new(span.start, mid), Span::new(mid, span.end));
      let (left, right) = (chart.cell_at(left_span), chart.cell_at(right_span));
      self.lookup.cross(left, right, &mut |p, l, r| {
        stats.considered += 1;
        let edge = ChartEdge::binary(p, l, r, left_span, right_span);
        let edge = edge.with_fom(self.fom.score(span, &edge));
        Self::add_edge_to_collection(&mut best, &mut best_fom, edge);
      });
    }

    (best, best_fom)
  }

  fn seed(&self, best: Vec<Option<ChartEdge<'g>>>, best_fom: f32, span: Span) -> Episode<'g> {
    let mut episode = Episode {
      agenda: Agenda::new(),
      relative: best_fom - self.params.delta,
      weak: LOG_ZERO,
    };

    let mut seeds = best
      .into_iter()
      .flatten()
      .filter(|e| e.fom > episode.relative)
      .collect::<Vec<_>>();

    match self.threshold {
      Threshold::Plain => {
        for edge in seeds {
          episode.agenda.push(span, edge);
        }
      }
      Threshold::Weak => {
        // stable, so equal FOMs keep nonterminal order
        seeds.sort_by(|a, b| b.fom.total_cmp(&a.fom));
        for edge in seeds {
          if episode.agenda.pushed() >= self.params.beam_width && edge.fom <= episode.weak {
            break;
          }
          episode.agenda.push(span, edge);
          if episode.agenda.pushed() == self.params.beam_width {
            episode.weak = edge.fom;
          }
        }
      }
    }

    episode
  }

  /// Pushes the unary parents of a freshly admitted edge that clear the beam
  fn push_unaries(&self, episode: &mut Episode<'g>, span: Span, child: &ChartEdge<'g>, stats: &mut ParseStats) {
    let g = self.grammar();
    for p in g.unary_productions_with_child(child.parent()) {
      if p.parent == g.start_symbol() {
        continue;
      }
      let edge = ChartEdge::unary(p, child, span);
      let edge = edge.with_fom(self.fom.score(span, &edge));
      stats.considered += 1;

      let clears_weak = self.threshold == Threshold::Plain || edge.fom > episode.weak;
      if edge.fom > episode.relative && clears_weak {
        episode.agenda.push(span, edge);
      }
    }
  }

  fn fill_cell(&self, chart: &Chart<'g>, cell: &mut ChartCell<'g>, stats: &mut ParseStats) {
    let span = cell.span();
    let (best, best_fom) = self.collect(chart, span, stats);
    let mut episode = self.seed(best, best_fom, span);

    let mut admitted = 0;
    while admitted < self.params.beam_width {
      let Some((_, edge)) = episode.agenda.pop() else {
        break;
      };
      if edge.fom < episode.relative {
        break;
      }
      if cell.add_edge(edge) {
        admitted += 1;
        stats.added += 1;
        self.push_unaries(&mut episode, span, &edge, stats);
      }
    }

    stats.pushed += episode.agenda.pushed();
    trace!(
      span = %span,
      best_fom,
      pushed = episode.agenda.pushed(),
      admitted,
      "filled cell"
    );
  }
}

impl<'g> ChartParser<'g> for BeamParser<'g> {
  fn grammar(&self) -> &'g Grammar {
    self.lookup.grammar()
  }

  fn score_key(&self) -> ScoreKey {
    match self.threshold {
      Threshold::Plain => ScoreKey::Fom,
      Threshold::Weak => ScoreKey::Inside,
    }
  }

  fn figure_of_merit(&self, span: Span, edge: &ChartEdge<'g>) -> f32 {
    self.fom.score(span, edge)
  }

  fn fill_chart(&self, chart: &mut Chart<'g>) {
    let cells = self.selector.cells(chart.size());
    if !is_span_monotone(&cells) {
      warn!("cell order narrows between visits; wider cells may be filled from incomplete children");
    }

    let mut stats = ParseStats::default();
    for span in cells {
      let mut cell = chart.check_out(span);
      self.fill_cell(chart, &mut cell, &mut stats);
      chart.check_in(cell);
    }
    chart.record(stats);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::exhaustive::ExhaustiveParser;
  use crate::fom::{InsideFom, PriorFom};
  use crate::lookup::FillStrategy;
  use crate::traversal::SpanOrder;

  // closed under unary transitivity: X -> Z is present wherever X -> Y -> Z is
  const GRAMMAR: &str = r#"
    TOP -> S : 0;
    S -> NP VP : -0.2;
    S -> S PP : -1.8;
    VP -> V NP : -0.7;
    VP -> VP PP : -1.1;
    VP -> V : -1.6;
    NP -> NP PP : -1.3;
    NP -> D N : -0.4;
    NP -> N : -1.9;
    NP -> "I" : -0.6;
    PP -> P NP : 0;
    N -> "man" : -1.2;
    N -> "telescope" : -1.4;
    N -> "saw" : -3.0;
    V -> "saw" : -0.3;
    D -> "the" : -0.1;
    D -> "a" : -0.5;
    P -> "with" : 0;
  "#;

  const SENTENCE: [&str; 7] = ["I", "saw", "the", "man", "with", "a", "telescope"];

  fn beam<'g>(g: &'g Grammar, params: BeamParams, threshold: Threshold) -> BeamParser<'g> {
    BeamParser::new(
      FillStrategy::Hash.build(g),
      Box::new(InsideFom),
      Box::new(SpanOrder),
      params,
      threshold,
    )
  }

  fn exhaustive_score(g: &Grammar) -> f32 {
    ExhaustiveParser::new(FillStrategy::Hash.build(g), Box::new(SpanOrder))
      .parse(&SENTENCE)
      .unwrap()
      .score
      .unwrap()
  }

  #[test]
  fn test_unbounded_beam_is_exhaustive() {
    let g: Grammar = GRAMMAR.parse().unwrap();
    let expected = ExhaustiveParser::new(FillStrategy::Hash.build(&g), Box::new(SpanOrder))
      .parse(&SENTENCE)
      .unwrap();

    for threshold in [Threshold::Plain, Threshold::Weak] {
      let parse = beam(&g, BeamParams::unbounded(), threshold).parse(&SENTENCE).unwrap();
      assert_eq!(parse.score, expected.score, "{:?}", threshold);
      assert_eq!(parse.tree, expected.tree, "{:?}", threshold);
      assert!(parse.stats.pushed > 0);
    }
  }

  #[test]
  fn test_narrow_beam_never_beats_exhaustive() {
    let g: Grammar = GRAMMAR.parse().unwrap();
    let best = exhaustive_score(&g);

    for width in 1..6 {
      for delta in [0.5, 2.0, f32::INFINITY] {
        for threshold in [Threshold::Plain, Threshold::Weak] {
          let parse = beam(&g, BeamParams::new(width, delta), threshold)
            .parse(&SENTENCE)
            .unwrap();
          if let Some(score) = parse.score {
            assert!(score <= best, "width {} delta {} {:?}", width, delta, threshold);
          }
        }
      }
    }
  }

  #[test]
  fn test_beam_width_bounds_cells() {
    let g: Grammar = GRAMMAR.parse().unwrap();
    for threshold in [Threshold::Plain, Threshold::Weak] {
      let parser = beam(&g, BeamParams::new(2, f32::INFINITY), threshold);
      let chart = parser.parse_chart(&SENTENCE).unwrap();
      for cell in chart.cells().filter(|c| c.span().width() > 1 && c.span().width() < SENTENCE.len()) {
        assert!(cell.len() <= 2, "{} has {} edges", cell.span(), cell.len());
      }
    }
  }

  #[test]
  fn test_delta_prunes_distant_candidates() {
    let g: Grammar = r#"
      TOP -> X : 0;
      X -> A B : -0.1;
      Y -> A B : -3.0;
      A -> "a";
      B -> "b";
    "#
    .parse()
    .unwrap();
    let nt = |s: &str| g.nonterminal(s).unwrap();

    for threshold in [Threshold::Plain, Threshold::Weak] {
      let tight = beam(&g, BeamParams::new(10, 1.0), threshold)
        .parse_chart(&["a", "b"])
        .unwrap();
      assert!(tight.root_cell().best_edge(nt("X")).is_some());
      assert!(tight.root_cell().best_edge(nt("Y")).is_none());

      let loose = beam(&g, BeamParams::new(10, 5.0), threshold)
        .parse_chart(&["a", "b"])
        .unwrap();
      assert!(loose.root_cell().best_edge(nt("Y")).is_some());
    }
  }

  #[test]
  fn test_weak_threshold_seeds_top_k() {
    let g: Grammar = GRAMMAR.parse().unwrap();
    let parser = beam(&g, BeamParams::new(1, f32::INFINITY), Threshold::Weak);

    let mut best = vec![None; g.num_nonterminals()];
    let mut best_fom = LOG_ZERO;
    let np = &g.binary_productions_by_children(g.nonterminal("D").unwrap(), g.nonterminal("N").unwrap())[0];
    let d = ChartEdge::lexical(&g.lexical_productions(g.token("the"))[0]);
    let n = ChartEdge::lexical(&g.lexical_productions(g.token("man"))[0]);
    let (l, r) = (Span::new(0, 1), Span::new(1, 2));
    BeamParser::add_edge_to_collection(&mut best, &mut best_fom, ChartEdge::binary(np, &d, &n, l, r));
    // a worse duplicate for the same nonterminal is not kept
    let worse = ChartEdge::binary(np, &d, &n, l, r).with_fom(-50.0);
    BeamParser::add_edge_to_collection(&mut best, &mut best_fom, worse);
    assert_eq!(best.iter().flatten().count(), 1);
    assert!((best_fom - -1.7).abs() < 1e-6);

    let episode = parser.seed(best, best_fom, Span::new(0, 2));
    assert_eq!(episode.agenda.pushed(), 1);
    assert!((episode.weak - -1.7).abs() < 1e-6);
  }

  #[test]
  fn test_weak_bar_refuses_unaries() {
    // X and Y fill a width-2 beam; the unary Z over X scores below both
    let g: Grammar = r#"
      TOP -> X : 0;
      X -> A B : -0.1;
      Y -> A B : -0.5;
      Z -> X : -2.0;
      A -> "a";
      B -> "b";
    "#
    .parse()
    .unwrap();
    let z = g.nonterminal("Z").unwrap();
    let params = BeamParams::new(2, f32::INFINITY);

    let plain = beam(&g, params, Threshold::Plain).parse_chart(&["a", "b"]).unwrap();
    assert_eq!(plain.stats().pushed, 3);
    assert!(plain.root_cell().best_edge(z).is_none());

    let weak = beam(&g, params, Threshold::Weak).parse_chart(&["a", "b"]).unwrap();
    assert_eq!(weak.stats().pushed, 2);
    assert!(weak.root_cell().best_edge(z).is_none());
  }

  /// Penalizes unary edges, so the FOM and inside score disagree on which
  /// X derivation is best
  struct UnaryPenalty;

  impl FigureOfMerit for UnaryPenalty {
    fn score(&self, _span: Span, edge: &ChartEdge<'_>) -> f32 {
      if edge.production.is_unary() {
        edge.inside - 5.0
      } else {
        edge.inside
      }
    }
  }

  #[test]
  fn test_weak_cells_compare_inside_scores() {
    let g: Grammar = r#"
      TOP -> X : 0;
      X -> A B : -3.0;
      X -> Y : -0.5;
      Y -> A B : -0.2;
      A -> "a";
      B -> "b";
    "#
    .parse()
    .unwrap();
    let x = g.nonterminal("X").unwrap();
    let parser = |threshold| {
      BeamParser::new(
        FillStrategy::Hash.build(&g),
        Box::new(UnaryPenalty),
        Box::new(SpanOrder),
        BeamParams::new(10, f32::INFINITY),
        threshold,
      )
    };

    // binary X: inside -3.0, fom -3.0; unary X over Y: inside -0.7, fom -5.7
    let plain = parser(Threshold::Plain);
    assert_eq!(plain.score_key(), ScoreKey::Fom);
    let chart = plain.parse_chart(&["a", "b"]).unwrap();
    assert_eq!(chart.key(), ScoreKey::Fom);
    let kept = chart.root_cell().best_edge(x).unwrap();
    assert!(kept.production.is_binary());
    assert!((kept.inside - -3.0).abs() < 1e-6);

    let weak = parser(Threshold::Weak);
    assert_eq!(weak.score_key(), ScoreKey::Inside);
    let chart = weak.parse_chart(&["a", "b"]).unwrap();
    assert_eq!(chart.key(), ScoreKey::Inside);
    let kept = chart.root_cell().best_edge(x).unwrap();
    assert!(kept.production.is_unary());
    assert!((kept.inside - -0.7).abs() < 1e-6);
  }

  #[test]
  fn test_prior_fom_still_parses() {
    let g: Grammar = GRAMMAR.parse().unwrap();
    let parser = BeamParser::new(
      FillStrategy::Matrix.build(&g),
      Box::new(PriorFom::from_grammar(&g)),
      Box::new(SpanOrder),
      BeamParams::default(),
      Threshold::Plain,
    );
    let parse = parser.parse(&SENTENCE).unwrap();
    assert!(parse.is_parsed());
    assert!(parse.score.unwrap() <= exhaustive_score(&g));
  }
}
