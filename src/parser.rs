use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

use tracing::debug;

use crate::Err;
use crate::beam::{BeamParams, BeamParser, Threshold};
use crate::best_first::AgendaParser;
use crate::chart::{Chart, ChartCell, ChartEdge, ScoreKey, Span};
use crate::exhaustive::ExhaustiveParser;
use crate::fom::FomKind;
use crate::grammar::{Grammar, Token};
use crate::lookup::FillStrategy;
use crate::syntree::SynTree;
use crate::traversal::SpanOrder;

/// Per-parse diagnostic counts
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ParseStats {
  /// candidate edges built and scored
  pub considered: usize,
  /// candidates pushed onto an agenda
  pub pushed: usize,
  /// candidates stored into a cell
  pub added: usize,
}

impl AddAssign for ParseStats {
  fn add_assign(&mut self, other: Self) {
    self.considered += other.considered;
    self.pushed += other.pushed;
    self.added += other.added;
  }
}

impl fmt::Display for ParseStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "considered={} pushed={} added={}",
      self.considered, self.pushed, self.added
    )
  }
}

/// Outcome of parsing one sentence. A missing tree is a normal "no parse"
/// result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Parse {
  pub tree: Option<SynTree<String, String>>,
  /// inside score of the root edge
  pub score: Option<f32>,
  pub stats: ParseStats,
}

impl Parse {
  pub fn is_parsed(&self) -> bool {
    self.tree.is_some()
  }
}

impl fmt::Display for Parse {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (&self.tree, self.score) {
      (Some(tree), Some(score)) => write!(f, "{}\t{:.4}", tree, score),
      _ => write!(f, "no parse"),
    }
  }
}

/// A Viterbi chart parser. Implementors supply `fill_chart`; the rest of the
/// pipeline (lexical seeding, root finalization, extraction) is shared.
pub trait ChartParser<'g> {
  fn grammar(&self) -> &'g Grammar;

  /// Fills every multi-word cell. Lexical cells are already seeded.
  fn fill_chart(&self, chart: &mut Chart<'g>);

  /// Which score cells compare edges on
  fn score_key(&self) -> ScoreKey {
    ScoreKey::Inside
  }

  /// Ranking score for a new edge over `span`. Exhaustive parsers rank by inside score.
  fn figure_of_merit(&self, _span: Span, edge: &ChartEdge<'g>) -> f32 {
    edge.inside
  }

  fn init_chart(&self, size: usize) -> Chart<'g> {
    Chart::new(size, self.grammar().num_nonterminals(), self.score_key())
  }

  /// One pass of unary expansion over the edges currently in `cell`. Edges
  /// created by the pass are not expanded again. Rules rewriting to the start
  /// symbol are left for `add_final_productions`.
  fn add_unary_productions(&self, cell: &mut ChartCell<'g>, stats: &mut ParseStats) {
    let g = self.grammar();
    let span = cell.span();
    let children = cell.edges().copied().collect::<Vec<_>>();
    for child in children.iter() {
      for p in g.unary_productions_with_child(child.parent()) {
        if p.parent == g.start_symbol() {
          continue;
        }
        let edge = ChartEdge::unary(p, child, span);
        let edge = edge.with_fom(self.figure_of_merit(span, &edge));
        stats.considered += 1;
        if cell.add_edge(edge) {
          stats.added += 1;
        }
      }
    }
  }

  /// Seeds each single-word cell with its lexical productions and one level
  /// of unaries above them. Unknown words leave their cell empty.
  fn add_lexical_productions(&self, chart: &mut Chart<'g>, tokens: &[Token]) {
    let g = self.grammar();
    let mut stats = ParseStats::default();
    for (start, &token) in tokens.iter().enumerate() {
      let span = Span::new(start, start + 1);
      let cell = chart.cell_at_mut(span);
      for p in g.lexical_productions(token) {
        let edge = ChartEdge::lexical(p);
        let edge = edge.with_fom(self.figure_of_merit(span, &edge));
        stats.considered += 1;
        if cell.add_edge(edge) {
          stats.added += 1;
        }
      }
      self.add_unary_productions(cell, &mut stats);
    }
    chart.record(stats);
  }

  /// Applies `start -> X` unaries at the root, over the best edge of every X
  fn add_final_productions(&self, chart: &mut Chart<'g>) {
    let g = self.grammar();
    let span = Span::new(0, chart.size());
    let mut stats = ParseStats::default();
    let root = chart.cell_at_mut(span);
    let children = root.edges().copied().collect::<Vec<_>>();
    for child in children.iter() {
      for p in g.unary_productions_with_child(child.parent()) {
        if p.parent != g.start_symbol() {
          continue;
        }
        let edge = ChartEdge::unary(p, child, span);
        let edge = edge.with_fom(self.figure_of_merit(span, &edge));
        stats.considered += 1;
        if root.add_edge(edge) {
          stats.added += 1;
        }
      }
    }
    chart.record(stats);
  }

  /// Runs the full pipeline up to a finished chart
  fn parse_chart(&self, words: &[&str]) -> Result<Chart<'g>, Err> {
    let tokens = self.grammar().tokenize(words)?;
    let mut chart = self.init_chart(tokens.len());
    self.add_lexical_productions(&mut chart, &tokens);
    self.fill_chart(&mut chart);
    self.add_final_productions(&mut chart);
    Ok(chart)
  }

  fn parse(&self, words: &[&str]) -> Result<Parse, Err> {
    let g = self.grammar();
    let chart = self.parse_chart(words)?;
    let tree = chart.extract_best_parse(g, words);
    let score = chart.root_edge(g).map(|e| e.inside);
    let stats = chart.stats();

    debug!(
      words = words.len(),
      parsed = tree.is_some(),
      considered = stats.considered,
      pushed = stats.pushed,
      added = stats.added,
      "parsed sentence"
    );

    Ok(Parse { tree, score, stats })
  }
}

/// Search algorithm, chosen once per parser
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Strategy {
  #[default]
  Exhaustive,
  /// per-cell agenda admitted on FOM
  Beam,
  /// per-cell agenda with a weak top-k threshold, admitted on inside score
  WeakBeam,
  /// one agenda over the whole chart with an admission memo
  Agenda,
}

impl FromStr for Strategy {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "exhaustive" => Ok(Self::Exhaustive),
      "beam" => Ok(Self::Beam),
      "weak-beam" => Ok(Self::WeakBeam),
      "agenda" => Ok(Self::Agenda),
      _ => Err(
        format!(
          "unknown strategy {:?} (expected exhaustive, beam, weak-beam or agenda)",
          s
        )
        .into(),
      ),
    }
  }
}

impl fmt::Display for Strategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Exhaustive => write!(f, "exhaustive"),
      Self::Beam => write!(f, "beam"),
      Self::WeakBeam => write!(f, "weak-beam"),
      Self::Agenda => write!(f, "agenda"),
    }
  }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ParserConfig {
  pub strategy: Strategy,
  pub lookup: FillStrategy,
  pub beam: BeamParams,
  /// pop budget for the whole-chart agenda
  pub max_pops: usize,
  pub fom: FomKind,
}

impl Default for ParserConfig {
  fn default() -> Self {
    Self {
      strategy: Strategy::default(),
      lookup: FillStrategy::default(),
      beam: BeamParams::default(),
      max_pops: usize::MAX,
      fom: FomKind::default(),
    }
  }
}

impl ParserConfig {
  pub fn build<'g>(&self, g: &'g Grammar) -> Box<dyn ChartParser<'g> + 'g> {
    let lookup = self.lookup.build(g);
    match self.strategy {
      Strategy::Exhaustive => Box::new(ExhaustiveParser::new(lookup, Box::new(SpanOrder))),
      Strategy::Beam | Strategy::WeakBeam => {
        let threshold = if self.strategy == Strategy::Beam {
          Threshold::Plain
        } else {
          Threshold::Weak
        };
        Box::new(BeamParser::new(
          lookup,
          self.fom.build(g),
          Box::new(SpanOrder),
          self.beam,
          threshold,
        ))
      }
      Strategy::Agenda => Box::new(AgendaParser::new(lookup, self.fom.build(g), self.max_pops)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const GRAMMAR: &str = r#"
    TOP -> S : -0.01;
    S -> NP VP : -0.1;
    VP -> V NP : -0.4;
    VP -> V : -1.1;
    NP -> N : -0.3;
    NP -> "she" : -1.0;
    N -> "fish" : -0.5;
    V -> "fish" : -0.9;
    V -> "eats" : -0.2;
  "#;

  #[test]
  fn test_config_strategies_all_parse() {
    let g: Grammar = GRAMMAR.parse().unwrap();
    let expected = "(TOP (S (NP she) (VP (V eats) (NP (N fish)))))";

    for strategy in ["exhaustive", "beam", "weak-beam", "agenda"] {
      for lookup in FillStrategy::ALL {
        let config = ParserConfig {
          strategy: strategy.parse().unwrap(),
          lookup,
          ..Default::default()
        };
        let parse = config.build(&g).parse(&["she", "eats", "fish"]).unwrap();
        let tree = parse.tree.as_ref().map(|t| t.to_string());
        assert_eq!(tree.as_deref(), Some(expected), "{} / {}", strategy, lookup);
        assert!(parse.stats.added > 0);
      }
    }
  }

  #[test]
  fn test_empty_sentence_is_an_error() {
    let g: Grammar = GRAMMAR.parse().unwrap();
    let parser = ParserConfig::default().build(&g);
    assert!(parser.parse(&[]).is_err());
  }

  #[test]
  fn test_unknown_word_is_no_parse() {
    let g: Grammar = GRAMMAR.parse().unwrap();
    for strategy in ["exhaustive", "beam", "weak-beam", "agenda"] {
      let config = ParserConfig {
        strategy: strategy.parse().unwrap(),
        ..Default::default()
      };
      let parse = config.build(&g).parse(&["she", "devours", "fish"]).unwrap();
      assert!(!parse.is_parsed(), "{}", strategy);
      assert_eq!(parse.score, None);
      assert_eq!(parse.to_string(), "no parse");
    }
  }

  #[test]
  fn test_final_productions_only_at_root() {
    let g: Grammar = GRAMMAR.parse().unwrap();
    let parser = ParserConfig::default().build(&g);
    let chart = parser.parse_chart(&["she", "eats", "fish"]).unwrap();
    let top = g.nonterminal("TOP").unwrap();

    assert!(chart.root_cell().best_edge(top).is_some());
    for cell in chart.cells() {
      if cell.span() != chart.root_cell().span() {
        assert!(cell.best_edge(top).is_none(), "TOP in {}", cell.span());
      }
    }
  }

  #[test]
  fn test_stats_accumulate() {
    let mut a = ParseStats {
      considered: 3,
      pushed: 1,
      added: 2,
    };
    a += ParseStats {
      considered: 1,
      pushed: 1,
      added: 1,
    };
    assert_eq!(a.to_string(), "considered=4 pushed=2 added=3");
  }
}
